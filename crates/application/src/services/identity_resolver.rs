//! Identity resolver
//!
//! Finds the helpdesk contact for a WhatsApp identity, creating it when none
//! exists. Brazilian mobile numbers may be registered with or without the
//! extra ninth digit, so both forms are searched and cached.

use std::{fmt, sync::Arc};

use domain::{ContactId, InboxId, NewRemoteContact, RemoteContact, WhatsAppIdentity};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::ApplicationError,
    ports::{HelpdeskPort, ResolutionCachePort},
};

/// Resolves WhatsApp identities to helpdesk contacts
pub struct IdentityResolver {
    helpdesk: Arc<dyn HelpdeskPort>,
    cache: Arc<dyn ResolutionCachePort>,
    inbox_id: InboxId,
}

impl fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("inbox_id", &self.inbox_id)
            .finish_non_exhaustive()
    }
}

impl IdentityResolver {
    /// Create a resolver that creates new contacts in `inbox_id`
    pub fn new(
        helpdesk: Arc<dyn HelpdeskPort>,
        cache: Arc<dyn ResolutionCachePort>,
        inbox_id: InboxId,
    ) -> Self {
        Self {
            helpdesk,
            cache,
            inbox_id,
        }
    }

    /// Parse a raw phone number or JID and resolve it
    pub async fn find_or_create_raw(
        &self,
        raw: &str,
        display_name: &str,
        avatar_url: Option<&str>,
        is_group: bool,
    ) -> Result<RemoteContact, ApplicationError> {
        let identity = WhatsAppIdentity::from_raw(raw, is_group)?;
        self.find_or_create(&identity, display_name, avatar_url)
            .await
    }

    /// Return the contact for `identity`, creating it if the helpdesk has none
    ///
    /// A concurrent creator may win the race for the same identity; the
    /// resulting duplicate error is absorbed by searching again.
    #[instrument(skip(self, display_name, avatar_url), fields(identity = %identity))]
    pub async fn find_or_create(
        &self,
        identity: &WhatsAppIdentity,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<RemoteContact, ApplicationError> {
        let variants = identity.lookup_variants();

        for variant in &variants {
            if let Some(contact) = self.cache.get_contact(&identity_key(identity, variant)) {
                debug!(contact_id = %contact.id, "Contact cache hit");
                return Ok(contact);
            }
        }

        if let Some(contact) = self.find_existing(identity, &variants).await {
            self.remember(identity, &variants, &contact);
            return Ok(contact);
        }

        let new_contact = NewRemoteContact::for_identity(identity, display_name, avatar_url);
        let contact = match self.helpdesk.create_contact(self.inbox_id, &new_contact).await {
            Ok(contact) => {
                info!(contact_id = %contact.id, "Created helpdesk contact");
                contact
            },
            Err(e) if e.is_duplicate_identity() => {
                warn!(error = %e, "Contact created concurrently, searching again");
                self.find_existing(identity, &variants)
                    .await
                    .ok_or_else(|| {
                        ApplicationError::ContactResolutionFailed(format!(
                            "{identity} reported as duplicate but no contact was found"
                        ))
                    })?
            },
            Err(e) => return Err(e.context(format!("create_contact for {identity}"))),
        };

        self.remember(identity, &variants, &contact);
        Ok(contact)
    }

    /// Load a contact by id, cache first
    #[instrument(skip(self))]
    pub async fn contact_by_id(&self, contact_id: ContactId) -> Result<RemoteContact, ApplicationError> {
        let key = id_key(contact_id);
        if let Some(contact) = self.cache.get_contact(&key) {
            return Ok(contact);
        }

        let contact = self
            .helpdesk
            .get_contact(contact_id)
            .await
            .map_err(|e| e.context("get_contact"))?;
        self.cache.put_contact(&key, contact.clone());
        Ok(contact)
    }

    /// The WhatsApp identity a helpdesk contact stands for
    pub async fn identity_for_contact(
        &self,
        contact_id: ContactId,
    ) -> Result<WhatsAppIdentity, ApplicationError> {
        let contact = self.contact_by_id(contact_id).await?;
        contact.whatsapp_identity().ok_or_else(|| {
            ApplicationError::ContactResolutionFailed(format!(
                "contact {contact_id} has neither a phone number nor a WhatsApp identifier"
            ))
        })
    }

    /// Drop every cached entry for `identity`
    pub fn invalidate(&self, identity: &WhatsAppIdentity) {
        for variant in identity.lookup_variants() {
            self.cache.invalidate_contact(&identity_key(identity, &variant));
        }
    }

    /// Drop `identity` and the contact it resolved to from the cache
    ///
    /// Used when the helpdesk reports the contact as deleted.
    pub fn forget(&self, identity: &WhatsAppIdentity, contact_id: ContactId) {
        self.invalidate(identity);
        self.cache.invalidate_contact(&id_key(contact_id));
    }

    /// Search the helpdesk; failures count as "no candidate"
    async fn find_existing(
        &self,
        identity: &WhatsAppIdentity,
        variants: &[String],
    ) -> Option<RemoteContact> {
        let mut candidates = Vec::new();

        if !identity.is_group() {
            match self.helpdesk.filter_contacts(variants).await {
                Ok(found) => candidates = found,
                Err(e) => warn!(error = %e, "Contact filter failed, falling back to search"),
            }
        }

        if candidates.is_empty() {
            match self.helpdesk.search_contacts(identity.normalized()).await {
                Ok(found) => candidates = found,
                Err(e) => warn!(error = %e, "Contact search failed"),
            }
        }

        let best = pick_best_match(identity, variants, &candidates).cloned();
        if let Some(contact) = &best {
            debug!(
                contact_id = %contact.id,
                candidates = candidates.len(),
                "Matched existing contact"
            );
        }
        best
    }

    fn remember(&self, identity: &WhatsAppIdentity, variants: &[String], contact: &RemoteContact) {
        for variant in variants {
            self.cache
                .put_contact(&identity_key(identity, variant), contact.clone());
        }
        self.cache.put_contact(&id_key(contact.id), contact.clone());
    }
}

/// Pick the contact to reuse among search results
///
/// With the Brazilian numbering quirk, the candidate with the longest phone
/// number wins among those matching any variant. Otherwise an exact match on
/// the normalized identity wins, then the first result.
fn pick_best_match<'a>(
    identity: &WhatsAppIdentity,
    variants: &[String],
    candidates: &'a [RemoteContact],
) -> Option<&'a RemoteContact> {
    if identity.has_numbering_variant() {
        let longest = candidates
            .iter()
            .filter(|c| variants.iter().any(|v| c.matches_exactly(v)))
            .fold(None::<&RemoteContact>, |best, candidate| match best {
                Some(best) if best.phone_digit_count() >= candidate.phone_digit_count() => {
                    Some(best)
                },
                _ => Some(candidate),
            });
        if longest.is_some() {
            return longest;
        }
    }

    candidates
        .iter()
        .find(|c| c.matches_exactly(identity.normalized()))
        .or_else(|| candidates.first())
}

fn identity_key(identity: &WhatsAppIdentity, variant: &str) -> String {
    if identity.is_group() {
        format!("group:{variant}")
    } else {
        format!("phone:{variant}")
    }
}

fn id_key(contact_id: ContactId) -> String {
    format!("id:{contact_id}")
}
