//! Contact record as the helpdesk knows it

use serde::{Deserialize, Serialize};

use crate::value_objects::{ContactId, WhatsAppIdentity, normalize_phone};

/// A correspondent in the helpdesk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteContact {
    pub id: ContactId,
    pub name: String,
    /// Phone number, digits only
    pub phone_number: Option<String>,
    /// Opaque identifier; the bridge stores the group id or JID here
    pub identifier: Option<String>,
    pub is_group: bool,
}

impl RemoteContact {
    pub fn new(id: ContactId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            phone_number: None,
            identifier: None,
            is_group: false,
        }
    }

    /// Set the phone number; separators and `+` are stripped
    #[must_use]
    pub fn with_phone_number(mut self, phone: &str) -> Self {
        let digits = normalize_phone(phone);
        self.phone_number = (!digits.is_empty()).then_some(digits);
        self
    }

    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    #[must_use]
    pub const fn as_group(mut self) -> Self {
        self.is_group = true;
        self
    }

    /// Number of digits in the stored phone number (0 if absent)
    pub fn phone_digit_count(&self) -> usize {
        self.phone_number.as_ref().map_or(0, String::len)
    }

    /// Whether the phone number or the identifier equals `normalized` exactly
    pub fn matches_exactly(&self, normalized: &str) -> bool {
        self.phone_number.as_deref() == Some(normalized)
            || self
                .identifier
                .as_deref()
                .is_some_and(|id| id == normalized || id.split('@').next() == Some(normalized))
    }

    /// Reconstruct the WhatsApp identity this contact was created for
    ///
    /// Groups are identified by their identifier, individuals by phone number
    /// (falling back to the identifier for contacts created without one).
    pub fn whatsapp_identity(&self) -> Option<WhatsAppIdentity> {
        if self.is_group {
            return self
                .identifier
                .as_deref()
                .and_then(|id| WhatsAppIdentity::from_raw(id, true).ok());
        }

        self.phone_number
            .as_deref()
            .and_then(|phone| WhatsAppIdentity::parse(phone).ok())
            .or_else(|| {
                self.identifier
                    .as_deref()
                    .and_then(|id| WhatsAppIdentity::parse(id).ok())
            })
    }
}

/// Attributes for creating a contact remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRemoteContact {
    pub name: String,
    /// E.164 phone number (`+<digits>`); absent for groups
    pub phone_number: Option<String>,
    pub identifier: String,
    pub avatar_url: Option<String>,
    pub is_group: bool,
}

impl NewRemoteContact {
    /// Build the create request for an identity
    ///
    /// A blank display name falls back to the normalized identity so the
    /// helpdesk never shows an empty contact.
    pub fn for_identity(
        identity: &WhatsAppIdentity,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Self {
        let name = display_name.trim();
        let name = if name.is_empty() {
            identity.normalized().to_string()
        } else {
            name.to_string()
        };

        Self {
            name,
            phone_number: (!identity.is_group()).then(|| identity.e164()),
            identifier: identity.recipient(),
            avatar_url: avatar_url.filter(|u| !u.is_empty()).map(str::to_string),
            is_group: identity.is_group(),
        }
    }
}
