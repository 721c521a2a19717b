//! Bridge service
//!
//! Entry points for the two event directions. Inbound WhatsApp messages are
//! resolved to a contact and conversation and posted to the helpdesk;
//! outbound agent replies are traced back to their WhatsApp recipient and
//! sent through the gateway. Each call handles one event and returns one
//! error at most.

use std::{fmt, sync::Arc};

use domain::{
    ChatId, ContactId, ConversationId, InboxId, MediaItem, RemoteContact, RemoteConversation,
    WhatsAppIdentity,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    error::ApplicationError,
    ports::{
        DispatchTarget, HelpdeskPort, MediaDispatchPort, MessageDirection, MessageSourcePort,
        NewHelpdeskMessage,
    },
    services::{ConversationResolver, IdentityResolver},
};

/// Settings for the bridge service
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// The helpdesk inbox this bridge instance serves
    pub inbox_id: InboxId,
    /// Prefix agent replies with `*Agent name:*`
    pub sign_agent_messages: bool,
}

/// A message received from WhatsApp
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Gateway message id
    pub message_id: String,
    pub chat_id: ChatId,
    /// The chat's identity (the group for group messages)
    pub chat: WhatsAppIdentity,
    /// Push name of the sender, or the group subject
    pub chat_name: String,
    /// Name of the group member who wrote the message
    pub participant_name: Option<String>,
    pub avatar_url: Option<String>,
    /// Sent from the bridged account itself
    pub from_me: bool,
    pub text: Option<String>,
    pub media: Vec<MediaItem>,
}

/// A message created in the helpdesk
#[derive(Debug, Clone)]
pub struct OutboundReply {
    pub message_id: u64,
    pub conversation_id: ConversationId,
    pub inbox_id: InboxId,
    pub direction: MessageDirection,
    pub private: bool,
    pub content: Option<String>,
    pub agent_name: Option<String>,
    /// Contact of the conversation, when the event carries it
    pub contact_id: Option<ContactId>,
    /// WhatsApp identity of the contact, when the event carries it
    pub recipient: Option<WhatsAppIdentity>,
    pub attachments: Vec<MediaItem>,
}

/// Why an event was not forwarded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Echo of a message sent by the bridged account
    OwnMessage,
    /// Neither text nor media
    Empty,
    /// Agent-only note
    PrivateNote,
    /// Not written by an agent (e.g. the echo of an inbound message)
    NotOutgoing,
    /// Event of an inbox served by another bridge
    ForeignInbox,
}

/// What happened to an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeOutcome {
    Delivered {
        conversation_id: ConversationId,
        /// Text and media messages sent
        messages: usize,
    },
    Skipped(SkipReason),
}

/// Drives events through the resolvers and out to the other side
pub struct BridgeService {
    identities: IdentityResolver,
    conversations: ConversationResolver,
    helpdesk: Arc<dyn HelpdeskPort>,
    whatsapp: Arc<dyn MessageSourcePort>,
    media: Arc<dyn MediaDispatchPort>,
    config: BridgeConfig,
}

impl fmt::Debug for BridgeService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeService")
            .field("identities", &self.identities)
            .field("conversations", &self.conversations)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BridgeService {
    pub fn new(
        identities: IdentityResolver,
        conversations: ConversationResolver,
        helpdesk: Arc<dyn HelpdeskPort>,
        whatsapp: Arc<dyn MessageSourcePort>,
        media: Arc<dyn MediaDispatchPort>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            identities,
            conversations,
            helpdesk,
            whatsapp,
            media,
            config,
        }
    }

    pub const fn identities(&self) -> &IdentityResolver {
        &self.identities
    }

    pub const fn conversations(&self) -> &ConversationResolver {
        &self.conversations
    }

    /// Forward a WhatsApp message to the helpdesk
    #[instrument(
        skip(self, message, cancel),
        fields(message_id = %message.message_id, chat_id = %message.chat_id, media = message.media.len())
    )]
    pub async fn handle_inbound(
        &self,
        message: InboundMessage,
        cancel: CancellationToken,
    ) -> Result<BridgeOutcome, ApplicationError> {
        if message.from_me {
            return Ok(BridgeOutcome::Skipped(SkipReason::OwnMessage));
        }

        let text = message.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
        if text.is_none() && message.media.is_empty() {
            debug!("Ignoring message without content");
            return Ok(BridgeOutcome::Skipped(SkipReason::Empty));
        }

        let (contact, mut conversation) = self.resolve_chat(&message).await?;

        let mut messages = 0;
        if let Some(text) = text {
            let content = attribute_to_participant(message.participant_name.as_deref(), text);
            let request = NewHelpdeskMessage::incoming(content).with_source_id(&message.message_id);

            if let Err(e) = self.helpdesk.create_message(conversation.id, &request).await {
                if !e.is_not_found() {
                    return Err(e.context(format!("create message in conversation {}", conversation.id)));
                }
                warn!(conversation_id = %conversation.id, "Conversation vanished, resolving again");
                conversation = self.re_resolve(&message.chat_id, &contact, &conversation).await?;
                self.helpdesk
                    .create_message(conversation.id, &request)
                    .await
                    .map_err(|e| e.context(format!("create message in conversation {}", conversation.id)))?;
            }
            messages += 1;
        }

        if !message.media.is_empty() {
            let items = message
                .media
                .into_iter()
                .map(|item| caption_for_participant(message.participant_name.as_deref(), item))
                .collect();
            let report = self
                .media
                .dispatch(
                    DispatchTarget::Helpdesk {
                        conversation_id: conversation.id,
                    },
                    items,
                    cancel,
                )
                .await?;
            messages += report.delivered();
        }

        info!(conversation_id = %conversation.id, messages, "Inbound message delivered");
        Ok(BridgeOutcome::Delivered {
            conversation_id: conversation.id,
            messages,
        })
    }

    /// Send an agent reply to WhatsApp
    #[instrument(
        skip(self, reply, cancel),
        fields(message_id = reply.message_id, conversation_id = %reply.conversation_id)
    )]
    pub async fn handle_outbound(
        &self,
        reply: OutboundReply,
        cancel: CancellationToken,
    ) -> Result<BridgeOutcome, ApplicationError> {
        if reply.private {
            return Ok(BridgeOutcome::Skipped(SkipReason::PrivateNote));
        }
        if reply.direction != MessageDirection::Outgoing {
            return Ok(BridgeOutcome::Skipped(SkipReason::NotOutgoing));
        }
        if reply.inbox_id != self.config.inbox_id {
            debug!(inbox_id = %reply.inbox_id, "Reply belongs to another inbox");
            return Ok(BridgeOutcome::Skipped(SkipReason::ForeignInbox));
        }

        let text = reply.content.as_deref().map(str::trim).filter(|t| !t.is_empty());
        if text.is_none() && reply.attachments.is_empty() {
            return Ok(BridgeOutcome::Skipped(SkipReason::Empty));
        }

        let recipient = self.recipient_for(&reply).await?;

        let mut messages = 0;
        if let Some(text) = text {
            let body = if self.config.sign_agent_messages {
                sign(reply.agent_name.as_deref(), text)
            } else {
                text.to_string()
            };
            let sent_id = self
                .whatsapp
                .send_text(&recipient, &body)
                .await
                .map_err(|e| e.context(format!("send text to {recipient}")))?;
            debug!(whatsapp_message_id = %sent_id, "Text sent");
            messages += 1;
        }

        if !reply.attachments.is_empty() {
            let report = self
                .media
                .dispatch(
                    DispatchTarget::WhatsApp {
                        recipient: recipient.clone(),
                    },
                    reply.attachments,
                    cancel,
                )
                .await?;
            messages += report.delivered();
        }

        info!(recipient = %recipient, messages, "Agent reply delivered");
        Ok(BridgeOutcome::Delivered {
            conversation_id: reply.conversation_id,
            messages,
        })
    }

    /// Contact and conversation of an inbound message
    ///
    /// A cached contact that has since been deleted in the helpdesk is
    /// forgotten and resolved once more.
    async fn resolve_chat(
        &self,
        message: &InboundMessage,
    ) -> Result<(RemoteContact, RemoteConversation), ApplicationError> {
        let contact = self.find_contact(message).await?;
        match self
            .conversations
            .resolve(&message.chat_id, &contact, self.config.inbox_id)
            .await
        {
            Err(e) if e.is_missing_contact() => {
                warn!(contact_id = %contact.id, "Contact no longer exists, resolving again");
                self.identities.forget(&message.chat, contact.id);

                let contact = self.find_contact(message).await?;
                let conversation = self
                    .conversations
                    .resolve(&message.chat_id, &contact, self.config.inbox_id)
                    .await?;
                Ok((contact, conversation))
            },
            result => result.map(|conversation| (contact, conversation)),
        }
    }

    async fn find_contact(&self, message: &InboundMessage) -> Result<RemoteContact, ApplicationError> {
        self.identities
            .find_or_create(&message.chat, &message.chat_name, message.avatar_url.as_deref())
            .await
    }

    async fn re_resolve(
        &self,
        chat_id: &ChatId,
        contact: &RemoteContact,
        stale: &RemoteConversation,
    ) -> Result<RemoteConversation, ApplicationError> {
        self.conversations.invalidate(stale.id);
        self.conversations
            .resolve(chat_id, contact, self.config.inbox_id)
            .await
    }

    async fn recipient_for(&self, reply: &OutboundReply) -> Result<WhatsAppIdentity, ApplicationError> {
        if let Some(recipient) = &reply.recipient {
            return Ok(recipient.clone());
        }

        let contact_id = match reply.contact_id {
            Some(contact_id) => contact_id,
            None => self
                .conversations
                .conversation_for_recipient(reply.conversation_id, self.config.inbox_id)
                .await?
                .contact_id
                .ok_or_else(|| {
                    ApplicationError::ContactResolutionFailed(format!(
                        "conversation {} has no contact",
                        reply.conversation_id
                    ))
                })?,
        };

        self.identities.identity_for_contact(contact_id).await
    }
}

/// Prefix group messages with the member's name
fn attribute_to_participant(participant: Option<&str>, text: &str) -> String {
    match participant.map(str::trim).filter(|p| !p.is_empty()) {
        Some(name) => format!("**{name}:**\n{text}"),
        None => text.to_string(),
    }
}

fn caption_for_participant(participant: Option<&str>, item: MediaItem) -> MediaItem {
    let Some(name) = participant.map(str::trim).filter(|p| !p.is_empty()) else {
        return item;
    };
    let caption = match item.caption.as_deref() {
        Some(caption) => format!("**{name}:**\n{caption}"),
        None => format!("**{name}:**"),
    };
    item.with_caption(caption)
}

/// WhatsApp-style bold signature line
fn sign(agent_name: Option<&str>, text: &str) -> String {
    match agent_name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => format!("*{name}:*\n{text}"),
        None => text.to_string(),
    }
}
