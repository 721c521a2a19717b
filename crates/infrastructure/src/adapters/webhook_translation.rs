//! Webhook translation
//!
//! Turns the typed webhook payloads of both integrations into the bridge
//! service's event types. Events the bridge never forwards (unsupported
//! message subtypes, non-message helpdesk events) translate to `None`.

use application::{
    error::ApplicationError,
    ports::MessageDirection,
    services::{InboundMessage, OutboundReply},
};
use domain::{ChatId, ContactId, ConversationId, InboxId, MediaItem, WhatsAppIdentity};
use integration_chatwoot::{HelpdeskWebhookEvent, WebhookAttachment};
use integration_whatsapp::{InboundContent, InboundMedia, InboundWhatsAppMessage};
use tracing::debug;

use super::{
    chatwoot_helpdesk_adapter::to_remote_contact,
    whatsapp_message_source_adapter::mime_to_extension,
};

/// Translate a gateway message into an [`InboundMessage`]
///
/// # Errors
///
/// Returns [`ApplicationError::Domain`] when the chat id is not a valid
/// WhatsApp identity.
pub fn inbound_from_whatsapp(
    message: &InboundWhatsAppMessage,
) -> Result<Option<InboundMessage>, ApplicationError> {
    let (text, media) = match &message.content {
        InboundContent::Text(body) => (Some(body.clone()), Vec::new()),
        InboundContent::Media(media) => (None, vec![media_item(media)]),
        InboundContent::Unsupported(kind) => {
            debug!(message_id = %message.message_id, kind = %kind, "Unsupported message type");
            return Ok(None);
        },
    };

    let chat = WhatsAppIdentity::from_raw(&message.chat_id, message.is_group)?;
    let chat_id = ChatId::new(message.chat_id.clone())?;

    let sender_name = message
        .sender_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());

    let chat_name = if message.is_group {
        message
            .group_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map_or_else(|| chat.to_string(), str::to_string)
    } else {
        sender_name.map_or_else(|| chat.e164(), str::to_string)
    };

    let participant_name = if message.is_group {
        Some(
            sender_name
                .map_or_else(|| format!("+{}", message.sender), str::to_string),
        )
    } else {
        None
    };

    Ok(Some(InboundMessage {
        message_id: message.message_id.clone(),
        chat_id,
        chat,
        chat_name,
        participant_name,
        avatar_url: message.avatar_url.clone(),
        from_me: message.from_me,
        text,
        media,
    }))
}

fn media_item(media: &InboundMedia) -> MediaItem {
    let file_name = media
        .file_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| {
            format!(
                "{}.{}",
                media.media_type.as_str(),
                mime_to_extension(&media.mime_type)
            )
        });

    let item = MediaItem::from_gateway(&media.media_id, file_name, &media.mime_type);
    match &media.caption {
        Some(caption) => item.with_caption(caption),
        None => item,
    }
}

/// Translate a helpdesk event into an [`OutboundReply`]
///
/// # Errors
///
/// Returns [`ApplicationError::Validation`] for a `message_created` event
/// that lacks its message, conversation or inbox id.
pub fn outbound_from_helpdesk(
    event: &HelpdeskWebhookEvent,
) -> Result<Option<OutboundReply>, ApplicationError> {
    if !event.is_message_created() {
        debug!(event = %event.event, "Ignoring helpdesk event");
        return Ok(None);
    }

    let message_id = event
        .id
        .ok_or_else(|| ApplicationError::Validation("message event without id".to_string()))?;
    let conversation_id = event.conversation_id().ok_or_else(|| {
        ApplicationError::Validation(format!("message {message_id} has no conversation"))
    })?;
    let inbox_id = event.inbox_id().ok_or_else(|| {
        ApplicationError::Validation(format!("message {message_id} has no inbox"))
    })?;

    let direction = if event.is_outgoing() {
        MessageDirection::Outgoing
    } else {
        MessageDirection::Incoming
    };

    let recipient = event
        .contact()
        .cloned()
        .map(to_remote_contact)
        .and_then(|contact| contact.whatsapp_identity());

    Ok(Some(OutboundReply {
        message_id,
        conversation_id: ConversationId::new(conversation_id),
        inbox_id: InboxId::new(inbox_id),
        direction,
        private: event.private,
        content: event.content.clone(),
        agent_name: event.agent_name().map(str::to_string),
        contact_id: event.contact_id().map(ContactId::new),
        recipient,
        attachments: event.attachments.iter().map(attachment_item).collect(),
    }))
}

fn attachment_item(attachment: &WebhookAttachment) -> MediaItem {
    let item = MediaItem::from_url(
        &attachment.data_url,
        attachment.file_name(),
        attachment.mime_type(),
    );
    match attachment.file_size {
        Some(size) => item.with_size_hint(size),
        None => item,
    }
}
