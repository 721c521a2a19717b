//! Chatwoot integration
//!
//! Typed client for the Chatwoot application API and the typed helpdesk
//! webhook schema.

pub mod client;
pub mod models;
pub mod webhook;

pub use client::{ChatwootClient, ChatwootClientConfig, ChatwootError};
pub use models::{
    AttachmentUpload, ChatwootContact, ChatwootConversation, ChatwootMessage, ContactInbox,
    CreateContactRequest, CreateConversationRequest, CreateMessageRequest, MessageType,
};
pub use webhook::{HelpdeskWebhookEvent, WebhookAttachment, WebhookConversation, WebhookSender};
