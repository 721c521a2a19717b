//! WhatsApp integration
//!
//! Typed client for the Cloud-API style message gateway and the typed
//! inbound webhook schema.

pub mod client;
pub mod webhook;

pub use client::{
    MediaContent, MediaUrlResponse, OutgoingMedia, OutgoingMediaType, SendMessageResponse,
    WhatsAppClient, WhatsAppClientConfig, WhatsAppError,
};
pub use webhook::{
    InboundContent, InboundMedia, InboundMediaType, InboundWhatsAppMessage, WebhookPayload,
    extract_inbound_messages,
};
