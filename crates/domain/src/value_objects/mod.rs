//! Value Objects - Immutable, identity-less domain primitives

mod chat_id;
mod remote_ids;
mod wa_identity;

pub use chat_id::ChatId;
pub use remote_ids::{ContactId, ConversationId, InboxId};
pub use wa_identity::{WhatsAppIdentity, brazilian_mobile_variant, normalize_phone};
