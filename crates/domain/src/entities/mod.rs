//! Domain entities - Objects with identity and lifecycle

mod chat_mapping;
mod media_item;
mod remote_contact;
mod remote_conversation;

pub use chat_mapping::ChatMapping;
pub use media_item::{MediaItem, MediaKind, MediaSource};
pub use remote_contact::{NewRemoteContact, RemoteContact};
pub use remote_conversation::{ConversationStatus, NewRemoteConversation, RemoteConversation};
