//! Domain layer for the WhatsApp ⇄ helpdesk bridge
//!
//! Contains the entities both sides of the bridge agree on (contacts,
//! conversations, chat mappings, media items), identity value objects and
//! domain errors. This layer performs no I/O.

pub mod entities;
pub mod errors;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
