//! Application layer - Use cases and orchestration
//!
//! Contains the identity and conversation resolvers, the bridge service that
//! drives inbound and outbound events through them, and the port definitions
//! implemented by the infrastructure layer.

pub mod error;
pub mod ports;
pub mod services;

pub use error::{ApplicationError, MediaFailure};
pub use ports::*;
pub use services::*;
