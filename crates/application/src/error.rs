//! Application-level errors

use std::fmt;

use domain::DomainError;
use thiserror::Error;

/// A single media item that could not be transferred
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFailure {
    /// Zero-based position of the item in the dispatched batch
    pub index: usize,
    /// Human-readable identity of the item (file name and source)
    pub item: String,
    pub reason: String,
}

impl fmt::Display for MediaFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item #{} {}: {}", self.index + 1, self.item, self.reason)
    }
}

/// Errors that can occur in the application layer
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// Domain-level error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Network failure or 5xx from a remote system
    #[error("Transient remote error: {0}")]
    TransientRemote(String),

    /// The remote system already holds an entity with this identity
    #[error("Duplicate identity: {0}")]
    DuplicateIdentity(String),

    /// A previously known remote resource no longer exists
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Input rejected (locally or by the remote system)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Local admission control refused the call
    #[error("Rate limit exceeded")]
    RateLimitedLocally,

    /// A circuit breaker is open; the service is unavailable for now
    #[error("Service unavailable, retry later: {0}")]
    CircuitOpen(String),

    /// No contact could be found or created for an identity
    #[error("Contact resolution failed: {0}")]
    ContactResolutionFailed(String),

    /// A call exceeded its time budget
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// At least one media item of a dispatch failed
    #[error("{failed} of {total} media items failed, first: {first}")]
    MediaDispatch {
        failed: usize,
        total: usize,
        first: MediaFailure,
    },

    /// Other remote failure
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransientRemote(_) | Self::Timeout(_) | Self::CircuitOpen(_) | Self::RateLimitedLocally
        )
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// A helpdesk contact that was referenced no longer exists
    pub fn is_missing_contact(&self) -> bool {
        matches!(self, Self::NotFound { entity, .. } if entity == "Contact")
    }

    pub const fn is_duplicate_identity(&self) -> bool {
        matches!(self, Self::DuplicateIdentity(_))
    }

    /// Prefix the message with the remote call or entity that produced it
    ///
    /// Structured variants are returned unchanged so callers can still match
    /// on them.
    #[must_use]
    pub fn context(self, context: impl fmt::Display) -> Self {
        match self {
            Self::TransientRemote(msg) => Self::TransientRemote(format!("{context}: {msg}")),
            Self::Validation(msg) => Self::Validation(format!("{context}: {msg}")),
            Self::Timeout(msg) => Self::Timeout(format!("{context}: {msg}")),
            Self::ExternalService(msg) => Self::ExternalService(format!("{context}: {msg}")),
            Self::Internal(msg) => Self::Internal(format!("{context}: {msg}")),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_variants() {
        assert!(ApplicationError::TransientRemote("503".into()).is_retryable());
        assert!(ApplicationError::Timeout("search".into()).is_retryable());
        assert!(ApplicationError::CircuitOpen("media".into()).is_retryable());
        assert!(ApplicationError::RateLimitedLocally.is_retryable());
        assert!(!ApplicationError::Validation("bad".into()).is_retryable());
        assert!(!ApplicationError::not_found("Conversation", 1).is_retryable());
    }

    #[test]
    fn not_found_message() {
        let err = ApplicationError::not_found("Conversation", 42);
        assert_eq!(err.to_string(), "Conversation not found: 42");
        assert!(err.is_not_found());
    }

    #[test]
    fn context_prefixes_message() {
        let err = ApplicationError::TransientRemote("connection reset".into())
            .context("create_contact");
        assert_eq!(
            err.to_string(),
            "Transient remote error: create_contact: connection reset"
        );
    }

    #[test]
    fn context_keeps_structured_variants() {
        let err = ApplicationError::not_found("Contact", 9).context("get_contact");
        assert!(err.is_not_found());
    }

    #[test]
    fn missing_contact_is_told_apart_from_other_entities() {
        assert!(ApplicationError::not_found("Contact", 10).is_missing_contact());
        assert!(!ApplicationError::not_found("Conversation", 10).is_missing_contact());
        assert!(!ApplicationError::TransientRemote("503".into()).is_missing_contact());
    }

    #[test]
    fn media_dispatch_message_names_the_item() {
        let err = ApplicationError::MediaDispatch {
            failed: 1,
            total: 5,
            first: MediaFailure {
                index: 2,
                item: "c.jpg (media m-3)".into(),
                reason: "download failed".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("1 of 5"));
        assert!(msg.contains("item #3 c.jpg (media m-3)"));
    }

    #[test]
    fn domain_error_converts() {
        let err: ApplicationError = DomainError::InvalidIdentity("x".into()).into();
        assert!(matches!(err, ApplicationError::Domain(_)));
    }
}
