//! Shared types for the rolodex contact client
//!
//! Everything that crosses a crate boundary lives here: identities, contacts,
//! the snapshot handed to the view layer, and the structured error type.

pub mod contact;
pub mod identity;
pub mod session;

pub use contact::{Contact, ContactFields, ContactId};
pub use identity::Identity;
pub use session::{ContactsSnapshot, SessionPhase, SkipReason, SyncOutcome};

use serde::{Deserialize, Serialize};

/// Structured error types for contact synchronization.
///
/// `Clone` so the last failure can be stored in a snapshot and handed to
/// every view that renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SyncError {
    #[error("Remote store unavailable: {message}")]
    RemoteUnavailable { message: String },

    #[error("Contact not found: {id}")]
    ContactNotFound { id: String },

    #[error("Malformed response from remote store: {message}")]
    MalformedResponse { message: String },

    #[error("Authentication failed: {message}")]
    AuthFailed { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl SyncError {
    pub fn remote(message: impl Into<String>) -> Self {
        SyncError::RemoteUnavailable {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        SyncError::MalformedResponse {
            message: message.into(),
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::RemoteUnavailable { .. })
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
