//! Error taxonomy for Troupe
//!
//! One explicit error type shared by the runtime, the transport adapter and
//! the registry, so callers see the same kinds regardless of which side of a
//! process boundary raised them.

use thiserror::Error;

/// Result type alias for Troupe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Troupe error kinds
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Lookup target absent, locally and in the registry
    #[error("actor not found: {name}")]
    ActorNotFound { name: String },

    /// Target exists but its owning manager missed heartbeats
    #[error("actor offline: {name}")]
    ActorOffline { name: String },

    /// Name collision or service-side validation failure
    #[error("registration failed for '{name}': {reason}")]
    RegistrationFailed { name: String, reason: String },

    /// A synchronous RPC did not complete within its bound
    #[error("timeout: {detail}")]
    Timeout { detail: String },

    /// I/O failure during encode, send, recv or decode
    #[error("transport error: {detail}")]
    Transport { detail: String },

    /// Inbound envelope refers to a type nobody registered
    #[error("unknown message type: {message_type}")]
    UnknownMessageType { message_type: String },

    /// A second actor was managed under an existing name
    #[error("actor name already managed: {name}")]
    NameTaken { name: String },

    /// Configuration field failed validation
    #[error("invalid configuration: {field}, reason: {reason}")]
    InvalidConfiguration { field: String, reason: String },
}

impl Error {
    /// Create an actor not found error
    pub fn actor_not_found(name: impl Into<String>) -> Self {
        Self::ActorNotFound { name: name.into() }
    }

    /// Create an actor offline error
    pub fn actor_offline(name: impl Into<String>) -> Self {
        Self::ActorOffline { name: name.into() }
    }

    /// Create a registration failed error
    pub fn registration_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RegistrationFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::Timeout {
            detail: detail.into(),
        }
    }

    /// Create a transport error
    pub fn transport(detail: impl Into<String>) -> Self {
        Self::Transport {
            detail: detail.into(),
        }
    }

    /// Create an unknown message type error
    pub fn unknown_message_type(message_type: impl Into<String>) -> Self {
        Self::UnknownMessageType {
            message_type: message_type.into(),
        }
    }

    /// Create a name taken error
    pub fn name_taken(name: impl Into<String>) -> Self {
        Self::NameTaken { name: name.into() }
    }

    /// Create an invalid configuration error
    pub fn invalid_configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Check if this error indicates a retriable condition
    ///
    /// An offline manager may come back within a heartbeat interval, and an
    /// expired RPC leaves the remote side untouched.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::ActorOffline { .. } | Self::Timeout { .. })
    }
}
