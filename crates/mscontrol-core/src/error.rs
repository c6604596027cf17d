//! Error types for media server control

use thiserror::Error;

/// Result type for media control operations
pub type Result<T> = std::result::Result<T, MediaControlError>;

/// Errors raised while driving a media session.
///
/// Errors are `Clone` because a single failure is frequently fanned out to
/// every registered observer of a controller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MediaControlError {
    /// Requested state change is not in the legal transition set
    #[error("Illegal transition from {from} to {to}")]
    IllegalTransition { from: String, to: String },

    /// Media provider rejected or failed an operation request
    #[error("Media provider error: {message}")]
    Provider { message: String },

    /// SDP negotiation or the network stream failed
    #[error("Media session negotiation failed: {reason}")]
    Negotiation { reason: String },

    /// An operation requires a resource that does not exist
    #[error("Resource unavailable: {resource}")]
    ResourceUnavailable { resource: String },

    /// Operation is not allowed in the current controller state
    #[error("Illegal operation: {message}")]
    IllegalOperation { message: String },

    /// The controller inbox is gone
    #[error("Media session controller is no longer running")]
    ChannelClosed,

    /// Recording artifact or metadata error
    #[error("Recording error: {message}")]
    Recording { message: String },

    /// The persistence collaborator rejected a record
    #[error("Persistence error: {message}")]
    Persistence { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl MediaControlError {
    /// Create a provider error
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    /// Create a negotiation error
    pub fn negotiation(reason: impl Into<String>) -> Self {
        Self::Negotiation {
            reason: reason.into(),
        }
    }

    /// Create a resource unavailable error
    pub fn resource_unavailable(resource: impl Into<String>) -> Self {
        Self::ResourceUnavailable {
            resource: resource.into(),
        }
    }

    /// Create an illegal operation error
    pub fn illegal_operation(message: impl Into<String>) -> Self {
        Self::IllegalOperation {
            message: message.into(),
        }
    }

    /// Create a recording error
    pub fn recording(message: impl Into<String>) -> Self {
        Self::Recording {
            message: message.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether this error terminates the whole media session
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Negotiation { .. })
    }
}

impl<S: std::fmt::Display> From<crate::fsm::IllegalTransition<S>> for MediaControlError {
    fn from(err: crate::fsm::IllegalTransition<S>) -> Self {
        Self::IllegalTransition {
            from: err.from.to_string(),
            to: err.to.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_negotiation_failure_is_fatal() {
        assert!(MediaControlError::negotiation("Network stream failure").is_fatal());
        assert!(!MediaControlError::provider("play rejected").is_fatal());
        assert!(!MediaControlError::resource_unavailable("mixer").is_fatal());
        assert!(!MediaControlError::ChannelClosed.is_fatal());
    }

    #[test]
    fn test_provider_error_keeps_diagnostic_text() {
        let err = MediaControlError::provider("codec mismatch");
        assert_eq!(err.to_string(), "Media provider error: codec mismatch");
    }
}
