//! Unified error type for rosterwatch.

use rosterwatch_protocol::ProtocolError;
use rosterwatch_registry::RegistryError;
use rosterwatch_session::SessionError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each wrapper variant generates the `From`
/// impl, so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// A poll named a server that has no configuration. Only that poll
    /// is skipped.
    #[error("no configuration for server {server:?}")]
    ConfigurationMismatch { server: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Engine configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use rosterwatch_protocol::SessionId;

    use super::*;

    #[test]
    fn test_from_protocol_error() {
        let err: WatchError = ProtocolError::InvalidConfig("empty name".into()).into();
        assert!(matches!(err, WatchError::Protocol(_)));
        assert!(err.to_string().contains("empty name"));
    }

    #[test]
    fn test_from_session_error() {
        let err: WatchError = SessionError::InvariantViolation {
            session_id: SessionId(1),
            reason: "dup".into(),
        }
        .into();
        assert!(matches!(err, WatchError::Session(_)));
    }

    #[test]
    fn test_from_registry_error() {
        let err: WatchError = RegistryError::Unavailable(SessionId(4)).into();
        assert!(matches!(err, WatchError::Registry(_)));
        assert!(err.to_string().contains("game-4"));
    }

    #[test]
    fn test_configuration_mismatch_names_server() {
        let err = WatchError::ConfigurationMismatch {
            server: "omega".into(),
        };
        assert_eq!(err.to_string(), "no configuration for server \"omega\"");
    }
}
