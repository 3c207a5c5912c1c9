//! Error types for the registry layer and its collaborators.

use rosterwatch_protocol::SessionId;
use rosterwatch_session::SessionError;

/// Failures reported by external collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollabError {
    /// The queried entity does not exist. A normal outcome, not a fault.
    #[error("{0} not found")]
    NotFound(String),

    /// Transient network failure; worth retrying.
    #[error("network error: {0}")]
    Network(String),

    /// The collaborator refused the request.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl CollabError {
    /// Only network failures are retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Errors from registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The session's actor is gone or its channel is closed.
    #[error("session {0} is unavailable")]
    Unavailable(SessionId),

    /// The session's command channel is full; the poll was dropped. The
    /// next poll supersedes it.
    #[error("session {0} is backlogged, poll dropped")]
    Backlogged(SessionId),

    /// The session did not answer within the query timeout.
    #[error("session {0} did not answer in time")]
    Timeout(SessionId),

    /// The session rejected the update.
    #[error(transparent)]
    Session(#[from] SessionError),
}
