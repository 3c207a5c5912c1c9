//! Error types for the reconciliation layer.

use rosterwatch_protocol::SessionId;

/// Errors that reject a single roster update.
///
/// A rejected update leaves the session exactly as it was; the next poll
/// is applied against the last accepted roster.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The snapshot breaks a roster invariant, e.g. the same persona in
    /// two partitions.
    #[error("invariant violation in session {session_id}: {reason}")]
    InvariantViolation {
        session_id: SessionId,
        reason: String,
    },
}
