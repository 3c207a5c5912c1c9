//! Error types for the shared data model.

/// Errors raised while building or decoding shared values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A configuration value cannot be used as given.
    ///
    /// Raised by [`ServerConfig::validated`](crate::ServerConfig::validated)
    /// for values that cannot be clamped into range (e.g. an empty name).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An upstream payload could not be decoded.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
