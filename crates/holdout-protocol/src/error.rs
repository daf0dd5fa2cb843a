//! Error types for the protocol layer.

/// Errors that can occur while turning frames into bytes and back.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, unknown tags.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but breaks protocol rules, e.g. a request sent
    /// before the `Hello` handshake.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
