//! Codec trait and implementations for serializing/deserializing frames.
//!
//! The rest of the server never calls `serde_json` directly; it goes through
//! a [`Codec`] so the wire format can change without touching the handler.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that speaks JSON.
///
/// Browser clients read frames straight out of the WebSocket, so JSON keeps
/// the client side trivial.
///
/// ```rust
/// use holdout_protocol::{Action, ClientFrame, Codec, JsonCodec, Request};
///
/// let codec = JsonCodec;
/// let frame = ClientFrame::Request(Request { id: 7, action: Action::StartGame });
///
/// let bytes = codec.encode(&frame).unwrap();
/// let decoded: ClientFrame = codec.decode(&bytes).unwrap();
/// assert_eq!(frame, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
