//! Unified error type for the Holdout server.

use holdout_protocol::{ErrorBody, ProtocolError};
use holdout_room::GameError;
use holdout_session::SessionError;
use holdout_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HoldoutError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, bad handshake).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (auth, unbound connection).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room refused the action.
    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HoldoutError {
    /// Stable wire code, as carried in failed acks.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Game(e) => e.code(),
            Self::Session(SessionError::NotConnected(_)) => "NOT_CONNECTED",
            Self::Session(SessionError::AuthFailed(_)) => "UNAUTHORIZED",
            Self::Protocol(_) => "BAD_REQUEST",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}
