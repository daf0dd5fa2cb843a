//! Error types for the session layer.

use holdout_transport::ConnectionId;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The [`Authenticator`](crate::Authenticator) rejected the token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The connection has no player bound to it. The client should send
    /// `ResumeSession` and retry.
    #[error("connection {0} is not bound to a player")]
    NotConnected(ConnectionId),
}
