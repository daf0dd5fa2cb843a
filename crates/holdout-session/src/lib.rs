//! Who is on the other end of a connection.
//!
//! - [`Authenticator`]: turns the `Hello` token into a [`UserId`].
//! - [`ConnectionRegistry`]: binds live connections to players and knows
//!   where to send each player's events.
//!
//! ```text
//! Room layer (above)     ← routes events through the registry
//!     ↕
//! Session layer (this)   ← identity and connection bindings
//!     ↕
//! Transport (below)      ← provides ConnectionId
//! ```
//!
//! [`UserId`]: holdout_protocol::UserId

mod auth;
mod error;
mod registry;

pub use auth::{Authenticator, MAX_TOKEN_LEN, OpaqueTokenAuthenticator};
pub use error::SessionError;
pub use registry::{BindOutcome, Binding, ConnectionRegistry};
