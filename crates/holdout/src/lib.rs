//! # Holdout
//!
//! Realtime server for Holdout, a social survival game: players vote on a
//! hazard and a shelter, receive secret character cards, reveal one per
//! round and vote each other out until only the shelter's capacity is left.
//!
//! The server is authoritative. Clients speak JSON over WebSocket; every
//! request is acknowledged and room changes are pushed as events.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use holdout::prelude::*;
//!
//! # async fn run() -> Result<(), HoldoutError> {
//! let server = HoldoutServer::<InMemoryStore, OpaqueTokenAuthenticator, holdout_protocol::JsonCodec>::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(InMemoryStore::new(), OpaqueTokenAuthenticator::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod config;
mod error;
mod handler;
pub mod logging;
mod server;

pub use config::ServerConfig;
pub use error::HoldoutError;
pub use server::{HoldoutServer, HoldoutServerBuilder, Rooms};

/// Everything needed to embed the server.
pub mod prelude {
    pub use crate::config::ServerConfig;
    pub use crate::{HoldoutError, HoldoutServer, HoldoutServerBuilder};
    pub use holdout_protocol::{
        Ack, Action, BallotKind, ClientFrame, Phase, PlayerId, Reply, RoomEvent,
        RoomId, ServerFrame, UserId, PROTOCOL_VERSION,
    };
    pub use holdout_room::{GameConfig, GameError};
    pub use holdout_session::{Authenticator, OpaqueTokenAuthenticator, SessionError};
    pub use holdout_store::{InMemoryStore, ReferenceData, Store};
}
