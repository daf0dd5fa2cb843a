//! Room lifecycle and game rules for Holdout.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns every
//! mutation of that room: joins, the phase machine, ballots, dealing and
//! reveals. Rooms never share state beyond the [`Store`](holdout_store::Store)
//! and the [`Broadcast`] sink.
//!
//! # Key types
//!
//! - [`RoomManager`] — creates rooms, resolves join codes, tears rooms down
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`Broadcast`] — where room events go
//! - [`GameConfig`] — tunable rules (round length, candidates, delays)
//! - [`GameError`] — everything a room operation can refuse with

mod broadcast;
mod config;
mod error;
mod manager;
mod room;

pub mod ballot;
pub mod dealer;
pub mod phase;
pub mod scenario;
pub mod views;

pub use broadcast::{Broadcast, Outbox};
pub use config::{GameConfig, MAX_CAPACITY, MAX_NAME_LEN, MIN_CAPACITY, survivor_threshold};
pub use error::GameError;
pub use manager::{RoomManager, generate_code, validate_name};
pub use room::{JoinOutcome, ResumeOutcome, RoomHandle};
