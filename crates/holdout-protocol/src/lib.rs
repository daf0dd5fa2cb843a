//! Wire protocol for Holdout.
//!
//! This crate defines the vocabulary shared by the server and its clients:
//!
//! - **Identity types** ([`PlayerId`], [`RoomId`], [`UserId`], ...) —
//!   newtypes so one kind of id can never be passed where another is expected.
//! - **Game enums** ([`Phase`], [`BallotKind`], [`CardCategory`]) — the
//!   phase state machine table lives on [`Phase`] itself.
//! - **Messages** ([`ClientFrame`], [`ServerFrame`], [`RoomEvent`], ...) —
//!   what travels on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how messages become bytes.
//!
//! ```text
//! Transport (bytes) → Protocol (frames) → Session (who is this?) → Room
//! ```

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{
    Ack, Action, BallotView, CardView, ClientFrame, ErrorBody, PlayerView,
    Reply, Request, RoomEvent, RoomSnapshot, ScenarioView, ServerFrame,
    TallyEntry,
};
pub use types::{
    AssignmentId, BallotKind, CardCategory, CardId, GameVariant, Phase,
    PlayerId, RoomId, ScenarioId, ScenarioKind, UserId,
};

/// The protocol version clients must announce in their `Hello` frame.
pub const PROTOCOL_VERSION: u32 = 1;
