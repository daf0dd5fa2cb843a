//! Entity store for Holdout.
//!
//! The game core persists rooms, players, dealt cards and ballot entries
//! through the [`Store`] trait and reads the card pool and scenarios from
//! it. [`InMemoryStore`] is the bundled backend; a database-backed one
//! only has to implement the trait.

mod error;
mod memory;
mod models;
mod seed;
mod traits;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use models::{
    AssignedCard, AssignmentQuery, AssignmentView, BallotEntry, BallotKey,
    Card, NewAssignment, NewPlayer, NewRoom, NewVote, Player, PlayerQuery,
    Room, Scenario, VoteFilter,
};
pub use seed::ReferenceData;
pub use traits::{Store, StoreResult};
