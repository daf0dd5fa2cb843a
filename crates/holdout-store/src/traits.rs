//! The repository interface the game core talks to.
//!
//! Backends implement [`Store`]; the room actors only ever see the trait.
//! Methods that touch more than one table (`purge_room`, `delete_player`,
//! `insert_assignments`, `replace_vote`) are all-or-nothing.

use std::future::Future;

use holdout_protocol::{PlayerId, RoomId, ScenarioId, ScenarioKind};

use crate::StoreError;
use crate::models::{
    AssignedCard, AssignmentQuery, AssignmentView, BallotEntry, Card,
    NewAssignment, NewPlayer, NewRoom, NewVote, Player, PlayerQuery, Room,
    Scenario, VoteFilter,
};

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent game state.
///
/// `Clone` is cheap for every backend: clones share the same tables.
pub trait Store: Clone + Send + Sync + 'static {
    // -- rooms ------------------------------------------------------------

    /// Inserts a room. Fails with `Conflict` if the code is taken.
    fn insert_room(
        &self,
        room: NewRoom,
    ) -> impl Future<Output = StoreResult<Room>> + Send;

    fn find_room(
        &self,
        id: RoomId,
    ) -> impl Future<Output = StoreResult<Option<Room>>> + Send;

    fn find_room_by_code(
        &self,
        code: &str,
    ) -> impl Future<Output = StoreResult<Option<Room>>> + Send;

    /// Overwrites the stored row with `room`.
    fn update_room(
        &self,
        room: &Room,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn list_rooms(&self) -> impl Future<Output = StoreResult<Vec<Room>>> + Send;

    /// Deletes the room with its players, assignments and ballot entries.
    fn purge_room(
        &self,
        id: RoomId,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    // -- players ----------------------------------------------------------

    fn insert_player(
        &self,
        player: NewPlayer,
    ) -> impl Future<Output = StoreResult<Player>> + Send;

    fn find_player(
        &self,
        id: PlayerId,
    ) -> impl Future<Output = StoreResult<Option<Player>>> + Send;

    /// Matching players ordered by id (join order).
    fn find_players(
        &self,
        query: PlayerQuery,
    ) -> impl Future<Output = StoreResult<Vec<Player>>> + Send;

    fn update_player(
        &self,
        player: &Player,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Deletes the player together with their assignments, the ballot
    /// entries they cast and the elimination entries naming them.
    fn delete_player(
        &self,
        id: PlayerId,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    // -- reference data ---------------------------------------------------

    fn scenarios(
        &self,
        kind: ScenarioKind,
    ) -> impl Future<Output = StoreResult<Vec<Scenario>>> + Send;

    fn find_scenario(
        &self,
        id: ScenarioId,
    ) -> impl Future<Output = StoreResult<Option<Scenario>>> + Send;

    /// The whole card pool.
    fn cards(&self) -> impl Future<Output = StoreResult<Vec<Card>>> + Send;

    // -- assignments ------------------------------------------------------

    /// Inserts a dealt hand batch. Fails with `Conflict`, inserting
    /// nothing, if a player would get a second card of one category or a
    /// card would be dealt twice in one room.
    fn insert_assignments(
        &self,
        batch: Vec<NewAssignment>,
    ) -> impl Future<Output = StoreResult<Vec<AssignedCard>>> + Send;

    /// Matching assignments ordered by id.
    fn find_assignments(
        &self,
        query: AssignmentQuery,
    ) -> impl Future<Output = StoreResult<Vec<AssignmentView>>> + Send;

    fn update_assignment(
        &self,
        assignment: &AssignedCard,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    // -- ballots ----------------------------------------------------------

    /// Replaces the voter's entry on the ballot, if any, with a new one
    /// carrying a fresh sequence number.
    fn replace_vote(
        &self,
        vote: NewVote,
    ) -> impl Future<Output = StoreResult<BallotEntry>> + Send;

    /// Matching entries ordered by sequence number.
    fn find_votes(
        &self,
        filter: VoteFilter,
    ) -> impl Future<Output = StoreResult<Vec<BallotEntry>>> + Send;

    /// Returns the number of entries removed.
    fn delete_votes(
        &self,
        filter: VoteFilter,
    ) -> impl Future<Output = StoreResult<usize>> + Send;
}
