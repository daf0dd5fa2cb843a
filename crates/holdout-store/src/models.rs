//! Rows held by the store, plus the insert payloads and query filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use holdout_protocol::{
    AssignmentId, BallotKind, CardCategory, CardId, GameVariant, Phase,
    PlayerId, RoomId, ScenarioId, ScenarioKind, UserId,
};

// ---------------------------------------------------------------------------
// Rooms and players
// ---------------------------------------------------------------------------

/// One game session.
///
/// The host is not stored here: it is the one player row with `host` set.
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: RoomId,
    pub code: String,
    pub capacity: u8,
    pub variant: GameVariant,
    pub phase: Phase,
    pub current_round: u32,
    pub hazard: Option<ScenarioId>,
    pub location: Option<ScenarioId>,
    /// Scenario ids on the currently open scenario ballot.
    pub candidates: Vec<ScenarioId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub round_deadline: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set once an elimination result is in and cleared when the delayed
    /// advance runs. Votes are refused while it is set.
    pub ballot_closed: bool,
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub code: String,
    pub capacity: u8,
    pub variant: GameVariant,
    pub created_at: DateTime<Utc>,
}

/// One seat in one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub user: UserId,
    pub room: RoomId,
    pub name: String,
    pub alive: bool,
    pub host: bool,
    pub online: bool,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPlayer {
    pub user: UserId,
    pub room: RoomId,
    pub name: String,
    pub host: bool,
    pub online: bool,
    pub joined_at: DateTime<Utc>,
}

/// Filter for [`Store::find_players`](crate::Store::find_players).
///
/// ```rust
/// use holdout_protocol::RoomId;
/// use holdout_store::PlayerQuery;
///
/// let living = PlayerQuery::in_room(RoomId(1)).alive_only();
/// assert!(living.alive_only);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PlayerQuery {
    pub room: Option<RoomId>,
    pub user: Option<UserId>,
    pub alive_only: bool,
}

impl PlayerQuery {
    pub fn in_room(room: RoomId) -> Self {
        Self {
            room: Some(room),
            ..Self::default()
        }
    }

    pub fn user(mut self, user: UserId) -> Self {
        self.user = Some(user);
        self
    }

    pub fn alive_only(mut self) -> Self {
        self.alive_only = true;
        self
    }

    pub(crate) fn matches(&self, player: &Player) -> bool {
        self.room.is_none_or(|r| player.room == r)
            && self.user.is_none_or(|u| player.user == u)
            && (!self.alive_only || player.alive)
    }
}

// ---------------------------------------------------------------------------
// Reference data
// ---------------------------------------------------------------------------

/// A card in the reference pool. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub category: CardCategory,
    pub value: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
}

/// A hazard or location offered on scenario ballots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioId,
    pub kind: ScenarioKind,
    pub title: String,
    pub description: String,
    /// Locations only: the number of bunker places.
    #[serde(default)]
    pub survivor_slots: Option<u32>,
}

// ---------------------------------------------------------------------------
// Assignments
// ---------------------------------------------------------------------------

/// A card dealt to a player. `revealed` never goes back to `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignedCard {
    pub id: AssignmentId,
    pub room: RoomId,
    pub player: PlayerId,
    pub card: CardId,
    pub category: CardCategory,
    pub revealed: bool,
    pub revealed_round: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub room: RoomId,
    pub player: PlayerId,
    pub card: CardId,
    pub category: CardCategory,
}

/// An assignment with its card joined in when the query asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentView {
    pub assignment: AssignedCard,
    pub card: Option<Card>,
}

/// Filter for [`Store::find_assignments`](crate::Store::find_assignments).
/// `with_card` names the association to load.
#[derive(Debug, Clone, Default)]
pub struct AssignmentQuery {
    pub room: Option<RoomId>,
    pub player: Option<PlayerId>,
    pub revealed: Option<bool>,
    pub with_card: bool,
}

impl AssignmentQuery {
    pub fn in_room(room: RoomId) -> Self {
        Self {
            room: Some(room),
            ..Self::default()
        }
    }

    pub fn for_player(player: PlayerId) -> Self {
        Self {
            player: Some(player),
            ..Self::default()
        }
    }

    pub fn revealed(mut self, revealed: bool) -> Self {
        self.revealed = Some(revealed);
        self
    }

    pub fn with_card(mut self) -> Self {
        self.with_card = true;
        self
    }

    pub(crate) fn matches(&self, a: &AssignedCard) -> bool {
        self.room.is_none_or(|r| a.room == r)
            && self.player.is_none_or(|p| a.player == p)
            && self.revealed.is_none_or(|rv| a.revealed == rv)
    }
}

// ---------------------------------------------------------------------------
// Ballots
// ---------------------------------------------------------------------------

/// One voter's current choice on one ballot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BallotEntry {
    pub room: RoomId,
    pub kind: BallotKind,
    /// 0 for scenario ballots.
    pub round: u32,
    pub voter: PlayerId,
    /// A player id on elimination ballots, a scenario id otherwise.
    pub candidate: u64,
    /// Store-assigned, strictly increasing across all entries.
    pub seq: u64,
}

/// Identifies one ballot within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BallotKey {
    pub room: RoomId,
    pub kind: BallotKind,
    pub round: u32,
}

#[derive(Debug, Clone)]
pub struct NewVote {
    pub ballot: BallotKey,
    pub voter: PlayerId,
    pub candidate: u64,
}

/// Filter for reading and deleting ballot entries.
#[derive(Debug, Clone, Default)]
pub struct VoteFilter {
    pub room: Option<RoomId>,
    pub kind: Option<BallotKind>,
    pub round: Option<u32>,
    pub voter: Option<PlayerId>,
}

impl VoteFilter {
    pub fn ballot(key: BallotKey) -> Self {
        Self {
            room: Some(key.room),
            kind: Some(key.kind),
            round: Some(key.round),
            voter: None,
        }
    }

    pub fn voter(mut self, voter: PlayerId) -> Self {
        self.voter = Some(voter);
        self
    }

    pub(crate) fn matches(&self, e: &BallotEntry) -> bool {
        self.room.is_none_or(|r| e.room == r)
            && self.kind.is_none_or(|k| e.kind == k)
            && self.round.is_none_or(|r| e.round == r)
            && self.voter.is_none_or(|v| e.voter == v)
    }
}
