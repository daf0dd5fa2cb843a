//! Frames exchanged over a connection.
//!
//! Client → server: one [`ClientFrame::Hello`] handshake, then
//! [`ClientFrame::Request`]s. Server → client: [`ServerFrame::Welcome`],
//! one [`Ack`] per request, and pushed [`RoomEvent`]s.
//!
//! Every request is acknowledged with `{ ok: true, data }` or
//! `{ ok: false, error }`, correlated by the client-chosen `id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AssignmentId, BallotKind, CardCategory, GameVariant, Phase, PlayerId,
    RoomId, ScenarioId, ScenarioKind, UserId,
};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Everything a client can send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Must be the first frame on a connection.
    Hello { version: u32, token: String },

    /// A game action awaiting an [`Ack`].
    Request(Request),
}

/// A game action plus the id its acknowledgment will carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub action: Action,
}

/// The inbound actions.
///
/// Actions other than `CreateRoom`, `JoinRoom` and `ResumeSession` act on
/// the player currently bound to the connection. If the connection is not
/// bound they fail with `NOT_CONNECTED`; the client should send
/// `ResumeSession` once and retry the original action once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    CreateRoom {
        capacity: u8,
        #[serde(default)]
        variant: GameVariant,
        display_name: String,
    },
    JoinRoom {
        code: String,
        display_name: String,
    },
    ResumeSession {
        code: String,
    },
    StartGame,
    CastScenarioVote {
        kind: BallotKind,
        candidate: ScenarioId,
    },
    RevealCard {
        assignment: AssignmentId,
    },
    CastEliminationVote {
        target: PlayerId,
    },
    KickPlayer {
        target: PlayerId,
    },
    /// Host-only: close discussion early and open the elimination ballot.
    OpenEliminationVote,
    /// Keep-alive; resets the server's idle timer.
    Heartbeat,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Everything the server can send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// Handshake accepted.
    Welcome {
        user_id: UserId,
        server_time: DateTime<Utc>,
    },

    /// The answer to one [`Request`].
    Ack(Ack),

    /// A pushed room event.
    Event(RoomEvent),

    /// A connection-level failure (bad handshake). The server closes the
    /// connection after sending it.
    Error(ErrorBody),
}

/// Acknowledgment payload: `{ ok: true, data }` or `{ ok: false, error }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub id: u64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Reply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Ack {
    /// A successful acknowledgment.
    pub fn success(id: u64, data: Reply) -> Self {
        Self {
            id,
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// A failed acknowledgment.
    pub fn failure(id: u64, error: ErrorBody) -> Self {
        Self {
            id,
            ok: false,
            data: None,
            error: Some(error),
        }
    }
}

/// A structured failure: a stable machine code plus a human message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Successful ack data, one shape per action.
///
/// Untagged: the client knows which action it sent. Variant order matters
/// for decoding: the shapes with the most required fields come first and
/// the empty object comes last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Resumed {
        room: RoomSnapshot,
        players: Vec<PlayerView>,
        player_id: PlayerId,
        hand: Vec<CardView>,
    },
    Joined {
        room_id: RoomId,
        player_id: PlayerId,
        room: RoomSnapshot,
    },
    RoomCreated {
        room_code: String,
        player_id: PlayerId,
    },
    Empty {},
}

impl Reply {
    /// The `{}` reply used by actions with nothing to return.
    pub fn empty() -> Self {
        Self::Empty {}
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// A hazard or location as shown to players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioView {
    pub id: ScenarioId,
    pub kind: ScenarioKind,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survivor_slots: Option<u32>,
}

/// One assigned card. Only revealed cards appear in other players' views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardView {
    pub assignment: AssignmentId,
    pub category: CardCategory,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<String>,
    pub revealed: bool,
    #[serde(default)]
    pub revealed_round: Option<u32>,
}

/// Public view of one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub alive: bool,
    pub host: bool,
    pub online: bool,
    #[serde(default)]
    pub revealed: Vec<CardView>,
}

/// Votes for one candidate. `candidate` is a player id on elimination
/// ballots and a scenario id on scenario ballots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyEntry {
    pub candidate: u64,
    pub votes: usize,
}

/// Progress of the currently open ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotView {
    pub kind: BallotKind,
    pub round: u32,
    pub cast: usize,
    pub eligible: usize,
    pub tally: Vec<TallyEntry>,
}

/// Room metadata as sent to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub code: String,
    pub capacity: u8,
    pub variant: GameVariant,
    pub phase: Phase,
    pub round: u32,
    pub host: Option<PlayerId>,
    pub hazard: Option<ScenarioView>,
    pub location: Option<ScenarioView>,
    #[serde(default)]
    pub candidates: Vec<ScenarioView>,
    #[serde(default)]
    pub ballot: Option<BallotView>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub round_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Room events
// ---------------------------------------------------------------------------

/// Notifications pushed to the connections bound to a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum RoomEvent {
    /// Full room and player list, after membership changes.
    RoomUpdated {
        room: RoomSnapshot,
        players: Vec<PlayerView>,
    },
    PlayerJoined {
        player: PlayerView,
    },
    PlayerRemoved {
        player_id: PlayerId,
    },
    PlayerPresence {
        player_id: PlayerId,
        online: bool,
    },
    GameStarted {
        started_at: DateTime<Utc>,
    },
    ScenarioCandidates {
        kind: BallotKind,
        candidates: Vec<ScenarioView>,
    },
    /// Live progress after each accepted vote.
    VoteTallied {
        kind: BallotKind,
        round: u32,
        cast: usize,
        eligible: usize,
        tally: Vec<TallyEntry>,
    },
    ScenarioWinner {
        kind: BallotKind,
        scenario: ScenarioView,
        tally: Vec<TallyEntry>,
    },
    /// Private: the receiving player's own cards.
    HandDealt {
        cards: Vec<CardView>,
    },
    RoundStarted {
        round: u32,
        deadline: DateTime<Utc>,
    },
    CardRevealed {
        player_id: PlayerId,
        round: u32,
        card: CardView,
    },
    EliminationOpened {
        round: u32,
    },
    PlayerEliminated {
        player_id: PlayerId,
        round: u32,
        tally: Vec<TallyEntry>,
    },
    GameEnded {
        winners: Vec<PlayerId>,
    },
    /// Private: the host removed this player.
    Kicked {
        room_code: String,
    },
    /// Private: the same player was bound to a newer connection.
    SessionReplaced,
    RoomClosed {
        room_code: String,
    },
}
