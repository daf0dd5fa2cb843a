//! Identity newtypes and the small enums every layer shares.
//!
//! Everything here travels on the wire, so serde attributes are part of the
//! contract with the browser client: ids serialize as plain numbers, enums
//! as fixed strings.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Declares a `u64` newtype id with a short display prefix.
///
/// `#[serde(transparent)]` keeps the JSON form a plain number, so
/// `PlayerId(42)` is `42` on the wire, not `{"0":42}`.
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

id_type!(
    /// A player: one seat in one room. Created on join, never reused.
    PlayerId, "P"
);
id_type!(
    /// A room (one game session). Users address rooms by their short code;
    /// the numeric id is internal.
    RoomId, "R"
);
id_type!(
    /// An authenticated identity, as issued by the `Authenticator`. One
    /// user may hold players in several rooms over time.
    UserId, "U"
);
id_type!(
    /// A reference card in the card pool.
    CardId, "C"
);
id_type!(
    /// The binding of one card to one player for one game.
    AssignmentId, "A"
);
id_type!(
    /// A hazard or location scenario from the reference data.
    ScenarioId, "S"
);

// ---------------------------------------------------------------------------
// Phase — the room state machine
// ---------------------------------------------------------------------------

/// The stage a room is in.
///
/// ```text
/// WAITING → SCENARIO_HAZARD_VOTE → SCENARIO_LOCATION_VOTE → DEALING
///         → DISCUSSION ⇄ ELIMINATION_VOTE → FINISHED
/// ```
///
/// Transitions are monotonic except for the discussion/elimination loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Waiting,
    ScenarioHazardVote,
    ScenarioLocationVote,
    Dealing,
    Discussion,
    EliminationVote,
    Finished,
}

impl Phase {
    /// Returns `true` if new players may join.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }

    /// Returns `true` once the game has ended.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished)
    }

    /// The ballot that is open in this phase, if any.
    pub fn open_ballot(self) -> Option<BallotKind> {
        match self {
            Self::ScenarioHazardVote => Some(BallotKind::ScenarioHazard),
            Self::ScenarioLocationVote => Some(BallotKind::ScenarioLocation),
            Self::EliminationVote => Some(BallotKind::Elimination),
            _ => None,
        }
    }

    /// Returns `true` if moving from `self` to `target` is a legal edge.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Waiting, Self::ScenarioHazardVote)
                | (Self::ScenarioHazardVote, Self::ScenarioLocationVote)
                | (Self::ScenarioLocationVote, Self::Dealing)
                | (Self::Dealing, Self::Discussion)
                | (Self::Discussion, Self::EliminationVote)
                | (Self::Discussion, Self::Finished)
                | (Self::EliminationVote, Self::Discussion)
                | (Self::EliminationVote, Self::Finished)
        )
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "WAITING",
            Self::ScenarioHazardVote => "SCENARIO_HAZARD_VOTE",
            Self::ScenarioLocationVote => "SCENARIO_LOCATION_VOTE",
            Self::Dealing => "DEALING",
            Self::Discussion => "DISCUSSION",
            Self::EliminationVote => "ELIMINATION_VOTE",
            Self::Finished => "FINISHED",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Ballots and scenarios
// ---------------------------------------------------------------------------

/// Which of the three ballots a vote belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BallotKind {
    ScenarioHazard,
    ScenarioLocation,
    Elimination,
}

impl BallotKind {
    /// Scenario ballots are cast by every player and pick a scenario;
    /// elimination ballots are cast by living players and pick a player.
    pub fn is_scenario(self) -> bool {
        !matches!(self, Self::Elimination)
    }

    /// The phase in which this ballot is open.
    pub fn phase(self) -> Phase {
        match self {
            Self::ScenarioHazard => Phase::ScenarioHazardVote,
            Self::ScenarioLocation => Phase::ScenarioLocationVote,
            Self::Elimination => Phase::EliminationVote,
        }
    }

    /// The scenario kind a scenario ballot chooses between.
    pub fn scenario_kind(self) -> Option<ScenarioKind> {
        match self {
            Self::ScenarioHazard => Some(ScenarioKind::Hazard),
            Self::ScenarioLocation => Some(ScenarioKind::Location),
            Self::Elimination => None,
        }
    }
}

/// Reference-data scenario families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    Hazard,
    Location,
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

/// The fixed set of card categories. Every player receives exactly one card
/// of each.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CardCategory {
    Profession,
    Health,
    Hobby,
    Phobia,
    Baggage,
    Fact,
}

impl CardCategory {
    /// All categories, in deal order.
    pub const ALL: [CardCategory; 6] = [
        Self::Profession,
        Self::Health,
        Self::Hobby,
        Self::Phobia,
        Self::Baggage,
        Self::Fact,
    ];
}

impl fmt::Display for CardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Profession => "profession",
            Self::Health => "health",
            Self::Hobby => "hobby",
            Self::Phobia => "phobia",
            Self::Baggage => "baggage",
            Self::Fact => "fact",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Room variant
// ---------------------------------------------------------------------------

/// Chosen by the host at room creation. Only the discussion round length
/// differs between variants.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum GameVariant {
    #[default]
    Standard,
    Quick,
}
