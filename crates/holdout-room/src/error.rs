//! Error taxonomy for room operations.
//!
//! Every variant is reported to the client as a failed ack carrying
//! [`GameError::code`]. None of them tears the room down.

use holdout_protocol::{CardCategory, Phase, RoomId};
use holdout_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    /// The action is not accepted in the room's current phase, or the
    /// ballot it targets has already closed.
    #[error("cannot {action} during {phase}")]
    IllegalPhase { action: &'static str, phase: Phase },

    #[error("only the host may do that")]
    NotHost,

    #[error("need at least {need} players, have {have}")]
    InsufficientPlayers { have: usize, need: usize },

    #[error("not enough {category} cards: have {have}, need {need}")]
    InsufficientCards {
        category: CardCategory,
        have: usize,
        need: usize,
    },

    #[error("eliminated players cannot do that")]
    NotAlive,

    #[error("invalid candidate: {0}")]
    InvalidCandidate(String),

    #[error("already revealed a card this round")]
    AlreadyRevealedThisRound,

    #[error("invalid card: {0}")]
    InvalidCard(String),

    #[error("room is full")]
    RoomFull,

    #[error("room not found")]
    RoomNotFound,

    #[error("player not found")]
    PlayerNotFound,

    #[error("the host cannot be kicked")]
    CannotKickHost,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The room's actor is gone or not answering.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl GameError {
    /// Stable wire code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::IllegalPhase { .. } => "ILLEGAL_PHASE",
            Self::NotHost => "NOT_HOST",
            Self::InsufficientPlayers { .. } => "INSUFFICIENT_PLAYERS",
            Self::InsufficientCards { .. } => "INSUFFICIENT_CARDS",
            Self::NotAlive => "NOT_ALIVE",
            Self::InvalidCandidate(_) => "INVALID_CANDIDATE",
            Self::AlreadyRevealedThisRound => "ALREADY_REVEALED_THIS_ROUND",
            Self::InvalidCard(_) => "INVALID_CARD",
            Self::RoomFull => "ROOM_FULL",
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::PlayerNotFound => "PLAYER_NOT_FOUND",
            Self::CannotKickHost => "CANNOT_KICK_HOST",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}
