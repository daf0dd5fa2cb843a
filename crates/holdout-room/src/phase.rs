//! Phase guards and transitions.
//!
//! The edge table lives on [`Phase::can_transition_to`]; these helpers
//! apply it to a stored room.

use holdout_protocol::Phase;
use holdout_store::Room;

use crate::GameError;

/// Fails with `IllegalPhase` unless the room is in `expected`.
pub fn require(room: &Room, expected: Phase, action: &'static str) -> Result<(), GameError> {
    if room.phase == expected {
        Ok(())
    } else {
        Err(GameError::IllegalPhase {
            action,
            phase: room.phase,
        })
    }
}

/// Moves the room to `target`. Fails, leaving the room untouched, if the
/// edge is not in the table.
pub fn advance(room: &mut Room, target: Phase) -> Result<(), GameError> {
    if !room.phase.can_transition_to(target) {
        return Err(GameError::IllegalPhase {
            action: "advance",
            phase: room.phase,
        });
    }
    tracing::info!(
        room_id = %room.id,
        from = %room.phase,
        to = %target,
        round = room.current_round,
        "phase transition"
    );
    room.phase = target;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use holdout_protocol::{GameVariant, RoomId};

    use super::*;

    fn room(phase: Phase) -> Room {
        Room {
            id: RoomId(1),
            code: "ABCDEF".into(),
            capacity: 6,
            variant: GameVariant::Standard,
            phase,
            current_round: 0,
            hazard: None,
            location: None,
            candidates: vec![],
            created_at: Utc::now(),
            started_at: None,
            round_deadline: None,
            finished_at: None,
            ballot_closed: false,
        }
    }

    #[test]
    fn test_require_reports_current_phase() {
        let r = room(Phase::Discussion);
        assert!(require(&r, Phase::Discussion, "reveal").is_ok());
        let err = require(&r, Phase::Waiting, "start").unwrap_err();
        assert!(matches!(
            err,
            GameError::IllegalPhase {
                action: "start",
                phase: Phase::Discussion
            }
        ));
    }

    #[test]
    fn test_advance_follows_table() {
        let mut r = room(Phase::Waiting);
        advance(&mut r, Phase::ScenarioHazardVote).unwrap();
        assert_eq!(r.phase, Phase::ScenarioHazardVote);
    }

    #[test]
    fn test_advance_rejects_skip_without_mutation() {
        let mut r = room(Phase::Waiting);
        assert!(advance(&mut r, Phase::Discussion).is_err());
        assert_eq!(r.phase, Phase::Waiting);
    }
}
