//! Store rows → wire views.

use std::collections::HashMap;

use holdout_protocol::{BallotView, CardView, PlayerId, PlayerView, RoomSnapshot};
use holdout_store::{AssignmentQuery, AssignmentView, Player, Room, Store};

use crate::{GameError, scenario};

/// A card as shown to players. `None` if the card row was not joined.
pub fn card(a: &AssignmentView) -> Option<CardView> {
    let card = a.card.as_ref()?;
    Some(CardView {
        assignment: a.assignment.id,
        category: a.assignment.category,
        value: card.value.clone(),
        description: card.description.clone(),
        rarity: card.rarity.clone(),
        revealed: a.assignment.revealed,
        revealed_round: a.assignment.revealed_round,
    })
}

/// Public player list with every player's revealed cards.
pub async fn players<S: Store>(
    store: &S,
    room: &Room,
    players: &[Player],
) -> Result<Vec<PlayerView>, GameError> {
    let revealed = store
        .find_assignments(AssignmentQuery::in_room(room.id).revealed(true).with_card())
        .await?;
    let mut by_player: HashMap<PlayerId, Vec<CardView>> = HashMap::new();
    for a in &revealed {
        if let Some(view) = card(a) {
            by_player.entry(a.assignment.player).or_default().push(view);
        }
    }

    Ok(players
        .iter()
        .map(|p| PlayerView {
            id: p.id,
            name: p.name.clone(),
            alive: p.alive,
            host: p.host,
            online: p.online,
            revealed: by_player.remove(&p.id).unwrap_or_default(),
        })
        .collect())
}

/// Room metadata with resolved scenarios.
pub async fn snapshot<S: Store>(
    store: &S,
    room: &Room,
    players: &[Player],
    ballot: Option<BallotView>,
) -> Result<RoomSnapshot, GameError> {
    let hazard = match room.hazard {
        Some(id) => store.find_scenario(id).await?.as_ref().map(scenario::view),
        None => None,
    };
    let location = match room.location {
        Some(id) => store.find_scenario(id).await?.as_ref().map(scenario::view),
        None => None,
    };
    let mut candidates = Vec::with_capacity(room.candidates.len());
    for id in &room.candidates {
        if let Some(s) = store.find_scenario(*id).await? {
            candidates.push(scenario::view(&s));
        }
    }

    Ok(RoomSnapshot {
        id: room.id,
        code: room.code.clone(),
        capacity: room.capacity,
        variant: room.variant,
        phase: room.phase,
        round: room.current_round,
        host: players.iter().find(|p| p.host).map(|p| p.id),
        hazard,
        location,
        candidates,
        ballot,
        created_at: room.created_at,
        started_at: room.started_at,
        round_deadline: room.round_deadline,
        finished_at: room.finished_at,
    })
}
