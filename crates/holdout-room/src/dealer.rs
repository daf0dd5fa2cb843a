//! Card dealing.
//!
//! One card per category per player, drawn without replacement from a
//! uniformly shuffled pool. The whole hand batch is planned up front and
//! inserted in one store call, so a failed deal leaves nothing behind.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;

use holdout_protocol::{CardCategory, PlayerId, RoomId};
use holdout_store::{Card, NewAssignment};

use crate::GameError;

/// Plans a deal of the pool to `players`.
///
/// Fails with `InsufficientCards` if any category holds fewer cards than
/// there are players.
pub fn plan<R: Rng + ?Sized>(
    room: RoomId,
    pool: Vec<Card>,
    players: &[PlayerId],
    rng: &mut R,
) -> Result<Vec<NewAssignment>, GameError> {
    let mut by_category: BTreeMap<CardCategory, Vec<Card>> = CardCategory::ALL
        .iter()
        .map(|c| (*c, Vec::new()))
        .collect();
    for card in pool {
        by_category.entry(card.category).or_default().push(card);
    }

    for category in CardCategory::ALL {
        let have = by_category.get(&category).map_or(0, Vec::len);
        if have < players.len() {
            return Err(GameError::InsufficientCards {
                category,
                have,
                need: players.len(),
            });
        }
    }

    let mut batch = Vec::with_capacity(players.len() * CardCategory::ALL.len());
    for category in CardCategory::ALL {
        let Some(deck) = by_category.get_mut(&category) else {
            continue;
        };
        deck.shuffle(rng);
        for player in players {
            let Some(card) = deck.pop() else { break };
            batch.push(NewAssignment {
                room,
                player: *player,
                card: card.id,
                category,
            });
        }
    }
    Ok(batch)
}
