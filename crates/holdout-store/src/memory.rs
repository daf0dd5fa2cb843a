//! In-process [`Store`] backend.
//!
//! All mutable tables sit behind a single `RwLock`, so every method,
//! including the multi-table ones, runs as one transaction.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use holdout_protocol::{
    AssignmentId, BallotKind, PlayerId, RoomId, ScenarioId, ScenarioKind,
};

use crate::models::{
    AssignedCard, AssignmentQuery, AssignmentView, BallotEntry, Card,
    NewAssignment, NewPlayer, NewRoom, NewVote, Player, PlayerQuery, Room,
    Scenario, VoteFilter,
};
use crate::seed::ReferenceData;
use crate::traits::{Store, StoreResult};
use crate::StoreError;

#[derive(Default)]
struct Tables {
    rooms: BTreeMap<RoomId, Room>,
    players: BTreeMap<PlayerId, Player>,
    assignments: BTreeMap<AssignmentId, AssignedCard>,
    votes: Vec<BallotEntry>,
    next_room: u64,
    next_player: u64,
    next_assignment: u64,
    next_seq: u64,
}

impl Tables {
    fn room_id(&mut self) -> RoomId {
        self.next_room += 1;
        RoomId(self.next_room)
    }

    fn player_id(&mut self) -> PlayerId {
        self.next_player += 1;
        PlayerId(self.next_player)
    }

    fn assignment_id(&mut self) -> AssignmentId {
        self.next_assignment += 1;
        AssignmentId(self.next_assignment)
    }

    fn seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

struct Inner {
    tables: RwLock<Tables>,
    reference: ReferenceData,
}

/// A [`Store`] kept entirely in memory. Clones share state.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

impl InMemoryStore {
    /// An empty store using the built-in card pool and scenarios.
    pub fn new() -> Self {
        Self::with_reference_data(ReferenceData::builtin())
    }

    pub fn with_reference_data(reference: ReferenceData) -> Self {
        tracing::debug!(
            cards = reference.cards.len(),
            scenarios = reference.scenarios.len(),
            "in-memory store ready"
        );
        Self {
            inner: Arc::new(Inner {
                tables: RwLock::new(Tables::default()),
                reference,
            }),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for InMemoryStore {
    async fn insert_room(&self, new: NewRoom) -> StoreResult<Room> {
        let mut t = self.inner.tables.write().await;
        if t.rooms.values().any(|r| r.code == new.code) {
            return Err(StoreError::Conflict(format!(
                "room code {} is taken",
                new.code
            )));
        }
        let room = Room {
            id: t.room_id(),
            code: new.code,
            capacity: new.capacity,
            variant: new.variant,
            phase: holdout_protocol::Phase::Waiting,
            current_round: 0,
            hazard: None,
            location: None,
            candidates: Vec::new(),
            created_at: new.created_at,
            started_at: None,
            round_deadline: None,
            finished_at: None,
            ballot_closed: false,
        };
        t.rooms.insert(room.id, room.clone());
        Ok(room)
    }

    async fn find_room(&self, id: RoomId) -> StoreResult<Option<Room>> {
        Ok(self.inner.tables.read().await.rooms.get(&id).cloned())
    }

    async fn find_room_by_code(&self, code: &str) -> StoreResult<Option<Room>> {
        let t = self.inner.tables.read().await;
        Ok(t.rooms.values().find(|r| r.code == code).cloned())
    }

    async fn update_room(&self, room: &Room) -> StoreResult<()> {
        let mut t = self.inner.tables.write().await;
        match t.rooms.get_mut(&room.id) {
            Some(row) => {
                *row = room.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("room {}", room.id))),
        }
    }

    async fn list_rooms(&self) -> StoreResult<Vec<Room>> {
        Ok(self.inner.tables.read().await.rooms.values().cloned().collect())
    }

    async fn purge_room(&self, id: RoomId) -> StoreResult<()> {
        let mut t = self.inner.tables.write().await;
        if t.rooms.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("room {id}")));
        }
        t.players.retain(|_, p| p.room != id);
        t.assignments.retain(|_, a| a.room != id);
        t.votes.retain(|v| v.room != id);
        Ok(())
    }

    async fn insert_player(&self, new: NewPlayer) -> StoreResult<Player> {
        let mut t = self.inner.tables.write().await;
        if !t.rooms.contains_key(&new.room) {
            return Err(StoreError::NotFound(format!("room {}", new.room)));
        }
        if new.host && t.players.values().any(|p| p.room == new.room && p.host)
        {
            return Err(StoreError::Conflict(format!(
                "room {} already has a host",
                new.room
            )));
        }
        let player = Player {
            id: t.player_id(),
            user: new.user,
            room: new.room,
            name: new.name,
            alive: true,
            host: new.host,
            online: new.online,
            joined_at: new.joined_at,
        };
        t.players.insert(player.id, player.clone());
        Ok(player)
    }

    async fn find_player(&self, id: PlayerId) -> StoreResult<Option<Player>> {
        Ok(self.inner.tables.read().await.players.get(&id).cloned())
    }

    async fn find_players(&self, query: PlayerQuery) -> StoreResult<Vec<Player>> {
        let t = self.inner.tables.read().await;
        Ok(t.players
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect())
    }

    async fn update_player(&self, player: &Player) -> StoreResult<()> {
        let mut t = self.inner.tables.write().await;
        match t.players.get_mut(&player.id) {
            Some(row) => {
                *row = player.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("player {}", player.id))),
        }
    }

    async fn delete_player(&self, id: PlayerId) -> StoreResult<()> {
        let mut t = self.inner.tables.write().await;
        if t.players.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("player {id}")));
        }
        t.assignments.retain(|_, a| a.player != id);
        t.votes.retain(|v| {
            v.voter != id
                && !(v.kind == BallotKind::Elimination && v.candidate == id.0)
        });
        Ok(())
    }

    async fn scenarios(&self, kind: ScenarioKind) -> StoreResult<Vec<Scenario>> {
        Ok(self
            .inner
            .reference
            .scenarios
            .iter()
            .filter(|s| s.kind == kind)
            .cloned()
            .collect())
    }

    async fn find_scenario(
        &self,
        id: ScenarioId,
    ) -> StoreResult<Option<Scenario>> {
        Ok(self
            .inner
            .reference
            .scenarios
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn cards(&self) -> StoreResult<Vec<Card>> {
        Ok(self.inner.reference.cards.clone())
    }

    async fn insert_assignments(
        &self,
        batch: Vec<NewAssignment>,
    ) -> StoreResult<Vec<AssignedCard>> {
        let mut t = self.inner.tables.write().await;

        // Validate the whole batch against existing rows and itself
        // before touching the table.
        let mut held: HashSet<_> = t
            .assignments
            .values()
            .map(|a| (a.player, a.category))
            .collect();
        let mut dealt: HashSet<_> =
            t.assignments.values().map(|a| (a.room, a.card)).collect();
        for new in &batch {
            if !t.players.contains_key(&new.player) {
                return Err(StoreError::NotFound(format!(
                    "player {}",
                    new.player
                )));
            }
            if !held.insert((new.player, new.category)) {
                return Err(StoreError::Conflict(format!(
                    "player {} already holds a {} card",
                    new.player, new.category
                )));
            }
            if !dealt.insert((new.room, new.card)) {
                return Err(StoreError::Conflict(format!(
                    "card {} already dealt in room {}",
                    new.card, new.room
                )));
            }
        }

        let mut inserted = Vec::with_capacity(batch.len());
        for new in batch {
            let row = AssignedCard {
                id: t.assignment_id(),
                room: new.room,
                player: new.player,
                card: new.card,
                category: new.category,
                revealed: false,
                revealed_round: None,
            };
            t.assignments.insert(row.id, row.clone());
            inserted.push(row);
        }
        Ok(inserted)
    }

    async fn find_assignments(
        &self,
        query: AssignmentQuery,
    ) -> StoreResult<Vec<AssignmentView>> {
        let t = self.inner.tables.read().await;
        let cards = &self.inner.reference.cards;
        Ok(t.assignments
            .values()
            .filter(|a| query.matches(a))
            .map(|a| AssignmentView {
                assignment: a.clone(),
                card: query
                    .with_card
                    .then(|| cards.iter().find(|c| c.id == a.card).cloned())
                    .flatten(),
            })
            .collect())
    }

    async fn update_assignment(
        &self,
        assignment: &AssignedCard,
    ) -> StoreResult<()> {
        let mut t = self.inner.tables.write().await;
        match t.assignments.get_mut(&assignment.id) {
            Some(row) => {
                *row = assignment.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!(
                "assignment {}",
                assignment.id
            ))),
        }
    }

    async fn replace_vote(&self, vote: NewVote) -> StoreResult<BallotEntry> {
        let mut t = self.inner.tables.write().await;
        let key = vote.ballot;
        t.votes.retain(|e| {
            !(e.room == key.room
                && e.kind == key.kind
                && e.round == key.round
                && e.voter == vote.voter)
        });
        let entry = BallotEntry {
            room: key.room,
            kind: key.kind,
            round: key.round,
            voter: vote.voter,
            candidate: vote.candidate,
            seq: t.seq(),
        };
        t.votes.push(entry.clone());
        Ok(entry)
    }

    async fn find_votes(&self, filter: VoteFilter) -> StoreResult<Vec<BallotEntry>> {
        let t = self.inner.tables.read().await;
        // Entries are appended with increasing seq, so the vec is ordered.
        Ok(t.votes.iter().filter(|e| filter.matches(e)).cloned().collect())
    }

    async fn delete_votes(&self, filter: VoteFilter) -> StoreResult<usize> {
        let mut t = self.inner.tables.write().await;
        let before = t.votes.len();
        t.votes.retain(|e| !filter.matches(e));
        Ok(before - t.votes.len())
    }
}
