//! Room manager: creates rooms, resolves join codes to actors, and tears
//! rooms down.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;

use holdout_protocol::{GameVariant, RoomId, UserId};
use holdout_store::{NewRoom, Room, Store, StoreError};
use holdout_timer::DeferredTasks;

use crate::config::{MAX_CAPACITY, MAX_NAME_LEN, MIN_CAPACITY};
use crate::room::spawn_room;
use crate::{Broadcast, GameConfig, GameError, JoinOutcome, ResumeOutcome, RoomHandle};

/// Crockford base32: no I, L, O or U.
const CODE_ALPHABET: &[u8] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Fresh codes tried before giving up on a create.
const MAX_CODE_ATTEMPTS: usize = 8;

/// Generates a join code of `len` characters.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Trims a display name and checks its length.
pub fn validate_name(name: &str) -> Result<String, GameError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(GameError::InvalidRequest("display name is empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(GameError::InvalidRequest(format!(
            "display name is longer than {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_owned())
}

#[derive(Default)]
struct Rooms {
    by_id: HashMap<RoomId, RoomHandle>,
    by_code: HashMap<String, RoomId>,
}

/// Entry point for room operations from the connection layer.
///
/// Internally synchronized; share it behind an `Arc`. The lock only guards
/// the handle maps and is never held across an `.await`.
pub struct RoomManager<S: Store, B: Broadcast> {
    store: S,
    broadcast: Arc<B>,
    config: Arc<GameConfig>,
    timers: Arc<DeferredTasks<RoomId>>,
    rooms: Mutex<Rooms>,
}

impl<S: Store, B: Broadcast> RoomManager<S, B> {
    pub fn new(store: S, broadcast: Arc<B>, config: GameConfig) -> Self {
        Self {
            store,
            broadcast,
            config: Arc::new(config),
            timers: Arc::new(DeferredTasks::new()),
            rooms: Mutex::new(Rooms::default()),
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates a room and seats `user` in it as host.
    pub async fn create_room(
        &self,
        user: UserId,
        capacity: u8,
        variant: GameVariant,
        name: &str,
    ) -> Result<JoinOutcome, GameError> {
        if !(MIN_CAPACITY..=MAX_CAPACITY).contains(&capacity) {
            return Err(GameError::InvalidRequest(format!(
                "capacity must be between {MIN_CAPACITY} and {MAX_CAPACITY}"
            )));
        }
        let name = validate_name(name)?;

        let mut attempt = 0;
        let room = loop {
            attempt += 1;
            let code = generate_code(&mut rand::rng(), self.config.code_length);
            let inserted = self
                .store
                .insert_room(NewRoom {
                    code,
                    capacity,
                    variant,
                    created_at: Utc::now(),
                })
                .await;
            match inserted {
                Ok(room) => break room,
                Err(StoreError::Conflict(reason)) if attempt < MAX_CODE_ATTEMPTS => {
                    tracing::debug!(attempt, %reason, "room code collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        };

        tracing::info!(room_id = %room.id, code = %room.code, capacity, ?variant, "room created");
        let handle = self.spawn(&room);
        handle.join(user, name).await
    }

    /// Seats `user` in the room with `code`.
    pub async fn join_room(&self, code: &str, user: UserId, name: &str) -> Result<JoinOutcome, GameError> {
        let name = validate_name(name)?;
        self.handle_for_code(code).await?.join(user, name).await
    }

    /// Looks up `user`'s seat in the room with `code`.
    pub async fn resume(&self, code: &str, user: UserId) -> Result<ResumeOutcome, GameError> {
        self.handle_for_code(code).await?.resume(user).await
    }

    /// The actor for `room`, respawning it from the store if needed.
    pub async fn handle(&self, room: RoomId) -> Result<RoomHandle, GameError> {
        if let Some(handle) = self.cached(|rooms| rooms.by_id.get(&room).cloned()) {
            return Ok(handle);
        }
        let row = self
            .store
            .find_room(room)
            .await?
            .ok_or(GameError::RoomNotFound)?;
        Ok(self.spawn(&row))
    }

    async fn handle_for_code(&self, code: &str) -> Result<RoomHandle, GameError> {
        let code = code.trim().to_ascii_uppercase();
        let cached = self.cached(|rooms| {
            rooms
                .by_code
                .get(&code)
                .and_then(|id| rooms.by_id.get(id))
                .cloned()
        });
        if let Some(handle) = cached {
            return Ok(handle);
        }
        let row = self
            .store
            .find_room_by_code(&code)
            .await?
            .ok_or(GameError::RoomNotFound)?;
        Ok(self.spawn(&row))
    }

    /// Runs `f` on the maps, returning a live handle only.
    fn cached(&self, f: impl FnOnce(&Rooms) -> Option<RoomHandle>) -> Option<RoomHandle> {
        let rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        f(&rooms).filter(RoomHandle::is_alive)
    }

    fn spawn(&self, room: &Room) -> RoomHandle {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = rooms.by_id.get(&room.id).filter(|h| h.is_alive()) {
            return existing.clone();
        }
        let handle = spawn_room(
            room,
            self.store.clone(),
            Arc::clone(&self.broadcast),
            Arc::clone(&self.config),
            Arc::clone(&self.timers),
        );
        rooms.by_id.insert(room.id, handle.clone());
        rooms.by_code.insert(room.code.clone(), room.id);
        handle
    }

    fn forget(&self, room: RoomId) {
        let mut rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = rooms.by_id.remove(&room) {
            rooms.by_code.remove(handle.code());
        }
    }

    /// Administrative teardown of one room.
    pub async fn purge(&self, room: RoomId) -> Result<(), GameError> {
        let handle = self.handle(room).await?;
        let result = handle.close().await;
        self.forget(room);
        if let Err(GameError::Unavailable(_)) = result {
            // actor died mid-close; make sure the rows go
            self.timers.cancel(&room);
            self.store.purge_room(room).await?;
            return Ok(());
        }
        result
    }

    /// Purges `FINISHED` rooms that ended at least `ttl` before `now`.
    /// Returns how many were removed.
    pub async fn sweep_finished(&self, ttl: Duration, now: DateTime<Utc>) -> Result<usize, GameError> {
        let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
        let expired: Vec<RoomId> = self
            .store
            .list_rooms()
            .await?
            .into_iter()
            .filter(|r| r.phase.is_terminal())
            .filter(|r| {
                r.finished_at
                    .and_then(|t| t.checked_add_signed(ttl))
                    .is_some_and(|expiry| expiry <= now)
            })
            .map(|r| r.id)
            .collect();

        let mut purged = 0;
        for room in expired {
            match self.purge(room).await {
                Ok(()) => purged += 1,
                Err(e) => tracing::warn!(room_id = %room, error = %e, "failed to purge finished room"),
            }
        }
        if purged > 0 {
            tracing::info!(purged, "swept finished rooms");
        }
        Ok(purged)
    }

    /// Number of running room actors.
    pub fn room_count(&self) -> usize {
        let rooms = self.rooms.lock().unwrap_or_else(PoisonError::into_inner);
        rooms.by_id.values().filter(|h| h.is_alive()).count()
    }
}
