//! The connection registry: which live connection speaks for which player.
//!
//! A two-way map `ConnectionId ↔ PlayerId`. Each binding also carries the
//! player's room and an outbound sink `S` (the server uses an mpsc sender)
//! so events can be routed to the right socket.
//!
//! ```text
//!  handle ──by_handle──► player ──by_player──► Binding { handle, room, outbox }
//! ```
//!
//! At most one handle per player and one player per handle. Re-binding
//! either side evicts the old pairing and hands it back to the caller.
//!
//! The registry is shared by every connection task through an `Arc`. Its
//! lock is a plain `std::sync::Mutex` held only for map operations, never
//! across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use holdout_protocol::{PlayerId, RoomId};
use holdout_transport::ConnectionId;

use crate::SessionError;

/// One live pairing.
#[derive(Debug, Clone)]
pub struct Binding<S> {
    pub handle: ConnectionId,
    pub player: PlayerId,
    pub room: RoomId,
    pub outbox: S,
}

/// What a [`ConnectionRegistry::bind`] call evicted.
#[derive(Debug)]
pub struct BindOutcome<S> {
    /// The handle was bound to a different player, who is now offline.
    pub displaced: Option<Binding<S>>,
    /// The player was bound to a different handle, which should be told
    /// its session moved.
    pub superseded: Option<Binding<S>>,
}

struct Maps<S> {
    by_handle: HashMap<ConnectionId, PlayerId>,
    by_player: HashMap<PlayerId, Binding<S>>,
}

pub struct ConnectionRegistry<S> {
    maps: Mutex<Maps<S>>,
}

impl<S: Clone> ConnectionRegistry<S> {
    pub fn new() -> Self {
        Self {
            maps: Mutex::new(Maps {
                by_handle: HashMap::new(),
                by_player: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Maps<S>> {
        self.maps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds `player` to `handle`, evicting any previous pairing of either.
    pub fn bind(
        &self,
        player: PlayerId,
        room: RoomId,
        handle: ConnectionId,
        outbox: S,
    ) -> BindOutcome<S> {
        let mut maps = self.lock();

        let displaced = match maps.by_handle.get(&handle).copied() {
            Some(other) if other != player => maps.by_player.remove(&other),
            _ => None,
        };

        let old_handle = maps
            .by_player
            .get(&player)
            .map(|b| b.handle)
            .filter(|h| *h != handle);
        let superseded = match old_handle {
            Some(old) => {
                maps.by_handle.remove(&old);
                maps.by_player.remove(&player)
            }
            None => None,
        };

        maps.by_handle.insert(handle, player);
        maps.by_player.insert(
            player,
            Binding {
                handle,
                player,
                room,
                outbox,
            },
        );

        tracing::debug!(
            %player,
            %handle,
            room_id = %room,
            displaced = displaced.is_some(),
            superseded = superseded.is_some(),
            "connection bound"
        );
        BindOutcome {
            displaced,
            superseded,
        }
    }

    /// The player and room bound to `handle`.
    pub fn resolve(
        &self,
        handle: ConnectionId,
    ) -> Result<(PlayerId, RoomId), SessionError> {
        let maps = self.lock();
        maps.by_handle
            .get(&handle)
            .and_then(|p| maps.by_player.get(p))
            .map(|b| (b.player, b.room))
            .ok_or(SessionError::NotConnected(handle))
    }

    /// Removes the binding of `handle`, if any. Idempotent.
    pub fn unbind(&self, handle: ConnectionId) -> Option<Binding<S>> {
        let mut maps = self.lock();
        let player = maps.by_handle.remove(&handle)?;
        let binding = maps.by_player.remove(&player);
        if binding.is_some() {
            tracing::debug!(%player, %handle, "connection unbound");
        }
        binding
    }

    /// Removes whatever binding `player` has.
    pub fn unbind_player(&self, player: PlayerId) -> Option<Binding<S>> {
        let mut maps = self.lock();
        let binding = maps.by_player.remove(&player)?;
        maps.by_handle.remove(&binding.handle);
        Some(binding)
    }

    pub fn is_bound(&self, player: PlayerId) -> bool {
        self.lock().by_player.contains_key(&player)
    }

    pub fn sender_for(&self, player: PlayerId) -> Option<S> {
        self.lock().by_player.get(&player).map(|b| b.outbox.clone())
    }

    /// Outboxes of every player bound within `room`.
    pub fn senders_in_room(&self, room: RoomId) -> Vec<(PlayerId, S)> {
        self.lock()
            .by_player
            .values()
            .filter(|b| b.room == room)
            .map(|b| (b.player, b.outbox.clone()))
            .collect()
    }

    /// Number of live bindings.
    pub fn len(&self) -> usize {
        self.lock().by_player.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: Clone> Default for ConnectionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    const ROOM: RoomId = RoomId(1);

    #[test]
    fn test_bind_then_resolve() {
        let reg = ConnectionRegistry::new();
        let out = reg.bind(PlayerId(1), ROOM, h(10), "tab");

        assert!(out.displaced.is_none());
        assert!(out.superseded.is_none());
        assert_eq!(reg.resolve(h(10)).unwrap(), (PlayerId(1), ROOM));
        assert!(reg.is_bound(PlayerId(1)));
    }

    #[test]
    fn test_resolve_unbound_is_not_connected() {
        let reg: ConnectionRegistry<()> = ConnectionRegistry::new();
        assert!(matches!(
            reg.resolve(h(3)),
            Err(SessionError::NotConnected(id)) if id == h(3)
        ));
    }

    #[test]
    fn test_rebinding_handle_displaces_previous_player() {
        let reg = ConnectionRegistry::new();
        reg.bind(PlayerId(1), ROOM, h(10), "a");

        let out = reg.bind(PlayerId(2), ROOM, h(10), "a");

        let displaced = out.displaced.expect("player 1 displaced");
        assert_eq!(displaced.player, PlayerId(1));
        assert!(!reg.is_bound(PlayerId(1)));
        assert_eq!(reg.resolve(h(10)).unwrap().0, PlayerId(2));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_rebinding_player_supersedes_old_handle() {
        let reg = ConnectionRegistry::new();
        reg.bind(PlayerId(1), ROOM, h(10), "old tab");

        let out = reg.bind(PlayerId(1), ROOM, h(11), "new tab");

        let old = out.superseded.expect("old handle superseded");
        assert_eq!(old.handle, h(10));
        assert_eq!(old.outbox, "old tab");
        assert!(reg.resolve(h(10)).is_err());
        assert_eq!(reg.resolve(h(11)).unwrap().0, PlayerId(1));
        assert_eq!(reg.sender_for(PlayerId(1)), Some("new tab"));
    }

    #[test]
    fn test_same_pairing_rebind_is_quiet() {
        let reg = ConnectionRegistry::new();
        reg.bind(PlayerId(1), ROOM, h(10), ());
        let out = reg.bind(PlayerId(1), ROOM, h(10), ());
        assert!(out.displaced.is_none());
        assert!(out.superseded.is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_unbind_is_idempotent() {
        let reg = ConnectionRegistry::new();
        reg.bind(PlayerId(1), ROOM, h(10), ());

        assert!(reg.unbind(h(10)).is_some());
        assert!(reg.unbind(h(10)).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_stale_unbind_does_not_touch_newer_binding() {
        let reg = ConnectionRegistry::new();
        reg.bind(PlayerId(1), ROOM, h(10), ());
        reg.bind(PlayerId(1), ROOM, h(11), ());

        // the superseded socket closes late
        assert!(reg.unbind(h(10)).is_none());
        assert!(reg.is_bound(PlayerId(1)));
    }

    #[test]
    fn test_senders_in_room_filters_by_room() {
        let reg = ConnectionRegistry::new();
        reg.bind(PlayerId(1), RoomId(1), h(1), 1);
        reg.bind(PlayerId(2), RoomId(1), h(2), 2);
        reg.bind(PlayerId(3), RoomId(2), h(3), 3);

        let mut senders = reg.senders_in_room(RoomId(1));
        senders.sort();
        assert_eq!(senders, vec![(PlayerId(1), 1), (PlayerId(2), 2)]);
    }

    #[test]
    fn test_unbind_player_clears_both_maps() {
        let reg = ConnectionRegistry::new();
        reg.bind(PlayerId(1), ROOM, h(10), ());
        assert!(reg.unbind_player(PlayerId(1)).is_some());
        assert!(reg.resolve(h(10)).is_err());
    }
}
