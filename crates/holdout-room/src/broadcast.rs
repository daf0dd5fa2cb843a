//! Delivery of room events to connected players.
//!
//! Room actors never touch sockets. They hand events to a [`Broadcast`]
//! implementation, which for the server is the connection registry: each
//! bound player has an unbounded outbox drained by their connection's
//! writer task.

use holdout_protocol::{PlayerId, RoomEvent, RoomId, ServerFrame};
use holdout_session::ConnectionRegistry;
use tokio::sync::mpsc;

/// Outbound sink of one connection.
pub type Outbox = mpsc::UnboundedSender<ServerFrame>;

/// Where room events go.
///
/// Sends are fire-and-forget: a player without a live connection simply
/// misses the event and catches up through `ResumeSession`.
pub trait Broadcast: Send + Sync + 'static {
    /// Every player bound within `room`.
    fn to_room(&self, room: RoomId, event: RoomEvent);

    /// Every player bound within `room` except `except`.
    fn to_room_except(&self, room: RoomId, except: PlayerId, event: RoomEvent);

    /// One player's connection.
    fn to_player(&self, player: PlayerId, event: RoomEvent);

    /// Whether `player` currently has a bound connection.
    fn is_connected(&self, player: PlayerId) -> bool;

    /// Unbinds `player`'s connection. The socket stays open.
    fn disconnect(&self, player: PlayerId);
}

impl Broadcast for ConnectionRegistry<Outbox> {
    fn to_room(&self, room: RoomId, event: RoomEvent) {
        for (_, outbox) in self.senders_in_room(room) {
            // a closed outbox means the writer is gone; drop silently
            let _ = outbox.send(ServerFrame::Event(event.clone()));
        }
    }

    fn to_room_except(&self, room: RoomId, except: PlayerId, event: RoomEvent) {
        for (player, outbox) in self.senders_in_room(room) {
            if player != except {
                let _ = outbox.send(ServerFrame::Event(event.clone()));
            }
        }
    }

    fn to_player(&self, player: PlayerId, event: RoomEvent) {
        if let Some(outbox) = self.sender_for(player) {
            let _ = outbox.send(ServerFrame::Event(event));
        }
    }

    fn is_connected(&self, player: PlayerId) -> bool {
        self.is_bound(player)
    }

    fn disconnect(&self, player: PlayerId) {
        if self.unbind_player(player).is_some() {
            tracing::debug!(%player, "player connection unbound");
        }
    }
}
