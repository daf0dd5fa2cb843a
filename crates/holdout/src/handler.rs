//! Per-connection handler: handshake, auth, and request routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `Hello` → validate version, authenticate token
//!   2. Send `Welcome` → start the writer task draining this connection's
//!      outbox
//!   3. Loop: receive requests → dispatch → push an `Ack` to the outbox
//!
//! Acks and room events share the outbox, so a client sees them in the
//! order the server produced them.

use std::sync::Arc;

use chrono::Utc;
use holdout_protocol::{
    Action, Ack, BallotKind, ClientFrame, Codec, ErrorBody, PROTOCOL_VERSION,
    PlayerId, ProtocolError, Reply, RoomEvent, RoomId, ServerFrame, UserId,
};
use holdout_room::{GameError, Outbox};
use holdout_session::Authenticator;
use holdout_store::Store;
use holdout_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;

use crate::HoldoutError;
use crate::server::ServerState;

/// Drop guard that unbinds the connection when the handler exits and lets
/// the room publish the player's presence change.
///
/// Since `Drop` is synchronous, the room notification is a spawned task.
struct ConnectionGuard<S: Store, A: Authenticator, C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<S, A, C>>,
}

impl<S: Store, A: Authenticator, C: Codec> Drop for ConnectionGuard<S, A, C> {
    fn drop(&mut self) {
        let Some(binding) = self.state.registry.unbind(self.conn_id) else {
            return;
        };
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            sync_presence(&state, binding.room, binding.player).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, A, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, A, C>>,
) -> Result<(), HoldoutError>
where
    S: Store,
    A: Authenticator,
    C: Codec,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = ?conn.peer_addr(), "handling new connection");

    // --- Step 1: Handshake ---
    let user = perform_handshake(&conn, &state).await?;
    tracing::info!(%conn_id, %user, "user authenticated");

    // --- Step 2: Writer ---
    let (outbox, mut outbound) = mpsc::unbounded_channel::<ServerFrame>();
    let writer = {
        let conn = Arc::clone(&conn);
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(frame) = outbound.recv().await {
                let bytes = match state.codec.encode(&frame) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(%conn_id, error = %e, "failed to encode frame");
                        continue;
                    }
                };
                if let Err(e) = conn.send(&bytes).await {
                    tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
                    break;
                }
            }
        })
    };

    let guard = ConnectionGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    // --- Step 3: Request loop ---
    loop {
        let data = match tokio::time::timeout(state.session.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection idle, closing");
                break;
            }
        };

        let request = match state.codec.decode::<ClientFrame>(&data) {
            Ok(ClientFrame::Request(request)) => request,
            Ok(ClientFrame::Hello { .. }) => {
                let _ = outbox.send(ServerFrame::Error(ErrorBody {
                    code: "ALREADY_AUTHENTICATED".into(),
                    message: "Hello was already accepted on this connection".into(),
                }));
                continue;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode frame");
                let _ = outbox.send(ServerFrame::Error(HoldoutError::from(e).to_body()));
                continue;
            }
        };

        let ack = match dispatch(&state, conn_id, user, &outbox, request.action).await {
            Ok(reply) => Ack::success(request.id, reply),
            Err(e) => {
                tracing::debug!(%conn_id, request_id = request.id, code = e.code(), error = %e, "request failed");
                Ack::failure(request.id, e.to_body())
            }
        };
        let _ = outbox.send(ServerFrame::Ack(ack));
    }

    // the writer ends once every outbox clone is gone; give it the chance
    // to flush what is queued before closing
    drop(outbox);
    drop(guard);
    let _ = writer.await;
    let _ = conn.close().await;
    Ok(())
}

/// Receives `Hello`, checks version and token, and sends `Welcome`.
async fn perform_handshake<S, A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<S, A, C>,
) -> Result<UserId, HoldoutError>
where
    S: Store,
    A: Authenticator,
    C: Codec,
{
    let data = match tokio::time::timeout(state.session.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before Hello".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            reject(conn, &state.codec, "HANDSHAKE_TIMEOUT", "no Hello received").await;
            return Err(ProtocolError::InvalidMessage("handshake timed out".into()).into());
        }
    };

    let (version, token) = match state.codec.decode::<ClientFrame>(&data) {
        Ok(ClientFrame::Hello { version, token }) => (version, token),
        Ok(_) | Err(_) => {
            reject(conn, &state.codec, "BAD_HANDSHAKE", "first frame must be Hello").await;
            return Err(ProtocolError::InvalidMessage("first frame must be Hello".into()).into());
        }
    };

    if version != PROTOCOL_VERSION {
        let message = format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}");
        reject(conn, &state.codec, "VERSION_MISMATCH", &message).await;
        return Err(ProtocolError::InvalidMessage(message).into());
    }

    let user = match state.auth.authenticate(&token).await {
        Ok(user) => user,
        Err(e) => {
            reject(conn, &state.codec, "UNAUTHORIZED", &e.to_string()).await;
            return Err(e.into());
        }
    };

    let welcome = ServerFrame::Welcome {
        user_id: user,
        server_time: Utc::now(),
    };
    conn.send(&state.codec.encode(&welcome)?).await?;
    Ok(user)
}

/// Sends an `Error` frame and closes. Failures are ignored: the peer is
/// being dropped anyway.
async fn reject(conn: &WebSocketConnection, codec: &impl Codec, code: &str, message: &str) {
    let frame = ServerFrame::Error(ErrorBody {
        code: code.to_string(),
        message: message.to_string(),
    });
    if let Ok(bytes) = codec.encode(&frame) {
        let _ = conn.send(&bytes).await;
    }
    let _ = conn.close().await;
}

/// Runs one action on behalf of `user` and produces the ack payload.
async fn dispatch<S, A, C>(
    state: &ServerState<S, A, C>,
    conn_id: ConnectionId,
    user: UserId,
    outbox: &Outbox,
    action: Action,
) -> Result<Reply, HoldoutError>
where
    S: Store,
    A: Authenticator,
    C: Codec,
{
    match action {
        Action::Heartbeat => Ok(Reply::empty()),

        Action::CreateRoom {
            capacity,
            variant,
            display_name,
        } => {
            let joined = state
                .rooms
                .create_room(user, capacity, variant, &display_name)
                .await?;
            bind(state, conn_id, outbox, joined.player_id, joined.room_id).await;
            Ok(Reply::RoomCreated {
                room_code: joined.room_code,
                player_id: joined.player_id,
            })
        }

        Action::JoinRoom { code, display_name } => {
            let joined = state.rooms.join_room(&code, user, &display_name).await?;
            bind(state, conn_id, outbox, joined.player_id, joined.room_id).await;
            Ok(Reply::Joined {
                room_id: joined.room_id,
                player_id: joined.player_id,
                room: joined.room,
            })
        }

        Action::ResumeSession { code } => {
            let resumed = state.rooms.resume(&code, user).await?;
            bind(state, conn_id, outbox, resumed.player_id, resumed.room.id).await;
            Ok(Reply::Resumed {
                room: resumed.room,
                players: resumed.players,
                player_id: resumed.player_id,
                hand: resumed.hand,
            })
        }

        action => {
            let (player, room) = state.registry.resolve(conn_id)?;
            let handle = state.rooms.handle(room).await?;
            match action {
                Action::StartGame => handle.start(player).await?,
                Action::CastScenarioVote { kind, candidate } => {
                    if !kind.is_scenario() {
                        return Err(GameError::InvalidRequest(
                            "use CastEliminationVote for elimination".into(),
                        )
                        .into());
                    }
                    handle.cast_vote(player, kind, candidate.0).await?;
                }
                Action::CastEliminationVote { target } => {
                    handle
                        .cast_vote(player, BallotKind::Elimination, target.0)
                        .await?;
                }
                Action::RevealCard { assignment } => {
                    handle.reveal_card(player, assignment).await?;
                }
                Action::KickPlayer { target } => handle.kick(player, target).await?,
                Action::OpenEliminationVote => handle.open_elimination(player).await?,
                Action::Heartbeat
                | Action::CreateRoom { .. }
                | Action::JoinRoom { .. }
                | Action::ResumeSession { .. } => {}
            }
            Ok(Reply::empty())
        }
    }
}

/// Binds the connection to `player` and settles whoever it evicted.
async fn bind<S, A, C>(
    state: &ServerState<S, A, C>,
    conn_id: ConnectionId,
    outbox: &Outbox,
    player: PlayerId,
    room: RoomId,
) where
    S: Store,
    A: Authenticator,
    C: Codec,
{
    let outcome = state.registry.bind(player, room, conn_id, outbox.clone());

    if let Some(old) = outcome.superseded {
        tracing::info!(%player, old = %old.handle, new = %conn_id, "session replaced");
        let _ = old
            .outbox
            .send(ServerFrame::Event(RoomEvent::SessionReplaced));
    }
    if let Some(prev) = outcome.displaced {
        sync_presence(state, prev.room, prev.player).await;
    }
    sync_presence(state, room, player).await;
}

async fn sync_presence<S, A, C>(state: &ServerState<S, A, C>, room: RoomId, player: PlayerId)
where
    S: Store,
    A: Authenticator,
    C: Codec,
{
    let result = match state.rooms.handle(room).await {
        Ok(handle) => handle.sync_presence(player).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        tracing::debug!(room_id = %room, %player, error = %e, "presence sync skipped");
    }
}
