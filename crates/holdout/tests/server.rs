//! Integration tests for the Holdout server over real WebSocket
//! connections.

use std::collections::VecDeque;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use holdout::prelude::*;
use holdout_protocol::{ErrorBody, ScenarioId};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns the address.
async fn start_server() -> String {
    let server = HoldoutServer::<InMemoryStore, OpaqueTokenAuthenticator, holdout_protocol::JsonCodec>::builder()
        .bind("127.0.0.1:0")
        .build(InMemoryStore::new(), OpaqueTokenAuthenticator::new())
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_frame(ws: &mut ClientWs, frame: &ClientFrame) {
    let text = serde_json::to_string(frame).expect("encode");
    ws.send(Message::text(text)).await.expect("send");
}

async fn recv_frame(ws: &mut ClientWs) -> ServerFrame {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("recv");
    serde_json::from_slice(&msg.into_data()).expect("decode")
}

/// A connected, authenticated client. Events that arrive while waiting
/// for an ack are kept for later inspection.
struct Client {
    ws: ClientWs,
    user: UserId,
    next_id: u64,
    events: VecDeque<RoomEvent>,
}

impl Client {
    async fn connect(addr: &str, token: &str) -> Self {
        let mut ws = connect(addr).await;
        send_frame(
            &mut ws,
            &ClientFrame::Hello {
                version: PROTOCOL_VERSION,
                token: token.into(),
            },
        )
        .await;
        let user = match recv_frame(&mut ws).await {
            ServerFrame::Welcome { user_id, .. } => user_id,
            other => panic!("expected Welcome, got {other:?}"),
        };
        Self {
            ws,
            user,
            next_id: 1,
            events: VecDeque::new(),
        }
    }

    async fn request(&mut self, action: Action) -> Ack {
        let id = self.next_id;
        self.next_id += 1;
        send_frame(&mut self.ws, &ClientFrame::Request(holdout_protocol::Request { id, action }))
            .await;
        loop {
            match recv_frame(&mut self.ws).await {
                ServerFrame::Ack(ack) if ack.id == id => return ack,
                ServerFrame::Event(event) => self.events.push_back(event),
                other => panic!("unexpected frame while waiting for ack {id}: {other:?}"),
            }
        }
    }

    async fn ok(&mut self, action: Action) -> Option<Reply> {
        let ack = self.request(action).await;
        assert!(ack.ok, "request failed: {:?}", ack.error);
        ack.data
    }

    async fn err(&mut self, action: Action) -> ErrorBody {
        let ack = self.request(action).await;
        assert!(!ack.ok, "request unexpectedly succeeded: {:?}", ack.data);
        ack.error.expect("failed ack carries an error")
    }

    /// Returns the first buffered or incoming event matching `pred`.
    async fn event(&mut self, pred: impl Fn(&RoomEvent) -> bool) -> RoomEvent {
        if let Some(pos) = self.events.iter().position(&pred) {
            return self.events.remove(pos).expect("position is in range");
        }
        loop {
            match recv_frame(&mut self.ws).await {
                ServerFrame::Event(event) if pred(&event) => return event,
                ServerFrame::Event(event) => self.events.push_back(event),
                other => panic!("unexpected frame while waiting for event: {other:?}"),
            }
        }
    }
}

/// Host creates a room; `guests` more players join it.
async fn lobby(addr: &str, guests: usize) -> (Client, Vec<Client>, String) {
    let mut host = Client::connect(addr, "host-token").await;
    let created = host
        .ok(Action::CreateRoom {
            capacity: 8,
            variant: Default::default(),
            display_name: "Host".into(),
        })
        .await;
    let room_code = match created {
        Some(Reply::RoomCreated { room_code, .. }) => room_code,
        other => panic!("expected RoomCreated, got {other:?}"),
    };

    let mut others = Vec::new();
    for i in 0..guests {
        let mut guest = Client::connect(addr, &format!("guest-{i}")).await;
        let joined = guest
            .ok(Action::JoinRoom {
                code: room_code.clone(),
                display_name: format!("Guest {i}"),
            })
            .await;
        assert!(matches!(joined, Some(Reply::Joined { .. })), "got {joined:?}");
        others.push(guest);
    }
    (host, others, room_code)
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_handshake_success() {
    let addr = start_server().await;
    let a = Client::connect(&addr, "alpha").await;
    let b = Client::connect(&addr, "bravo").await;
    let a_again = Client::connect(&addr, "alpha").await;

    assert_eq!(a.user, a_again.user);
    assert_ne!(a.user, b.user);
}

#[tokio::test]
async fn test_handshake_version_mismatch() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    send_frame(
        &mut ws,
        &ClientFrame::Hello {
            version: 999,
            token: "t".into(),
        },
    )
    .await;

    match recv_frame(&mut ws).await {
        ServerFrame::Error(ErrorBody { code, .. }) => assert_eq!(code, "VERSION_MISMATCH"),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_auth_failure() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    send_frame(
        &mut ws,
        &ClientFrame::Hello {
            version: PROTOCOL_VERSION,
            token: "has spaces".into(),
        },
    )
    .await;

    match recv_frame(&mut ws).await {
        ServerFrame::Error(ErrorBody { code, .. }) => assert_eq!(code, "UNAUTHORIZED"),
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_request_before_hello_is_rejected() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;
    send_frame(
        &mut ws,
        &ClientFrame::Request(holdout_protocol::Request {
            id: 1,
            action: Action::Heartbeat,
        }),
    )
    .await;

    match recv_frame(&mut ws).await {
        ServerFrame::Error(ErrorBody { code, .. }) => assert_eq!(code, "BAD_HANDSHAKE"),
        other => panic!("expected Error, got {other:?}"),
    }
}

// =========================================================================
// Requests
// =========================================================================

#[tokio::test]
async fn test_heartbeat_acks_empty() {
    let addr = start_server().await;
    let mut client = Client::connect(&addr, "beat").await;
    let reply = client.ok(Action::Heartbeat).await;
    assert_eq!(reply, Some(Reply::empty()));
}

#[tokio::test]
async fn test_unbound_connection_gets_not_connected() {
    let addr = start_server().await;
    let mut client = Client::connect(&addr, "lonely").await;
    let error = client.err(Action::StartGame).await;
    assert_eq!(error.code, "NOT_CONNECTED");
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection() {
    let addr = start_server().await;
    let mut client = Client::connect(&addr, "sloppy").await;

    client
        .ws
        .send(Message::text(r#"{"type":"Request","id":1,"action":{"type":"Nope"}}"#))
        .await
        .unwrap();
    match recv_frame(&mut client.ws).await {
        ServerFrame::Error(ErrorBody { code, .. }) => assert_eq!(code, "BAD_REQUEST"),
        other => panic!("expected Error, got {other:?}"),
    }

    assert!(client.ok(Action::Heartbeat).await.is_some());
}

#[tokio::test]
async fn test_join_unknown_code() {
    let addr = start_server().await;
    let mut client = Client::connect(&addr, "lost").await;
    let error = client
        .err(Action::JoinRoom {
            code: "NOPE00".into(),
            display_name: "Lost".into(),
        })
        .await;
    assert_eq!(error.code, "ROOM_NOT_FOUND");
}

#[tokio::test]
async fn test_start_and_vote_over_websocket() {
    let addr = start_server().await;
    let (mut host, mut guests, _) = lobby(&addr, 3).await;

    let error = guests[0].err(Action::StartGame).await;
    assert_eq!(error.code, "NOT_HOST");

    host.ok(Action::StartGame).await;

    let candidates = match host
        .event(|e| matches!(e, RoomEvent::ScenarioCandidates { .. }))
        .await
    {
        RoomEvent::ScenarioCandidates { kind, candidates } => {
            assert_eq!(kind, BallotKind::ScenarioHazard);
            candidates
        }
        _ => unreachable!(),
    };
    assert!(!candidates.is_empty());
    let pick: ScenarioId = candidates[0].id;

    for guest in &mut guests {
        guest
            .event(|e| matches!(e, RoomEvent::GameStarted { .. }))
            .await;
    }

    let wrong = host
        .err(Action::CastScenarioVote {
            kind: BallotKind::Elimination,
            candidate: pick,
        })
        .await;
    assert_eq!(wrong.code, "INVALID_REQUEST");

    host.ok(Action::CastScenarioVote {
        kind: BallotKind::ScenarioHazard,
        candidate: pick,
    })
    .await;
    for guest in &mut guests {
        guest
            .ok(Action::CastScenarioVote {
                kind: BallotKind::ScenarioHazard,
                candidate: pick,
            })
            .await;
    }

    for client in std::iter::once(&mut host).chain(guests.iter_mut()) {
        match client
            .event(|e| matches!(e, RoomEvent::ScenarioWinner { .. }))
            .await
        {
            RoomEvent::ScenarioWinner { scenario, .. } => assert_eq!(scenario.id, pick),
            _ => unreachable!(),
        }
    }
}

#[tokio::test]
async fn test_resume_on_new_connection_replaces_old() {
    let addr = start_server().await;
    let (_host, mut guests, code) = lobby(&addr, 1).await;
    let mut old = guests.pop().unwrap();

    let mut fresh = Client::connect(&addr, "guest-0").await;
    let reply = fresh.ok(Action::ResumeSession { code }).await;
    match reply {
        Some(Reply::Resumed { room, .. }) => assert_eq!(room.phase, Phase::Waiting),
        other => panic!("expected Resumed, got {other:?}"),
    }

    old.event(|e| matches!(e, RoomEvent::SessionReplaced)).await;
    let error = old.err(Action::StartGame).await;
    assert_eq!(error.code, "NOT_CONNECTED");

    // the new connection acts for the same player
    let error = fresh.err(Action::StartGame).await;
    assert_eq!(error.code, "NOT_HOST");
}

#[tokio::test]
async fn test_disconnect_publishes_presence() {
    let addr = start_server().await;
    let (mut host, mut guests, _) = lobby(&addr, 1).await;
    let guest = guests.pop().unwrap();

    drop(guest);

    host.event(|e| matches!(e, RoomEvent::PlayerPresence { online: false, .. }))
        .await;
}

#[tokio::test]
async fn test_kick_over_websocket() {
    let addr = start_server().await;
    let (mut host, mut guests, code) = lobby(&addr, 2).await;

    // learn the guest's player id from the room snapshot
    let mut probe = Client::connect(&addr, "guest-1").await;
    let reply = probe.ok(Action::ResumeSession { code }).await;
    let target = match reply {
        Some(Reply::Resumed { player_id, .. }) => player_id,
        other => panic!("expected Resumed, got {other:?}"),
    };

    host.ok(Action::KickPlayer { target }).await;

    probe.event(|e| matches!(e, RoomEvent::Kicked { .. })).await;
    let error = probe.err(Action::StartGame).await;
    assert_eq!(error.code, "NOT_CONNECTED");

    host.event(|e| matches!(e, RoomEvent::PlayerRemoved { player_id } if *player_id == target))
        .await;
    guests[0]
        .event(|e| matches!(e, RoomEvent::RoomUpdated { players, .. } if players.len() == 2))
        .await;
}
