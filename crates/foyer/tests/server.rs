//! Integration tests for the chat server: handshake, foyer, rooms, and
//! teardown over real loopback sockets.

use std::sync::Arc;
use std::time::Duration;

use foyer::prelude::*;
use foyer_auth::HashingConfig;
use foyer_room::RoomDirectory;
use foyer_transport::WebSocketTransport;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;

type Authority = TokenAuthority<InMemoryUserStore>;

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

// =========================================================================
// Helpers
// =========================================================================

struct Harness {
    addr: String,
    authority: Arc<Authority>,
    clients: Arc<ClientRegistry>,
    rooms: Arc<RoomDirectory>,
}

async fn authority() -> Arc<Authority> {
    let authority = Arc::new(TokenAuthority::new(
        InMemoryUserStore::new(),
        AuthConfig {
            token_ttl: Duration::from_secs(600),
            hashing: HashingConfig::minimal(),
        },
    ));
    for (user, name) in [("alice", "Alice"), ("bob", "Bob"), ("carol", "Carol")] {
        assert!(authority.register_user(user, "pw", name).await.unwrap());
    }
    authority
}

/// Starts a server on a random port.
async fn start_server_with(config: ServerConfig) -> Harness {
    let authority = authority().await;
    let server = FoyerServerBuilder::new()
        .config(config)
        .bind("127.0.0.1:0")
        .build(Arc::clone(&authority))
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let clients = server.clients();
    let rooms = server.rooms();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    Harness {
        addr,
        authority,
        clients,
        rooms,
    }
}

async fn start_server() -> Harness {
    start_server_with(ServerConfig::default()).await
}

/// A raw line-framed chat client.
struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    token: String,
}

impl Client {
    async fn connect(addr: &str, token: &str) -> Self {
        let stream = TcpStream::connect(addr).await.expect("should connect");
        let (read, writer) = stream.into_split();
        Self {
            reader: BufReader::new(read),
            writer,
            token: token.to_string(),
        }
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\n").as_bytes())
            .await
            .expect("send");
    }

    async fn send_with_token(&mut self, token: &str, body: Body) {
        let json = serde_json::to_string(&Envelope::request(token, body)).expect("encode");
        self.send_raw(&json).await;
    }

    async fn send(&mut self, body: Body) {
        let token = self.token.clone();
        self.send_with_token(&token, body).await;
    }

    async fn recv(&mut self) -> Envelope {
        let mut line = String::new();
        let n = tokio::time::timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
            .await
            .expect("timed out waiting for a message")
            .expect("read");
        assert!(n > 0, "connection closed while waiting for a message");
        serde_json::from_str(line.trim_end()).expect("decode")
    }

    /// Receives until `pred` matches, returning the match and everything
    /// skipped on the way.
    async fn recv_until(&mut self, pred: impl Fn(&Body) -> bool) -> (Body, Vec<Body>) {
        let mut skipped = Vec::new();
        loop {
            let body = self.recv().await.body;
            if pred(&body) {
                return (body, skipped);
            }
            skipped.push(body);
        }
    }

    /// Asserts the server closes the connection (after any pending output).
    async fn expect_closed(&mut self) {
        loop {
            let mut line = String::new();
            let n = tokio::time::timeout(RECV_TIMEOUT, self.reader.read_line(&mut line))
                .await
                .expect("server should close the connection")
                .unwrap_or(0);
            if n == 0 {
                return;
            }
        }
    }
}

/// Logs in at the authority, connects, and completes the handshake.
async fn login(h: &Harness, user: &str) -> Client {
    let token = h.authority.authenticate(user, "pw").await.expect("login");
    let mut client = Client::connect(&h.addr, &token.value).await;
    client.send(Body::Auth {}).await;
    match client.recv().await.body {
        Body::RoomList { .. } => client,
        other => panic!("expected ROOM_LIST, got {other:?}"),
    }
}

async fn join(client: &mut Client, room: &str) {
    client
        .send(Body::JoinRoom {
            room_name: room.into(),
        })
        .await;
    client
        .recv_until(|b| matches!(b, Body::RoomJoined { room_name } if room_name == room))
        .await;
}

fn error_code(body: &Body) -> Option<ErrorCode> {
    match body {
        Body::Error { code, .. } => Some(*code),
        _ => None,
    }
}

fn is_participants<'a>(expected: &'a [&'a str]) -> impl Fn(&Body) -> bool + 'a {
    move |body| matches!(body, Body::ParticipantList { participants } if participants == expected)
}

/// Polls the registry until it holds `n` clients or a second has passed.
async fn clients_settle_at(clients: &ClientRegistry, n: usize) -> bool {
    for _ in 0..100 {
        if clients.len().await == n {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_auth_success_receives_room_list() {
    let h = start_server().await;
    let token = h.authority.authenticate("alice", "pw").await.unwrap();
    let mut client = Client::connect(&h.addr, &token.value).await;

    client.send(Body::Auth {}).await;

    assert_eq!(
        client.recv().await.body,
        Body::RoomList {
            rooms: vec!["General".into()],
            member_counts: vec![0],
        }
    );
    assert!(clients_settle_at(&h.clients, 1).await);
}

#[tokio::test]
async fn test_auth_unknown_token_fails_and_closes() {
    let h = start_server().await;
    let mut client = Client::connect(&h.addr, "deadbeef").await;

    client.send(Body::Auth {}).await;

    assert_eq!(error_code(&client.recv().await.body), Some(ErrorCode::AuthFailed));
    client.expect_closed().await;
    assert!(h.clients.is_empty().await);
}

#[tokio::test]
async fn test_auth_empty_token_fails() {
    let h = start_server().await;
    let mut client = Client::connect(&h.addr, "").await;

    client.send(Body::Auth {}).await;

    assert_eq!(error_code(&client.recv().await.body), Some(ErrorCode::AuthFailed));
    client.expect_closed().await;
}

#[tokio::test]
async fn test_first_message_not_auth_is_protocol_violation() {
    let h = start_server().await;
    let token = h.authority.authenticate("alice", "pw").await.unwrap();
    let mut client = Client::connect(&h.addr, &token.value).await;

    client.send(Body::RefreshRooms {}).await;

    assert_eq!(
        error_code(&client.recv().await.body),
        Some(ErrorCode::ProtocolViolation)
    );
    client.expect_closed().await;
}

#[tokio::test]
async fn test_malformed_handshake_is_protocol_violation() {
    let h = start_server().await;
    let mut client = Client::connect(&h.addr, "").await;

    client.send_raw("hello?").await;

    assert_eq!(
        error_code(&client.recv().await.body),
        Some(ErrorCode::ProtocolViolation)
    );
    client.expect_closed().await;
}

// =========================================================================
// Foyer and rooms
// =========================================================================

#[tokio::test]
async fn test_lobby_scenario_both_see_participant_list() {
    let h = start_server().await;
    let mut alice = login(&h, "alice").await;
    let mut bob = login(&h, "bob").await;

    alice
        .send(Body::JoinRoom {
            room_name: "lobby".into(),
        })
        .await;
    let (body, _) = alice.recv_until(|b| error_code(b).is_some()).await;
    assert_eq!(error_code(&body), Some(ErrorCode::RoomNotFound));

    alice
        .send(Body::CreateRoom {
            room_name: "lobby".into(),
        })
        .await;
    let (body, _) = alice
        .recv_until(|b| matches!(b, Body::RoomJoined { .. }))
        .await;
    assert_eq!(
        body,
        Body::RoomJoined {
            room_name: "lobby".into()
        }
    );

    join(&mut bob, "lobby").await;

    bob.recv_until(is_participants(&["Alice", "Bob"])).await;
    alice.recv_until(is_participants(&["Alice", "Bob"])).await;
}

#[tokio::test]
async fn test_create_existing_room_is_room_exists() {
    let h = start_server().await;
    let mut alice = login(&h, "alice").await;

    alice
        .send(Body::CreateRoom {
            room_name: "General".into(),
        })
        .await;

    assert_eq!(error_code(&alice.recv().await.body), Some(ErrorCode::RoomExists));
    // Still in the foyer.
    alice.send(Body::RefreshRooms {}).await;
    assert!(matches!(alice.recv().await.body, Body::RoomList { .. }));
}

#[tokio::test]
async fn test_foyer_sees_member_counts_change() {
    let h = start_server().await;
    let mut watcher = login(&h, "carol").await;
    let mut alice = login(&h, "alice").await;

    join(&mut alice, "General").await;

    watcher
        .recv_until(|b| {
            matches!(b, Body::RoomList { rooms, member_counts }
                if rooms == &["General"] && member_counts == &[1])
        })
        .await;
}

#[tokio::test]
async fn test_chat_reaches_peers_but_not_sender() {
    let h = start_server().await;
    let mut alice = login(&h, "alice").await;
    let mut bob = login(&h, "bob").await;
    join(&mut alice, "General").await;
    join(&mut bob, "General").await;

    alice
        .send(Body::ChatMessage {
            message: "hi  there\nsecond line".into(),
        })
        .await;

    let (body, _) = bob
        .recv_until(|b| matches!(b, Body::Message { sender, .. } if sender == "Alice"))
        .await;
    assert_eq!(
        body,
        Body::Message {
            sender: "Alice".into(),
            message: "hi  there\nsecond line".into(),
        }
    );

    alice.send(Body::Leave {}).await;
    let (_, skipped) = alice
        .recv_until(|b| matches!(b, Body::LeftRoom {}))
        .await;
    assert!(
        !skipped
            .iter()
            .any(|b| matches!(b, Body::Message { sender, .. } if sender == "Alice")),
        "sender must not get an echo"
    );
}

#[tokio::test]
async fn test_late_joiner_gets_history_after_room_joined() {
    let h = start_server().await;
    let mut alice = login(&h, "alice").await;
    join(&mut alice, "General").await;
    alice
        .send(Body::ChatMessage {
            message: "first".into(),
        })
        .await;
    // Let the message land before Bob joins.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut bob = login(&h, "bob").await;
    bob.send(Body::JoinRoom {
        room_name: "General".into(),
    })
    .await;
    bob.recv_until(|b| matches!(b, Body::RoomJoined { .. })).await;

    let mut replay = Vec::new();
    for _ in 0..4 {
        match bob.recv().await.body {
            Body::Message { sender, message } => replay.push((sender, message)),
            other => panic!("expected history, got {other:?}"),
        }
    }
    assert_eq!(
        replay,
        vec![
            ("SERVER".to_string(), "=== Chat History ===".to_string()),
            ("SERVER".to_string(), "Alice joined the room".to_string()),
            ("Alice".to_string(), "first".to_string()),
            ("SERVER".to_string(), "=== End of History ===".to_string()),
        ]
    );
    alice
        .recv_until(|b| matches!(b, Body::Message { message, .. } if message == "Bob joined the room"))
        .await;
}

#[tokio::test]
async fn test_leave_returns_to_foyer_with_room_list() {
    let h = start_server().await;
    let mut alice = login(&h, "alice").await;
    let mut bob = login(&h, "bob").await;
    join(&mut alice, "General").await;
    join(&mut bob, "General").await;

    bob.send(Body::Leave {}).await;

    bob.recv_until(|b| matches!(b, Body::LeftRoom {})).await;
    assert!(matches!(bob.recv().await.body, Body::RoomList { .. }));
    alice
        .recv_until(|b| matches!(b, Body::Message { message, .. } if message == "Bob left the room"))
        .await;
    alice.recv_until(is_participants(&["Alice"])).await;
}

#[tokio::test]
async fn test_message_invalid_in_state_keeps_connection_open() {
    let h = start_server().await;
    let mut alice = login(&h, "alice").await;

    alice
        .send(Body::ChatMessage {
            message: "anyone?".into(),
        })
        .await;
    assert_eq!(
        error_code(&alice.recv().await.body),
        Some(ErrorCode::ProtocolViolation)
    );

    alice.send_raw("{not json").await;
    assert_eq!(
        error_code(&alice.recv().await.body),
        Some(ErrorCode::ProtocolViolation)
    );

    let shout = serde_json::json!({
        "header": { "timestamp": "2024-01-01T00:00:00Z", "token": alice.token },
        "body": { "type": "SHOUT", "data": { "message": "HELLO" } },
    });
    alice.send_raw(&shout.to_string()).await;
    assert_eq!(
        error_code(&alice.recv().await.body),
        Some(ErrorCode::ProtocolViolation)
    );

    alice.send(Body::RefreshRooms {}).await;
    assert!(matches!(alice.recv().await.body, Body::RoomList { .. }));
}

#[tokio::test]
async fn test_auto_delete_removes_room_when_last_member_leaves() {
    let h = start_server_with(ServerConfig {
        room: RoomConfig {
            auto_delete_empty_rooms: true,
            ..RoomConfig::default()
        },
        ..ServerConfig::default()
    })
    .await;
    let mut alice = login(&h, "alice").await;
    alice
        .send(Body::CreateRoom {
            room_name: "pop-up".into(),
        })
        .await;
    alice
        .recv_until(|b| matches!(b, Body::RoomJoined { .. }))
        .await;

    alice.send(Body::Leave {}).await;
    alice.recv_until(|b| matches!(b, Body::LeftRoom {})).await;

    assert_eq!(
        alice.recv().await.body,
        Body::RoomList {
            rooms: vec!["General".into()],
            member_counts: vec![0],
        }
    );
}

// =========================================================================
// Token checks
// =========================================================================

#[tokio::test]
async fn test_token_mismatch_disconnects() {
    let h = start_server().await;
    let mut alice = login(&h, "alice").await;
    let bob_token = h.authority.authenticate("bob", "pw").await.unwrap();

    alice
        .send_with_token(&bob_token.value, Body::RefreshRooms {})
        .await;

    assert_eq!(error_code(&alice.recv().await.body), Some(ErrorCode::AuthFailed));
    alice.expect_closed().await;
    assert!(clients_settle_at(&h.clients, 0).await);
}

#[tokio::test]
async fn test_revoked_token_trusted_until_cache_expires() {
    let h = start_server_with(ServerConfig {
        cache_ttl: Duration::from_millis(200),
        ..ServerConfig::default()
    })
    .await;
    let mut alice = login(&h, "alice").await;
    h.authority.revoke(&alice.token).await;

    // Still inside the cache window.
    alice.send(Body::RefreshRooms {}).await;
    assert!(matches!(alice.recv().await.body, Body::RoomList { .. }));

    tokio::time::sleep(Duration::from_millis(300)).await;
    alice.send(Body::RefreshRooms {}).await;

    assert_eq!(error_code(&alice.recv().await.body), Some(ErrorCode::AuthFailed));
    alice.expect_closed().await;
}

// =========================================================================
// Teardown
// =========================================================================

#[tokio::test]
async fn test_quit_acknowledged_and_closed() {
    let h = start_server().await;
    let mut alice = login(&h, "alice").await;
    join(&mut alice, "General").await;

    alice.send(Body::Quit {}).await;

    let (body, _) = alice.recv_until(|b| error_code(b).is_some()).await;
    assert_eq!(
        body,
        Body::Error {
            message: "Disconnected".into(),
            code: ErrorCode::Disconnected,
        }
    );
    alice.expect_closed().await;
    assert!(clients_settle_at(&h.clients, 0).await);
    let general = h.rooms.get("General").await.unwrap();
    assert_eq!(general.client_count().await, 0);
}

#[tokio::test]
async fn test_abrupt_disconnect_cleans_up_only_that_room() {
    let h = start_server().await;
    let mut alice = login(&h, "alice").await;
    let mut bob = login(&h, "bob").await;
    let mut carol = login(&h, "carol").await;
    join(&mut alice, "General").await;
    join(&mut bob, "General").await;
    carol
        .send(Body::CreateRoom {
            room_name: "side".into(),
        })
        .await;
    carol
        .recv_until(|b| matches!(b, Body::RoomJoined { .. }))
        .await;

    drop(alice);

    bob.recv_until(|b| matches!(b, Body::Message { message, .. } if message == "Alice left the room"))
        .await;
    bob.recv_until(is_participants(&["Bob"])).await;
    assert!(clients_settle_at(&h.clients, 2).await);

    let side = h.rooms.get("side").await.unwrap();
    assert_eq!(side.get_client_names().await, vec!["Carol"]);
    let general = h.rooms.get("General").await.unwrap();
    assert_eq!(general.get_client_names().await, vec!["Bob"]);
}

// =========================================================================
// WebSocket transport
// =========================================================================

#[tokio::test]
async fn test_websocket_transport_handshake_and_room_list() {
    let authority = authority().await;
    let transport = WebSocketTransport::bind("127.0.0.1:0").await.unwrap();
    let server = FoyerServerBuilder::new()
        .default_rooms(["General", "Random"])
        .build_with_transport(transport, Arc::clone(&authority))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let token = authority.authenticate("alice", "pw").await.unwrap();
    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    let hello = serde_json::to_vec(&Envelope::request(token.value, Body::Auth {})).unwrap();
    ws.send(Message::Binary(hello.into())).await.unwrap();

    let reply = tokio::time::timeout(RECV_TIMEOUT, ws.next())
        .await
        .expect("timed out")
        .unwrap()
        .unwrap();
    let envelope: Envelope = serde_json::from_slice(&reply.into_data()).unwrap();
    assert_eq!(
        envelope.body,
        Body::RoomList {
            rooms: vec!["General".into(), "Random".into()],
            member_counts: vec![0, 0],
        }
    );
}
