//! Per-connection session coordinator: handshake, foyer, rooms, teardown.
//!
//! Each accepted connection gets its own Tokio task running this handler,
//! plus a writer task that drains the connection's outbound queue. The
//! flow is:
//!   1. Receive `AUTH` → resolve the token → register the session
//!   2. Foyer: list, create, or join rooms
//!   3. Room: chat until `LEAVE` (back to 2) or `QUIT`
//!   4. Teardown: leave the room, unregister, flush the queue, close
//!
//! Nothing here writes to a socket directly. Every outbound message is an
//! encoded frame pushed into the connection's queue, the same queue rooms
//! broadcast into, so a client sees its own replies and room traffic in
//! one consistent order.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use foyer_auth::{Authenticator, UserInfo};
use foyer_protocol::{Body, Codec, Envelope, ErrorCode};
use foyer_room::{server_notice, ChatRoom, ClientSender, Frame, Member};
use foyer_transport::{Connection, ConnectionId, TransportError};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::{ClientSession, FoyerError};

/// How long teardown waits for the writer to flush queued frames.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

const INVALID_TOKEN: &str = "Invalid or expired token";

/// What the reader loop does after a message has been handled.
enum Flow {
    Continue,
    Disconnect,
}

/// Drop guard that unregisters a session if its handler unwinds.
///
/// Normal exits disarm it and clean up inline. Since `Drop` is
/// synchronous, a panic path spawns the async cleanup instead.
struct SessionGuard<A: Authenticator> {
    conn_id: ConnectionId,
    state: Arc<ServerState<A>>,
    armed: bool,
}

impl<A: Authenticator> SessionGuard<A> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<A: Authenticator> Drop for SessionGuard<A> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            depart(&state, conn_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C, A>(
    conn: C,
    state: Arc<ServerState<A>>,
) -> Result<(), FoyerError>
where
    C: Connection,
    A: Authenticator,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let address = conn.peer_addr();
    tracing::debug!(%conn_id, %address, "handling new connection");

    let (outbox, rx) = mpsc::unbounded_channel();
    let mut writer = tokio::spawn(write_frames(Arc::clone(&conn), rx));

    let result = match perform_handshake(&*conn, &state, &outbox).await {
        Ok((identity, token)) => {
            tracing::info!(
                %conn_id,
                %address,
                user = %identity.username,
                name = %identity.display_name,
                "client authenticated"
            );
            state
                .clients
                .register(ClientSession {
                    connection_id: conn_id,
                    username: identity.username.clone(),
                    display_name: identity.display_name.clone(),
                    address,
                    token: token.clone(),
                    current_room: None,
                    outbox: outbox.clone(),
                })
                .await;
            let guard = SessionGuard {
                conn_id,
                state: Arc::clone(&state),
                armed: true,
            };

            let mut session = SessionCoordinator {
                state: Arc::clone(&state),
                conn_id,
                address,
                identity,
                token,
                outbox: outbox.clone(),
                room: None,
            };
            let result = session.run(&*conn).await;

            drop(session);
            depart(&state, conn_id).await;
            guard.disarm();
            result
        }
        Err(e) => Err(e),
    };

    // The writer stops once every sender is gone: ours, the registry's,
    // and the room's.
    drop(outbox);
    if tokio::time::timeout(FLUSH_TIMEOUT, &mut writer).await.is_err() {
        tracing::debug!(%conn_id, "outbound queue not drained in time");
        writer.abort();
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    tracing::debug!(%conn_id, "connection closed");
    result
}

/// Drains one connection's outbound queue onto its socket.
async fn write_frames<C: Connection>(conn: Arc<C>, mut rx: mpsc::UnboundedReceiver<Frame>) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "write failed");
            break;
        }
    }
}

/// Waits for `AUTH` and resolves its token to an identity.
///
/// Any failure has already been reported to the client by the time this
/// returns `Err`.
async fn perform_handshake<C, A>(
    conn: &C,
    state: &ServerState<A>,
    outbox: &ClientSender,
) -> Result<(UserInfo, String), FoyerError>
where
    C: Connection,
    A: Authenticator,
{
    let data = conn.recv().await?.ok_or_else(|| {
        TransportError::ConnectionClosed("connection closed before AUTH".into())
    })?;

    let token = match state.codec.decode::<Envelope>(&data) {
        Ok(Envelope {
            header,
            body: Body::Auth {},
        }) => header.token,
        Ok(envelope) => {
            let err = FoyerError::ProtocolViolation(format!(
                "expected AUTH, got {}",
                envelope.body.kind()
            ));
            reject(state, outbox, &err)?;
            return Err(err);
        }
        Err(e) => {
            let err = FoyerError::from(e);
            reject(state, outbox, &err)?;
            return Err(err);
        }
    };

    let identity = if token.is_empty() {
        None
    } else {
        match state.cache.authenticator().user_info(&token).await {
            Ok(identity) => identity,
            Err(e) => {
                tracing::warn!(error = %e, "token lookup failed");
                None
            }
        }
    };

    let Some(identity) = identity else {
        tracing::warn!(conn_id = %conn.id(), addr = %conn.peer_addr(), "authentication rejected");
        let err = FoyerError::AuthenticationFailure(INVALID_TOKEN.into());
        reject(state, outbox, &err)?;
        return Err(err);
    };

    state.cache.record(&token).await;
    Ok((identity, token))
}

/// One authenticated client's side of the conversation.
struct SessionCoordinator<A: Authenticator> {
    state: Arc<ServerState<A>>,
    conn_id: ConnectionId,
    address: SocketAddr,
    identity: UserInfo,
    token: String,
    outbox: ClientSender,
    /// `None` while the client is in the foyer.
    room: Option<Arc<ChatRoom>>,
}

impl<A: Authenticator> SessionCoordinator<A> {
    /// Reads and handles messages until the client leaves or breaks the
    /// protocol badly enough to be dropped.
    async fn run<C: Connection>(&mut self, conn: &C) -> Result<(), FoyerError> {
        self.send_room_list().await?;

        loop {
            let data = match conn.recv().await {
                Ok(Some(data)) => data,
                Ok(None) => {
                    tracing::info!(conn_id = %self.conn_id, "client closed the connection");
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!(conn_id = %self.conn_id, error = %e, "recv error");
                    return Err(e.into());
                }
            };

            let envelope: Envelope = match self.state.codec.decode(&data) {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::debug!(conn_id = %self.conn_id, error = %e, "failed to decode envelope");
                    self.reject(&e.into())?;
                    continue;
                }
            };

            if !self.token_is_current(&envelope.header.token).await {
                tracing::warn!(
                    conn_id = %self.conn_id,
                    user = %self.identity.username,
                    "token rejected mid-session"
                );
                let err = FoyerError::AuthenticationFailure(INVALID_TOKEN.into());
                self.reject(&err)?;
                return Err(err);
            }

            match self.dispatch(envelope.body).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Disconnect) => return Ok(()),
                Err(e @ FoyerError::ConnectionLost(_)) => return Err(e),
                Err(e) => {
                    tracing::debug!(conn_id = %self.conn_id, error = %e, "request refused");
                    self.reject(&e)?;
                }
            }
        }
    }

    async fn token_is_current(&self, token: &str) -> bool {
        token == self.token && self.state.cache.is_trusted(token).await
    }

    async fn dispatch(&mut self, body: Body) -> Result<Flow, FoyerError> {
        match (self.room.clone(), body) {
            (_, Body::Quit {}) => self.quit().await,
            (None, Body::CreateRoom { room_name }) => self.create_room(&room_name).await,
            (None, Body::JoinRoom { room_name }) => self.join_room(&room_name).await,
            (None, Body::RefreshRooms {}) => {
                self.send_room_list().await?;
                Ok(Flow::Continue)
            }
            (Some(room), Body::ChatMessage { message }) => self.chat(&room, message).await,
            (Some(_), Body::Leave {}) => self.leave().await,
            (room, other) => {
                let place = if room.is_some() { "in a room" } else { "in the foyer" };
                Err(FoyerError::ProtocolViolation(format!(
                    "{} is not allowed {place}",
                    other.kind()
                )))
            }
        }
    }

    // -----------------------------------------------------------------
    // Foyer
    // -----------------------------------------------------------------

    async fn create_room(&mut self, name: &str) -> Result<Flow, FoyerError> {
        let room = self.state.rooms.create_room(name).await?;
        tracing::info!(
            conn_id = %self.conn_id,
            name = %self.identity.display_name,
            room = %room.name(),
            "client created room"
        );
        self.enter_room(room).await
    }

    async fn join_room(&mut self, name: &str) -> Result<Flow, FoyerError> {
        let room = self.state.rooms.get(name).await?;
        self.enter_room(room).await
    }

    /// Joins `room`: `ROOM_JOINED` and the history replay to this client,
    /// then a join notice to the others and fresh lists for everyone
    /// affected.
    async fn enter_room(&mut self, room: Arc<ChatRoom>) -> Result<Flow, FoyerError> {
        let name = room.name().to_string();
        let joined = encode(
            &self.state,
            &Envelope::server(Body::RoomJoined {
                room_name: name.clone(),
            }),
        )?;
        let member = Member {
            display_name: self.identity.display_name.clone(),
            address: self.address,
            outbox: self.outbox.clone(),
        };
        room.join_with_history(self.conn_id, member, Some(joined))
            .await?;
        self.state
            .clients
            .set_room(self.conn_id, Some(name.clone()))
            .await;
        self.room = Some(Arc::clone(&room));

        let notice = server_notice(&format!("{} joined the room", self.identity.display_name))?;
        room.broadcast_message(notice, self.conn_id).await;
        broadcast_participants(&self.state, &room).await;
        broadcast_directory(&self.state).await;
        Ok(Flow::Continue)
    }

    async fn send_room_list(&self) -> Result<(), FoyerError> {
        let frame = room_list_frame(&self.state).await?;
        self.push(frame)
    }

    // -----------------------------------------------------------------
    // Room
    // -----------------------------------------------------------------

    async fn chat(&self, room: &ChatRoom, message: String) -> Result<Flow, FoyerError> {
        tracing::info!(
            conn_id = %self.conn_id,
            room = %room.name(),
            sender = %self.identity.display_name,
            %message,
            "chat message"
        );
        let frame = encode(
            &self.state,
            &Envelope::chat(self.identity.display_name.clone(), message),
        )?;
        room.broadcast_message(frame, self.conn_id).await;
        Ok(Flow::Continue)
    }

    async fn leave(&mut self) -> Result<Flow, FoyerError> {
        if let Some(room) = self.room.take() {
            leave_room(&self.state, self.conn_id, &self.identity.display_name, &room).await;
        }
        self.send(&Envelope::server(Body::LeftRoom {}))?;
        self.state.clients.set_room(self.conn_id, None).await;
        // Reaches this client too, now that it is back in the foyer.
        broadcast_directory(&self.state).await;
        Ok(Flow::Continue)
    }

    async fn quit(&mut self) -> Result<Flow, FoyerError> {
        self.leave_current_room().await;
        self.send(&Envelope::error(ErrorCode::Disconnected, "Disconnected"))?;
        tracing::info!(conn_id = %self.conn_id, "client quit");
        Ok(Flow::Disconnect)
    }

    async fn leave_current_room(&mut self) {
        if let Some(room) = self.room.take() {
            leave_room(&self.state, self.conn_id, &self.identity.display_name, &room).await;
            self.state.clients.set_room(self.conn_id, None).await;
        }
    }

    // -----------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------

    fn send(&self, envelope: &Envelope) -> Result<(), FoyerError> {
        let frame = encode(&self.state, envelope)?;
        self.push(frame)
    }

    fn push(&self, frame: Frame) -> Result<(), FoyerError> {
        push(&self.outbox, frame)
    }

    fn reject(&self, err: &FoyerError) -> Result<(), FoyerError> {
        reject(&self.state, &self.outbox, err)
    }
}

// =========================================================================
// Shared helpers
// =========================================================================

fn encode<A: Authenticator>(state: &ServerState<A>, envelope: &Envelope) -> Result<Frame, FoyerError> {
    Ok(state.codec.encode(envelope)?.into())
}

fn push(outbox: &ClientSender, frame: Frame) -> Result<(), FoyerError> {
    outbox.send(frame).map_err(|_| {
        FoyerError::ConnectionLost(TransportError::ConnectionClosed(
            "writer stopped".into(),
        ))
    })
}

/// Reports `err` to the client as an `ERROR` envelope.
fn reject<A: Authenticator>(
    state: &ServerState<A>,
    outbox: &ClientSender,
    err: &FoyerError,
) -> Result<(), FoyerError> {
    let frame = encode(state, &Envelope::error(err.error_code(), err.to_string()))?;
    push(outbox, frame)
}

async fn room_list_frame<A: Authenticator>(state: &ServerState<A>) -> Result<Frame, FoyerError> {
    let (rooms, member_counts): (Vec<String>, Vec<usize>) = state
        .rooms
        .listing()
        .await
        .into_iter()
        .map(|summary| (summary.name, summary.members))
        .unzip();
    encode(
        state,
        &Envelope::server(Body::RoomList {
            rooms,
            member_counts,
        }),
    )
}

/// Sends the current room list to every client in the foyer.
async fn broadcast_directory<A: Authenticator>(state: &ServerState<A>) {
    match room_list_frame(state).await {
        Ok(frame) => {
            state.clients.send_to_foyer(&frame).await;
        }
        Err(e) => tracing::error!(error = %e, "failed to encode room list"),
    }
}

/// Sends the room's member list to everyone in it.
async fn broadcast_participants<A: Authenticator>(state: &ServerState<A>, room: &ChatRoom) {
    let participants = room.get_client_names().await;
    match encode(state, &Envelope::server(Body::ParticipantList { participants })) {
        Ok(frame) => {
            room.broadcast_to_all(frame).await;
        }
        Err(e) => tracing::error!(room = %room.name(), error = %e, "failed to encode member list"),
    }
}

/// Takes `conn_id` out of `room` and tells whoever is left.
async fn leave_room<A: Authenticator>(
    state: &ServerState<A>,
    conn_id: ConnectionId,
    display_name: &str,
    room: &Arc<ChatRoom>,
) {
    if !room.remove_client(conn_id).await {
        return;
    }
    match server_notice(&format!("{display_name} left the room")) {
        Ok(notice) => {
            room.broadcast_message(notice, conn_id).await;
        }
        Err(e) => tracing::error!(room = %room.name(), error = %e, "failed to encode leave notice"),
    }
    broadcast_participants(state, room).await;

    if state.rooms.config().auto_delete_empty_rooms {
        state.rooms.remove_if_empty(room).await;
    }
}

/// Final cleanup for a connection: out of its room, out of the registry,
/// and a fresh room list for the foyer. Safe to call more than once.
async fn depart<A: Authenticator>(state: &ServerState<A>, conn_id: ConnectionId) {
    let Some(session) = state.clients.remove(conn_id).await else {
        return;
    };
    if let Some(name) = &session.current_room {
        if let Ok(room) = state.rooms.get(name).await {
            leave_room(state, conn_id, &session.display_name, &room).await;
        }
    }
    broadcast_directory(state).await;
    tracing::info!(
        %conn_id,
        name = %session.display_name,
        addr = %session.address,
        "client disconnected"
    );
}
