//! A single chat room: members, bounded history, broadcast.
//!
//! Rooms never touch sockets. Every member brings an outbound queue (its
//! [`ClientSender`]) and the room only pushes already-encoded frames into
//! those queues. Each connection's writer task drains its own queue, so a
//! slow peer can't stall a broadcast and no socket write ever happens
//! under the room lock.
//!
//! The room lock covers the history append and the enqueue together, so
//! every member observes a room's messages in the same order.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;

use foyer_protocol::{Codec, Envelope, JsonCodec};
use foyer_transport::ConnectionId;
use tokio::sync::{mpsc, Mutex};

use crate::RoomError;

/// One encoded envelope, shared by every queue it is pushed to.
pub type Frame = Arc<[u8]>;

/// Channel sender for delivering frames to one connection's writer task.
pub type ClientSender = mpsc::UnboundedSender<Frame>;

/// Sender name used for notices the server itself posts.
pub const SERVER_SENDER: &str = "SERVER";

/// First line of a history replay.
pub const HISTORY_START: &str = "=== Chat History ===";

/// Last line of a history replay.
pub const HISTORY_END: &str = "=== End of History ===";

/// Encodes a `MESSAGE` from [`SERVER_SENDER`].
pub fn server_notice(text: &str) -> Result<Frame, RoomError> {
    let bytes = JsonCodec.encode(&Envelope::chat(SERVER_SENDER, text))?;
    Ok(bytes.into())
}

/// A room member as the room sees it.
#[derive(Debug, Clone)]
pub struct Member {
    pub display_name: String,
    pub address: SocketAddr,
    pub outbox: ClientSender,
}

struct RoomInner {
    members: HashMap<ConnectionId, Member>,
    history: VecDeque<Frame>,
    /// Set once the room is dropped from the directory; late joins fail.
    closed: bool,
}

/// A named chat room.
///
/// Shared as `Arc<ChatRoom>` between the directory and every session
/// currently inside it.
pub struct ChatRoom {
    name: String,
    history_capacity: usize,
    history_start: Frame,
    history_end: Frame,
    inner: Mutex<RoomInner>,
}

impl ChatRoom {
    /// Creates an empty room keeping at most `history_capacity` messages.
    pub fn new(name: impl Into<String>, history_capacity: usize) -> Result<Self, RoomError> {
        Ok(Self {
            name: name.into(),
            history_capacity,
            history_start: server_notice(HISTORY_START)?,
            history_end: server_notice(HISTORY_END)?,
            inner: Mutex::new(RoomInner {
                members: HashMap::new(),
                history: VecDeque::with_capacity(history_capacity),
                closed: false,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // -----------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------

    /// Adds a member.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`] if the room has been removed from the
    ///   directory since the caller looked it up.
    /// - [`RoomError::AlreadyInRoom`] if `id` is already a member.
    pub async fn add_client(
        &self,
        id: ConnectionId,
        display_name: impl Into<String>,
        address: SocketAddr,
        outbox: ClientSender,
    ) -> Result<(), RoomError> {
        let member = Member {
            display_name: display_name.into(),
            address,
            outbox,
        };
        let mut inner = self.inner.lock().await;
        self.insert_member(&mut inner, id, member)
    }

    /// Adds a member and replays the history to it under one lock, so no
    /// broadcast can land between the two.
    ///
    /// `greeting`, if given, is queued to the new member ahead of the
    /// replay.
    pub async fn join_with_history(
        &self,
        id: ConnectionId,
        member: Member,
        greeting: Option<Frame>,
    ) -> Result<(), RoomError> {
        let mut inner = self.inner.lock().await;
        self.insert_member(&mut inner, id, member)?;
        if let (Some(frame), Some(member)) = (greeting, inner.members.get(&id)) {
            let _ = member.outbox.send(frame);
        }
        self.replay_history(&inner, id);
        Ok(())
    }

    fn insert_member(
        &self,
        inner: &mut RoomInner,
        id: ConnectionId,
        member: Member,
    ) -> Result<(), RoomError> {
        if inner.closed {
            return Err(RoomError::NotFound(self.name.clone()));
        }
        if inner.members.contains_key(&id) {
            return Err(RoomError::AlreadyInRoom {
                id,
                room: self.name.clone(),
            });
        }
        tracing::info!(
            room = %self.name,
            %id,
            name = %member.display_name,
            addr = %member.address,
            members = inner.members.len() + 1,
            "client joined room"
        );
        inner.members.insert(id, member);
        Ok(())
    }

    /// Removes a member. Returns `false` if `id` wasn't in the room.
    pub async fn remove_client(&self, id: ConnectionId) -> bool {
        let mut inner = self.inner.lock().await;
        let removed = inner.members.remove(&id);
        if let Some(member) = &removed {
            tracing::info!(
                room = %self.name,
                %id,
                name = %member.display_name,
                members = inner.members.len(),
                "client left room"
            );
        }
        removed.is_some()
    }

    pub async fn has_client(&self, id: ConnectionId) -> bool {
        self.inner.lock().await.members.contains_key(&id)
    }

    pub async fn client_count(&self) -> usize {
        self.inner.lock().await.members.len()
    }

    /// Display names of the current members, sorted.
    pub async fn get_client_names(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        let mut names: Vec<String> = inner
            .members
            .values()
            .map(|m| m.display_name.clone())
            .collect();
        names.sort();
        names
    }

    // -----------------------------------------------------------------
    // Messaging
    // -----------------------------------------------------------------

    /// Records `frame` in the history and queues it to every member except
    /// `sender`. Returns how many members it was queued to.
    pub async fn broadcast_message(&self, frame: Frame, sender: ConnectionId) -> usize {
        let mut inner = self.inner.lock().await;

        if self.history_capacity > 0 {
            while inner.history.len() >= self.history_capacity {
                inner.history.pop_front();
            }
            inner.history.push_back(Arc::clone(&frame));
        }

        let mut delivered = 0;
        for (id, member) in &inner.members {
            if *id == sender {
                continue;
            }
            // A closed queue means that member is mid-disconnect.
            if member.outbox.send(Arc::clone(&frame)).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Queues `frame` to every member without recording it, e.g. member
    /// list updates.
    pub async fn broadcast_to_all(&self, frame: Frame) -> usize {
        let inner = self.inner.lock().await;
        inner
            .members
            .values()
            .filter(|member| member.outbox.send(Arc::clone(&frame)).is_ok())
            .count()
    }

    /// Replays the history to one member, bracketed by start/end notices.
    /// Sends nothing when the history is empty. Returns `false` if `id`
    /// isn't a member.
    pub async fn send_history_to_client(&self, id: ConnectionId) -> bool {
        let inner = self.inner.lock().await;
        self.replay_history(&inner, id)
    }

    fn replay_history(&self, inner: &RoomInner, id: ConnectionId) -> bool {
        let Some(member) = inner.members.get(&id) else {
            return false;
        };
        if inner.history.is_empty() {
            return true;
        }
        let _ = member.outbox.send(Arc::clone(&self.history_start));
        for frame in &inner.history {
            let _ = member.outbox.send(Arc::clone(frame));
        }
        let _ = member.outbox.send(Arc::clone(&self.history_end));
        true
    }

    /// Snapshot of the stored history, oldest first.
    pub async fn history(&self) -> Vec<Frame> {
        self.inner.lock().await.history.iter().cloned().collect()
    }

    // -----------------------------------------------------------------
    // Directory hooks
    // -----------------------------------------------------------------

    /// Marks the room closed if it has no members. Returns whether it did.
    pub(crate) async fn close_if_empty(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.members.is_empty() {
            inner.closed = true;
        }
        inner.closed
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }
}

impl std::fmt::Debug for ChatRoom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRoom")
            .field("name", &self.name)
            .field("history_capacity", &self.history_capacity)
            .finish_non_exhaustive()
    }
}

// =========================================================================
// Tests
// =========================================================================
