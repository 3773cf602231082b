//! The room directory: every room on the server, by name.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{ChatRoom, RoomConfig, RoomError};

/// One row of the room list shown in the foyer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub name: String,
    pub members: usize,
}

/// Name → room map shared by the whole server.
///
/// Lock order: when both the directory lock and a room's lock are needed
/// (only in [`remove_if_empty`](Self::remove_if_empty)), the directory
/// lock is taken first.
#[derive(Debug)]
pub struct RoomDirectory {
    config: RoomConfig,
    rooms: Mutex<HashMap<String, Arc<ChatRoom>>>,
}

impl RoomDirectory {
    /// Creates an empty directory.
    pub fn new(config: RoomConfig) -> Self {
        Self {
            config,
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a directory pre-populated with `names`.
    pub async fn with_rooms<I, S>(config: RoomConfig, names: I) -> Result<Self, RoomError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let directory = Self::new(config);
        for name in names {
            directory.create_room(name.as_ref()).await?;
        }
        Ok(directory)
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates a new room. Surrounding whitespace in `name` is ignored.
    ///
    /// # Errors
    /// - [`RoomError::InvalidName`] for an empty or over-long name.
    /// - [`RoomError::AlreadyExists`] if the name is taken.
    pub async fn create_room(&self, name: &str) -> Result<Arc<ChatRoom>, RoomError> {
        let name = self.validate_name(name)?;

        let mut rooms = self.rooms.lock().await;
        if rooms.contains_key(name) {
            return Err(RoomError::AlreadyExists(name.to_string()));
        }
        let room = Arc::new(ChatRoom::new(name, self.config.history_capacity)?);
        rooms.insert(name.to_string(), Arc::clone(&room));

        tracing::info!(room = %name, rooms = rooms.len(), "room created");
        Ok(room)
    }

    fn validate_name<'a>(&self, name: &'a str) -> Result<&'a str, RoomError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RoomError::InvalidName("room name is empty".into()));
        }
        let len = name.chars().count();
        if len > self.config.max_room_name_len {
            return Err(RoomError::InvalidName(format!(
                "room name is {len} characters, limit is {}",
                self.config.max_room_name_len
            )));
        }
        Ok(name)
    }

    /// Looks up a room by name.
    pub async fn get(&self, name: &str) -> Result<Arc<ChatRoom>, RoomError> {
        let name = name.trim();
        self.rooms
            .lock()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(name.to_string()))
    }

    /// Every room with its live member count, sorted by name.
    ///
    /// Counts are read after the directory lock is released, so they may
    /// be a moment stale.
    pub async fn listing(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<Arc<ChatRoom>> = self.rooms.lock().await.values().cloned().collect();
        rooms.sort_by(|a, b| a.name().cmp(b.name()));

        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms {
            summaries.push(RoomSummary {
                name: room.name().to_string(),
                members: room.client_count().await,
            });
        }
        summaries
    }

    /// Room names, sorted.
    pub async fn room_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rooms.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Removes `room` if nobody is in it. The removed room is closed, so a
    /// session still holding its `Arc` can't join it afterwards.
    ///
    /// Only this exact room is removed: if the name now belongs to a newer
    /// room, nothing happens.
    pub async fn remove_if_empty(&self, room: &Arc<ChatRoom>) -> bool {
        let mut rooms = self.rooms.lock().await;
        match rooms.get(room.name()) {
            Some(current) if Arc::ptr_eq(current, room) => {}
            _ => return false,
        }
        if !room.close_if_empty().await {
            return false;
        }
        rooms.remove(room.name());
        tracing::info!(room = %room.name(), "empty room removed");
        true
    }

    pub async fn len(&self) -> usize {
        self.rooms.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.lock().await.is_empty()
    }
}
