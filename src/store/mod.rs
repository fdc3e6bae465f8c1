//! Room storage.
//!
//! A room is a bounded message history plus a last-activity stamp. Two backends
//! share one contract: a process-local table, and SQLite when `DATABASE_URL` is
//! configured. Every operation that mutates a room is atomic per room.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Number of messages a room keeps. Appending past it evicts the oldest.
pub const HISTORY_LIMIT: usize = 50;

/// Length of the preview carried in a [`RoomSummary`].
pub const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub user_id: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: String,
    pub messages: Vec<Message>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
}

impl Room {
    pub(crate) fn new(room_id: &str, now: OffsetDateTime) -> Room {
        Room {
            room_id: room_id.to_owned(),
            messages: Vec::new(),
            last_activity: now,
        }
    }

    pub(crate) fn push(&mut self, message: Message, now: OffsetDateTime) {
        self.messages.push(message);
        if self.messages.len() > HISTORY_LIMIT {
            let excess = self.messages.len() - HISTORY_LIMIT;
            self.messages.drain(..excess);
        }
        self.last_activity = now;
    }

    pub(crate) fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_id: self.room_id.clone(),
            message_count: self.messages.len(),
            last_activity: self.last_activity,
            last_message: self
                .messages
                .last()
                .map(|msg| preview(&msg.content))
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: String,
    pub message_count: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
    pub last_message: String,
}

pub(crate) fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}

pub(crate) fn to_millis(ts: OffsetDateTime) -> i64 {
    (ts.unix_timestamp_nanos() / 1_000_000) as i64
}

/// Drops sub-millisecond precision, which the SQLite backend does not keep.
pub(crate) fn truncate_millis(ts: OffsetDateTime) -> OffsetDateTime {
    ts.replace_millisecond(ts.millisecond()).unwrap_or(ts)
}

pub(crate) fn from_millis(ms: i64) -> anyhow::Result<OffsetDateTime> {
    Ok(OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000)?)
}

#[derive(Clone)]
pub enum RoomStore {
    Memory(MemoryStore),
    Sqlite(SqliteStore),
}

impl RoomStore {
    pub fn memory() -> RoomStore {
        RoomStore::Memory(MemoryStore::default())
    }

    /// SQLite when a database URL is given and reachable, the process-local table otherwise.
    pub async fn from_database_url(database_url: Option<&str>) -> RoomStore {
        let Some(url) = database_url else {
            tracing::warn!("DATABASE_URL not set; running without persistence");
            return RoomStore::memory();
        };

        match SqliteStore::connect(url).await {
            Ok(store) => {
                tracing::info!("room store backed by {url}");
                RoomStore::Sqlite(store)
            }
            Err(err) => {
                tracing::error!("database init failed, continuing without persistence: {err:#}");
                RoomStore::memory()
            }
        }
    }

    pub fn backend(&self) -> &'static str {
        match self {
            RoomStore::Memory(_) => "memory",
            RoomStore::Sqlite(_) => "sqlite",
        }
    }

    /// Rooms holding at least one message, most recently active first.
    pub async fn list_rooms(&self, limit: usize) -> anyhow::Result<Vec<RoomSummary>> {
        match self {
            RoomStore::Memory(store) => Ok(store.list_rooms(limit).await),
            RoomStore::Sqlite(store) => store.list_rooms(limit).await,
        }
    }

    /// Creates the room if it does not exist yet and returns it.
    pub async fn join(&self, room_id: &str) -> anyhow::Result<Room> {
        match self {
            RoomStore::Memory(store) => Ok(store.join(room_id).await),
            RoomStore::Sqlite(store) => store.join(room_id).await,
        }
    }

    /// History of a room; empty for unknown rooms, which are not created.
    pub async fn messages(&self, room_id: &str) -> anyhow::Result<Vec<Message>> {
        match self {
            RoomStore::Memory(store) => Ok(store.messages(room_id).await),
            RoomStore::Sqlite(store) => store.messages(room_id).await,
        }
    }

    pub async fn append(&self, room_id: &str, message: Message) -> anyhow::Result<()> {
        match self {
            RoomStore::Memory(store) => {
                store.append(room_id, message).await;
                Ok(())
            }
            RoomStore::Sqlite(store) => store.append(room_id, message).await,
        }
    }

    /// Returns whether the room existed.
    pub async fn delete(&self, room_id: &str) -> anyhow::Result<bool> {
        match self {
            RoomStore::Memory(store) => Ok(store.delete(room_id).await),
            RoomStore::Sqlite(store) => store.delete(room_id).await,
        }
    }

    /// Drops the history but keeps the room. Returns whether the room existed.
    pub async fn clear(&self, room_id: &str) -> anyhow::Result<bool> {
        match self {
            RoomStore::Memory(store) => Ok(store.clear(room_id).await),
            RoomStore::Sqlite(store) => store.clear(room_id).await,
        }
    }
}
