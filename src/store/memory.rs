use std::{collections::HashMap, sync::Arc};

use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{truncate_millis, Message, Room, RoomSummary};

/// Process-local room table. Nothing survives a restart.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rooms: Arc<RwLock<HashMap<String, Room>>>,
}

impl MemoryStore {
    pub async fn list_rooms(&self, limit: usize) -> Vec<RoomSummary> {
        let rooms = self.rooms.read().await;
        let mut summaries: Vec<RoomSummary> = rooms
            .values()
            .filter(|room| !room.messages.is_empty())
            .map(Room::summary)
            .collect();

        summaries.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        summaries.truncate(limit);
        summaries
    }

    pub async fn join(&self, room_id: &str) -> Room {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| Room::new(room_id, truncate_millis(OffsetDateTime::now_utc())))
            .clone()
    }

    pub async fn messages(&self, room_id: &str) -> Vec<Message> {
        self.rooms
            .read()
            .await
            .get(room_id)
            .map(|room| room.messages.clone())
            .unwrap_or_default()
    }

    pub async fn append(&self, room_id: &str, message: Message) {
        let mut rooms = self.rooms.write().await;
        let now = truncate_millis(OffsetDateTime::now_utc());
        rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| Room::new(room_id, now))
            .push(message, now);
    }

    pub async fn delete(&self, room_id: &str) -> bool {
        self.rooms.write().await.remove(room_id).is_some()
    }

    pub async fn clear(&self, room_id: &str) -> bool {
        match self.rooms.write().await.get_mut(room_id) {
            Some(room) => {
                room.messages.clear();
                true
            }
            None => false,
        }
    }
}
