use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tokio::sync::broadcast;

use super::events::ServerEvent;

const ROOM_CHANNEL_CAPACITY: usize = 128;

/// Live listeners, one broadcast channel per room.
#[derive(Clone, Default)]
pub struct Hub {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<ServerEvent>>>>,
}

impl Hub {
    fn channels(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<ServerEvent>>> {
        // the map stays consistent even if a holder panicked
        self.channels.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self, room_id: &str) -> broadcast::Receiver<ServerEvent> {
        self.channels()
            .entry(room_id.to_owned())
            .or_insert_with(|| broadcast::channel(ROOM_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Returns how many listeners the event reached.
    pub fn publish(&self, room_id: &str, event: ServerEvent) -> usize {
        match self.channels().get(room_id) {
            Some(sender) => sender.send(event).unwrap_or(0),
            None => 0,
        }
    }

    pub fn members(&self, room_id: &str) -> usize {
        self.channels()
            .get(room_id)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }

    /// Forgets the room's channel. Listeners see it close once they drain it.
    pub fn close(&self, room_id: &str) {
        self.channels().remove(room_id);
    }

    /// Drops channels nobody listens to anymore.
    pub fn prune(&self) -> usize {
        let mut channels = self.channels();
        let before = channels.len();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        before - channels.len()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::broadcast::error::RecvError;

    use super::*;

    fn deleted(room_id: &str) -> ServerEvent {
        ServerEvent::RoomDeleted { room_id: room_id.to_owned() }
    }

    #[tokio::test]
    async fn publish_reaches_only_that_room() {
        let hub = Hub::default();
        let mut a = hub.subscribe("a");
        let mut b = hub.subscribe("b");

        assert_eq!(hub.publish("a", deleted("a")), 1);
        assert_eq!(a.recv().await.unwrap(), deleted("a"));
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_listeners_is_a_noop() {
        let hub = Hub::default();
        assert_eq!(hub.publish("nobody", deleted("nobody")), 0);
        assert_eq!(hub.members("nobody"), 0);
    }

    #[tokio::test]
    async fn members_and_prune() {
        let hub = Hub::default();
        let first = hub.subscribe("r");
        let _second = hub.subscribe("r");
        assert_eq!(hub.members("r"), 2);

        drop(first);
        assert_eq!(hub.members("r"), 1);
        assert_eq!(hub.prune(), 0);

        drop(_second);
        assert_eq!(hub.prune(), 1);
        assert_eq!(hub.members("r"), 0);
    }

    #[tokio::test]
    async fn close_ends_the_stream() {
        let hub = Hub::default();
        let mut rx = hub.subscribe("r");
        hub.publish("r", deleted("r"));
        hub.close("r");

        assert_eq!(rx.recv().await.unwrap(), deleted("r"));
        assert!(matches!(rx.recv().await, Err(RecvError::Closed)));
    }
}
