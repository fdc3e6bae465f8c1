//! Room operations shared by the REST handlers and the WebSocket channel.

pub mod events;
pub mod hub;
pub mod msg;
mod room;
pub mod ws;

use anyhow::Context;
use axum::{routing::{delete, get}, Router};

use crate::{
    store::{Message, Room, RoomStore, RoomSummary},
    AppError, AppResult, AppState,
};

use events::ServerEvent;
use hub::Hub;
use msg::NewMessage;

/// Most rooms a listing returns.
pub const ROOM_LIST_LIMIT: usize = 20;

const MISSING_ROOM_ID: AppError = AppError::BadRequest("Room ID required");
const MISSING_FIELDS: AppError = AppError::BadRequest("Room ID, user ID, and code required");

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(room::list_rooms).post(room::create_room).delete(room::delete_room_by_query))
        .route("/rooms/{room_id}", delete(room::delete_room))
        .route("/messages", get(msg::get_messages).post(msg::send_message).delete(msg::clear_messages))
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Room ids are used verbatim; only blank ones are rejected.
pub(crate) fn require_room_id(room_id: Option<String>) -> AppResult<String> {
    non_blank(room_id).ok_or(MISSING_ROOM_ID)
}

pub async fn list_rooms(store: &RoomStore) -> AppResult<Vec<RoomSummary>> {
    Ok(store
        .list_rooms(ROOM_LIST_LIMIT)
        .await
        .context("Failed to fetch rooms")?)
}

pub async fn join_room(store: &RoomStore, room_id: &str) -> AppResult<Room> {
    Ok(store.join(room_id).await.context("Failed to join room")?)
}

pub async fn room_messages(store: &RoomStore, room_id: &str) -> AppResult<Vec<Message>> {
    Ok(store
        .messages(room_id)
        .await
        .context("Failed to fetch messages")?)
}

/// Appends to the room, creating it if needed, and fans the message out to live listeners.
pub async fn post_message(
    store: &RoomStore,
    hub: &Hub,
    room_id: &str,
    new: NewMessage,
) -> AppResult<Message> {
    if room_id.trim().is_empty() {
        return Err(MISSING_FIELDS);
    }
    let msg = new.into_message().ok_or(MISSING_FIELDS)?;

    store
        .append(room_id, msg.clone())
        .await
        .context("Failed to send message")?;

    let listeners = hub.publish(room_id, ServerEvent::MessageReceived(msg.clone()));
    tracing::info!("message {} sent in {room_id} by {} ({listeners} listening)", msg.id, msg.user_id);

    Ok(msg)
}

pub async fn delete_room(store: &RoomStore, hub: &Hub, room_id: &str) -> AppResult<()> {
    if !store.delete(room_id).await.context("Failed to delete room")? {
        return Err(AppError::NotFound("Room not found"));
    }

    hub.publish(room_id, ServerEvent::RoomDeleted { room_id: room_id.to_owned() });
    hub.close(room_id);
    tracing::info!("room {room_id} deleted");

    Ok(())
}

pub async fn clear_room(store: &RoomStore, hub: &Hub, room_id: &str) -> AppResult<()> {
    if store.clear(room_id).await.context("Failed to clear room")? {
        hub.publish(room_id, ServerEvent::RoomHistory {
            room_id: room_id.to_owned(),
            messages: Vec::new(),
        });
        tracing::info!("room {room_id} cleared");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    fn new_message(user_id: &str, content: &str) -> NewMessage {
        NewMessage {
            user_id: Some(user_id.to_owned()),
            content: Some(content.to_owned()),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn post_broadcasts_to_listeners() {
        let store = RoomStore::memory();
        let hub = Hub::default();
        let mut rx = hub.subscribe("r1");

        let msg = post_message(&store, &hub, "r1", new_message("u1", "hello")).await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), ServerEvent::MessageReceived(msg.clone()));
        assert_eq!(store.messages("r1").await.unwrap(), vec![msg]);
    }

    #[tokio::test]
    async fn post_rejects_missing_fields() {
        let store = RoomStore::memory();
        let hub = Hub::default();

        let err = post_message(&store, &hub, " ", new_message("u1", "x")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = post_message(&store, &hub, "r1", new_message("u1", "")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(store.list_rooms(20).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_notifies_and_reports_missing() {
        let store = RoomStore::memory();
        let hub = Hub::default();
        store.join("r1").await.unwrap();
        let mut rx = hub.subscribe("r1");

        delete_room(&store, &hub, "r1").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), ServerEvent::RoomDeleted { room_id: "r1".into() });

        let err = delete_room(&store, &hub, "r1").await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn room_ids_are_checked_for_blanks_only() {
        assert!(require_room_id(None).is_err());
        assert!(require_room_id(Some("\t".into())).is_err());
        assert_eq!(require_room_id(Some(" Lobby".into())).unwrap(), " Lobby");
    }
}
