//! Frames exchanged over the room WebSocket: `{"event": "...", "data": ...}`.
//!
//! Both the snake_case names and the older camelCase ones are accepted from clients.

use serde::{Deserialize, Serialize};

use crate::store::{Message, RoomSummary};

use super::msg::ClientTimestamp;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    #[serde(alias = "joinRoom", alias = "create_room", alias = "createRoom")]
    Join {
        room_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
    #[serde(alias = "leaveRoom")]
    Leave,
    #[serde(alias = "sendMessage")]
    SendMessage {
        #[serde(default)]
        room_id: Option<String>,
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default, alias = "code")]
        content: Option<String>,
        #[serde(default)]
        timestamp: Option<ClientTimestamp>,
    },
    #[serde(alias = "deleteRoom")]
    DeleteRoom {
        #[serde(default)]
        room_id: Option<String>,
    },
    #[serde(alias = "getMessages")]
    GetMessages {
        #[serde(default)]
        room_id: Option<String>,
    },
    #[serde(alias = "getRooms")]
    GetRooms,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    RoomHistory { room_id: String, messages: Vec<Message> },
    MessageReceived(Message),
    UserJoined { room_id: String, user_id: String },
    UserLeft { room_id: String, user_id: String },
    MemberCount { room_id: String, count: usize },
    RoomDeleted { room_id: String },
    RoomList(Vec<RoomSummary>),
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_both_naming_styles() {
        let snake: ClientEvent =
            serde_json::from_value(json!({"event": "join", "data": {"roomId": "r1", "userId": "u1"}})).unwrap();
        let camel: ClientEvent =
            serde_json::from_value(json!({"event": "joinRoom", "data": {"roomId": "r1", "userId": "u1"}})).unwrap();

        assert_eq!(snake, camel);
        assert_eq!(
            snake,
            ClientEvent::Join { room_id: "r1".into(), user_id: Some("u1".into()) }
        );
    }

    #[test]
    fn send_message_accepts_code_and_millis() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "send_message",
            "data": {"roomId": "r1", "userId": "u1", "code": "let x = 1;", "timestamp": 1_700_000_000_000i64}
        }))
        .unwrap();

        let ClientEvent::SendMessage { content, timestamp, .. } = event else {
            panic!("wrong variant: {event:?}");
        };
        assert_eq!(content.as_deref(), Some("let x = 1;"));
        assert_eq!(timestamp, Some(ClientTimestamp::Millis(1_700_000_000_000)));
    }

    #[test]
    fn send_message_tolerates_any_timestamp_type() {
        let event: ClientEvent = serde_json::from_value(json!({
            "event": "send_message",
            "data": {"code": "x", "timestamp": 1_700_000_000_000.5}
        }))
        .unwrap();

        let ClientEvent::SendMessage { timestamp, .. } = event else {
            panic!("wrong variant: {event:?}");
        };
        assert_eq!(timestamp, Some(ClientTimestamp::Other(json!(1_700_000_000_000.5))));
    }

    #[test]
    fn unit_events_need_no_data() {
        let event: ClientEvent = serde_json::from_value(json!({"event": "getRooms"})).unwrap();
        assert_eq!(event, ClientEvent::GetRooms);
    }

    #[test]
    fn server_events_are_tagged() {
        let value = serde_json::to_value(ServerEvent::RoomDeleted { room_id: "r1".into() }).unwrap();
        assert_eq!(value, json!({"event": "room_deleted", "data": {"roomId": "r1"}}));

        let value = serde_json::to_value(ServerEvent::MemberCount { room_id: "r1".into(), count: 2 }).unwrap();
        assert_eq!(value, json!({"event": "member_count", "data": {"roomId": "r1", "count": 2}}));
    }
}
