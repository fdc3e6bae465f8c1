use axum::{debug_handler, extract::{Query, State}, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

use crate::{store::{from_millis, truncate_millis, Message, RoomStore}, AppResult, AppState};

use super::{hub::Hub, non_blank, require_room_id, MISSING_FIELDS};

/// Longest content kept; anything past it is cut off.
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Client-supplied send time: RFC 3339 text or epoch milliseconds.
/// Any other JSON value is accepted and ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ClientTimestamp {
    Millis(i64),
    Text(String),
    Other(Value),
}

impl ClientTimestamp {
    fn resolve(&self) -> Option<OffsetDateTime> {
        let ts = match self {
            ClientTimestamp::Millis(ms) => from_millis(*ms).ok()?,
            ClientTimestamp::Text(text) => OffsetDateTime::parse(text, &Rfc3339).ok()?,
            ClientTimestamp::Other(_) => return None,
        };

        // RFC 3339 output only covers four-digit years
        if !(0..=9999).contains(&ts.year()) {
            return None;
        }
        Some(truncate_millis(ts))
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewMessage {
    pub user_id: Option<String>,
    pub content: Option<String>,
    pub timestamp: Option<ClientTimestamp>,
}

impl NewMessage {
    /// Validates and stamps the message. Unparseable client timestamps fall back to now.
    pub(crate) fn into_message(self) -> Option<Message> {
        let user_id = non_blank(self.user_id)?;
        let content = non_blank(self.content)?;
        let content = content.trim();
        let content = match content.char_indices().nth(MAX_CONTENT_CHARS) {
            Some((cut, _)) => &content[..cut],
            None => content,
        };

        Some(Message {
            id: Uuid::now_v7().to_string(),
            user_id,
            content: content.to_owned(),
            timestamp: self
                .timestamp
                .as_ref()
                .and_then(ClientTimestamp::resolve)
                .unwrap_or_else(|| truncate_millis(OffsetDateTime::now_utc())),
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoomQuery {
    pub(crate) room_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostMessageBody {
    room_id: Option<String>,
    user_id: Option<String>,
    #[serde(alias = "code")]
    content: Option<String>,
    timestamp: Option<ClientTimestamp>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoomMessages {
    room_id: String,
    total: usize,
    messages: Vec<Message>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn get_messages(
    Query(RoomQuery { room_id }): Query<RoomQuery>,
    State(store): State<RoomStore>,
) -> AppResult<Json<RoomMessages>> {
    let room_id = require_room_id(room_id)?;
    let messages = super::room_messages(&store, &room_id).await?;

    Ok(Json(RoomMessages {
        room_id,
        total: messages.len(),
        messages,
    }))
}

#[debug_handler(state = AppState)]
pub(crate) async fn send_message(
    Query(query): Query<RoomQuery>,
    State(store): State<RoomStore>,
    State(hub): State<Hub>,
    Json(body): Json<PostMessageBody>,
) -> AppResult<Json<Value>> {
    let room_id = require_room_id(query.room_id.or(body.room_id)).map_err(|_| MISSING_FIELDS)?;

    let msg = super::post_message(&store, &hub, &room_id, NewMessage {
        user_id: body.user_id,
        content: body.content,
        timestamp: body.timestamp,
    })
    .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Message sent successfully",
        "messageId": msg.id,
    })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn clear_messages(
    Query(RoomQuery { room_id }): Query<RoomQuery>,
    State(store): State<RoomStore>,
    State(hub): State<Hub>,
) -> AppResult<Json<Value>> {
    let room_id = require_room_id(room_id)?;
    super::clear_room(&store, &hub, &room_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Room cleared successfully",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_message(user_id: &str, content: &str) -> NewMessage {
        NewMessage {
            user_id: Some(user_id.to_owned()),
            content: Some(content.to_owned()),
            timestamp: None,
        }
    }

    #[test]
    fn requires_author_and_content() {
        assert!(new_message("", "code").into_message().is_none());
        assert!(new_message("u1", "   \n").into_message().is_none());
        assert!(NewMessage::default().into_message().is_none());
    }

    #[test]
    fn trims_and_truncates_content() {
        let msg = new_message("u1", "  let x = 1;\n").into_message().unwrap();
        assert_eq!(msg.content, "let x = 1;");

        let long = "é".repeat(MAX_CONTENT_CHARS + 10);
        let msg = new_message("u1", &long).into_message().unwrap();
        assert_eq!(msg.content.chars().count(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn keeps_client_timestamps() {
        let mut new = new_message("u1", "x");
        new.timestamp = Some(ClientTimestamp::Text("2024-01-01T00:00:00Z".to_owned()));
        let msg = new.into_message().unwrap();
        assert_eq!(msg.timestamp.unix_timestamp(), 1_704_067_200);

        let mut new = new_message("u1", "x");
        new.timestamp = Some(ClientTimestamp::Millis(1_704_067_200_000));
        assert_eq!(new.into_message().unwrap().timestamp.unix_timestamp(), 1_704_067_200);
    }

    #[test]
    fn bad_timestamps_fall_back_to_now() {
        let mut new = new_message("u1", "x");
        new.timestamp = Some(ClientTimestamp::Text("yesterday".to_owned()));
        let msg = new.into_message().unwrap();
        assert!(OffsetDateTime::now_utc() - msg.timestamp < time::Duration::minutes(1));
    }

    #[test]
    fn unformattable_years_fall_back_to_now() {
        for timestamp in [
            ClientTimestamp::Millis(-100_000_000_000_000),
            ClientTimestamp::Millis(300_000_000_000_000),
        ] {
            let mut new = new_message("u1", "x");
            new.timestamp = Some(timestamp);
            let msg = new.into_message().unwrap();

            assert!(OffsetDateTime::now_utc() - msg.timestamp < time::Duration::minutes(1));
            assert!(serde_json::to_string(&msg).is_ok());
        }
    }

    #[test]
    fn other_json_timestamps_are_ignored() {
        for raw in [json!(1_700_000_000_000.5), json!(true), json!({"t": 1}), json!(null)] {
            let body: PostMessageBody =
                serde_json::from_value(json!({"userId": "u1", "code": "x", "timestamp": raw})).unwrap();
            let msg = NewMessage {
                user_id: body.user_id,
                content: body.content,
                timestamp: body.timestamp,
            }
            .into_message()
            .unwrap();

            assert!(OffsetDateTime::now_utc() - msg.timestamp < time::Duration::minutes(1));
        }
    }

    #[test]
    fn timestamps_keep_millisecond_precision() {
        let mut new = new_message("u1", "x");
        new.timestamp = Some(ClientTimestamp::Text("2024-01-01T00:00:00.123456789Z".to_owned()));
        let msg = new.into_message().unwrap();
        assert_eq!(msg.timestamp.nanosecond(), 123_000_000);

        let msg = new_message("u1", "x").into_message().unwrap();
        assert_eq!(msg.timestamp.nanosecond() % 1_000_000, 0);
    }

    #[test]
    fn ids_are_distinct() {
        let a = new_message("u1", "x").into_message().unwrap();
        let b = new_message("u1", "x").into_message().unwrap();
        assert_ne!(a.id, b.id);
    }
}
