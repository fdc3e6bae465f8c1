use axum::{debug_handler, extract::State, Json};
use serde_json::{json, Value};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{ai::AiClient, store::RoomStore, AppState};

#[debug_handler]
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

#[debug_handler(state = AppState)]
pub async fn status(
    State(store): State<RoomStore>,
    State(ai): State<AiClient>,
) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": OffsetDateTime::now_utc().format(&Rfc3339).ok(),
        "storage": store.backend(),
        "aiEnabled": ai.enabled(),
    }))
}
