use axum::{debug_handler, extract::{Path, Query, State}, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{store::{RoomStore, RoomSummary}, AppResult, AppState};

use super::{hub::Hub, msg::RoomQuery, require_room_id};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewRoomBody {
    room_id: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn list_rooms(
    State(store): State<RoomStore>,
) -> AppResult<Json<Vec<RoomSummary>>> {
    Ok(Json(super::list_rooms(&store).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn create_room(
    State(store): State<RoomStore>,
    Json(NewRoomBody { room_id }): Json<NewRoomBody>,
) -> AppResult<Json<Value>> {
    let room_id = require_room_id(room_id)?;
    super::join_room(&store, &room_id).await?;

    Ok(Json(json!({
        "success": true,
        "roomId": room_id,
        "message": "Room created/joined successfully",
    })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_room(
    Path(room_id): Path<String>,
    State(store): State<RoomStore>,
    State(hub): State<Hub>,
) -> AppResult<Json<Value>> {
    let room_id = require_room_id(Some(room_id))?;
    super::delete_room(&store, &hub, &room_id).await?;

    Ok(Json(json!({
        "success": true,
        "message": "Room deleted successfully",
    })))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_room_by_query(
    Query(RoomQuery { room_id }): Query<RoomQuery>,
    State(store): State<RoomStore>,
    State(hub): State<Hub>,
) -> AppResult<Json<Value>> {
    delete_room(Path(require_room_id(room_id)?), State(store), State(hub)).await
}
