use axum::{
    extract::{rejection::JsonRejection, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::connection::ws_endpoint;
use crate::error::ApiError;
use crate::hub::Hub;
use crate::protocol::RoomSummary;

pub fn router(hub: Hub) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/ws", get(ws_endpoint))
        .route("/rooms", get(list_rooms).delete(delete_room))
        .with_state(hub)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomsResponse {
    pub rooms: Vec<RoomSummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRoomRequest {
    #[serde(default)]
    pub room_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRoomResponse {
    pub message: String,
    pub room_id: String,
    pub notified: usize,
}

async fn health_check() -> &'static str {
    "ok"
}

async fn list_rooms(State(hub): State<Hub>) -> Json<RoomsResponse> {
    Json(RoomsResponse {
        rooms: hub.room_summaries(),
    })
}

async fn delete_room(
    State(hub): State<Hub>,
    request: Result<Json<DeleteRoomRequest>, JsonRejection>,
) -> Result<Json<DeleteRoomResponse>, ApiError> {
    // Absent, unparseable and mistyped bodies all mean no usable roomId
    let room_id = request
        .map_err(|rejection| {
            tracing::debug!("Unusable delete body: {}", rejection);
            ApiError::MissingField("roomId")
        })?
        .0
        .room_id
        .filter(|id| !id.trim().is_empty())
        .ok_or(ApiError::MissingField("roomId"))?;

    let notified = hub
        .force_delete(&room_id)
        .map_err(|_| ApiError::RoomNotFound(room_id.clone()))?;

    tracing::info!("Room {} deleted by operator, {} members notified", room_id, notified);
    Ok(Json(DeleteRoomResponse {
        message: "Room deleted successfully".to_string(),
        room_id,
        notified,
    }))
}
