//! Chat rooms: pairing, history, and the live socket.

pub mod registry;
pub mod store;
mod ws;

pub use registry::{ChatEvent, RoomBus};
pub use store::{ChatRoom, Message, MessageKind, MessageStore, RoomStore};

use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::profiles::ProfileStore;
use crate::session::CurrentProfile;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_rooms).post(open_room))
        .route("/{uuid}/messages", get(room_history))
        .route("/{uuid}/ws", get(ws::room_ws))
}

#[debug_handler(state = AppState)]
async fn list_rooms(
    State(rooms): State<RoomStore>,
    CurrentProfile(profile): CurrentProfile,
) -> AppResult<Json<Vec<ChatRoom>>> {
    Ok(Json(rooms.rooms_for(profile.id).await?))
}

#[derive(Deserialize)]
struct OpenRoomRequest {
    other_id: String,
}

#[debug_handler(state = AppState)]
async fn open_room(
    State(profiles): State<ProfileStore>,
    State(rooms): State<RoomStore>,
    CurrentProfile(profile): CurrentProfile,
    Json(req): Json<OpenRoomRequest>,
) -> AppResult<(StatusCode, Json<ChatRoom>)> {
    let other_id = Uuid::parse_str(&req.other_id)
        .map_err(|_| AppError::InvalidArgument("'other_id' must be a valid profile id".into()))?;
    let other = profiles.get(other_id).await?;

    let (room, created) = rooms.get_or_create(profile.id, other.id).await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(room)))
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    room_id: Uuid,
    messages: Vec<Message>,
}

#[debug_handler(state = AppState)]
async fn room_history(
    Path(room_id): Path<Uuid>,
    State(rooms): State<RoomStore>,
    State(messages): State<MessageStore>,
    CurrentProfile(profile): CurrentProfile,
) -> AppResult<Json<HistoryResponse>> {
    rooms.ensure_participant(room_id, profile.id).await?;

    // Fetching the history doubles as reading it.
    messages.mark_read(room_id, profile.id).await?;
    let messages = messages.history(room_id).await?;
    Ok(Json(HistoryResponse { room_id, messages }))
}
