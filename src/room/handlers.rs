use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{info, instrument};

use super::types::{CreateRoomRequest, JoinRoomRequest, RoomListResponse, RoomResponse};
use crate::shared::{AppError, AppState};

/// HTTP handler for creating a new room
///
/// POST /api/rooms/create
#[instrument(name = "create_room", skip(state, request))]
pub async fn create_room(
    State(state): State<AppState>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<Json<RoomResponse>, AppError> {
    info!(name = %request.name, email = %request.email, "Creating new room");

    let room = state
        .room_service
        .create_room(&request.name, &request.pass_code, &request.email)
        .await?;

    Ok(Json(RoomResponse {
        room,
        message: "Room created successfully".to_string(),
    }))
}

/// HTTP handler for joining a room
///
/// POST /api/rooms/join
#[instrument(name = "join_room", skip(state, request))]
pub async fn join_room(
    State(state): State<AppState>,
    Json(request): Json<JoinRoomRequest>,
) -> Result<Json<RoomResponse>, AppError> {
    info!(room_code = %request.room_code, email = %request.email, "Joining room");

    let room = state
        .room_service
        .join_room(&request.room_code, &request.pass_code, &request.email)
        .await?;

    Ok(Json(RoomResponse {
        room,
        message: "Successfully joined the room".to_string(),
    }))
}

/// HTTP handler listing rooms created by a user
///
/// GET /api/rooms/created/{email}
#[instrument(name = "list_created_rooms", skip(state))]
pub async fn list_created_rooms(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<RoomListResponse>, AppError> {
    let dashboard = state.room_service.rooms_for_dashboard(&email).await?;

    Ok(Json(RoomListResponse {
        rooms: dashboard.created,
    }))
}

/// HTTP handler listing rooms a user has joined (creator excluded)
///
/// GET /api/rooms/joined/{email}
#[instrument(name = "list_joined_rooms", skip(state))]
pub async fn list_joined_rooms(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> Result<Json<RoomListResponse>, AppError> {
    let dashboard = state.room_service.rooms_for_dashboard(&email).await?;

    Ok(Json(RoomListResponse {
        rooms: dashboard.joined,
    }))
}
