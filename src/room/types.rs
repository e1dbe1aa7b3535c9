use serde::{Deserialize, Serialize};

use super::models::RoomModel;

/// Request payload for creating a new room
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    pub pass_code: String,
    pub email: String,
}

/// Request payload for joining a room
#[derive(Debug, Deserialize)]
pub struct JoinRoomRequest {
    pub room_code: String,
    pub pass_code: String,
    pub email: String,
}

/// Response carrying a full room snapshot
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomResponse {
    pub room: RoomModel,
    pub message: String,
}

/// Dashboard listing of a user's rooms
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomModel>,
}
