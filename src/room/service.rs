use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{models::RoomModel, repository::RoomRepository};
use crate::shared::AppError;

/// Rooms a user sees on their dashboard
#[derive(Debug, Clone)]
pub struct DashboardRooms {
    pub created: Vec<RoomModel>,
    pub joined: Vec<RoomModel>,
}

/// Service for room business logic: field validation, passcode checks
/// and membership updates in front of the Room Store.
pub struct RoomService {
    repository: Arc<dyn RoomRepository>,
}

impl RoomService {
    pub fn new(repository: Arc<dyn RoomRepository>) -> Self {
        Self { repository }
    }

    fn require_non_empty(value: &str, field: &str) -> Result<(), AppError> {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!("{} is required", field)));
        }
        Ok(())
    }

    /// Creates a new room. The caller-supplied name is the room code.
    #[instrument(skip(self, pass_code))]
    pub async fn create_room(
        &self,
        name: &str,
        pass_code: &str,
        creator_email: &str,
    ) -> Result<RoomModel, AppError> {
        Self::require_non_empty(name, "Room name")?;
        Self::require_non_empty(pass_code, "Pass code")?;
        Self::require_non_empty(creator_email, "Email")?;

        let room = RoomModel::new(
            name.to_string(),
            pass_code.to_string(),
            creator_email.to_string(),
        );

        self.repository.create_room(&room).await?;

        info!(
            room_code = %room.room_code,
            creator = %room.creator_email,
            "Room created successfully"
        );

        Ok(room)
    }

    /// Joins an existing room after verifying the passcode
    ///
    /// Rejoin after a reconnect goes through this same path: the
    /// membership insert is idempotent, so it reconciles naturally.
    #[instrument(skip(self, pass_code))]
    pub async fn join_room(
        &self,
        room_code: &str,
        pass_code: &str,
        email: &str,
    ) -> Result<RoomModel, AppError> {
        Self::require_non_empty(room_code, "Room code")?;
        Self::require_non_empty(pass_code, "Pass code")?;
        Self::require_non_empty(email, "Email")?;

        let room = self
            .repository
            .get_room(room_code)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

        if room.pass_code != pass_code {
            warn!(room_code = %room_code, email = %email, "Pass code mismatch on join");
            return Err(AppError::PasscodeMismatch);
        }

        let updated = self.repository.add_active_user(room_code, email).await?;

        info!(
            room_code = %room_code,
            email = %email,
            active_count = updated.active_users.len(),
            "User joined room"
        );

        Ok(updated)
    }

    /// Removes a user from a room's active set. Idempotent; returns the
    /// updated room when it still resolves.
    #[instrument(skip(self))]
    pub async fn leave_room(
        &self,
        room_code: &str,
        email: &str,
    ) -> Result<Option<RoomModel>, AppError> {
        let updated = self.repository.remove_active_user(room_code, email).await?;

        match &updated {
            Some(room) => info!(
                room_code = %room_code,
                email = %email,
                active_count = room.active_users.len(),
                "User left room"
            ),
            None => debug!(room_code = %room_code, email = %email, "Room not found on leave"),
        }

        Ok(updated)
    }

    /// Full room snapshot for resynchronization
    #[instrument(skip(self))]
    pub async fn get_room(&self, room_code: &str) -> Result<Option<RoomModel>, AppError> {
        self.repository.get_room(room_code).await
    }

    /// Created and joined rooms for the dashboard query surface
    #[instrument(skip(self))]
    pub async fn rooms_for_dashboard(&self, email: &str) -> Result<DashboardRooms, AppError> {
        let created = self.repository.list_created_by(email).await?;
        let joined = self.repository.list_joined_by(email).await?;

        debug!(
            email = %email,
            created_count = created.len(),
            joined_count = joined.len(),
            "Dashboard rooms fetched"
        );

        Ok(DashboardRooms { created, joined })
    }
}
