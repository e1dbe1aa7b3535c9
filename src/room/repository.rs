use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::models::{ActiveUser, RoomModel};
use crate::shared::AppError;

/// Trait for the durable Room Store
///
/// `add_active_user` and `remove_active_user` are the only operations
/// permitted to mutate a room's active-user set, and both are idempotent.
#[async_trait]
pub trait RoomRepository: Send + Sync {
    /// Inserts a new room. Fails with `Conflict` if the room code is taken.
    async fn create_room(&self, room: &RoomModel) -> Result<(), AppError>;

    async fn get_room(&self, room_code: &str) -> Result<Option<RoomModel>, AppError>;

    /// Adds a user to the room's active set. No-op if already present,
    /// `NotFound` if the room does not exist. Returns the updated room.
    async fn add_active_user(&self, room_code: &str, email: &str) -> Result<RoomModel, AppError>;

    /// Removes a user from the room's active set. No-op if the user is
    /// absent. Returns the updated room if it exists.
    async fn remove_active_user(
        &self,
        room_code: &str,
        email: &str,
    ) -> Result<Option<RoomModel>, AppError>;

    /// All rooms created by this email
    async fn list_created_by(&self, email: &str) -> Result<Vec<RoomModel>, AppError>;

    /// All rooms this email has joined, excluding rooms it created
    async fn list_joined_by(&self, email: &str) -> Result<Vec<RoomModel>, AppError>;
}

/// In-memory implementation of RoomRepository for development and testing
pub struct InMemoryRoomRepository {
    rooms: Mutex<HashMap<String, RoomModel>>,
}

impl Default for InMemoryRoomRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRoomRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RoomRepository for InMemoryRoomRepository {
    #[instrument(skip(self, room))]
    async fn create_room(&self, room: &RoomModel) -> Result<(), AppError> {
        debug!(room_code = %room.room_code, creator = %room.creator_email, "Creating room in memory");

        let mut rooms = self.rooms.lock().unwrap();
        if rooms.contains_key(&room.room_code) {
            warn!(room_code = %room.room_code, "Room code already exists");
            return Err(AppError::Conflict(
                "Room with this code already exists".to_string(),
            ));
        }
        rooms.insert(room.room_code.clone(), room.clone());

        debug!(room_code = %room.room_code, "Room created successfully in memory");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_room(&self, room_code: &str) -> Result<Option<RoomModel>, AppError> {
        let rooms = self.rooms.lock().unwrap();
        let room = rooms.get(room_code).cloned();

        match &room {
            Some(_) => debug!(room_code = %room_code, "Room found in memory"),
            None => debug!(room_code = %room_code, "Room not found in memory"),
        }

        Ok(room)
    }

    #[instrument(skip(self))]
    async fn add_active_user(&self, room_code: &str, email: &str) -> Result<RoomModel, AppError> {
        let mut rooms = self.rooms.lock().unwrap();
        let room = rooms
            .get_mut(room_code)
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

        room.add_active_user(email);

        debug!(
            room_code = %room_code,
            email = %email,
            active_count = room.active_users.len(),
            "Active user added"
        );

        Ok(room.clone())
    }

    #[instrument(skip(self))]
    async fn remove_active_user(
        &self,
        room_code: &str,
        email: &str,
    ) -> Result<Option<RoomModel>, AppError> {
        let mut rooms = self.rooms.lock().unwrap();
        let room = match rooms.get_mut(room_code) {
            Some(room) => room,
            None => {
                debug!(room_code = %room_code, "Room not found, nothing to remove");
                return Ok(None);
            }
        };

        room.remove_active_user(email);

        debug!(
            room_code = %room_code,
            email = %email,
            active_count = room.active_users.len(),
            "Active user removed"
        );

        Ok(Some(room.clone()))
    }

    #[instrument(skip(self))]
    async fn list_created_by(&self, email: &str) -> Result<Vec<RoomModel>, AppError> {
        let rooms = self.rooms.lock().unwrap();
        let created = rooms
            .values()
            .filter(|r| r.creator_email == email)
            .cloned()
            .collect();
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn list_joined_by(&self, email: &str) -> Result<Vec<RoomModel>, AppError> {
        let rooms = self.rooms.lock().unwrap();
        let joined = rooms
            .values()
            .filter(|r| r.has_active_user(email) && r.creator_email != email)
            .cloned()
            .collect();
        Ok(joined)
    }
}

/// PostgreSQL implementation of the Room Store
///
/// Schema:
///   rooms (room_code TEXT PRIMARY KEY, pass_code TEXT NOT NULL,
///          creator_email TEXT NOT NULL, created_at TIMESTAMPTZ NOT NULL)
///   room_active_users (room_code TEXT REFERENCES rooms, email TEXT,
///                      joined_at TIMESTAMPTZ NOT NULL,
///                      PRIMARY KEY (room_code, email))
pub struct PostgresRoomRepository {
    pool: PgPool,
}

impl PostgresRoomRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_room(&self, room_code: &str) -> Result<Option<RoomModel>, AppError> {
        let row = sqlx::query(
            "SELECT room_code, pass_code, creator_email, created_at FROM rooms WHERE room_code = $1",
        )
        .bind(room_code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, room_code = %room_code, "Failed to fetch room from database");
            AppError::Store(e.to_string())
        })?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let active_rows = sqlx::query(
            "SELECT email, joined_at FROM room_active_users WHERE room_code = $1 ORDER BY joined_at",
        )
        .bind(room_code)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, room_code = %room_code, "Failed to fetch active users from database");
            AppError::Store(e.to_string())
        })?;

        let active_users = active_rows
            .into_iter()
            .map(|r| ActiveUser {
                email: r.get("email"),
                joined_at: r.get::<DateTime<Utc>, _>("joined_at"),
            })
            .collect();

        Ok(Some(RoomModel {
            room_code: row.get("room_code"),
            pass_code: row.get("pass_code"),
            creator_email: row.get("creator_email"),
            created_at: row.get("created_at"),
            active_users,
        }))
    }
}

#[async_trait]
impl RoomRepository for PostgresRoomRepository {
    #[instrument(skip(self, room))]
    async fn create_room(&self, room: &RoomModel) -> Result<(), AppError> {
        debug!(room_code = %room.room_code, creator = %room.creator_email, "Creating room in database");

        let result = sqlx::query(
            "INSERT INTO rooms (room_code, pass_code, creator_email, created_at) VALUES ($1, $2, $3, $4) ON CONFLICT (room_code) DO NOTHING",
        )
        .bind(&room.room_code)
        .bind(&room.pass_code)
        .bind(&room.creator_email)
        .bind(room.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create room in database");
            AppError::Store(e.to_string())
        })?;

        if result.rows_affected() == 0 {
            warn!(room_code = %room.room_code, "Room code already exists");
            return Err(AppError::Conflict(
                "Room with this code already exists".to_string(),
            ));
        }

        debug!(room_code = %room.room_code, "Room created successfully in database");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_room(&self, room_code: &str) -> Result<Option<RoomModel>, AppError> {
        self.load_room(room_code).await
    }

    #[instrument(skip(self))]
    async fn add_active_user(&self, room_code: &str, email: &str) -> Result<RoomModel, AppError> {
        // ON CONFLICT DO NOTHING makes the membership insert idempotent
        let result = sqlx::query(
            "INSERT INTO room_active_users (room_code, email, joined_at) SELECT $1, $2, $3 WHERE EXISTS (SELECT 1 FROM rooms WHERE room_code = $1) ON CONFLICT (room_code, email) DO NOTHING",
        )
        .bind(room_code)
        .bind(email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, room_code = %room_code, "Failed to add active user in database");
            AppError::Store(e.to_string())
        })?;

        let room = self
            .load_room(room_code)
            .await?
            .ok_or_else(|| AppError::NotFound("Room not found".to_string()))?;

        debug!(
            room_code = %room_code,
            email = %email,
            inserted = result.rows_affected() > 0,
            active_count = room.active_users.len(),
            "Active user added"
        );

        Ok(room)
    }

    #[instrument(skip(self))]
    async fn remove_active_user(
        &self,
        room_code: &str,
        email: &str,
    ) -> Result<Option<RoomModel>, AppError> {
        sqlx::query("DELETE FROM room_active_users WHERE room_code = $1 AND email = $2")
            .bind(room_code)
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, room_code = %room_code, "Failed to remove active user in database");
                AppError::Store(e.to_string())
            })?;

        self.load_room(room_code).await
    }

    #[instrument(skip(self))]
    async fn list_created_by(&self, email: &str) -> Result<Vec<RoomModel>, AppError> {
        let rows = sqlx::query("SELECT room_code FROM rooms WHERE creator_email = $1")
            .bind(email)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to list created rooms from database");
                AppError::Store(e.to_string())
            })?;

        let mut rooms = Vec::new();
        for row in rows {
            let code: String = row.get("room_code");
            if let Some(room) = self.load_room(&code).await? {
                rooms.push(room);
            }
        }
        Ok(rooms)
    }

    #[instrument(skip(self))]
    async fn list_joined_by(&self, email: &str) -> Result<Vec<RoomModel>, AppError> {
        let rows = sqlx::query(
            "SELECT r.room_code FROM rooms r JOIN room_active_users a ON a.room_code = r.room_code WHERE a.email = $1 AND r.creator_email <> $1",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to list joined rooms from database");
            AppError::Store(e.to_string())
        })?;

        let mut rooms = Vec::new();
        for row in rows {
            let code: String = row.get("room_code");
            if let Some(room) = self.load_room(&code).await? {
                rooms.push(room);
            }
        }
        Ok(rooms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_room(room_code: &str, creator: &str) -> RoomModel {
        RoomModel::new(
            room_code.to_string(),
            "pw1".to_string(),
            creator.to_string(),
        )
    }

    #[tokio::test]
    async fn test_create_and_get_room() {
        let repo = InMemoryRoomRepository::new();
        let room = test_room("ABC123", "a@x.com");

        repo.create_room(&room).await.unwrap();

        let retrieved = repo.get_room("ABC123").await.unwrap().unwrap();
        assert_eq!(retrieved.room_code, "ABC123");
        assert_eq!(retrieved.pass_code, "pw1");
        assert_eq!(retrieved.creator_email, "a@x.com");
        assert!(retrieved.active_users.is_empty());
    }

    #[tokio::test]
    async fn test_get_nonexistent_room() {
        let repo = InMemoryRoomRepository::new();

        let result = repo.get_room("nonexistent").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_create_duplicate_room_conflicts() {
        let repo = InMemoryRoomRepository::new();
        let room = test_room("ABC123", "a@x.com");

        repo.create_room(&room).await.unwrap();

        let result = repo.create_room(&room).await;
        assert!(matches!(result.unwrap_err(), AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_add_active_user_idempotent() {
        let repo = InMemoryRoomRepository::new();
        repo.create_room(&test_room("ABC123", "a@x.com"))
            .await
            .unwrap();

        repo.add_active_user("ABC123", "b@x.com").await.unwrap();
        let room = repo.add_active_user("ABC123", "b@x.com").await.unwrap();

        assert_eq!(room.active_emails(), vec!["b@x.com".to_string()]);
    }

    #[tokio::test]
    async fn test_add_active_user_unknown_room() {
        let repo = InMemoryRoomRepository::new();

        let result = repo.add_active_user("nope", "b@x.com").await;
        assert!(matches!(result.unwrap_err(), AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_active_user_idempotent() {
        let repo = InMemoryRoomRepository::new();
        repo.create_room(&test_room("ABC123", "a@x.com"))
            .await
            .unwrap();
        repo.add_active_user("ABC123", "b@x.com").await.unwrap();

        let room = repo
            .remove_active_user("ABC123", "b@x.com")
            .await
            .unwrap()
            .unwrap();
        assert!(room.active_users.is_empty());

        // Second removal is a no-op, not an error
        let room = repo
            .remove_active_user("ABC123", "b@x.com")
            .await
            .unwrap()
            .unwrap();
        assert!(room.active_users.is_empty());
    }

    #[tokio::test]
    async fn test_remove_active_user_unknown_room_is_noop() {
        let repo = InMemoryRoomRepository::new();

        let result = repo.remove_active_user("nope", "b@x.com").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_empty_room_is_not_deleted() {
        let repo = InMemoryRoomRepository::new();
        repo.create_room(&test_room("ABC123", "a@x.com"))
            .await
            .unwrap();
        repo.add_active_user("ABC123", "b@x.com").await.unwrap();
        repo.remove_active_user("ABC123", "b@x.com").await.unwrap();

        // Room persists after emptying out
        let room = repo.get_room("ABC123").await.unwrap();
        assert!(room.is_some());
    }

    #[tokio::test]
    async fn test_list_created_by() {
        let repo = InMemoryRoomRepository::new();
        repo.create_room(&test_room("room-1", "a@x.com"))
            .await
            .unwrap();
        repo.create_room(&test_room("room-2", "a@x.com"))
            .await
            .unwrap();
        repo.create_room(&test_room("room-3", "b@x.com"))
            .await
            .unwrap();

        let created = repo.list_created_by("a@x.com").await.unwrap();
        assert_eq!(created.len(), 2);
        let codes: std::collections::HashSet<String> =
            created.iter().map(|r| r.room_code.clone()).collect();
        assert!(codes.contains("room-1"));
        assert!(codes.contains("room-2"));
    }

    #[tokio::test]
    async fn test_list_joined_by_excludes_creator() {
        let repo = InMemoryRoomRepository::new();
        repo.create_room(&test_room("room-1", "a@x.com"))
            .await
            .unwrap();
        repo.create_room(&test_room("room-2", "b@x.com"))
            .await
            .unwrap();

        // a@x.com is active in both, but created room-1
        repo.add_active_user("room-1", "a@x.com").await.unwrap();
        repo.add_active_user("room-2", "a@x.com").await.unwrap();

        let joined = repo.list_joined_by("a@x.com").await.unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].room_code, "room-2");
    }
}
