use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::room::service::RoomService;
use crate::shared::AppError;
use crate::websockets::{
    BroadcastRouter, ConnectionRegistry, ConnectionUpdate, ServerEvent, UserPresence,
};

/// Validates and executes the session lifecycle for each connection:
/// create, join, leave and disconnect, plus the presence mutations that
/// ride along with cursor and typing events.
///
/// A connection moves Idle -> Joined -> Left. Idle is a registry entry
/// without email or room, Left is no entry at all. Rejoin is not a
/// distinct state: a reconnecting client replays `join_room` with its
/// cached passcode and the idempotent membership insert reconciles it.
pub struct SessionCoordinator {
    room_service: Arc<RoomService>,
    registry: Arc<dyn ConnectionRegistry>,
    router: Arc<BroadcastRouter>,
}

impl SessionCoordinator {
    pub fn new(
        room_service: Arc<RoomService>,
        registry: Arc<dyn ConnectionRegistry>,
        router: Arc<BroadcastRouter>,
    ) -> Self {
        Self {
            room_service,
            registry,
            router,
        }
    }

    fn error_event(error: &AppError) -> ServerEvent {
        match error {
            AppError::PasscodeMismatch => {
                ServerEvent::passcode_error("Invalid pass code. Please check your pass code and try again.")
            }
            // Store details stay in the server log
            AppError::Store(_) | AppError::Internal => {
                ServerEvent::room_error("A storage error occurred, please try again")
            }
            other => ServerEvent::room_error(other.to_string()),
        }
    }

    /// create_room: Idle -> Joined on success, Idle on any error
    #[instrument(skip(self, pass_code))]
    pub async fn handle_create_room(
        &self,
        connection_id: &str,
        name: &str,
        pass_code: &str,
        email: &str,
    ) {
        let room = match self.room_service.create_room(name, pass_code, email).await {
            Ok(room) => room,
            Err(e) => {
                debug!(connection_id = %connection_id, error = %e, "Room creation rejected");
                self.router
                    .send_to(connection_id, &Self::error_event(&e))
                    .await;
                return;
            }
        };

        self.registry
            .update(
                connection_id,
                ConnectionUpdate {
                    email: Some(email.to_string()),
                    room_code: Some(Some(room.room_code.clone())),
                    ..Default::default()
                },
            )
            .await;

        info!(
            connection_id = %connection_id,
            room_code = %room.room_code,
            "Connection joined newly created room"
        );

        self.router
            .send_to(connection_id, &ServerEvent::RoomCreated { room })
            .await;
    }

    /// join_room: Idle -> Joined on success, Idle on any error. Also the
    /// rejoin path after a transport drop.
    #[instrument(skip(self, pass_code))]
    pub async fn handle_join_room(
        &self,
        connection_id: &str,
        room_code: &str,
        pass_code: &str,
        email: &str,
    ) {
        // The store mutation is awaited before any broadcast derived
        // from it, so members never see a snapshot that was not committed
        let room = match self.room_service.join_room(room_code, pass_code, email).await {
            Ok(room) => room,
            Err(e) => {
                debug!(connection_id = %connection_id, error = %e, "Room join rejected");
                self.router
                    .send_to(connection_id, &Self::error_event(&e))
                    .await;
                return;
            }
        };

        self.registry
            .update(
                connection_id,
                ConnectionUpdate {
                    email: Some(email.to_string()),
                    room_code: Some(Some(room.room_code.clone())),
                    ..Default::default()
                },
            )
            .await;

        // Every member, the joiner included, hears about the join
        self.router
            .broadcast(
                &room.room_code,
                None,
                &ServerEvent::UserJoined {
                    email: email.to_string(),
                    active_users: room.active_emails(),
                    room: room.clone(),
                },
            )
            .await;

        // The joiner additionally gets a direct snapshot to resync from
        self.router
            .send_to(
                connection_id,
                &ServerEvent::RoomJoined {
                    room,
                    message: "Successfully joined the room!".to_string(),
                },
            )
            .await;
    }

    /// Explicit leave_room request. Identical cleanup to a transport
    /// teardown, and idempotent against one that already ran.
    #[instrument(skip(self))]
    pub async fn handle_leave_room(&self, connection_id: &str) {
        self.cleanup_connection(connection_id).await;
    }

    /// Transport teardown. Same terminal transition as an explicit leave.
    #[instrument(skip(self))]
    pub async fn handle_disconnect(&self, connection_id: &str) {
        self.cleanup_connection(connection_id).await;
    }

    /// Shared Joined/any-state -> Left transition. The entry is resolved
    /// through `remove`'s return value, so user and room are always read
    /// before the registry entry is gone.
    async fn cleanup_connection(&self, connection_id: &str) {
        let entry = match self.registry.remove(connection_id).await {
            Some(entry) => entry,
            None => {
                // Cleanup already ran for this connection
                debug!(connection_id = %connection_id, "No registry entry to clean up");
                return;
            }
        };

        let (room_code, email) = match (entry.room_code.clone(), entry.email.clone()) {
            (Some(room_code), Some(email)) => (room_code, email),
            _ => {
                debug!(connection_id = %connection_id, "Idle connection closed");
                return;
            }
        };

        // Best-effort durable cleanup: the registry entry is gone either
        // way, a failed store removal leaves `active_users` stale until
        // the next successful mutation
        let active_users = match self.room_service.leave_room(&room_code, &email).await {
            Ok(Some(room)) => room.active_emails(),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(
                    connection_id = %connection_id,
                    room_code = %room_code,
                    error = %e,
                    "Store unavailable during disconnect cleanup, durable membership may be stale"
                );
                match self.room_service.get_room(&room_code).await {
                    Ok(Some(room)) => room.active_emails(),
                    _ => Vec::new(),
                }
            }
        };

        info!(
            connection_id = %connection_id,
            room_code = %room_code,
            email = %email,
            "Connection left room"
        );

        // The departing entry is already removed, so only remaining
        // members hear this
        self.router
            .broadcast(
                &room_code,
                None,
                &ServerEvent::UserDisconnected {
                    user: UserPresence::from(&entry),
                    active_users,
                },
            )
            .await;
    }

    /// Cursor movement: mutate presence, then fan out to the room
    pub async fn handle_cursor_position(&self, connection_id: &str, cursor_position: i64) {
        let entry = self
            .registry
            .update(
                connection_id,
                ConnectionUpdate {
                    cursor_position: Some(cursor_position),
                    typing: Some(true),
                    ..Default::default()
                },
            )
            .await;

        if let Some(entry) = entry {
            self.router
                .relay(
                    connection_id,
                    &ServerEvent::CursorPosition {
                        user: UserPresence::from(&entry),
                        cursor_position,
                    },
                )
                .await;
        }
    }

    pub async fn handle_typing_start(&self, connection_id: &str, current_file: Option<String>) {
        let entry = self
            .registry
            .update(
                connection_id,
                ConnectionUpdate {
                    typing: Some(true),
                    current_file: Some(current_file),
                    ..Default::default()
                },
            )
            .await;

        if let Some(entry) = entry {
            self.router
                .relay(
                    connection_id,
                    &ServerEvent::TypingStart {
                        user: UserPresence::from(&entry),
                    },
                )
                .await;
        }
    }

    pub async fn handle_typing_pause(&self, connection_id: &str) {
        let entry = self
            .registry
            .update(
                connection_id,
                ConnectionUpdate {
                    typing: Some(false),
                    ..Default::default()
                },
            )
            .await;

        if let Some(entry) = entry {
            self.router
                .relay(
                    connection_id,
                    &ServerEvent::TypingPause {
                        user: UserPresence::from(&entry),
                    },
                )
                .await;
        }
    }

    /// Whole-buffer edit relayed with the sender's identity attached.
    /// Last write wins; there is no merge in this core.
    pub async fn handle_content_change(&self, connection_id: &str, content: String) {
        let entry = match self.registry.lookup(connection_id).await {
            Some(entry) => entry,
            None => return,
        };

        if let Some(email) = entry.email {
            self.router
                .relay(connection_id, &ServerEvent::ContentChange { content, email })
                .await;
        }
    }

    /// Dashboard query surface: created and joined rooms for one user
    #[instrument(skip(self))]
    pub async fn handle_get_rooms(&self, connection_id: &str, email: &str) {
        match self.room_service.rooms_for_dashboard(email).await {
            Ok(dashboard) => {
                self.router
                    .send_to(
                        connection_id,
                        &ServerEvent::RoomsData {
                            created_rooms: dashboard.created,
                            joined_rooms: dashboard.joined,
                        },
                    )
                    .await;
            }
            Err(e) => {
                warn!(email = %email, error = %e, "Failed to fetch dashboard rooms");
                self.router
                    .send_to(connection_id, &Self::error_event(&e))
                    .await;
            }
        }
    }
}
