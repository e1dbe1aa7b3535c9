use async_trait::async_trait;
use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::session::SessionCoordinator;
use crate::shared::AppState;
use crate::websockets::messages::{ClientEvent, ServerEvent};
use crate::websockets::router::BroadcastRouter;

use super::socket::{Connection, MessageHandler};

/// Routes parsed client events to the session coordinator or, for
/// best-effort UI-sync events, straight to the broadcast router.
pub struct WebsocketReceiveHandler {
    coordinator: Arc<SessionCoordinator>,
    router: Arc<BroadcastRouter>,
}

impl WebsocketReceiveHandler {
    pub fn new(coordinator: Arc<SessionCoordinator>, router: Arc<BroadcastRouter>) -> Self {
        Self {
            coordinator,
            router,
        }
    }
}

#[async_trait]
impl MessageHandler for WebsocketReceiveHandler {
    async fn handle_message(&self, connection_id: &str, message: String) {
        let event = match serde_json::from_str::<ClientEvent>(&message) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "Failed to parse client event"
                );
                return;
            }
        };

        match event {
            // Session lifecycle goes through the coordinator
            ClientEvent::CreateRoom {
                name,
                pass_code,
                email,
            } => {
                self.coordinator
                    .handle_create_room(connection_id, &name, &pass_code, &email)
                    .await;
            }
            ClientEvent::JoinRoom {
                room_code,
                pass_code,
                email,
            } => {
                self.coordinator
                    .handle_join_room(connection_id, &room_code, &pass_code, &email)
                    .await;
            }
            // The registry entry is authoritative for which room the
            // connection is leaving; the payload is not trusted
            ClientEvent::LeaveRoom { .. } => {
                self.coordinator.handle_leave_room(connection_id).await;
            }
            ClientEvent::GetRooms { email } => {
                self.coordinator
                    .handle_get_rooms(connection_id, &email)
                    .await;
            }

            // Presence events mutate the registry before fanning out
            ClientEvent::CursorPosition { cursor_position } => {
                self.coordinator
                    .handle_cursor_position(connection_id, cursor_position)
                    .await;
            }
            ClientEvent::TypingStart { current_file } => {
                self.coordinator
                    .handle_typing_start(connection_id, current_file)
                    .await;
            }
            ClientEvent::TypingPause => {
                self.coordinator.handle_typing_pause(connection_id).await;
            }
            ClientEvent::ContentChange { content } => {
                self.coordinator
                    .handle_content_change(connection_id, content)
                    .await;
            }

            // Chat
            ClientEvent::SendMessage { message } => {
                self.router
                    .relay(connection_id, &ServerEvent::ReceiveMessage { message })
                    .await;
            }

            // File-tree mutations are fire-and-forget room broadcasts
            ClientEvent::SyncFileStructure {
                file_structure,
                open_files,
                active_files,
                connection_id: target,
            } => {
                self.router
                    .send_to(
                        &target,
                        &ServerEvent::SyncFileStructure {
                            file_structure,
                            open_files,
                            active_files,
                        },
                    )
                    .await;
            }
            ClientEvent::DirectoryCreated {
                parent_dir_id,
                new_directory,
            } => {
                self.router
                    .relay(
                        connection_id,
                        &ServerEvent::DirectoryCreated {
                            parent_dir_id,
                            new_directory,
                        },
                    )
                    .await;
            }
            ClientEvent::DirectoryRenamed { dir_id, new_name } => {
                self.router
                    .relay(
                        connection_id,
                        &ServerEvent::DirectoryRenamed { dir_id, new_name },
                    )
                    .await;
            }
            ClientEvent::DirectoryDeleted { dir_id } => {
                self.router
                    .relay(connection_id, &ServerEvent::DirectoryDeleted { dir_id })
                    .await;
            }
            ClientEvent::FileCreated {
                parent_dir_id,
                new_file,
            } => {
                self.router
                    .relay(
                        connection_id,
                        &ServerEvent::FileCreated {
                            parent_dir_id,
                            new_file,
                        },
                    )
                    .await;
            }
            ClientEvent::FileUpdated {
                file_id,
                new_content,
            } => {
                self.router
                    .relay(
                        connection_id,
                        &ServerEvent::FileUpdated {
                            file_id,
                            new_content,
                        },
                    )
                    .await;
            }
            ClientEvent::FileRenamed { file_id, new_name } => {
                self.router
                    .relay(
                        connection_id,
                        &ServerEvent::FileRenamed { file_id, new_name },
                    )
                    .await;
            }
            ClientEvent::FileDeleted { file_id } => {
                self.router
                    .relay(connection_id, &ServerEvent::FileDeleted { file_id })
                    .await;
            }

            // Drawing: requests carry the requester id so a peer can
            // answer with a targeted sync
            ClientEvent::RequestDrawing => {
                self.router
                    .relay(
                        connection_id,
                        &ServerEvent::RequestDrawing {
                            connection_id: connection_id.to_string(),
                        },
                    )
                    .await;
            }
            ClientEvent::SyncDrawing {
                drawing_data,
                connection_id: target,
            } => {
                self.router
                    .send_to(&target, &ServerEvent::SyncDrawing { drawing_data })
                    .await;
            }
            ClientEvent::DrawingUpdate { snapshot } => {
                self.router
                    .relay(connection_id, &ServerEvent::DrawingUpdate { snapshot })
                    .await;
            }
        }
    }
}

/// WebSocket endpoint
///
/// GET /ws - the connection starts idle; room membership is established
/// by create_room / join_room events over the socket.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, app_state))
}

/// Handle the upgraded WebSocket connection
async fn handle_websocket_connection(socket: axum::extract::ws::WebSocket, app_state: AppState) {
    let connection_id = Uuid::new_v4().to_string();

    info!(connection_id = %connection_id, "WebSocket connection established");

    // Outbound channel (app -> client), registered so the router can
    // reach this connection
    let (outbound_sender, outbound_receiver) = mpsc::unbounded_channel::<String>();
    app_state
        .registry
        .register(connection_id.clone(), outbound_sender)
        .await;

    let message_handler = Arc::new(WebsocketReceiveHandler::new(
        Arc::clone(&app_state.coordinator),
        Arc::clone(&app_state.router),
    ));

    let connection = Connection::new(
        connection_id.clone(),
        Box::new(socket),
        outbound_receiver,
        message_handler,
    );

    match connection.run().await {
        Ok(()) => {
            info!(connection_id = %connection_id, "WebSocket connection closed cleanly");
        }
        Err(e) => {
            warn!(
                connection_id = %connection_id,
                error = ?e,
                "WebSocket connection error"
            );
        }
    }

    // Teardown cleanup runs synchronously relative to the transport
    // closing: resolve membership, notify the room, drop the entry
    app_state
        .coordinator
        .handle_disconnect(&connection_id)
        .await;
}
