use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::room::models::RoomModel;
use crate::websockets::connection_registry::ConnectionEntry;

/// Presence snapshot of one user, as carried on broadcast events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserPresence {
    pub email: String,
    pub cursor_position: i64,
    pub typing: bool,
    pub current_file: Option<String>,
}

impl From<&ConnectionEntry> for UserPresence {
    fn from(entry: &ConnectionEntry) -> Self {
        Self {
            email: entry.email.clone().unwrap_or_default(),
            cursor_position: entry.cursor_position,
            typing: entry.typing,
            current_file: entry.current_file.clone(),
        }
    }
}

/// Events a client sends to the server
///
/// One closed enum per direction; both sides of the contract share these
/// definitions, and `room_code` is the single canonical name for a room
/// identifier on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    // Session lifecycle
    CreateRoom {
        name: String,
        pass_code: String,
        email: String,
    },
    JoinRoom {
        room_code: String,
        pass_code: String,
        email: String,
    },
    LeaveRoom {
        room_code: String,
        email: String,
    },
    GetRooms {
        email: String,
    },

    // Editor
    ContentChange {
        content: String,
    },
    CursorPosition {
        cursor_position: i64,
    },
    TypingStart {
        current_file: Option<String>,
    },
    TypingPause,

    // Chat
    SendMessage {
        message: Value,
    },

    // File tree
    SyncFileStructure {
        file_structure: Value,
        open_files: Value,
        active_files: Value,
        connection_id: String,
    },
    DirectoryCreated {
        parent_dir_id: String,
        new_directory: Value,
    },
    DirectoryRenamed {
        dir_id: String,
        new_name: String,
    },
    DirectoryDeleted {
        dir_id: String,
    },
    FileCreated {
        parent_dir_id: String,
        new_file: Value,
    },
    FileUpdated {
        file_id: String,
        new_content: String,
    },
    FileRenamed {
        file_id: String,
        new_name: String,
    },
    FileDeleted {
        file_id: String,
    },

    // Drawing
    RequestDrawing,
    SyncDrawing {
        drawing_data: Value,
        connection_id: String,
    },
    DrawingUpdate {
        snapshot: Value,
    },
}

/// Events the server sends to clients, directly or by room broadcast
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    // Direct acknowledgments
    RoomCreated {
        room: RoomModel,
    },
    RoomJoined {
        room: RoomModel,
        message: String,
    },
    RoomError {
        message: String,
    },
    /// Distinct from `room_error` so clients discard cached passcodes
    PasscodeError {
        message: String,
    },
    RoomsData {
        created_rooms: Vec<RoomModel>,
        joined_rooms: Vec<RoomModel>,
    },

    // Membership broadcasts
    UserJoined {
        email: String,
        active_users: Vec<String>,
        room: RoomModel,
    },
    UserDisconnected {
        user: UserPresence,
        active_users: Vec<String>,
    },

    // Editor broadcasts
    ContentChange {
        content: String,
        email: String,
    },
    CursorPosition {
        user: UserPresence,
        cursor_position: i64,
    },
    TypingStart {
        user: UserPresence,
    },
    TypingPause {
        user: UserPresence,
    },

    // Chat broadcast
    ReceiveMessage {
        message: Value,
    },

    // File tree broadcasts (sync is a targeted delivery to one peer)
    SyncFileStructure {
        file_structure: Value,
        open_files: Value,
        active_files: Value,
    },
    DirectoryCreated {
        parent_dir_id: String,
        new_directory: Value,
    },
    DirectoryRenamed {
        dir_id: String,
        new_name: String,
    },
    DirectoryDeleted {
        dir_id: String,
    },
    FileCreated {
        parent_dir_id: String,
        new_file: Value,
    },
    FileUpdated {
        file_id: String,
        new_content: String,
    },
    FileRenamed {
        file_id: String,
        new_name: String,
    },
    FileDeleted {
        file_id: String,
    },

    // Drawing broadcasts
    RequestDrawing {
        connection_id: String,
    },
    SyncDrawing {
        drawing_data: Value,
    },
    DrawingUpdate {
        snapshot: Value,
    },
}

impl ServerEvent {
    pub fn room_error(message: impl Into<String>) -> Self {
        ServerEvent::RoomError {
            message: message.into(),
        }
    }

    pub fn passcode_error(message: impl Into<String>) -> Self {
        ServerEvent::PasscodeError {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_event_tag_and_field_names() {
        let event: ClientEvent = serde_json::from_value(json!({
            "type": "join_room",
            "room_code": "ABC123",
            "pass_code": "pw1",
            "email": "b@x.com"
        }))
        .unwrap();

        assert_eq!(
            event,
            ClientEvent::JoinRoom {
                room_code: "ABC123".to_string(),
                pass_code: "pw1".to_string(),
                email: "b@x.com".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_event_type_fails_to_parse() {
        let result = serde_json::from_value::<ClientEvent>(json!({
            "type": "not_a_real_event"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_server_event_serializes_with_type_tag() {
        let room = RoomModel::new(
            "ABC123".to_string(),
            "pw1".to_string(),
            "a@x.com".to_string(),
        );
        let event = ServerEvent::RoomCreated { room };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "room_created");
        assert_eq!(value["room"]["room_code"], "ABC123");
        assert_eq!(value["room"]["pass_code"], "pw1");
    }

    #[test]
    fn test_passcode_error_is_distinct_from_room_error() {
        let passcode = serde_json::to_value(ServerEvent::passcode_error("Invalid pass code"))
            .unwrap();
        let generic = serde_json::to_value(ServerEvent::room_error("Room not found")).unwrap();

        assert_eq!(passcode["type"], "passcode_error");
        assert_eq!(generic["type"], "room_error");
    }

    #[test]
    fn test_unit_variants_round_trip() {
        let event: ClientEvent = serde_json::from_value(json!({
            "type": "typing_pause"
        }))
        .unwrap();
        assert_eq!(event, ClientEvent::TypingPause);

        let event: ClientEvent = serde_json::from_value(json!({
            "type": "request_drawing"
        }))
        .unwrap();
        assert_eq!(event, ClientEvent::RequestDrawing);
    }

    #[test]
    fn test_user_presence_from_entry() {
        let entry = ConnectionEntry {
            connection_id: "conn-1".to_string(),
            email: Some("b@x.com".to_string()),
            room_code: Some("ABC123".to_string()),
            cursor_position: 17,
            typing: true,
            current_file: Some("main.rs".to_string()),
        };

        let presence = UserPresence::from(&entry);
        assert_eq!(presence.email, "b@x.com");
        assert_eq!(presence.cursor_position, 17);
        assert!(presence.typing);
        assert_eq!(presence.current_file.as_deref(), Some("main.rs"));
    }
}
