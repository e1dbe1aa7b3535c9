use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user currently joined to a room's live session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActiveUser {
    pub email: String,
    pub joined_at: DateTime<Utc>,
}

/// Durable record of a collaboration room
///
/// `room_code` and `pass_code` are immutable after creation. A room is
/// never deleted when `active_users` empties out - emptiness is not
/// destruction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoomModel {
    pub room_code: String,
    pub pass_code: String,
    pub creator_email: String,
    pub created_at: DateTime<Utc>,
    pub active_users: Vec<ActiveUser>,
}

impl RoomModel {
    pub fn new(room_code: String, pass_code: String, creator_email: String) -> Self {
        Self {
            room_code,
            pass_code,
            creator_email,
            created_at: Utc::now(),
            active_users: vec![],
        }
    }

    /// Check if a user is this room's creator
    pub fn is_creator(&self, email: &str) -> bool {
        self.creator_email == email
    }

    pub fn has_active_user(&self, email: &str) -> bool {
        self.active_users.iter().any(|u| u.email == email)
    }

    /// Add a user to the active set; no-op if already present
    pub fn add_active_user(&mut self, email: &str) {
        if !self.has_active_user(email) {
            self.active_users.push(ActiveUser {
                email: email.to_string(),
                joined_at: Utc::now(),
            });
        }
    }

    /// Remove a user from the active set; no-op if absent
    pub fn remove_active_user(&mut self, email: &str) {
        self.active_users.retain(|u| u.email != email);
    }

    /// Emails of all currently active users, in join order
    pub fn active_emails(&self) -> Vec<String> {
        self.active_users.iter().map(|u| u.email.clone()).collect()
    }
}
