use std::sync::Arc;
use tracing::{debug, warn};

use super::connection_registry::ConnectionRegistry;
use super::messages::ServerEvent;

/// Scoped fan-out of in-room events
///
/// Each room is logically a channel of its subscribed connections;
/// broadcasting enqueues to every subscriber except the sender. Delivery
/// is fire-and-forget: nothing is queued or retried for a recipient that
/// is momentarily gone.
pub struct BroadcastRouter {
    registry: Arc<dyn ConnectionRegistry>,
}

impl BroadcastRouter {
    pub fn new(registry: Arc<dyn ConnectionRegistry>) -> Self {
        Self { registry }
    }

    fn serialize(event: &ServerEvent) -> Option<String> {
        match serde_json::to_string(event) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(error = %e, "Failed to serialize server event");
                None
            }
        }
    }

    /// Direct delivery to a single connection (acknowledgments, targeted
    /// sync replies)
    pub async fn send_to(&self, connection_id: &str, event: &ServerEvent) {
        if let Some(json) = Self::serialize(event) {
            self.registry.send_raw(connection_id, &json).await;
        }
    }

    /// Delivery to every member of a room, optionally excluding one
    /// connection
    pub async fn broadcast(&self, room_code: &str, except: Option<&str>, event: &ServerEvent) {
        if let Some(json) = Self::serialize(event) {
            self.registry.broadcast_raw(room_code, except, &json).await;
        }
    }

    /// Relays a best-effort UI-sync event from a sender to the rest of
    /// its room. Senders that are not in a room are silently dropped -
    /// these are ephemeral events, no error is surfaced.
    pub async fn relay(&self, sender_connection_id: &str, event: &ServerEvent) {
        let room_code = match self.registry.lookup(sender_connection_id).await {
            Some(entry) => match entry.room_code {
                Some(code) => code,
                None => {
                    debug!(
                        connection_id = %sender_connection_id,
                        "Dropping relay from connection without a room"
                    );
                    return;
                }
            },
            None => {
                debug!(
                    connection_id = %sender_connection_id,
                    "Dropping relay from unregistered connection"
                );
                return;
            }
        };

        self.broadcast(&room_code, Some(sender_connection_id), event)
            .await;
    }
}
