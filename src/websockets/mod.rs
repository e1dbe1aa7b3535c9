// Public API
pub use connection_registry::{
    ConnectionEntry, ConnectionRegistry, ConnectionUpdate, InMemoryConnectionRegistry,
};
pub use handler::{websocket_handler, WebsocketReceiveHandler};
pub use messages::{ClientEvent, ServerEvent, UserPresence};
pub use router::BroadcastRouter;
pub use socket::MessageHandler;

// Internal modules
mod connection_registry;
mod handler;
mod messages;
mod router;
mod socket;
