// Public API - what other modules can use
pub use coordinator::SessionCoordinator;

// Internal modules
mod coordinator;
