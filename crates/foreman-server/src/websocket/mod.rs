//! WebSocket fan-out: connections, broadcast manager, event bridge.

pub mod broadcast;
pub mod connection;
pub mod event_bridge;

pub use broadcast::BroadcastManager;
pub use connection::{ClientConnection, ConnectionScope};
pub use event_bridge::EventBridge;
