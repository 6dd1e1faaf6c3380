//! WebSocket connection state, heartbeat, command dispatch and the
//! per-connection loop.

pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod lifecycle;
