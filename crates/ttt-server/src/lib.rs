//! # ttt-server
//!
//! Axum HTTP + `WebSocket` server for live tic-tac-toe sessions.
//!
//! - `WebSocket` gateway: join by token, heartbeat, command dispatch
//! - Session registry with delayed cleanup of abandoned sessions
//! - Per-player bounded snapshot queues (a slow client never stalls a match)
//! - HTTP endpoints: health, Prometheus metrics, robots.txt, frontend redirect
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod broadcast;
pub mod config;
pub mod health;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod websocket;
