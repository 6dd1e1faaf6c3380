//! # ttt-game
//!
//! Authoritative model for a single two-player tic-tac-toe match.
//!
//! - [`types`]: wire-visible state (board, players, chat, outcome)
//! - [`game`]: the rules engine that mutates a match
//! - [`protocol`]: inbound command decoding and outbound envelope encoding
//! - [`errors`]: recoverable, user-facing rule violations
//!
//! Everything here is synchronous and lock-free. Callers that share a
//! [`Game`] across tasks wrap it themselves (see `ttt-server`).

#![deny(unsafe_code)]

pub mod errors;
pub mod game;
pub mod protocol;
pub mod types;

pub use errors::GameError;
pub use game::Game;
pub use protocol::{ClientCommand, ProtocolError, ServerMessage, decode_command, encode_message};
pub use types::{Board, ChatMessage, ChatSource, Outcome, Player, PlayerId, Side, State};
