//! Wire codec for browser clients.
//!
//! Inbound payloads are one of:
//!
//! ```text
//! "Rematch"
//! {"ChatMsg":{"text":"..."}}
//! {"Move":{"space":4}}
//! {"ChangeName":{"new_name":"..."}}
//! ```
//!
//! Outbound envelopes are `{"JoinedGame":{...}}`, `{"GameState":{...}}` or
//! `{"Error":"..."}`.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::types::{PlayerId, State};

/// A command sent by a seated player.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub enum ClientCommand {
    /// Post a chat line.
    ChatMsg {
        /// Raw text; trimmed by the rules engine.
        text: String,
    },
    /// Claim a cell.
    Move {
        /// Cell index. Any JSON number is accepted and truncated toward zero;
        /// range is checked by the rules engine.
        #[serde(deserialize_with = "truncated_integer")]
        space: i64,
    },
    /// Change the acting player's display name.
    ChangeName {
        /// Requested name; trimmed and clamped by the rules engine.
        new_name: String,
    },
    /// Start a new match once the current one has ended.
    Rematch,
}

impl ClientCommand {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChatMsg { .. } => "chat",
            Self::Move { .. } => "move",
            Self::ChangeName { .. } => "change_name",
            Self::Rematch => "rematch",
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn truncated_integer<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = f64::deserialize(deserializer)?;
    // `as` saturates on overflow and maps NaN to 0; both end up out of range.
    Ok(value.trunc() as i64)
}

/// An envelope pushed to a client.
#[derive(Clone, Debug, Serialize)]
pub enum ServerMessage {
    /// First message after a successful join.
    JoinedGame {
        /// Session id to reconnect with.
        token: String,
        /// The id assigned to this connection's player.
        player_id: PlayerId,
        /// State at the moment of joining.
        state: State,
    },
    /// Full state after any change.
    GameState(Arc<State>),
    /// A refused command or failed join.
    Error(String),
}

/// Inbound payload did not match any known command shape.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Uniform rejection for every malformed payload.
    #[error("invalid message")]
    InvalidMessage {
        /// Parser detail, for logs only.
        reason: String,
    },
}

impl ProtocolError {
    /// Stable machine-readable code, used for log fields and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidMessage { .. } => "INVALID_MESSAGE",
        }
    }
}

/// Decode one inbound text payload into exactly one command.
pub fn decode_command(payload: &str) -> Result<ClientCommand, ProtocolError> {
    serde_json::from_str(payload).map_err(|e| ProtocolError::InvalidMessage {
        reason: e.to_string(),
    })
}

/// Encode an outbound envelope as JSON text.
pub fn encode_message(message: &ServerMessage) -> Result<String, serde_json::Error> {
    serde_json::to_string(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, ChatSource, Outcome, Side};
    use serde_json::{Value, json};

    #[test]
    fn decodes_rematch() {
        assert_eq!(decode_command(r#""Rematch""#).unwrap(), ClientCommand::Rematch);
    }

    #[test]
    fn decodes_chat() {
        let cmd = decode_command(r#"{"ChatMsg":{"text":"hello"}}"#).unwrap();
        assert_eq!(cmd, ClientCommand::ChatMsg { text: "hello".into() });
    }

    #[test]
    fn decodes_move() {
        let cmd = decode_command(r#"{"Move":{"space":4}}"#).unwrap();
        assert_eq!(cmd, ClientCommand::Move { space: 4 });
    }

    #[test]
    fn move_space_is_truncated() {
        let cmd = decode_command(r#"{"Move":{"space":4.9}}"#).unwrap();
        assert_eq!(cmd, ClientCommand::Move { space: 4 });
        let cmd = decode_command(r#"{"Move":{"space":-0.5}}"#).unwrap();
        assert_eq!(cmd, ClientCommand::Move { space: 0 });
    }

    #[test]
    fn negative_move_space_survives_decoding() {
        let cmd = decode_command(r#"{"Move":{"space":-3}}"#).unwrap();
        assert_eq!(cmd, ClientCommand::Move { space: -3 });
    }

    #[test]
    fn decodes_change_name() {
        let cmd = decode_command(r#"{"ChangeName":{"new_name":"Zed"}}"#).unwrap();
        assert_eq!(cmd, ClientCommand::ChangeName { new_name: "Zed".into() });
    }

    #[test]
    fn rejects_unknown_string() {
        assert!(decode_command(r#""Resign""#).is_err());
    }

    #[test]
    fn rejects_unknown_key() {
        assert!(decode_command(r#"{"Resign":{}}"#).is_err());
    }

    #[test]
    fn rejects_missing_field() {
        assert!(decode_command(r#"{"ChatMsg":{}}"#).is_err());
        assert!(decode_command(r#"{"Move":{}}"#).is_err());
        assert!(decode_command(r#"{"ChangeName":{}}"#).is_err());
    }

    #[test]
    fn rejects_wrong_field_type() {
        assert!(decode_command(r#"{"ChatMsg":{"text":5}}"#).is_err());
        assert!(decode_command(r#"{"Move":{"space":"4"}}"#).is_err());
        assert!(decode_command(r#"{"ChangeName":{"new_name":null}}"#).is_err());
    }

    #[test]
    fn rejects_non_object_payloads() {
        for payload in ["", "not json", "[1,2,3]", "42", "null", r#"{"Move":4}"#] {
            assert!(decode_command(payload).is_err(), "payload {payload:?}");
        }
    }

    #[test]
    fn error_display_is_uniform() {
        let err = decode_command("garbage").unwrap_err();
        assert_eq!(err.to_string(), "invalid message");
        let ProtocolError::InvalidMessage { reason } = err;
        assert!(!reason.is_empty());
    }

    #[test]
    fn command_kinds() {
        assert_eq!(ClientCommand::Rematch.kind(), "rematch");
        assert_eq!(ClientCommand::Move { space: 0 }.kind(), "move");
    }

    #[test]
    fn encodes_error() {
        let json = encode_message(&ServerMessage::Error("game is full".into())).unwrap();
        assert_eq!(json, r#"{"Error":"game is full"}"#);
    }

    #[test]
    fn encodes_game_state() {
        let mut state = State::new();
        state.winner = Some(Outcome::Win(Side::O));
        let json = encode_message(&ServerMessage::GameState(Arc::new(state))).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["GameState"]["winner"], json!({"Win": "O"}));
        assert_eq!(value["GameState"]["turn"], "X");
    }

    #[test]
    fn encodes_joined_game() {
        let mut state = State::new();
        state.chat.push(ChatMessage {
            id: 0,
            source: ChatSource::Player(PlayerId(1)),
            text: "hi".into(),
        });
        let msg = ServerMessage::JoinedGame {
            token: "abc".into(),
            player_id: PlayerId(1),
            state,
        };
        let value: Value = serde_json::from_str(&encode_message(&msg).unwrap()).unwrap();
        assert_eq!(value["JoinedGame"]["token"], "abc");
        assert_eq!(value["JoinedGame"]["player_id"], 1);
        assert_eq!(value["JoinedGame"]["state"]["chat"][0]["source"], json!({"Player": 1}));
        assert_eq!(value.as_object().unwrap().len(), 1);
    }
}
