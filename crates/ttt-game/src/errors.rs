//! Rule violations reported back to the acting client.

use thiserror::Error;

/// A command or seat change that the rules refused.
///
/// Every variant is recoverable: the match state is left untouched and the
/// connection stays open. The `Display` text is sent verbatim to clients.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Both seats are taken.
    #[error("game is full")]
    SessionFull,
    /// No seated player has the given id.
    #[error("player not found")]
    PlayerNotFound,
    /// A move arrived after the match ended.
    #[error("game is over")]
    GameOver,
    /// The acting player's side is not the side to move.
    #[error("not your turn")]
    NotYourTurn,
    /// Target cell is out of range or already taken.
    #[error("invalid move")]
    InvalidMove,
    /// Chat text is blank after trimming.
    #[error("chat message must not be empty")]
    EmptyChat,
    /// Chat text exceeds the length limit after trimming.
    #[error("chat message must not be longer than 500 characters")]
    ChatTooLong,
    /// Rematch requested while the match is still running.
    #[error("game is not over")]
    GameNotOver,
}

impl GameError {
    /// Stable machine-readable code, used for log fields and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            Self::SessionFull => "SESSION_FULL",
            Self::PlayerNotFound => "PLAYER_NOT_FOUND",
            Self::GameOver => "GAME_OVER",
            Self::NotYourTurn => "NOT_YOUR_TURN",
            Self::InvalidMove => "INVALID_MOVE",
            Self::EmptyChat => "EMPTY_CHAT",
            Self::ChatTooLong => "CHAT_TOO_LONG",
            Self::GameNotOver => "GAME_NOT_OVER",
        }
    }
}
