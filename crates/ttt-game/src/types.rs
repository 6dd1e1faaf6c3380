//! Match state as it is stored and as it appears on the wire.
//!
//! The serialized shape is shared with existing browser clients, so every
//! `Serialize` impl here is part of the protocol:
//!
//! ```text
//! {"turn":"X","winner":null,"players":[...],"board":[" ","X",...],"chat":[...]}
//! ```

use std::fmt;

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

/// Number of cells on the board.
pub const BOARD_SIZE: usize = 9;

/// Maximum number of seated players per match.
pub const MAX_PLAYERS: usize = 2;

/// Display names are clamped to this many characters.
pub const MAX_NAME_CHARS: usize = 32;

/// Chat messages longer than this (after trimming) are rejected.
pub const MAX_CHAT_CHARS: usize = 500;

/// Name used when a player supplies a blank one.
pub const DEFAULT_PLAYER_NAME: &str = "Unnamed Player";

/// Rows, columns and diagonals of the 3×3 grid.
pub const WINNING_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// One of the two marks a player can own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Moves first in a fresh match.
    X,
    /// Moves second in a fresh match.
    O,
}

impl Side {
    /// The opposing side.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            Self::X => Self::O,
            Self::O => Self::X,
        }
    }

    /// Single-character wire form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::O => "O",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a finished match ended.
///
/// Serialized externally tagged: `"Draw"` or `{"Win":"X"}`. An ongoing match
/// is represented by `Option::None` (`null`) on [`State::winner`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// The given side completed a line.
    Win(Side),
    /// Every cell is taken and nobody completed a line.
    Draw,
}

/// Session-scoped player identifier. Assigned from 1 upward, never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A seated participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    /// Identifier within the session.
    pub id: PlayerId,
    /// Side currently played.
    pub team: Side,
    /// Display name, at most [`MAX_NAME_CHARS`] characters.
    pub name: String,
    /// Matches won in this session.
    pub wins: u32,
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.team)
    }
}

/// Who authored a chat line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatSource {
    /// A specific player.
    Player(PlayerId),
    /// The server itself (joins, departures, results).
    System,
}

/// One entry of the append-only chat log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Dense, strictly increasing index starting at 0.
    pub id: usize,
    /// Author.
    pub source: ChatSource,
    /// Message body.
    pub text: String,
}

/// The 3×3 grid, stored row-major.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Board([Option<Side>; BOARD_SIZE]);

impl Board {
    /// An empty board.
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of `index`, or `None` when out of range.
    pub fn get(&self, index: usize) -> Option<Option<Side>> {
        self.0.get(index).copied()
    }

    /// Claim a cell. Caller validates range and vacancy.
    pub(crate) fn set(&mut self, index: usize, side: Side) {
        self.0[index] = Some(side);
    }

    /// Empty every cell.
    pub(crate) fn clear(&mut self) {
        self.0 = [None; BOARD_SIZE];
    }

    /// Iterate the cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Option<Side>> + '_ {
        self.0.iter().copied()
    }

    /// Whether no empty cell remains.
    pub fn is_full(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    /// The side owning a complete line, if any.
    pub fn winner(&self) -> Option<Side> {
        WINNING_LINES.iter().find_map(|&[a, b, c]| {
            let side = self.0[a]?;
            (self.0[b] == Some(side) && self.0[c] == Some(side)).then_some(side)
        })
    }
}

impl Serialize for Board {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(BOARD_SIZE))?;
        for cell in &self.0 {
            seq.serialize_element(cell.map_or(" ", Side::as_str))?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Board {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct BoardVisitor;

        impl<'de> Visitor<'de> for BoardVisitor {
            type Value = Board;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "an array of {BOARD_SIZE} cells (\" \", \"X\" or \"O\")")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Board, A::Error> {
                let mut cells = [None; BOARD_SIZE];
                for (i, cell) in cells.iter_mut().enumerate() {
                    let raw: String = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                    *cell = match raw.as_str() {
                        " " => None,
                        "X" => Some(Side::X),
                        "O" => Some(Side::O),
                        other => {
                            return Err(de::Error::invalid_value(
                                de::Unexpected::Str(other),
                                &"\" \", \"X\" or \"O\"",
                            ));
                        }
                    };
                }
                if seq.next_element::<de::IgnoredAny>()?.is_some() {
                    return Err(de::Error::invalid_length(BOARD_SIZE + 1, &self));
                }
                Ok(Board(cells))
            }
        }

        deserializer.deserialize_seq(BoardVisitor)
    }
}

/// Full state of one match, as pushed to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Side to move next. Meaningless once `winner` is set.
    pub turn: Side,
    /// `None` while the match is in progress.
    pub winner: Option<Outcome>,
    /// Seated players in join order, at most [`MAX_PLAYERS`].
    pub players: Vec<Player>,
    /// The grid.
    pub board: Board,
    /// Chat and audit log.
    pub chat: Vec<ChatMessage>,
}

impl State {
    /// A fresh match: X to move, empty board, nobody seated.
    pub fn new() -> Self {
        Self {
            turn: Side::X,
            winner: None,
            players: Vec::new(),
            board: Board::new(),
            chat: Vec::new(),
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}
