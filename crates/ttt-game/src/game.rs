//! Rules engine for one match.
//!
//! State machine:
//!
//! ```text
//! InProgress(turn) --legal move--> InProgress(turn.other())
//! InProgress       --completes a line--> Won(side)
//! InProgress       --fills the board--> Drawn
//! Won | Drawn      --rematch--> InProgress(X), sides swapped
//! ```
//!
//! Every accepted command also appends a human-readable chat line, so the
//! chat log doubles as an audit trail of the match.

use tracing::debug;

use crate::errors::GameError;
use crate::protocol::ClientCommand;
use crate::types::{
    BOARD_SIZE, ChatMessage, ChatSource, DEFAULT_PLAYER_NAME, MAX_CHAT_CHARS, MAX_NAME_CHARS,
    MAX_PLAYERS, Outcome, Player, PlayerId, Side, State,
};

/// Authoritative state of a match plus the bookkeeping that is not sent to
/// clients.
#[derive(Clone, Debug)]
pub struct Game {
    state: State,
    next_player_id: u32,
}

impl Game {
    /// A fresh match with nobody seated.
    pub fn new() -> Self {
        Self {
            state: State::new(),
            next_player_id: 1,
        }
    }

    /// Current state, borrowed.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Deep copy of the current state.
    pub fn snapshot(&self) -> State {
        self.state.clone()
    }

    /// Whether no player is seated.
    pub fn is_empty(&self) -> bool {
        self.state.players.is_empty()
    }

    /// Number of seated players.
    pub fn player_count(&self) -> usize {
        self.state.players.len()
    }

    /// Look up a seated player.
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.state.players.iter().find(|p| p.id == id)
    }

    /// Seat a new player.
    ///
    /// The first player in an empty match plays X; anyone joining an occupied
    /// match plays O, even when the remaining player is O as well. That quirk
    /// only shows up after a departure followed by a rejoin and is kept until
    /// the intended seating rule is settled.
    pub fn add_player(&mut self, name: &str) -> Result<Player, GameError> {
        if self.state.players.len() >= MAX_PLAYERS {
            return Err(GameError::SessionFull);
        }

        let team = if self.state.players.is_empty() {
            Side::X
        } else {
            Side::O
        };
        let player = Player {
            id: PlayerId(self.next_player_id),
            team,
            name: name.to_owned(),
            wins: 0,
        };
        self.next_player_id += 1;
        self.state.players.push(player.clone());
        self.push_chat(ChatSource::System, format!("{player} has joined the game!"));
        debug!(player_id = %player.id, team = %player.team, "player seated");
        Ok(player)
    }

    /// Unseat a player, returning who left.
    pub fn remove_player(&mut self, id: PlayerId) -> Result<Player, GameError> {
        let index = self.player_index(id)?;
        let player = self.state.players.remove(index);
        self.push_chat(ChatSource::System, format!("{player} has left the game!"));
        debug!(player_id = %id, "player unseated");
        Ok(player)
    }

    /// Apply one command on behalf of a seated player.
    ///
    /// On error the state is unchanged.
    pub fn handle_command(
        &mut self,
        player_id: PlayerId,
        command: ClientCommand,
    ) -> Result<(), GameError> {
        debug!(player_id = %player_id, kind = command.kind(), "handling command");
        match command {
            ClientCommand::ChatMsg { text } => self.post_chat(player_id, &text),
            ClientCommand::Move { space } => self.take_turn(player_id, space),
            ClientCommand::ChangeName { new_name } => self.rename(player_id, &new_name),
            ClientCommand::Rematch => self.rematch(player_id),
        }
    }

    fn post_chat(&mut self, player_id: PlayerId, text: &str) -> Result<(), GameError> {
        let _ = self.player_index(player_id)?;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(GameError::EmptyChat);
        }
        if trimmed.chars().count() > MAX_CHAT_CHARS {
            return Err(GameError::ChatTooLong);
        }
        self.push_chat(ChatSource::Player(player_id), trimmed.to_owned());
        Ok(())
    }

    fn take_turn(&mut self, player_id: PlayerId, space: i64) -> Result<(), GameError> {
        if self.state.winner.is_some() {
            return Err(GameError::GameOver);
        }
        let index = self.player_index(player_id)?;
        let team = self.state.players[index].team;
        if team != self.state.turn {
            return Err(GameError::NotYourTurn);
        }
        let cell = usize::try_from(space)
            .ok()
            .filter(|&cell| cell < BOARD_SIZE)
            .ok_or(GameError::InvalidMove)?;
        if self.state.board.get(cell) != Some(None) {
            return Err(GameError::InvalidMove);
        }

        self.state.board.set(cell, team);
        self.state.turn = team.other();
        self.push_chat(
            ChatSource::Player(player_id),
            format!("Played {team} at ({}, {}).", cell % 3 + 1, cell / 3 + 1),
        );

        if let Some(winner) = self.state.board.winner() {
            self.state.winner = Some(Outcome::Win(winner));
            let mover = &mut self.state.players[index];
            mover.wins += 1;
            let announcement = format!("{mover} wins!");
            self.push_chat(ChatSource::System, announcement);
            debug!(winner = %winner, "match won");
        } else if self.state.board.is_full() {
            self.state.winner = Some(Outcome::Draw);
            self.push_chat(ChatSource::System, "It's a draw!".to_owned());
            debug!("match drawn");
        }
        Ok(())
    }

    fn rename(&mut self, player_id: PlayerId, requested: &str) -> Result<(), GameError> {
        let index = self.player_index(player_id)?;
        let trimmed = requested.trim();
        let name: String = if trimmed.is_empty() {
            DEFAULT_PLAYER_NAME.to_owned()
        } else {
            trimmed.chars().take(MAX_NAME_CHARS).collect()
        };

        let old = std::mem::replace(&mut self.state.players[index].name, name.clone());
        self.push_chat(
            ChatSource::Player(player_id),
            format!("Now my name is \"{name}\"!"),
        );
        self.push_chat(ChatSource::System, format!("{old} is now known as {name}."));
        Ok(())
    }

    fn rematch(&mut self, player_id: PlayerId) -> Result<(), GameError> {
        if self.state.winner.is_none() {
            return Err(GameError::GameNotOver);
        }
        let _ = self.player_index(player_id)?;

        self.push_chat(ChatSource::Player(player_id), "Rematch!".to_owned());
        self.push_chat(ChatSource::System, "Players have swapped sides.".to_owned());
        self.state.board.clear();
        self.state.turn = Side::X;
        self.state.winner = None;
        for player in &mut self.state.players {
            player.team = player.team.other();
        }
        Ok(())
    }

    fn player_index(&self, id: PlayerId) -> Result<usize, GameError> {
        self.state
            .players
            .iter()
            .position(|p| p.id == id)
            .ok_or(GameError::PlayerNotFound)
    }

    fn push_chat(&mut self, source: ChatSource, text: String) {
        let id = self.state.chat.len();
        self.state.chat.push(ChatMessage { id, source, text });
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}
