//! Inbound command dispatch: decode a text frame and apply it to the
//! player's session.

use metrics::counter;
use tracing::{debug, instrument};
use ttt_game::{PlayerId, ServerMessage, decode_command};

use crate::metrics::{COMMAND_ERRORS_TOTAL, COMMANDS_TOTAL};
use crate::session::Session;

/// Handle one inbound text payload from `player`.
///
/// Returns the reply for the sender only. Accepted commands return `None`:
/// the resulting state reaches every player, sender included, through the
/// session broadcast.
#[instrument(skip_all, fields(player_id = %player, kind))]
pub fn handle_text(text: &str, session: &Session, player: PlayerId) -> Option<ServerMessage> {
    let command = match decode_command(text) {
        Ok(command) => command,
        Err(e) => {
            let ttt_game::ProtocolError::InvalidMessage { reason } = &e;
            debug!(reason = %reason, len = text.len(), "undecodable message");
            counter!(COMMAND_ERRORS_TOTAL, "code" => e.code()).increment(1);
            return Some(ServerMessage::Error(e.to_string()));
        }
    };

    let kind = command.kind();
    let _ = tracing::Span::current().record("kind", kind);
    counter!(COMMANDS_TOTAL, "kind" => kind).increment(1);

    match session.apply(player, command) {
        Ok(()) => None,
        Err(e) => {
            debug!(code = e.code(), "command refused");
            counter!(COMMAND_ERRORS_TOTAL, "code" => e.code()).increment(1);
            Some(ServerMessage::Error(e.to_string()))
        }
    }
}
