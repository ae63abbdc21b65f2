//! Normalizes a raw webhook update into the single-message view the
//! dispatcher works with.

use ygb_telegram::TelegramUpdate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
}

/// One normalized inbound message, discarded after a single handling pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatUpdate {
    pub chat_id: i64,
    pub message_id: i64,
    pub sender_id: Option<i64>,
    pub sender_name: String,
    pub text: String,
    pub command: Option<Command>,
}

/// Parses `/command` or `/command@BotName`, ignoring trailing arguments.
/// Anything else, unrecognized commands included, is freeform text.
pub fn parse_command(text: &str) -> Option<Command> {
    let first = text.split_whitespace().next()?;
    let name = first.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);
    match name {
        "start" => Some(Command::Start),
        "help" => Some(Command::Help),
        _ => None,
    }
}

/// Builds the normalized view from an update. Returns `None` for updates
/// that carry no text message; those are acknowledged and ignored.
pub fn chat_update_from(update: &TelegramUpdate) -> Option<ChatUpdate> {
    let msg = update.extract_message()?;
    let text = msg.text.clone()?;
    Some(ChatUpdate {
        chat_id: msg.chat.id,
        message_id: msg.message_id,
        sender_id: msg.from.as_ref().map(|user| user.id),
        sender_name: msg
            .from
            .as_ref()
            .map(|user| user.first_name.clone())
            .unwrap_or_else(|| "unknown".into()),
        command: parse_command(&text),
        text,
    })
}
