//! Inbound webhook payloads, deserialized strictly instead of probed as
//! dynamic JSON. Unknown fields are ignored; missing required ones reject
//! the update.

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
    #[serde(default)]
    pub edited_message: Option<TelegramMessage>,
}

impl TelegramUpdate {
    /// Picks the message carried by this update, preferring fresh messages
    /// over edits.
    pub fn extract_message(&self) -> Option<&TelegramMessage> {
        self.message.as_ref().or(self.edited_message.as_ref())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramMessage {
    pub message_id: i64,
    #[serde(default)]
    pub text: Option<String>,
    pub chat: TelegramChat,
    #[serde(default)]
    pub from: Option<TelegramUser>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TelegramUser {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}
