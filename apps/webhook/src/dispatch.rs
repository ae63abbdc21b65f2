//! Routes one normalized update to the greeting, help, or freeform handler.

use std::sync::Arc;

use ygb_completion::{CompletionApi, fallback_reply};
use ygb_telegram::{BotApi, BotError, OutgoingMessage, TYPING_ACTION};

use crate::update::{ChatUpdate, Command};

pub const HELP_TEXT: &str = "📚 **Доступные команды:**\n\
    /start - приветствие\n\
    /help - эта справка\n\n\
    Просто отправь любой текст, и я отвечу с помощью Yandex GPT.";

pub const INTERNAL_ERROR_REPLY: &str = "Извините, произошла внутренняя ошибка.";

const MARKDOWN: &str = "Markdown";

pub fn welcome_text(name: &str) -> String {
    format!(
        "👋 Привет, {name}!\n\n\
         Я бот на базе **Yandex GPT**, работающий на серверлес-технологиях \
         Yandex Cloud. Я могу ответить на твои вопросы.\n\n\
         Просто напиши мне что-нибудь, и я передам твой запрос нейросети!"
    )
}

pub struct Dispatcher {
    bot: Arc<dyn BotApi>,
    completion: Arc<dyn CompletionApi>,
}

impl Dispatcher {
    pub fn new(bot: Arc<dyn BotApi>, completion: Arc<dyn CompletionApi>) -> Self {
        Self { bot, completion }
    }

    /// Handles one update. Command sends surface their errors to the caller;
    /// freeform handling degrades internally and never fails.
    pub async fn dispatch(&self, update: &ChatUpdate) -> Result<(), BotError> {
        match update.command {
            Some(Command::Start) => {
                let message = OutgoingMessage {
                    chat_id: update.chat_id,
                    text: welcome_text(&update.sender_name),
                    parse_mode: Some(MARKDOWN.into()),
                    reply_to_message_id: None,
                };
                self.bot.send_message(&message).await
            }
            Some(Command::Help) => {
                let message = OutgoingMessage {
                    chat_id: update.chat_id,
                    text: HELP_TEXT.into(),
                    parse_mode: Some(MARKDOWN.into()),
                    reply_to_message_id: None,
                };
                self.bot.send_message(&message).await
            }
            None => {
                self.freeform(update).await;
                Ok(())
            }
        }
    }

    async fn freeform(&self, update: &ChatUpdate) {
        if let Err(err) = self.bot.send_chat_action(update.chat_id, TYPING_ACTION).await {
            tracing::warn!("send typing action failed: {err}");
        }

        let reply = match self.completion.complete(&update.text).await {
            Ok(text) => text,
            Err(err) => {
                tracing::error!("completion request failed: {err}");
                fallback_reply(&err).to_string()
            }
        };

        let message = OutgoingMessage {
            chat_id: update.chat_id,
            text: reply,
            parse_mode: None,
            reply_to_message_id: Some(update.message_id),
        };
        if let Err(err) = self.bot.send_message(&message).await {
            tracing::error!("reply failed: {err}");
            let apology = OutgoingMessage {
                chat_id: update.chat_id,
                text: INTERNAL_ERROR_REPLY.into(),
                parse_mode: None,
                reply_to_message_id: Some(update.message_id),
            };
            if let Err(err) = self.bot.send_message(&apology).await {
                tracing::error!("error reply failed: {err}");
            }
        }
    }
}
