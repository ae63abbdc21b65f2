//! Process configuration, read from the environment once at startup and
//! treated as immutable afterwards.

use ygb_completion::CompletionConfig;

pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: Option<String>,
    pub telegram_api_base: String,
    pub bind: String,
    pub completion: CompletionConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            bot_token: lookup("BOT_TOKEN"),
            telegram_api_base: lookup("TELEGRAM_API_BASE")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.into()),
            bind: lookup("BIND").unwrap_or_else(|| DEFAULT_BIND.into()),
            completion: CompletionConfig::from_lookup(&lookup),
        }
    }

    /// True when every credential the bridge needs is present. Missing
    /// values degrade individual features instead of preventing startup.
    pub fn is_complete(&self) -> bool {
        self.bot_token.is_some() && self.completion.is_configured()
    }
}
