//! Completion credentials and endpoint settings, read once at startup.

use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://llm.api.cloud.yandex.net";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const MODEL_NAME: &str = "yandexgpt-lite";

#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: Option<String>,
    pub folder_id: Option<String>,
    pub api_base: String,
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            folder_id: None,
            api_base: DEFAULT_API_BASE.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CompletionConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api_key: lookup("YAGPT_API_KEY"),
            folder_id: lookup("YAGPT_FOLDER_ID"),
            api_base: lookup("YAGPT_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// True once both the API key and the folder id are present.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.folder_id.is_some()
    }

    /// Model URI in the `gpt://{folder}/yandexgpt-lite` form, `None` until a
    /// folder id is configured.
    pub fn model_uri(&self) -> Option<String> {
        self.folder_id
            .as_ref()
            .map(|folder| format!("gpt://{folder}/{MODEL_NAME}"))
    }
}
