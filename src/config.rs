use crate::error::{NotionAssistantError, Result};
use crate::types::Credential;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_NOTION_BASE_URL: &str = "https://api.notion.com/v1";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:latest";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// `None` when `NOTION_TOKEN` is unset; fetches then fail with an
    /// authentication error before any request is sent.
    pub notion_token: Option<Credential>,
    pub notion_base_url: Url,
    pub notion_version: String,
    pub ollama_base_url: Url,
    pub ollama_model: String,
    pub timeout: Duration,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => {
                return Err(NotionAssistantError::Config {
                    reason: format!("Failed to read .env file: {}", e),
                })
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let notion_token = var("NOTION_TOKEN").map(Credential::new).transpose()?;

        let notion_base_url = Url::parse(
            &var("NOTION_API_BASE_URL").unwrap_or_else(|| DEFAULT_NOTION_BASE_URL.to_string()),
        )?;
        let ollama_base_url = Url::parse(
            &var("OLLAMA_BASE_URL").unwrap_or_else(|| DEFAULT_OLLAMA_BASE_URL.to_string()),
        )?;

        let timeout_secs = match var("NOTION_ASSISTANT_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| NotionAssistantError::Config {
                reason: format!("NOTION_ASSISTANT_TIMEOUT_SECS must be a number, got '{}'", raw),
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            notion_token,
            notion_base_url,
            notion_version: var("NOTION_VERSION")
                .unwrap_or_else(|| DEFAULT_NOTION_VERSION.to_string()),
            ollama_base_url,
            ollama_model: var("OLLAMA_MODEL").unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None).unwrap()
    }
}
