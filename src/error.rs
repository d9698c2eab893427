use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotionAssistantError {
    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },

    #[error("Resource not found or not shared with the integration: {id}")]
    NotFound { id: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid page reference: {input}")]
    InvalidPageReference { input: String },

    #[error("HTTP status error: {status} ({code}): {message}")]
    HttpStatus {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Unexpected response from Notion: {reason}")]
    InvalidResponse { reason: String },

    #[error("Text generation failed: {reason}")]
    Generation { reason: String },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error("Output directory error: {reason}")]
    OutputDirectory { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, NotionAssistantError>;
