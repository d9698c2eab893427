//! # Notion Assistant Library
//!
//! Fetches pages and databases from the Notion API with a bearer token,
//! flattens their blocks into ordered text segments, and hands that text to
//! a locally hosted Ollama model.
//!
//! ## Example Usage
//!
//! ```no_run
//! use notion_assistant::{Config, ContentFetcher, OllamaClient, PageReference};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // NOTION_TOKEN, OLLAMA_BASE_URL, ... from the environment or .env
//!     let config = Config::from_env()?;
//!
//!     // Fetch content
//!     let fetcher = ContentFetcher::new(&config)?;
//!     let reference = PageReference::parse("https://www.notion.so/Daily-Log-0f2d3c4b5a6947889a0b1c2d3e4f5a6b")?;
//!     let content = fetcher.fetch(&reference).await?;
//!
//!     // Ask the local model about it
//!     let generator = OllamaClient::new(&config)?;
//!     let answer = generator.answer(&content, "What did I work on?").await?;
//!
//!     println!("{}", answer);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod services;
pub mod types;

// Re-export main types and services for easier usage
pub use config::Config;
pub use error::{NotionAssistantError, Result};
pub use services::{ContentExporter, ContentFetcher, LogEntryParser, OllamaClient};
pub use types::{
    BlockContent, Credential, EntryAnalysis, ExportConfig, ExportResult, FetchedContent,
    LogEntry, NotionBlock, PageContent, PageReference, ResourceKind, RichText, SharedResource,
    TextSegment,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_workflow() {
        let block = |id: &str, block_type: &str, text: &str| NotionBlock {
            id: id.to_string(),
            block_type: block_type.to_string(),
            content: BlockContent {
                rich_text: vec![RichText {
                    plain_text: text.to_string(),
                    annotations: serde_json::Value::Null,
                    href: None,
                }],
                ..Default::default()
            },
            has_children: false,
            children: Vec::new(),
        };

        let page = PageContent {
            id: "0f2d3c4b-5a69-4788-9a0b-1c2d3e4f5a6b".to_string(),
            title: "Test Page".to_string(),
            blocks: vec![
                block("1", "heading_1", "2024-03-28"),
                block("2", "paragraph", "Sample log entry for testing."),
            ],
        };

        // Flatten for the model
        let content = FetchedContent {
            id: page.id.clone(),
            title: page.title.clone(),
            kind: ResourceKind::Page,
            segments: page.flatten(),
        };
        assert_eq!(
            content.texts(),
            vec!["2024-03-28", "Sample log entry for testing."]
        );

        // Split into dated entries
        let parser = LogEntryParser::new(None).unwrap();
        let entries = parser.parse_entries(&page);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].date.to_string(), "2024-03-28");
    }

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
