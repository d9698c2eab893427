use crate::error::{NotionAssistantError, Result};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;
use url::Url;

/// Bearer token for the Notion API. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into().trim().to_string();
        if token.is_empty() {
            return Err(NotionAssistantError::Authentication {
                reason: "NOTION_TOKEN is empty".to_string(),
            });
        }
        Ok(Self(token))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

fn page_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^([0-9a-f]{8})-?([0-9a-f]{4})-?([0-9a-f]{4})-?([0-9a-f]{4})-?([0-9a-f]{12})$",
        )
        .unwrap()
    })
}

/// Identifier of a Notion page or database, normalized to dashed UUID form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageReference(String);

impl PageReference {
    /// Accepts a raw id (dashed or not) or a Notion URL whose last path
    /// segment ends with one.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let invalid = || NotionAssistantError::InvalidPageReference {
            input: input.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid());
        }

        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            let url = Url::parse(trimmed)?;
            let slug = url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|segment| !segment.is_empty())
                .ok_or_else(invalid)?;

            // Slugs look like "Title-Words-<id>"; try the dashed form first.
            return [36, 32]
                .iter()
                .filter_map(|&len| slug.len().checked_sub(len).and_then(|at| slug.get(at..)))
                .find_map(Self::normalize)
                .map(Self)
                .ok_or_else(invalid);
        }

        Self::normalize(trimmed).map(Self).ok_or_else(invalid)
    }

    fn normalize(candidate: &str) -> Option<String> {
        let captures = page_id_pattern().captures(candidate)?;
        let parts: Vec<String> = (1..=5)
            .filter_map(|i| captures.get(i))
            .map(|m| m.as_str().to_ascii_lowercase())
            .collect();
        Some(parts.join("-"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Page,
    Database,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Page => f.write_str("page"),
            ResourceKind::Database => f.write_str("database"),
        }
    }
}

/// A page or database returned by search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedResource {
    pub id: String,
    pub title: String,
    pub url: String,
    pub kind: ResourceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RichText {
    pub plain_text: String,
    #[serde(default)]
    pub annotations: serde_json::Value,
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockContent {
    pub rich_text: Vec<RichText>,
    pub color: Option<String>,
    pub checked: Option<bool>,
    pub items: Option<Vec<String>>,
    pub language: Option<String>,
    /// Title of `child_page` and `child_database` blocks.
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotionBlock {
    pub id: String,
    pub block_type: String,
    pub content: BlockContent,
    pub has_children: bool,
    pub children: Vec<NotionBlock>,
}

impl NotionBlock {
    pub fn plain_text(&self) -> String {
        if self.content.rich_text.is_empty() {
            return self.content.title.clone().unwrap_or_default();
        }
        self.content
            .rich_text
            .iter()
            .map(|rt| rt.plain_text.as_str())
            .collect()
    }

    pub fn is_heading(&self) -> bool {
        matches!(
            self.block_type.as_str(),
            "heading_1" | "heading_2" | "heading_3"
        )
    }
}

/// Title and block tree of a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    pub id: String,
    pub title: String,
    pub blocks: Vec<NotionBlock>,
}

impl PageContent {
    /// Pre-order flattening of the block tree, skipping blocks without text.
    pub fn flatten(&self) -> Vec<TextSegment> {
        let mut segments = Vec::new();
        for block in &self.blocks {
            push_segments(block, 0, &mut segments);
        }
        segments
    }
}

fn push_segments(block: &NotionBlock, depth: usize, out: &mut Vec<TextSegment>) {
    let text = block.plain_text();
    if !text.is_empty() {
        out.push(TextSegment {
            block_id: block.id.clone(),
            block_type: block.block_type.clone(),
            depth,
            text,
            checked: block.content.checked,
        });
    }
    for child in &block.children {
        push_segments(child, depth + 1, out);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegment {
    pub block_id: String,
    pub block_type: String,
    pub depth: usize,
    pub text: String,
    pub checked: Option<bool>,
}

/// Normalized output of a fetch, ready to hand to a text-generation model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedContent {
    pub id: String,
    pub title: String,
    pub kind: ResourceKind,
    pub segments: Vec<TextSegment>,
}

impl FetchedContent {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    /// Plain text, nested blocks indented two spaces per level.
    pub fn to_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("{}{}", "  ".repeat(s.depth), s.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!("# {}\n\n", self.title);
        for segment in &self.segments {
            let indent = "  ".repeat(segment.depth);
            let line = match segment.block_type.as_str() {
                "heading_1" => format!("## {}", segment.text),
                "heading_2" => format!("### {}", segment.text),
                "heading_3" => format!("#### {}", segment.text),
                "bulleted_list_item" => format!("{}- {}", indent, segment.text),
                "numbered_list_item" => format!("{}1. {}", indent, segment.text),
                "to_do" => {
                    let mark = if segment.checked.unwrap_or(false) { "x" } else { " " };
                    format!("{}- [{}] {}", indent, mark, segment.text)
                }
                "quote" => format!("> {}", segment.text),
                "code" => format!("```\n{}\n```", segment.text),
                _ => format!("{}{}", indent, segment.text),
            };
            out.push_str(&line);
            out.push_str("\n\n");
        }
        out.trim_end().to_string() + "\n"
    }
}

/// The blocks under one date heading of a journal page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub date: NaiveDate,
    pub blocks: Vec<NotionBlock>,
    pub raw_text: String,
    pub summary: Option<String>,
    pub importance: f64,
}

impl LogEntry {
    pub const DEFAULT_IMPORTANCE: f64 = 0.5;

    pub fn new(date: NaiveDate, blocks: Vec<NotionBlock>) -> Self {
        let raw_text = blocks
            .iter()
            .map(NotionBlock::plain_text)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            date,
            blocks,
            raw_text,
            summary: None,
            importance: Self::DEFAULT_IMPORTANCE,
        }
    }

    pub fn apply_analysis(&mut self, analysis: EntryAnalysis) {
        self.summary = Some(analysis.summary);
        self.importance = analysis.importance.clamp(0.0, 1.0);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryAnalysis {
    pub summary: String,
    pub importance: f64,
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
    pub include_metadata: bool,
}

#[derive(Debug, Clone)]
pub struct ExportResult {
    pub output_files: Vec<PathBuf>,
    pub metadata_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: &str, block_type: &str, text: &str, children: Vec<NotionBlock>) -> NotionBlock {
        NotionBlock {
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
            has_children: !children.is_empty(),
            children,
        }
    }

    #[test]
    fn test_page_reference_accepts_dashed_and_plain_ids() {
        let dashed = PageReference::parse("0F2D3C4B-5A69-4788-9A0B-1C2D3E4F5A6B").unwrap();
        let plain = PageReference::parse("0f2d3c4b5a6947889a0b1c2d3e4f5a6b").unwrap();
        assert_eq!(dashed, plain);
        assert_eq!(dashed.as_str(), "0f2d3c4b-5a69-4788-9a0b-1c2d3e4f5a6b");
    }

    #[test]
    fn test_page_reference_extracts_id_from_url() {
        let reference = PageReference::parse(
            "https://www.notion.so/acme/Daily-Log-0f2d3c4b5a6947889a0b1c2d3e4f5a6b?pvs=4",
        )
        .unwrap();
        assert_eq!(reference.as_str(), "0f2d3c4b-5a69-4788-9a0b-1c2d3e4f5a6b");
    }

    #[test]
    fn test_page_reference_rejects_garbage() {
        assert!(PageReference::parse("").is_err());
        assert!(PageReference::parse("   ").is_err());
        assert!(PageReference::parse("not-a-page").is_err());
        assert!(PageReference::parse("x0f2d3c4b5a6947889a0b1c2d3e4f5a6b").is_err());
        assert!(PageReference::parse("https://www.notion.so/").is_err());
    }

    #[test]
    fn test_credential_rejects_empty_and_redacts() {
        assert!(matches!(
            Credential::new("  "),
            Err(NotionAssistantError::Authentication { .. })
        ));
        let credential = Credential::new("secret_abc").unwrap();
        assert_eq!(credential.expose(), "secret_abc");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
    }

    #[test]
    fn test_flatten_is_preorder_and_skips_empty_blocks() {
        let page = PageContent {
            id: "p".to_string(),
            title: "Title".to_string(),
            blocks: vec![
                block("1", "paragraph", "first", vec![block("1a", "paragraph", "nested", vec![])]),
                block("2", "divider", "", vec![]),
                block("3", "paragraph", "last", vec![]),
            ],
        };

        let segments = page.flatten();
        let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "nested", "last"]);
        assert_eq!(segments[1].depth, 1);
    }

    #[test]
    fn test_markdown_rendering() {
        let mut todo = block("2", "to_do", "ship it", vec![]);
        todo.content.checked = Some(true);
        let page = PageContent {
            id: "p".to_string(),
            title: "Plan".to_string(),
            blocks: vec![block("1", "heading_1", "Goals", vec![]), todo],
        };
        let content = FetchedContent {
            id: page.id.clone(),
            title: page.title.clone(),
            kind: ResourceKind::Page,
            segments: page.flatten(),
        };

        let markdown = content.to_markdown();
        assert!(markdown.starts_with("# Plan\n\n## Goals"));
        assert!(markdown.contains("- [x] ship it"));
        assert_eq!(content.to_text(), "Goals\nship it");
    }

    #[test]
    fn test_log_entry_analysis_is_clamped() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 28).unwrap();
        let mut entry = LogEntry::new(date, vec![block("1", "paragraph", "did things", vec![])]);
        assert_eq!(entry.raw_text, "did things");
        assert_eq!(entry.importance, LogEntry::DEFAULT_IMPORTANCE);

        entry.apply_analysis(EntryAnalysis {
            summary: "busy".to_string(),
            importance: 3.0,
        });
        assert_eq!(entry.importance, 1.0);
        assert_eq!(entry.summary.as_deref(), Some("busy"));
    }
}
