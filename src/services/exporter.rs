use crate::error::{NotionAssistantError, Result};
use crate::types::{ExportConfig, ExportResult, FetchedContent, LogEntry};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

pub struct ContentExporter;

impl ContentExporter {
    /// Writes the page as `<slug>.md`, plus `<slug>_metadata.json` if enabled.
    pub async fn export_page(
        content: &FetchedContent,
        config: &ExportConfig,
    ) -> Result<ExportResult> {
        info!("Exporting '{}' to {}", content.title, config.output_dir.display());

        Self::ensure_output_directory(&config.output_dir).await?;

        let slug = Self::slugify(&content.title);
        let output_file = config.output_dir.join(format!("{}.md", slug));
        Self::write_file(&output_file, &content.to_markdown()).await?;
        let output_files = vec![output_file];

        let metadata_file = if config.include_metadata {
            let metadata_path = Self::generate_metadata_filename(&config.output_dir, &slug);
            let metadata = serde_json::json!({
                "id": content.id,
                "title": content.title,
                "kind": content.kind,
                "segments": content.segments.len(),
                "exported_at": chrono::Utc::now().to_rfc3339(),
                "files": Self::file_names(&output_files),
            });
            Self::write_metadata_file(&metadata_path, &metadata).await?;
            Some(metadata_path)
        } else {
            None
        };

        Ok(ExportResult {
            output_files,
            metadata_file,
        })
    }

    /// Writes one `<slug>_<YYYY-MM-DD>.md` file per log entry.
    pub async fn export_entries(
        title: &str,
        entries: &[LogEntry],
        config: &ExportConfig,
    ) -> Result<ExportResult> {
        info!(
            "Exporting {} log entries from '{}' to {}",
            entries.len(),
            title,
            config.output_dir.display()
        );

        if entries.is_empty() {
            return Err(NotionAssistantError::OutputDirectory {
                reason: format!("Page '{}' has no dated log entries to export", title),
            });
        }

        Self::ensure_output_directory(&config.output_dir).await?;

        let slug = Self::slugify(title);
        let mut output_files: Vec<PathBuf> = Vec::new();

        for entry in entries {
            let mut path = Self::generate_entry_filename(&config.output_dir, &slug, entry, 1);
            // Two headings with the same date get numbered files.
            let mut occurrence = 1;
            while output_files.contains(&path) {
                occurrence += 1;
                path = Self::generate_entry_filename(&config.output_dir, &slug, entry, occurrence);
            }

            Self::write_file(&path, &Self::render_entry(entry)).await?;
            debug!("Wrote entry {} to {}", entry.date, path.display());
            output_files.push(path);
        }

        let metadata_file = if config.include_metadata {
            let metadata_path = Self::generate_metadata_filename(&config.output_dir, &slug);
            let metadata = serde_json::json!({
                "title": title,
                "total_entries": entries.len(),
                "exported_at": chrono::Utc::now().to_rfc3339(),
                "entries": entries.iter().zip(&output_files).map(|(entry, path)| {
                    serde_json::json!({
                        "date": entry.date.to_string(),
                        "summary": entry.summary,
                        "importance": entry.importance,
                        "filename": Self::file_name(path),
                    })
                }).collect::<Vec<_>>(),
            });
            Self::write_metadata_file(&metadata_path, &metadata).await?;
            Some(metadata_path)
        } else {
            None
        };

        info!("Exported {} entry files", output_files.len());
        Ok(ExportResult {
            output_files,
            metadata_file,
        })
    }

    fn render_entry(entry: &LogEntry) -> String {
        let mut content = format!("# {}\n\n", entry.date.format("%Y-%m-%d"));
        if let Some(summary) = &entry.summary {
            content.push_str(&format!(
                "> {}\n>\n> Importance: {:.2}\n\n",
                summary, entry.importance
            ));
        }
        // The first block is the date heading itself.
        for block in entry.blocks.iter().skip(1) {
            let text = block.plain_text();
            if !text.is_empty() {
                content.push_str(&text);
                content.push_str("\n\n");
            }
        }
        content.trim_end().to_string() + "\n"
    }

    async fn ensure_output_directory(output_dir: &Path) -> Result<()> {
        if !output_dir.exists() {
            fs::create_dir_all(output_dir).await.map_err(|e| {
                NotionAssistantError::OutputDirectory {
                    reason: format!("Failed to create output directory: {}", e),
                }
            })?;
            info!("Created output directory: {}", output_dir.display());
        }
        Ok(())
    }

    fn generate_entry_filename(
        output_dir: &Path,
        slug: &str,
        entry: &LogEntry,
        occurrence: usize,
    ) -> PathBuf {
        let filename = if occurrence > 1 {
            format!("{}_{}_{}.md", slug, entry.date.format("%Y-%m-%d"), occurrence)
        } else {
            format!("{}_{}.md", slug, entry.date.format("%Y-%m-%d"))
        };
        output_dir.join(filename)
    }

    fn generate_metadata_filename(output_dir: &Path, slug: &str) -> PathBuf {
        output_dir.join(format!("{}_metadata.json", slug))
    }

    /// Lowercase ASCII alphanumerics joined by single dashes.
    pub fn slugify(title: &str) -> String {
        let slug = title
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|part| !part.is_empty())
            .map(str::to_ascii_lowercase)
            .collect::<Vec<_>>()
            .join("-");
        if slug.is_empty() {
            "untitled".to_string()
        } else {
            slug
        }
    }

    async fn write_file(path: &Path, content: &str) -> Result<()> {
        fs::write(path, content).await.map_err(|e| {
            NotionAssistantError::OutputDirectory {
                reason: format!("Failed to write {}: {}", path.display(), e),
            }
        })
    }

    async fn write_metadata_file(path: &Path, metadata: &serde_json::Value) -> Result<()> {
        let json_content = serde_json::to_string_pretty(metadata)?;
        Self::write_file(path, &json_content).await?;
        info!("Generated metadata file: {}", path.display());
        Ok(())
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn file_names(paths: &[PathBuf]) -> Vec<String> {
        paths.iter().map(|p| Self::file_name(p)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockContent, NotionBlock, ResourceKind, RichText, TextSegment};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn paragraph(text: &str) -> NotionBlock {
        NotionBlock {
            id: text.to_string(),
            block_type: "paragraph".to_string(),
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
        }
    }

    fn config(dir: &TempDir, include_metadata: bool) -> ExportConfig {
        ExportConfig {
            output_dir: dir.path().join("out"),
            include_metadata,
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(ContentExporter::slugify("Daily Log: 2024!"), "daily-log-2024");
        assert_eq!(ContentExporter::slugify("  ***  "), "untitled");
    }

    #[tokio::test]
    async fn test_export_page_writes_markdown_and_metadata() {
        let dir = TempDir::new().unwrap();
        let content = FetchedContent {
            id: "0f2d3c4b-5a69-4788-9a0b-1c2d3e4f5a6b".to_string(),
            title: "Daily Log".to_string(),
            kind: ResourceKind::Page,
            segments: vec![TextSegment {
                block_id: "b1".to_string(),
                block_type: "paragraph".to_string(),
                depth: 0,
                text: "hello".to_string(),
                checked: None,
            }],
        };

        let result = ContentExporter::export_page(&content, &config(&dir, true))
            .await
            .unwrap();

        assert_eq!(result.output_files.len(), 1);
        let markdown = std::fs::read_to_string(&result.output_files[0]).unwrap();
        assert_eq!(markdown, "# Daily Log\n\nhello\n");

        let metadata_path = result.metadata_file.unwrap();
        assert!(metadata_path.ends_with("daily-log_metadata.json"));
        let metadata: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(metadata_path).unwrap()).unwrap();
        assert_eq!(metadata["kind"], "page");
        assert_eq!(metadata["files"][0], "daily-log.md");
    }

    #[tokio::test]
    async fn test_export_entries_numbers_duplicate_dates() {
        let dir = TempDir::new().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 28).unwrap();
        let mut first = LogEntry::new(date, vec![paragraph("3/28"), paragraph("morning")]);
        first.summary = Some("Early start".to_string());
        let second = LogEntry::new(date, vec![paragraph("3/28"), paragraph("evening")]);

        let result =
            ContentExporter::export_entries("Journal", &[first, second], &config(&dir, false))
                .await
                .unwrap();

        let names: Vec<_> = result
            .output_files
            .iter()
            .map(|p| ContentExporter::file_name(p))
            .collect();
        assert_eq!(names, vec!["journal_2024-03-28.md", "journal_2024-03-28_2.md"]);
        assert!(result.metadata_file.is_none());

        let first_body = std::fs::read_to_string(&result.output_files[0]).unwrap();
        assert!(first_body.starts_with("# 2024-03-28\n\n> Early start"));
        assert!(first_body.ends_with("morning\n"));
    }

    #[tokio::test]
    async fn test_export_entries_rejects_empty_input() {
        let dir = TempDir::new().unwrap();
        let result = ContentExporter::export_entries("Journal", &[], &config(&dir, true)).await;
        assert!(matches!(
            result,
            Err(NotionAssistantError::OutputDirectory { .. })
        ));
    }
}
