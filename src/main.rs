mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{AskArgs, Cli, Commands, EntriesArgs, ExportArgs, FetchArgs, ValidateArgs};
use notion_assistant::{
    Config, ContentExporter, ContentFetcher, ExportConfig, LogEntryParser, NotionAssistantError,
    OllamaClient, PageReference, Result, SharedResource,
};
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG overrides --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    let result = match &cli.command {
        Commands::Pages => handle_list_command(&config, false).await,
        Commands::Databases => handle_list_command(&config, true).await,
        Commands::Fetch(args) => handle_fetch_command(&config, args).await,
        Commands::Entries(args) => handle_entries_command(&config, args).await,
        Commands::Ask(args) => handle_ask_command(&config, args).await,
        Commands::Export(args) => handle_export_command(&config, args, &cli.output).await,
        Commands::Validate(args) => handle_validate_command(&config, args).await,
    };

    if let Err(e) = result {
        error!("Operation failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn handle_list_command(config: &Config, databases: bool) -> Result<()> {
    let fetcher = ContentFetcher::new(config)?;
    let resources = if databases {
        fetcher.list_shared_databases().await?
    } else {
        fetcher.list_shared_pages().await?
    };

    if resources.is_empty() {
        println!("Nothing is shared with this integration yet.");
        return Ok(());
    }

    println!("\nShared {}:", if databases { "Databases" } else { "Pages" });
    for resource in &resources {
        print_resource(resource);
    }
    Ok(())
}

fn print_resource(resource: &SharedResource) {
    println!("- {} ({})", resource.title, resource.kind);
    println!("  URL: {}", resource.url);
    println!("  ID: {}\n", resource.id);
}

async fn handle_fetch_command(config: &Config, args: &FetchArgs) -> Result<()> {
    let reference = PageReference::parse(&args.page)?;
    let fetcher = ContentFetcher::new(config)?;
    let content = fetcher.fetch(&reference).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&content)?);
    } else if args.markdown {
        print!("{}", content.to_markdown());
    } else {
        println!("\n{}: {}\n", capitalize(&content.kind.to_string()), content.title);
        println!("{}", content.to_text());
    }
    Ok(())
}

async fn handle_entries_command(config: &Config, args: &EntriesArgs) -> Result<()> {
    let reference = PageReference::parse(&args.page)?;
    let fetcher = ContentFetcher::new(config)?;
    let parser = LogEntryParser::new(args.year)?;

    let page = fetcher.get_page_content(&reference).await?;
    let mut entries = parser.parse_entries(&page);
    info!("Found {} log entries in '{}'", entries.len(), page.title);

    if args.analyze && !entries.is_empty() {
        let generator = OllamaClient::new(config)?;
        generator.analyze_entries(&mut entries).await?;
    }

    for entry in &entries {
        println!("\nDate: {}", entry.date.format("%Y-%m-%d"));
        if let Some(summary) = &entry.summary {
            println!("Summary: {}", summary);
            println!("Importance: {:.2}", entry.importance);
        }
        println!("Text: {}", preview(&entry.raw_text, 200));
    }

    let stats = parser.get_parsing_stats(&entries);
    if let Some(avg) = stats.get("avg_blocks_per_entry") {
        println!("\nAverage blocks per entry: {:.1}", avg.as_f64().unwrap_or(0.0));
    }

    if let Some(json_path) = &args.json_output {
        let json_content = serde_json::to_string_pretty(&serde_json::json!({
            "page": { "id": page.id, "title": page.title },
            "entries": entries,
            "stats": stats,
        }))?;
        tokio::fs::write(json_path, json_content).await?;
        info!("Entries written to: {}", json_path.display());
    }

    Ok(())
}

async fn handle_ask_command(config: &Config, args: &AskArgs) -> Result<()> {
    let reference = PageReference::parse(&args.page)?;
    let fetcher = ContentFetcher::new(config)?;
    let content = fetcher.fetch(&reference).await?;

    if content.is_empty() {
        return Err(NotionAssistantError::Generation {
            reason: format!("'{}' has no text to ask about", content.title),
        });
    }

    let mut generator = OllamaClient::new(config)?;
    if let Some(model) = &args.model {
        generator = generator.with_model(model);
    }

    let answer = generator.answer(&content, &args.question).await?;
    println!("{}", answer);
    Ok(())
}

async fn handle_export_command(
    config: &Config,
    args: &ExportArgs,
    output_dir: &Path,
) -> Result<()> {
    let reference = PageReference::parse(&args.page)?;

    // Check if output directory exists and handle force flag
    if output_dir.exists() && !args.force {
        let mut entries = std::fs::read_dir(output_dir).map_err(|e| {
            NotionAssistantError::OutputDirectory {
                reason: format!("Cannot read output directory: {}", e),
            }
        })?;

        if entries.next().is_some() {
            return Err(NotionAssistantError::OutputDirectory {
                reason: "Output directory is not empty. Use --force to overwrite.".to_string(),
            });
        }
    }

    let export_config = ExportConfig {
        output_dir: output_dir.to_path_buf(),
        include_metadata: args.include_metadata,
    };
    let fetcher = ContentFetcher::new(config)?;

    let result = if args.entries {
        let parser = LogEntryParser::new(args.year)?;
        let page = fetcher.get_page_content(&reference).await?;
        let entries = parser.parse_entries(&page);
        ContentExporter::export_entries(&page.title, &entries, &export_config).await?
    } else {
        let content = fetcher.fetch(&reference).await?;
        ContentExporter::export_page(&content, &export_config).await?
    };

    info!("Successfully exported {} files:", result.output_files.len());
    for output_file in &result.output_files {
        info!("  - {}", output_file.display());
    }
    if let Some(metadata_file) = &result.metadata_file {
        info!("  - {} (metadata)", metadata_file.display());
    }
    Ok(())
}

async fn handle_validate_command(config: &Config, args: &ValidateArgs) -> Result<()> {
    info!("Validating {} page references", args.pages.len());

    let fetcher = if args.check_access {
        Some(ContentFetcher::new(config)?)
    } else {
        None
    };

    let mut valid_count = 0;
    let mut invalid = Vec::new();

    for page in &args.pages {
        let reference = match PageReference::parse(page) {
            Ok(reference) => reference,
            Err(e) => {
                error!("✗ Invalid: {} - {}", page, e);
                invalid.push((page, e.to_string()));
                continue;
            }
        };
        info!("✓ Valid: {} ({})", page, reference);

        if let Some(fetcher) = &fetcher {
            match fetcher.fetch(&reference).await {
                Ok(content) => {
                    info!(
                        "  Accessible: '{}', {} text segments",
                        content.title,
                        content.segments.len()
                    );
                }
                Err(e) => {
                    error!("  Cannot access content: {}", e);
                    invalid.push((page, format!("Access error: {}", e)));
                    continue;
                }
            }
        }
        valid_count += 1;
    }

    println!("\n=== Validation Summary ===");
    println!("Valid references: {}/{}", valid_count, args.pages.len());

    if !invalid.is_empty() {
        println!("Invalid references:");
        let invalid_count = invalid.len();
        for (page, error) in invalid {
            println!("  - {}: {}", page, error);
        }
        return Err(NotionAssistantError::InvalidPageReference {
            input: format!("{} references failed validation", invalid_count),
        });
    }

    println!("All references are valid!");
    Ok(())
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
