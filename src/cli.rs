use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "notion-assistant")]
#[command(about = "Read Notion pages and hand them to a locally hosted language model")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output directory for exported files
    #[arg(short, long, global = true, default_value = "./output")]
    pub output: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List pages shared with the integration
    Pages,

    /// List databases shared with the integration
    Databases,

    /// Fetch a page or database and print its text
    Fetch(FetchArgs),

    /// Split a journal page into dated log entries
    Entries(EntriesArgs),

    /// Ask the local model a question about a page
    Ask(AskArgs),

    /// Export a page (or its log entries) as Markdown files
    Export(ExportArgs),

    /// Validate page references
    Validate(ValidateArgs),
}

#[derive(Args)]
pub struct FetchArgs {
    /// Page or database id, or a Notion URL
    #[arg(value_name = "PAGE")]
    pub page: String,

    /// Print the fetched content as JSON
    #[arg(long, conflicts_with = "markdown")]
    pub json: bool,

    /// Print the fetched content as Markdown
    #[arg(long)]
    pub markdown: bool,
}

#[derive(Args)]
pub struct EntriesArgs {
    /// Page id or Notion URL
    #[arg(value_name = "PAGE")]
    pub page: String,

    /// Summarize and score each entry with the local model
    #[arg(long)]
    pub analyze: bool,

    /// Year for headings written without one, like "3/28" (defaults to this year)
    #[arg(long, value_name = "YEAR")]
    pub year: Option<i32>,

    /// Write the entries to a JSON file
    #[arg(long, value_name = "FILE")]
    pub json_output: Option<PathBuf>,
}

#[derive(Args)]
pub struct AskArgs {
    /// Page or database id, or a Notion URL
    #[arg(value_name = "PAGE")]
    pub page: String,

    /// Question to ask about the page
    #[arg(value_name = "QUESTION")]
    pub question: String,

    /// Ollama model to use instead of OLLAMA_MODEL
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Page or database id, or a Notion URL
    #[arg(value_name = "PAGE")]
    pub page: String,

    /// Write one file per dated log entry instead of one file per page
    #[arg(long)]
    pub entries: bool,

    /// Year for headings written without one (with --entries)
    #[arg(long, value_name = "YEAR", requires = "entries")]
    pub year: Option<i32>,

    /// Include metadata file
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub include_metadata: bool,

    /// Force overwrite existing output files
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Page ids or Notion URLs
    #[arg(required = true, value_name = "PAGE")]
    pub pages: Vec<String>,

    /// Check that each page can be fetched with the configured token
    #[arg(long)]
    pub check_access: bool,
}
