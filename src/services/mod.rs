pub mod exporter;
pub mod fetcher;
pub mod generator;
pub mod parser;

pub use exporter::ContentExporter;
pub use fetcher::ContentFetcher;
pub use generator::OllamaClient;
pub use parser::LogEntryParser;
