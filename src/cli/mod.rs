// CLI command implementations

pub mod languages;
pub mod parse;
pub mod query;
pub mod stats;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};

use ccgraph::config::Config;
use ccgraph::indexer::{IndexedBatch, Indexer, SourceFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Parse a single file or a whole directory and resolve its call graph,
/// showing a spinner on stderr while it runs
pub fn run_batch(path: &Path, config: Config) -> Result<IndexedBatch> {
    let indexer = Indexer::new(config).context("Invalid configuration")?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .expect("valid template"),
    );
    spinner.set_message(format!("Parsing {}", path.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let batch = if path.is_file() {
        let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let source = SourceFile::new(
            path.display().to_string(),
            String::from_utf8_lossy(&bytes).into_owned(),
        );
        indexer.index_files(&[source])
    } else {
        let options = indexer.config().scan_options();
        indexer.index_directory(path, &options)
    };

    spinner.finish_and_clear();
    Ok(batch)
}
