use std::path::Path;

use anyhow::Result;

use ccgraph::config::Config;
use ccgraph::index::hierarchy::{count_by_kind, count_by_language};
use ccgraph::query::QueryEngine;

use super::run_batch;

pub fn show_stats(path: &Path, config: Config, verbose: bool) -> Result<()> {
    let project_name = config.project.name.clone();
    let batch = run_batch(path, config)?;

    println!("ccgraph statistics");
    println!("Project: {} ({})", project_name, path.display());

    let units: usize = count_by_kind(&batch.files).values().sum();
    let resolved = batch.edges.iter().filter(|e| e.is_resolved()).count();

    println!("\nSummary:");
    println!("  Files parsed: {}", batch.files.len());
    println!("  Files failed: {}", batch.errors.len());
    println!("  Code units: {}", units);
    println!(
        "  Call edges: {} ({} resolved, {} unresolved)",
        batch.edges.len(),
        resolved,
        batch.edges.len() - resolved
    );

    if verbose {
        println!("\nDetails:");
        println!("  Units by kind:");
        for (kind, count) in count_by_kind(&batch.files) {
            println!("    {}: {}", kind, count);
        }

        println!("  Languages:");
        for (language, count) in count_by_language(&batch.files) {
            println!("    {}: {} files", language, count);
        }

        let engine = QueryEngine::new(&batch.files, &batch.edges);
        let unresolved = engine.unresolved_calls();
        if !unresolved.is_empty() {
            println!("  Most called external names:");
            for (name, count) in unresolved.iter().take(10) {
                println!("    {}: {}", name, count);
            }
        }

        if !batch.errors.is_empty() {
            println!("  Failures:");
            for err in &batch.errors {
                println!("    {}: {}", err.file_path, err.message());
            }
        }
    }

    Ok(())
}
