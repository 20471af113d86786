use std::path::Path;

use anyhow::Result;

use ccgraph::config::Config;
use ccgraph::index::CodeUnit;

use super::{run_batch, OutputFormat};

pub fn parse_path(path: &Path, config: Config, format: OutputFormat) -> Result<()> {
    let batch = run_batch(path, config)?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&batch)?);
        }
        OutputFormat::Text => {
            for file in &batch.files {
                println!("{}", describe_file(file));
                for child in &file.children {
                    print_unit(child, 1);
                }
            }

            if !batch.errors.is_empty() {
                println!("\nErrors:");
                for err in &batch.errors {
                    println!("  {}: {}", err.file_path, err.message());
                }
            }

            let resolved = batch.edges.iter().filter(|e| e.is_resolved()).count();
            println!(
                "\n{} files parsed, {} failed, {} calls ({} resolved)",
                batch.files.len(),
                batch.errors.len(),
                batch.edges.len(),
                resolved
            );
        }
    }

    Ok(())
}

fn describe_file(file: &CodeUnit) -> String {
    let path = file.meta_str("file_path").unwrap_or(&file.name);
    if file.includes.is_empty() {
        format!("{} [{}] {} lines", path, file.language, file.end_line)
    } else {
        format!(
            "{} [{}] {} lines, includes {}",
            path,
            file.language,
            file.end_line,
            file.includes.join(", ")
        )
    }
}

fn print_unit(unit: &CodeUnit, depth: usize) {
    let indent = "  ".repeat(depth);
    let label = unit.signature.as_deref().unwrap_or(&unit.name);
    let calls = if unit.is_callable() {
        format!(" ({} calls)", unit.call_sites.len())
    } else {
        String::new()
    };

    println!(
        "{}{} {} :{}-{}{}",
        indent, unit.unit_type, label, unit.start_line, unit.end_line, calls
    );
    for child in &unit.children {
        print_unit(child, depth + 1);
    }
}
