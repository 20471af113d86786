use std::path::Path;

use anyhow::{bail, Result};
use clap::ValueEnum;

use ccgraph::config::Config;
use ccgraph::index::UnitKind;
use ccgraph::query::{QueryEngine, QueryResult};

use super::{run_batch, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum QueryType {
    Callers,
    Callees,
    Search,
    Unresolved,
}

pub struct QueryRequest {
    pub query_type: QueryType,
    pub target: Option<String>,
    pub kind: Option<String>,
    pub limit: usize,
}

impl QueryRequest {
    fn target(&self) -> Result<&str> {
        match self.target.as_deref() {
            Some(target) => Ok(target),
            None => bail!("{:?} query needs a target", self.query_type),
        }
    }
}

pub fn query_project(project: &Path, config: Config, request: QueryRequest, format: OutputFormat) -> Result<()> {
    let kind = match request.kind.as_deref() {
        Some(kind) => match UnitKind::from_str(kind) {
            Some(kind) => Some(kind),
            None => bail!("Unknown unit kind: {}", kind),
        },
        None => None,
    };

    let batch = run_batch(project, config)?;
    let engine = QueryEngine::new(&batch.files, &batch.edges);

    match request.query_type {
        QueryType::Callers => {
            let target = request.target()?;
            print_results("callers", target, &engine.find_callers(target), format)?;
        }
        QueryType::Search => {
            let target = request.target()?;
            let results = engine.search_units(target, kind, request.limit);
            print_results("matches", target, &results, format)?;
        }
        QueryType::Callees => {
            let target = request.target()?;
            let callees = engine.find_callees(target);
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&callees)?),
                OutputFormat::Text if callees.is_empty() => {
                    println!("No callees found for '{}'", target);
                }
                OutputFormat::Text => {
                    println!("Found {} calls from '{}':", callees.len(), target);
                    for callee in callees {
                        match callee.target {
                            Some(unit) => println!(
                                "  line {}: {} -> {}:{} ({})",
                                callee.call_line, callee.callee_name, unit.file, unit.line, unit.kind
                            ),
                            None => println!(
                                "  line {}: {} (external)",
                                callee.call_line, callee.callee_name
                            ),
                        }
                    }
                }
            }
        }
        QueryType::Unresolved => {
            let unresolved = engine.unresolved_calls();
            match format {
                OutputFormat::Json => {
                    let json: Vec<serde_json::Value> = unresolved
                        .iter()
                        .map(|(name, count)| serde_json::json!({ "callee_name": name, "count": count }))
                        .collect();
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
                OutputFormat::Text => {
                    println!("{} unresolved callee names:", unresolved.len());
                    for (name, count) in unresolved {
                        println!("  {:>5}  {}", count, name);
                    }
                }
            }
        }
    }

    Ok(())
}

fn print_results(label: &str, target: &str, results: &[QueryResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(results)?),
        OutputFormat::Text if results.is_empty() => {
            println!("No {} found for '{}'", label, target);
        }
        OutputFormat::Text => {
            println!("Found {} {} for '{}':", results.len(), label, target);
            for result in results {
                println!(
                    "  {}:{} - {} ({})",
                    result.file,
                    result.line,
                    result.signature.as_deref().unwrap_or(&result.name),
                    result.kind
                );
            }
        }
    }
    Ok(())
}
