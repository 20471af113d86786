use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ccgraph::config::{Config, LoggingConfig};

mod cli;

use cli::query::QueryType;
use cli::OutputFormat;

#[derive(Parser)]
#[command(name = "ccgraph")]
#[command(version)]
#[command(about = "Structural parser and call-graph builder for C and C++ sources", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Enable verbose logging and detailed output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract code units and the call graph from a file or directory
    Parse {
        /// File or directory to parse
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Only parse files directly in the directory
        #[arg(long)]
        no_recursive: bool,

        /// Deepest directory level to descend into (0 = root only)
        #[arg(long)]
        max_depth: Option<usize>,

        /// Skip header files
        #[arg(long)]
        no_headers: bool,

        /// Reject files with any syntax error
        #[arg(long)]
        strict: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Query the call graph of a project
    Query {
        /// Query type
        #[arg(value_enum)]
        query_type: QueryType,

        /// Function, method or search term
        target: Option<String>,

        /// Project directory
        #[arg(short, long, default_value = ".")]
        project: PathBuf,

        /// Restrict search results to one unit kind (e.g. function, class)
        #[arg(short, long)]
        kind: Option<String>,

        /// Maximum number of search results
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show unit and call-graph statistics
    Stats {
        /// Project directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// List supported languages
    Languages,
}

impl Commands {
    /// Directory whose .ccgraph.toml applies to this command
    fn config_dir(&self) -> Option<&Path> {
        let path = match self {
            Commands::Parse { path, .. } | Commands::Stats { path } => path.as_path(),
            Commands::Query { project, .. } => project.as_path(),
            Commands::Languages => return None,
        };
        if path.is_file() {
            path.parent()
        } else {
            Some(path)
        }
    }
}

fn init_logging(debug: bool, verbose: bool, logging: &LoggingConfig) {
    let filter = if debug {
        EnvFilter::new("ccgraph=debug")
    } else if verbose {
        EnvFilter::new("ccgraph=info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("ccgraph={}", logging.level)))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match logging.format.as_str() {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        _ => builder.init(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.command.config_dir() {
        Some(dir) => Config::from_project_dir(dir)?,
        None => Config::default(),
    };

    init_logging(cli.debug, cli.verbose, &config.logging);

    info!("ccgraph v{} starting...", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Parse {
            path,
            no_recursive,
            max_depth,
            no_headers,
            strict,
            format,
        } => {
            let mut config = config;
            if no_recursive {
                config.indexing.recursive = false;
            }
            if max_depth.is_some() {
                config.indexing.max_depth = max_depth;
            }
            if no_headers {
                config.indexing.include_headers = false;
            }
            if strict {
                config.extraction.strict_syntax = true;
            }
            cli::parse::parse_path(&path, config, format)?;
        }

        Commands::Query {
            query_type,
            target,
            project,
            kind,
            limit,
            format,
        } => {
            let request = cli::query::QueryRequest {
                query_type,
                target,
                kind,
                limit,
            };
            cli::query::query_project(&project, config, request, format)?;
        }

        Commands::Stats { path } => {
            cli::stats::show_stats(&path, config, cli.verbose)?;
        }

        Commands::Languages => {
            cli::languages::list_languages();
        }
    }

    Ok(())
}
