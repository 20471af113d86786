// Configuration management for ccgraph

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::indexer::discovery::ScanOptions;
use crate::indexer::grammar::SyntaxPolicy;

/// Name of the per-project configuration file
pub const CONFIG_FILE: &str = ".ccgraph.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub project: ProjectConfig,
    pub indexing: IndexingConfig,
    pub extraction: ExtractionConfig,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
    pub root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub recursive: bool,
    /// Directory levels below the root to descend; `None` is unlimited
    pub max_depth: Option<usize>,
    pub include_headers: bool,
    /// Glob patterns matched against paths relative to the root
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub strict_syntax: bool,
    pub max_error_ratio: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Worker threads for extraction; 0 lets rayon decide
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "unnamed-project".to_string(),
            root: ".".to_string(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            max_depth: None,
            include_headers: true,
            exclude: vec![
                "build/**".to_string(),
                "**/build/**".to_string(),
                ".git/**".to_string(),
                "**/CMakeFiles/**".to_string(),
                "cmake-build-*/**".to_string(),
            ],
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let policy = SyntaxPolicy::default();
        Self {
            strict_syntax: policy.strict,
            max_error_ratio: policy.max_error_ratio,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from project directory.
    /// Looks for .ccgraph.toml in the project root and falls back to
    /// defaults when it is missing.
    pub fn from_project_dir<P: AsRef<Path>>(project_dir: P) -> anyhow::Result<Self> {
        let config_path = project_dir.as_ref().join(CONFIG_FILE);

        if !config_path.exists() {
            tracing::debug!("No {} in {}, using defaults", CONFIG_FILE, project_dir.as_ref().display());
            return Ok(Self::default());
        }

        let config = Self::from_file(&config_path)
            .map_err(|e| anyhow::anyhow!("{}: {}", config_path.display(), e))?;
        tracing::info!("Loaded configuration from {}", config_path.display());
        Ok(config)
    }

    /// Compiled exclude patterns
    pub fn exclude_set(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.indexing.exclude {
            let glob = Glob::new(pattern).map_err(|source| ConfigError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        builder.build().map_err(|source| ConfigError::Pattern {
            pattern: self.indexing.exclude.join(", "),
            source,
        })
    }

    pub fn syntax_policy(&self) -> SyntaxPolicy {
        SyntaxPolicy {
            strict: self.extraction.strict_syntax,
            max_error_ratio: self.extraction.max_error_ratio,
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            recursive: self.indexing.recursive,
            max_depth: self.indexing.max_depth,
            include_headers: self.indexing.include_headers,
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.project.name.is_empty() {
            return Err(ConfigError::Invalid("Project name cannot be empty".to_string()));
        }

        let ratio = self.extraction.max_error_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(ConfigError::Invalid(format!(
                "max_error_ratio must be between 0 and 1, got {}",
                ratio
            )));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!("Invalid log level: {}", self.logging.level)));
        }
        let valid_formats = ["compact", "pretty", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::Invalid(format!("Invalid log format: {}", self.logging.format)));
        }

        self.exclude_set()?;

        Ok(())
    }
}
