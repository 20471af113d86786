// Error types for extraction and batch processing

use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

use crate::index::Language;

/// The grammar engine could not produce a usable CST for a file.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{language} grammar is unavailable: {message}")]
    GrammarUnavailable { language: Language, message: String },

    #[error("{language} parser produced no syntax tree")]
    NoTree { language: Language },

    #[error("syntax errors cover {:.0}% of the source (first at line {first_error_line})", .ratio * 100.0)]
    SyntaxErrors { ratio: f64, first_error_line: u32 },
}

/// Why a single file could not be turned into a code unit tree.
#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// A per-file failure, reported alongside the files that did parse.
#[derive(Debug, Error)]
#[error("failed to parse {file_path}: {cause}")]
pub struct ParseError {
    pub file_path: String,
    #[source]
    pub cause: ParseFailure,
}

impl ParseError {
    pub fn new(file_path: impl Into<String>, cause: impl Into<ParseFailure>) -> Self {
        Self {
            file_path: file_path.into(),
            cause: cause.into(),
        }
    }

    pub fn message(&self) -> String {
        self.cause.to_string()
    }
}

impl Serialize for ParseError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ParseError", 2)?;
        state.serialize_field("file_path", &self.file_path)?;
        state.serialize_field("message", &self.message())?;
        state.end()
    }
}

/// Configuration failed to load or validate.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid exclude pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("{0}")]
    Invalid(String),
}
