// Batch extraction over directories and in-memory sources

pub mod calls;
pub mod discovery;
pub mod grammar;
pub mod parser;

use std::cell::RefCell;
use std::path::Path;

use globset::GlobSet;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AdapterError, ConfigError, ParseError};
use crate::index::graph::build_call_graph;
use crate::index::{is_supported_file, CallGraphEdge, CodeUnit, Language};

use self::discovery::{discover_files, ScanOptions};
use self::grammar::{Grammar, SyntaxPolicy};
use self::parser::CFamilyParser;

/// A file handed over in memory, e.g. an upload
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Per-file results of a batch, in input order
#[derive(Debug, Default, Serialize)]
pub struct BatchResult {
    pub files: Vec<CodeUnit>,
    pub errors: Vec<ParseError>,
}

impl BatchResult {
    fn push(&mut self, result: Result<CodeUnit, ParseError>) {
        match result {
            Ok(unit) => self.files.push(unit),
            Err(err) => {
                warn!("{}", err);
                self.errors.push(err);
            }
        }
    }
}

/// A batch with its call graph resolved
#[derive(Debug, Default, Serialize)]
pub struct IndexedBatch {
    pub files: Vec<CodeUnit>,
    #[serde(rename = "call_graph")]
    pub edges: Vec<CallGraphEdge>,
    pub errors: Vec<ParseError>,
}

impl From<BatchResult> for IndexedBatch {
    fn from(batch: BatchResult) -> Self {
        let edges = build_call_graph(&batch.files);
        Self {
            files: batch.files,
            edges,
            errors: batch.errors,
        }
    }
}

/// Coordinates discovery, parallel extraction and resolution
pub struct Indexer {
    config: Config,
    excludes: GlobSet,
    pool: rayon::ThreadPool,
}

impl Indexer {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let excludes = config.exclude_set()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.performance.threads)
            .thread_name(|i| format!("ccgraph-worker-{}", i))
            .build()
            .map_err(|e| ConfigError::Invalid(format!("cannot start worker pool: {}", e)))?;

        Ok(Self {
            config,
            excludes,
            pool,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Extract every matching file under `root`.
    ///
    /// A file that cannot be read or parsed becomes an entry in `errors`;
    /// the rest of the batch is unaffected.
    pub fn parse_directory(&self, root: impl AsRef<Path>, options: &ScanOptions) -> BatchResult {
        let root = root.as_ref();
        let discovered = discover_files(root, options, &self.excludes);
        info!(
            "Parsing {} files under {}",
            discovered.files.len(),
            root.display()
        );

        let mut batch = BatchResult::default();
        for err in discovered.errors {
            batch.push(Err(err));
        }

        let policy = self.config.syntax_policy();
        let results: Vec<Result<CodeUnit, ParseError>> = self.pool.install(|| {
            discovered
                .files
                .par_iter()
                .map(|path| parse_path(policy, path))
                .collect()
        });

        for result in results {
            batch.push(result);
        }
        self.log_batch(&batch);
        batch
    }

    /// Extract in-memory sources. Files with unsupported extensions are
    /// skipped without an error.
    pub fn parse_files(&self, sources: &[SourceFile]) -> BatchResult {
        let supported: Vec<&SourceFile> = sources
            .iter()
            .filter(|source| {
                let keep = is_supported_file(&source.path);
                if !keep {
                    debug!("Skipping unsupported file {}", source.path);
                }
                keep
            })
            .collect();
        info!("Parsing {} of {} submitted files", supported.len(), sources.len());

        let policy = self.config.syntax_policy();
        let results: Vec<Result<CodeUnit, ParseError>> = self.pool.install(|| {
            supported
                .par_iter()
                .map(|source| parse_source(policy, &source.path, &source.content))
                .collect()
        });

        let mut batch = BatchResult::default();
        for result in results {
            batch.push(result);
        }
        self.log_batch(&batch);
        batch
    }

    /// Parse a directory and resolve its call graph
    pub fn index_directory(&self, root: impl AsRef<Path>, options: &ScanOptions) -> IndexedBatch {
        self.parse_directory(root, options).into()
    }

    /// Parse in-memory sources and resolve their call graph
    pub fn index_files(&self, sources: &[SourceFile]) -> IndexedBatch {
        self.parse_files(sources).into()
    }

    fn log_batch(&self, batch: &BatchResult) {
        let units: usize = batch.files.iter().map(CodeUnit::subtree_len).sum();
        info!(
            "Extracted {} units from {} files ({} errors)",
            units,
            batch.files.len(),
            batch.errors.len()
        );
    }
}

thread_local! {
    static GRAMMAR: RefCell<Option<Grammar>> = RefCell::new(None);
}

/// Run `f` with the calling thread's grammar. Pool workers build one on
/// their first file and keep it for every later file and batch.
fn with_worker_grammar<T>(
    policy: SyntaxPolicy,
    f: impl FnOnce(&mut Grammar) -> T,
) -> Result<T, AdapterError> {
    GRAMMAR.with(|slot| {
        let mut slot = slot.borrow_mut();
        match slot.as_mut() {
            Some(grammar) if grammar.policy() == policy => Ok(f(grammar)),
            _ => {
                let thread = std::thread::current();
                debug!("Building grammar on {}", thread.name().unwrap_or("unnamed thread"));
                let grammar = slot.insert(Grammar::new(policy)?);
                Ok(f(grammar))
            }
        }
    })
}

fn parse_path(policy: SyntaxPolicy, path: &Path) -> Result<CodeUnit, ParseError> {
    let file_path = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|e| ParseError::new(&file_path, e))?;

    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(err) => {
            debug!("{} is not valid UTF-8, decoding lossily", file_path);
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    };

    parse_source(policy, &file_path, &content)
}

fn parse_source(policy: SyntaxPolicy, file_path: &str, content: &str) -> Result<CodeUnit, ParseError> {
    let language = Language::from_path(file_path);
    let tree = with_worker_grammar(policy, |grammar| grammar.parse(language, content))
        .and_then(|parsed| parsed)
        .map_err(|e| ParseError::new(file_path, e))?;

    Ok(parser::extract_file(&tree, content, file_path, language))
}

/// Parse a single file with a fresh parser
pub fn parse_one(file_path: &str, content: &str, policy: SyntaxPolicy) -> Result<CodeUnit, ParseError> {
    let mut parser = CFamilyParser::new(policy).map_err(|e| ParseError::new(file_path, e))?;
    parser.parse(file_path, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::UnitKind;

    fn indexer(strict: bool) -> Indexer {
        let mut config = Config::default();
        config.extraction.strict_syntax = strict;
        config.performance.threads = 2;
        Indexer::new(config).unwrap()
    }

    #[test]
    fn test_parse_files_keeps_input_order() {
        let sources: Vec<SourceFile> = (0..16)
            .map(|i| SourceFile::new(format!("f{}.c", i), format!("void f{}(void) {{}}\n", i)))
            .collect();

        let batch = indexer(false).parse_files(&sources);
        assert!(batch.errors.is_empty());
        let names: Vec<&str> = batch.files.iter().map(|f| f.children[0].name.as_str()).collect();
        let expected: Vec<String> = (0..16).map(|i| format!("f{}", i)).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn test_parse_files_skips_unsupported() {
        let sources = vec![
            SourceFile::new("main.c", "int main(void) { return 0; }\n"),
            SourceFile::new("notes.txt", "not code"),
            SourceFile::new("lib.py", "def f(): pass\n"),
        ];

        let batch = indexer(false).parse_files(&sources);
        assert_eq!(batch.files.len(), 1);
        assert!(batch.errors.is_empty());
    }

    #[test]
    fn test_failed_file_does_not_abort_batch() {
        let sources = vec![
            SourceFile::new("good.c", "int good(void) { return 1; }\n"),
            SourceFile::new("bad.c", "int broken( {\n"),
        ];

        let batch = indexer(true).parse_files(&sources);
        assert_eq!(batch.files.len(), 1);
        assert_eq!(batch.errors.len(), 1);
        assert_eq!(batch.errors[0].file_path, "bad.c");
    }

    #[test]
    fn test_lossy_decoding_of_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = b"/* caf".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b" */\nint latin(void) { return 0; }\n");
        std::fs::write(dir.path().join("latin1.c"), bytes).unwrap();

        let batch = indexer(false).parse_directory(dir.path(), &ScanOptions::default());
        assert!(batch.errors.is_empty());
        assert_eq!(batch.files[0].children[0].name, "latin");
        assert_eq!(batch.files[0].children[0].unit_type, UnitKind::Function);
    }

    #[test]
    fn test_index_files_resolves_calls() {
        let sources = vec![
            SourceFile::new("a.c", "void helper(void) {}\n"),
            SourceFile::new("b.c", "void run(void) { helper(); puts(\"x\"); }\n"),
        ];

        let batch = indexer(false).index_files(&sources);
        assert_eq!(batch.edges.len(), 2);
        assert_eq!(batch.edges[0].callee_id.as_ref().map(|id| id.file.as_str()), Some("a.c"));
        assert!(!batch.edges[1].is_resolved());
    }

    #[test]
    fn test_worker_grammar_outlives_batches() {
        let mut config = Config::default();
        config.performance.threads = 1;
        let indexer = Indexer::new(config).unwrap();
        let policy = indexer.config().syntax_policy();

        let sources: Vec<SourceFile> = (0..12)
            .map(|i| SourceFile::new(format!("g{}.c", i), format!("int g{}(void) {{ return {}; }}\n", i, i)))
            .collect();
        indexer.parse_files(&sources[..8]);
        indexer.parse_files(&sources[8..]);

        // The single worker parsed every file of both batches with one grammar
        let parsed = indexer
            .pool
            .install(|| with_worker_grammar(policy, |grammar| grammar.files_parsed()))
            .unwrap();
        assert_eq!(parsed, 12);

        let strict = SyntaxPolicy {
            strict: true,
            ..policy
        };
        let rebuilt = indexer
            .pool
            .install(|| with_worker_grammar(strict, |grammar| (grammar.policy(), grammar.files_parsed())))
            .unwrap();
        assert_eq!(rebuilt, (strict, 0));
    }

    #[test]
    fn test_parse_one() {
        let unit = parse_one("x.cpp", "class X {};\n", SyntaxPolicy::default()).unwrap();
        assert_eq!(unit.children[0].unit_type, UnitKind::Class);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = Config::default();
        config.extraction.max_error_ratio = 2.0;
        assert!(Indexer::new(config).is_err());
    }
}
