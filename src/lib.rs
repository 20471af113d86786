// ccgraph: C and C++ code units and call graphs from tree-sitter syntax trees

pub mod config;
pub mod error;
pub mod index;
pub mod indexer;
pub mod query;

pub use config::Config;
pub use error::{AdapterError, ConfigError, ParseError, ParseFailure};
pub use index::graph::build_call_graph;
pub use index::hierarchy::flatten;
pub use index::{CallGraphEdge, CallSite, CodeUnit, Language, UnitId, UnitKind};
pub use indexer::discovery::ScanOptions;
pub use indexer::{BatchResult, IndexedBatch, Indexer, SourceFile};
