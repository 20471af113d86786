// Read-only queries over units and call-graph edges

pub mod engine;

pub use engine::{CalleeResult, QueryEngine, QueryResult};
