// Query execution over an extracted batch

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::index::hierarchy::flatten_all;
use crate::index::{CallGraphEdge, CodeUnit, UnitId, UnitKind};

/// Query result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    pub unit_id: UnitId,
    pub name: String,
    pub kind: UnitKind,
    pub file: String,
    pub line: u32,
    pub signature: Option<String>,
}

impl QueryResult {
    fn from_unit(unit: &CodeUnit) -> Self {
        Self {
            unit_id: unit.id.clone(),
            name: unit.name.clone(),
            kind: unit.unit_type,
            file: unit.file_path().to_string(),
            line: unit.start_line,
            signature: unit.signature.clone(),
        }
    }
}

/// One outgoing call of a unit. `target` is `None` for calls that did not
/// resolve inside the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalleeResult {
    pub callee_name: String,
    pub call_line: u32,
    pub target: Option<QueryResult>,
}

/// Query engine over one batch's units and edges
pub struct QueryEngine<'a> {
    edges: &'a [CallGraphEdge],
    units: Vec<&'a CodeUnit>,
    by_id: HashMap<&'a UnitId, &'a CodeUnit>,
}

impl<'a> QueryEngine<'a> {
    pub fn new(files: &'a [CodeUnit], edges: &'a [CallGraphEdge]) -> Self {
        let units: Vec<&CodeUnit> = flatten_all(files).collect();
        let by_id = units.iter().map(|&u| (&u.id, u)).collect();
        Self { edges, units, by_id }
    }

    fn callables_named(&self, name: &str) -> HashSet<&'a UnitId> {
        self.units
            .iter()
            .copied()
            .filter(|u| u.is_callable() && u.name == name)
            .map(|u| &u.id)
            .collect()
    }

    /// Find all callers of a function or method. Each caller is listed once.
    pub fn find_callers(&self, target: &str) -> Vec<QueryResult> {
        let targets = self.callables_named(target);
        if targets.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for edge in self.edges {
            let Some(callee) = &edge.callee_id else {
                continue;
            };
            if !targets.contains(callee) || !seen.insert(&edge.caller_id) {
                continue;
            }
            if let Some(caller) = self.by_id.get(&edge.caller_id) {
                results.push(QueryResult::from_unit(caller));
            }
        }

        results
    }

    /// Find all calls made by functions or methods with this name
    pub fn find_callees(&self, target: &str) -> Vec<CalleeResult> {
        let callers = self.callables_named(target);

        self.edges
            .iter()
            .filter(|edge| callers.contains(&edge.caller_id))
            .map(|edge| CalleeResult {
                callee_name: edge.callee_name.clone(),
                call_line: edge.call_line,
                target: edge
                    .callee_id
                    .as_ref()
                    .and_then(|id| self.by_id.get(id))
                    .map(|unit| QueryResult::from_unit(unit)),
            })
            .collect()
    }

    /// Search units by case-insensitive name substring, in batch order
    pub fn search_units(&self, query: &str, kind: Option<UnitKind>, limit: usize) -> Vec<QueryResult> {
        let needle = query.to_lowercase();

        self.units
            .iter()
            .filter(|u| kind.map_or(true, |k| u.unit_type == k))
            .filter(|u| u.name.to_lowercase().contains(&needle))
            .take(limit)
            .map(|u| QueryResult::from_unit(u))
            .collect()
    }

    /// Distinct callee names that resolved to nothing, most called first
    pub fn unresolved_calls(&self) -> Vec<(String, usize)> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for edge in self.edges.iter().filter(|e| !e.is_resolved()) {
            *counts.entry(edge.callee_name.as_str()).or_insert(0) += 1;
        }

        let mut results: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        // Stable sort keeps names alphabetical within a count
        results.sort_by(|a, b| b.1.cmp(&a.1));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::graph::build_call_graph;
    use crate::indexer::grammar::SyntaxPolicy;
    use crate::indexer::parse_one;

    fn batch() -> Vec<CodeUnit> {
        vec![
            parse_one(
                "engine.cpp",
                "class Engine {\n    void start() { spin(); log(\"go\"); }\n    void spin() { log(\"spin\"); }\n};\n",
                SyntaxPolicy::default(),
            )
            .unwrap(),
            parse_one(
                "main.c",
                "void spin(void);\nint main(void) {\n    spin();\n    spin();\n    exit(0);\n}\n",
                SyntaxPolicy::default(),
            )
            .unwrap(),
        ]
    }

    #[test]
    fn test_find_callers() {
        let files = batch();
        let edges = build_call_graph(&files);
        let engine = QueryEngine::new(&files, &edges);

        let callers = engine.find_callers("spin");
        let names: Vec<&str> = callers.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["start", "main"]);
        assert_eq!(callers[1].file, "main.c");
        assert_eq!(callers[1].line, 2);

        assert!(engine.find_callers("missing").is_empty());
        // Prototypes are not call targets
        assert!(engine.find_callers("exit").is_empty());
    }

    #[test]
    fn test_find_callees() {
        let files = batch();
        let edges = build_call_graph(&files);
        let engine = QueryEngine::new(&files, &edges);

        let callees = engine.find_callees("start");
        assert_eq!(callees.len(), 2);
        assert_eq!(callees[0].callee_name, "spin");
        assert_eq!(callees[0].target.as_ref().map(|t| t.kind), Some(UnitKind::Method));
        assert_eq!(callees[1].callee_name, "log");
        assert_eq!(callees[1].target, None);
    }

    #[test]
    fn test_search_units() {
        let files = batch();
        let engine = QueryEngine::new(&files, &[]);

        let hits = engine.search_units("SPIN", None, 10);
        let kinds: Vec<UnitKind> = hits.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![UnitKind::Method, UnitKind::FunctionDeclaration]);

        let hits = engine.search_units("spin", Some(UnitKind::FunctionDeclaration), 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file, "main.c");

        assert_eq!(engine.search_units("", None, 3).len(), 3);
    }

    #[test]
    fn test_unresolved_calls() {
        let files = batch();
        let edges = build_call_graph(&files);
        let engine = QueryEngine::new(&files, &edges);

        assert_eq!(
            engine.unresolved_calls(),
            vec![("log".to_string(), 2), ("exit".to_string(), 1)]
        );
    }
}
