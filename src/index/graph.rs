// Batch-wide call-graph resolution

use std::collections::HashMap;

use tracing::debug;

use super::{CallGraphEdge, CodeUnit, UnitId};

/// Bare name -> first function or method defined with that name.
///
/// Built over the whole batch in input order. When several units share a
/// name the first one seen wins, so results are stable for a fixed file
/// order.
pub struct NameIndex<'a> {
    by_name: HashMap<&'a str, &'a UnitId>,
}

impl<'a> NameIndex<'a> {
    pub fn build(files: &'a [CodeUnit]) -> Self {
        let mut by_name: HashMap<&'a str, &'a UnitId> = HashMap::new();
        let mut shadowed = 0usize;

        for unit in files.iter().flat_map(|file| file.callables()) {
            match by_name.entry(unit.name.as_str()) {
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(&unit.id);
                }
                std::collections::hash_map::Entry::Occupied(existing) => {
                    shadowed += 1;
                    debug!(
                        "{} at {} shadowed by earlier definition {}",
                        unit.name,
                        unit.id,
                        existing.get()
                    );
                }
            }
        }

        if shadowed > 0 {
            debug!("{} callable units share a name with an earlier unit", shadowed);
        }

        Self { by_name }
    }

    pub fn resolve(&self, name: &str) -> Option<&'a UnitId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Resolve every recorded call site in the batch.
///
/// Emits exactly one edge per call site of every function and method.
/// Calls with no matching unit are kept with `callee_id = None`; they
/// usually point at library or system functions. This never fails.
pub fn build_call_graph(files: &[CodeUnit]) -> Vec<CallGraphEdge> {
    let index = NameIndex::build(files);
    let mut edges = Vec::new();

    for caller in files.iter().flat_map(|file| file.callables()) {
        for call in &caller.call_sites {
            edges.push(CallGraphEdge {
                caller_id: caller.id.clone(),
                callee_name: call.callee_name.clone(),
                callee_id: index.resolve(&call.callee_name).cloned(),
                call_line: call.line,
            });
        }
    }

    let resolved = edges.iter().filter(|e| e.is_resolved()).count();
    debug!(
        "Call graph: {} edges ({} resolved, {} unresolved) over {} names",
        edges.len(),
        resolved,
        edges.len() - resolved,
        index.len()
    );

    edges
}
