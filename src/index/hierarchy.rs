// Traversal helpers over code unit trees

use std::collections::BTreeMap;

use super::{CodeUnit, Language, UnitId, UnitKind};

/// Pre-order traversal: the root first, then each child's subtree in
/// child order. This is the canonical order used by the resolver.
pub fn flatten(root: &CodeUnit) -> Vec<&CodeUnit> {
    let mut units = Vec::with_capacity(root.subtree_len());
    let mut stack = vec![root];

    while let Some(unit) = stack.pop() {
        units.push(unit);
        // Reversed so the first child is popped next
        stack.extend(unit.children.iter().rev());
    }

    units
}

/// Post-order traversal: every unit appears after all of its children.
/// Summarizers that feed child summaries into the parent's prompt walk
/// the tree in this order.
pub fn flatten_bottom_up(root: &CodeUnit) -> Vec<&CodeUnit> {
    fn visit<'a>(unit: &'a CodeUnit, out: &mut Vec<&'a CodeUnit>) {
        for child in &unit.children {
            visit(child, out);
        }
        out.push(unit);
    }

    let mut units = Vec::with_capacity(root.subtree_len());
    visit(root, &mut units);
    units
}

/// Flatten every file of a batch, preserving file order
pub fn flatten_all(files: &[CodeUnit]) -> impl Iterator<Item = &CodeUnit> {
    files.iter().flat_map(flatten)
}

/// Look a unit up by identity inside one file tree
pub fn find_unit<'a>(root: &'a CodeUnit, id: &UnitId) -> Option<&'a CodeUnit> {
    if root.id.file != id.file {
        return None;
    }
    flatten(root).into_iter().find(|u| &u.id == id)
}

/// Unit counts per kind across a batch
pub fn count_by_kind(files: &[CodeUnit]) -> BTreeMap<UnitKind, usize> {
    let mut counts = BTreeMap::new();
    for unit in flatten_all(files) {
        *counts.entry(unit.unit_type).or_insert(0) += 1;
    }
    counts
}

/// File counts per language across a batch
pub fn count_by_language(files: &[CodeUnit]) -> Vec<(Language, usize)> {
    let c = files.iter().filter(|f| f.language == Language::C).count();
    let cpp = files.len() - c;
    vec![(Language::C, c), (Language::Cpp, cpp)]
}
