// Code unit model, hierarchy helpers and call-graph resolution

pub mod graph;
pub mod hierarchy;

use std::fmt;
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Source language of a file, decided by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    Cpp,
}

impl Language {
    pub const C_EXTENSIONS: &'static [&'static str] = &["c", "h"];
    pub const CPP_EXTENSIONS: &'static [&'static str] = &["cpp", "cc", "cxx", "hpp", "hxx", "hh"];
    pub const HEADER_EXTENSIONS: &'static [&'static str] = &["h", "hpp", "hxx", "hh"];

    /// Unknown or missing extensions fall back to C.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        match extension_of(path.as_ref()) {
            Some(ext) if Self::CPP_EXTENSIONS.contains(&ext.as_str()) => Language::Cpp,
            _ => Language::C,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "cpp",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercased extension without the dot
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

/// True for any C or C++ source or header extension
pub fn is_supported_file(path: impl AsRef<Path>) -> bool {
    extension_of(path.as_ref()).is_some_and(|ext| {
        Language::C_EXTENSIONS.contains(&ext.as_str()) || Language::CPP_EXTENSIONS.contains(&ext.as_str())
    })
}

pub fn is_header_file(path: impl AsRef<Path>) -> bool {
    extension_of(path.as_ref()).is_some_and(|ext| Language::HEADER_EXTENSIONS.contains(&ext.as_str()))
}

/// Kinds of code units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    File,
    Function,
    Method,
    Class,
    Struct,
    FunctionDeclaration,
}

impl UnitKind {
    /// Functions and methods are the only units that own call sites
    /// and the only ones the resolver can point at.
    pub fn is_callable(&self) -> bool {
        matches!(self, UnitKind::Function | UnitKind::Method)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::File => "file",
            UnitKind::Function => "function",
            UnitKind::Method => "method",
            UnitKind::Class => "class",
            UnitKind::Struct => "struct",
            UnitKind::FunctionDeclaration => "function_declaration",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "file" => Some(UnitKind::File),
            "function" => Some(UnitKind::Function),
            "method" => Some(UnitKind::Method),
            "class" => Some(UnitKind::Class),
            "struct" => Some(UnitKind::Struct),
            "function_declaration" => Some(UnitKind::FunctionDeclaration),
            _ => None,
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// In-memory identity of a unit: the file it came from and its pre-order
/// position inside that file. Only meaningful within one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId {
    pub file: String,
    pub ordinal: u32,
}

impl UnitId {
    pub fn new(file: impl Into<String>, ordinal: u32) -> Self {
        Self {
            file: file.into(),
            ordinal,
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file, self.ordinal)
    }
}

/// An unresolved call found inside a function or method body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub callee_name: String,
    pub line: u32,
}

/// A named, line-ranged, typed fragment of source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeUnit {
    pub id: UnitId,
    pub parent_id: Option<UnitId>,
    pub unit_type: UnitKind,
    pub name: String,
    pub signature: Option<String>,
    pub code: String,
    pub start_line: u32,
    pub end_line: u32,
    pub byte_range: Range<usize>,
    pub language: Language,
    pub children: Vec<CodeUnit>,
    pub call_sites: Vec<CallSite>,
    pub includes: Vec<String>,
    pub metadata: serde_json::Value,
}

impl CodeUnit {
    /// A unit with no code, children or metadata yet. Identity is assigned
    /// once the whole file tree is built.
    pub fn new(unit_type: UnitKind, name: impl Into<String>, language: Language) -> Self {
        Self {
            id: UnitId::default(),
            parent_id: None,
            unit_type,
            name: name.into(),
            signature: None,
            code: String::new(),
            start_line: 1,
            end_line: 1,
            byte_range: 0..0,
            language,
            children: Vec::new(),
            call_sites: Vec::new(),
            includes: Vec::new(),
            metadata: serde_json::json!({}),
        }
    }

    /// Path of the file this unit was extracted from
    pub fn file_path(&self) -> &str {
        &self.id.file
    }

    pub fn is_callable(&self) -> bool {
        self.unit_type.is_callable()
    }

    /// Metadata string value, if present
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }

    /// Functions and methods anywhere under this unit, in pre-order
    pub fn callables(&self) -> impl Iterator<Item = &CodeUnit> {
        hierarchy::flatten(self).into_iter().filter(|u| u.is_callable())
    }

    /// Number of units in this subtree, including itself
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(CodeUnit::subtree_len).sum::<usize>()
    }
}

/// Relationship from a calling unit to a callee name and, when the name is
/// known in the batch, the unit it resolved to.
///
/// `callee_id` is best-effort: resolution matches bare names across the
/// whole batch and keeps the first definition seen, so same-named functions
/// in different classes or namespaces are not told apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraphEdge {
    pub caller_id: UnitId,
    pub callee_name: String,
    pub callee_id: Option<UnitId>,
    pub call_line: u32,
}

impl CallGraphEdge {
    pub fn is_resolved(&self) -> bool {
        self.callee_id.is_some()
    }
}
