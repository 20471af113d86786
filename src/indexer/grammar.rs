// tree-sitter grammars for C and C++

use tree_sitter::{Node, Parser as TreeParser, Tree};

use crate::error::AdapterError;
use crate::index::Language;

/// How much broken syntax a file may contain before it is rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntaxPolicy {
    /// Reject any tree containing ERROR or MISSING nodes
    pub strict: bool,
    /// Reject when ERROR nodes cover more than this share of the source
    pub max_error_ratio: f64,
}

impl Default for SyntaxPolicy {
    fn default() -> Self {
        Self {
            strict: false,
            max_error_ratio: 0.5,
        }
    }
}

/// One parser per language, created once and reused for every file a
/// worker handles. `tree_sitter::Parser` needs `&mut` to parse, so each
/// worker thread owns its own `Grammar`.
pub struct Grammar {
    c: TreeParser,
    cpp: TreeParser,
    policy: SyntaxPolicy,
    files_parsed: usize,
}

impl Grammar {
    pub fn new(policy: SyntaxPolicy) -> Result<Self, AdapterError> {
        Ok(Self {
            c: Self::parser_for(Language::C)?,
            cpp: Self::parser_for(Language::Cpp)?,
            policy,
            files_parsed: 0,
        })
    }

    fn parser_for(language: Language) -> Result<TreeParser, AdapterError> {
        let mut parser = TreeParser::new();
        let result = match language {
            Language::C => parser.set_language(&tree_sitter_c::LANGUAGE.into()),
            Language::Cpp => parser.set_language(&tree_sitter_cpp::LANGUAGE.into()),
        };
        result.map_err(|e| AdapterError::GrammarUnavailable {
            language,
            message: e.to_string(),
        })?;
        Ok(parser)
    }

    pub fn policy(&self) -> SyntaxPolicy {
        self.policy
    }

    /// Files this grammar has parsed, accepted or not
    pub fn files_parsed(&self) -> usize {
        self.files_parsed
    }

    /// Parse a whole file and apply the syntax-error policy
    pub fn parse(&mut self, language: Language, source: &str) -> Result<Tree, AdapterError> {
        let parser = match language {
            Language::C => &mut self.c,
            Language::Cpp => &mut self.cpp,
        };

        self.files_parsed += 1;
        let tree = parser
            .parse(source, None)
            .ok_or(AdapterError::NoTree { language })?;

        let root = tree.root_node();
        if root.has_error() {
            let (error_bytes, first_error_line) = error_coverage(root);
            let ratio = error_bytes as f64 / source.len().max(1) as f64;

            if self.policy.strict || ratio > self.policy.max_error_ratio {
                return Err(AdapterError::SyntaxErrors {
                    ratio,
                    first_error_line,
                });
            }

            tracing::debug!(
                "Tolerating syntax errors over {:.1}% of the source (first at line {})",
                ratio * 100.0,
                first_error_line
            );
        }

        Ok(tree)
    }
}

/// Visit `root` and every node below it in pre-order, without recursion
pub fn for_each_node<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>)) {
    let mut cursor = root.walk();

    loop {
        visit(cursor.node());

        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            // Back at `root`: the cursor never leaves the subtree it started in
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// Bytes covered by outermost ERROR nodes, and the 1-based line of the
/// first ERROR or MISSING node.
fn error_coverage(root: Node) -> (usize, u32) {
    let mut bytes = 0;
    let mut first_line: Option<u32> = None;
    let mut stack = vec![root];

    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let line = node.start_position().row as u32 + 1;
            first_line = Some(first_line.map_or(line, |l| l.min(line)));
            if node.is_error() {
                bytes += node.end_byte() - node.start_byte();
                continue;
            }
        }

        if node.has_error() {
            let mut cursor = node.walk();
            stack.extend(node.children(&mut cursor));
        }
    }

    (bytes, first_line.unwrap_or(1))
}
