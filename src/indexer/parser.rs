// C and C++ code unit extraction

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;
use tree_sitter::{Node, Tree};

use crate::error::{AdapterError, ParseError};
use crate::index::{is_supported_file, CodeUnit, Language, UnitId, UnitKind};
use crate::indexer::calls::scan_calls;
use crate::indexer::grammar::{for_each_node, Grammar, SyntaxPolicy};

static INCLUDE_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<"]([^>"]+)[>"]"#).expect("include pattern is valid"));

/// Parser for C and C++ files using tree-sitter
pub struct CFamilyParser {
    grammar: Grammar,
}

impl CFamilyParser {
    pub fn new(policy: SyntaxPolicy) -> Result<Self, AdapterError> {
        Ok(Self {
            grammar: Grammar::new(policy)?,
        })
    }

    pub fn with_grammar(grammar: Grammar) -> Self {
        Self { grammar }
    }

    pub fn can_parse(&self, file_path: &str) -> bool {
        is_supported_file(file_path)
    }

    /// Parse one file into its unit tree. The root is always the `File` unit.
    ///
    /// Fails only when the grammar cannot produce an acceptable syntax tree;
    /// a file with no functions or types is a valid, childless result.
    pub fn parse(&mut self, file_path: &str, content: &str) -> Result<CodeUnit, ParseError> {
        let language = Language::from_path(file_path);
        let tree = self
            .grammar
            .parse(language, content)
            .map_err(|e| ParseError::new(file_path, e))?;

        Ok(extract_file(&tree, content, file_path, language))
    }
}

/// Build the unit tree of an already parsed file
pub fn extract_file(tree: &Tree, content: &str, file_path: &str, language: Language) -> CodeUnit {
    let extractor = UnitExtractor {
        source: content,
        language,
    };
    let root = tree.root_node();
    let line_count = line_count(content);

    let mut file = CodeUnit::new(UnitKind::File, file_name(file_path), language);
    file.code = content.to_string();
    file.byte_range = 0..content.len();
    file.start_line = 1;
    file.end_line = line_count;
    file.includes = extractor.includes(root);
    file.metadata = json!({
        "file_path": file_path,
        "content_hash": blake3::hash(content.as_bytes()).to_string(),
        "line_count": line_count,
    });

    extractor.collect_units(root, &Scope::default(), &mut file.children);
    assign_ids(&mut file, file_path, None, &mut 0);

    debug!(
        "Extracted {} units from {} ({} includes)",
        file.subtree_len() - 1,
        file_path,
        file.includes.len()
    );

    file
}

fn file_name(file_path: &str) -> String {
    Path::new(file_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_path.to_string())
}

/// Lines in the source, counting the (possibly empty) text after the last newline
fn line_count(content: &str) -> u32 {
    content.bytes().filter(|&b| b == b'\n').count() as u32 + 1
}

/// Number units in pre-order and point every unit at its owner
fn assign_ids(unit: &mut CodeUnit, file_path: &str, parent: Option<&UnitId>, next: &mut u32) {
    unit.id = UnitId::new(file_path, *next);
    unit.parent_id = parent.cloned();
    *next += 1;

    let id = unit.id.clone();
    for child in &mut unit.children {
        assign_ids(child, file_path, Some(&id), next);
    }
}

/// CST node kinds that produce units or change scope. Everything else is
/// walked through transparently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeKind {
    FunctionDefinition,
    ClassSpecifier,
    StructSpecifier,
    TypeDefinition,
    Declaration,
    NamespaceDefinition,
    LinkageSpecification,
    Other,
}

impl NodeKind {
    fn of(node: Node) -> Self {
        match node.kind() {
            "function_definition" => NodeKind::FunctionDefinition,
            "class_specifier" => NodeKind::ClassSpecifier,
            "struct_specifier" => NodeKind::StructSpecifier,
            "type_definition" => NodeKind::TypeDefinition,
            "declaration" | "field_declaration" => NodeKind::Declaration,
            "namespace_definition" => NodeKind::NamespaceDefinition,
            "linkage_specification" => NodeKind::LinkageSpecification,
            _ => NodeKind::Other,
        }
    }
}

/// Where the walker currently is: inside which class and namespaces
#[derive(Debug, Clone, Default)]
struct Scope {
    class: Option<String>,
    namespace: Vec<String>,
}

impl Scope {
    fn in_class(&self, name: &str) -> Self {
        Self {
            class: Some(name.to_string()),
            namespace: self.namespace.clone(),
        }
    }

    fn in_namespace(&self, name: Option<&str>) -> Self {
        let mut namespace = self.namespace.clone();
        // Anonymous namespaces add nothing to the path
        if let Some(name) = name {
            namespace.push(name.to_string());
        }
        Self {
            class: self.class.clone(),
            namespace,
        }
    }

    fn namespace_path(&self) -> Option<String> {
        (!self.namespace.is_empty()).then(|| self.namespace.join("::"))
    }

    /// Record enclosing class and namespace on a unit's metadata
    fn annotate(&self, metadata: &mut Map<String, Value>) {
        if let Some(class) = &self.class {
            metadata.insert("parent_name".to_string(), json!(class));
        }
        if let Some(namespace) = self.namespace_path() {
            metadata.insert("namespace".to_string(), json!(namespace));
        }
    }
}

/// The parts of a function declarator a signature is built from
struct FunctionShape<'t> {
    name: String,
    qualified_name: Option<String>,
    parameters: Node<'t>,
    /// `*`, `&` or `&&` wrappers between the return type and the name
    indirection: String,
    returned: Option<ReturnedFunction<'t>>,
}

/// The function-pointer type a function returns, as in
/// `void (*signal(int sig, void (*handler)(int)))(int)`
struct ReturnedFunction<'t> {
    /// The whole declarator, name and both parameter lists included
    declarator: Node<'t>,
    /// Wrappers outside the parentheses
    indirection: String,
    /// Parameters of the returned function type
    parameters: Node<'t>,
}

struct UnitExtractor<'s> {
    source: &'s str,
    language: Language,
}

impl<'s> UnitExtractor<'s> {
    fn text(&self, node: Node) -> &'s str {
        &self.source[node.byte_range()]
    }

    fn line_of(node: Node) -> u32 {
        node.start_position().row as u32 + 1
    }

    /// Header names of every `#include`, including ones inside
    /// conditional blocks
    fn includes(&self, root: Node) -> Vec<String> {
        let mut includes = Vec::new();

        for_each_node(root, |node| {
            if node.kind() != "preproc_include" {
                return;
            }
            let text = node
                .child_by_field_name("path")
                .map(|path| self.text(path))
                .unwrap_or_else(|| self.text(node));
            match INCLUDE_PATH.captures(text) {
                Some(caps) => includes.push(caps[1].to_string()),
                None => debug!("Skipping computed include at line {}", Self::line_of(node)),
            }
        });

        includes
    }

    /// Walk the children of `node`, appending every unit found to `out`
    fn collect_units(&self, node: Node, scope: &Scope, out: &mut Vec<CodeUnit>) {
        let mut cursor = node.walk();

        for child in node.children(&mut cursor) {
            match NodeKind::of(child) {
                NodeKind::FunctionDefinition => {
                    self.collect_inline_type(child, scope, out);
                    self.push_or_skip(self.extract_function(child, scope), child, out);
                }
                NodeKind::ClassSpecifier => {
                    // Bodiless specifiers are forward declarations or type references
                    if child.child_by_field_name("body").is_some() {
                        self.push_or_skip(self.extract_class(child, scope, None), child, out);
                    }
                }
                NodeKind::StructSpecifier => {
                    if child.child_by_field_name("body").is_some() {
                        self.push_or_skip(self.extract_struct(child, scope, None), child, out);
                    }
                }
                NodeKind::TypeDefinition => self.collect_type_definition(child, scope, out),
                NodeKind::Declaration => {
                    self.collect_inline_type(child, scope, out);
                    // Variables produce no unit
                    if let Some(unit) = self.extract_declaration(child, scope) {
                        out.push(unit);
                    }
                }
                NodeKind::NamespaceDefinition => {
                    let name = child.child_by_field_name("name").map(|n| self.text(n));
                    self.collect_units(child, &scope.in_namespace(name), out);
                }
                NodeKind::LinkageSpecification | NodeKind::Other => {
                    self.collect_units(child, scope, out);
                }
            }
        }
    }

    fn push_or_skip(&self, unit: Option<CodeUnit>, node: Node, out: &mut Vec<CodeUnit>) {
        match unit {
            Some(unit) => out.push(unit),
            None => debug!(
                "Skipping unextractable {} at line {}",
                node.kind(),
                Self::line_of(node)
            ),
        }
    }

    /// A class or struct defined in the same statement as a function or
    /// variable: `struct s { ... } make(void) { ... }`, `struct s { ... } v;`
    fn collect_inline_type(&self, node: Node, scope: &Scope, out: &mut Vec<CodeUnit>) {
        let ty = match node.child_by_field_name("type") {
            Some(ty) if ty.child_by_field_name("body").is_some() => ty,
            _ => return,
        };

        let unit = match NodeKind::of(ty) {
            NodeKind::ClassSpecifier => self.extract_class(ty, scope, None),
            NodeKind::StructSpecifier => self.extract_struct(ty, scope, None),
            _ => return,
        };
        self.push_or_skip(unit, ty, out);
    }

    /// `typedef struct { ... } name;` names an otherwise anonymous type
    fn collect_type_definition(&self, node: Node, scope: &Scope, out: &mut Vec<CodeUnit>) {
        if let Some(ty) = node.child_by_field_name("type") {
            let anonymous = ty.child_by_field_name("name").is_none()
                && ty.child_by_field_name("body").is_some();

            if anonymous {
                let mut cursor = node.walk();
                let alias = node
                    .children_by_field_name("declarator", &mut cursor)
                    .find(|d| d.kind() == "type_identifier")
                    .map(|d| self.text(d));

                let unit = match ty.kind() {
                    "struct_specifier" => Some(self.extract_struct(ty, scope, alias)),
                    "class_specifier" => Some(self.extract_class(ty, scope, alias)),
                    _ => None,
                };
                if let Some(unit) = unit {
                    self.push_or_skip(unit, ty, out);
                    return;
                }
            }
        }

        self.collect_units(node, scope, out);
    }

    /// A span of source as a unit of the given kind
    fn unit_at(&self, kind: UnitKind, name: &str, node: Node) -> CodeUnit {
        let mut unit = CodeUnit::new(kind, name, self.language);
        unit.code = self.text(node).to_string();
        unit.byte_range = node.byte_range();
        unit.start_line = node.start_position().row as u32 + 1;
        unit.end_line = node.end_position().row as u32 + 1;
        unit
    }

    fn extract_function(&self, node: Node, scope: &Scope) -> Option<CodeUnit> {
        let declarator = node.child_by_field_name("declarator")?;
        let shape = self.function_shape(declarator)?;

        let kind = if scope.class.is_some() {
            UnitKind::Method
        } else {
            UnitKind::Function
        };

        let mut unit = self.unit_at(kind, &shape.name, node);
        let (signature, metadata) = self.callable_parts(node, &shape, scope);
        unit.signature = Some(signature);
        unit.metadata = Value::Object(metadata);

        // The body is scanned for calls but not broken into further units
        if let Some(body) = node.child_by_field_name("body") {
            unit.call_sites = scan_calls(body, self.source);
        }

        Some(unit)
    }

    /// Prototypes: `int f(int);` at file scope, `void m();` in a class body
    fn extract_declaration(&self, node: Node, scope: &Scope) -> Option<CodeUnit> {
        let mut cursor = node.walk();
        let shape = node
            .children_by_field_name("declarator", &mut cursor)
            .find_map(|d| self.function_shape(d))?;

        let mut unit = self.unit_at(UnitKind::FunctionDeclaration, &shape.name, node);
        let (signature, mut metadata) = self.callable_parts(node, &shape, scope);
        metadata.insert("is_declaration".to_string(), json!(true));
        unit.signature = Some(signature);
        unit.metadata = Value::Object(metadata);

        Some(unit)
    }

    fn extract_class(&self, node: Node, scope: &Scope, alias: Option<&str>) -> Option<CodeUnit> {
        let body = node.child_by_field_name("body")?;
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .or(alias)?;

        let mut unit = self.unit_at(UnitKind::Class, name, node);

        let mut cursor = node.walk();
        let base_clause = node
            .children(&mut cursor)
            .find(|c| c.kind() == "base_class_clause");

        let mut metadata = Map::new();
        metadata.insert("members".to_string(), json!(self.member_declarations(body)));
        match base_clause {
            Some(clause) => {
                unit.signature = Some(format!("class {} {}", name, self.text(clause).trim()));
                metadata.insert("bases".to_string(), json!(self.base_names(clause)));
            }
            None => unit.signature = Some(format!("class {}", name)),
        }
        if alias.is_some() && node.child_by_field_name("name").is_none() {
            metadata.insert("typedef".to_string(), json!(true));
        }
        scope.annotate(&mut metadata);
        unit.metadata = Value::Object(metadata);

        self.collect_units(body, &scope.in_class(name), &mut unit.children);

        Some(unit)
    }

    /// Structs keep their fields as raw declarations and are not searched
    /// for calls or nested units
    fn extract_struct(&self, node: Node, scope: &Scope, alias: Option<&str>) -> Option<CodeUnit> {
        let body = node.child_by_field_name("body")?;
        let tag = node.child_by_field_name("name").map(|n| self.text(n));
        let name = tag.or(alias)?;

        let mut unit = self.unit_at(UnitKind::Struct, name, node);
        unit.signature = tag.map(|tag| format!("struct {}", tag));

        let mut metadata = Map::new();
        metadata.insert("members".to_string(), json!(self.member_declarations(body)));
        if tag.is_none() {
            metadata.insert("typedef".to_string(), json!(true));
        }
        scope.annotate(&mut metadata);
        unit.metadata = Value::Object(metadata);

        Some(unit)
    }

    /// Signature string and callable metadata shared by definitions and
    /// prototypes
    fn callable_parts(&self, node: Node, shape: &FunctionShape, scope: &Scope) -> (String, Map<String, Value>) {
        let base_type = node
            .child_by_field_name("type")
            .map(|t| self.type_head(t))
            .unwrap_or("");
        let parameters = self.parameters(shape.parameters);

        let (return_type, signature) = match &shape.returned {
            // `void (*signal(int, void (*)(int)))(int)` is kept as written
            Some(returned) => (
                format!(
                    "{}{} ({}){}",
                    base_type,
                    returned.indirection,
                    shape.indirection,
                    self.text(returned.parameters)
                ),
                format!("{} {}", base_type, self.text(returned.declarator))
                    .trim_start()
                    .to_string(),
            ),
            None => {
                let return_type = format!("{}{}", base_type, shape.indirection);
                let signature = if return_type.is_empty() {
                    format!("{}({})", shape.name, parameters.join(", "))
                } else {
                    format!("{} {}({})", return_type, shape.name, parameters.join(", "))
                };
                (return_type, signature)
            }
        };

        let mut metadata = Map::new();
        metadata.insert("return_type".to_string(), json!(return_type));
        metadata.insert("parameters".to_string(), json!(parameters));
        if let Some(qualified_name) = &shape.qualified_name {
            metadata.insert("qualified_name".to_string(), json!(qualified_name));
        }
        scope.annotate(&mut metadata);

        (signature, metadata)
    }

    /// A type as written before a declarator. Types defined in place
    /// (`struct s { ... } make(void)`) keep only their head, `struct s`.
    fn type_head(&self, ty: Node) -> &'s str {
        match ty.child_by_field_name("body") {
            Some(body) => self.source[ty.start_byte()..body.start_byte()].trim(),
            None => self.text(ty).trim(),
        }
    }

    /// Follow a declarator through pointer, reference and parenthesized
    /// wrappers to the function declarator that carries the name. Returns
    /// `None` for anything that is not a named function, including
    /// function-pointer variables.
    fn function_shape<'t>(&self, declarator: Node<'t>) -> Option<FunctionShape<'t>> {
        let mut node = declarator;
        let mut indirection = String::new();
        let mut returned = None;

        loop {
            node = match node.kind() {
                "function_declarator" => {
                    let inner = node.child_by_field_name("declarator")?;
                    if inner.kind() != "parenthesized_declarator" {
                        break;
                    }
                    // Either a function returning a function pointer or a
                    // function-pointer variable; only the former reaches a
                    // second function declarator below
                    returned = Some(ReturnedFunction {
                        declarator,
                        indirection: std::mem::take(&mut indirection),
                        parameters: node.child_by_field_name("parameters")?,
                    });
                    inner
                }
                "parenthesized_declarator" => node.named_child(0)?,
                "pointer_declarator" => {
                    indirection.push('*');
                    node.child_by_field_name("declarator")?
                }
                "reference_declarator" => {
                    let token = node.child(0).map(|t| t.kind()).unwrap_or("&");
                    indirection.push_str(if token == "&&" { "&&" } else { "&" });
                    node.named_child(0)?
                }
                "attributed_declarator" => node.named_child(0)?,
                _ => return None,
            };
        }

        let parameters = node.child_by_field_name("parameters")?;
        let (name, qualified_name) = self.declarator_name(node.child_by_field_name("declarator")?)?;

        Some(FunctionShape {
            name,
            qualified_name,
            parameters,
            indirection,
            returned,
        })
    }

    /// Bare name of a declarator, plus the full text when it is qualified
    /// (`Foo::bar` -> `bar`, `Some("Foo::bar")`)
    fn declarator_name(&self, node: Node) -> Option<(String, Option<String>)> {
        match node.kind() {
            "identifier" | "field_identifier" | "destructor_name" | "operator_name" => {
                Some((self.text(node).to_string(), None))
            }
            "qualified_identifier" => {
                let (name, _) = self.declarator_name(node.child_by_field_name("name")?)?;
                Some((name, Some(self.text(node).to_string())))
            }
            "template_function" => self.declarator_name(node.child_by_field_name("name")?),
            _ => None,
        }
    }

    fn parameters(&self, list: Node) -> Vec<String> {
        let mut cursor = list.walk();
        list.named_children(&mut cursor)
            .filter(|p| {
                matches!(
                    p.kind(),
                    "parameter_declaration"
                        | "optional_parameter_declaration"
                        | "variadic_parameter_declaration"
                        | "variadic_parameter"
                )
            })
            .map(|p| self.text(p).to_string())
            .collect()
    }

    /// Data members of a struct or class body, without the trailing `;`
    fn member_declarations(&self, body: Node) -> Vec<String> {
        let mut cursor = body.walk();
        body.named_children(&mut cursor)
            .filter(|c| c.kind() == "field_declaration")
            .filter(|c| {
                // Nested type definitions without a declarator are units, not members
                let mut inner = c.walk();
                let declarators: Vec<Node> = c.children_by_field_name("declarator", &mut inner).collect();
                !declarators.is_empty() && !declarators.iter().any(|d| self.function_shape(*d).is_some())
            })
            .map(|c| self.text(c).trim().trim_end_matches(';').trim_end().to_string())
            .collect()
    }

    fn base_names(&self, clause: Node) -> Vec<String> {
        let mut cursor = clause.walk();
        clause
            .named_children(&mut cursor)
            .filter(|c| {
                matches!(
                    c.kind(),
                    "type_identifier" | "qualified_identifier" | "template_type"
                )
            })
            .map(|c| self.text(c).to_string())
            .collect()
    }
}
