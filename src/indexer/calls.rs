// Call-site scanning inside function bodies

use tree_sitter::Node;

use crate::index::CallSite;
use crate::indexer::grammar::for_each_node;

/// Collect every call expression under `body`, in source order.
///
/// Only the callee's bare name is kept. Member calls lose their receiver
/// (`obj.run()` and `ptr->run()` both record `run`) and qualified calls
/// lose their scope (`ns::run()` records `run`), so calls to same-named
/// functions of different classes cannot be told apart later.
pub fn scan_calls(body: Node, source: &str) -> Vec<CallSite> {
    let mut calls = Vec::new();

    for_each_node(body, |node| {
        if node.kind() != "call_expression" {
            return;
        }
        let line = node.start_position().row as u32 + 1;
        match callee_name(node, source) {
            Some(name) => calls.push(CallSite {
                callee_name: name,
                line,
            }),
            None => tracing::trace!("Skipping unnamed call at line {}", line),
        }
    });

    calls
}

/// Bare name of the function a call expression invokes, if it has one
pub fn callee_name(call: Node, source: &str) -> Option<String> {
    let function = call.child_by_field_name("function")?;
    trailing_name(function, source)
}

fn trailing_name(node: Node, source: &str) -> Option<String> {
    match node.kind() {
        "identifier" | "field_identifier" | "destructor_name" | "operator_name" => {
            Some(source[node.byte_range()].to_string())
        }
        // obj.method / obj->method
        "field_expression" => {
            let field = node.child_by_field_name("field")?;
            trailing_name(field, source).or_else(|| strip_receiver(&source[node.byte_range()]))
        }
        // ns::func, Class::method
        "qualified_identifier" => trailing_name(node.child_by_field_name("name")?, source),
        // func<T>, obj.template method<T>
        "template_function" | "template_method" => {
            trailing_name(node.child_by_field_name("name")?, source)
        }
        _ => None,
    }
}

/// Fallback for field expressions whose field node has an unusual shape
fn strip_receiver(text: &str) -> Option<String> {
    let tail = text.rsplit("->").next()?;
    let tail = tail.rsplit('.').next()?.trim();
    let name: String = tail
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Language;
    use crate::indexer::grammar::{Grammar, SyntaxPolicy};

    fn calls_in(language: Language, source: &str) -> Vec<(String, u32)> {
        let mut grammar = Grammar::new(SyntaxPolicy::default()).unwrap();
        let tree = grammar.parse(language, source).unwrap();
        scan_calls(tree.root_node(), source)
            .into_iter()
            .map(|c| (c.callee_name, c.line))
            .collect()
    }

    #[test]
    fn test_plain_and_nested_calls() {
        let source = "void run(void) {\n    init();\n    log_value(compute(1), 2);\n}\n";
        let calls = calls_in(Language::C, source);
        assert_eq!(
            calls,
            vec![
                ("init".to_string(), 2),
                ("log_value".to_string(), 3),
                ("compute".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_member_calls_keep_only_member_name() {
        let source = "void run(Engine e, Engine *p) {\n    e.start();\n    p->stop();\n}\n";
        let calls = calls_in(Language::Cpp, source);
        assert_eq!(calls, vec![("start".to_string(), 2), ("stop".to_string(), 3)]);
    }

    #[test]
    fn test_qualified_and_template_calls() {
        let source = "void run() {\n    std::sort(a, b);\n    make<int>();\n}\n";
        let names: Vec<String> = calls_in(Language::Cpp, source).into_iter().map(|c| c.0).collect();
        assert_eq!(names, vec!["sort".to_string(), "make".to_string()]);
    }

    #[test]
    fn test_function_pointer_calls_are_skipped() {
        let source = "void run(void (*cb)(int)) {\n    (*cb)(1);\n    direct();\n}\n";
        let names: Vec<String> = calls_in(Language::C, source).into_iter().map(|c| c.0).collect();
        assert_eq!(names, vec!["direct".to_string()]);
    }

    #[test]
    fn test_strip_receiver() {
        assert_eq!(strip_receiver("a.b->c"), Some("c".to_string()));
        assert_eq!(strip_receiver("obj.method"), Some("method".to_string()));
        assert_eq!(strip_receiver("obj."), None);
    }
}
