// End-to-end batch extraction and call-graph resolution

use std::fs;
use std::path::Path;

use ccgraph::index::hierarchy::{flatten, flatten_all};
use ccgraph::{
    CallGraphEdge, CodeUnit, Config, Indexer, ScanOptions, SourceFile, UnitId, UnitKind,
};

fn indexer(strict: bool) -> Indexer {
    let mut config = Config::default();
    config.extraction.strict_syntax = strict;
    Indexer::new(config).unwrap()
}

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

#[test]
fn test_invalid_file_is_isolated() {
    let sources = vec![
        SourceFile::new("util.c", "int twice(int x) {\n    return x * 2;\n}\n"),
        SourceFile::new("broken.c", "int broken(int x {\n    return twice(x;\n"),
        SourceFile::new("main.c", "int main(void) {\n    return twice(21);\n}\n"),
    ];

    let batch = indexer(true).index_files(&sources);

    assert_eq!(batch.files.len(), 2);
    assert_eq!(batch.errors.len(), 1);
    assert_eq!(batch.errors[0].file_path, "broken.c");

    let files: Vec<&str> = batch.files.iter().map(|f| f.file_path()).collect();
    assert_eq!(files, vec!["util.c", "main.c"]);

    assert_eq!(batch.edges.len(), 1);
    let edge = &batch.edges[0];
    assert_eq!(edge.caller_id.file, "main.c");
    assert_eq!(edge.callee_id.as_ref().map(|id| id.file.as_str()), Some("util.c"));
}

#[test]
fn test_method_calls_free_function() {
    let sources = vec![SourceFile::new(
        "foo.cpp",
        "class Foo {\n    void bar() { baz(); }\n};\nvoid baz() {}\n",
    )];

    let batch = indexer(false).index_files(&sources);
    assert!(batch.errors.is_empty());

    let file = &batch.files[0];
    let kinds: Vec<(UnitKind, &str)> = file
        .children
        .iter()
        .map(|c| (c.unit_type, c.name.as_str()))
        .collect();
    assert_eq!(kinds, vec![(UnitKind::Class, "Foo"), (UnitKind::Function, "baz")]);

    let foo = &file.children[0];
    assert_eq!(foo.children.len(), 1);
    let bar = &foo.children[0];
    assert_eq!((bar.unit_type, bar.name.as_str()), (UnitKind::Method, "bar"));
    assert_eq!(bar.call_sites.len(), 1);

    let baz = &file.children[1];
    assert_eq!(
        batch.edges,
        vec![CallGraphEdge {
            caller_id: bar.id.clone(),
            callee_name: "baz".to_string(),
            callee_id: Some(baz.id.clone()),
            call_line: 2,
        }]
    );
}

#[test]
fn test_method_calls_free_function_without_semicolon() {
    let sources = vec![SourceFile::new(
        "foo.cpp",
        "class Foo { void bar() { baz(); } } void baz() {}",
    )];

    let batch = indexer(false).index_files(&sources);
    assert!(batch.errors.is_empty());

    let file = &batch.files[0];
    let units: Vec<(UnitKind, &str)> = flatten(file)
        .into_iter()
        .map(|u| (u.unit_type, u.name.as_str()))
        .collect();
    assert_eq!(
        units,
        vec![
            (UnitKind::File, "foo.cpp"),
            (UnitKind::Class, "Foo"),
            (UnitKind::Method, "bar"),
            (UnitKind::Function, "baz"),
        ]
    );

    assert_eq!(
        batch.edges,
        vec![CallGraphEdge {
            caller_id: UnitId::new("foo.cpp", 2),
            callee_name: "baz".to_string(),
            callee_id: Some(UnitId::new("foo.cpp", 3)),
            call_line: 1,
        }]
    );
}

#[test]
fn test_resolution_follows_input_order() {
    let first = SourceFile::new("first.c", "void foo(void) {}\n");
    let second = SourceFile::new("second.c", "void foo(void) {}\nvoid run(void) { foo(); }\n");

    let forward = indexer(false).index_files(&[first.clone(), second.clone()]);
    let target = forward.edges[0].callee_id.clone();
    assert_eq!(target, Some(UnitId::new("first.c", 1)));

    for _ in 0..5 {
        let again = indexer(false).index_files(&[first.clone(), second.clone()]);
        assert_eq!(again.edges, forward.edges);
    }

    let reversed = indexer(false).index_files(&[second, first]);
    assert_eq!(reversed.edges[0].callee_id, Some(UnitId::new("second.c", 1)));
}

#[test]
fn test_one_edge_per_call_site() {
    let sources = vec![
        SourceFile::new(
            "net.c",
            "#include <sys/socket.h>\nint open_conn(const char *host) {\n    int fd = socket(2, 1, 0);\n    connect_to(fd, resolve(host));\n    return fd;\n}\n",
        ),
        SourceFile::new(
            "client.cpp",
            "class Client {\npublic:\n    void run() { open_conn(host_); retry(); }\n    void retry() { run(); log(\"retry\"); }\n};\n",
        ),
    ];

    let batch = indexer(false).index_files(&sources);
    let call_sites: usize = flatten_all(&batch.files)
        .filter(|u| u.is_callable())
        .map(|u| u.call_sites.len())
        .sum();

    assert_eq!(call_sites, 7);
    assert_eq!(batch.edges.len(), call_sites);

    let resolved: Vec<&str> = batch
        .edges
        .iter()
        .filter(|e| e.is_resolved())
        .map(|e| e.callee_name.as_str())
        .collect();
    assert_eq!(resolved, vec!["open_conn", "retry", "run"]);
}

fn sample_project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "main.c", "#include \"app.h\"\nint main(void) {\n    return app_run();\n}\n");
    write(root, "app.h", "int app_run(void\n");
    write(root, "src/app.c", "#include \"app.h\"\nint app_run(void) {\n    return step();\n}\n");
    write(root, "src/core/step.cpp", "int step() { return 0; }\n");
    write(root, "src/core/step.hpp", "int step();\n");
    write(root, "docs/notes.txt", "not source\n");
    dir
}

#[test]
fn test_headers_excluded_from_files_and_errors() {
    let dir = sample_project();
    let options = ScanOptions {
        include_headers: false,
        ..ScanOptions::default()
    };

    let batch = indexer(true).index_directory(dir.path(), &options);

    assert!(batch.errors.is_empty(), "unexpected errors: {:?}", batch.errors);
    let names: Vec<&str> = batch.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["main.c", "app.c", "step.cpp"]);
    assert!(batch.edges.iter().all(|e| e.is_resolved()));
}

#[test]
fn test_headers_included_by_default() {
    let dir = sample_project();
    let batch = indexer(true).index_directory(dir.path(), &ScanOptions::default());

    // The truncated app.h prototype fails under strict syntax
    assert_eq!(batch.files.len(), 4);
    assert_eq!(batch.errors.len(), 1);
    assert!(batch.errors[0].file_path.ends_with("app.h"));
}

#[test]
fn test_max_depth_zero_reads_root_only() {
    let dir = sample_project();
    let options = ScanOptions {
        max_depth: Some(0),
        include_headers: false,
        ..ScanOptions::default()
    };

    let batch = indexer(false).index_directory(dir.path(), &options);
    let names: Vec<&str> = batch.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["main.c"]);
    assert_eq!(batch.edges.len(), 1);
    assert!(!batch.edges[0].is_resolved());
}

#[test]
fn test_config_excludes_apply_to_directories() {
    let dir = sample_project();
    write(dir.path(), "build/generated.c", "void generated(void) {}\n");
    write(dir.path(), ".ccgraph.toml", "[indexing]\nexclude = [\"src/core/**\"]\n");

    let config = Config::from_project_dir(dir.path()).unwrap();
    let indexer = Indexer::new(config).unwrap();
    let options = indexer.config().scan_options();
    let batch = indexer.index_directory(dir.path(), &options);

    let names: Vec<&str> = batch.files.iter().map(|f| f.name.as_str()).collect();
    assert!(names.contains(&"generated.c"));
    assert!(!names.contains(&"step.cpp"));
}

#[test]
fn test_unit_code_matches_source_slice() {
    let dir = sample_project();
    let batch = indexer(false).index_directory(dir.path(), &ScanOptions::default());

    for file in &batch.files {
        let source = fs::read_to_string(file.file_path()).unwrap();
        for unit in flatten(file) {
            assert!(unit.start_line <= unit.end_line);
            assert_eq!(unit.code, &source[unit.byte_range.clone()]);
            let first_line = source[..unit.byte_range.start].matches('\n').count() as u32 + 1;
            assert_eq!(unit.start_line, first_line, "{} starts on the wrong line", unit.name);
        }
    }
}

#[test]
fn test_batch_json_round_trip() {
    let sources = vec![
        SourceFile::new("shapes.cpp", "struct Point { int x; int y; };\nclass Shape {\n    double area() { return compute(); }\n};\n"),
        SourceFile::new("bad.c", "@@@@````@@@@````\n"),
    ];
    let batch = indexer(false).index_files(&sources);
    assert_eq!(batch.errors.len(), 1);

    let json = serde_json::to_string(&batch).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    let files: Vec<CodeUnit> = serde_json::from_value(value["files"].clone()).unwrap();
    let edges: Vec<CallGraphEdge> = serde_json::from_value(value["call_graph"].clone()).unwrap();

    assert_eq!(serde_json::to_value(&files).unwrap(), value["files"]);
    assert_eq!(edges, batch.edges);
    assert_eq!(value["errors"][0]["file_path"], "bad.c");
    assert!(value["errors"][0]["message"].as_str().unwrap().contains("syntax errors"));
    assert_eq!(value["files"][0]["children"][1]["unit_type"], "class");
}
