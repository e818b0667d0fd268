//! End-to-end tests of the `bond` command library
//!
//! Multi-file programs on disk, run from source and from a built archive.

use bond_cli::{ArchiveBuilder, CliError, Runtime};
use core_types::ErrorKind;
use interpreter::{ContextConfig, SharedOutput};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn runtime(lib: &Path) -> (Runtime, SharedOutput) {
    let out = SharedOutput::new();
    let runtime = Runtime::new(ContextConfig::new().with_lib_path(lib))
        .with_output(Box::new(out.clone()));
    (runtime, out)
}

fn write(dir: &Path, name: &str, source: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, source).unwrap();
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "lib/shapes.bd",
        "struct Rect { var w; var h; fn area(self) { return self.w * self.h; } }\n",
    );
    write(
        dir.path(),
        "app/geometry.bd",
        "import \"shapes\";\n\
         fn total(rects) { var sum = 0; for r in rects { sum = sum + r.area(); } return sum; }\n\
         fn square(n) { return shapes.Rect(n, n); }\n",
    );
    write(
        dir.path(),
        "app/main.bd",
        "import \"geometry\";\n\
         var rects = [geometry.square(2), geometry.square(3)];\n\
         println(geometry.total(rects));\n",
    );
    dir
}

#[test]
fn test_source_program_with_lib_path() {
    let dir = project();
    let (mut runtime, out) = runtime(&dir.path().join("lib"));
    runtime.run_file(&dir.path().join("app/main.bd")).unwrap();
    assert_eq!(out.contents(), "13\n");
}

#[test]
fn test_archive_program_matches_source_program() {
    let dir = project();
    let lib = dir.path().join("lib");
    let archive = dir.path().join("app.bar");
    ArchiveBuilder::new(&lib)
        .build_to(&dir.path().join("app/main.bd"), &archive)
        .unwrap();
    fs::remove_dir_all(dir.path().join("app")).unwrap();
    fs::remove_dir_all(&lib).unwrap();

    let (mut runtime, out) = runtime(&lib);
    runtime.run_file(&archive).unwrap();
    assert_eq!(out.contents(), "13\n");
}

#[test]
fn test_missing_import_is_import_error() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.bd", "import \"nowhere\";\n");
    let (mut runtime, _) = runtime(&dir.path().join("lib"));
    match runtime.run_file(&dir.path().join("main.bd")).unwrap_err() {
        CliError::Runtime(e) => {
            assert_eq!(e.kind, ErrorKind::ImportError);
            assert!(e.message.contains("nowhere"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_future_callbacks_run_during_file_run() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "main.bd",
        "var f = Future();\n\
         f.then(fn(v) { println(\"got\", v); });\n\
         f.complete(5);\n",
    );
    let (mut runtime, out) = runtime(&dir.path().join("lib"));
    runtime.run_file(&dir.path().join("main.bd")).unwrap();
    assert_eq!(out.contents(), "got 5\n");
}
