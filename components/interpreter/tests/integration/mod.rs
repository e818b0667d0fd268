//! Integration tests: imports on disk, native modules, futures and GC pressure

use core_types::{BondError, ErrorKind};
use interpreter::{
    Context, ContextConfig, EventLoop, HostValue, NativeModuleBuilder, SharedOutput, Value, Vm,
};
use parser::Compiler;
use std::collections::HashMap;
use std::fs;
use std::rc::Rc;
use tempfile::TempDir;

struct Session {
    dir: TempDir,
    ctx: Context,
    out: SharedOutput,
}

impl Session {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ContextConfig::new().with_lib_path(dir.path().join("lib"));
        let mut ctx = Context::with_config(config);
        let out = SharedOutput::new();
        ctx.set_output(Box::new(out.clone()));
        ctx.set_compiler(Compiler::new());
        Session { dir, ctx, out }
    }

    fn write(&self, name: &str, source: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, source).unwrap();
    }

    /// Run `source` as if it were the file `main.bd` of the session directory.
    fn run(&mut self, source: &str) -> Result<Value, BondError> {
        self.write("main.bd", source);
        let module_id = self.ctx.register_source(self.dir.path().join("main.bd"));
        let code = Compiler::new()
            .compile(source, module_id)
            .unwrap_or_else(|d| panic!("compile failed: {:?}", d));
        let mut vm = Vm::new(&mut self.ctx);
        vm.run(Rc::new(code))
    }

    fn output(&self) -> String {
        self.out.contents()
    }
}

// ============================================================================
// Script imports
// ============================================================================

#[test]
fn test_import_script_relative_to_importer() {
    let mut session = Session::new();
    session.write("util.bd", "fn double(x) { return x * 2; }\nvar name = \"util\";\n");
    session
        .run("import \"util\";\nprintln(util.double(21), util.name);\n")
        .unwrap();
    assert_eq!(session.output(), "42 util\n");
}

#[test]
fn test_import_executes_module_once() {
    let mut session = Session::new();
    session.write("once.bd", "println(\"loading\");\nvar x = 1;\n");
    session
        .run("import \"once\";\nimport \"once\" as again;\nprintln(once == again);\n")
        .unwrap();
    assert_eq!(session.output(), "loading\ntrue\n");
}

#[test]
fn test_import_from_lib_path() {
    let mut session = Session::new();
    session.write("lib/shared.bd", "var answer = 42;\n");
    session.run("import \"shared\";\nprintln(shared.answer);\n").unwrap();
    assert_eq!(session.output(), "42\n");
}

#[test]
fn test_import_package_directory() {
    let mut session = Session::new();
    session.write("pkg/one.bd", "var x = 1;\n");
    session.write("pkg/two.bd", "var y = 2;\n");
    session.write("pkg/notes.txt", "ignored");
    session
        .run("import \"pkg\";\nprintln(pkg.one.x + pkg.two.y);\n")
        .unwrap();
    assert_eq!(session.output(), "3\n");
}

#[test]
fn test_module_exports_method() {
    let mut session = Session::new();
    session.write("m.bd", "var a = 1;\n");
    session
        .run("import \"m\";\nprintln(m.get_exports()[\"a\"]);\n")
        .unwrap();
    assert_eq!(session.output(), "1\n");
}

#[test]
fn test_circular_import_is_an_error() {
    let mut session = Session::new();
    session.write("a.bd", "import \"b\";\n");
    session.write("b.bd", "import \"a\";\n");
    let err = session.run("import \"a\";\n").unwrap_err();
    assert_eq!(err.kind, ErrorKind::ImportError);
    assert!(err.message.contains("circular import"), "{}", err.message);
}

#[test]
fn test_runtime_error_in_module_becomes_import_error() {
    let mut session = Session::new();
    session.write("broken.bd", "var x = 1 / 0;\n");
    let err = session.run("import \"broken\";\n").unwrap_err();
    assert_eq!(err.kind, ErrorKind::ImportError);
    assert!(err.message.starts_with("unable to import module"));
    assert!(err.message.contains("DivisionByZero"));
}

#[test]
fn test_compile_error_in_module() {
    let mut session = Session::new();
    session.write("bad.bd", "var = ;\n");
    let err = session.run("import \"bad\";\n").unwrap_err();
    assert_eq!(err.kind, ErrorKind::ImportError);
    assert!(err.message.contains("unable to compile module"));
}

#[test]
fn test_missing_module() {
    let mut session = Session::new();
    let err = session.run("import \"nowhere\";\n").unwrap_err();
    assert_eq!(err.kind, ErrorKind::ImportError);
    assert_eq!(err.message, "unable to find module nowhere");
}

// ============================================================================
// core: and native modules
// ============================================================================

#[test]
fn test_core_gc_module() {
    let mut session = Session::new();
    session
        .run(
            "import \"core:gc\";\n\
             gc.set_allocation_limit(500);\n\
             println(gc.get_allocation_limit());\n\
             gc.stop_gc();\n\
             gc.resume_gc();\n\
             println(gc.collect() >= 0, gc.get_immortal_count() > 0);\n",
        )
        .unwrap();
    assert_eq!(session.output(), "500\ntrue true\n");
}

fn demo_init(ctx: &mut Context, path: &str) {
    let module = NativeModuleBuilder::new("demo")
        .function("add", "add(a, b)", |vm, args| {
            interpreter::builtins::expect_args("add", args, 2)?;
            let sum = vm.ctx().expect_int(args[0])? + vm.ctx().expect_int(args[1])?;
            Ok(vm.ctx_mut().int(sum))
        })
        .build(ctx, path);
    ctx.add_module(path, module);
}

#[test]
fn test_registered_native_module() {
    let mut session = Session::new();
    session.ctx.register_native_module("core:demo", demo_init);
    session
        .run("import \"core:demo\";\nprintln(demo.add(2, 3));\n")
        .unwrap();
    assert_eq!(session.output(), "5\n");
}

// ============================================================================
// Futures
// ============================================================================

#[test]
fn test_host_completion_runs_script_callback() {
    let mut compiler = Compiler::new();
    compiler.declare_global("job");
    let code = compiler
        .compile("job.then(fn(v) { println(\"got\", v); });\n", 0)
        .unwrap();

    let out = SharedOutput::new();
    let mut ctx = Context::with_config(ContextConfig::new());
    ctx.set_output(Box::new(out.clone()));
    let mut vm = Vm::new(&mut ctx);
    let job = vm.spawn_host(|| HostValue::Int(7));
    let globals = vm.ctx_mut().string_map(HashMap::new());
    vm.pin(globals);
    vm.ctx_mut().map_insert(globals, "job", job).unwrap();
    vm.run_with_globals(Rc::new(code), globals).unwrap();
    assert_eq!(out.contents(), "");

    assert_eq!(EventLoop::run_until_idle(&mut vm).unwrap(), 1);
    assert_eq!(out.contents(), "got 7\n");
}

#[test]
fn test_script_future_completion() {
    let out = SharedOutput::new();
    let mut ctx = Context::with_config(ContextConfig::new());
    ctx.set_output(Box::new(out.clone()));
    let code = Compiler::new()
        .compile(
            "var f = Future();\n\
             f.then(fn(v) { println(\"first\", v); });\n\
             f.complete(1);\n\
             f.then(fn(v) { println(\"late\", v); });\n\
             println(f.has_result(), f.get_result());\n",
            0,
        )
        .unwrap();
    let mut vm = Vm::new(&mut ctx);
    vm.run(Rc::new(code)).unwrap();
    assert_eq!(out.contents(), "first 1\nlate 1\ntrue 1\n");
}

// ============================================================================
// Garbage collection
// ============================================================================

#[test]
fn test_collection_under_allocation_pressure() {
    let out = SharedOutput::new();
    let mut ctx = Context::with_config(ContextConfig::new().with_allocation_limit(64));
    ctx.set_output(Box::new(out.clone()));
    let code = Compiler::new()
        .compile(
            "var keep = [];\n\
             var i = 0;\n\
             while i < 2000 {\n\
               keep.append([i]);\n\
               var scratch = [i, \"tmp\", [i]];\n\
               i = i + 1;\n\
             }\n\
             println(keep.size(), keep[1999][0]);\n",
            0,
        )
        .unwrap();
    let mut vm = Vm::new(&mut ctx);
    vm.run(Rc::new(code)).unwrap();
    drop(vm);
    assert_eq!(out.contents(), "2000 1999\n");
    assert!(ctx.gc_stats().collections > 0);
}

#[test]
fn test_paused_heap_never_collects() {
    let mut ctx = Context::with_config(ContextConfig::new().with_allocation_limit(8));
    ctx.heap_mut().pause();
    let code = Compiler::new()
        .compile(
            "var i = 0;\n\
             while i < 500 { var junk = [i]; i = i + 1; }\n",
            0,
        )
        .unwrap();
    let mut vm = Vm::new(&mut ctx);
    vm.run(Rc::new(code)).unwrap();
    drop(vm);
    assert_eq!(ctx.gc_stats().collections, 0);
    assert!(ctx.collect().is_none());

    ctx.heap_mut().resume();
    assert!(ctx.collect().is_some());
    assert_eq!(ctx.gc_stats().collections, 1);
}

#[test]
fn test_closure_upvalues_survive_collection() {
    let out = SharedOutput::new();
    let mut ctx = Context::with_config(ContextConfig::new().with_allocation_limit(16));
    ctx.set_output(Box::new(out.clone()));
    let code = Compiler::new()
        .compile(
            "fn make() { var items = [\"kept\"]; return fn() { return items[0]; }; }\n\
             var get = make();\n\
             var i = 0;\n\
             while i < 300 { var junk = [i, i]; i = i + 1; }\n\
             println(get());\n",
            0,
        )
        .unwrap();
    let mut vm = Vm::new(&mut ctx);
    vm.run(Rc::new(code)).unwrap();
    assert_eq!(out.contents(), "kept\n");
}
