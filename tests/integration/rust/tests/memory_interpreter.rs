//! Memory manager and interpreter integration tests
//!
//! Collections triggered while scripts run must never free reachable
//! values, and must reclaim unreachable cycles.

use interpreter::{Context, ContextConfig, SharedOutput, Vm};
use parser::Compiler;
use std::rc::Rc;

fn context(limit: usize) -> (Context, SharedOutput) {
    let mut ctx = Context::with_config(ContextConfig::new().with_allocation_limit(limit));
    let out = SharedOutput::new();
    ctx.set_output(Box::new(out.clone()));
    (ctx, out)
}

fn run(ctx: &mut Context, source: &str) {
    let code = Compiler::new().compile(source, 0).unwrap();
    let mut vm = Vm::new(ctx);
    if let Err(e) = vm.run(Rc::new(code)) {
        panic!("run failed: {}", e.report());
    }
}

#[test]
fn test_allocation_heavy_loop_collects() {
    let (mut ctx, out) = context(128);
    run(
        &mut ctx,
        "var total = 0;\n\
         var i = 0;\n\
         while i < 2000 { var tmp = [i, i + 1, \"x\"]; total = total + tmp[1]; i = i + 1; }\n\
         println(total);",
    );
    assert_eq!(out.contents(), "2001000\n");
    assert!(ctx.gc_stats().collections > 0);
}

#[test]
fn test_cycles_are_reclaimed_after_run() {
    let (mut ctx, _) = context(1_000_000);
    run(
        &mut ctx,
        "struct Node { var next; }\n\
         fn make() { var a = Node(nil); var b = Node(a); a.next = b; return nil; }\n\
         var i = 0;\n\
         while i < 50 { make(); i = i + 1; }",
    );
    let before = ctx.gc_stats().live;
    let stats = ctx.collect().unwrap();
    assert!(stats.freed >= 100, "freed {} of {}", stats.freed, before);
}

#[test]
fn test_reachable_cycle_survives_pressure() {
    let (mut ctx, out) = context(64);
    run(
        &mut ctx,
        "struct Node { var value; var next; }\n\
         var a = Node(1, nil);\n\
         var b = Node(2, a);\n\
         a.next = b;\n\
         var i = 0;\n\
         while i < 500 { var junk = [i]; i = i + 1; }\n\
         println(a.next.next.value, b.next.next.value);",
    );
    assert_eq!(out.contents(), "1 2\n");
    assert!(ctx.gc_stats().collections > 0);
}

#[test]
fn test_closure_state_survives_collections() {
    let (mut ctx, out) = context(32);
    run(
        &mut ctx,
        "fn counter() { var items = [\"a\", \"b\"]; return fn(i) { return items[i]; }; }\n\
         var get = counter();\n\
         var seen = [];\n\
         var i = 0;\n\
         while i < 300 { seen.append(get(i % 2)); i = i + 1; }\n\
         println(seen[0], seen[299]);",
    );
    assert_eq!(out.contents(), "a b\n");
}

#[test]
fn test_gc_module_controls_threshold() {
    let (mut ctx, out) = context(4096);
    run(
        &mut ctx,
        "import \"core:gc\";\n\
         gc.set_allocation_limit(1000);\n\
         println(gc.get_allocation_limit());\n\
         println(gc.collect() >= 0);",
    );
    assert_eq!(out.contents(), "1000\ntrue\n");
}

#[test]
fn test_immortal_singletons_are_never_freed() {
    let (mut ctx, _) = context(16);
    let nil = ctx.nil();
    let truth = ctx.boolean(true);
    ctx.collect();
    ctx.collect();
    assert!(ctx.heap().contains(nil));
    assert!(ctx.heap().contains(truth));
    assert!(ctx.gc_stats().immortals > 0);
}
