//! Contract tests for the interpreter API
//!
//! These tests pin down the observable behaviour hosts rely on: VM states,
//! error reporting, the native extension API and context configuration.

use bytecode_system::{Code, Constant, Opcode};
use core_types::{ErrorKind, Span};
use interpreter::{
    Context, ContextConfig, NativeData, NativeStructBuilder, Object, Vm, VmState, MAX_FRAMES,
};
use parser::Compiler;
use std::any::Any;
use std::rc::Rc;

fn compile(source: &str) -> Rc<Code> {
    Rc::new(
        Compiler::new()
            .compile(source, 0)
            .unwrap_or_else(|d| panic!("compile failed: {:?}", d)),
    )
}

/// Test a fresh VM starts idle with no error
#[test]
fn test_vm_new_contract() {
    let mut ctx = Context::new();
    let vm = Vm::new(&mut ctx);
    assert_eq!(vm.state(), VmState::Idle);
    assert!(vm.last_error().is_none());
    assert_eq!(vm.frame_depth(), 0);
}

/// Test run() executes hand-assembled bytecode and returns its value
#[test]
fn test_vm_run_contract() {
    let mut code = Code::new();
    let a = code.add_constant(Constant::Int(1));
    let b = code.add_constant(Constant::Int(2));
    code.add_ins_operand(Opcode::LoadConst, a, Span::default());
    code.add_ins_operand(Opcode::LoadConst, b, Span::default());
    code.add_ins(Opcode::BinAdd, Span::default());
    code.add_ins(Opcode::Return, Span::default());

    let mut ctx = Context::new();
    let mut vm = Vm::new(&mut ctx);
    let result = vm.run(Rc::new(code)).unwrap();
    assert_eq!(vm.ctx().expect_int(result).unwrap(), 3);
    assert_eq!(vm.state(), VmState::Returned);
}

/// Test runtime errors carry kind, span and stack trace
#[test]
fn test_runtime_error_contract() {
    let code = compile("fn inner() { return 1 / 0; }\nfn outer() { return inner(); }\nouter();\n");
    let mut ctx = Context::new();
    let mut vm = Vm::new(&mut ctx);
    let err = vm.run(code).unwrap_err();

    assert_eq!(err.kind, ErrorKind::DivisionByZero);
    assert_eq!(err.span.map(|s| s.line), Some(1));
    let names: Vec<_> = err.stack.iter().map(|f| f.function.as_str()).collect();
    assert_eq!(names, vec!["inner", "outer", "<module>"]);
    assert_eq!(vm.state(), VmState::Halted);
    assert_eq!(vm.last_error().map(|e| e.kind), Some(ErrorKind::DivisionByZero));
    assert_eq!(vm.frame_depth(), 0);

    let diagnostics = vm.ctx_mut().take_diagnostics();
    assert_eq!(diagnostics.len(), 3);
    assert_eq!(diagnostics[1].message, "called from outer");
}

/// Test reset_error() makes a halted VM usable again
#[test]
fn test_reset_error_contract() {
    let mut ctx = Context::new();
    let mut vm = Vm::new(&mut ctx);
    assert!(vm.run(compile("var x = nil + 1;")).is_err());
    let err = vm.run(compile("var y = 1;")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::GenericError);

    vm.reset_error();
    assert!(vm.run(compile("var y = 1;")).is_ok());
    assert_eq!(vm.state(), VmState::Returned);
}

/// Test call depth is capped
#[test]
fn test_stack_overflow_contract() {
    let mut ctx = Context::new();
    let mut vm = Vm::new(&mut ctx);
    let err = vm.run(compile("fn f() { return f(); }\nf();\n")).unwrap_err();
    assert_eq!(err.kind, ErrorKind::StackOverflow);
    assert_eq!(err.stack.len(), MAX_FRAMES);
}

/// Test call_value() re-enters script code from the host
#[test]
fn test_call_value_contract() {
    let mut ctx = Context::new();
    let mut vm = Vm::new(&mut ctx);
    let globals = vm.ctx_mut().string_map(Default::default());
    vm.pin(globals);
    vm.run_with_globals(compile("fn square(x) { return x * x; }"), globals)
        .unwrap();

    let square = vm.ctx().map_lookup(globals, "square").unwrap().unwrap();
    let seven = vm.ctx_mut().int(7);
    let result = vm.call_value(square, &[seven]).unwrap();
    assert_eq!(vm.ctx().expect_int(result).unwrap(), 49);
    assert_eq!(vm.callable_name(square).unwrap(), "square");

    let err = vm.call_value(square, &[]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::ArgumentError);
}

struct Point {
    x: i64,
}

impl NativeData for Point {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Test native structs expose constructor, methods, getters and setters
#[test]
fn test_native_struct_contract() {
    let mut ctx = Context::new();
    let ty = NativeStructBuilder::new("Point")
        .doc("A host point")
        .constructor(|vm, ty, args| {
            let x = vm.ctx().expect_int(args[0])?;
            Ok(vm.ctx_mut().native_instance(ty, Point { x }))
        })
        .method("double", "double()", |vm, args| {
            let point = vm.ctx_mut().native_data_mut::<Point>(args[0])?;
            point.x *= 2;
            Ok(vm.ctx().nil())
        })
        .getter("x", |vm, this| {
            let x = vm.ctx().native_data::<Point>(this)?.x;
            Ok(vm.ctx_mut().int(x))
        })
        .setter("x", |vm, this, value| {
            let x = vm.ctx().expect_int(value)?;
            vm.ctx_mut().native_data_mut::<Point>(this)?.x = x;
            Ok(())
        })
        .build(&mut ctx);
    assert!(matches!(ctx.get(ty).unwrap(), Object::NativeStruct(s) if s.doc == "A host point"));

    let mut vm = Vm::new(&mut ctx);
    vm.pin(ty);
    let three = vm.ctx_mut().int(3);
    let point = vm.call_value(ty, &[three]).unwrap();
    vm.pin(point);
    vm.call_method(point, "double", &[]).unwrap();
    let x = vm.get_attribute(point, "x").unwrap();
    assert_eq!(vm.ctx().expect_int(x).unwrap(), 6);

    let ten = vm.ctx_mut().int(10);
    vm.set_attribute(point, "x", ten).unwrap();
    let x = vm.get_attribute(point, "x").unwrap();
    assert_eq!(vm.ctx().expect_int(x).unwrap(), 10);

    let err = vm.get_attribute(point, "y").unwrap_err();
    assert_eq!(err.kind, ErrorKind::AttributeNotFound);
}

/// Test ContextConfig builders
#[test]
fn test_context_config_contract() {
    let config = ContextConfig::new()
        .with_lib_path("/tmp/bond-libs")
        .with_allocation_limit(0)
        .with_trace_execution(true);
    assert_eq!(config.lib_path, std::path::PathBuf::from("/tmp/bond-libs"));
    assert_eq!(config.allocation_limit, 1);
    assert!(config.trace_execution);

    let ctx = Context::with_config(config);
    assert_eq!(ctx.lib_path(), std::path::Path::new("/tmp/bond-libs"));
}

/// Test immortal singletons survive collection
#[test]
fn test_singletons_contract() {
    let mut ctx = Context::new();
    let nil = ctx.nil();
    let small = ctx.int(5);
    assert_eq!(ctx.int(5), small);
    let interned = ctx.intern("name");
    assert_eq!(ctx.intern("name"), interned);
    ctx.collect();
    assert!(matches!(ctx.get(nil).unwrap(), Object::Nil));
    assert_eq!(ctx.expect_int(small).unwrap(), 5);
    assert_eq!(ctx.expect_str(interned).unwrap(), "name");
}
