//! Bytecode to interpreter integration tests
//!
//! Hand-assembled and archived code objects executed by the VM.

use bytecode_system::{Archive, Code, Constant, FunctionProto, Opcode, Param};
use core_types::{ErrorKind, Span};
use integration_tests::{compile, run_code};
use interpreter::{Context, SharedOutput, Vm};
use std::rc::Rc;

fn at(line: u32) -> Span {
    Span::new(0, 0, 0, line)
}

#[test]
fn test_hand_assembled_arithmetic() {
    let mut code = Code::new();
    let a = code.add_constant(Constant::Int(6));
    let b = code.add_constant(Constant::Int(7));
    code.add_ins_operand(Opcode::LoadConst, a, at(1));
    code.add_ins_operand(Opcode::LoadConst, b, at(1));
    code.add_ins(Opcode::BinMul, at(1));
    code.add_ins(Opcode::Return, at(1));

    let (result, _) = run_code(code);
    assert_eq!(result.unwrap(), "42");
}

#[test]
fn test_hand_assembled_jump_skips_code() {
    let mut code = Code::new();
    let one = code.add_constant(Constant::Int(1));
    let two = code.add_constant(Constant::Int(2));
    code.add_ins(Opcode::PushFalse, at(1));
    code.add_ins_operand(Opcode::JumpIfFalse, 0, at(1));
    let patch = code.current_index() - 1;
    code.add_ins_operand(Opcode::LoadConst, one, at(2));
    code.add_ins(Opcode::Return, at(2));
    code.patch(patch, code.current_index());
    code.add_ins_operand(Opcode::LoadConst, two, at(3));
    code.add_ins(Opcode::Return, at(3));

    let (result, _) = run_code(code);
    assert_eq!(result.unwrap(), "2");
}

#[test]
fn test_hand_assembled_function_call() {
    let mut body = Code::new();
    let x = body.add_constant(Constant::String("x".into()));
    body.add_ins_operand(Opcode::LoadFast, x, at(2));
    body.add_ins_operand(Opcode::LoadFast, x, at(2));
    body.add_ins(Opcode::BinAdd, at(2));
    body.add_ins(Opcode::Return, at(2));
    let proto = Rc::new(FunctionProto {
        name: "double".into(),
        params: vec![Param::new("x", at(1))],
        code: Rc::new(body),
    });

    let mut code = Code::new();
    let f = code.add_constant(Constant::Function(proto));
    let arg = code.add_constant(Constant::Int(21));
    code.add_ins_operand(Opcode::CreateFunction, f, at(1));
    code.add_ins_operand(Opcode::LoadConst, arg, at(3));
    code.add_ins_operand(Opcode::Call, 1, at(3));
    code.add_ins(Opcode::Return, at(3));

    let (result, _) = run_code(code);
    assert_eq!(result.unwrap(), "42");
}

#[test]
fn test_division_by_zero_reports_line() {
    let mut code = Code::new();
    let a = code.add_constant(Constant::Int(1));
    let z = code.add_constant(Constant::Int(0));
    code.add_ins_operand(Opcode::LoadConst, a, at(4));
    code.add_ins_operand(Opcode::LoadConst, z, at(4));
    code.add_ins(Opcode::BinDiv, at(4));
    code.add_ins(Opcode::Return, at(4));

    let (result, _) = run_code(code);
    let err = result.unwrap_err();
    assert_eq!(err.kind, ErrorKind::DivisionByZero);
    assert_eq!(err.span.map(|s| s.line), Some(4));
}

#[test]
fn test_archive_round_trip_runs_identically() {
    let source = "fn fact(n) { if n <= 1 { return 1; } return n * fact(n - 1); }\n\
                  println(fact(10), 2.5, \"done\");\n";
    let code = compile(source);
    let mut archive = Archive::new();
    archive.add_module(0, code.clone());
    let restored = Archive::from_bytes(&archive.to_bytes().unwrap()).unwrap();
    let reloaded = restored.require(0).unwrap().clone();

    assert_eq!(reloaded.instructions, code.instructions);
    assert_eq!(reloaded.spans, code.spans);
    assert_eq!(reloaded.constants, code.constants);

    let (_, direct) = run_code(code);
    let (_, archived) = run_code(reloaded);
    assert_eq!(direct, "3628800 2.5 done\n");
    assert_eq!(archived, direct);
}

#[test]
fn test_precompiled_module_runs_once() {
    let lib = compile("println(\"lib loaded\");\nvar answer = 42;\n");
    let mut archive = Archive::new();
    archive.add_module(7, lib);

    let mut code = Code::new();
    let alias = code.add_constant(Constant::String("lib".into()));
    let answer = code.add_constant(Constant::String("answer".into()));
    for line in 1..=2 {
        code.add_ins_operand(Opcode::LoadConst, alias, at(line));
        code.add_ins_operand(Opcode::ImportPreCompiled, 7, at(line));
    }
    code.add_ins_operand(Opcode::LoadGlobal, alias, at(3));
    code.add_ins_operand(Opcode::GetAttribute, answer, at(3));
    code.add_ins(Opcode::Return, at(3));

    let mut ctx = Context::new();
    let out = SharedOutput::new();
    ctx.set_output(Box::new(out.clone()));
    ctx.load_archive(&archive);
    let mut vm = Vm::new(&mut ctx);
    let value = vm.run(Rc::new(code)).unwrap();
    assert_eq!(vm.ctx().repr(value), "42");
    assert_eq!(out.contents(), "lib loaded\n");
}
