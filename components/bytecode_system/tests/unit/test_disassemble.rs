//! Tests for the disassembler

use bytecode_system::{disassemble, Code, Constant, FunctionProto, Opcode, StructProto};
use core_types::Span;
use std::rc::Rc;

fn at(line: u32) -> Span {
    Span::new(0, 0, 0, line)
}

fn method(body_op: Opcode) -> Rc<FunctionProto> {
    let mut code = Code::new();
    code.add_ins(body_op, at(4));
    code.add_ins(Opcode::Return, at(4));
    Rc::new(FunctionProto {
        name: "m".into(),
        params: vec![],
        code: Rc::new(code),
    })
}

#[test]
fn test_struct_methods_are_listed() {
    let mut code = Code::new();
    let st = code.add_constant(Constant::Struct(Rc::new(StructProto {
        name: "Vec2".into(),
        fields: vec!["x".into()],
        methods: vec![("len".into(), method(Opcode::PushTrue))],
    })));
    code.add_ins_operand(Opcode::CreateStruct, st, at(1));

    let text = disassemble(&code);
    assert!(text.contains("CREATE_STRUCT    0   "));
    assert!(text.contains("\ndisassembly of struct Vec2\n"));
    assert!(text.contains("\ndisassembly of Vec2.len\n"));
    assert!(text.contains("PUSH_TRUE"));
}

#[test]
fn test_line_shown_only_on_change() {
    let mut code = Code::new();
    code.add_ins(Opcode::PushNil, at(5));
    code.add_ins(Opcode::PopTop, at(5));
    code.add_ins(Opcode::PushNil, at(6));
    let text = disassemble(&code);
    let lines: Vec<&str> = text.lines().collect();
    assert!(lines[0].starts_with("     5  0000"));
    assert!(lines[1].starts_with("        0001"));
    assert!(lines[2].starts_with("     6  0002"));
}

#[test]
fn test_constant_operand_shows_value() {
    let mut code = Code::new();
    let idx = code.add_constant(Constant::String("name".into()));
    code.add_ins_operand(Opcode::LoadGlobal, idx, at(1));
    assert!(disassemble(&code).contains("LOAD_GLOBAL      0000, \"name\""));
}
