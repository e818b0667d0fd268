//! Tests for Code construction and constant pools

use bytecode_system::{Code, Constant, FunctionProto, Opcode, OperandKind, StructProto};
use core_types::Span;
use std::rc::Rc;

#[test]
fn test_span_per_instruction_word() {
    let mut code = Code::new();
    let span = Span::new(0, 3, 8, 2);
    code.add_ins_operand(Opcode::LoadGlobal, 0, span);
    code.add_ins(Opcode::PopTop, span);
    assert_eq!(code.instructions.len(), code.spans.len());
    assert_eq!(code.span_at(1), span);
}

#[test]
fn test_string_dedup_and_identifier_lookup() {
    let mut code = Code::new();
    let a = code.add_constant(Constant::String("x".into()));
    let b = code.add_constant(Constant::String("y".into()));
    let c = code.add_constant(Constant::String("x".into()));
    assert_eq!(a, c);
    assert_ne!(a, b);
    assert_eq!(code.identifier(b), Some("y"));
    assert_eq!(code.identifier(99), None);
}

#[test]
fn test_identifier_rejects_non_strings() {
    let mut code = Code::new();
    let i = code.add_constant(Constant::Int(4));
    assert_eq!(code.identifier(i), None);
}

#[test]
fn test_structs_are_never_deduplicated() {
    let proto = Rc::new(StructProto {
        name: "Point".into(),
        fields: vec!["x".into(), "y".into()],
        methods: vec![],
    });
    let mut code = Code::new();
    let a = code.add_constant(Constant::Struct(proto.clone()));
    let b = code.add_constant(Constant::Struct(proto));
    assert_ne!(a, b);
}

#[test]
fn test_function_arity() {
    let proto = FunctionProto {
        name: "add".into(),
        params: vec![
            bytecode_system::Param::new("a", Span::default()),
            bytecode_system::Param::new("b", Span::default()),
        ],
        code: Rc::new(Code::new()),
    };
    assert_eq!(proto.arity(), 2);
}

#[test]
fn test_operand_kinds() {
    assert_eq!(Opcode::LoadConst.operand_kind(), OperandKind::Constant);
    assert_eq!(Opcode::Call.operand_kind(), OperandKind::Operand);
    assert_eq!(Opcode::Return.operand_kind(), OperandKind::Simple);
    assert!(Opcode::Try.is_jump());
    assert!(!Opcode::Call.is_jump());
    assert_eq!(Opcode::ImportPreCompiled.name(), "IMPORT_PRE_COMPILED");
}

#[test]
fn test_validate_rejects_unknown_opcode() {
    let code = Code::from_parts(vec![4000], vec![], vec![Span::default()]);
    assert!(code.validate().is_err());
}

#[test]
fn test_validate_rejects_truncated_operand() {
    let code = Code::from_parts(
        vec![Opcode::LoadConst as u32],
        vec![],
        vec![Span::default()],
    );
    assert!(code.validate().is_err());
}
