//! Archive round-trip tests

use bytecode_system::{Archive, ArchiveError, Code, Constant, FunctionProto, Opcode, Param, StructProto};
use core_types::Span;
use std::rc::Rc;

fn sample_function() -> Rc<FunctionProto> {
    let mut body = Code::new();
    let a = body.add_constant(Constant::String("a".into()));
    body.add_ins_operand(Opcode::LoadFast, a, Span::new(0, 20, 21, 2));
    body.add_ins(Opcode::Return, Span::new(0, 13, 21, 2));
    Rc::new(FunctionProto {
        name: "identity".into(),
        params: vec![Param::new("a", Span::new(0, 12, 13, 1))],
        code: Rc::new(body),
    })
}

fn sample_module() -> Code {
    let mut code = Code::new();
    let i = code.add_constant(Constant::Int(-42));
    let f = code.add_constant(Constant::Float(2.5));
    let s = code.add_constant(Constant::String("hello\nworld".into()));
    let func = code.add_constant(Constant::Function(sample_function()));
    let st = code.add_constant(Constant::Struct(Rc::new(StructProto {
        name: "Box".into(),
        fields: vec!["value".into()],
        methods: vec![("get".into(), sample_function())],
    })));
    code.add_ins_operand(Opcode::LoadConst, i, Span::new(0, 0, 3, 1));
    code.add_ins_operand(Opcode::LoadConst, f, Span::new(0, 4, 7, 1));
    code.add_ins_operand(Opcode::LoadConst, s, Span::new(0, 8, 20, 1));
    code.add_ins_operand(Opcode::CreateFunction, func, Span::new(0, 21, 30, 2));
    code.add_ins_operand(Opcode::CreateStruct, st, Span::new(0, 31, 40, 3));
    code.add_ins(Opcode::Return, Span::new(0, 41, 42, 4));
    code
}

#[test]
fn test_round_trip_is_structurally_equal() {
    let mut archive = Archive::new();
    archive.add_module(0, sample_module());
    let restored = Archive::from_bytes(&archive.to_bytes().unwrap()).unwrap();
    let code = restored.get(0).unwrap();
    let original = sample_module();
    assert_eq!(code.instructions, original.instructions);
    assert_eq!(code.spans, original.spans);
    assert_eq!(code.constants, original.constants);
}

#[test]
fn test_multiple_modules_keep_order() {
    let mut archive = Archive::new();
    archive.add_module(0, sample_module());
    archive.add_module(3, Code::new());
    archive.add_module(1, Code::new());
    let restored = Archive::from_bytes(&archive.to_bytes().unwrap()).unwrap();
    let ids: Vec<u32> = restored.modules().iter().map(|(id, _)| *id).collect();
    assert_eq!(ids, vec![0, 3, 1]);
    assert_eq!(restored.entry().map(|(id, _)| id), Some(0));
}

#[test]
fn test_require_unknown_module() {
    let archive = Archive::new();
    assert!(matches!(archive.require(5), Err(ArchiveError::UnknownModule { id: 5 })));
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.bar");
    let mut archive = Archive::new();
    archive.add_module(0, sample_module());
    archive.save(&path).unwrap();
    let loaded = Archive::load(&path).unwrap();
    assert_eq!(loaded, archive);
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = Archive::load(&dir.path().join("missing.bar"));
    assert!(matches!(result, Err(ArchiveError::Io(_))));
}
