//! Contract tests for the archive format
//!
//! These pin the on-disk layout byte for byte.

use bytecode_system::{Archive, Code, Constant, FunctionProto, Opcode, Param, BOND_MAGIC};
use core_types::Span;
use std::rc::Rc;

fn le(v: u32) -> [u8; 4] {
    v.to_le_bytes()
}

#[test]
fn contract_magic_value() {
    assert_eq!(BOND_MAGIC, 0x424F4E44);
}

#[test]
fn contract_code_object_layout() {
    let mut code = Code::new();
    let idx = code.add_constant(Constant::Int(1));
    code.add_ins_operand(Opcode::LoadConst, idx, Span::new(0, 1, 2, 3));

    let mut archive = Archive::new();
    archive.add_module(0, code);
    let bytes = archive.to_bytes().unwrap();

    let mut expected = Vec::new();
    expected.extend_from_slice(&le(0x424F4E44));
    expected.extend_from_slice(&le(1));
    expected.extend_from_slice(&le(1));
    expected.extend_from_slice(&le(0));
    // const_count, instr_count, span_count
    expected.extend_from_slice(&le(1));
    expected.extend_from_slice(&le(2));
    expected.extend_from_slice(&le(2));
    expected.push(0);
    expected.extend_from_slice(&1i64.to_le_bytes());
    expected.extend_from_slice(&le(Opcode::LoadConst as u32));
    expected.extend_from_slice(&le(0));
    for _ in 0..2 {
        expected.extend_from_slice(&le(0));
        expected.extend_from_slice(&le(1));
        expected.extend_from_slice(&le(2));
        expected.extend_from_slice(&le(3));
    }
    assert_eq!(bytes, expected);
}

#[test]
fn contract_function_payload_layout() {
    let mut code = Code::new();
    code.add_constant(Constant::Function(Rc::new(FunctionProto {
        name: "f".into(),
        params: vec![Param::new("x", Span::new(0, 5, 6, 1))],
        code: Rc::new(Code::new()),
    })));
    let mut archive = Archive::new();
    archive.add_module(0, code);
    let bytes = archive.to_bytes().unwrap();

    // Skip header (12), module id (4) and outer counts (12).
    let payload = &bytes[28..];
    let mut expected = vec![3u8];
    expected.extend_from_slice(b"f\0");
    expected.extend_from_slice(&le(1));
    // nested empty CodeObject
    expected.extend_from_slice(&le(0));
    expected.extend_from_slice(&le(0));
    expected.extend_from_slice(&le(0));
    expected.extend_from_slice(b"x\0");
    for v in [0, 5, 6, 1] {
        expected.extend_from_slice(&le(v));
    }
    assert_eq!(payload, &expected[..]);
}
