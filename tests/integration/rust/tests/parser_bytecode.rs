//! Parser to bytecode integration tests
//!
//! Checks the instruction patterns the code generator emits for each
//! construct, and that compile errors surface as diagnostics.

use bytecode_system::{disassemble, Constant, Opcode};
use integration_tests::{compile, compile_expr, contains_sequence, opcodes};
use parser::Compiler;

#[test]
fn test_addition_is_two_loads_and_bin_add() {
    let ops = opcodes(&compile("1 + 2;"));
    assert!(contains_sequence(
        &ops,
        &[Opcode::LoadConst, Opcode::LoadConst, Opcode::BinAdd, Opcode::PopTop]
    ));
    assert_eq!(ops.last(), Some(&Opcode::Return));
}

#[test]
fn test_repl_mode_keeps_trailing_value() {
    let ops = opcodes(&compile_expr("1 + 2;"));
    assert!(contains_sequence(&ops, &[Opcode::BinAdd, Opcode::Return]));
    assert!(!ops.contains(&Opcode::PopTop));
}

#[test]
fn test_if_uses_conditional_jump() {
    let ops = opcodes(&compile("var x = 1; if x { println(x); } else { println(0); }"));
    assert!(ops.contains(&Opcode::JumpIfFalse));
    assert!(ops.contains(&Opcode::Jump));
}

#[test]
fn test_for_loop_pattern() {
    let ops = opcodes(&compile("fn f(xs) { for x in xs { println(x); } }"));
    // The loop lives in the function's code, not the module's.
    assert!(!ops.contains(&Opcode::Iter));

    let code = compile("fn f(xs) { for x in xs { println(x); } }");
    let body = code
        .constants
        .iter()
        .find_map(|c| match c {
            Constant::Function(f) => Some(f.code.clone()),
            _ => None,
        })
        .unwrap();
    let ops = opcodes(&body);
    assert!(contains_sequence(
        &ops,
        &[Opcode::PushNil, Opcode::CreateLocal, Opcode::LoadFast, Opcode::Iter, Opcode::IterEnd, Opcode::IterNext]
    ));
}

#[test]
fn test_top_level_names_are_globals() {
    let ops = opcodes(&compile("var x = 1; x = x + 1;"));
    assert!(ops.contains(&Opcode::CreateGlobal));
    assert!(ops.contains(&Opcode::StoreGlobal));
    assert!(ops.contains(&Opcode::LoadGlobal));
    assert!(!ops.contains(&Opcode::LoadFast));
}

#[test]
fn test_fallible_function_epilogue_wraps_ok() {
    let code = compile("fn f() ! { }");
    let body = code
        .constants
        .iter()
        .find_map(|c| match c {
            Constant::Function(f) => Some(f.code.clone()),
            _ => None,
        })
        .unwrap();
    let ops = opcodes(&body);
    assert!(contains_sequence(&ops, &[Opcode::PushNil, Opcode::MakeOk, Opcode::Return]));
}

#[test]
fn test_import_emits_import() {
    let ops = opcodes(&compile("import \"core:gc\";"));
    assert!(contains_sequence(&ops, &[Opcode::LoadConst, Opcode::Import]));
}

#[test]
fn test_every_compiled_module_validates() {
    let sources = [
        "var xs = [1, 2, 3]; for x in xs { if x == 2 { continue; } println(x); }",
        "struct P { var x; var y; fn sum(self) { return self.x + self.y; } }",
        "fn outer() { var n = 1; fn inner() { return n; } return inner(); }",
        "var d = {\"a\": 1}; d[\"b\"] = 2;",
        "while true { break; }",
    ];
    for source in sources {
        let code = compile(source);
        assert!(code.validate().is_ok(), "{}", source);
    }
}

#[test]
fn test_disassembly_names_nested_functions() {
    let text = disassemble(&compile("fn greet(name) { return \"hi \" + name; }"));
    assert!(text.contains("CREATE_FUNCTION"));
    assert!(text.contains("disassembly of function greet"));
    assert!(text.contains("BIN_ADD"));
}

#[test]
fn test_multiple_errors_are_reported() {
    let diagnostics = Compiler::new()
        .compile("var = 1;\nvar ok = 2;\nvar = 3;\n", 0)
        .unwrap_err();
    assert!(diagnostics.len() >= 2);
    assert_eq!(diagnostics[0].span.line, 1);
}

#[test]
fn test_return_outside_function_is_rejected() {
    assert!(Compiler::new().compile("return 1;", 0).is_err());
}
