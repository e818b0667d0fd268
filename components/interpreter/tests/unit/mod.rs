//! Unit tests for language semantics, driven from source

use core_types::{BondError, ErrorKind};
use interpreter::{Context, ContextConfig, SharedOutput, Vm, VmState};
use parser::Compiler;
use std::rc::Rc;

/// Evaluate `source` in REPL mode and render the trailing expression.
fn eval(source: &str) -> Result<String, BondError> {
    let code = Compiler::repl()
        .compile(source, 0)
        .unwrap_or_else(|d| panic!("compile failed: {:?}", d));
    let mut ctx = Context::with_config(ContextConfig::new());
    let mut vm = Vm::new(&mut ctx);
    let value = vm.run(Rc::new(code))?;
    Ok(vm.ctx().repr(value))
}

/// Run `source` as a module and return everything it printed.
fn output(source: &str) -> String {
    let code = Compiler::new()
        .compile(source, 0)
        .unwrap_or_else(|d| panic!("compile failed: {:?}", d));
    let out = SharedOutput::new();
    let mut ctx = Context::with_config(ContextConfig::new());
    ctx.set_output(Box::new(out.clone()));
    let mut vm = Vm::new(&mut ctx);
    vm.run(Rc::new(code)).unwrap();
    out.contents()
}

fn error_kind(source: &str) -> ErrorKind {
    eval(source).unwrap_err().kind
}

// ============================================================================
// Arithmetic and comparison
// ============================================================================

#[test]
fn test_int_addition() {
    assert_eq!(eval("1 + 2;").unwrap(), "3");
}

#[test]
fn test_operator_precedence() {
    assert_eq!(eval("1 + 2 * 3 - 4 / 2;").unwrap(), "5");
    assert_eq!(eval("(1 + 2) * 3;").unwrap(), "9");
}

#[test]
fn test_mixed_numbers_promote_to_float() {
    assert_eq!(eval("1 + 0.5;").unwrap(), "1.5");
    assert_eq!(eval("3 / 2.0;").unwrap(), "1.5");
}

#[test]
fn test_int_overflow_wraps() {
    assert_eq!(eval("9223372036854775807 + 1;").unwrap(), "-9223372036854775808");
}

#[test]
fn test_division_by_zero() {
    assert_eq!(error_kind("1 / 0;"), ErrorKind::DivisionByZero);
    assert_eq!(error_kind("1 % 0;"), ErrorKind::DivisionByZero);
    assert_eq!(error_kind("1.0 / 0.0;"), ErrorKind::DivisionByZero);
}

#[test]
fn test_unary_minus_and_not() {
    assert_eq!(eval("-5 + 2;").unwrap(), "-3");
    assert_eq!(eval("!nil;").unwrap(), "true");
    assert_eq!(eval("!0;").unwrap(), "false");
}

#[test]
fn test_bitwise_operators() {
    assert_eq!(eval("6 & 3;").unwrap(), "2");
    assert_eq!(eval("6 | 3;").unwrap(), "7");
    assert_eq!(eval("6 ^ 3;").unwrap(), "5");
    assert_eq!(error_kind("1.0 | 2;"), ErrorKind::TypeError);
}

#[test]
fn test_comparisons() {
    assert_eq!(eval("1 < 2;").unwrap(), "true");
    assert_eq!(eval("2 <= 1.5;").unwrap(), "false");
    assert_eq!(eval("\"abc\" < \"abd\";").unwrap(), "true");
    assert_eq!(eval("1 == 1.0;").unwrap(), "false");
    assert_eq!(eval("[1, 2] == [1, 2];").unwrap(), "true");
    assert_eq!(eval("\"a\" != \"b\";").unwrap(), "true");
}

#[test]
fn test_logical_operators_yield_bools() {
    assert_eq!(eval("1 and \"x\";").unwrap(), "true");
    assert_eq!(eval("nil or false;").unwrap(), "false");
}

#[test]
fn test_concatenation() {
    assert_eq!(eval("\"foo\" + \"bar\";").unwrap(), "\"foobar\"");
    assert_eq!(eval("[1] + [2, 3];").unwrap(), "[1, 2, 3]");
}

#[test]
fn test_unsupported_operands_are_type_errors() {
    let err = eval("\"a\" + 1;").unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
    assert_eq!(err.message, "unable to add String and Int");
}

// ============================================================================
// Control flow
// ============================================================================

#[test]
fn test_if_else_skips_untaken_branch() {
    let printed = output(
        "fn a() { println(\"a\"); }\n\
         fn b() { println(\"b\"); }\n\
         if false { a(); } else { b(); }\n",
    );
    assert_eq!(printed, "b\n");
}

#[test]
fn test_while_break_after_k_iterations() {
    let printed = output(
        "var i = 0;\n\
         while true { if i == 3 { break; } i = i + 1; }\n\
         println(i);\n",
    );
    assert_eq!(printed, "3\n");
}

#[test]
fn test_continue_skips_rest_of_body() {
    let printed = output(
        "var total = 0;\n\
         for x in [1, 2, 3, 4] { if x == 2 { continue; } total = total + x; }\n\
         println(total);\n",
    );
    assert_eq!(printed, "8\n");
}

#[test]
fn test_for_over_hash_map_yields_pairs() {
    let printed = output(
        "var m = {\"k\": 1};\n\
         for pair in m { println(pair[0], pair[1]); }\n",
    );
    assert_eq!(printed, "k 1\n");
}

#[test]
fn test_print_has_no_newline() {
    assert_eq!(output("print(1, 2); print(3);"), "1 23");
}

// ============================================================================
// Functions and closures
// ============================================================================

#[test]
fn test_recursion() {
    let printed = output(
        "fn fib(n) { if n < 2 { return n; } return fib(n - 1) + fib(n - 2); }\n\
         println(fib(15));\n",
    );
    assert_eq!(printed, "610\n");
}

#[test]
fn test_closures_capture_by_value() {
    let printed = output(
        "fn make(n) { return fn(x) { return x + n; }; }\n\
         var add2 = make(2);\n\
         println(add2(40));\n",
    );
    assert_eq!(printed, "42\n");
}

#[test]
fn test_nested_named_function_can_recurse() {
    let printed = output(
        "fn outer() {\n\
           fn count(n) { if n == 0 { return 0; } return 1 + count(n - 1); }\n\
           return count(4);\n\
         }\n\
         println(outer());\n",
    );
    assert_eq!(printed, "4\n");
}

#[test]
fn test_wrong_arity() {
    assert_eq!(error_kind("fn f(a) { return a; } f();"), ErrorKind::ArgumentError);
}

#[test]
fn test_calling_a_non_callable() {
    let err = eval("var x = 1; x();").unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
    assert_eq!(err.message, "Int is not callable");
}

#[test]
fn test_function_name() {
    assert_eq!(eval("fn hello() {} hello.__name__();").unwrap(), "\"hello\"");
}

// ============================================================================
// Results
// ============================================================================

#[test]
fn test_err_returns_error_result() {
    let source = "fn f() ! { err \"boom\"; } var r = f(); r.error();";
    assert_eq!(eval(source).unwrap(), "\"boom\"");
    assert_eq!(eval("fn f() ! { err \"boom\"; } f().is_error();").unwrap(), "true");
}

#[test]
fn test_try_unwraps_ok() {
    let source = "fn one() ! { ok 1; }\n\
                  fn two() ! { var x = try one(); ok x + 1; }\n\
                  two().value();";
    assert_eq!(eval(source).unwrap(), "2");
}

#[test]
fn test_try_short_circuits_on_error() {
    let printed = output(
        "fn fail() ! { err \"bad\"; }\n\
         fn run() ! { var x = try fail(); println(\"unreachable\"); ok x; }\n\
         println(run());\n",
    );
    assert_eq!(printed, "Error(\"bad\")\n");
}

#[test]
fn test_or_else() {
    assert_eq!(eval("fn f() ! { err 1; } f().or_else(5);").unwrap(), "5");
}

// ============================================================================
// Structs
// ============================================================================

#[test]
fn test_struct_fields_and_methods() {
    let source = "struct Point { var x; var y; fn sum(self) { return self.x + self.y; } }\n\
                  var p = Point(1, 2);\n\
                  p.x = 10;\n\
                  p.sum();";
    assert_eq!(eval(source).unwrap(), "12");
}

#[test]
fn test_struct_operator_slots() {
    let source = "struct V { var n; fn __add__(self, other) { return V(self.n + other.n); } }\n\
                  (V(1) + V(2)).n;";
    assert_eq!(eval(source).unwrap(), "3");
}

#[test]
fn test_missing_operator_slot_is_type_error() {
    assert_eq!(
        error_kind("struct S { var a; } S(1) + S(2);"),
        ErrorKind::TypeError
    );
}

#[test]
fn test_missing_attribute() {
    assert_eq!(
        error_kind("struct S { var a; } S(1).b;"),
        ErrorKind::AttributeNotFound
    );
}

#[test]
fn test_struct_as_map_key() {
    let source = "struct K { var id;\n\
                    fn __hash__(self) { return self.id; }\n\
                    fn __eq__(self, other) { return self.id == other.id; } }\n\
                  var m = {};\n\
                  m[K(1)] = \"one\";\n\
                  m[K(1)];";
    assert_eq!(eval(source).unwrap(), "\"one\"");
}

#[test]
fn test_unhashable_key_fails_at_first_use() {
    let err = eval("struct K { var id; } var m = {}; m[K(1)] = 1;").unwrap_err();
    assert_eq!(err.kind, ErrorKind::AttributeNotFound);
    assert_eq!(err.message, "key is not hashable __hash__ not found");
}

#[test]
fn test_instance_of_and_type_of() {
    assert_eq!(eval("instance_of(1, Int);").unwrap(), "true");
    assert_eq!(eval("struct S {} instance_of(S(), S);").unwrap(), "true");
    assert_eq!(eval("type_of(\"x\") == String;").unwrap(), "true");
}

// ============================================================================
// Containers
// ============================================================================

#[test]
fn test_list_methods() {
    let source = "var l = [1, 2];\n\
                  l.append(3);\n\
                  l.prepend(0);\n\
                  l.pop();\n\
                  l;";
    assert_eq!(eval(source).unwrap(), "[0, 1, 2]");
    assert_eq!(eval("[1, 2, 3].size();").unwrap(), "3");
}

#[test]
fn test_list_index_out_of_bounds() {
    assert_eq!(error_kind("[1][1];"), ErrorKind::IndexOutOfBounds);
}

#[test]
fn test_hash_map_methods() {
    let source = "var m = {\"a\": 1};\n\
                  m.set(\"b\", 2);\n\
                  m.remove(\"a\");\n\
                  [m.size(), m.contains(\"a\"), m.get(\"b\").value()];";
    assert_eq!(eval(source).unwrap(), "[1, false, 2]");
}

#[test]
fn test_missing_map_key() {
    assert_eq!(error_kind("var m = {}; m[\"x\"];"), ErrorKind::KeyNotFound);
}

#[test]
fn test_unpacking() {
    assert_eq!(eval("var [a, b] = [1, 2]; a + b;").unwrap(), "3");
    assert_eq!(error_kind("var [a, b] = [1];"), ErrorKind::TypeError);
}

#[test]
fn test_string_methods() {
    assert_eq!(eval("\"hello\".size();").unwrap(), "5");
    assert_eq!(eval("\"hello\".contains(\"ell\");").unwrap(), "true");
    assert_eq!(eval("\"hey\"[1];").unwrap(), "\"e\"");
}

#[test]
fn test_self_containing_lists_compare_equal() {
    let source = "var a = [1]; a.append(a);\n\
                  var b = [1]; b.append(b);\n\
                  [a == b, a != b, a == a];";
    assert_eq!(eval(source).unwrap(), "[true, false, true]");
}

#[test]
fn test_self_containing_lists_with_different_items() {
    let source = "var a = [1]; a.append(a);\n\
                  var b = [2]; b.append(b);\n\
                  a == b;";
    assert_eq!(eval(source).unwrap(), "false");
}

#[test]
fn test_mutually_nested_lists_compare_equal() {
    let source = "var a = []; var b = [a]; a.append(b);\n\
                  var c = []; var d = [c]; c.append(d);\n\
                  a == c;";
    assert_eq!(eval(source).unwrap(), "true");
}

#[test]
fn test_signed_zero_keys_share_an_entry() {
    assert_eq!(eval("var m = {}; m[0.0] = 1; m[-0.0];").unwrap(), "1");
    assert_eq!(eval("var m = {}; m[-0.0] = 1; m[0.0] = 2; m.size();").unwrap(), "1");
}

#[test]
fn test_recursive_eq_slot_is_stack_overflow() {
    let source = "struct S { var a; fn __eq__(self, o) { return self == o; } }\n\
                  S(1) == S(2);";
    let kind = std::thread::Builder::new()
        .stack_size(8 * 1024 * 1024)
        .spawn(move || error_kind(source))
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(kind, ErrorKind::StackOverflow);
}

// ============================================================================
// VM state
// ============================================================================

#[test]
fn test_runtime_error_halts_vm() {
    let code = Compiler::new().compile("var x = 1 / 0;", 0).unwrap();
    let mut ctx = Context::with_config(ContextConfig::new());
    let mut vm = Vm::new(&mut ctx);
    assert!(vm.run(Rc::new(code.clone())).is_err());
    assert_eq!(vm.state(), VmState::Halted);
    assert!(vm.run(Rc::new(code.clone())).is_err());
    vm.reset_error();
    assert_eq!(vm.state(), VmState::Idle);
}
