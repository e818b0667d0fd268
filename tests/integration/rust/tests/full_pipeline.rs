//! Full pipeline integration tests
//!
//! Source -> Parser -> BytecodeGenerator -> Code -> VM -> Value

use core_types::ErrorKind;
use integration_tests::{eval, output};

// ============================================================================
// Values and operators
// ============================================================================

#[test]
fn test_literals() {
    assert_eq!(eval("42;").unwrap(), "42");
    assert_eq!(eval("2.5;").unwrap(), "2.5");
    assert_eq!(eval("\"hi\";").unwrap(), "\"hi\"");
    assert_eq!(eval("nil;").unwrap(), "nil");
    assert_eq!(eval("[1, \"a\", nil];").unwrap(), "[1, \"a\", nil]");
}

#[test]
fn test_operator_precedence() {
    assert_eq!(eval("2 + 3 * 4;").unwrap(), "14");
    assert_eq!(eval("(2 + 3) * 4;").unwrap(), "20");
    assert_eq!(eval("10 % 4 + 1;").unwrap(), "3");
}

#[test]
fn test_user_operator_slots() {
    let source = "struct V { var n;\n\
                  fn __add__(self, other) { return V(self.n + other.n); }\n\
                  fn __eq__(self, other) { return self.n == other.n; } }\n\
                  (V(1) + V(2)) == V(3);";
    assert_eq!(eval(source).unwrap(), "true");
}

#[test]
fn test_type_errors_name_both_operands() {
    let err = eval("[1] - 1;").unwrap_err();
    assert_eq!(err.kind, ErrorKind::TypeError);
}

// ============================================================================
// Programs
// ============================================================================

#[test]
fn test_recursive_fibonacci() {
    let source = "fn fib(n) { if n < 2 { return n; } return fib(n - 1) + fib(n - 2); }\n\
                  fib(20);";
    assert_eq!(eval(source).unwrap(), "6765");
}

#[test]
fn test_closures_capture_locals() {
    let source = "fn adder(n) { return fn(x) { return x + n; }; }\n\
                  var add5 = adder(5);\n\
                  add5(10);";
    assert_eq!(eval(source).unwrap(), "15");
}

#[test]
fn test_loops_and_lists() {
    let source = "var evens = [];\n\
                  for x in [1, 2, 3, 4, 5, 6] { if x % 2 == 0 { evens.append(x); } }\n\
                  println(evens);";
    assert_eq!(output(source), "[2, 4, 6]\n");
}

#[test]
fn test_hash_map_round_trip() {
    let source = "var d = {\"one\": 1};\n\
                  d[\"two\"] = 2;\n\
                  println(d[\"one\"] + d[\"two\"]);";
    assert_eq!(output(source), "3\n");
}

#[test]
fn test_result_channel() {
    let source = "fn parse(x) ! { if x < 0 { err \"negative\"; } ok x * 2; }\n\
                  fn run() ! { var a = try parse(2); var b = try parse(-1); ok a + b; }\n\
                  var r = run();\n\
                  println(r.is_error(), r.or_else(0));";
    assert_eq!(output(source), "true 0\n");
}

#[test]
fn test_struct_methods() {
    let source = "struct Counter { var n;\n\
                  fn bump(self) { self.n = self.n + 1; return self; } }\n\
                  var c = Counter(0);\n\
                  c.bump().bump();\n\
                  println(c.n);";
    assert_eq!(output(source), "2\n");
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_runtime_error_stack_trace() {
    let source = "fn inner() { return [][3]; }\n\
                  fn outer() { return inner(); }\n\
                  outer();";
    let err = eval(source).unwrap_err();
    assert_eq!(err.kind, ErrorKind::IndexOutOfBounds);
    let names: Vec<&str> = err.stack.iter().map(|f| f.function.as_str()).collect();
    assert_eq!(names, vec!["inner", "outer", "<module>"]);
}

#[test]
fn test_unknown_attribute() {
    let err = eval("struct S { var a; } S(1).missing;").unwrap_err();
    assert_eq!(err.kind, ErrorKind::AttributeNotFound);
}
