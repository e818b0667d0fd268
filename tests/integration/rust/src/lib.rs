//! Integration test suite for the Bond toolchain
//!
//! Helpers shared by the cross-crate tests: compile source, run it in a
//! fresh context with captured output, and list the opcodes of a code
//! object.

use bytecode_system::{Code, Opcode};
use core_types::BondError;
use interpreter::{Context, SharedOutput, Vm};
use parser::Compiler;
use std::rc::Rc;

/// Re-export components for test convenience
pub mod components {
    pub use bond_cli;
    pub use bytecode_system;
    pub use core_types;
    pub use interpreter;
    pub use memory_manager;
    pub use parser;
}

/// Compile a module, panicking with the diagnostics on failure.
pub fn compile(source: &str) -> Code {
    Compiler::new()
        .compile(source, 0)
        .unwrap_or_else(|d| panic!("compile failed: {:?}", d))
}

/// Compile in REPL mode so the trailing expression is the result.
pub fn compile_expr(source: &str) -> Code {
    Compiler::repl()
        .compile(source, 0)
        .unwrap_or_else(|d| panic!("compile failed: {:?}", d))
}

/// Run `code` in a fresh context; returns the result's repr and the output.
pub fn run_code(code: Code) -> (Result<String, BondError>, String) {
    let mut ctx = Context::new();
    let out = SharedOutput::new();
    ctx.set_output(Box::new(out.clone()));
    ctx.set_compiler(Compiler::new());
    let mut vm = Vm::new(&mut ctx);
    let result = vm.run(Rc::new(code)).map(|v| vm.ctx().repr(v));
    (result, out.contents())
}

/// Evaluate an expression program and return the repr of its value.
pub fn eval(source: &str) -> Result<String, BondError> {
    run_code(compile_expr(source)).0
}

/// Run a module and return what it printed.
pub fn output(source: &str) -> String {
    let (result, out) = run_code(compile(source));
    if let Err(e) = result {
        panic!("run failed: {}", e.report());
    }
    out
}

/// Opcodes of `code` in order, skipping operand words.
pub fn opcodes(code: &Code) -> Vec<Opcode> {
    let mut ops = Vec::new();
    let mut offset = 0;
    while offset < code.instructions.len() {
        match Opcode::from_u32(code.instructions[offset]) {
            Some(op) => {
                ops.push(op);
                offset += op.width();
            }
            None => break,
        }
    }
    ops
}

/// True if `needle` appears contiguously in `haystack`.
pub fn contains_sequence(haystack: &[Opcode], needle: &[Opcode]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
