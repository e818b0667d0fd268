//! Human-readable bytecode listings

use crate::code::{Code, Constant};
use crate::opcode::{Opcode, OperandKind};
use std::fmt::Write;

/// Disassemble `code` and, recursively, every function and struct method in
/// its constant pool.
///
/// Each line is `line  offset MNEMONIC [operand]`; the source line is shown
/// only when it changes. Constant operands are followed by the constant's
/// printed form.
pub fn disassemble(code: &Code) -> String {
    let mut out = String::new();
    let mut offset = 0usize;
    let mut previous_line = 0u32;

    while offset < code.instructions.len() {
        let span = code.span_at(offset);
        if span.line != previous_line {
            let _ = write!(out, "{:6}  {:04} ", span.line, offset);
            previous_line = span.line;
        } else {
            let _ = write!(out, "{:6}  {:04} ", "", offset);
        }

        let word = code.instructions[offset];
        let op = match Opcode::from_u32(word) {
            Some(op) => op,
            None => {
                let _ = writeln!(out, "<unknown {}>", word);
                offset += 1;
                continue;
            }
        };
        let operand = code.instructions.get(offset + 1).copied().unwrap_or(0);
        match op.operand_kind() {
            OperandKind::Simple => {
                let _ = writeln!(out, "{}", op.name());
            }
            OperandKind::Constant => match code.constants.get(operand as usize) {
                Some(constant) => {
                    let _ = writeln!(out, "{:<16} {:0>4}, {:<16}", op.name(), operand, constant);
                }
                None => {
                    let _ = writeln!(out, "{:<16} {:0>4}, <bad constant>", op.name(), operand);
                }
            },
            OperandKind::Operand => {
                let _ = writeln!(out, "{:<16} {:<4}", op.name(), operand);
            }
        }
        offset += op.width();
    }

    for constant in &code.constants {
        match constant {
            Constant::Function(func) => {
                let _ = writeln!(out, "\ndisassembly of function {}", func.name);
                out.push_str(&disassemble(&func.code));
            }
            Constant::Struct(st) => {
                let _ = writeln!(out, "\ndisassembly of struct {}", st.name);
                for (name, method) in &st.methods {
                    let _ = writeln!(out, "\ndisassembly of {}.{}", st.name, name);
                    out.push_str(&disassemble(&method.code));
                }
            }
            _ => {}
        }
    }
    out
}
