//! Compiled code objects and their constant pools
//!
//! A [`Code`] is built once by the compiler (or read from an archive) and is
//! immutable afterwards: a flat instruction word array, a constant pool and
//! one source span per instruction word.

use crate::opcode::Opcode;
use core_types::Span;
use std::fmt;
use std::rc::Rc;

/// A formal parameter of a function.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    /// Parameter name
    pub name: String,
    /// Where the parameter was declared
    pub span: Span,
}

impl Param {
    /// Create a new parameter.
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Param {
            name: name.into(),
            span,
        }
    }
}

/// Compile-time description of a function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionProto {
    /// Function name (`<lambda>` for anonymous functions)
    pub name: String,
    /// Positional parameters
    pub params: Vec<Param>,
    /// Function body
    pub code: Rc<Code>,
}

impl FunctionProto {
    /// Number of positional parameters.
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

/// Compile-time description of a struct.
#[derive(Debug, Clone, PartialEq)]
pub struct StructProto {
    /// Struct name
    pub name: String,
    /// Field names in declaration order (constructor argument order)
    pub fields: Vec<String>,
    /// Methods in declaration order
    pub methods: Vec<(String, Rc<FunctionProto>)>,
}

/// An entry of a constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// 64-bit integer literal
    Int(i64),
    /// Floating point literal
    Float(f64),
    /// String literal or identifier
    String(String),
    /// Function definition
    Function(Rc<FunctionProto>),
    /// Struct definition
    Struct(Rc<StructProto>),
}

impl Constant {
    /// The string payload, if this is a string constant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::String(s) => Some(s),
            _ => None,
        }
    }

    fn same_literal(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Int(a), Constant::Int(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::String(a), Constant::String(b)) => a == b,
            _ => false,
        }
    }
}

/// Format a float the way Bond prints it (always with a fractional part or
/// exponent, so it never reads as an Int).
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let mut buffer = ryu::Buffer::new();
    buffer.format_finite(value).to_string()
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Constant::Int(i) => i.to_string(),
            Constant::Float(x) => format_float(*x),
            Constant::String(s) => format!("\"{}\"", s),
            Constant::Function(func) => format!("<function {}>", func.name),
            Constant::Struct(st) => format!("<struct {}>", st.name),
        };
        // Pad through the formatter so `{:<16}` works in the disassembler.
        f.pad(&text)
    }
}

/// A compiled unit of bytecode.
///
/// # Examples
///
/// ```
/// use bytecode_system::{Code, Constant, Opcode};
/// use core_types::Span;
///
/// let mut code = Code::new();
/// let one = code.add_constant(Constant::Int(1));
/// let again = code.add_constant(Constant::Int(1));
/// assert_eq!(one, again);
///
/// code.add_ins_operand(Opcode::LoadConst, one, Span::default());
/// code.add_ins(Opcode::Return, Span::default());
/// assert_eq!(code.instructions.len(), 3);
/// assert_eq!(code.spans.len(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Code {
    /// Instruction words
    pub instructions: Vec<u32>,
    /// Constant pool
    pub constants: Vec<Constant>,
    /// One span per instruction word
    pub spans: Vec<Span>,
}

impl Code {
    /// Create an empty code object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a code object from raw parts (used by the archive reader).
    pub fn from_parts(instructions: Vec<u32>, constants: Vec<Constant>, spans: Vec<Span>) -> Self {
        Code {
            instructions,
            constants,
            spans,
        }
    }

    /// Append a simple instruction.
    pub fn add_ins(&mut self, op: Opcode, span: Span) {
        self.instructions.push(op as u32);
        self.spans.push(span);
    }

    /// Append an instruction with an operand word.
    pub fn add_ins_operand(&mut self, op: Opcode, operand: u32, span: Span) {
        self.instructions.push(op as u32);
        self.instructions.push(operand);
        self.spans.push(span);
        self.spans.push(span);
    }

    /// Offset of the next instruction word to be emitted.
    pub fn current_index(&self) -> u32 {
        self.instructions.len() as u32
    }

    /// Overwrite the word at `index` (jump back-patching).
    pub fn patch(&mut self, index: u32, value: u32) {
        if let Some(word) = self.instructions.get_mut(index as usize) {
            *word = value;
        }
    }

    /// Add a constant and return its pool index.
    ///
    /// Int, Float (bit-equal) and String constants are deduplicated; every
    /// Function and Struct constant gets its own slot.
    pub fn add_constant(&mut self, constant: Constant) -> u32 {
        if let Some(index) = self.constants.iter().position(|c| c.same_literal(&constant)) {
            return index as u32;
        }
        self.constants.push(constant);
        (self.constants.len() - 1) as u32
    }

    /// Identifier stored at constant `index`.
    pub fn identifier(&self, index: u32) -> Option<&str> {
        self.constants.get(index as usize).and_then(Constant::as_str)
    }

    /// Span of the instruction word at `index`.
    pub fn span_at(&self, index: usize) -> Span {
        self.spans.get(index).copied().unwrap_or_default()
    }

    /// Check structural invariants: one span per word, every opcode known,
    /// no instruction truncated.
    pub fn validate(&self) -> Result<(), String> {
        if self.instructions.len() != self.spans.len() {
            return Err(format!(
                "span count {} does not match instruction count {}",
                self.spans.len(),
                self.instructions.len()
            ));
        }
        let mut offset = 0;
        while offset < self.instructions.len() {
            let word = self.instructions[offset];
            let op = Opcode::from_u32(word)
                .ok_or_else(|| format!("unknown opcode {} at {}", word, offset))?;
            offset += op.width();
        }
        if offset != self.instructions.len() {
            return Err("truncated instruction at end of code".to_string());
        }
        Ok(())
    }
}
