//! Bytecode system for the Bond runtime
//!
//! This crate provides the instruction set, compiled code objects, the
//! disassembler and the `.bar` archive format.
//!
//! # Features
//!
//! - Stack-based bytecode of 32-bit words with absolute jump targets
//! - Deduplicated constant pools with nested function and struct prototypes
//! - One source span per instruction word
//! - Binary archive serialization of whole module sets
//!
//! # Example
//!
//! ```
//! use bytecode_system::{disassemble, Archive, Code, Constant, Opcode};
//! use core_types::Span;
//!
//! let mut code = Code::new();
//! let a = code.add_constant(Constant::Int(1));
//! let b = code.add_constant(Constant::Int(2));
//! code.add_ins_operand(Opcode::LoadConst, a, Span::default());
//! code.add_ins_operand(Opcode::LoadConst, b, Span::default());
//! code.add_ins(Opcode::BinAdd, Span::default());
//! code.add_ins(Opcode::Return, Span::default());
//!
//! assert!(disassemble(&code).contains("BIN_ADD"));
//!
//! let mut archive = Archive::new();
//! archive.add_module(0, code);
//! let restored = Archive::from_bytes(&archive.to_bytes().unwrap()).unwrap();
//! assert_eq!(restored, archive);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod code;
pub mod compiler;
pub mod disassemble;
pub mod opcode;

// Re-export main types at crate root
pub use archive::{Archive, ArchiveError, BOND_MAGIC, BOND_VERSION};
pub use code::{format_float, Code, Constant, FunctionProto, Param, StructProto};
pub use compiler::SourceCompiler;
pub use disassemble::disassemble;
pub use opcode::{Opcode, OperandKind};
