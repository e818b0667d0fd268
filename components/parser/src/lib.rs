//! Bond Parser Component
//!
//! Provides lexer, parser, AST construction, scope tracking and bytecode
//! generation for the Bond language.
//!
//! # Overview
//!
//! - [`Lexer`] - Tokenizes Bond source code
//! - [`Token`] - Tokens with their kind, lexeme and span
//! - [`Parser`] - Recursive descent parser producing a [`Program`]
//! - [`Stmt`] / [`Expr`] - Abstract Syntax Tree node types
//! - [`BytecodeGenerator`] - Converts the AST to a [`bytecode_system::Code`]
//! - [`Scopes`] - Resolves names to globals or frame locals
//! - [`Compiler`] - Source-to-bytecode driver, usable as a
//!   [`bytecode_system::SourceCompiler`]
//!
//! # Example
//!
//! ```
//! use parser::Compiler;
//!
//! let mut compiler = Compiler::new();
//! let code = compiler.compile("var x = 1 + 2;", 0).unwrap();
//! assert!(code.validate().is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod bytecode_gen;
pub mod compiler;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod scope;

pub use ast::{Expr, ExprKind, FunctionBody, FunctionDecl, Program, Stmt, StructDecl};
pub use bytecode_gen::{BytecodeGenerator, ImportResolver};
pub use compiler::Compiler;
pub use error::CompileErrors;
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;
pub use scope::{Scopes, Variable, BUILTINS};
