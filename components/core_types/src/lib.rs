//! Core error and source-location types for the Bond runtime.
//!
//! This crate provides the vocabulary shared by every other component:
//! source spans attached to instructions, compile diagnostics, runtime
//! errors and stack frames.
//!
//! # Overview
//!
//! - [`Span`] - Module id, byte range and line of a piece of source
//! - [`Diagnostic`] - A compile-time error attached to a span
//! - [`BondError`] - Runtime error with kind, message and stack trace
//! - [`ErrorKind`] - Classification of runtime errors
//! - [`StackFrame`] - One entry of a runtime stack trace
//!
//! # Examples
//!
//! ```
//! use core_types::{BondError, ErrorKind, Span, StackFrame};
//!
//! let error = BondError::new(ErrorKind::DivisionByZero, "division by zero")
//!     .with_span(Span::new(0, 10, 15, 2))
//!     .with_stack(vec![StackFrame::new("<module>", 0, 2)]);
//!
//! assert_eq!(error.span.map(|s| s.line), Some(2));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod source;

pub use error::{BondError, BondResult, ErrorKind};
pub use source::{Diagnostic, Span, StackFrame};
