//! Bond error types.
//!
//! [`BondError`] is the one error value that crosses crate boundaries: the
//! compiler, the VM, the import runtime and native extensions all report
//! through it.

use crate::{Span, StackFrame};
use thiserror::Error;

/// The kind of a Bond error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed source code
    SyntaxError,
    /// Operand or callee of the wrong type
    TypeError,
    /// Integer division or modulo by zero
    DivisionByZero,
    /// List or string index outside its bounds
    IndexOutOfBounds,
    /// Attribute or method lookup failed
    AttributeNotFound,
    /// Map lookup with a missing key
    KeyNotFound,
    /// Unknown global or local name
    NameError,
    /// Wrong number or shape of call arguments
    ArgumentError,
    /// Call depth exceeded the frame limit
    StackOverflow,
    /// A module could not be resolved, loaded or executed
    ImportError,
    /// A bytecode archive could not be read or written
    ArchiveError,
    /// Error raised by user or native code without a more specific kind
    GenericError,
    /// Broken interpreter invariant
    InternalError,
}

impl ErrorKind {
    /// Display name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::DivisionByZero => "DivisionByZero",
            ErrorKind::IndexOutOfBounds => "IndexOutOfBounds",
            ErrorKind::AttributeNotFound => "AttributeNotFound",
            ErrorKind::KeyNotFound => "KeyNotFound",
            ErrorKind::NameError => "NameError",
            ErrorKind::ArgumentError => "ArgumentError",
            ErrorKind::StackOverflow => "StackOverflow",
            ErrorKind::ImportError => "ImportError",
            ErrorKind::ArchiveError => "ArchiveError",
            ErrorKind::GenericError => "Error",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A Bond error with message, optional source span and stack trace.
///
/// # Examples
///
/// ```
/// use core_types::{BondError, ErrorKind};
///
/// let error = BondError::new(ErrorKind::TypeError, "cannot add Int and String");
/// assert_eq!(error.to_string(), "TypeError: cannot add Int and String");
/// assert!(error.is_kind(ErrorKind::TypeError));
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct BondError {
    /// The kind of error
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
    /// Location of the failing instruction, if known
    pub span: Option<Span>,
    /// Call stack at the time of the error, innermost first
    pub stack: Vec<StackFrame>,
}

/// Result alias used across the runtime.
pub type BondResult<T> = Result<T, BondError>;

impl BondError {
    /// Create an error with no location.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        BondError {
            kind,
            message: message.into(),
            span: None,
            stack: Vec::new(),
        }
    }

    /// Attach a span.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Attach a stack trace.
    pub fn with_stack(mut self, stack: Vec<StackFrame>) -> Self {
        self.stack = stack;
        self
    }

    /// True if the error is of the given kind.
    pub fn is_kind(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Shorthand for [`ErrorKind::TypeError`].
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    /// Shorthand for [`ErrorKind::NameError`].
    pub fn name_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NameError, message)
    }

    /// Shorthand for [`ErrorKind::AttributeNotFound`].
    pub fn attribute_not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AttributeNotFound, message)
    }

    /// Shorthand for [`ErrorKind::ArgumentError`].
    pub fn argument_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ArgumentError, message)
    }

    /// Shorthand for [`ErrorKind::ImportError`].
    pub fn import_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ImportError, message)
    }

    /// Shorthand for [`ErrorKind::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InternalError, message)
    }

    /// Render the error followed by its stack trace, one frame per line.
    pub fn report(&self) -> String {
        let mut out = self.to_string();
        for frame in &self.stack {
            out.push('\n');
            out.push_str(&frame.to_string());
        }
        out
    }
}
