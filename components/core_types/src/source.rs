//! Source spans, stack frames and compile diagnostics.
//!
//! Every instruction in a code object carries a [`Span`], and every runtime
//! error carries the [`StackFrame`]s that were live when it was raised.

use std::fmt;

/// A region of source text inside one module.
///
/// Spans are plain data: `module_id` indexes the runtime's table of source
/// paths, `start`/`end` are byte offsets and `line` is 1-based.
///
/// # Examples
///
/// ```
/// use core_types::Span;
///
/// let span = Span::new(0, 4, 9, 1);
/// assert_eq!(span.len(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Identifier of the module the span belongs to
    pub module_id: u32,
    /// Byte offset of the first character
    pub start: u32,
    /// Byte offset one past the last character
    pub end: u32,
    /// 1-based line of the first character
    pub line: u32,
}

impl Span {
    /// Create a new span.
    pub fn new(module_id: u32, start: u32, end: u32, line: u32) -> Self {
        Span {
            module_id,
            start,
            end,
            line,
        }
    }

    /// Span covering `from` up to the end of `to`.
    ///
    /// Keeps the module and line of `from`.
    pub fn merge(from: Span, to: Span) -> Span {
        Span {
            module_id: from.module_id,
            start: from.start.min(to.start),
            end: from.end.max(to.end),
            line: from.line,
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// True when the span covers no text.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One frame of a runtime call stack.
///
/// # Examples
///
/// ```
/// use core_types::StackFrame;
///
/// let frame = StackFrame::new("main", 0, 3);
/// assert_eq!(frame.to_string(), "  at main (module 0, line 3)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Name of the executing function (`<module>` for top level code)
    pub function: String,
    /// Module the function was compiled from
    pub module_id: u32,
    /// Line of the instruction that was executing
    pub line: u32,
}

impl StackFrame {
    /// Create a new stack frame.
    pub fn new(function: impl Into<String>, module_id: u32, line: u32) -> Self {
        StackFrame {
            function: function.into(),
            module_id,
            line,
        }
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  at {} (module {}, line {})",
            self.function, self.module_id, self.line
        )
    }
}

/// A compile-time error report attached to a span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Where the problem was found
    pub span: Span,
    /// Human-readable description
    pub message: String,
}

impl Diagnostic {
    /// Create a new diagnostic.
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        Diagnostic {
            span,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.span.line, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_merge() {
        let a = Span::new(1, 4, 6, 2);
        let b = Span::new(1, 10, 14, 3);
        let merged = Span::merge(a, b);
        assert_eq!(merged, Span::new(1, 4, 14, 2));
    }

    #[test]
    fn test_span_empty() {
        assert!(Span::default().is_empty());
        assert!(!Span::new(0, 0, 1, 1).is_empty());
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::new(Span::new(0, 0, 1, 7), "expected ';'");
        assert_eq!(d.to_string(), "line 7: expected ';'");
    }
}
