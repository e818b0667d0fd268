//! Unit tests for Span, StackFrame and Diagnostic

use core_types::{Diagnostic, Span, StackFrame};

#[cfg(test)]
mod span_tests {
    use super::*;

    #[test]
    fn test_span_fields() {
        let span = Span::new(3, 10, 20, 4);
        assert_eq!(span.module_id, 3);
        assert_eq!(span.start, 10);
        assert_eq!(span.end, 20);
        assert_eq!(span.line, 4);
    }

    #[test]
    fn test_span_is_copy() {
        let span = Span::new(0, 1, 2, 1);
        let copy = span;
        assert_eq!(span, copy);
    }

    #[test]
    fn test_span_merge_out_of_order() {
        let later = Span::new(0, 30, 35, 5);
        let earlier = Span::new(0, 2, 4, 1);
        let merged = Span::merge(later, earlier);
        assert_eq!(merged.start, 2);
        assert_eq!(merged.end, 35);
        assert_eq!(merged.line, 5);
    }

    #[test]
    fn test_inverted_span_has_zero_len() {
        let span = Span::new(0, 10, 5, 1);
        assert_eq!(span.len(), 0);
        assert!(span.is_empty());
    }
}

#[cfg(test)]
mod stack_frame_tests {
    use super::*;

    #[test]
    fn test_stack_frame_display() {
        let frame = StackFrame::new("fib", 2, 11);
        assert_eq!(frame.to_string(), "  at fib (module 2, line 11)");
    }
}

#[cfg(test)]
mod diagnostic_tests {
    use super::*;

    #[test]
    fn test_diagnostic_keeps_span() {
        let span = Span::new(1, 0, 3, 9);
        let diagnostic = Diagnostic::new(span, "unexpected token");
        assert_eq!(diagnostic.span, span);
        assert_eq!(diagnostic.message, "unexpected token");
    }
}
