//! Unit tests for BondError and ErrorKind

use core_types::{BondError, ErrorKind, Span, StackFrame};

#[cfg(test)]
mod error_kind_tests {
    use super::*;

    #[test]
    fn test_error_kind_names() {
        assert_eq!(ErrorKind::SyntaxError.name(), "SyntaxError");
        assert_eq!(ErrorKind::DivisionByZero.name(), "DivisionByZero");
        assert_eq!(ErrorKind::StackOverflow.to_string(), "StackOverflow");
        assert_eq!(ErrorKind::GenericError.to_string(), "Error");
    }
}

#[cfg(test)]
mod bond_error_tests {
    use super::*;

    #[test]
    fn test_bond_error_creation() {
        let error = BondError::new(ErrorKind::KeyNotFound, "key not found");
        assert_eq!(error.kind, ErrorKind::KeyNotFound);
        assert_eq!(error.message, "key not found");
        assert!(error.span.is_none());
        assert!(error.stack.is_empty());
    }

    #[test]
    fn test_bond_error_display() {
        let error = BondError::attribute_not_found("no attribute 'x'");
        assert_eq!(error.to_string(), "AttributeNotFound: no attribute 'x'");
    }

    #[test]
    fn test_bond_error_is_std_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&BondError::internal("broken"));
    }

    #[test]
    fn test_builder_methods() {
        let error = BondError::argument_error("expected 2 arguments, got 1")
            .with_span(Span::new(0, 0, 4, 1))
            .with_stack(vec![StackFrame::new("<module>", 0, 1)]);
        assert!(error.is_kind(ErrorKind::ArgumentError));
        assert_eq!(error.stack.len(), 1);
        assert_eq!(error.span.map(|s| s.end), Some(4));
    }

    #[test]
    fn test_report_without_stack_is_display() {
        let error = BondError::import_error("unable to import module x");
        assert_eq!(error.report(), error.to_string());
    }
}
