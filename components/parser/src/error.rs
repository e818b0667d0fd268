//! Parser error types and helpers

use core_types::{BondError, Diagnostic, ErrorKind, Span};
use thiserror::Error;

/// Every diagnostic produced while compiling one module.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}", render(.diagnostics))]
pub struct CompileErrors {
    /// Diagnostics in source order
    pub diagnostics: Vec<Diagnostic>,
}

fn render(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl From<Vec<Diagnostic>> for CompileErrors {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        CompileErrors { diagnostics }
    }
}

impl From<CompileErrors> for BondError {
    fn from(err: CompileErrors) -> Self {
        let span = err.diagnostics.first().map(|d| d.span);
        let mut error = BondError::new(ErrorKind::SyntaxError, err.to_string());
        if let Some(span) = span {
            error = error.with_span(span);
        }
        error
    }
}

/// Create a syntax diagnostic at a given span
pub fn syntax_error(message: impl Into<String>, span: Span) -> Diagnostic {
    Diagnostic::new(span, message)
}

/// Create an unexpected token diagnostic
pub fn unexpected_token(expected: &str, got: &str, span: Span) -> Diagnostic {
    syntax_error(format!("Expected {}, got '{}'", expected, got), span)
}

/// Create an unexpected end of input diagnostic
pub fn unexpected_eof(span: Span) -> Diagnostic {
    syntax_error("Unexpected end of input", span)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error() {
        let diag = syntax_error("test", Span::new(0, 0, 1, 3));
        assert_eq!(diag.to_string(), "line 3: test");
    }

    #[test]
    fn test_unexpected_token() {
        let diag = unexpected_token("identifier", "42", Span::default());
        assert!(diag.message.contains("Expected identifier"));
    }

    #[test]
    fn test_compile_errors_convert_to_syntax_error() {
        let errors = CompileErrors::from(vec![
            syntax_error("first", Span::new(0, 0, 1, 1)),
            syntax_error("second", Span::new(0, 4, 5, 2)),
        ]);
        assert_eq!(errors.to_string(), "line 1: first\nline 2: second");
        let err: BondError = errors.into();
        assert!(err.is_kind(ErrorKind::SyntaxError));
        assert_eq!(err.span.map(|s| s.line), Some(1));
    }
}
