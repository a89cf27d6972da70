//! Stable error codes and plain-text `Diagnostic` rendering for `EvalError`
//! (SPEC_FULL.md "Error handling and diagnostics"):
//!
//!   E1000-E1099  evaluation-time errors
//!
//! Compile errors that bubble up through `EvalError::Compile` keep their
//! own `E0###` codes from `expr_compiler::diagnostics` rather than being
//! renumbered here.

use expr_compiler::diagnostics as compile_diagnostics;
use expr_core::Span;

use crate::error::EvalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error [{}] line {}, col {}: {}", self.code, self.line, self.col, self.message)
    }
}

pub fn eval_error_code(e: &EvalError) -> &'static str {
    match e {
        EvalError::Type { .. } => "E1000",
        EvalError::Arity { .. } => "E1001",
        EvalError::Domain { .. } => "E1002",
        EvalError::UndefinedIdentifier { .. } => "E1003",
        EvalError::StackOverflow { .. } => "E1004",
        EvalError::Resource { .. } => "E1005",
        EvalError::Compile(_) => "E1006",
    }
}

/// Renders any `EvalError` into a plain-text `Diagnostic`. Compile errors
/// delegate to `expr_compiler::diagnostics` for position and keep that
/// module's own code, since they never reached evaluation.
pub fn diagnose(error: &EvalError) -> Diagnostic {
    if let EvalError::Compile(compile_error) = error {
        let inner = compile_diagnostics::diagnose(compile_error);
        return Diagnostic {
            severity: Severity::Error,
            code: inner.code,
            message: inner.message,
            line: inner.line,
            col: inner.col,
        };
    }
    let span = error.span().unwrap_or_else(Span::dummy);
    Diagnostic {
        severity: Severity::Error,
        code: eval_error_code(error),
        message: error.to_string(),
        line: span.line,
        col: span.col,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_gets_its_own_e1_code() {
        let err = EvalError::domain_error("factorial is undefined for negative numbers", Span::new(3, 1, 4));
        let diag = diagnose(&err);
        assert_eq!(diag.code, "E1002");
        assert_eq!(diag.line, 1);
    }

    #[test]
    fn compile_errors_keep_their_own_e0_code_range() {
        let compile_err = expr_compiler::CompileError::from(expr_compiler::lexer::LexError::BareEquals { span: Span::new(2, 1, 3) });
        let diag = diagnose(&EvalError::Compile(compile_err));
        assert!(diag.code.starts_with("E00"));
    }
}
