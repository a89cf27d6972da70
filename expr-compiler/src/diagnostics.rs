//! Stable error codes and a plain-text `Diagnostic` rendering for every
//! `CompileError` variant (SPEC_FULL.md "Error handling and diagnostics"):
//!
//!   E0001-E0099  Lex errors
//!   E0100-E0199  Parse errors
//!
//! `expr-eval` assigns its own `E1###` range over the same shape (see
//! `expr_eval::diagnostics`) rather than depending back on this module.
//!
//! This crate does not reach for a logging/tracing crate anywhere in its
//! pipeline — the observability surface is this coded, structured error
//! type, not a log stream.

use expr_core::Span;

use crate::lexer::LexError;
use crate::parser::ParseError;
use crate::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
}

/// A plain-text rendering of a `CompileError`: severity, stable code,
/// message, position, and an optional hint — enough for an embedder to
/// print something useful without matching on error variants.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub line: usize,
    pub col: usize,
    pub hint: Option<String>,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] line {}, col {}: {}", severity_label(self.severity), self.code, self.line, self.col, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " ({hint})")?;
        }
        Ok(())
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
    }
}

pub fn lex_error_code(e: &LexError) -> &'static str {
    match e {
        LexError::UnterminatedString { .. } => "E0001",
        LexError::UnknownChar { .. } => "E0002",
        LexError::MalformedNumber { .. } => "E0003",
        LexError::BareEquals { .. } => "E0004",
        LexError::DotOutsideNumber { .. } => "E0005",
        LexError::IdentifierTooLong { .. } => "E0006",
    }
}

pub fn parse_error_code(e: &ParseError) -> &'static str {
    match e {
        ParseError::Unexpected { .. } => "E0100",
        ParseError::UnexpectedEof { .. } => "E0101",
        ParseError::UnclosedBracket { .. } => "E0102",
        ParseError::InconsistentMatrixRows { .. } => "E0103",
        ParseError::EmptyExpression { .. } => "E0104",
        ParseError::IllegalAssignmentTarget { .. } => "E0105",
    }
}

fn lex_hint(e: &LexError) -> Option<String> {
    match e {
        LexError::BareEquals { .. } => Some("did you mean '=='?".to_string()),
        _ => None,
    }
}

fn parse_hint(e: &ParseError) -> Option<String> {
    match e {
        ParseError::Unexpected { found, expected, .. } if found == "=" => {
            Some(format!("expected {expected}; did you mean '=='?"))
        }
        _ => None,
    }
}

/// Renders any `CompileError` into a plain-text `Diagnostic`.
pub fn diagnose(error: &CompileError) -> Diagnostic {
    match error {
        CompileError::Lex(e) => {
            let span = e.span();
            Diagnostic {
                severity: Severity::Error,
                code: lex_error_code(e),
                message: e.to_string(),
                line: span.line,
                col: span.col,
                hint: lex_hint(e),
            }
        }
        CompileError::Parse(e) => {
            let span = parse_error_span(e);
            Diagnostic {
                severity: Severity::Error,
                code: parse_error_code(e),
                message: e.to_string(),
                line: span.map(|s| s.line).unwrap_or(0),
                col: span.map(|s| s.col).unwrap_or(0),
                hint: parse_hint(e),
            }
        }
    }
}

fn parse_error_span(e: &ParseError) -> Option<Span> {
    match e {
        ParseError::Unexpected { span, .. }
        | ParseError::UnclosedBracket { span, .. }
        | ParseError::InconsistentMatrixRows { span, .. }
        | ParseError::EmptyExpression { span }
        | ParseError::IllegalAssignmentTarget { span } => Some(*span),
        ParseError::UnexpectedEof { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    #[test]
    fn bare_equals_gets_a_did_you_mean_hint() {
        let err = Lexer::new("x = 1").tokenize().unwrap_err();
        let diag = diagnose(&CompileError::Lex(err));
        assert_eq!(diag.code, "E0004");
        assert!(diag.hint.unwrap().contains("=="));
    }

    #[test]
    fn lex_and_parse_errors_land_in_disjoint_code_ranges() {
        let lex_err = Lexer::new("\"abc").tokenize().unwrap_err();
        let lex_diag = diagnose(&CompileError::Lex(lex_err));
        assert!(lex_diag.code.starts_with("E00") && lex_diag.code < "E0100");
    }
}
