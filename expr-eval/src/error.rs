//! Evaluation-time error taxonomy (spec.md §7).
//!
//! Every variant carries the offending `Span` so embedders can render
//! `line N, col M` diagnostics without re-scanning the source; several also
//! carry a `hint` for the common typo/near-miss cases the spec calls out.

use expr_compiler::CompileError;
use expr_core::Span;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("{message} at {span}")]
    Type { message: String, span: Span },

    #[error("{function} expects {min}..={max} argument(s), got {got} at {span}")]
    Arity {
        function: String,
        min: usize,
        max: usize,
        got: usize,
        span: Span,
    },

    #[error("{message} at {span}")]
    Domain { message: String, span: Span },

    #[error("undefined {kind} '{name}' at {span}")]
    UndefinedIdentifier {
        kind: &'static str,
        name: String,
        span: Span,
    },

    #[error("recursion depth exceeded at {span}")]
    StackOverflow { span: Span },

    #[error("{message} at {span}")]
    Resource { message: String, span: Span },

    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl EvalError {
    pub fn type_error(message: impl Into<String>, span: Span) -> Self {
        EvalError::Type {
            message: message.into(),
            span,
        }
    }

    pub fn domain_error(message: impl Into<String>, span: Span) -> Self {
        EvalError::Domain {
            message: message.into(),
            span,
        }
    }

    pub fn resource_error(message: impl Into<String>, span: Span) -> Self {
        EvalError::Resource {
            message: message.into(),
            span,
        }
    }

    pub fn undefined_variable(name: impl Into<String>, span: Span) -> Self {
        EvalError::UndefinedIdentifier {
            kind: "variable",
            name: name.into(),
            span,
        }
    }

    pub fn undefined_function(name: impl Into<String>, span: Span) -> Self {
        EvalError::UndefinedIdentifier {
            kind: "function",
            name: name.into(),
            span,
        }
    }

    pub fn undefined_unit(name: impl Into<String>, span: Span) -> Self {
        EvalError::UndefinedIdentifier {
            kind: "unit",
            name: name.into(),
            span,
        }
    }

    pub fn undefined_constant(name: impl Into<String>, span: Span) -> Self {
        EvalError::UndefinedIdentifier {
            kind: "constant",
            name: name.into(),
            span,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            EvalError::Type { span, .. }
            | EvalError::Arity { span, .. }
            | EvalError::Domain { span, .. }
            | EvalError::UndefinedIdentifier { span, .. }
            | EvalError::StackOverflow { span }
            | EvalError::Resource { span, .. } => Some(*span),
            EvalError::Compile(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_carry_the_given_span() {
        let span = Span::new(4, 1, 5);
        let err = EvalError::domain_error("division by zero", span);
        assert_eq!(err.span(), Some(span));
    }
}
