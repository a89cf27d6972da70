//! Lexer pipeline, identifier splitter/classifier, implicit-multiplication
//! pass, AST, and recursive-descent parser (spec.md §2, §4.1-§4.5).
//!
//! This crate depends only on `expr-core`; it never depends on `expr-eval`
//! so the dependency order stays leaves-first. Anything that would
//! otherwise need the concrete function registry (the splitter and
//! classifier) instead takes a plain `HashSet<String>` of function names
//! supplied by the caller.

pub mod ast;
pub mod classifier;
pub mod diagnostics;
pub mod implicit_mul;
pub mod lexer;
pub mod parser;
pub mod splitter;
pub mod tokens;

use std::collections::HashSet;

use expr_core::{ConstantRegistry, UnitRegistry};
use thiserror::Error;

pub use ast::Node;
pub use tokens::{Token, TokenKind};

use classifier::classify;
use implicit_mul::insert_implicit_multiplication;
use lexer::{LexError, Lexer};
use parser::{ParseError, Parser};
use splitter::{split_identifiers, SplitterTables};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Runs the full pipeline (spec.md §2): scan, split, classify, insert
/// implicit multiplication, parse. `functions` is the set of registered
/// built-in and user-defined function names, supplied by the evaluator.
pub fn compile(
    source: &str,
    constants: &ConstantRegistry,
    units: &UnitRegistry,
    functions: &HashSet<String>,
) -> Result<Node, CompileError> {
    compile_with_limits(source, constants, units, functions, usize::MAX)
}

/// Same as [`compile`], but enforces `max_identifier_length` in the scanner
/// (spec.md §6 DoS bound). `Engine::with_config` is the usual caller.
pub fn compile_with_limits(
    source: &str,
    constants: &ConstantRegistry,
    units: &UnitRegistry,
    functions: &HashSet<String>,
    max_identifier_length: usize,
) -> Result<Node, CompileError> {
    let tokens = Lexer::with_max_identifier_length(source, max_identifier_length).tokenize()?;
    let tables = SplitterTables {
        constants,
        units,
        functions,
    };
    let tokens = split_identifiers(tokens, &tables);
    let tokens = classify(tokens, functions);
    let tokens = insert_implicit_multiplication(tokens);
    Ok(Parser::parse(tokens)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_a_simple_arithmetic_expression() {
        let constants = ConstantRegistry::new();
        let units = UnitRegistry::new();
        let functions = HashSet::new();
        let node = compile("2 + 3 * 4", &constants, &units, &functions).unwrap();
        assert!(matches!(node, Node::Binary { .. }));
    }

    #[test]
    fn lex_errors_propagate_through_compile() {
        let constants = ConstantRegistry::new();
        let units = UnitRegistry::new();
        let functions = HashSet::new();
        let err = compile("\"unterminated", &constants, &units, &functions).unwrap_err();
        assert!(matches!(err, CompileError::Lex(LexError::UnterminatedString { .. })));
    }

    #[test]
    fn identifier_length_bound_is_enforced_when_configured() {
        let constants = ConstantRegistry::new();
        let units = UnitRegistry::new();
        let functions = HashSet::new();
        let err = compile_with_limits("averylongidentifier", &constants, &units, &functions, 5).unwrap_err();
        assert!(matches!(err, CompileError::Lex(LexError::IdentifierTooLong { .. })));
    }
}
