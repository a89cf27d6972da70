//! Token kinds produced by the scanner and consumed by the parser
//! (spec.md §3.1).

use expr_core::{Rational, Span};
use std::fmt;

/// Every distinguishable lexical unit. Literal payloads are carried inline
/// so the parser never has to re-scan the lexeme.
#[derive(Debug, Clone, PartialEq, strum::Display)]
pub enum TokenKind {
    // Literals
    Integer(Rational),
    Decimal(f64),
    Scientific(f64),
    Rational(Rational),
    /// A `n/m` literal whose `m` digit-run is `0`: kept distinct from
    /// `Rational` because `Rational::new` refuses a zero denominator
    /// (spec.md §9 Open Question — the literal is accepted at parse time
    /// and raises a `DomainError` only if actually evaluated).
    InvalidRational,
    StringLit(String),

    // Identifier-bearing
    Identifier(String),
    Keyword(String),
    Function(String),

    // Reference prefixes
    UnitRef { name: String, quoted: bool },
    VarRef(String),
    ConstRef(String),

    // Structural
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Colon,

    // Operators
    Plus,
    Minus,
    Multiply,
    Divide,
    Power,
    Mod,
    Of,
    At,
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
    Neq,
    And,
    Or,
    Xor,
    Not,
    Factorial,
    DoubleFactorial,
    Percent,
    Range,
    Assign,
    Lambda,
    Step,
    To,
    As,
    In,
    For,
    If,
    True,
    False,

    Eof,
}

impl TokenKind {
    /// `true` for anything that can stand on the left of an implicit
    /// multiplication per spec.md §4.4.
    pub fn is_value_like(&self) -> bool {
        matches!(
            self,
            TokenKind::Integer(_)
                | TokenKind::Decimal(_)
                | TokenKind::Scientific(_)
                | TokenKind::Rational(_)
                | TokenKind::InvalidRational
                | TokenKind::Identifier(_)
                | TokenKind::RParen
                | TokenKind::RBrace
                | TokenKind::RBracket
                | TokenKind::Factorial
                | TokenKind::DoubleFactorial
                | TokenKind::Percent
        )
    }
}

/// A single token: kind plus the original text and its source position
/// (spec.md §3.1). Tokens are immutable once emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
        }
    }

    pub fn eof(span: Span) -> Self {
        Self::new(TokenKind::Eof, "", span)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.lexeme, self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_like_covers_closing_brackets_and_postfix_ops() {
        assert!(TokenKind::RParen.is_value_like());
        assert!(TokenKind::Factorial.is_value_like());
        assert!(!TokenKind::LParen.is_value_like());
    }

    #[test]
    fn eof_token_has_empty_lexeme() {
        let tok = Token::eof(Span::dummy());
        assert_eq!(tok.lexeme, "");
        assert_eq!(tok.kind, TokenKind::Eof);
    }
}
