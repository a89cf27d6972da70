//! Implicit-multiplication inserter (spec.md §4.4). Runs after
//! classification so it can tell functions from plain identifiers.

use crate::tokens::{Token, TokenKind};

/// Inserts a synthetic `Multiply` token between adjacent tokens that
/// represent concatenation of values, e.g. `2(3+4)` or `3 meters`.
pub fn insert_implicit_multiplication(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for tok in tokens {
        if let Some(prev) = out.last() {
            if should_insert(prev, &tok) {
                out.push(Token::new(TokenKind::Multiply, "", tok.span));
            }
        }
        out.push(tok);
    }
    out
}

fn should_insert(prev: &Token, next: &Token) -> bool {
    if prev.span.line != next.span.line {
        return false;
    }
    // Explicit non-insertion cases.
    if matches!(prev.kind, TokenKind::Function(_)) && matches!(next.kind, TokenKind::LParen) {
        return false;
    }
    if matches!(prev.kind, TokenKind::Identifier(_)) && matches!(next.kind, TokenKind::LParen) {
        return false;
    }
    if matches!(prev.kind, TokenKind::RBracket) && matches!(next.kind, TokenKind::LBracket) {
        return false;
    }
    if matches!(prev.kind, TokenKind::RBracket) && matches!(next.kind, TokenKind::LParen) {
        return false;
    }
    is_left_class(&prev.kind) && is_right_class(&next.kind)
}

fn is_left_class(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Integer(_)
            | TokenKind::Decimal(_)
            | TokenKind::Scientific(_)
            | TokenKind::Rational(_)
            | TokenKind::InvalidRational
            | TokenKind::RParen
            | TokenKind::Identifier(_)
            | TokenKind::Factorial
            | TokenKind::DoubleFactorial
            | TokenKind::Percent
            | TokenKind::RBrace
            | TokenKind::RBracket
    )
}

fn is_right_class(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Integer(_)
            | TokenKind::Decimal(_)
            | TokenKind::Scientific(_)
            | TokenKind::Rational(_)
            | TokenKind::InvalidRational
            | TokenKind::LParen
            | TokenKind::Identifier(_)
            | TokenKind::Function(_)
            | TokenKind::UnitRef { .. }
            | TokenKind::VarRef(_)
            | TokenKind::ConstRef(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use expr_core::Span;

    fn tok(kind: TokenKind) -> Token {
        Token::new(kind, "", Span::new(0, 1, 1))
    }

    #[test]
    fn inserts_between_number_and_paren() {
        let tokens = vec![tok(TokenKind::Integer(expr_core::Rational::from_i64(2))), tok(TokenKind::LParen)];
        let result = insert_implicit_multiplication(tokens);
        assert_eq!(result.len(), 3);
        assert_eq!(result[1].kind, TokenKind::Multiply);
    }

    #[test]
    fn does_not_insert_between_function_and_paren() {
        let tokens = vec![tok(TokenKind::Function("sin".into())), tok(TokenKind::LParen)];
        let result = insert_implicit_multiplication(tokens);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn does_not_insert_between_identifier_and_paren_potential_call() {
        let tokens = vec![tok(TokenKind::Identifier("f".into())), tok(TokenKind::LParen)];
        let result = insert_implicit_multiplication(tokens);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn inserts_between_number_and_identifier() {
        let tokens = vec![
            tok(TokenKind::Integer(expr_core::Rational::from_i64(3))),
            tok(TokenKind::Identifier("meters".into())),
        ];
        let result = insert_implicit_multiplication(tokens);
        assert_eq!(result.len(), 3);
        assert_eq!(result[1].kind, TokenKind::Multiply);
    }

    #[test]
    fn does_not_insert_between_chained_subscripts() {
        let tokens = vec![tok(TokenKind::RBracket), tok(TokenKind::LBracket)];
        let result = insert_implicit_multiplication(tokens);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn does_not_insert_across_lines() {
        let tokens = vec![
            Token::new(TokenKind::Integer(expr_core::Rational::from_i64(1)), "", Span::new(0, 1, 1)),
            Token::new(TokenKind::Identifier("x".into()), "", Span::new(2, 2, 1)),
        ];
        let result = insert_implicit_multiplication(tokens);
        assert_eq!(result.len(), 2);
    }
}
