//! Classifier (spec.md §4.3): reclassifies `IDENTIFIER` tokens using the
//! keyword set and function registry. Units and constants stay as plain
//! identifiers so user variables can shadow them at evaluation time.

use std::collections::HashSet;

use crate::tokens::{Token, TokenKind};

fn logical_keyword_kind(word: &str) -> Option<TokenKind> {
    match word {
        "and" => Some(TokenKind::And),
        "or" => Some(TokenKind::Or),
        "xor" => Some(TokenKind::Xor),
        "not" => Some(TokenKind::Not),
        "mod" => Some(TokenKind::Mod),
        "of" => Some(TokenKind::Of),
        _ => None,
    }
}

fn control_keyword_kind(word: &str) -> Option<TokenKind> {
    match word {
        "for" => Some(TokenKind::For),
        "in" => Some(TokenKind::In),
        "if" => Some(TokenKind::If),
        "step" => Some(TokenKind::Step),
        "true" => Some(TokenKind::True),
        "false" => Some(TokenKind::False),
        "to" => Some(TokenKind::To),
        "as" => Some(TokenKind::As),
        _ => None,
    }
}

/// Reclassifies every `Identifier` token in place, in priority order:
/// logical-operator keyword, control keyword, registered function, else
/// leave as `Identifier`.
pub fn classify(tokens: Vec<Token>, functions: &HashSet<String>) -> Vec<Token> {
    tokens
        .into_iter()
        .map(|tok| {
            let TokenKind::Identifier(name) = &tok.kind else {
                return tok;
            };
            let lowered = name.to_ascii_lowercase();
            if let Some(kind) = logical_keyword_kind(&lowered) {
                return Token::new(kind, tok.lexeme, tok.span);
            }
            if let Some(kind) = control_keyword_kind(&lowered) {
                return Token::new(kind, tok.lexeme, tok.span);
            }
            if functions.contains(&lowered) {
                return Token::new(TokenKind::Function(lowered), tok.lexeme, tok.span);
            }
            tok
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use expr_core::Span;

    fn ident(name: &str) -> Token {
        Token::new(TokenKind::Identifier(name.to_string()), name, Span::dummy())
    }

    #[test]
    fn logical_keywords_take_priority_over_function_names() {
        let mut functions = HashSet::new();
        functions.insert("mod".to_string());
        let result = classify(vec![ident("mod")], &functions);
        assert_eq!(result[0].kind, TokenKind::Mod);
    }

    #[test]
    fn control_keywords_are_reclassified() {
        let functions = HashSet::new();
        let result = classify(vec![ident("for"), ident("step"), ident("true")], &functions);
        assert_eq!(result[0].kind, TokenKind::For);
        assert_eq!(result[1].kind, TokenKind::Step);
        assert_eq!(result[2].kind, TokenKind::True);
    }

    #[test]
    fn registered_functions_become_function_tokens() {
        let mut functions = HashSet::new();
        functions.insert("sqrt".to_string());
        let result = classify(vec![ident("sqrt")], &functions);
        assert_eq!(result[0].kind, TokenKind::Function("sqrt".into()));
    }

    #[test]
    fn units_and_constants_remain_plain_identifiers() {
        let functions = HashSet::new();
        let result = classify(vec![ident("meters"), ident("pi")], &functions);
        assert_eq!(result[0].kind, TokenKind::Identifier("meters".into()));
        assert_eq!(result[1].kind, TokenKind::Identifier("pi".into()));
    }
}
