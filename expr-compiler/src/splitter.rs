//! Identifier splitter (spec.md §4.2): breaks compound `IDENTIFIER` tokens
//! into smaller tokens conservatively, so names like `m1` or `x2` are never
//! broken apart unless breaking them is actually the only sensible reading.

use std::collections::HashSet;

use expr_core::{ConstantRegistry, Rational, UnitRegistry};

use crate::tokens::{Token, TokenKind};

/// The external name sets the splitter consults. `functions` is supplied by
/// the caller (the evaluator crate owns the real function registry) so this
/// crate never depends on `expr-eval` (spec.md §2 dependency order).
pub struct SplitterTables<'a> {
    pub constants: &'a ConstantRegistry,
    pub units: &'a UnitRegistry,
    pub functions: &'a HashSet<String>,
}

impl<'a> SplitterTables<'a> {
    fn is_constant_or_function(&self, name: &str) -> bool {
        self.constants.contains(name) || self.functions.contains(name)
    }

    fn is_function(&self, name: &str) -> bool {
        self.functions.contains(name)
    }

    fn is_unit(&self, name: &str) -> bool {
        self.units.contains(name)
    }
}

/// Runs the splitter pass over a full token stream.
pub fn split_identifiers(tokens: Vec<Token>, tables: &SplitterTables) -> Vec<Token> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let tok = &tokens[i];
        if let TokenKind::Identifier(name) = &tok.kind {
            if is_definition_target(&tokens, i) {
                out.push(tok.clone());
            } else {
                split_one(tok, name, tables, &mut out);
            }
        } else {
            out.push(tok.clone());
        }
        i += 1;
    }
    out
}

/// Step 1: does not split when the identifier is itself the name being
/// defined (`name := …` or `name(params) := …`).
fn is_definition_target(tokens: &[Token], idx: usize) -> bool {
    match tokens.get(idx + 1).map(|t| &t.kind) {
        Some(TokenKind::Assign) => true,
        Some(TokenKind::LParen) => scan_for_assign_after_matching_paren(tokens, idx + 1),
        _ => false,
    }
}

fn scan_for_assign_after_matching_paren(tokens: &[Token], lparen_idx: usize) -> bool {
    let mut depth = 0usize;
    let mut j = lparen_idx;
    while j < tokens.len() {
        match tokens[j].kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth -= 1;
                if depth == 0 {
                    return matches!(tokens.get(j + 1).map(|t| &t.kind), Some(TokenKind::Assign));
                }
            }
            _ => {}
        }
        j += 1;
    }
    false
}

fn split_one(original: &Token, name: &str, tables: &SplitterTables, out: &mut Vec<Token>) {
    if let Some(pieces) = try_digit_split(original, name, tables) {
        out.extend(pieces);
        return;
    }
    if let Some(pieces) = try_function_suffix_split(original, name, tables) {
        out.extend(pieces);
        return;
    }
    out.push(original.clone());
}

/// Step 2: longest prefix `P` such that the remainder starts with a digit,
/// `P` is a known constant or function, and `P` is not a known unit.
fn try_digit_split(original: &Token, name: &str, tables: &SplitterTables) -> Option<Vec<Token>> {
    let chars: Vec<char> = name.chars().collect();
    let mut best_split: Option<usize> = None;
    for i in 1..chars.len() {
        if chars[i].is_ascii_digit() {
            let prefix: String = chars[..i].iter().collect();
            if tables.is_constant_or_function(&prefix) && !tables.is_unit(&prefix) {
                best_split = Some(i);
            }
        }
    }
    let split_at = best_split?;
    let prefix: String = chars[..split_at].iter().collect();
    let rest: String = chars[split_at..].iter().collect();

    let digit_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let digits: String = rest.chars().take(digit_len).collect();
    let remainder: String = rest.chars().skip(digit_len).collect();

    let mut pieces = vec![
        Token::new(TokenKind::Identifier(prefix.clone()), prefix, original.span),
        Token::new(
            TokenKind::Integer(Rational::from_bigint(digits.parse().ok()?)),
            digits,
            original.span,
        ),
    ];
    if !remainder.is_empty() {
        let remainder_token = Token::new(TokenKind::Identifier(remainder.clone()), remainder.clone(), original.span);
        // Recurse: every recursive call strictly shortens the remaining lexeme.
        let recursed = split_one_standalone(&remainder_token, &remainder, tables);
        pieces.extend(recursed);
    }
    Some(pieces)
}

fn split_one_standalone(token: &Token, name: &str, tables: &SplitterTables) -> Vec<Token> {
    let mut out = Vec::new();
    split_one(token, name, tables, &mut out);
    out
}

/// Step 3: longest suffix `S` such that the prefix is exactly one character
/// or a known constant, and `S` is a known function.
fn try_function_suffix_split(original: &Token, name: &str, tables: &SplitterTables) -> Option<Vec<Token>> {
    let chars: Vec<char> = name.chars().collect();
    if chars.len() < 2 {
        return None;
    }
    let mut best_split: Option<usize> = None;
    for i in 1..chars.len() {
        let prefix: String = chars[..i].iter().collect();
        let suffix: String = chars[i..].iter().collect();
        if (i == 1 || tables.constants.contains(&prefix)) && tables.is_function(&suffix) {
            best_split = Some(i);
        }
    }
    let split_at = best_split?;
    let prefix: String = chars[..split_at].iter().collect();
    let suffix: String = chars[split_at..].iter().collect();
    Some(vec![
        Token::new(TokenKind::Identifier(prefix.clone()), prefix, original.span),
        Token::new(TokenKind::Identifier(suffix.clone()), suffix, original.span),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use expr_core::Span;

    fn tables_with_functions(names: &[&str]) -> (ConstantRegistry, UnitRegistry, HashSet<String>) {
        let constants = ConstantRegistry::new();
        let units = UnitRegistry::new();
        let functions = names.iter().map(|s| s.to_string()).collect();
        (constants, units, functions)
    }

    fn ident(name: &str) -> Token {
        Token::new(TokenKind::Identifier(name.to_string()), name, Span::dummy())
    }

    #[test]
    fn plain_variable_name_is_never_split() {
        let (constants, units, functions) = tables_with_functions(&["sin"]);
        let tables = SplitterTables {
            constants: &constants,
            units: &units,
            functions: &functions,
        };
        let result = split_identifiers(vec![ident("m1"), Token::eof(Span::dummy())], &tables);
        // "m" is not a registered constant/function, so no digit split happens.
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].kind, TokenKind::Identifier("m1".into()));
    }

    #[test]
    fn digit_split_on_constant_prefix() {
        let (constants, units, functions) = tables_with_functions(&[]);
        let tables = SplitterTables {
            constants: &constants,
            units: &units,
            functions: &functions,
        };
        let result = split_identifiers(vec![ident("pi2"), Token::eof(Span::dummy())], &tables);
        assert_eq!(result[0].kind, TokenKind::Identifier("pi".into()));
        assert_eq!(result[1].kind, TokenKind::Integer(Rational::from_i64(2)));
    }

    #[test]
    fn definition_target_is_never_split() {
        let (constants, units, functions) = tables_with_functions(&[]);
        let tables = SplitterTables {
            constants: &constants,
            units: &units,
            functions: &functions,
        };
        let tokens = vec![ident("pi2"), Token::new(TokenKind::Assign, ":=", Span::dummy())];
        let result = split_identifiers(tokens, &tables);
        assert_eq!(result[0].kind, TokenKind::Identifier("pi2".into()));
    }

    #[test]
    fn function_suffix_split_with_single_char_prefix() {
        let (constants, units, functions) = tables_with_functions(&["sin"]);
        let tables = SplitterTables {
            constants: &constants,
            units: &units,
            functions: &functions,
        };
        let result = split_identifiers(vec![ident("rsin"), Token::eof(Span::dummy())], &tables);
        assert_eq!(result[0].kind, TokenKind::Identifier("r".into()));
        assert_eq!(result[1].kind, TokenKind::Identifier("sin".into()));
    }
}
