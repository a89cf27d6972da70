//! Scanner: characters to raw tokens (spec.md §4.1).
//!
//! The scanner never classifies identifiers — every identifier-shaped run
//! of characters is emitted as a plain `Identifier`, leaving keyword and
//! function classification to the splitter/classifier passes that run
//! afterward.

use expr_core::{Rational, Span};
use num_bigint::BigInt;
use thiserror::Error;

use crate::tokens::{Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LexError {
    #[error("unterminated string at {span}")]
    UnterminatedString { span: Span },
    #[error("unexpected character '{ch}' at {span}")]
    UnknownChar { ch: char, span: Span },
    #[error("malformed number at {span}")]
    MalformedNumber { span: Span },
    #[error("bare '=' at {span}; did you mean '=='?")]
    BareEquals { span: Span },
    #[error("'.' outside a number at {span}")]
    DotOutsideNumber { span: Span },
    #[error("identifier exceeds the maximum length of {max} at {span}")]
    IdentifierTooLong { max: usize, span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnterminatedString { span }
            | LexError::UnknownChar { span, .. }
            | LexError::MalformedNumber { span }
            | LexError::BareEquals { span }
            | LexError::DotOutsideNumber { span }
            | LexError::IdentifierTooLong { span, .. } => *span,
        }
    }
}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    max_identifier_length: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            max_identifier_length: usize::MAX,
        }
    }

    /// Same as [`Lexer::new`], but enforces `max_identifier_length`
    /// (spec.md §6 DoS bound, SPEC_FULL.md §3 "Resource accounting") once an
    /// identifier-shaped run finishes scanning.
    pub fn with_max_identifier_length(source: &str, max_identifier_length: usize) -> Self {
        Self {
            max_identifier_length,
            ..Self::new(source)
        }
    }

    /// Scans the whole source into a token vector terminated by `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let span = self.current_span();
            let Some(ch) = self.current() else {
                tokens.push(Token::eof(span));
                break;
            };
            let token = self.scan_token(ch, span)?;
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.source.get(self.pos + offset).copied()
    }

    fn current_span(&self) -> Span {
        Span::new(self.pos, self.line, self.col)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.current() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn scan_token(&mut self, ch: char, span: Span) -> Result<Token, LexError> {
        if ch.is_ascii_digit() {
            return self.scan_number(span);
        }
        if ch == '"' || ch == '\'' {
            return self.scan_string(ch, span);
        }
        if ch == '@' && matches!(self.peek_at(1), Some(c) if is_ident_start(c) || c == '"') {
            return self.scan_ref_prefix(span, true);
        }
        if ch == '$' {
            return self.scan_ref_prefix(span, false);
        }
        if ch == '#' {
            return self.scan_ref_prefix(span, false);
        }
        if is_ident_start(ch) {
            return self.scan_identifier(span);
        }
        self.scan_operator(ch, span)
    }

    fn scan_ref_prefix(&mut self, span: Span, allow_quoted_unit: bool) -> Result<Token, LexError> {
        let prefix = self.advance().expect("prefix char already peeked");
        if allow_quoted_unit && self.current() == Some('"') {
            let quote_span = self.current_span();
            let (text, lexeme) = self.scan_quoted_body('"', quote_span)?;
            return Ok(Token::new(
                TokenKind::UnitRef {
                    name: text,
                    quoted: true,
                },
                format!("@\"{lexeme}\""),
                span,
            ));
        }
        let start = self.pos;
        while let Some(c) = self.current() {
            if is_ident_continue(c) {
                self.advance();
            } else {
                break;
            }
        }
        let name: String = self.source[start..self.pos].iter().collect();
        let lexeme = format!("{prefix}{name}");
        let kind = match prefix {
            '@' => TokenKind::UnitRef {
                name,
                quoted: false,
            },
            '$' => TokenKind::VarRef(name),
            '#' => TokenKind::ConstRef(name),
            _ => unreachable!("scan_ref_prefix only called for @, $, #"),
        };
        Ok(Token::new(kind, lexeme, span))
    }

    fn scan_identifier(&mut self, span: Span) -> Result<Token, LexError> {
        let start = self.pos;
        while let Some(c) = self.current() {
            if is_ident_continue(c) {
                self.advance();
            } else {
                break;
            }
        }
        let text: String = self.source[start..self.pos].iter().collect();
        if text.chars().count() > self.max_identifier_length {
            return Err(LexError::IdentifierTooLong {
                max: self.max_identifier_length,
                span,
            });
        }
        Ok(Token::new(TokenKind::Identifier(text.clone()), text, span))
    }

    fn scan_number(&mut self, span: Span) -> Result<Token, LexError> {
        let start = self.pos;
        self.consume_digits();

        // Decimal vs range disambiguation (spec.md §4.1).
        if self.current() == Some('.') {
            match self.peek_at(1) {
                Some('.') => {
                    // Two dots: this is a RANGE token, not a decimal point.
                    // Stop here; the integer is complete.
                    let int_text: String = self.source[start..self.pos].iter().collect();
                    return self.finish_integer_or_rational(int_text, span);
                }
                Some(c) if c.is_ascii_digit() => {
                    self.advance(); // consume '.'
                    self.consume_digits();
                    return self.finish_decimal_or_scientific(start, span);
                }
                _ => {
                    let dot_span = self.current_span();
                    return Err(LexError::DotOutsideNumber { span: dot_span });
                }
            }
        }

        // Exponent directly on an integer, e.g. `3e10`.
        if matches!(self.current(), Some('e') | Some('E')) && self.exponent_lookahead_ok() {
            return self.finish_decimal_or_scientific(start, span);
        }

        let int_text: String = self.source[start..self.pos].iter().collect();
        self.finish_integer_or_rational(int_text, span)
    }

    fn exponent_lookahead_ok(&self) -> bool {
        let mut offset = 1;
        if matches!(self.peek_at(offset), Some('+') | Some('-')) {
            offset += 1;
        }
        matches!(self.peek_at(offset), Some(c) if c.is_ascii_digit())
    }

    fn consume_digits(&mut self) {
        while matches!(self.current(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn finish_decimal_or_scientific(&mut self, start: usize, span: Span) -> Result<Token, LexError> {
        let mut is_scientific = false;
        if matches!(self.current(), Some('e') | Some('E')) && self.exponent_lookahead_ok() {
            is_scientific = true;
            self.advance();
            if matches!(self.current(), Some('+') | Some('-')) {
                self.advance();
            }
            self.consume_digits();
        }
        let text: String = self.source[start..self.pos].iter().collect();
        let value: f64 = text
            .parse()
            .map_err(|_| LexError::MalformedNumber { span })?;
        let kind = if is_scientific {
            TokenKind::Scientific(value)
        } else {
            TokenKind::Decimal(value)
        };
        Ok(Token::new(kind, text, span))
    }

    /// Having scanned a bare digit run, checks whether it continues as a
    /// `n/m` rational literal: the `/` must be immediately adjacent (no
    /// whitespace) and immediately followed by another digit run.
    fn finish_integer_or_rational(&mut self, int_text: String, span: Span) -> Result<Token, LexError> {
        if self.current() == Some('/') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            self.advance(); // consume '/'
            let den_start = self.pos;
            self.consume_digits();
            let den_text: String = self.source[den_start..self.pos].iter().collect();
            let numerator: BigInt = int_text.parse().map_err(|_| LexError::MalformedNumber { span })?;
            let denominator: BigInt = den_text.parse().map_err(|_| LexError::MalformedNumber { span })?;
            let lexeme = format!("{int_text}/{den_text}");
            // `m = 0` is accepted at parse time and deferred to an
            // evaluation-time DomainError (spec.md §4.5, §9 open question):
            // the zero denominator must survive past the lexer, since
            // `Rational::new` refuses to construct one.
            if denominator == BigInt::from(0) {
                return Ok(Token::new(TokenKind::InvalidRational, lexeme, span));
            }
            let rational = Rational::new(numerator, denominator).expect("denominator checked nonzero above");
            return Ok(Token::new(TokenKind::Rational(rational), lexeme, span));
        }
        let numerator: BigInt = int_text.parse().map_err(|_| LexError::MalformedNumber { span })?;
        let value = Rational::from_bigint(numerator);
        Ok(Token::new(TokenKind::Integer(value), int_text, span))
    }

    fn scan_string(&mut self, quote: char, span: Span) -> Result<Token, LexError> {
        self.advance(); // consume opening quote
        let (text, _lexeme) = self.scan_quoted_body(quote, span)?;
        Ok(Token::new(TokenKind::StringLit(text.clone()), format!("{quote}{text}{quote}"), span))
    }

    /// Scans the body of a quoted run up to (and consuming) the closing
    /// quote. No escape sequences are recognized beyond the closing quote
    /// itself (spec.md §4.1).
    fn scan_quoted_body(&mut self, quote: char, span: Span) -> Result<(String, String), LexError> {
        let start = self.pos;
        loop {
            match self.current() {
                None => return Err(LexError::UnterminatedString { span }),
                Some(c) if c == quote => {
                    let text: String = self.source[start..self.pos].iter().collect();
                    self.advance();
                    return Ok((text.clone(), text));
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    fn scan_operator(&mut self, ch: char, span: Span) -> Result<Token, LexError> {
        self.advance();
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => {
                if self.current() == Some('>') {
                    self.advance();
                    TokenKind::Lambda
                } else {
                    TokenKind::Minus
                }
            }
            '*' => TokenKind::Multiply,
            '/' => TokenKind::Divide,
            '^' => TokenKind::Power,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            ':' => {
                if self.current() == Some('=') {
                    self.advance();
                    TokenKind::Assign
                } else {
                    TokenKind::Colon
                }
            }
            '!' => {
                if self.current() == Some('!') {
                    self.advance();
                    TokenKind::DoubleFactorial
                } else if self.current() == Some('=') {
                    self.advance();
                    TokenKind::Neq
                } else {
                    TokenKind::Factorial
                }
            }
            '%' => TokenKind::Percent,
            '<' => {
                if self.current() == Some('=') {
                    self.advance();
                    TokenKind::Lte
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.current() == Some('=') {
                    self.advance();
                    TokenKind::Gte
                } else {
                    TokenKind::Gt
                }
            }
            '=' => {
                if self.current() == Some('=') {
                    self.advance();
                    TokenKind::Eq
                } else {
                    return Err(LexError::BareEquals { span });
                }
            }
            '&' => {
                if self.current() == Some('&') {
                    self.advance();
                    TokenKind::And
                } else {
                    return Err(LexError::UnknownChar { ch, span });
                }
            }
            '|' => {
                if self.current() == Some('|') {
                    self.advance();
                    TokenKind::Or
                } else {
                    return Err(LexError::UnknownChar { ch, span });
                }
            }
            '.' => {
                if self.current() == Some('.') {
                    self.advance();
                    TokenKind::Range
                } else {
                    return Err(LexError::DotOutsideNumber { span });
                }
            }
            '@' => TokenKind::At,
            _ => return Err(LexError::UnknownChar { ch, span }),
        };
        let lexeme = lexeme_for(&kind);
        Ok(Token::new(kind, lexeme, span))
    }
}

fn lexeme_for(kind: &TokenKind) -> &'static str {
    match kind {
        TokenKind::Plus => "+",
        TokenKind::Minus => "-",
        TokenKind::Multiply => "*",
        TokenKind::Divide => "/",
        TokenKind::Power => "^",
        TokenKind::LParen => "(",
        TokenKind::RParen => ")",
        TokenKind::LBrace => "{",
        TokenKind::RBrace => "}",
        TokenKind::LBracket => "[",
        TokenKind::RBracket => "]",
        TokenKind::Comma => ",",
        TokenKind::Semicolon => ";",
        TokenKind::Colon => ":",
        TokenKind::Assign => ":=",
        TokenKind::Factorial => "!",
        TokenKind::DoubleFactorial => "!!",
        TokenKind::Neq => "!=",
        TokenKind::Percent => "%",
        TokenKind::Lt => "<",
        TokenKind::Lte => "<=",
        TokenKind::Gt => ">",
        TokenKind::Gte => ">=",
        TokenKind::Eq => "==",
        TokenKind::And => "&&",
        TokenKind::Or => "||",
        TokenKind::Range => "..",
        TokenKind::Lambda => "->",
        TokenKind::At => "@",
        _ => "",
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

fn is_ident_continue(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn integer_and_whitespace() {
        let kinds = kinds("12 + 3");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Integer(Rational::from_i64(12)),
                TokenKind::Plus,
                TokenKind::Integer(Rational::from_i64(3)),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn rational_literal_requires_no_surrounding_whitespace() {
        assert_eq!(
            kinds("3/4"),
            vec![
                TokenKind::Rational(Rational::new(3.into(), 4.into()).unwrap()),
                TokenKind::Eof
            ]
        );
        assert_eq!(
            kinds("3 / 4"),
            vec![
                TokenKind::Integer(Rational::from_i64(3)),
                TokenKind::Divide,
                TokenKind::Integer(Rational::from_i64(4)),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn zero_denominator_rational_literal_is_kept_distinct_not_silently_fixed_up() {
        assert_eq!(kinds("5/0"), vec![TokenKind::InvalidRational, TokenKind::Eof]);
    }

    #[test]
    fn dotdot_after_integer_is_a_range_not_a_decimal() {
        assert_eq!(
            kinds("1..5"),
            vec![
                TokenKind::Integer(Rational::from_i64(1)),
                TokenKind::Range,
                TokenKind::Integer(Rational::from_i64(5)),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn decimal_and_scientific_numbers() {
        assert_eq!(kinds("3.14"), vec![TokenKind::Decimal(3.14), TokenKind::Eof]);
        assert_eq!(
            kinds("2e10"),
            vec![TokenKind::Scientific(2e10), TokenKind::Eof]
        );
    }

    #[test]
    fn reference_prefixes() {
        assert_eq!(
            kinds("@km $x #pi"),
            vec![
                TokenKind::UnitRef {
                    name: "km".into(),
                    quoted: false
                },
                TokenKind::VarRef("x".into()),
                TokenKind::ConstRef("pi".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn quoted_unit_ref() {
        assert_eq!(
            kinds("@\"km/h\""),
            vec![
                TokenKind::UnitRef {
                    name: "km/h".into(),
                    quoted: true
                },
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn multi_char_operators_disambiguate_on_one_char_lookahead() {
        assert_eq!(kinds(":="), vec![TokenKind::Assign, TokenKind::Eof]);
        assert_eq!(kinds(":"), vec![TokenKind::Colon, TokenKind::Eof]);
        assert_eq!(kinds("!!"), vec![TokenKind::DoubleFactorial, TokenKind::Eof]);
        assert_eq!(kinds("!="), vec![TokenKind::Neq, TokenKind::Eof]);
        assert_eq!(kinds("!"), vec![TokenKind::Factorial, TokenKind::Eof]);
        assert_eq!(kinds("->"), vec![TokenKind::Lambda, TokenKind::Eof]);
    }

    #[test]
    fn bare_equals_is_rejected() {
        let err = Lexer::new("x = 1").tokenize().unwrap_err();
        assert!(matches!(err, LexError::BareEquals { .. }));
    }

    #[test]
    fn unterminated_string_is_rejected() {
        let err = Lexer::new("\"abc").tokenize().unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString { .. }));
    }

    #[test]
    fn position_tracking_across_newlines() {
        let tokens = Lexer::new("1\n22").tokenize().unwrap();
        assert_eq!(tokens[0].span.line, 1);
        assert_eq!(tokens[1].span.line, 2);
        assert_eq!(tokens[1].span.col, 1);
    }
}
