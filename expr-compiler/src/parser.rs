//! Recursive-descent parser (spec.md §4.5): a fixed precedence chain, each
//! level parsing the next level then looping on its own operators, with
//! integer-cursor save/restore for assignment, lambda, and function-def
//! lookahead.

use expr_core::Span;
use thiserror::Error;

use crate::ast::{BinOp, Node, SliceArg, UnaryOp};
use crate::tokens::{Token, TokenKind};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected token '{found}' at {span}, expected {expected}")]
    Unexpected {
        found: String,
        expected: String,
        span: Span,
    },
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEof { expected: String },
    #[error("unclosed '{open}' opened at {span}")]
    UnclosedBracket { open: &'static str, span: Span },
    #[error("inconsistent matrix row length at {span}: expected {expected}, found {found}")]
    InconsistentMatrixRows {
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("empty expression where an expression is required at {span}")]
    EmptyExpression { span: Span },
    #[error("illegal assignment target at {span}")]
    IllegalAssignmentTarget { span: Span },
}

/// Exposes `peek`/`advance`/`check`/`expect` plus a save/restore pair over a
/// single integer cursor into an immutable token vector (spec.md §4.5, §9
/// "Lookahead with backtracking": never copy tokens).
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    pub fn parse(tokens: Vec<Token>) -> PResult<Node> {
        let mut parser = Self::new(tokens);
        let first_span = parser.peek().span;
        let mut statements = Vec::new();
        loop {
            if parser.check(&TokenKind::Eof) {
                break;
            }
            statements.push(parser.parse_assignment()?);
            if parser.check(&TokenKind::Semicolon) {
                parser.advance();
                if parser.check(&TokenKind::Eof) {
                    break; // trailing semicolon is allowed
                }
                continue;
            }
            break;
        }
        parser.expect_kind(&TokenKind::Eof, "end of input")?;
        match statements.len() {
            1 => Ok(statements.into_iter().next().unwrap()),
            _ => Ok(Node::Sequence(statements, first_span)),
        }
    }

    // --- token stream primitives ---

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_n(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn save(&self) -> usize {
        self.pos
    }

    fn restore(&mut self, mark: usize) {
        self.pos = mark;
    }

    fn expect_kind(&mut self, kind: &TokenKind, expected: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else if self.check(&TokenKind::Eof) {
            Err(ParseError::UnexpectedEof {
                expected: expected.to_string(),
            })
        } else {
            let tok = self.peek().clone();
            Err(ParseError::Unexpected {
                found: tok.lexeme.clone(),
                expected: expected.to_string(),
                span: tok.span,
            })
        }
    }

    /// Like `expect_kind`, but for a bracket's matching close: reaching
    /// `Eof` first means the bracket opened at `open_span` was never closed,
    /// which gets its own `UnclosedBracket` diagnostic instead of the
    /// generic "expected end of input" one.
    fn expect_closing(&mut self, kind: &TokenKind, expected: &str, open: &'static str, open_span: Span) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else if self.check(&TokenKind::Eof) {
            Err(ParseError::UnclosedBracket { open, span: open_span })
        } else {
            let tok = self.peek().clone();
            Err(ParseError::Unexpected {
                found: tok.lexeme.clone(),
                expected: expected.to_string(),
                span: tok.span,
            })
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let tok = self.peek().clone();
        if matches!(tok.kind, TokenKind::Eof) {
            ParseError::UnexpectedEof {
                expected: expected.to_string(),
            }
        } else {
            ParseError::Unexpected {
                found: tok.lexeme,
                expected: expected.to_string(),
                span: tok.span,
            }
        }
    }

    // --- Assignment (lowest precedence) ---

    fn parse_assignment(&mut self) -> PResult<Node> {
        if let TokenKind::Identifier(name) = self.peek().kind.clone() {
            let mark = self.save();
            let name_span = self.peek().span;
            self.advance();
            if self.check(&TokenKind::LParen) {
                if let Some(params) = self.try_scan_function_def_params() {
                    let paren_span = self.advance().span; // '('
                    let params = self.parse_param_list(params.len())?;
                    self.expect_closing(&TokenKind::RParen, "')'", "(", paren_span)?;
                    self.expect_kind(&TokenKind::Assign, "':='")?;
                    let body = self.parse_assignment()?;
                    return Ok(Node::FunctionDef {
                        name: Some(name),
                        params,
                        body: Box::new(body),
                        span: name_span,
                    });
                }
            } else if self.check(&TokenKind::Assign) {
                self.advance();
                let value = self.parse_assignment()?;
                return Ok(Node::Assignment {
                    name,
                    value: Box::new(value),
                    span: name_span,
                });
            }
            self.restore(mark);
        }
        let expr = self.parse_lambda()?;
        if self.check(&TokenKind::Assign) {
            return Err(ParseError::IllegalAssignmentTarget { span: expr.span() });
        }
        Ok(expr)
    }

    /// Peeks (without consuming) whether `(` begins a `(params) :=` function
    /// definition: a balanced-paren scan for `:=` immediately after the
    /// matching `)`. Returns the raw param tokens' count placeholder only to
    /// signal success; actual params are parsed afterward.
    fn try_scan_function_def_params(&self) -> Option<Vec<()>> {
        let mut depth = 0usize;
        let mut j = self.pos;
        let mut params = Vec::new();
        while j < self.tokens.len() {
            match &self.tokens[j].kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return match self.tokens.get(j + 1).map(|t| &t.kind) {
                            Some(TokenKind::Assign) => Some(params),
                            _ => None,
                        };
                    }
                }
                _ if depth == 1 => params.push(()),
                _ => {}
            }
            j += 1;
        }
        None
    }

    fn parse_param_list(&mut self, _hint: usize) -> PResult<Vec<String>> {
        let mut params = Vec::new();
        if self.check(&TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let name = self.expect_param_name()?;
            params.push(name);
            if self.check(&TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(params)
    }

    fn expect_param_name(&mut self) -> PResult<String> {
        let name = param_name_of(&self.peek().kind);
        match name {
            Some(n) => {
                self.advance();
                Ok(n)
            }
            None => Err(self.unexpected("a parameter name")),
        }
    }

    // --- Lambda ---

    fn parse_lambda(&mut self) -> PResult<Node> {
        if let TokenKind::Identifier(name) = self.peek().kind.clone() {
            let mark = self.save();
            let span = self.peek().span;
            self.advance();
            if self.check(&TokenKind::Lambda) {
                self.advance();
                let body = self.parse_lambda()?;
                return Ok(Node::FunctionDef {
                    name: None,
                    params: vec![name],
                    body: Box::new(body),
                    span,
                });
            }
            self.restore(mark);
        }
        self.parse_or()
    }

    // --- Logical or/xor/and ---

    fn parse_or(&mut self) -> PResult<Node> {
        let mut left = self.parse_xor()?;
        while self.check(&TokenKind::Or) {
            let span = self.advance().span;
            let right = self.parse_xor()?;
            left = Node::Binary {
                op: BinOp::Or,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    fn parse_xor(&mut self) -> PResult<Node> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::Xor) {
            let span = self.advance().span;
            let right = self.parse_and()?;
            left = Node::Binary {
                op: BinOp::Xor,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Node> {
        let mut left = self.parse_equality()?;
        while self.check(&TokenKind::And) {
            let span = self.advance().span;
            let right = self.parse_equality()?;
            left = Node::Binary {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    // --- Equality / Range / Relational ---

    fn parse_equality(&mut self) -> PResult<Node> {
        let mut left = self.parse_range()?;
        loop {
            let op = if self.check(&TokenKind::Eq) {
                BinOp::Eq
            } else if self.check(&TokenKind::Neq) {
                BinOp::Neq
            } else {
                break;
            };
            let span = self.advance().span;
            let right = self.parse_range()?;
            left = Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    /// Non-associative: at most one `..` per level, with an optional
    /// `step` clause parsed at the unary level (spec.md §4.5 "Range").
    fn parse_range(&mut self) -> PResult<Node> {
        let start = self.parse_relational()?;
        if self.check(&TokenKind::Range) {
            let span = self.advance().span;
            let end = self.parse_relational()?;
            let step = if self.check(&TokenKind::Step) {
                self.advance();
                Some(Box::new(self.parse_unary()?))
            } else {
                None
            };
            return Ok(Node::RangeExpr {
                start: Box::new(start),
                end: Box::new(end),
                step,
                span,
            });
        }
        Ok(start)
    }

    fn parse_relational(&mut self) -> PResult<Node> {
        let mut left = self.parse_additive()?;
        loop {
            let op = if self.check(&TokenKind::Lt) {
                BinOp::Lt
            } else if self.check(&TokenKind::Gt) {
                BinOp::Gt
            } else if self.check(&TokenKind::Lte) {
                BinOp::Lte
            } else if self.check(&TokenKind::Gte) {
                BinOp::Gte
            } else {
                break;
            };
            let span = self.advance().span;
            let right = self.parse_additive()?;
            left = Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> PResult<Node> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = if self.check(&TokenKind::Plus) {
                BinOp::Add
            } else if self.check(&TokenKind::Minus) {
                BinOp::Sub
            } else {
                break;
            };
            let span = self.advance().span;
            let right = self.parse_multiplicative()?;
            left = Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span,
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> PResult<Node> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.check(&TokenKind::Multiply) {
                BinOp::Mul
            } else if self.check(&TokenKind::Divide) {
                BinOp::Div
            } else if self.check(&TokenKind::Mod) {
                BinOp::Mod
            } else if self.check(&TokenKind::Of) {
                BinOp::Of
            } else if self.check(&TokenKind::At) {
                BinOp::MatMul
            } else {
                break;
            };
            let op_tok = self.advance();
            let right = self.parse_unary()?;
            // The implicit-multiplication inserter emits a `Multiply` token
            // with an empty lexeme (spec.md §4.4); a bare identifier directly
            // adjacent to a value through one of those is a postfix-unit
            // candidate, where a unit must win over a same-named variable
            // (spec.md §4.10.1) — written out explicitly (`3 * meters`) the
            // identifier stays an ordinary `Variable`.
            let right = match right {
                Node::Variable(name, var_span) if op == BinOp::Mul && op_tok.lexeme.is_empty() => Node::PostfixUnit(name, var_span),
                other => other,
            };
            left = Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: op_tok.span,
            };
        }
        Ok(left)
    }

    // --- Unary / Power ---

    /// Recurses into itself on `-`/`+`/`not`; otherwise falls to `parsePower`.
    fn parse_unary(&mut self) -> PResult<Node> {
        let op = if self.check(&TokenKind::Minus) {
            Some(UnaryOp::Neg)
        } else if self.check(&TokenKind::Plus) {
            Some(UnaryOp::Pos)
        } else if self.check(&TokenKind::Not) {
            Some(UnaryOp::Not)
        } else {
            None
        };
        if let Some(op) = op {
            let span = self.advance().span;
            let operand = self.parse_unary()?;
            return Ok(Node::Unary {
                op,
                operand: Box::new(operand),
                prefix: true,
                span,
            });
        }
        self.parse_power()
    }

    /// Parses one postfix expression; if `^` follows, the right-hand side is
    /// parsed by calling `parse_unary` again so `2^-3` is valid and chained
    /// powers associate right (`2^3^2` = `2^(3^2)`).
    fn parse_power(&mut self) -> PResult<Node> {
        let left = self.parse_postfix()?;
        if self.check(&TokenKind::Power) {
            let span = self.advance().span;
            let right = self.parse_unary()?;
            return Ok(Node::Binary {
                op: BinOp::Pow,
                left: Box::new(left),
                right: Box::new(right),
                span,
            });
        }
        Ok(left)
    }

    // --- Postfix chain ---

    fn parse_postfix(&mut self) -> PResult<Node> {
        let mut expr = self.parse_call_subscript()?;
        loop {
            if self.check(&TokenKind::Factorial) {
                let span = self.advance().span;
                expr = Node::Unary {
                    op: UnaryOp::Factorial,
                    operand: Box::new(expr),
                    prefix: false,
                    span,
                };
            } else if self.check(&TokenKind::DoubleFactorial) {
                let span = self.advance().span;
                expr = Node::Unary {
                    op: UnaryOp::DoubleFactorial,
                    operand: Box::new(expr),
                    prefix: false,
                    span,
                };
            } else if self.check(&TokenKind::Percent) {
                let span = self.advance().span;
                expr = Node::Unary {
                    op: UnaryOp::PercentOp,
                    operand: Box::new(expr),
                    prefix: false,
                    span,
                };
            } else if self.check(&TokenKind::In) || self.check(&TokenKind::To) || self.check(&TokenKind::As) {
                let span = self.advance().span;
                let unit_name = self.expect_unit_name()?;
                expr = Node::UnitConversion {
                    value: Box::new(expr),
                    target_unit: unit_name,
                    span,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn expect_unit_name(&mut self) -> PResult<String> {
        match self.peek().kind.clone() {
            TokenKind::Identifier(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("a unit name")),
        }
    }

    // --- Call / Subscript ---

    fn parse_call_subscript(&mut self) -> PResult<Node> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.check(&TokenKind::LParen) {
                let span = self.advance().span;
                let args = self.parse_call_args()?;
                self.expect_closing(&TokenKind::RParen, "')'", "(", span)?;
                expr = Node::Call {
                    callee: Box::new(expr),
                    args,
                    span,
                };
            } else if self.check(&TokenKind::LBracket) {
                let span = self.advance().span;
                let indices = self.parse_slice_args()?;
                self.expect_closing(&TokenKind::RBracket, "']'", "[", span)?;
                expr = Node::Subscript {
                    target: Box::new(expr),
                    indices,
                    span,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> PResult<Vec<Node>> {
        let mut args = Vec::new();
        if self.check(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_assignment()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(args)
    }

    fn parse_slice_args(&mut self) -> PResult<Vec<SliceArg>> {
        let mut indices = Vec::new();
        if self.check(&TokenKind::RBracket) {
            return Ok(indices);
        }
        loop {
            indices.push(self.parse_slice_arg()?);
            if self.check(&TokenKind::Comma) {
                self.advance();
                continue;
            }
            break;
        }
        Ok(indices)
    }

    fn parse_slice_arg(&mut self) -> PResult<SliceArg> {
        let start = if self.check(&TokenKind::Colon) || self.check(&TokenKind::Comma) || self.check(&TokenKind::RBracket) {
            None
        } else {
            Some(self.parse_assignment()?)
        };
        if self.check(&TokenKind::Colon) {
            self.advance();
            let end = if self.check(&TokenKind::Comma) || self.check(&TokenKind::RBracket) {
                None
            } else {
                Some(self.parse_assignment()?)
            };
            Ok(SliceArg {
                start,
                end,
                is_range: true,
            })
        } else {
            Ok(SliceArg {
                start,
                end: None,
                is_range: false,
            })
        }
    }

    // --- Primary ---

    fn parse_primary(&mut self) -> PResult<Node> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Integer(ref r) | TokenKind::Rational(ref r) => {
                self.advance();
                Ok(Node::NumberLit(r.clone(), tok.span))
            }
            TokenKind::InvalidRational => {
                self.advance();
                Ok(Node::ZeroDenominatorLit(tok.lexeme.clone(), tok.span))
            }
            TokenKind::Decimal(v) | TokenKind::Scientific(v) => {
                self.advance();
                Ok(Node::DoubleLit(v, tok.span))
            }
            TokenKind::StringLit(ref s) => {
                self.advance();
                Ok(Node::StringLit(s.clone(), tok.span))
            }
            TokenKind::Identifier(ref name) | TokenKind::Function(ref name) => {
                self.advance();
                Ok(Node::Variable(name.clone(), tok.span))
            }
            TokenKind::True => {
                self.advance();
                Ok(Node::Variable("true".to_string(), tok.span))
            }
            TokenKind::False => {
                self.advance();
                Ok(Node::Variable("false".to_string(), tok.span))
            }
            // `if` is reclassified out of `Identifier` by the classifier
            // (it doubles as the comprehension-condition keyword), but as a
            // primary it still needs to read as a callable name so
            // `if(cond, then, else)` parses through the ordinary call chain.
            TokenKind::If => {
                self.advance();
                Ok(Node::Variable("if".to_string(), tok.span))
            }
            TokenKind::UnitRef { ref name, quoted } => {
                self.advance();
                Ok(Node::UnitRef {
                    name: name.clone(),
                    quoted,
                    span: tok.span,
                })
            }
            TokenKind::VarRef(ref name) => {
                self.advance();
                Ok(Node::VarRef(name.clone(), tok.span))
            }
            TokenKind::ConstRef(ref name) => {
                self.advance();
                Ok(Node::ConstRef(name.clone(), tok.span))
            }
            TokenKind::LParen => self.parse_paren_group(),
            TokenKind::LBrace => self.parse_brace_group(),
            TokenKind::LBracket => self.parse_matrix(),
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_paren_group(&mut self) -> PResult<Node> {
        let open_span = self.peek().span;
        if let Some(params) = self.try_scan_multi_param_lambda() {
            self.advance(); // '('
            let parsed_params = self.parse_param_list(params.len())?;
            self.expect_closing(&TokenKind::RParen, "')'", "(", open_span)?;
            self.expect_kind(&TokenKind::Lambda, "'->'")?;
            let body = self.parse_lambda()?;
            return Ok(Node::FunctionDef {
                name: None,
                params: parsed_params,
                body: Box::new(body),
                span: open_span,
            });
        }
        self.advance(); // '('
        if self.check(&TokenKind::RParen) {
            return Err(ParseError::EmptyExpression { span: open_span });
        }
        let first = self.parse_assignment()?;
        if self.check(&TokenKind::Semicolon) {
            let mut statements = vec![first];
            while self.check(&TokenKind::Semicolon) {
                self.advance();
                if self.check(&TokenKind::RParen) {
                    break; // trailing semicolon
                }
                statements.push(self.parse_assignment()?);
            }
            self.expect_closing(&TokenKind::RParen, "')'", "(", open_span)?;
            return Ok(Node::Sequence(statements, open_span));
        }
        self.expect_closing(&TokenKind::RParen, "')'", "(", open_span)?;
        Ok(first)
    }

    /// Lookahead for `( id (, id)* ) ->` without consuming anything unless
    /// it actually matches.
    fn try_scan_multi_param_lambda(&self) -> Option<Vec<()>> {
        let mut j = self.pos + 1; // first token after '('
        let mut params = Vec::new();
        if matches!(self.tokens.get(j).map(|t| &t.kind), Some(TokenKind::RParen)) {
            // `() -> body`
            return match self.tokens.get(j + 1).map(|t| &t.kind) {
                Some(TokenKind::Lambda) => Some(params),
                _ => None,
            };
        }
        loop {
            match self.tokens.get(j).map(|t| &t.kind) {
                Some(kind) if param_name_of(kind).is_some() => params.push(()),
                _ => return None,
            }
            j += 1;
            match self.tokens.get(j).map(|t| &t.kind) {
                Some(TokenKind::Comma) => {
                    j += 1;
                    continue;
                }
                Some(TokenKind::RParen) => break,
                _ => return None,
            }
        }
        match self.tokens.get(j + 1).map(|t| &t.kind) {
            Some(TokenKind::Lambda) => Some(params),
            _ => None,
        }
    }

    fn parse_brace_group(&mut self) -> PResult<Node> {
        let span = self.advance().span; // '{'
        if self.check(&TokenKind::RBrace) {
            self.advance();
            return Ok(Node::Vector(Vec::new(), span));
        }
        let first = self.parse_assignment()?;
        if self.check(&TokenKind::For) {
            let mut iterators = Vec::new();
            while self.check(&TokenKind::For) {
                self.advance();
                let var_name = self.expect_param_name()?;
                self.expect_kind(&TokenKind::In, "'in'")?;
                let iterable = self.parse_assignment()?;
                iterators.push((var_name, iterable));
            }
            let condition = if self.check(&TokenKind::If) {
                self.advance();
                Some(Box::new(self.parse_assignment()?))
            } else {
                None
            };
            self.expect_closing(&TokenKind::RBrace, "'}'", "{", span)?;
            return Ok(Node::Comprehension {
                expr: Box::new(first),
                iterators,
                condition,
                span,
            });
        }
        let mut elements = vec![first];
        while self.check(&TokenKind::Comma) {
            self.advance();
            elements.push(self.parse_assignment()?);
        }
        self.expect_closing(&TokenKind::RBrace, "'}'", "{", span)?;
        Ok(Node::Vector(elements, span))
    }

    fn parse_matrix(&mut self) -> PResult<Node> {
        let span = self.advance().span; // '['
        if self.check(&TokenKind::RBracket) {
            self.advance();
            return Ok(Node::Matrix(Vec::new(), span));
        }
        if self.check(&TokenKind::LBracket) {
            let mut rows = Vec::new();
            loop {
                let row_open = self.expect_kind(&TokenKind::LBracket, "'['")?.span;
                rows.push(self.parse_row_until(&TokenKind::RBracket)?);
                self.expect_closing(&TokenKind::RBracket, "']'", "[", row_open)?;
                if self.check(&TokenKind::Comma) {
                    self.advance();
                    continue;
                }
                break;
            }
            self.expect_closing(&TokenKind::RBracket, "']'", "[", span)?;
            self.check_rectangular(&rows, span)?;
            return Ok(Node::Matrix(rows, span));
        }
        let mut rows = vec![self.parse_row_until(&TokenKind::Semicolon)?];
        while self.check(&TokenKind::Semicolon) {
            self.advance();
            rows.push(self.parse_row_until(&TokenKind::Semicolon)?);
        }
        self.expect_closing(&TokenKind::RBracket, "']'", "[", span)?;
        self.check_rectangular(&rows, span)?;
        Ok(Node::Matrix(rows, span))
    }

    /// Parses a comma-separated row, stopping before `;`, `]`, or `stop`.
    fn parse_row_until(&mut self, _stop: &TokenKind) -> PResult<Vec<Node>> {
        let mut row = vec![self.parse_assignment()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            row.push(self.parse_assignment()?);
        }
        Ok(row)
    }

    fn check_rectangular(&self, rows: &[Vec<Node>], span: Span) -> PResult<()> {
        if let Some(first_len) = rows.first().map(|r| r.len()) {
            for row in rows {
                if row.len() != first_len {
                    return Err(ParseError::InconsistentMatrixRows {
                        expected: first_len,
                        found: row.len(),
                        span,
                    });
                }
            }
        }
        Ok(())
    }
}

fn param_name_of(kind: &TokenKind) -> Option<String> {
    match kind {
        TokenKind::Identifier(n) | TokenKind::Function(n) => Some(n.clone()),
        TokenKind::To => Some("to".to_string()),
        TokenKind::As => Some("as".to_string()),
        TokenKind::For => Some("for".to_string()),
        TokenKind::In => Some("in".to_string()),
        TokenKind::If => Some("if".to_string()),
        TokenKind::Step => Some("step".to_string()),
        TokenKind::True => Some("true".to_string()),
        TokenKind::False => Some("false".to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::implicit_mul::insert_implicit_multiplication;
    use crate::lexer::Lexer;
    use std::collections::HashSet;

    fn try_parse(src: &str) -> PResult<Node> {
        let tokens = Lexer::new(src).tokenize().unwrap();
        let functions: HashSet<String> = ["sin", "sqrt"].iter().map(|s| s.to_string()).collect();
        let tokens = classify(tokens, &functions);
        let tokens = insert_implicit_multiplication(tokens);
        Parser::parse(tokens)
    }

    fn parse(src: &str) -> Node {
        try_parse(src).unwrap()
    }

    #[test]
    fn additive_and_multiplicative_precedence() {
        // a + b * c => +(a, *(b, c))
        let node = parse("a + b * c");
        match node {
            Node::Binary { op: BinOp::Add, right, .. } => {
                assert!(matches!(*right, Node::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("expected Add at top, got {other:?}"),
        }
    }

    #[test]
    fn multiplicative_binds_tighter_on_the_left_too() {
        // a * b + c => +(*(a, b), c)
        let node = parse("a * b + c");
        match node {
            Node::Binary { op: BinOp::Add, left, .. } => {
                assert!(matches!(*left, Node::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("expected Add at top, got {other:?}"),
        }
    }

    #[test]
    fn power_is_right_associative() {
        // 2^3^2 => ^(2, ^(3, 2))
        let node = parse("2^3^2");
        match node {
            Node::Binary { op: BinOp::Pow, right, .. } => {
                assert!(matches!(*right, Node::Binary { op: BinOp::Pow, .. }));
            }
            other => panic!("expected Pow at top, got {other:?}"),
        }
    }

    #[test]
    fn double_negation_nests_unary_negate() {
        let node = parse("--5");
        match node {
            Node::Unary { op: UnaryOp::Neg, operand, .. } => {
                assert!(matches!(*operand, Node::Unary { op: UnaryOp::Neg, .. }));
            }
            other => panic!("expected nested Neg, got {other:?}"),
        }
    }

    #[test]
    fn negative_power_right_operand_is_legal() {
        // 2^-3 should parse without error (right side goes through parseUnary).
        let node = parse("2^-3");
        assert!(matches!(node, Node::Binary { op: BinOp::Pow, .. }));
    }

    #[test]
    fn function_definition_with_params() {
        let node = parse("f(x, y) := x + y");
        match node {
            Node::FunctionDef { name, params, .. } => {
                assert_eq!(name, Some("f".to_string()));
                assert_eq!(params, vec!["x".to_string(), "y".to_string()]);
            }
            other => panic!("expected FunctionDef, got {other:?}"),
        }
    }

    #[test]
    fn single_identifier_lambda() {
        let node = parse("x -> x + 1");
        match node {
            Node::FunctionDef { name, params, .. } => {
                assert_eq!(name, None);
                assert_eq!(params, vec!["x".to_string()]);
            }
            other => panic!("expected FunctionDef, got {other:?}"),
        }
    }

    #[test]
    fn multi_param_lambda() {
        let node = parse("(x, y) -> x * y");
        match node {
            Node::FunctionDef { params, .. } => {
                assert_eq!(params, vec!["x".to_string(), "y".to_string()]);
            }
            other => panic!("expected FunctionDef, got {other:?}"),
        }
    }

    #[test]
    fn curried_lambda_returns_lambda() {
        let node = parse("x -> y -> x + y");
        match node {
            Node::FunctionDef { body, .. } => {
                assert!(matches!(*body, Node::FunctionDef { .. }));
            }
            other => panic!("expected nested FunctionDef, got {other:?}"),
        }
    }

    #[test]
    fn plain_parenthesized_expression_is_not_a_lambda() {
        let node = parse("(1 + 2) * 3");
        assert!(matches!(node, Node::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn range_with_step() {
        let node = parse("1..10 step 2");
        match node {
            Node::RangeExpr { step, .. } => assert!(step.is_some()),
            other => panic!("expected RangeExpr, got {other:?}"),
        }
    }

    #[test]
    fn assignment_is_right_associative_with_itself_as_value() {
        let node = parse("x := 5");
        assert!(matches!(node, Node::Assignment { .. }));
    }

    #[test]
    fn call_and_subscript_chain_left_associatively() {
        let node = parse("f(1)[0]");
        assert!(matches!(node, Node::Subscript { .. }));
    }

    #[test]
    fn vector_literal_and_comprehension() {
        assert!(matches!(parse("{1, 2, 3}"), Node::Vector(..)));
        let node = parse("{x for x in {1,2,3}}");
        assert!(matches!(node, Node::Comprehension { .. }));
    }

    #[test]
    fn matrix_literal_both_forms() {
        assert!(matches!(parse("[1, 2; 3, 4]"), Node::Matrix(..)));
        assert!(matches!(parse("[[1, 2], [3, 4]]"), Node::Matrix(..)));
    }

    #[test]
    fn inconsistent_matrix_rows_is_an_error() {
        let tokens = Lexer::new("[1, 2; 3]").tokenize().unwrap();
        let functions = HashSet::new();
        let tokens = classify(tokens, &functions);
        let tokens = insert_implicit_multiplication(tokens);
        let err = Parser::parse(tokens).unwrap_err();
        assert!(matches!(err, ParseError::InconsistentMatrixRows { .. }));
    }

    #[test]
    fn postfix_unit_conversion() {
        let node = parse("100 meters in feet");
        assert!(matches!(node, Node::UnitConversion { .. }));
    }

    #[test]
    fn sequence_of_statements() {
        let node = parse("x := 10; f(n) := n*n; f(x)");
        assert!(matches!(node, Node::Sequence(..)));
    }

    #[test]
    fn zero_denominator_literal_parses_to_a_distinct_node() {
        let node = parse("5/0");
        assert!(matches!(node, Node::ZeroDenominatorLit(lexeme, _) if lexeme == "5/0"));
    }

    #[test]
    fn identifier_adjacent_to_a_value_via_implicit_multiplication_is_a_postfix_unit() {
        let node = parse("3 meters");
        match node {
            Node::Binary { op: BinOp::Mul, right, .. } => {
                assert!(matches!(*right, Node::PostfixUnit(name, _) if name == "meters"));
            }
            other => panic!("expected Mul at top, got {other:?}"),
        }
    }

    #[test]
    fn identifier_after_an_explicit_star_stays_a_plain_variable() {
        let node = parse("3 * meters");
        match node {
            Node::Binary { op: BinOp::Mul, right, .. } => {
                assert!(matches!(*right, Node::Variable(name, _) if name == "meters"));
            }
            other => panic!("expected Mul at top, got {other:?}"),
        }
    }

    #[test]
    fn assigning_to_a_non_identifier_is_an_illegal_assignment_target() {
        let err = try_parse("3 := 5").unwrap_err();
        assert!(matches!(err, ParseError::IllegalAssignmentTarget { .. }));

        let err = try_parse("(x + 1) := 2").unwrap_err();
        assert!(matches!(err, ParseError::IllegalAssignmentTarget { .. }));
    }

    #[test]
    fn unclosed_parenthesis_reports_the_opening_span() {
        let err = try_parse("(1 + 2").unwrap_err();
        match err {
            ParseError::UnclosedBracket { open, .. } => assert_eq!(open, "("),
            other => panic!("expected UnclosedBracket, got {other:?}"),
        }
    }

    #[test]
    fn unclosed_vector_literal_reports_the_opening_brace() {
        let err = try_parse("{1, 2").unwrap_err();
        match err {
            ParseError::UnclosedBracket { open, .. } => assert_eq!(open, "{"),
            other => panic!("expected UnclosedBracket, got {other:?}"),
        }
    }

    #[test]
    fn unclosed_matrix_literal_reports_the_opening_bracket() {
        let err = try_parse("[1, 2").unwrap_err();
        match err {
            ParseError::UnclosedBracket { open, .. } => assert_eq!(open, "["),
            other => panic!("expected UnclosedBracket, got {other:?}"),
        }
    }
}
