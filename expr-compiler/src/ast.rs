//! The typed AST produced by the parser (spec.md §3.2).
//!
//! `Node` covers both literal/value-shaped forms and unevaluated expression
//! forms — the evaluator (in `expr-eval`) walks this same tree and produces
//! runtime `Value`s; the AST itself never holds a runtime value.

use expr_core::{Rational, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    // --- Value-shaped literals ---
    /// Covers both `INTEGER` (denominator 1) and explicit `n/m` `RATIONAL`
    /// literals — both are exact rationals by the time the parser sees them.
    NumberLit(Rational, Span),
    /// An `n/0` rational literal (the lexeme, e.g. `"5/0"`): accepted at
    /// parse time, raises a `DomainError` only if actually evaluated
    /// (spec.md §9 Open Question).
    ZeroDenominatorLit(String, Span),
    /// `DECIMAL` and `SCIENTIFIC` literals: inexact floating point.
    DoubleLit(f64, Span),
    StringLit(String, Span),
    /// Heterogeneous; elements may be unevaluated expressions.
    Vector(Vec<Node>, Span),
    /// Rectangular; every row must have identical length (checked by the
    /// parser when the literal is written out, spec.md §4.5 primary `[`).
    Matrix(Vec<Vec<Node>>, Span),

    // --- Expressions ---
    Binary {
        op: BinOp,
        left: Box<Node>,
        right: Box<Node>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
        prefix: bool,
        span: Span,
    },
    Call {
        callee: Box<Node>,
        args: Vec<Node>,
        span: Span,
    },
    Subscript {
        target: Box<Node>,
        indices: Vec<SliceArg>,
        span: Span,
    },
    Variable(String, Span),
    /// A bare identifier immediately adjacent to a value through implicit
    /// multiplication (e.g. the `meters` in `3 meters`): resolved with
    /// `ResolutionContext::PostfixUnit`, which lets a unit win over a
    /// same-named variable (spec.md §4.10.1). Written explicitly (`3 * meters`)
    /// the identifier stays a plain `Variable` instead.
    PostfixUnit(String, Span),
    UnitRef {
        name: String,
        quoted: bool,
        span: Span,
    },
    VarRef(String, Span),
    ConstRef(String, Span),
    Assignment {
        name: String,
        value: Box<Node>,
        span: Span,
    },
    FunctionDef {
        /// `None` for an anonymous lambda; `Some(name)` for `f(x) := ...`.
        name: Option<String>,
        params: Vec<String>,
        body: Box<Node>,
        span: Span,
    },
    RangeExpr {
        start: Box<Node>,
        end: Box<Node>,
        step: Option<Box<Node>>,
        span: Span,
    },
    UnitConversion {
        value: Box<Node>,
        target_unit: String,
        span: Span,
    },
    Comprehension {
        expr: Box<Node>,
        iterators: Vec<(String, Node)>,
        condition: Option<Box<Node>>,
        span: Span,
    },
    Sequence(Vec<Node>, Span),
}

impl Node {
    pub fn span(&self) -> Span {
        match self {
            Node::NumberLit(_, s)
            | Node::ZeroDenominatorLit(_, s)
            | Node::DoubleLit(_, s)
            | Node::StringLit(_, s)
            | Node::Vector(_, s)
            | Node::Matrix(_, s)
            | Node::Binary { span: s, .. }
            | Node::Unary { span: s, .. }
            | Node::Call { span: s, .. }
            | Node::Subscript { span: s, .. }
            | Node::Variable(_, s)
            | Node::PostfixUnit(_, s)
            | Node::UnitRef { span: s, .. }
            | Node::VarRef(_, s)
            | Node::ConstRef(_, s)
            | Node::Assignment { span: s, .. }
            | Node::FunctionDef { span: s, .. }
            | Node::RangeExpr { span: s, .. }
            | Node::UnitConversion { span: s, .. }
            | Node::Comprehension { span: s, .. }
            | Node::Sequence(_, s) => *s,
        }
    }
}

/// A subscript argument: `(start?, end?, is_range)` (spec.md §4.5, §4.10.3).
#[derive(Debug, Clone, PartialEq)]
pub struct SliceArg {
    pub start: Option<Node>,
    pub end: Option<Node>,
    pub is_range: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    Of,
    MatMul,
    Lt,
    Gt,
    Lte,
    Gte,
    Eq,
    Neq,
    And,
    Or,
    Xor,
}

/// A single enum covers both prefix (`-x`, `+x`, `not x`) and postfix
/// (`x!`, `x!!`, `x%`) unary operators; `Node::Unary::prefix` tells them
/// apart (spec.md §3.2 `Unary(op_token, operand, prefix:bool)`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
    Factorial,
    DoubleFactorial,
    PercentOp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_accessor_reads_through_every_variant() {
        let span = Span::new(3, 1, 4);
        let node = Node::Binary {
            op: BinOp::Add,
            left: Box::new(Node::NumberLit(Rational::from_i64(1), span)),
            right: Box::new(Node::NumberLit(Rational::from_i64(2), span)),
            span,
        };
        assert_eq!(node.span(), span);
    }
}
