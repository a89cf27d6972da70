//! Binary/unary operator tables (spec.md §4.7): one trait per arity, one
//! struct per operator, registered once into an immutable `OperatorTable`.
//!
//! Grounded in this workspace's `ToolDispatcher` trait-plus-registry shape
//! (`lumen-runtime/src/tools.rs`): a small trait exposing one dispatch
//! method, concrete implementors, collected into a `HashMap` built once at
//! construction and never mutated afterward.

use std::collections::HashMap;

use expr_core::{Rational, Span};

use crate::broadcast;
use crate::error::EvalError;
use crate::values::Value;
use expr_compiler::ast::{BinOp, UnaryOp};

/// `AND`/`OR` additionally accept a thunk for the right operand so the
/// table can express short-circuit without the evaluator special-casing
/// those two variants (spec.md §4.7); eager operators simply call `right()`
/// unconditionally.
pub trait BinaryOperator {
    fn execute(&self, left: &Value, right: &mut dyn FnMut() -> Result<Value, EvalError>, span: Span) -> Result<Value, EvalError>;
}

pub trait UnaryOperator {
    fn execute(&self, operand: &Value, span: Span) -> Result<Value, EvalError>;
}

pub struct OperatorTable {
    binary: HashMap<BinOp, Box<dyn BinaryOperator>>,
    unary: HashMap<UnaryOp, Box<dyn UnaryOperator>>,
}

impl OperatorTable {
    pub fn new() -> Self {
        let mut binary: HashMap<BinOp, Box<dyn BinaryOperator>> = HashMap::new();
        binary.insert(BinOp::Add, Box::new(Add));
        binary.insert(BinOp::Sub, Box::new(Sub));
        binary.insert(BinOp::Mul, Box::new(Mul));
        binary.insert(BinOp::Div, Box::new(Div));
        binary.insert(BinOp::Pow, Box::new(Pow));
        binary.insert(BinOp::Mod, Box::new(Mod));
        binary.insert(BinOp::Of, Box::new(Of));
        binary.insert(BinOp::MatMul, Box::new(MatMul));
        binary.insert(BinOp::Lt, Box::new(Lt));
        binary.insert(BinOp::Gt, Box::new(Gt));
        binary.insert(BinOp::Lte, Box::new(Lte));
        binary.insert(BinOp::Gte, Box::new(Gte));
        binary.insert(BinOp::Eq, Box::new(Eq));
        binary.insert(BinOp::Neq, Box::new(Neq));
        binary.insert(BinOp::And, Box::new(And));
        binary.insert(BinOp::Or, Box::new(Or));
        binary.insert(BinOp::Xor, Box::new(Xor));

        let mut unary: HashMap<UnaryOp, Box<dyn UnaryOperator>> = HashMap::new();
        unary.insert(UnaryOp::Neg, Box::new(Neg));
        unary.insert(UnaryOp::Pos, Box::new(Pos));
        unary.insert(UnaryOp::Not, Box::new(Not));
        unary.insert(UnaryOp::Factorial, Box::new(Factorial));
        unary.insert(UnaryOp::DoubleFactorial, Box::new(DoubleFactorial));
        unary.insert(UnaryOp::PercentOp, Box::new(PercentOp));

        Self { binary, unary }
    }

    pub fn binary(&self, op: BinOp) -> &dyn BinaryOperator {
        self.binary[&op].as_ref()
    }

    pub fn unary(&self, op: UnaryOp) -> &dyn UnaryOperator {
        self.unary[&op].as_ref()
    }
}

impl Default for OperatorTable {
    fn default() -> Self {
        Self::new()
    }
}

// --- arithmetic: thin wrappers over the broadcasting engine ---

macro_rules! eager_broadcast_op {
    ($name:ident, $func:path) => {
        struct $name;
        impl BinaryOperator for $name {
            fn execute(&self, left: &Value, right: &mut dyn FnMut() -> Result<Value, EvalError>, span: Span) -> Result<Value, EvalError> {
                $func(left, &right()?, span)
            }
        }
    };
}

eager_broadcast_op!(Add, broadcast::add);
eager_broadcast_op!(Sub, broadcast::sub);
eager_broadcast_op!(Mul, broadcast::mul);
eager_broadcast_op!(Div, broadcast::div);
eager_broadcast_op!(Pow, broadcast::pow);
eager_broadcast_op!(Mod, broadcast::modulo);
eager_broadcast_op!(Of, broadcast::of);

// --- relational/equality ---

fn require_orderable(left: &Value, right: &Value, span: Span) -> Result<std::cmp::Ordering, EvalError> {
    if !left.is_scalar() || !right.is_scalar() {
        return Err(EvalError::type_error("ordering is not defined on vectors or matrices", span));
    }
    broadcast::compare_scalars(left, right, span)
}

struct Lt;
impl BinaryOperator for Lt {
    fn execute(&self, left: &Value, right: &mut dyn FnMut() -> Result<Value, EvalError>, span: Span) -> Result<Value, EvalError> {
        Ok(Value::Boolean(require_orderable(left, &right()?, span)? == std::cmp::Ordering::Less))
    }
}

struct Gt;
impl BinaryOperator for Gt {
    fn execute(&self, left: &Value, right: &mut dyn FnMut() -> Result<Value, EvalError>, span: Span) -> Result<Value, EvalError> {
        Ok(Value::Boolean(require_orderable(left, &right()?, span)? == std::cmp::Ordering::Greater))
    }
}

struct Lte;
impl BinaryOperator for Lte {
    fn execute(&self, left: &Value, right: &mut dyn FnMut() -> Result<Value, EvalError>, span: Span) -> Result<Value, EvalError> {
        Ok(Value::Boolean(require_orderable(left, &right()?, span)? != std::cmp::Ordering::Greater))
    }
}

struct Gte;
impl BinaryOperator for Gte {
    fn execute(&self, left: &Value, right: &mut dyn FnMut() -> Result<Value, EvalError>, span: Span) -> Result<Value, EvalError> {
        Ok(Value::Boolean(require_orderable(left, &right()?, span)? != std::cmp::Ordering::Less))
    }
}

/// `==`/`!=` (spec.md §4.6 "Container-aware exceptions"): deep structural
/// equality, always returning a scalar boolean even when both operands are
/// containers.
struct Eq;
impl BinaryOperator for Eq {
    fn execute(&self, left: &Value, right: &mut dyn FnMut() -> Result<Value, EvalError>, span: Span) -> Result<Value, EvalError> {
        let _ = span;
        Ok(Value::Boolean(broadcast::values_equal(left, &right()?)))
    }
}

struct Neq;
impl BinaryOperator for Neq {
    fn execute(&self, left: &Value, right: &mut dyn FnMut() -> Result<Value, EvalError>, span: Span) -> Result<Value, EvalError> {
        let _ = span;
        Ok(Value::Boolean(!broadcast::values_equal(left, &right()?)))
    }
}

// --- logical: containers rejected, And/Or short-circuit via the thunk ---

fn require_truthy(value: &Value, span: Span) -> Result<bool, EvalError> {
    match value {
        Value::Vector(_) | Value::Matrix(_) | Value::Range(_) | Value::Function(_) => {
            Err(EvalError::type_error(format!("'{}' is not valid in a logical expression", value.type_name()), span))
        }
        other => Ok(other.is_truthy()),
    }
}

struct And;
impl BinaryOperator for And {
    fn execute(&self, left: &Value, right: &mut dyn FnMut() -> Result<Value, EvalError>, span: Span) -> Result<Value, EvalError> {
        if !require_truthy(left, span)? {
            return Ok(Value::Boolean(false));
        }
        Ok(Value::Boolean(require_truthy(&right()?, span)?))
    }
}

struct Or;
impl BinaryOperator for Or {
    fn execute(&self, left: &Value, right: &mut dyn FnMut() -> Result<Value, EvalError>, span: Span) -> Result<Value, EvalError> {
        if require_truthy(left, span)? {
            return Ok(Value::Boolean(true));
        }
        Ok(Value::Boolean(require_truthy(&right()?, span)?))
    }
}

struct Xor;
impl BinaryOperator for Xor {
    fn execute(&self, left: &Value, right: &mut dyn FnMut() -> Result<Value, EvalError>, span: Span) -> Result<Value, EvalError> {
        Ok(Value::Boolean(require_truthy(left, span)? ^ require_truthy(&right()?, span)?))
    }
}

// --- matrix multiply: strict, never broadcasts (spec.md §4.6) ---

struct MatMul;
impl BinaryOperator for MatMul {
    fn execute(&self, left: &Value, right: &mut dyn FnMut() -> Result<Value, EvalError>, span: Span) -> Result<Value, EvalError> {
        let left = left.clone().materialized();
        let right = right()?.materialized();
        match (&left, &right) {
            (Value::Vector(a), Value::Vector(b)) => dot_product(a, b, span),
            (Value::Matrix(a), Value::Matrix(b)) => matrix_matrix_mul(a, b, span),
            (Value::Vector(a), Value::Matrix(b)) => row_vector_matrix_mul(a, b, span),
            (Value::Matrix(a), Value::Vector(b)) => matrix_column_vector_mul(a, b, span),
            _ => Err(EvalError::type_error("'@' requires two vectors or matrices", span)),
        }
    }
}

fn dot_product(a: &[Value], b: &[Value], span: Span) -> Result<Value, EvalError> {
    if a.len() != b.len() {
        return Err(EvalError::domain_error("'@' requires vectors of equal length", span));
    }
    let mut sum = Value::Rational(Rational::zero());
    for (x, y) in a.iter().zip(b.iter()) {
        let product = broadcast::mul(x, y, span)?;
        sum = broadcast::add(&sum, &product, span)?;
    }
    Ok(sum)
}

fn matrix_matrix_mul(a: &[Vec<Value>], b: &[Vec<Value>], span: Span) -> Result<Value, EvalError> {
    let a_cols = a.first().map(|r| r.len()).unwrap_or(0);
    let b_rows = b.len();
    if a_cols != b_rows {
        return Err(EvalError::domain_error(
            format!("'@' dimension mismatch: {}x{} @ {}x{}", a.len(), a_cols, b_rows, b.first().map(|r| r.len()).unwrap_or(0)),
            span,
        ));
    }
    let b_cols = b.first().map(|r| r.len()).unwrap_or(0);
    let mut rows = Vec::with_capacity(a.len());
    for row in a {
        let mut out_row = Vec::with_capacity(b_cols);
        for j in 0..b_cols {
            let column: Vec<Value> = b.iter().map(|r| r[j].clone()).collect();
            out_row.push(dot_product(row, &column, span)?);
        }
        rows.push(out_row);
    }
    Ok(Value::matrix(rows))
}

/// `vector @ matrix`: the vector as a `1xn` row (extension beyond spec.md's
/// required matrix@matrix/vector@vector cases, natural under the same rule).
fn row_vector_matrix_mul(a: &[Value], b: &[Vec<Value>], span: Span) -> Result<Value, EvalError> {
    let result = matrix_matrix_mul(&[a.to_vec()], b, span)?;
    match result {
        Value::Matrix(rows) => Ok(Value::vector(rows[0].clone())),
        other => Ok(other),
    }
}

/// `matrix @ vector`: the vector as an `nx1` column.
fn matrix_column_vector_mul(a: &[Vec<Value>], b: &[Value], span: Span) -> Result<Value, EvalError> {
    let column: Vec<Vec<Value>> = b.iter().map(|v| vec![v.clone()]).collect();
    let result = matrix_matrix_mul(a, &column, span)?;
    match result {
        Value::Matrix(rows) => Ok(Value::vector(rows.into_iter().map(|r| r[0].clone()).collect())),
        other => Ok(other),
    }
}

// --- unary ---

struct Neg;
impl UnaryOperator for Neg {
    fn execute(&self, operand: &Value, span: Span) -> Result<Value, EvalError> {
        broadcast::negate(operand, span)
    }
}

struct Pos;
impl UnaryOperator for Pos {
    fn execute(&self, operand: &Value, span: Span) -> Result<Value, EvalError> {
        identity(operand, span)
    }
}

fn identity(value: &Value, span: Span) -> Result<Value, EvalError> {
    match value.clone().materialized() {
        v @ (Value::Double(_) | Value::Rational(_) | Value::Percent(_) | Value::Boolean(_) | Value::UnitValue(_, _)) => Ok(v),
        Value::Vector(items) => Ok(Value::vector(items.iter().map(|v| identity(v, span)).collect::<Result<Vec<_>, _>>()?)),
        Value::Matrix(rows) => Ok(Value::matrix(
            rows.iter()
                .map(|row| row.iter().map(|v| identity(v, span)).collect::<Result<Vec<_>, _>>())
                .collect::<Result<Vec<_>, _>>()?,
        )),
        other => Err(EvalError::type_error(format!("unary '+' is not defined for a {}", other.type_name()), span)),
    }
}

struct Not;
impl UnaryOperator for Not {
    fn execute(&self, operand: &Value, span: Span) -> Result<Value, EvalError> {
        Ok(Value::Boolean(!require_truthy(operand, span)?))
    }
}

fn nonneg_integer(value: &Value, span: Span, op_name: &str) -> Result<i64, EvalError> {
    let n = match value {
        Value::Rational(r) if r.is_integer() => r.to_i64(),
        Value::Double(d) if d.fract() == 0.0 => Some(*d as i64),
        Value::Boolean(b) => Some(if *b { 1 } else { 0 }),
        _ => None,
    };
    match n {
        Some(n) if n >= 0 => Ok(n),
        Some(_) => Err(EvalError::domain_error(format!("{op_name} is undefined for negative numbers"), span)),
        None => Err(EvalError::type_error(format!("{op_name} requires an integer"), span)),
    }
}

struct Factorial;
impl UnaryOperator for Factorial {
    fn execute(&self, operand: &Value, span: Span) -> Result<Value, EvalError> {
        let n = nonneg_integer(operand, span, "factorial")?;
        let mut acc = Rational::one();
        let mut i = 1;
        while i <= n {
            acc = acc.mul(&Rational::from_i64(i));
            i += 1;
        }
        Ok(Value::Rational(acc))
    }
}

struct DoubleFactorial;
impl UnaryOperator for DoubleFactorial {
    fn execute(&self, operand: &Value, span: Span) -> Result<Value, EvalError> {
        let n = nonneg_integer(operand, span, "double factorial")?;
        let mut acc = Rational::one();
        let mut i = n;
        while i > 0 {
            acc = acc.mul(&Rational::from_i64(i));
            i -= 2;
        }
        Ok(Value::Rational(acc))
    }
}

/// Postfix `%`: `x%` is `Percent(x / 100)` (spec.md §3.2).
struct PercentOp;
impl UnaryOperator for PercentOp {
    fn execute(&self, operand: &Value, span: Span) -> Result<Value, EvalError> {
        let v = operand
            .as_f64()
            .ok_or_else(|| EvalError::type_error(format!("'%' is not defined for a {}", operand.type_name()), span))?;
        Ok(Value::Percent(v / 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expr_core::Span;

    fn span() -> Span {
        Span::dummy()
    }

    fn r(n: i64) -> Value {
        Value::Rational(Rational::from_i64(n))
    }

    fn eager(v: Value) -> impl FnMut() -> Result<Value, EvalError> {
        move || Ok(v.clone())
    }

    #[test]
    fn add_dispatches_to_broadcasting_engine() {
        let table = OperatorTable::new();
        let mut thunk = eager(r(3));
        let result = table.binary(BinOp::Add).execute(&r(2), &mut thunk, span()).unwrap();
        assert_eq!(result, r(5));
    }

    #[test]
    fn and_short_circuits_without_calling_the_thunk() {
        let table = OperatorTable::new();
        let mut called = false;
        let mut thunk = || {
            called = true;
            Ok(Value::Boolean(true))
        };
        let result = table.binary(BinOp::And).execute(&Value::Boolean(false), &mut thunk, span()).unwrap();
        assert_eq!(result, Value::Boolean(false));
        assert!(!called);
    }

    #[test]
    fn or_short_circuits_on_true_left() {
        let table = OperatorTable::new();
        let mut called = false;
        let mut thunk = || {
            called = true;
            Ok(Value::Boolean(false))
        };
        let result = table.binary(BinOp::Or).execute(&Value::Boolean(true), &mut thunk, span()).unwrap();
        assert_eq!(result, Value::Boolean(true));
        assert!(!called);
    }

    #[test]
    fn ordering_on_vectors_is_a_type_error() {
        let table = OperatorTable::new();
        let mut thunk = eager(Value::vector(vec![r(1)]));
        let err = table.binary(BinOp::Lt).execute(&Value::vector(vec![r(1)]), &mut thunk, span());
        assert!(err.is_err());
    }

    #[test]
    fn equality_on_vectors_is_a_scalar_boolean() {
        let table = OperatorTable::new();
        let mut thunk = eager(Value::vector(vec![r(1), r(2)]));
        let result = table.binary(BinOp::Eq).execute(&Value::vector(vec![r(1), r(2)]), &mut thunk, span()).unwrap();
        assert_eq!(result, Value::Boolean(true));
    }

    #[test]
    fn factorial_of_five_is_one_twenty() {
        let table = OperatorTable::new();
        assert_eq!(table.unary(UnaryOp::Factorial).execute(&r(5), span()).unwrap(), r(120));
    }

    #[test]
    fn factorial_of_negative_is_a_domain_error() {
        let table = OperatorTable::new();
        assert!(matches!(table.unary(UnaryOp::Factorial).execute(&r(-1), span()), Err(EvalError::Domain { .. })));
    }

    #[test]
    fn vector_dot_vector_is_a_scalar() {
        let table = OperatorTable::new();
        let a = Value::vector(vec![r(1), r(2), r(3)]);
        let b = Value::vector(vec![r(4), r(5), r(6)]);
        let mut thunk = eager(b);
        let result = table.binary(BinOp::MatMul).execute(&a, &mut thunk, span()).unwrap();
        assert_eq!(result, r(32)); // 1*4 + 2*5 + 3*6
    }

    #[test]
    fn matrix_at_matrix_multiplies() {
        let table = OperatorTable::new();
        let a = Value::matrix(vec![vec![r(1), r(2)], vec![r(3), r(4)]]);
        let b = Value::matrix(vec![vec![r(5), r(6)], vec![r(7), r(8)]]);
        let mut thunk = eager(b);
        let result = table.binary(BinOp::MatMul).execute(&a, &mut thunk, span()).unwrap();
        assert_eq!(result, Value::matrix(vec![vec![r(19), r(22)], vec![r(43), r(50)]]));
    }

    #[test]
    fn percent_postfix_scales_down_by_one_hundred() {
        let table = OperatorTable::new();
        assert_eq!(table.unary(UnaryOp::PercentOp).execute(&r(10), span()).unwrap(), Value::Percent(0.1));
    }
}
