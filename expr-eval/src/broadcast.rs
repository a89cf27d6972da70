//! The unified broadcasting engine (spec.md §4.6): every value type's five
//! binary arithmetic operations, unary negate, and a scalar comparator, all
//! dispatched through one recursive elementwise engine so vectors and
//! matrices never need their own copy of the promotion rules.

use expr_core::{Rational, Span};
use num_traits::Zero;

use crate::error::EvalError;
use crate::values::Value;

type ScalarOp = fn(&Value, &Value, Span) -> Result<Value, EvalError>;

fn zero() -> Value {
    Value::Rational(Rational::zero())
}

pub fn add(left: &Value, right: &Value, span: Span) -> Result<Value, EvalError> {
    broadcast(left, right, span, scalar_add)
}

pub fn sub(left: &Value, right: &Value, span: Span) -> Result<Value, EvalError> {
    broadcast(left, right, span, scalar_sub)
}

pub fn mul(left: &Value, right: &Value, span: Span) -> Result<Value, EvalError> {
    broadcast(left, right, span, scalar_mul)
}

pub fn div(left: &Value, right: &Value, span: Span) -> Result<Value, EvalError> {
    broadcast(left, right, span, scalar_div)
}

pub fn pow(left: &Value, right: &Value, span: Span) -> Result<Value, EvalError> {
    broadcast(left, right, span, scalar_pow)
}

/// `mod` (spec.md §4.7): exact for `Rational mod Rational`, via the
/// floored-division identity `a - floor(a/b)*b`, otherwise a float `%`.
pub fn modulo(left: &Value, right: &Value, span: Span) -> Result<Value, EvalError> {
    broadcast(left, right, span, scalar_mod)
}

/// `of` (spec.md §4.7): `n% of x` and, more generally, `a of b` reads as
/// "a fraction/count of b" — `Percent of scalar` multiplies through,
/// otherwise it behaves like `*`.
pub fn of(left: &Value, right: &Value, span: Span) -> Result<Value, EvalError> {
    broadcast(left, right, span, scalar_of)
}

pub fn negate(value: &Value, span: Span) -> Result<Value, EvalError> {
    match value.clone().materialized() {
        Value::Double(d) => Ok(Value::Double(-d)),
        Value::Rational(r) => Ok(Value::Rational(r.neg())),
        Value::Percent(p) => Ok(Value::Percent(-p)),
        Value::Boolean(b) => Ok(Value::Rational(Rational::from_i64(if b { -1 } else { 0 }))),
        Value::UnitValue(v, unit) => Ok(Value::UnitValue(-v, unit)),
        Value::Vector(items) => {
            let out = items.iter().map(|v| negate(v, span)).collect::<Result<Vec<_>, _>>()?;
            Ok(Value::vector(out))
        }
        Value::Matrix(rows) => {
            let out = rows
                .iter()
                .map(|row| row.iter().map(|v| negate(v, span)).collect::<Result<Vec<_>, _>>())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::matrix(out))
        }
        other => Err(EvalError::type_error(
            format!("cannot negate a {}", other.type_name()),
            span,
        )),
    }
}

/// Scalar ordering comparison for `<`, `>`, `<=`, `>=` (spec.md §4.6:
/// ordering on containers is a `TypeError`, checked by the caller before
/// reaching here).
pub fn compare_scalars(left: &Value, right: &Value, span: Span) -> Result<std::cmp::Ordering, EvalError> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::String(_), _) | (_, Value::String(_)) => Err(EvalError::type_error(
            "cannot order a string against a non-string",
            span,
        )),
        (Value::Rational(a), Value::Rational(b)) => Ok(a.cmp(b)),
        _ => {
            let (a, b) = numeric_pair(left, right, span)?;
            a.partial_cmp(&b)
                .ok_or_else(|| EvalError::domain_error("comparison involving NaN", span))
        }
    }
}

/// Deep structural equality with a small epsilon when any float is
/// involved (spec.md §4.6 "Container-aware exceptions").
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Vector(a), Value::Vector(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Value::Matrix(a), Value::Matrix(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(ra, rb)| ra.len() == rb.len() && ra.iter().zip(rb.iter()).all(|(x, y)| values_equal(x, y)))
        }
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Rational(a), Value::Rational(b)) => a == b,
        (Value::UnitValue(va, ua), Value::UnitValue(vb, ub)) => {
            ua.category == ub.category && (va - vb).abs() < 1e-9
        }
        _ => {
            if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
                (a - b).abs() < 1e-9
            } else {
                false
            }
        }
    }
}

fn numeric_pair(left: &Value, right: &Value, span: Span) -> Result<(f64, f64), EvalError> {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(EvalError::type_error(
            format!("cannot combine {} and {}", left.type_name(), right.type_name()),
            span,
        )),
    }
}

// --- scalar arithmetic: numeric promotion, strings, units (spec.md §4.6) ---

fn scalar_add(left: &Value, right: &Value, span: Span) -> Result<Value, EvalError> {
    if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
        return Ok(Value::string(format!("{left}{right}")));
    }
    match (left, right) {
        (Value::Rational(a), Value::Rational(b)) => Ok(Value::Rational(a.add(b))),
        (Value::Percent(a), Value::Percent(b)) => Ok(Value::Percent(a + b)),
        (Value::Percent(p), other) => percent_of_number(*p, other, span, true),
        (other, Value::Percent(p)) => percent_of_number(*p, other, span, true),
        (Value::UnitValue(_, _), other) | (other, Value::UnitValue(_, _)) if other.is_scalar() && !matches!(other, Value::UnitValue(_, _)) => {
            Err(EvalError::type_error("cannot add a unit value and a plain scalar", span))
        }
        (Value::UnitValue(a, ua), Value::UnitValue(b, ub)) => unit_add_sub(*a, *ua, *b, *ub, span, true),
        _ => {
            let (a, b) = numeric_pair(left, right, span)?;
            Ok(Value::Double(a + b))
        }
    }
}

fn scalar_sub(left: &Value, right: &Value, span: Span) -> Result<Value, EvalError> {
    if matches!(left, Value::String(_)) || matches!(right, Value::String(_)) {
        return Err(EvalError::type_error("'-' is not defined for strings", span));
    }
    match (left, right) {
        (Value::Rational(a), Value::Rational(b)) => Ok(Value::Rational(a.sub(b))),
        (Value::Percent(a), Value::Percent(b)) => Ok(Value::Percent(a - b)),
        (Value::Percent(p), other) | (other, Value::Percent(p)) => {
            let base = other.as_f64().ok_or_else(|| EvalError::type_error("expected a number", span))?;
            let contribution = percent_contribution(*p, other, span)?;
            Ok(Value::Double(base - contribution))
        }
        (Value::UnitValue(a, ua), Value::UnitValue(b, ub)) => unit_add_sub(*a, *ua, *b, *ub, span, false),
        (Value::UnitValue(_, _), other) | (other, Value::UnitValue(_, _)) if other.is_scalar() => {
            Err(EvalError::type_error("cannot subtract a unit value and a plain scalar", span))
        }
        _ => {
            let (a, b) = numeric_pair(left, right, span)?;
            Ok(Value::Double(a - b))
        }
    }
}

fn percent_contribution(p: f64, base_value: &Value, span: Span) -> Result<f64, EvalError> {
    let base = base_value
        .as_f64()
        .ok_or_else(|| EvalError::type_error("expected a number next to a percent", span))?;
    Ok(base * p)
}

/// `a +/- Percent(p)`: the percent is interpreted as a fraction of `a`
/// (spec.md §4.6: `100 - 10% = 100 - (10% of 100) = 90`).
fn percent_of_number(p: f64, base_value: &Value, span: Span, is_add: bool) -> Result<Value, EvalError> {
    let contribution = percent_contribution(p, base_value, span)?;
    let base = base_value.as_f64().expect("checked by percent_contribution");
    Ok(Value::Double(if is_add { base + contribution } else { base - contribution }))
}

fn scalar_mul(left: &Value, right: &Value, span: Span) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::String(s), other) | (other, Value::String(s)) if matches!(left, Value::String(_)) ^ matches!(right, Value::String(_)) => {
            let n = other
                .as_f64()
                .filter(|v| v.fract() == 0.0)
                .ok_or_else(|| EvalError::type_error("string repetition requires an integer", span))?;
            if n < 0.0 {
                return Err(EvalError::type_error("string repetition count must be non-negative", span));
            }
            Ok(Value::string(s.repeat(n as usize)))
        }
        (Value::String(_), Value::String(_)) => Err(EvalError::type_error("cannot multiply two strings", span)),
        (Value::Rational(a), Value::Rational(b)) => Ok(Value::Rational(a.mul(b))),
        (Value::Percent(a), Value::Percent(b)) => Ok(Value::Percent(a * b)),
        (Value::UnitValue(v, unit), other) | (other, Value::UnitValue(v, unit)) if other.is_scalar() && !matches!(other, Value::UnitValue(_, _)) => {
            let scalar = other
                .as_f64()
                .ok_or_else(|| EvalError::type_error("expected a scalar next to a unit value", span))?;
            Ok(Value::UnitValue(*v * scalar, *unit))
        }
        (Value::UnitValue(_, _), Value::UnitValue(_, _)) => {
            Err(EvalError::type_error("cannot multiply two unit values directly; use '@' or divide", span))
        }
        _ => {
            let (a, b) = numeric_pair(left, right, span)?;
            Ok(Value::Double(a * b))
        }
    }
}

fn scalar_div(left: &Value, right: &Value, span: Span) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::String(_), _) | (_, Value::String(_)) => Err(EvalError::type_error("'/' is not defined for strings", span)),
        (Value::Percent(a), Value::Percent(b)) => {
            if *b == 0.0 {
                return Err(EvalError::domain_error("division by zero", span));
            }
            Ok(Value::Double(a / b))
        }
        (Value::Rational(a), Value::Rational(b)) => a
            .div(b)
            .map(Value::Rational)
            .ok_or_else(|| EvalError::domain_error("division by zero", span)),
        (Value::UnitValue(a, ua), Value::UnitValue(b, ub)) => {
            if ua.category != ub.category {
                return Err(EvalError::domain_error("cannot divide unit values of different categories", span));
            }
            if *b == 0.0 {
                return Err(EvalError::domain_error("division by zero", span));
            }
            Ok(Value::Double(ua.to_base(*a) / ub.to_base(*b)))
        }
        (Value::UnitValue(v, unit), other) if other.is_scalar() => {
            let scalar = other
                .as_f64()
                .ok_or_else(|| EvalError::type_error("expected a scalar divisor", span))?;
            if scalar == 0.0 {
                return Err(EvalError::domain_error("division by zero", span));
            }
            Ok(Value::UnitValue(*v / scalar, *unit))
        }
        _ => {
            let (a, b) = numeric_pair(left, right, span)?;
            if b == 0.0 {
                return Err(EvalError::domain_error("division by zero", span));
            }
            Ok(Value::Double(a / b))
        }
    }
}

/// `^` (spec.md §4.7): `0^0 = 1`; an integer exponent on a `Rational` stays
/// exact; otherwise the result promotes to `Double`.
fn scalar_pow(left: &Value, right: &Value, span: Span) -> Result<Value, EvalError> {
    if let (Value::Rational(base), Value::Rational(exp)) = (left, right) {
        if let Some(exp_i) = exp.to_i64() {
            if base.is_zero() && exp_i == 0 {
                return Ok(Value::Rational(Rational::one()));
            }
            if exp_i >= 0 {
                return Ok(Value::Rational(base.pow(exp_i as u32)));
            }
            if !base.is_zero() {
                let inv = Rational::one()
                    .div(base)
                    .expect("checked non-zero base above");
                return Ok(Value::Rational(inv.pow((-exp_i) as u32)));
            }
            return Err(EvalError::domain_error("zero raised to a negative power", span));
        }
    }
    let (a, b) = numeric_pair(left, right, span)?;
    if a == 0.0 && b == 0.0 {
        return Ok(Value::Double(1.0));
    }
    if a < 0.0 && b.fract() != 0.0 {
        return Err(EvalError::domain_error(
            "negative base with a non-integer exponent is undefined",
            span,
        ));
    }
    Ok(Value::Double(a.powf(b)))
}

/// `mod` (spec.md §4.7): floored modulo, exact when both sides are
/// `Rational` (`a - floor(a/b)*b`), a float `%` otherwise.
fn scalar_mod(left: &Value, right: &Value, span: Span) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Rational(a), Value::Rational(b)) => {
            if b.is_zero() {
                return Err(EvalError::domain_error("modulo by zero", span));
            }
            let floor_q = Rational::from_bigint(a.div(b).expect("checked non-zero above").floor_to_bigint());
            Ok(Value::Rational(a.sub(&floor_q.mul(b))))
        }
        _ => {
            let (a, b) = numeric_pair(left, right, span)?;
            if b == 0.0 {
                return Err(EvalError::domain_error("modulo by zero", span));
            }
            Ok(Value::Double(a - (a / b).floor() * b))
        }
    }
}

/// `of` (spec.md §4.7): `Percent of x` multiplies the percent fraction
/// through; otherwise `of` behaves like `*`.
fn scalar_of(left: &Value, right: &Value, span: Span) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Percent(p), other) => {
            let base = other
                .as_f64()
                .ok_or_else(|| EvalError::type_error("expected a number after 'of'", span))?;
            Ok(Value::Double(p * base))
        }
        _ => scalar_mul(left, right, span),
    }
}

fn unit_add_sub(
    a: f64,
    ua: &'static expr_core::UnitDef,
    b: f64,
    ub: &'static expr_core::UnitDef,
    span: Span,
    is_add: bool,
) -> Result<Value, EvalError> {
    if ua.category != ub.category {
        return Err(EvalError::domain_error("cannot combine unit values of different categories", span));
    }
    let base_a = ua.to_base(a);
    let base_b = ub.to_base(b);
    let base_result = if is_add { base_a + base_b } else { base_a - base_b };
    Ok(Value::UnitValue(ua.from_base(base_result), ua))
}

// --- broadcasting dispatch (spec.md §4.6 "Broadcasting (unified engine)") ---

fn broadcast(left: &Value, right: &Value, span: Span, op: ScalarOp) -> Result<Value, EvalError> {
    let left = left.clone().materialized();
    let right = right.clone().materialized();

    match (&left, &right) {
        (l, r) if l.is_scalar() && r.is_scalar() => op(l, r, span),
        (l, Value::Vector(rv)) if l.is_scalar() => {
            let items = rv.iter().map(|e| op(l, e, span)).collect::<Result<Vec<_>, _>>()?;
            Ok(Value::vector(items))
        }
        (Value::Vector(lv), r) if r.is_scalar() => {
            let items = lv.iter().map(|e| op(e, r, span)).collect::<Result<Vec<_>, _>>()?;
            Ok(Value::vector(items))
        }
        (Value::Vector(lv), Value::Vector(rv)) => {
            let n = lv.len().max(rv.len());
            let items = (0..n)
                .map(|i| {
                    let a = lv.get(i).cloned().unwrap_or_else(zero);
                    let b = rv.get(i).cloned().unwrap_or_else(zero);
                    op(&a, &b, span)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::vector(items))
        }
        (l, Value::Matrix(rm)) if l.is_scalar() => {
            let rows = rm
                .iter()
                .map(|row| row.iter().map(|e| op(l, e, span)).collect::<Result<Vec<_>, _>>())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::matrix(rows))
        }
        (Value::Matrix(lm), r) if r.is_scalar() => {
            let rows = lm
                .iter()
                .map(|row| row.iter().map(|e| op(e, r, span)).collect::<Result<Vec<_>, _>>())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::matrix(rows))
        }
        (Value::Matrix(lm), Value::Matrix(rm)) => matrix_matrix(lm, rm, span, op),
        (Value::Vector(v), Value::Matrix(m)) => vector_matrix(v, m, span, op, true),
        (Value::Matrix(m), Value::Vector(v)) => vector_matrix(v, m, span, op, false),
        _ => op(&left, &right, span),
    }
}

fn dims(m: &[Vec<Value>]) -> (usize, usize) {
    (m.len(), m.first().map(|r| r.len()).unwrap_or(0))
}

fn cell_at(m: &[Vec<Value>], rows: usize, cols: usize, i: usize, j: usize) -> Value {
    let src_i = if rows == 1 { 0 } else { i };
    let src_j = if cols == 1 { 0 } else { j };
    m.get(src_i).and_then(|r| r.get(src_j)).cloned().unwrap_or_else(zero)
}

fn resolve_dim(a: usize, b: usize) -> usize {
    if a == 1 {
        b
    } else if b == 1 {
        a
    } else {
        a.max(b)
    }
}

fn matrix_matrix(lm: &[Vec<Value>], rm: &[Vec<Value>], span: Span, op: ScalarOp) -> Result<Value, EvalError> {
    let (lr, lc) = dims(lm);
    let (rr, rc) = dims(rm);
    let target_rows = resolve_dim(lr, rr);
    let target_cols = resolve_dim(lc, rc);
    let mut rows = Vec::with_capacity(target_rows);
    for i in 0..target_rows {
        let mut row = Vec::with_capacity(target_cols);
        for j in 0..target_cols {
            let a = cell_at(lm, lr, lc, i, j);
            let b = cell_at(rm, rr, rc, i, j);
            row.push(op(&a, &b, span)?);
        }
        rows.push(row);
    }
    Ok(Value::matrix(rows))
}

fn vector_matrix(v: &[Value], m: &[Vec<Value>], span: Span, op: ScalarOp, vector_is_left: bool) -> Result<Value, EvalError> {
    let (mr, mc) = dims(m);
    if v.len() == mc {
        // broadcast the vector across every row
        let rows = m
            .iter()
            .map(|row| {
                row.iter()
                    .zip(v.iter())
                    .map(|(cell, ve)| if vector_is_left { op(ve, cell, span) } else { op(cell, ve, span) })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::matrix(rows));
    }
    if v.len() == mr {
        // broadcast the vector across every column: row i uses v[i] for every cell
        let rows = m
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.iter()
                    .map(|cell| if vector_is_left { op(&v[i], cell, span) } else { op(cell, &v[i], span) })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::matrix(rows));
    }
    // Fall back: treat the vector as a single-row matrix and apply matrix-matrix rules.
    let as_matrix = vec![v.to_vec()];
    if vector_is_left {
        matrix_matrix(&as_matrix, m, span, op)
    } else {
        matrix_matrix(m, &as_matrix, span, op)
    }
}
