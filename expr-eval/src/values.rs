//! Runtime value representation (spec.md §3.2 "Values").
//!
//! `Node`s from `expr-compiler` are unevaluated; a `Value` is what the
//! evaluator produces by walking one. Collection variants that can get
//! large (`Vector`, `Matrix`, function bodies) are behind `Rc` so cloning a
//! `Value` — which happens constantly while threading arguments through the
//! broadcasting engine — stays cheap.

use std::fmt;
use std::rc::Rc;

use expr_compiler::Node;
use expr_core::{Rational, UnitDef};

use crate::context::Context;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Double(f64),
    Rational(Rational),
    /// Stores `value / 100`; display recovers the original by `* 100`
    /// (spec.md §3.2). Kept as `f64` rather than threading exactness
    /// through percents — percent literals are not part of the exact
    /// arithmetic closure property (spec.md §8 property 10).
    Percent(f64),
    Boolean(bool),
    String(Rc<String>),
    UnitValue(f64, &'static UnitDef),
    Vector(Rc<Vec<Value>>),
    Matrix(Rc<Vec<Vec<Value>>>),
    Range(RangeValue),
    Function(Rc<FunctionDef>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeValue {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl RangeValue {
    pub fn new(start: f64, end: f64, step: f64) -> Self {
        Self { start, end, step }
    }

    /// Materializes the full sequence. Inclusive on both ends (spec.md
    /// §3.2, §4.6 "Ranges materialise on demand").
    pub fn materialize(&self) -> Vec<Value> {
        let mut out = Vec::new();
        if self.step == 0.0 {
            return out;
        }
        let is_integral =
            self.start.fract() == 0.0 && self.end.fract() == 0.0 && self.step.fract() == 0.0;
        let mut current = self.start;
        let ascending = self.step > 0.0;
        loop {
            if ascending && current > self.end + f64::EPSILON {
                break;
            }
            if !ascending && current < self.end - f64::EPSILON {
                break;
            }
            out.push(if is_integral {
                Value::Rational(Rational::from_i64(current.round() as i64))
            } else {
                Value::Double(current)
            });
            current += self.step;
            if out.len() > 10_000_000 {
                break; // runaway guard; real bounds enforced by ResourceError upstream
            }
        }
        out
    }
}

/// `FunctionDef { name, params, body, closure? }` (spec.md §3.3). Presence
/// of `closure` distinguishes a lambda (lexical scoping, resolves free
/// names in the captured snapshot) from a regular `f(x) := ...` definition
/// (dynamic scoping, resolves free names in the caller's context).
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: Rc<Node>,
    pub closure: Option<Context>,
}

impl FunctionDef {
    pub fn is_lambda(&self) -> bool {
        self.closure.is_some()
    }
}

/// Equality ignores the captured closure (whether two closures over
/// different environments are "the same function" isn't meaningful);
/// functions compare equal when they share a name, parameter list, and the
/// same underlying body.
impl PartialEq for FunctionDef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.params == other.params && Rc::ptr_eq(&self.body, &other.body)
    }
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(Rc::new(s.into()))
    }

    pub fn vector(elements: Vec<Value>) -> Self {
        Value::Vector(Rc::new(elements))
    }

    pub fn matrix(rows: Vec<Vec<Value>>) -> Self {
        Value::Matrix(Rc::new(rows))
    }

    /// Numeric value coerced the way `Boolean` does for arithmetic:
    /// `true` = 1, `false` = 0 (spec.md §3.2).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Rational(r) => Some(r.to_f64()),
            Value::Percent(p) => Some(*p),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::UnitValue(v, _) => Some(*v),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            other => other.as_f64().map(|v| v != 0.0).unwrap_or(true),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Value::Double(_)
                | Value::Rational(_)
                | Value::Percent(_)
                | Value::Boolean(_)
                | Value::String(_)
                | Value::UnitValue(_, _)
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Double(_) => "double",
            Value::Rational(_) => "rational",
            Value::Percent(_) => "percent",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::UnitValue(_, _) => "unit value",
            Value::Vector(_) => "vector",
            Value::Matrix(_) => "matrix",
            Value::Range(_) => "range",
            Value::Function(_) => "function",
        }
    }

    /// Range values materialize eagerly whenever arithmetic touches them
    /// (spec.md §4.6 "Ranges materialise on demand").
    pub fn materialized(self) -> Value {
        match self {
            Value::Range(r) => Value::vector(r.materialize()),
            other => other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Double(d) => write!(f, "{d}"),
            Value::Rational(r) => write!(f, "{r}"),
            Value::Percent(p) => write!(f, "{}%", p * 100.0),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::String(s) => write!(f, "{s}"),
            Value::UnitValue(v, unit) => write!(f, "{v} {}", unit.singular),
            Value::Vector(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "}}")
            }
            Value::Matrix(rows) => {
                write!(f, "[")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    for (j, item) in row.iter().enumerate() {
                        if j > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{item}")?;
                    }
                }
                write!(f, "]")
            }
            Value::Range(r) => write!(f, "{}..{}", r.start, r.end),
            Value::Function(def) => match &def.name {
                Some(name) => write!(f, "<function {name}>"),
                None => write!(f, "<lambda>"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_coerces_to_numeric_one_or_zero() {
        assert_eq!(Value::Boolean(true).as_f64(), Some(1.0));
        assert_eq!(Value::Boolean(false).as_f64(), Some(0.0));
    }

    #[test]
    fn inclusive_integer_range_materializes_both_ends() {
        let r = RangeValue::new(1.0, 5.0, 1.0);
        let values = r.materialize();
        assert_eq!(values.len(), 5);
        assert_eq!(values[0], Value::Rational(Rational::from_i64(1)));
        assert_eq!(values[4], Value::Rational(Rational::from_i64(5)));
    }

    #[test]
    fn percent_display_recovers_original_scale() {
        let p = Value::Percent(0.1);
        assert_eq!(p.to_string(), "10%");
    }
}
