//! Built-in function registry and dispatch (spec.md §4.8): an immutable map
//! from lowercase name to a small trait object, following the same
//! trait-plus-`HashMap` registry shape as the binary/unary operator tables
//! (`operators.rs`, itself grounded in `lumen-runtime/src/tools.rs`'s
//! `ToolDispatcher`).
//!
//! The evaluator-handled `if` is deliberately absent here (spec.md §4.8
//! "Special case"): it needs lazy argument evaluation, which a function
//! registered in this eager-dispatch table cannot express.

use std::collections::HashMap;

use expr_core::{AngleUnit, Span};

use crate::broadcast;
use crate::error::EvalError;
use crate::values::Value;

pub trait BuiltinFunction {
    fn name(&self) -> &'static str;
    fn min_arity(&self) -> usize;
    fn max_arity(&self) -> usize;
    /// `true` for a function that should be applied elementwise when called
    /// with exactly one vector argument, instead of running `apply` itself
    /// against the vector (spec.md §4.8 rule 2).
    fn supports_vector_broadcasting(&self) -> bool {
        true
    }
    fn apply(&self, args: &[Value], angle_unit: AngleUnit, span: Span) -> Result<Value, EvalError>;
}

pub struct FunctionRegistry {
    by_name: HashMap<&'static str, Box<dyn BuiltinFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        let mut by_name: HashMap<&'static str, Box<dyn BuiltinFunction>> = HashMap::new();
        macro_rules! register {
            ($f:expr) => {
                let f = $f;
                by_name.insert(f.name(), Box::new(f));
            };
        }
        register!(Sqrt);
        register!(Abs);
        register!(Floor);
        register!(Ceil);
        register!(Round);
        register!(Sin);
        register!(Cos);
        register!(Tan);
        register!(Ln);
        register!(Log10);
        register!(Log2);
        register!(Min);
        register!(Max);
        register!(Sum);
        register!(Avg);
        Self { by_name }
    }

    pub fn get(&self, name: &str) -> Option<&dyn BuiltinFunction> {
        self.by_name.get(name).map(|f| f.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_name.keys().copied()
    }

    /// Validates arity, applies single-vector-argument broadcasting, and
    /// invokes `apply` (spec.md §4.8 dispatch rules 1-3).
    pub fn call(&self, name: &str, args: &[Value], angle_unit: AngleUnit, span: Span) -> Result<Value, EvalError> {
        let f = self.get(name).ok_or_else(|| EvalError::undefined_function(name, span))?;
        if args.len() < f.min_arity() || args.len() > f.max_arity() {
            return Err(EvalError::Arity {
                function: name.to_string(),
                min: f.min_arity(),
                max: f.max_arity(),
                got: args.len(),
                span,
            });
        }
        if f.supports_vector_broadcasting() && args.len() == 1 {
            if let Value::Vector(items) = args[0].clone().materialized() {
                let mapped = items
                    .iter()
                    .map(|item| f.apply(std::slice::from_ref(item), angle_unit, span))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(Value::vector(mapped));
            }
        }
        f.apply(args, angle_unit, span)
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn one_arg_f64(args: &[Value], span: Span, fname: &str) -> Result<f64, EvalError> {
    args[0]
        .as_f64()
        .ok_or_else(|| EvalError::type_error(format!("{fname} expects a number"), span))
}

macro_rules! unary_math_fn {
    ($struct_name:ident, $fn_name:literal, $body:expr) => {
        struct $struct_name;
        impl BuiltinFunction for $struct_name {
            fn name(&self) -> &'static str {
                $fn_name
            }
            fn min_arity(&self) -> usize {
                1
            }
            fn max_arity(&self) -> usize {
                1
            }
            fn apply(&self, args: &[Value], angle_unit: AngleUnit, span: Span) -> Result<Value, EvalError> {
                let x = one_arg_f64(args, span, $fn_name)?;
                let f: fn(f64, AngleUnit, Span) -> Result<Value, EvalError> = $body;
                f(x, angle_unit, span)
            }
        }
    };
}

unary_math_fn!(Sqrt, "sqrt", |x, _, span| {
    if x < 0.0 {
        return Err(EvalError::domain_error("sqrt of a negative number is undefined", span));
    }
    Ok(Value::Double(x.sqrt()))
});

struct Abs;
impl BuiltinFunction for Abs {
    fn name(&self) -> &'static str {
        "abs"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn max_arity(&self) -> usize {
        1
    }
    fn apply(&self, args: &[Value], _angle_unit: AngleUnit, span: Span) -> Result<Value, EvalError> {
        match &args[0] {
            Value::Rational(r) => Ok(Value::Rational(r.abs())),
            other => Ok(Value::Double(one_arg_f64(std::slice::from_ref(other), span, "abs")?.abs())),
        }
    }
}

unary_math_fn!(Floor, "floor", |x, _, _span| Ok(Value::Double(x.floor())));
unary_math_fn!(Ceil, "ceil", |x, _, _span| Ok(Value::Double(x.ceil())));
unary_math_fn!(Round, "round", |x, _, _span| Ok(Value::Double(x.round())));

unary_math_fn!(Sin, "sin", |x, angle: AngleUnit, _span| Ok(Value::Double(angle.to_radians(x).sin())));
unary_math_fn!(Cos, "cos", |x, angle: AngleUnit, _span| Ok(Value::Double(angle.to_radians(x).cos())));
unary_math_fn!(Tan, "tan", |x, angle: AngleUnit, _span| Ok(Value::Double(angle.to_radians(x).tan())));

unary_math_fn!(Ln, "ln", |x, _, span| {
    if x <= 0.0 {
        return Err(EvalError::domain_error("ln is undefined for non-positive numbers", span));
    }
    Ok(Value::Double(x.ln()))
});
unary_math_fn!(Log10, "log10", |x, _, span| {
    if x <= 0.0 {
        return Err(EvalError::domain_error("log10 is undefined for non-positive numbers", span));
    }
    Ok(Value::Double(x.log10()))
});
unary_math_fn!(Log2, "log2", |x, _, span| {
    if x <= 0.0 {
        return Err(EvalError::domain_error("log2 is undefined for non-positive numbers", span));
    }
    Ok(Value::Double(x.log2()))
});

/// Reducer: variadic, accepts the argument list directly rather than
/// broadcasting over a single vector (spec.md SPEC_FULL.md registry
/// supplement).
struct Min;
impl BuiltinFunction for Min {
    fn name(&self) -> &'static str {
        "min"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn max_arity(&self) -> usize {
        usize::MAX
    }
    fn supports_vector_broadcasting(&self) -> bool {
        false
    }
    fn apply(&self, args: &[Value], _angle_unit: AngleUnit, span: Span) -> Result<Value, EvalError> {
        reduce(args, span, "min", |acc, x| if x < acc { x } else { acc })
    }
}

struct Max;
impl BuiltinFunction for Max {
    fn name(&self) -> &'static str {
        "max"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn max_arity(&self) -> usize {
        usize::MAX
    }
    fn supports_vector_broadcasting(&self) -> bool {
        false
    }
    fn apply(&self, args: &[Value], _angle_unit: AngleUnit, span: Span) -> Result<Value, EvalError> {
        reduce(args, span, "max", |acc, x| if x > acc { x } else { acc })
    }
}

struct Sum;
impl BuiltinFunction for Sum {
    fn name(&self) -> &'static str {
        "sum"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn max_arity(&self) -> usize {
        usize::MAX
    }
    fn supports_vector_broadcasting(&self) -> bool {
        false
    }
    fn apply(&self, args: &[Value], _angle_unit: AngleUnit, span: Span) -> Result<Value, EvalError> {
        let mut acc = Value::Rational(expr_core::Rational::zero());
        for v in flattened(args) {
            acc = broadcast::add(&acc, &v, span)?;
        }
        Ok(acc)
    }
}

struct Avg;
impl BuiltinFunction for Avg {
    fn name(&self) -> &'static str {
        "avg"
    }
    fn min_arity(&self) -> usize {
        1
    }
    fn max_arity(&self) -> usize {
        usize::MAX
    }
    fn supports_vector_broadcasting(&self) -> bool {
        false
    }
    fn apply(&self, args: &[Value], _angle_unit: AngleUnit, span: Span) -> Result<Value, EvalError> {
        let items = flattened(args);
        let mut acc = Value::Rational(expr_core::Rational::zero());
        for v in &items {
            acc = broadcast::add(&acc, v, span)?;
        }
        broadcast::div(&acc, &Value::Double(items.len() as f64), span)
    }
}

/// `min`/`max`/`sum`/`avg` accept either a flat argument list (`max(1,2,3)`)
/// or a single vector argument (`max({1,2,3})`) — spread the latter so both
/// call shapes reduce the same way.
fn flattened(args: &[Value]) -> Vec<Value> {
    if let [one] = args {
        if let Value::Vector(items) = one.clone().materialized() {
            return items.to_vec();
        }
    }
    args.to_vec()
}

fn reduce(args: &[Value], span: Span, name: &str, pick: impl Fn(f64, f64) -> f64) -> Result<Value, EvalError> {
    let items = flattened(args);
    let mut iter = items.iter();
    let first = iter.next().ok_or_else(|| EvalError::type_error(format!("{name} requires at least one value"), span))?;
    let mut acc = first.as_f64().ok_or_else(|| EvalError::type_error(format!("{name} expects numbers"), span))?;
    for v in iter {
        let x = v.as_f64().ok_or_else(|| EvalError::type_error(format!("{name} expects numbers"), span))?;
        acc = pick(acc, x);
    }
    Ok(Value::Double(acc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::dummy()
    }

    fn r(n: i64) -> Value {
        Value::Rational(expr_core::Rational::from_i64(n))
    }

    #[test]
    fn sqrt_of_nine_is_three() {
        let reg = FunctionRegistry::new();
        let result = reg.call("sqrt", &[r(9)], AngleUnit::Radians, span()).unwrap();
        assert_eq!(result, Value::Double(3.0));
    }

    #[test]
    fn single_vector_argument_broadcasts_elementwise() {
        let reg = FunctionRegistry::new();
        let v = Value::vector(vec![r(4), r(9)]);
        let result = reg.call("sqrt", &[v], AngleUnit::Radians, span()).unwrap();
        assert_eq!(result, Value::vector(vec![Value::Double(2.0), Value::Double(3.0)]));
    }

    #[test]
    fn sin_consults_the_angle_unit() {
        let reg = FunctionRegistry::new();
        let result = reg.call("sin", &[Value::Double(90.0)], AngleUnit::Degrees, span()).unwrap();
        match result {
            Value::Double(d) => assert!((d - 1.0).abs() < 1e-10),
            other => panic!("expected Double, got {other:?}"),
        }
    }

    #[test]
    fn arity_error_on_too_many_arguments() {
        let reg = FunctionRegistry::new();
        let err = reg.call("sqrt", &[r(1), r(2)], AngleUnit::Radians, span());
        assert!(matches!(err, Err(EvalError::Arity { .. })));
    }

    #[test]
    fn max_reduces_a_flat_argument_list() {
        let reg = FunctionRegistry::new();
        let result = reg.call("max", &[r(3), r(7), r(2)], AngleUnit::Radians, span()).unwrap();
        assert_eq!(result, Value::Double(7.0));
    }

    #[test]
    fn sum_reduces_a_single_vector_argument() {
        let reg = FunctionRegistry::new();
        let v = Value::vector(vec![r(1), r(2), r(3)]);
        let result = reg.call("sum", &[v], AngleUnit::Radians, span()).unwrap();
        assert_eq!(result, r(6));
    }

    #[test]
    fn unknown_function_is_undefined() {
        let reg = FunctionRegistry::new();
        assert!(!reg.contains("not_a_function"));
    }
}
