//! Black-box end-to-end tests against the public `Engine` surface,
//! covering the scenarios and quantified invariants from spec.md §8.

use num_bigint::BigInt;

use expr_core::{AngleUnit, Rational};
use expr_eval::{EngineConfig, EvalError, Engine, Value};

#[test]
fn arithmetic_scenario() {
    let mut engine = Engine::create();
    assert_eq!(engine.evaluate("2 + 3 * 4").unwrap(), Value::Rational(Rational::from_i64(14)));
}

#[test]
fn sine_of_pi_over_two_in_radians() {
    let mut engine = Engine::create();
    let result = engine.evaluate("sin(pi/2)").unwrap();
    match result {
        Value::Double(d) => assert!((d - 1.0).abs() < 1e-10),
        other => panic!("expected a double, got {other:?}"),
    }
}

#[test]
fn sine_of_ninety_in_degrees() {
    let mut config = EngineConfig::default();
    config.angle_unit = AngleUnit::Degrees;
    let mut engine = Engine::create_with_config(config);
    let result = engine.evaluate("sin(90)").unwrap();
    match result {
        Value::Double(d) => assert!((d - 1.0).abs() < 1e-10),
        other => panic!("expected a double, got {other:?}"),
    }
}

#[test]
fn vector_plus_scalar_broadcasts_over_every_element() {
    let mut engine = Engine::create();
    let result = engine.evaluate("{1,2,3} + 5").unwrap();
    assert_eq!(
        result,
        Value::vector(vec![
            Value::Rational(Rational::from_i64(6)),
            Value::Rational(Rational::from_i64(7)),
            Value::Rational(Rational::from_i64(8)),
        ])
    );
}

#[test]
fn zero_padded_vector_broadcast() {
    // invariant 9: {1, 2} + {10, 20, 30} yields {11, 22, 30}.
    let mut engine = Engine::create();
    let result = engine.evaluate("{1,2} + {10,20,30}").unwrap();
    assert_eq!(
        result,
        Value::vector(vec![
            Value::Rational(Rational::from_i64(11)),
            Value::Rational(Rational::from_i64(22)),
            Value::Rational(Rational::from_i64(30)),
        ])
    );
}

#[test]
fn assignment_and_function_definition_scenario() {
    let mut engine = Engine::create();
    let result = engine.evaluate("x := 10; f(n) := n*n; f(x)").unwrap();
    assert_eq!(result, Value::Rational(Rational::from_i64(100)));
}

#[test]
fn recursive_factorial_scenario() {
    let mut engine = Engine::create();
    let result = engine.evaluate("factorial(n) := if(n <= 1, 1, n * factorial(n-1)); factorial(5)").unwrap();
    assert_eq!(result, Value::Rational(Rational::from_i64(120)));
}

#[test]
fn unit_conversion_scenario() {
    let mut engine = Engine::create();
    let result = engine.evaluate("100 meters in feet").unwrap();
    match result {
        Value::UnitValue(v, unit) => {
            assert_eq!(unit.singular, "feet");
            assert!((v - 328.083_989_5).abs() < 1e-6);
        }
        other => panic!("expected a unit value, got {other:?}"),
    }
}

#[test]
fn exact_rational_arithmetic_closure() {
    // invariant 10: 1/2 + 1/3 returns Rational(5, 6); mixing with a Double
    // promotes to Double.
    let mut engine = Engine::create();
    assert_eq!(engine.evaluate("1/2 + 1/3").unwrap(), Value::Rational(Rational::new(BigInt::from(5), BigInt::from(6)).unwrap()));
    match engine.evaluate("1/2 + 0.5").unwrap() {
        Value::Double(d) => assert!((d - 1.0).abs() < 1e-12),
        other => panic!("expected a double, got {other:?}"),
    }
}

#[test]
fn lambda_captures_its_defining_scope_not_the_caller() {
    // invariant 11: after x := 10; f := (x -> y -> x + y); f(1)(2) = 3;
    // reassigning the outer x afterwards doesn't change an already-bound lambda.
    let mut engine = Engine::create();
    engine.evaluate("x := 10").unwrap();
    engine.evaluate("f := x -> y -> x + y").unwrap();
    assert_eq!(engine.evaluate("f(1)(2)").unwrap(), Value::Rational(Rational::from_i64(3)));
    engine.evaluate("x := 999").unwrap();
    assert_eq!(engine.evaluate("f(1)(2)").unwrap(), Value::Rational(Rational::from_i64(3)));
}

#[test]
fn lazy_if_never_evaluates_the_untaken_branch() {
    // invariant 7: if(true, 1, 1/0) and if(false, 1/0, 1) both evaluate
    // without error, even though the untaken branch would raise if forced.
    let mut engine = Engine::create();
    assert_eq!(engine.evaluate("if(true, 1, 1/0)").unwrap(), Value::Rational(Rational::from_i64(1)));
    assert_eq!(engine.evaluate("if(false, 1/0, 1)").unwrap(), Value::Rational(Rational::from_i64(1)));
}

#[test]
fn deep_recursion_raises_stack_overflow_once_the_configured_depth_is_exceeded() {
    // invariant 12: a deep recursive user function terminates with
    // StackOverflow once the configured depth is exceeded.
    let mut config = EngineConfig::default();
    config.max_recursion_depth = 16;
    let mut engine = Engine::create_with_config(config);
    engine.evaluate("count_down(n) := if(n <= 0, 0, count_down(n-1))").unwrap();
    let err = engine.evaluate("count_down(10000)").unwrap_err();
    assert!(matches!(err, EvalError::StackOverflow { .. }));
}

#[test]
fn shadowing_a_constant_name_does_not_shadow_its_hash_prefixed_reference() {
    // invariant 13: after pi := 100, `pi` evaluates to 100 while `#pi`
    // evaluates to the mathematical constant.
    let mut engine = Engine::create();
    engine.evaluate("pi := 100").unwrap();
    assert_eq!(engine.evaluate("pi").unwrap(), Value::Rational(Rational::from_i64(100)));
    match engine.evaluate("#pi").unwrap() {
        Value::Double(d) => assert!((d - std::f64::consts::PI).abs() < 1e-12),
        other => panic!("expected the mathematical constant, got {other:?}"),
    }
}

#[test]
fn unit_reference_wins_over_a_shadowing_variable_through_explicit_at_prefix() {
    let mut engine = Engine::create();
    engine.evaluate("m := 5").unwrap();
    let result = engine.evaluate("100 @m in feet").unwrap();
    assert!(matches!(result, Value::UnitValue(..)));
}
