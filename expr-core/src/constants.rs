//! The built-in constant catalog (spec.md §4.9): named numeric literals
//! that resolve like variables but cannot be reassigned through ordinary
//! assignment without an explicit shadow.

use std::collections::HashMap;
use std::f64::consts;

/// A constant's value, already in the representation the evaluator wants.
/// Kept crate-local to `expr-core` (no dependency on `expr-eval::Value`) so
/// the registry stays usable from `expr-compiler` for name resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstantValue {
    Float(f64),
    Bool(bool),
    /// `infinity`/`nan` are carried as their own variant so callers don't
    /// have to special-case `f64::INFINITY`/`NAN` pattern matching.
    Infinity,
    Nan,
}

const NUMBER_WORDS: &[(&str, f64)] = &[
    ("zero", 0.0),
    ("one", 1.0),
    ("two", 2.0),
    ("three", 3.0),
    ("four", 4.0),
    ("five", 5.0),
    ("six", 6.0),
    ("seven", 7.0),
    ("eight", 8.0),
    ("nine", 9.0),
    ("ten", 10.0),
    ("hundred", 100.0),
    ("thousand", 1_000.0),
    ("million", 1_000_000.0),
    ("billion", 1_000_000_000.0),
];

pub struct ConstantRegistry {
    by_name: HashMap<&'static str, ConstantValue>,
}

impl ConstantRegistry {
    pub fn new() -> Self {
        let mut by_name = HashMap::new();
        by_name.insert("pi", ConstantValue::Float(consts::PI));
        by_name.insert("e", ConstantValue::Float(consts::E));
        by_name.insert("tau", ConstantValue::Float(consts::TAU));
        by_name.insert("phi", ConstantValue::Float(1.618_033_988_749_895));
        by_name.insert("true", ConstantValue::Bool(true));
        by_name.insert("false", ConstantValue::Bool(false));
        by_name.insert("infinity", ConstantValue::Infinity);
        by_name.insert("inf", ConstantValue::Infinity);
        by_name.insert("nan", ConstantValue::Nan);
        for (name, value) in NUMBER_WORDS {
            by_name.insert(name, ConstantValue::Float(*value));
        }
        Self { by_name }
    }

    pub fn lookup(&self, name: &str) -> Option<ConstantValue> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_name.keys().copied()
    }
}

impl Default for ConstantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pi_and_tau_are_present_and_distinct() {
        let reg = ConstantRegistry::new();
        let ConstantValue::Float(pi) = reg.lookup("pi").unwrap() else {
            panic!("pi should be a float constant");
        };
        let ConstantValue::Float(tau) = reg.lookup("tau").unwrap() else {
            panic!("tau should be a float constant");
        };
        assert!((tau - 2.0 * pi).abs() < 1e-12);
    }

    #[test]
    fn boolean_literals_resolve_through_the_same_registry() {
        let reg = ConstantRegistry::new();
        assert_eq!(reg.lookup("true"), Some(ConstantValue::Bool(true)));
        assert_eq!(reg.lookup("false"), Some(ConstantValue::Bool(false)));
    }

    #[test]
    fn number_words_cover_thousand_and_million() {
        let reg = ConstantRegistry::new();
        assert_eq!(reg.lookup("thousand"), Some(ConstantValue::Float(1000.0)));
        assert_eq!(reg.lookup("million"), Some(ConstantValue::Float(1_000_000.0)));
    }

    #[test]
    fn unknown_name_is_absent() {
        let reg = ConstantRegistry::new();
        assert!(reg.lookup("not_a_constant").is_none());
    }
}
