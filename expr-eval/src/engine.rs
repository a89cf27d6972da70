//! Embedding façade (spec.md §6): the single entry point an embedder talks
//! to — construct once with an `EngineConfig`, then `evaluate`/`compile`
//! against a session-persistent `Context`.

use std::collections::HashSet;

use expr_compiler::Node;
use expr_core::{AngleUnit, ConstantRegistry, UnitRegistry};

use crate::context::Context;
use crate::error::EvalError;
use crate::evaluator::{Evaluator, FeatureFlags, ResourceLimits};
use crate::functions::FunctionRegistry;
use crate::operators::OperatorTable;
use crate::values::Value;

/// Every configuration knob spec.md §6 enumerates, each with the stated
/// default.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub angle_unit: AngleUnit,
    pub force_double_arithmetic: bool,
    /// `-1` means full precision (spec.md §6).
    pub decimal_places: i32,
    pub max_recursion_depth: usize,
    pub max_expression_depth: usize,
    pub max_vector_size: usize,
    pub max_matrix_dimension: usize,
    pub max_identifier_length: usize,
    pub implicit_multiplication: bool,
    pub vectors_enabled: bool,
    pub matrices_enabled: bool,
    pub units_enabled: bool,
    pub comprehensions_enabled: bool,
    pub lambdas_enabled: bool,
    pub user_defined_functions_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            angle_unit: AngleUnit::Radians,
            force_double_arithmetic: false,
            decimal_places: -1,
            max_recursion_depth: 256,
            max_expression_depth: 1024,
            max_vector_size: 100_000,
            max_matrix_dimension: 1_000,
            max_identifier_length: 256,
            implicit_multiplication: true,
            vectors_enabled: true,
            matrices_enabled: true,
            units_enabled: true,
            comprehensions_enabled: true,
            lambdas_enabled: true,
            user_defined_functions_enabled: true,
        }
    }
}

/// A compiled AST paired with its originating source text, reusable across
/// repeated `evaluate_compiled` calls against the same or a different
/// context (spec.md §6 "`compile(source) -> CompiledExpression`").
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    pub node: Node,
    pub source: String,
}

/// Owns the immutable registries/tables plus one session `Context`; the
/// registries and tables are built once and shared by every `evaluate` call
/// (spec.md §5 "one evaluator, one context, one caller").
pub struct Engine {
    config: EngineConfig,
    constants: ConstantRegistry,
    units: UnitRegistry,
    functions: FunctionRegistry,
    operators: OperatorTable,
    context: Context,
}

impl Engine {
    pub fn create() -> Self {
        Self::create_with_config(EngineConfig::default())
    }

    pub fn create_with_config(config: EngineConfig) -> Self {
        let context = Context::new(config.angle_unit, config.max_recursion_depth, config.max_expression_depth);
        Self {
            config,
            constants: ConstantRegistry::new(),
            units: UnitRegistry::new(),
            functions: FunctionRegistry::new(),
            operators: OperatorTable::new(),
            context,
        }
    }

    fn function_names(&self) -> HashSet<String> {
        let mut names: HashSet<String> = self.functions.names().map(|s| s.to_string()).collect();
        names.extend(self.context_function_names());
        names
    }

    fn context_function_names(&self) -> Vec<String> {
        // User-defined functions live in the session context and are
        // resolved dynamically at call time; the splitter/classifier only
        // need the built-in set to recognise call syntax up front, so
        // session-defined names aren't required here.
        Vec::new()
    }

    pub fn compile(&self, source: &str) -> Result<CompiledExpression, EvalError> {
        let functions = self.function_names();
        let node = expr_compiler::compile_with_limits(source, &self.constants, &self.units, &functions, self.config.max_identifier_length)?;
        Ok(CompiledExpression {
            node,
            source: source.to_string(),
        })
    }

    pub fn evaluate(&mut self, source: &str) -> Result<Value, EvalError> {
        let compiled = self.compile(source)?;
        self.evaluate_compiled(&compiled)
    }

    pub fn evaluate_compiled(&mut self, compiled: &CompiledExpression) -> Result<Value, EvalError> {
        let evaluator = Evaluator::with_flags(
            &self.constants,
            &self.units,
            &self.functions,
            &self.operators,
            ResourceLimits {
                max_vector_size: self.config.max_vector_size,
                max_matrix_dimension: self.config.max_matrix_dimension,
            },
            FeatureFlags {
                force_double_arithmetic: self.config.force_double_arithmetic,
                vectors_enabled: self.config.vectors_enabled,
                matrices_enabled: self.config.matrices_enabled,
                units_enabled: self.config.units_enabled,
                comprehensions_enabled: self.config.comprehensions_enabled,
                lambdas_enabled: self.config.lambdas_enabled,
                user_defined_functions_enabled: self.config.user_defined_functions_enabled,
                implicit_multiplication: self.config.implicit_multiplication,
            },
        );
        evaluator.evaluate(&compiled.node, &mut self.context)
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.context.set_variable(name, value);
    }

    pub fn get_variable(&self, name: &str) -> Option<Value> {
        self.context.get_variable(name)
    }

    pub fn clear_variables(&mut self) {
        self.context.clear_variables();
    }

    pub fn clear_functions(&mut self) {
        self.context.clear_functions();
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_radians_and_unbounded_precision() {
        let config = EngineConfig::default();
        assert_eq!(config.angle_unit, AngleUnit::Radians);
        assert_eq!(config.decimal_places, -1);
    }

    #[test]
    fn evaluates_a_simple_expression() {
        let mut engine = Engine::create();
        let result = engine.evaluate("2 + 3 * 4").unwrap();
        assert_eq!(result, Value::Rational(expr_core::Rational::from_i64(14)));
    }

    #[test]
    fn session_context_persists_assignments_across_calls() {
        let mut engine = Engine::create();
        engine.evaluate("x := 41").unwrap();
        let result = engine.evaluate("x + 1").unwrap();
        assert_eq!(result, Value::Rational(expr_core::Rational::from_i64(42)));
    }

    #[test]
    fn compiled_expression_is_reusable_against_a_changed_context() {
        let mut engine = Engine::create();
        engine.set_variable("x", Value::Double(1.0));
        let compiled = engine.compile("x + 1").unwrap();
        let first = engine.evaluate_compiled(&compiled).unwrap();
        assert_eq!(first, Value::Double(2.0));
        engine.set_variable("x", Value::Double(10.0));
        let second = engine.evaluate_compiled(&compiled).unwrap();
        assert_eq!(second, Value::Double(11.0));
    }

    #[test]
    fn identifier_length_bound_is_enforced() {
        let mut config = EngineConfig::default();
        config.max_identifier_length = 3;
        let mut engine = Engine::create_with_config(config);
        assert!(engine.evaluate("averylongname").is_err());
    }

    #[test]
    fn force_double_arithmetic_config_flag_reaches_the_evaluator() {
        let mut config = EngineConfig::default();
        config.force_double_arithmetic = true;
        let mut engine = Engine::create_with_config(config);
        let result = engine.evaluate("5").unwrap();
        assert_eq!(result, Value::Double(5.0));
    }

    #[test]
    fn vectors_disabled_config_flag_reaches_the_evaluator() {
        let mut config = EngineConfig::default();
        config.vectors_enabled = false;
        let mut engine = Engine::create_with_config(config);
        assert!(engine.evaluate("{1,2,3}").is_err());
    }

    #[test]
    fn implicit_multiplication_disabled_config_flag_reaches_the_evaluator() {
        let mut config = EngineConfig::default();
        config.implicit_multiplication = false;
        let mut engine = Engine::create_with_config(config);
        engine.set_variable("x", Value::Rational(expr_core::Rational::from_i64(3)));
        engine.set_variable("y", Value::Rational(expr_core::Rational::from_i64(4)));
        assert!(engine.evaluate("xy").is_err());
    }
}
