//! Evaluation context (spec.md §3.5): variable/function maps, angle-unit
//! setting, recursion tracking, and the parent pointer that gives lexical
//! scoping its shape.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use expr_core::AngleUnit;

use crate::values::{FunctionDef, Value};

/// Child contexts share the parent's recursion counter (one counter per
/// call chain, not per scope) and borrow a cheap `Rc` clone of the parent's
/// maps — deeper ancestors are never re-copied since they're already
/// behind `Rc` (spec.md §5 "one evaluator, one context, one caller").
#[derive(Debug, Clone)]
pub struct Context {
    variables: HashMap<String, Value>,
    functions: HashMap<String, Rc<FunctionDef>>,
    parent: Option<Rc<Context>>,
    angle_unit: AngleUnit,
    recursion_depth: Rc<Cell<usize>>,
    max_recursion_depth: usize,
    /// Nesting depth of `evaluate` calls, distinct from `recursion_depth`
    /// (which only counts user-function invocations): a deeply nested
    /// literal expression with no function calls must still be bounded
    /// (SPEC_FULL.md §3 "Resource accounting").
    expression_depth: Rc<Cell<usize>>,
    max_expression_depth: usize,
}

impl Context {
    pub fn new(angle_unit: AngleUnit, max_recursion_depth: usize, max_expression_depth: usize) -> Self {
        Self {
            variables: HashMap::new(),
            functions: HashMap::new(),
            parent: None,
            angle_unit,
            recursion_depth: Rc::new(Cell::new(0)),
            max_recursion_depth,
            expression_depth: Rc::new(Cell::new(0)),
            max_expression_depth,
        }
    }

    /// Builds a fresh child scope whose parent is a (cheap) copy of
    /// `self`, used both for dynamic-scope function calls (the parent is
    /// the live caller context) and as the starting point for a lambda
    /// closure snapshot (spec.md §3.5 "a structural copy of the current
    /// variable map").
    pub fn child(&self) -> Context {
        Context {
            variables: HashMap::new(),
            functions: HashMap::new(),
            parent: Some(Rc::new(self.clone())),
            angle_unit: self.angle_unit,
            recursion_depth: Rc::clone(&self.recursion_depth),
            max_recursion_depth: self.max_recursion_depth,
            expression_depth: Rc::clone(&self.expression_depth),
            max_expression_depth: self.max_expression_depth,
        }
    }

    /// A structural copy of the current scope with no parent link of its
    /// own recursion counter reset — used when a lambda captures its
    /// defining environment (spec.md §3.3, §5).
    pub fn snapshot(&self) -> Context {
        self.clone()
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    pub fn get_variable(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.variables.get(name) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.get_variable(name))
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
            || self.parent.as_ref().map(|p| p.has_variable(name)).unwrap_or(false)
    }

    pub fn clear_variables(&mut self) {
        self.variables.clear();
    }

    pub fn define_function(&mut self, name: impl Into<String>, def: Rc<FunctionDef>) {
        self.functions.insert(name.into(), def);
    }

    pub fn get_function(&self, name: &str) -> Option<Rc<FunctionDef>> {
        if let Some(f) = self.functions.get(name) {
            return Some(Rc::clone(f));
        }
        self.parent.as_ref().and_then(|p| p.get_function(name))
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
            || self.parent.as_ref().map(|p| p.has_function(name)).unwrap_or(false)
    }

    pub fn clear_functions(&mut self) {
        self.functions.clear();
    }

    pub fn angle_unit(&self) -> AngleUnit {
        self.angle_unit
    }

    pub fn set_angle_unit(&mut self, unit: AngleUnit) {
        self.angle_unit = unit;
    }

    /// Increments the shared recursion counter. Returns `false` once the
    /// configured maximum is exceeded; callers must still call
    /// [`Context::leave_call`] on every exit path including errors
    /// (spec.md §4.10.2, §7 propagation policy).
    pub fn enter_call(&self) -> bool {
        let depth = self.recursion_depth.get() + 1;
        self.recursion_depth.set(depth);
        depth <= self.max_recursion_depth
    }

    pub fn leave_call(&self) {
        let depth = self.recursion_depth.get();
        if depth > 0 {
            self.recursion_depth.set(depth - 1);
        }
    }

    pub fn recursion_depth(&self) -> usize {
        self.recursion_depth.get()
    }

    /// Bumps the expression-nesting counter and returns a guard that
    /// decrements it on drop — covers every exit path, including `?`
    /// early-returns on error (spec.md §7 propagation policy).
    pub fn enter_expression(&self, span: expr_core::Span) -> Result<ExpressionDepthGuard<'_>, crate::error::EvalError> {
        let depth = self.expression_depth.get() + 1;
        self.expression_depth.set(depth);
        if depth > self.max_expression_depth {
            self.expression_depth.set(depth - 1);
            return Err(crate::error::EvalError::resource_error(
                format!("expression nesting exceeds the maximum of {}", self.max_expression_depth),
                span,
            ));
        }
        Ok(ExpressionDepthGuard { counter: &self.expression_depth })
    }

    /// Bumps the recursion counter for a user-function call and returns a
    /// guard that decrements it on drop, so every exit path (including
    /// errors) restores the counter (spec.md §4.10.2, §7).
    pub fn enter_call_guarded(&self, span: expr_core::Span) -> Result<CallDepthGuard<'_>, crate::error::EvalError> {
        if !self.enter_call() {
            self.leave_call();
            return Err(crate::error::EvalError::StackOverflow { span });
        }
        Ok(CallDepthGuard { counter: &self.recursion_depth })
    }
}

/// RAII guard that decrements the expression-depth counter on drop.
pub struct ExpressionDepthGuard<'a> {
    counter: &'a Rc<Cell<usize>>,
}

impl Drop for ExpressionDepthGuard<'_> {
    fn drop(&mut self) {
        let depth = self.counter.get();
        if depth > 0 {
            self.counter.set(depth - 1);
        }
    }
}

/// RAII guard that decrements the recursion counter on drop.
pub struct CallDepthGuard<'a> {
    counter: &'a Rc<Cell<usize>>,
}

impl Drop for CallDepthGuard<'_> {
    fn drop(&mut self) {
        let depth = self.counter.get();
        if depth > 0 {
            self.counter.set(depth - 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_scope_sees_parent_variables() {
        let mut root = Context::new(AngleUnit::Radians, 64, 1024);
        root.set_variable("x", Value::Double(10.0));
        let child = root.child();
        assert_eq!(child.get_variable("x"), Some(Value::Double(10.0)));
    }

    #[test]
    fn child_scope_mutation_does_not_leak_to_parent() {
        let mut root = Context::new(AngleUnit::Radians, 64, 1024);
        root.set_variable("x", Value::Double(10.0));
        let mut child = root.child();
        child.set_variable("x", Value::Double(20.0));
        assert_eq!(root.get_variable("x"), Some(Value::Double(10.0)));
        assert_eq!(child.get_variable("x"), Some(Value::Double(20.0)));
    }

    #[test]
    fn snapshot_is_independent_of_later_parent_mutation() {
        let mut root = Context::new(AngleUnit::Radians, 64, 1024);
        root.set_variable("x", Value::Double(10.0));
        let snapshot = root.snapshot();
        root.set_variable("x", Value::Double(999.0));
        assert_eq!(snapshot.get_variable("x"), Some(Value::Double(10.0)));
    }

    #[test]
    fn recursion_counter_is_shared_across_the_call_chain() {
        let root = Context::new(AngleUnit::Radians, 2, 1024);
        assert!(root.enter_call());
        let child = root.child();
        assert!(child.enter_call());
        assert!(!child.enter_call()); // exceeds max of 2
        child.leave_call();
        root.leave_call();
        assert_eq!(root.recursion_depth(), 1);
    }
}
