//! Tree-walking evaluator (spec.md §4.10): turns a `Node` plus a mutable
//! `Context` into a `Value`.

use std::rc::Rc;

use expr_compiler::ast::{BinOp, Node, SliceArg};
use expr_core::{ConstantRegistry, ConstantValue, Rational, Span, UnitRegistry};

use crate::broadcast;
use crate::context::Context;
use crate::error::EvalError;
use crate::functions::FunctionRegistry;
use crate::operators::OperatorTable;
use crate::values::{FunctionDef, RangeValue, Value};

/// Resource bounds the evaluator enforces directly (parallels the scanner's
/// `max_identifier_length`, enforced in `expr-compiler` instead).
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    pub max_vector_size: usize,
    pub max_matrix_dimension: usize,
}

/// The evaluator-facing half of spec.md §6's feature-toggle surface
/// (`decimal_places` is a display concern, out of this crate's scope per
/// spec.md §1 "Output formatting ... beyond a structural display contract").
#[derive(Debug, Clone, Copy)]
pub struct FeatureFlags {
    pub force_double_arithmetic: bool,
    pub vectors_enabled: bool,
    pub matrices_enabled: bool,
    pub units_enabled: bool,
    pub comprehensions_enabled: bool,
    pub lambdas_enabled: bool,
    pub user_defined_functions_enabled: bool,
    /// Gates the implicit-multiplication-split fallback in
    /// `resolve_variable` (spec.md §4.10.1); the compiler's token-insertion
    /// pass itself always runs, since the evaluator has no say over how the
    /// AST it's handed was parsed.
    pub implicit_multiplication: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            force_double_arithmetic: false,
            vectors_enabled: true,
            matrices_enabled: true,
            units_enabled: true,
            comprehensions_enabled: true,
            lambdas_enabled: true,
            user_defined_functions_enabled: true,
            implicit_multiplication: true,
        }
    }
}

/// Which name-resolution priority order applies at a given call site
/// (spec.md §4.10.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionContext {
    General,
    CallTarget,
    PostfixUnit,
}

pub struct Evaluator<'a> {
    pub constants: &'a ConstantRegistry,
    pub units: &'a UnitRegistry,
    pub functions: &'a FunctionRegistry,
    pub operators: &'a OperatorTable,
    pub limits: ResourceLimits,
    pub flags: FeatureFlags,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        constants: &'a ConstantRegistry,
        units: &'a UnitRegistry,
        functions: &'a FunctionRegistry,
        operators: &'a OperatorTable,
        limits: ResourceLimits,
    ) -> Self {
        Self::with_flags(constants, units, functions, operators, limits, FeatureFlags::default())
    }

    pub fn with_flags(
        constants: &'a ConstantRegistry,
        units: &'a UnitRegistry,
        functions: &'a FunctionRegistry,
        operators: &'a OperatorTable,
        limits: ResourceLimits,
        flags: FeatureFlags,
    ) -> Self {
        Self {
            constants,
            units,
            functions,
            operators,
            limits,
            flags,
        }
    }

    fn require_feature(&self, enabled: bool, feature: &str, span: Span) -> Result<(), EvalError> {
        if enabled {
            Ok(())
        } else {
            Err(EvalError::type_error(format!("the '{feature}' feature is disabled in this engine's configuration"), span))
        }
    }

    pub fn evaluate(&self, node: &Node, ctx: &mut Context) -> Result<Value, EvalError> {
        let _guard = ctx.enter_expression(node.span())?;
        self.evaluate_inner(node, ctx)
    }

    fn evaluate_inner(&self, node: &Node, ctx: &mut Context) -> Result<Value, EvalError> {
        match node {
            Node::NumberLit(r, _) => {
                if self.flags.force_double_arithmetic {
                    Ok(Value::Double(r.to_f64()))
                } else {
                    Ok(Value::Rational(r.clone()))
                }
            }
            Node::ZeroDenominatorLit(lexeme, span) => {
                Err(EvalError::domain_error(format!("'{lexeme}' has a zero denominator"), *span))
            }
            Node::DoubleLit(d, _) => Ok(Value::Double(*d)),
            Node::StringLit(s, _) => Ok(Value::string(s.clone())),

            Node::Vector(elements, span) => {
                self.require_feature(self.flags.vectors_enabled, "vectors", *span)?;
                if elements.len() > self.limits.max_vector_size {
                    return Err(EvalError::resource_error(
                        format!("vector literal exceeds the maximum size of {}", self.limits.max_vector_size),
                        *span,
                    ));
                }
                let values = elements.iter().map(|e| self.evaluate(e, ctx)).collect::<Result<Vec<_>, _>>()?;
                Ok(Value::vector(values))
            }

            Node::Matrix(rows, span) => {
                self.require_feature(self.flags.matrices_enabled, "matrices", *span)?;
                if rows.len() > self.limits.max_matrix_dimension
                    || rows.iter().any(|r| r.len() > self.limits.max_matrix_dimension)
                {
                    return Err(EvalError::resource_error(
                        format!("matrix literal exceeds the maximum dimension of {}", self.limits.max_matrix_dimension),
                        *span,
                    ));
                }
                let values = rows
                    .iter()
                    .map(|row| row.iter().map(|e| self.evaluate(e, ctx)).collect::<Result<Vec<_>, _>>())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::matrix(values))
            }

            Node::Variable(name, span) => self.resolve_variable(name, ResolutionContext::General, ctx, *span),

            Node::PostfixUnit(name, span) => self.resolve_variable(name, ResolutionContext::PostfixUnit, ctx, *span),

            Node::UnitRef { name, span, .. } => {
                self.require_feature(self.flags.units_enabled, "units", *span)?;
                self.units
                    .lookup(name)
                    .map(|unit| Value::UnitValue(1.0, unit))
                    .ok_or_else(|| EvalError::undefined_unit(name.clone(), *span))
            }

            Node::VarRef(name, span) => ctx
                .get_variable(name)
                .ok_or_else(|| EvalError::undefined_variable(name.clone(), *span)),

            Node::ConstRef(name, span) => self
                .constants
                .lookup(name)
                .map(constant_to_value)
                .ok_or_else(|| EvalError::undefined_constant(name.clone(), *span)),

            Node::Binary { op, left, right, span } => self.evaluate_binary(*op, left, right, ctx, *span),

            Node::Unary { op, operand, span, .. } => {
                let value = self.evaluate(operand, ctx)?;
                self.operators.unary(*op).execute(&value, *span)
            }

            Node::Call { callee, args, span } => self.evaluate_call(callee, args, ctx, *span),

            Node::Subscript { target, indices, span } => {
                let value = self.evaluate(target, ctx)?;
                self.evaluate_subscript(value, indices, ctx, *span)
            }

            Node::Assignment { name, value, .. } => {
                let v = self.evaluate(value, ctx)?;
                ctx.set_variable(name.clone(), v.clone());
                Ok(v)
            }

            Node::FunctionDef { name, params, body, span } => {
                match name {
                    None => self.require_feature(self.flags.lambdas_enabled, "lambdas", *span)?,
                    Some(_) => self.require_feature(self.flags.user_defined_functions_enabled, "user-defined functions", *span)?,
                }
                let def = Rc::new(FunctionDef {
                    name: name.clone(),
                    params: params.clone(),
                    body: Rc::new((**body).clone()),
                    closure: if name.is_none() { Some(ctx.snapshot()) } else { None },
                });
                if let Some(name) = name {
                    ctx.define_function(name.clone(), Rc::clone(&def));
                }
                Ok(Value::Function(def))
            }

            Node::RangeExpr { start, end, step, span } => {
                let start = self.evaluate(start, ctx)?;
                let end = self.evaluate(end, ctx)?;
                let step = match step {
                    Some(s) => self.evaluate(s, ctx)?,
                    None => Value::Rational(Rational::one()),
                };
                let to_f64 = |v: &Value| v.as_f64().ok_or_else(|| EvalError::type_error("range bounds must be numeric", *span));
                Ok(Value::Range(RangeValue::new(to_f64(&start)?, to_f64(&end)?, to_f64(&step)?)))
            }

            Node::UnitConversion { value, target_unit, span } => {
                self.require_feature(self.flags.units_enabled, "units", *span)?;
                let value = self.evaluate(value, ctx)?;
                self.convert_unit(value, target_unit, *span)
            }

            Node::Comprehension { expr, iterators, condition, span } => {
                self.require_feature(self.flags.comprehensions_enabled, "comprehensions", *span)?;
                self.evaluate_comprehension(expr, iterators, condition, ctx, *span)
            }

            Node::Sequence(statements, span) => {
                let mut last = None;
                for s in statements {
                    last = Some(self.evaluate(s, ctx)?);
                }
                last.ok_or_else(|| EvalError::type_error("empty sequence has no value", *span))
            }
        }
    }

    fn evaluate_binary(&self, op: BinOp, left: &Node, right: &Node, ctx: &mut Context, span: Span) -> Result<Value, EvalError> {
        let left_value = self.evaluate(left, ctx)?;
        // `right` is only invoked through this thunk; And/Or in the operator
        // table decide whether to call it at all (spec.md §4.11).
        let mut right_thunk = || self.evaluate(right, ctx);
        self.operators.binary(op).execute(&left_value, &mut right_thunk, span)
    }

    /// Implements the full §4.10.1 priority table plus the implicit-
    /// multiplication-split fallback.
    fn resolve_variable(&self, name: &str, resolution: ResolutionContext, ctx: &Context, span: Span) -> Result<Value, EvalError> {
        match resolution {
            ResolutionContext::General => {
                if let Some(v) = ctx.get_variable(name) {
                    return Ok(v);
                }
                if let Some(def) = ctx.get_function(name) {
                    return Ok(Value::Function(def));
                }
                if self.flags.units_enabled {
                    if let Some(unit) = self.units.lookup(name) {
                        return Ok(Value::UnitValue(1.0, unit));
                    }
                }
                self.implicit_multiplication_split(name, ctx, span)
            }
            ResolutionContext::CallTarget => {
                if let Some(def) = ctx.get_function(name) {
                    return Ok(Value::Function(def));
                }
                ctx.get_variable(name).ok_or_else(|| EvalError::undefined_variable(name.to_string(), span))
            }
            ResolutionContext::PostfixUnit => {
                if self.flags.units_enabled {
                    if let Some(unit) = self.units.lookup(name) {
                        return Ok(Value::UnitValue(1.0, unit));
                    }
                }
                if let Some(v) = ctx.get_variable(name) {
                    return Ok(v);
                }
                self.implicit_multiplication_split(name, ctx, span)
            }
        }
    }

    /// Greedily splits `name` into the shortest sequence of prefixes that
    /// are each a defined variable, a known constant, or a user function,
    /// then reduces left-to-right with `*` (spec.md §4.10.1).
    fn implicit_multiplication_split(&self, name: &str, ctx: &Context, span: Span) -> Result<Value, EvalError> {
        self.require_feature(self.flags.implicit_multiplication, "implicit multiplication", span)?;
        if name.chars().count() < 2 {
            return Err(EvalError::undefined_variable(name.to_string(), span));
        }
        let pieces = self.split_into_known_pieces(name, ctx).ok_or_else(|| EvalError::undefined_variable(name.to_string(), span))?;
        let mut iter = pieces.into_iter();
        let mut acc = self.lookup_piece(&iter.next().unwrap(), ctx, span)?;
        for piece in iter {
            let value = self.lookup_piece(&piece, ctx, span)?;
            acc = broadcast::mul(&acc, &value, span)?;
        }
        Ok(acc)
    }

    fn split_into_known_pieces(&self, name: &str, ctx: &Context) -> Option<Vec<String>> {
        let chars: Vec<char> = name.chars().collect();
        fn recurse(chars: &[char], start: usize, known: &impl Fn(&str) -> bool) -> Option<Vec<String>> {
            if start == chars.len() {
                return Some(Vec::new());
            }
            for end in (start + 1)..=chars.len() {
                let piece: String = chars[start..end].iter().collect();
                if known(&piece) {
                    if let Some(mut rest) = recurse(chars, end, known) {
                        rest.insert(0, piece);
                        return Some(rest);
                    }
                }
            }
            None
        }
        let known = |piece: &str| ctx.has_variable(piece) || self.constants.contains(piece) || ctx.has_function(piece) || self.functions.contains(piece);
        recurse(&chars, 0, &known)
    }

    fn lookup_piece(&self, piece: &str, ctx: &Context, span: Span) -> Result<Value, EvalError> {
        if let Some(v) = ctx.get_variable(piece) {
            return Ok(v);
        }
        if let Some(c) = self.constants.lookup(piece) {
            return Ok(constant_to_value(c));
        }
        if let Some(def) = ctx.get_function(piece) {
            return Ok(Value::Function(def));
        }
        Err(EvalError::undefined_variable(piece.to_string(), span))
    }

    /// Dispatch order for `callee(args)` (spec.md §4.10.2).
    fn evaluate_call(&self, callee: &Node, args: &[Node], ctx: &mut Context, span: Span) -> Result<Value, EvalError> {
        if let Node::Variable(name, _) = callee {
            if name == "if" {
                return self.evaluate_if(args, ctx, span);
            }
            if let Some(def) = ctx.get_function(name) {
                return self.call_function_def(&def, args, ctx, span);
            }
            if self.functions.contains(name) {
                let values = args.iter().map(|a| self.evaluate(a, ctx)).collect::<Result<Vec<_>, _>>()?;
                return self.functions.call(name, &values, ctx.angle_unit(), span);
            }
            if let Some(value) = ctx.get_variable(name) {
                if let Value::Function(def) = &value {
                    return self.call_function_def(def, args, ctx, span);
                }
                if args.len() == 1 {
                    let arg = self.evaluate(&args[0], ctx)?;
                    return broadcast::mul(&value, &arg, span);
                }
                return Err(EvalError::type_error(format!("'{name}' is not a function"), span));
            }
            if let Some((var_prefix, function_suffix)) = self.split_call_name(name, ctx) {
                let var = ctx.get_variable(&var_prefix).expect("split_call_name only returns confirmed variables");
                let values = args.iter().map(|a| self.evaluate(a, ctx)).collect::<Result<Vec<_>, _>>()?;
                let call_result = self.functions.call(&function_suffix, &values, ctx.angle_unit(), span)?;
                return broadcast::mul(&var, &call_result, span);
            }
            return Err(EvalError::undefined_function(name.clone(), span));
        }

        let callee_value = self.evaluate(callee, ctx)?;
        match callee_value {
            Value::Function(def) => self.call_function_def(&def, args, ctx, span),
            other => Err(EvalError::type_error(format!("a {} is not callable", other.type_name()), span)),
        }
    }

    /// Splits `name` into `var_prefix + function_suffix` where the prefix is
    /// a defined variable and the suffix is a known function name (spec.md
    /// §4.10.2 rule 5).
    fn split_call_name(&self, name: &str, ctx: &Context) -> Option<(String, String)> {
        let chars: Vec<char> = name.chars().collect();
        for split in 1..chars.len() {
            let prefix: String = chars[..split].iter().collect();
            let suffix: String = chars[split..].iter().collect();
            if ctx.has_variable(&prefix) && self.functions.contains(&suffix) {
                return Some((prefix, suffix));
            }
        }
        None
    }

    fn evaluate_if(&self, args: &[Node], ctx: &mut Context, span: Span) -> Result<Value, EvalError> {
        let [cond, then_branch, else_branch] = args else {
            return Err(EvalError::Arity {
                function: "if".to_string(),
                min: 3,
                max: 3,
                got: args.len(),
                span,
            });
        };
        let cond_value = self.evaluate(cond, ctx)?;
        if cond_value.is_truthy() {
            self.evaluate(then_branch, ctx)
        } else {
            self.evaluate(else_branch, ctx)
        }
    }

    fn call_function_def(&self, def: &Rc<FunctionDef>, args: &[Node], ctx: &mut Context, span: Span) -> Result<Value, EvalError> {
        if args.len() != def.params.len() {
            return Err(EvalError::Arity {
                function: def.name.clone().unwrap_or_else(|| "<lambda>".to_string()),
                min: def.params.len(),
                max: def.params.len(),
                got: args.len(),
                span,
            });
        }
        let values = args.iter().map(|a| self.evaluate(a, ctx)).collect::<Result<Vec<_>, _>>()?;

        let _call_guard = ctx.enter_call_guarded(span)?;
        // Lambdas resolve free names lexically against their captured
        // snapshot; regular definitions resolve dynamically against the
        // caller (spec.md §4.10.2, §5).
        let mut child = match &def.closure {
            Some(closure) => closure.child(),
            None => ctx.child(),
        };
        for (param, value) in def.params.iter().zip(values) {
            child.set_variable(param.clone(), value);
        }
        self.evaluate(&def.body, &mut child)
    }

    fn evaluate_subscript(&self, target: Value, indices: &[SliceArg], ctx: &mut Context, span: Span) -> Result<Value, EvalError> {
        let target = target.materialized();
        match (&target, indices) {
            (Value::Vector(items), [arg]) => self.subscript_vector(items, arg, ctx, span),
            (Value::Matrix(rows), [row_arg]) => {
                let row = self.slice_axis(rows.len(), row_arg, ctx, span)?;
                match row {
                    AxisSelection::Single(i) => Ok(Value::vector(rows[i].clone())),
                    AxisSelection::Range(r) => Ok(Value::matrix(rows[r].to_vec())),
                }
            }
            (Value::Matrix(rows), [row_arg, col_arg]) => {
                let row_sel = self.slice_axis(rows.len(), row_arg, ctx, span)?;
                let col_count = rows.first().map(|r| r.len()).unwrap_or(0);
                let col_sel = self.slice_axis(col_count, col_arg, ctx, span)?;
                match (row_sel, col_sel) {
                    (AxisSelection::Single(r), AxisSelection::Single(c)) => Ok(rows[r][c].clone()),
                    (AxisSelection::Single(r), AxisSelection::Range(cs)) => Ok(Value::vector(rows[r][cs].to_vec())),
                    (AxisSelection::Range(rs), AxisSelection::Single(c)) => Ok(Value::vector(rows[rs].iter().map(|row| row[c].clone()).collect())),
                    (AxisSelection::Range(rs), AxisSelection::Range(cs)) => {
                        Ok(Value::matrix(rows[rs].iter().map(|row| row[cs.clone()].to_vec()).collect()))
                    }
                }
            }
            _ => Err(EvalError::type_error(format!("cannot subscript a {}", target.type_name()), span)),
        }
    }

    fn subscript_vector(&self, items: &Rc<Vec<Value>>, arg: &SliceArg, ctx: &mut Context, span: Span) -> Result<Value, EvalError> {
        match self.slice_axis(items.len(), arg, ctx, span)? {
            AxisSelection::Single(i) => Ok(items[i].clone()),
            AxisSelection::Range(r) => Ok(Value::vector(items[r].to_vec())),
        }
    }

    /// Evaluates one slice-arg against an axis of length `len`, applying
    /// negative-index wraparound and half-open clamping (spec.md §4.10.3).
    fn slice_axis(&self, len: usize, arg: &SliceArg, ctx: &mut Context, span: Span) -> Result<AxisSelection, EvalError> {
        let as_index = |n: i64| -> usize {
            let wrapped = if n < 0 { n + len as i64 } else { n };
            wrapped.clamp(0, len as i64) as usize
        };
        if !arg.is_range && arg.start.is_some() && arg.end.is_none() {
            let start = self.evaluate_index(arg.start.as_ref().unwrap(), ctx, span)?;
            let wrapped = if start < 0 { start + len as i64 } else { start };
            if wrapped < 0 || wrapped as usize >= len {
                return Err(EvalError::domain_error(format!("index {start} is out of bounds for length {len}"), span));
            }
            return Ok(AxisSelection::Single(wrapped as usize));
        }
        let start = match &arg.start {
            Some(e) => as_index(self.evaluate_index(e, ctx, span)?),
            None => 0,
        };
        let end = match &arg.end {
            Some(e) => as_index(self.evaluate_index(e, ctx, span)?),
            None => len,
        };
        Ok(AxisSelection::Range(start..end.max(start)))
    }

    fn evaluate_index(&self, node: &Node, ctx: &mut Context, span: Span) -> Result<i64, EvalError> {
        let value = self.evaluate(node, ctx)?;
        value
            .as_f64()
            .map(|f| f as i64)
            .ok_or_else(|| EvalError::type_error("subscript indices must be numeric", span))
    }

    fn convert_unit(&self, value: Value, target_unit: &str, span: Span) -> Result<Value, EvalError> {
        let target = self.units.lookup(target_unit).ok_or_else(|| EvalError::undefined_unit(target_unit.to_string(), span))?;
        match value {
            Value::UnitValue(v, from) => {
                let converted = self
                    .units
                    .convert(v, from, target)
                    .ok_or_else(|| EvalError::domain_error(format!("cannot convert {} to {}", from.category, target.category), span))?;
                Ok(Value::UnitValue(converted, target))
            }
            other if other.as_f64().is_some() => Ok(Value::UnitValue(other.as_f64().unwrap(), target)),
            other => Err(EvalError::type_error(format!("cannot convert a {} to a unit", other.type_name()), span)),
        }
    }

    fn evaluate_comprehension(
        &self,
        expr: &Node,
        iterators: &[(String, Node)],
        condition: &Option<Box<Node>>,
        ctx: &mut Context,
        span: Span,
    ) -> Result<Value, EvalError> {
        let mut results = Vec::new();
        self.comprehend(expr, iterators, condition, 0, ctx, &mut results, span)?;
        if results.len() > self.limits.max_vector_size {
            return Err(EvalError::resource_error(
                format!("comprehension result exceeds the maximum vector size of {}", self.limits.max_vector_size),
                span,
            ));
        }
        Ok(Value::vector(results))
    }

    /// Leftmost iterator varies slowest (spec.md §5 "Ordering").
    fn comprehend(
        &self,
        expr: &Node,
        iterators: &[(String, Node)],
        condition: &Option<Box<Node>>,
        depth: usize,
        ctx: &mut Context,
        results: &mut Vec<Value>,
        span: Span,
    ) -> Result<(), EvalError> {
        if depth == iterators.len() {
            let include = match condition {
                Some(c) => self.evaluate(c, ctx)?.is_truthy(),
                None => true,
            };
            if include {
                results.push(self.evaluate(expr, ctx)?);
            }
            return Ok(());
        }
        let (var, iterable) = &iterators[depth];
        let source = self.evaluate(iterable, ctx)?.materialized();
        let items = match source {
            Value::Vector(items) => items,
            other => return Err(EvalError::type_error(format!("cannot iterate over a {}", other.type_name()), span)),
        };
        if items.len() > self.limits.max_vector_size {
            return Err(EvalError::resource_error(
                format!("comprehension source exceeds the maximum vector size of {}", self.limits.max_vector_size),
                span,
            ));
        }
        for item in items.iter() {
            let mut child = ctx.child();
            child.set_variable(var.clone(), item.clone());
            self.comprehend(expr, iterators, condition, depth + 1, &mut child, results, span)?;
        }
        Ok(())
    }
}

enum AxisSelection {
    Single(usize),
    Range(std::ops::Range<usize>),
}

fn constant_to_value(c: ConstantValue) -> Value {
    match c {
        ConstantValue::Float(f) => Value::Double(f),
        ConstantValue::Bool(b) => Value::Boolean(b),
        ConstantValue::Infinity => Value::Double(f64::INFINITY),
        ConstantValue::Nan => Value::Double(f64::NAN),
    }
}
