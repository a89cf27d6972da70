//! Runtime values, the broadcasting arithmetic engine, operator/function
//! registries, the evaluation context, the tree-walking evaluator, and the
//! `Engine` embedding façade (spec.md §2, §4.6-§4.11, §5, §6).
//!
//! Depends on `expr-core` and `expr-compiler`; nothing downstream depends
//! on this crate, keeping the workspace's dependency order leaves-first.

pub mod broadcast;
pub mod context;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod operators;
pub mod values;

pub use context::Context;
pub use engine::{CompiledExpression, Engine, EngineConfig};
pub use error::EvalError;
pub use evaluator::{Evaluator, FeatureFlags, ResolutionContext, ResourceLimits};
pub use functions::{BuiltinFunction, FunctionRegistry};
pub use operators::{BinaryOperator, OperatorTable, UnaryOperator};
pub use values::{FunctionDef, RangeValue, Value};
