//! Reference evaluator for reduced expression trees.
//!
//! Lowered output is checked by running it: `evaluate` walks a tree that
//! contains only primitive nodes, with exceptions and monitors modelled in
//! `host`.

pub mod exec;
pub mod host;
pub mod value;

pub use exec::{EvalError, Scope, evaluate};
pub use value::Value;
