pub mod ast;
pub mod error;
pub mod ir;
pub mod options;
pub mod vm;

pub use ast::{ConstructionError, Node, NodeKind};
pub use error::{Level, LowerkitErrorExt};
pub use ir::lower::err::LoweringError;
pub use ir::lower::lowering_context::LoweringContext;
pub use ir::{Expr, ExprKind, LabelTarget, Type, Variable, reduce_extensions, reduce_extensions_with, verify};
pub use options::LoweringOptions;
pub use vm::{EvalError, Value, evaluate};

pub fn generate_error_report<E: LowerkitErrorExt + ?Sized>(error: &E) -> String {
    let level = error.level();
    let issuer = error.issuer();
    let message = error.message();

    format!("LOWERKIT | {} | {} | {}", level, issuer, message)
}

/// Reduce `expr` to primitive nodes and evaluate it with `bindings`.
pub fn lower_and_evaluate(expr: &Expr, bindings: &[(Variable, Value)]) -> Result<Value, Box<dyn LowerkitErrorExt>> {
    let reduced = reduce_extensions(expr).map_err(|e| Box::new(e) as Box<dyn LowerkitErrorExt>)?;
    evaluate(&reduced, bindings).map_err(|e| Box::new(e) as Box<dyn LowerkitErrorExt>)
}
