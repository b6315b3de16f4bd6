use crate::ast::err::ConstructionResult;
use crate::ir::expr::{Expr, ExprKind, Variable};
use crate::ir::types::Type;

use super::lowering_context::LoweringContext;

/// Accumulates the temporaries and statements of one lowered node and
/// finishes them into a single block. A builder that never declared a
/// temporary and holds a single expression finishes into that expression
/// unchanged.
pub struct BlockBuilder<'a> {
    ctx: &'a LoweringContext,
    variables: Vec<Variable>,
    exprs: Vec<Expr>,
}

/// No observable effect and the same value on every evaluation.
pub fn is_pure(expr: &Expr) -> bool {
    matches!(
        expr.kind(),
        ExprKind::Constant { .. } | ExprKind::Default { .. } | ExprKind::Variable(_) | ExprKind::Lambda { .. }
    )
}

/// Same value however the surrounding operands reassign variables.
pub fn is_invariant(expr: &Expr) -> bool {
    matches!(expr.kind(), ExprKind::Constant { .. } | ExprKind::Default { .. } | ExprKind::Lambda { .. })
}

impl<'a> BlockBuilder<'a> {
    pub fn new(ctx: &'a LoweringContext) -> Self {
        BlockBuilder { ctx, variables: Vec::new(), exprs: Vec::new() }
    }

    pub fn declare(&mut self, variable: &Variable) {
        if !self.variables.contains(variable) {
            self.variables.push(variable.clone());
        }
    }

    /// Declare a fresh temporary in this block.
    pub fn temp(&mut self, ty: Type, hint: &str) -> Variable {
        let v = self.ctx.temp(ty, hint);
        self.variables.push(v.clone());
        v
    }

    pub fn emit(&mut self, expr: Expr) {
        self.exprs.push(expr);
    }

    /// Evaluate `expr` once into a temporary and return the temporary, or
    /// return `expr` itself when re-reading it is harmless.
    pub fn spill(&mut self, expr: Expr, hint: &str) -> ConstructionResult<Expr> {
        if is_pure(&expr) {
            return Ok(expr);
        }
        let v = self.temp(expr.ty(), hint);
        self.emit(Expr::assign(v.expr(), expr)?);
        Ok(v.expr())
    }

    /// Evaluate `expr` into a fresh temporary, variables included.
    pub fn capture(&mut self, expr: Expr, hint: &str) -> ConstructionResult<Variable> {
        let v = self.temp(expr.ty(), hint);
        self.emit(Expr::assign(v.expr(), expr)?);
        Ok(v)
    }

    /// Like `spill`, but always yields a variable.
    pub fn spill_to_variable(&mut self, expr: Expr, hint: &str) -> ConstructionResult<Variable> {
        if let Some(v) = expr.as_variable() {
            return Ok(v.clone());
        }
        let v = self.temp(expr.ty(), hint);
        self.emit(Expr::assign(v.expr(), expr)?);
        Ok(v)
    }

    /// Finish with `result` as the value of the block.
    pub fn finish(mut self, result: Expr) -> ConstructionResult<Expr> {
        if self.variables.is_empty() && self.exprs.is_empty() {
            return Ok(result);
        }
        let ty = result.ty();
        self.exprs.push(result);
        Expr::block_typed(ty, self.variables, self.exprs)
    }

    /// Finish as a block of type `ty` made of the emitted statements.
    pub fn finish_typed(self, ty: Type) -> ConstructionResult<Expr> {
        Expr::block_typed(ty, self.variables, self.exprs)
    }
}
