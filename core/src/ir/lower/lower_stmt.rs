//! Lowering of loops and `lock` into labels, gotos and try/finally.
//!
//! Loops use the caller's break/continue labels when present and fresh
//! ones otherwise. None of these routines introduce a value: every result
//! is a `void` block.

use std::sync::Arc;

use super::err::LoweringError;
use super::lowering_context::LoweringContext;
use crate::ast::stmt::{DoWhile, For, Lock, While};
use crate::ir::expr::{Expr, LabelTarget};
use crate::ir::types::Type;
use crate::ir::wellknown;

fn loop_label(given: Option<&LabelTarget>, ctx: &LoweringContext, hint: &str) -> LabelTarget {
    given.cloned().unwrap_or_else(|| ctx.label(Type::Void, hint))
}

/// `if (!test) goto exit;`
fn exit_unless(test: &Expr, exit: &LabelTarget) -> Result<Expr, LoweringError> {
    Ok(Expr::if_then(Expr::not(test.clone())?, Expr::goto(exit.clone())?)?)
}

pub(super) fn lower_while(node: &Arc<While>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let brk = loop_label(node.break_label(), ctx, "break");
    let cont = loop_label(node.continue_label(), ctx, "continue");
    let body = vec![
        Expr::label(cont.clone(), None)?,
        exit_unless(node.test(), &brk)?,
        node.body().clone(),
        Expr::goto(cont)?,
        Expr::label(brk, None)?,
    ];
    Ok(Expr::block_typed(Type::Void, Vec::new(), body)?)
}

pub(super) fn lower_do_while(node: &Arc<DoWhile>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let brk = loop_label(node.break_label(), ctx, "break");
    let cont = loop_label(node.continue_label(), ctx, "continue");
    let top = ctx.label(Type::Void, "top");
    let body = vec![
        Expr::label(top.clone(), None)?,
        node.body().clone(),
        Expr::label(cont, None)?,
        Expr::if_then(node.test().clone(), Expr::goto(top)?)?,
        Expr::label(brk, None)?,
    ];
    Ok(Expr::block_typed(Type::Void, Vec::new(), body)?)
}

pub(super) fn lower_for(node: &Arc<For>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let brk = loop_label(node.break_label(), ctx, "break");
    let cont = loop_label(node.continue_label(), ctx, "continue");
    let top = ctx.label(Type::Void, "top");

    let mut body: Vec<Expr> = node.initializers().to_vec();
    body.push(Expr::label(top.clone(), None)?);
    if let Some(test) = node.test() {
        body.push(exit_unless(test, &brk)?);
    }
    body.push(node.body().clone());
    body.push(Expr::label(cont, None)?);
    body.extend(node.iterators().iter().cloned());
    body.push(Expr::goto(top)?);
    body.push(Expr::label(brk, None)?);
    Ok(Expr::block_typed(Type::Void, node.variables().to_vec(), body)?)
}

/// `lock (e) body` as
///
/// ```text
/// { obj = e; taken = false;
///   try { Monitor.Enter(obj, ref taken); body; }
///   finally { if (taken) Monitor.Exit(obj); } }
/// ```
pub(super) fn lower_lock(node: &Arc<Lock>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let obj = ctx.temp(node.expression().ty(), "lock");
    let taken = ctx.temp(Type::Bool, "lockTaken");

    let enter = Expr::call(None, wellknown::monitor_enter(), vec![obj.expr(), taken.expr()])?;
    let protected = Expr::block_typed(Type::Void, Vec::new(), vec![enter, node.body().clone(), Expr::empty()])?;
    let exit = Expr::call(None, wellknown::monitor_exit(), vec![obj.expr()])?;
    let release = Expr::if_then(taken.expr(), exit)?;

    let body = vec![
        Expr::assign(obj.expr(), node.expression().clone())?,
        Expr::assign(taken.expr(), Expr::boolean(false))?,
        Expr::try_finally(protected, release),
    ];
    Ok(Expr::block_typed(Type::Void, vec![obj, taken], body)?)
}
