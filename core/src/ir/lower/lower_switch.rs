//! file: core/src/ir/lower/lower_switch.rs
//! description: lowering of the three switch forms into test chains.
//!
//! The subject is evaluated once into its own temporary. Tests run in
//! source order and jump to the matching arm or section; the default
//! section, wherever it appears, is only taken after every other test
//! failed.

use std::sync::Arc;

use log::trace;

use super::block_builder::BlockBuilder;
use super::err::LoweringError;
use super::lowering_context::LoweringContext;
use crate::ast::pattern::Pattern;
use crate::ast::switch::{CaseSwitch, SwitchExpression, SwitchStatement, TestValue};
use crate::ir::expr::{Expr, GotoKind, LabelTarget, Variable};
use crate::ir::types::Type;
use crate::ir::wellknown;

/// Test of `pattern` (and `guard`, if any) against the subject variable.
fn arm_test(pattern: &Pattern, guard: Option<&Expr>, subject: &Variable) -> Result<Expr, LoweringError> {
    let input = Expr::convert_if_needed(subject.expr(), pattern.input_type())?;
    let test = pattern.reduce(&input)?;
    Ok(match guard {
        Some(g) if test.is_true_constant() => g.clone(),
        Some(g) => Expr::and_also(test, g.clone())?,
        None => test,
    })
}

/// `throw new SwitchExpressionException((object)subject)`
fn no_match(subject: &Variable) -> Result<Expr, LoweringError> {
    let exception = Expr::new(wellknown::switch_exception_constructor(), vec![Expr::boxed(subject.expr())?])?;
    Ok(Expr::throw(exception, Type::Void)?)
}

pub(super) fn lower_switch_expression(node: &Arc<SwitchExpression>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let ty = node.ty().clone();
    let mut bb = BlockBuilder::new(ctx);
    let subject = bb.capture(node.subject().clone(), "subject")?;
    for v in node.variables() {
        bb.declare(&v);
    }
    let end = ctx.label(ty.clone(), "switch");

    let mut exhausted = false;
    for (i, arm) in node.arms().iter().enumerate() {
        let test = arm_test(arm.pattern(), arm.guard(), &subject)?;
        let jump = Expr::make_goto(GotoKind::Goto, end.clone(), Some(arm.value().clone()))?;
        if test.is_true_constant() {
            trace!("switch arm {} always matches; later arms are unreachable", i);
            bb.emit(jump);
            exhausted = true;
            break;
        }
        bb.emit(Expr::if_then(test, jump)?);
    }
    if !exhausted {
        bb.emit(no_match(&subject)?);
    }
    let result = Expr::label(end, Some(Expr::default(ty)))?;
    Ok(bb.finish(result)?)
}

/// Shared tail of both switch statements: the test chain, the fall-through
/// jump and the section bodies, each leaving through `brk`.
fn emit_sections(
    bb: &mut BlockBuilder,
    tests: Vec<(Expr, usize)>,
    default: Option<usize>,
    bodies: Vec<Expr>,
    brk: LabelTarget,
    ctx: &LoweringContext,
) -> Result<(), LoweringError> {
    let labels: Vec<LabelTarget> = (0..bodies.len()).map(|i| ctx.label(Type::Void, &format!("case{}", i))).collect();
    for (test, section) in tests {
        let jump = Expr::goto(labels[section].clone())?;
        if test.is_true_constant() {
            bb.emit(jump);
            break;
        }
        bb.emit(Expr::if_then(test, jump)?);
    }
    let fallback = match default {
        Some(section) => labels[section].clone(),
        None => brk.clone(),
    };
    bb.emit(Expr::goto(fallback)?);
    for (label, body) in labels.into_iter().zip(bodies) {
        bb.emit(Expr::label(label, None)?);
        bb.emit(body);
        bb.emit(Expr::goto(brk.clone())?);
    }
    bb.emit(Expr::label(brk, None)?);
    Ok(())
}

pub(super) fn lower_switch_statement(node: &Arc<SwitchStatement>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let mut bb = BlockBuilder::new(ctx);
    let subject = bb.capture(node.subject().clone(), "subject")?;
    let brk = node.break_label().cloned().unwrap_or_else(|| ctx.label(Type::Void, "break"));

    let mut tests = Vec::new();
    let mut default = None;
    let mut bodies = Vec::with_capacity(node.sections().len());
    for (i, section) in node.sections().iter().enumerate() {
        for v in section.variables() {
            bb.declare(v);
        }
        for label in section.labels() {
            match label.pattern() {
                None => default = Some(i),
                Some(p) => {
                    for v in p.variables() {
                        bb.declare(&v);
                    }
                    tests.push((arm_test(p, label.guard(), &subject)?, i));
                }
            }
        }
        bodies.push(section.body().clone());
    }
    emit_sections(&mut bb, tests, default, bodies, brk, ctx)?;
    Ok(bb.finish_typed(Type::Void)?)
}

/// `subject == value` for one literal test value.
fn case_test(subject: &Variable, value: &TestValue) -> Result<Option<Expr>, LoweringError> {
    match value {
        TestValue::Default => Ok(None),
        TestValue::Literal(v) if v.is_null() => Ok(Some(Expr::is_null(subject.expr())?)),
        TestValue::Literal(v) => {
            let constant = Expr::constant(v.clone(), subject.ty().clone())?;
            Ok(Some(Expr::equal(subject.expr(), constant)?))
        }
    }
}

pub(super) fn lower_case_switch(node: &Arc<CaseSwitch>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let mut bb = BlockBuilder::new(ctx);
    let subject = bb.capture(node.subject().clone(), "subject")?;
    let brk = node.break_label().cloned().unwrap_or_else(|| ctx.label(Type::Void, "break"));

    let mut tests = Vec::new();
    let mut default = None;
    let mut bodies = Vec::with_capacity(node.cases().len());
    for (i, case) in node.cases().iter().enumerate() {
        if case.is_default() {
            default = Some(i);
        }
        let mut combined: Option<Expr> = None;
        for tv in case.test_values() {
            if let Some(test) = case_test(&subject, tv)? {
                combined = Some(match combined {
                    Some(prev) => Expr::or_else(prev, test)?,
                    None => test,
                });
            }
        }
        if let Some(test) = combined {
            tests.push((test, i));
        }
        bodies.push(case.body().clone());
    }
    emit_sections(&mut bb, tests, default, bodies, brk, ctx)?;
    Ok(bb.finish_typed(Type::Void)?)
}
