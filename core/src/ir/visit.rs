//! file: core/src/ir/visit.rs
//! description: generic tree rewriting with structural sharing.
//!
//! A `Rewriter` overrides the hooks it cares about and relies on `walk_expr`
//! and `walk_node` for the rest. Children are visited in their declared
//! order; a node whose visited children are all the original instances is
//! returned as is, so an identity rewrite allocates nothing.

use std::sync::Arc;

use super::expr::{ElementInit, Expr, ExprKind};
use crate::ast::args::ParameterAssignment;
use crate::ast::err::ConstructionError;
use crate::ast::kind::Node;
use crate::ast::switch::{SwitchCase, SwitchExpressionArm, SwitchLabel, SwitchSection};

pub trait Rewriter {
    type Error: From<ConstructionError>;

    fn visit(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        walk_expr(self, expr)
    }

    /// Called for every `Extension` node; `expr` is the wrapping expression.
    fn visit_extension(&mut self, expr: &Expr, node: &Node) -> Result<Expr, Self::Error> {
        walk_node(self, expr, node)
    }
}

fn visit_opt<R: Rewriter + ?Sized>(v: &mut R, expr: Option<&Expr>) -> Result<Option<Expr>, R::Error> {
    expr.map(|e| v.visit(e)).transpose()
}

/// Visit every expression; the flag tells whether any of them changed.
fn visit_all<R: Rewriter + ?Sized>(v: &mut R, exprs: &[Expr]) -> Result<(Vec<Expr>, bool), R::Error> {
    let mut out = Vec::with_capacity(exprs.len());
    let mut changed = false;
    for e in exprs {
        let n = v.visit(e)?;
        changed |= !n.ptr_eq(e);
        out.push(n);
    }
    Ok((out, changed))
}

fn changed_opt(a: &Option<Expr>, b: Option<&Expr>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => !x.ptr_eq(y),
        (None, None) => false,
        _ => true,
    }
}

fn visit_arguments<R: Rewriter + ?Sized>(
    v: &mut R,
    arguments: &[ParameterAssignment],
) -> Result<Vec<ParameterAssignment>, R::Error> {
    let mut out = Vec::with_capacity(arguments.len());
    for a in arguments {
        let e = v.visit(a.expression())?;
        out.push(a.update(e)?);
    }
    Ok(out)
}

/// Rewrite the children of a primitive node.
pub fn walk_expr<R: Rewriter + ?Sized>(v: &mut R, expr: &Expr) -> Result<Expr, R::Error> {
    let rebuilt = match expr.kind() {
        ExprKind::Constant { .. } | ExprKind::Default { .. } | ExprKind::Variable(_) => return Ok(expr.clone()),
        ExprKind::Extension(node) => return v.visit_extension(expr, node),
        ExprKind::Assign { target, value } => {
            let (t, val) = (v.visit(target)?, v.visit(value)?);
            if t.ptr_eq(target) && val.ptr_eq(value) {
                return Ok(expr.clone());
            }
            Expr::assign(t, val)?
        }
        ExprKind::Unary { op, operand, ty, method } => {
            let o = v.visit(operand)?;
            if o.ptr_eq(operand) {
                return Ok(expr.clone());
            }
            Expr::from_kind(ExprKind::Unary { op: *op, operand: o, ty: ty.clone(), method: method.clone() })
        }
        ExprKind::Binary { op, left, right, ty, method, lifted } => {
            let (l, r) = (v.visit(left)?, v.visit(right)?);
            if l.ptr_eq(left) && r.ptr_eq(right) {
                return Ok(expr.clone());
            }
            Expr::from_kind(ExprKind::Binary {
                op: *op,
                left: l,
                right: r,
                ty: ty.clone(),
                method: method.clone(),
                lifted: *lifted,
            })
        }
        ExprKind::TypeIs { operand, test_type } => {
            let o = v.visit(operand)?;
            if o.ptr_eq(operand) {
                return Ok(expr.clone());
            }
            Expr::type_is(o, test_type.clone())
        }
        ExprKind::Conditional { test, if_true, if_false, ty } => {
            let (t, a, b) = (v.visit(test)?, v.visit(if_true)?, v.visit(if_false)?);
            if t.ptr_eq(test) && a.ptr_eq(if_true) && b.ptr_eq(if_false) {
                return Ok(expr.clone());
            }
            Expr::condition_typed(t, a, b, ty.clone())?
        }
        ExprKind::Block { variables, expressions, ty } => {
            let (exprs, changed) = visit_all(v, expressions)?;
            if !changed {
                return Ok(expr.clone());
            }
            Expr::block_typed(ty.clone(), variables.clone(), exprs)?
        }
        ExprKind::Label { target, default_value } => {
            let d = visit_opt(v, default_value.as_ref())?;
            if !changed_opt(&d, default_value.as_ref()) {
                return Ok(expr.clone());
            }
            Expr::label(target.clone(), d)?
        }
        ExprKind::Goto { kind, target, value } => {
            let val = visit_opt(v, value.as_ref())?;
            if !changed_opt(&val, value.as_ref()) {
                return Ok(expr.clone());
            }
            Expr::make_goto(*kind, target.clone(), val)?
        }
        ExprKind::Try { body, finally } => {
            let (b, f) = (v.visit(body)?, v.visit(finally)?);
            if b.ptr_eq(body) && f.ptr_eq(finally) {
                return Ok(expr.clone());
            }
            Expr::try_finally(b, f)
        }
        ExprKind::Throw { value, ty } => {
            let val = v.visit(value)?;
            if val.ptr_eq(value) {
                return Ok(expr.clone());
            }
            Expr::throw(val, ty.clone())?
        }
        ExprKind::Call { instance, method, arguments } => {
            let inst = visit_opt(v, instance.as_ref())?;
            let (args, changed) = visit_all(v, arguments)?;
            if !changed && !changed_opt(&inst, instance.as_ref()) {
                return Ok(expr.clone());
            }
            Expr::call(inst, method, args)?
        }
        ExprKind::New { constructor, arguments } => {
            let (args, changed) = visit_all(v, arguments)?;
            if !changed {
                return Ok(expr.clone());
            }
            Expr::new(constructor, args)?
        }
        ExprKind::Invoke { target, arguments } => {
            let t = v.visit(target)?;
            let (args, changed) = visit_all(v, arguments)?;
            if !changed && t.ptr_eq(target) {
                return Ok(expr.clone());
            }
            Expr::invoke(t, args)?
        }
        ExprKind::Member { instance, member } => {
            let inst = visit_opt(v, instance.as_ref())?;
            if !changed_opt(&inst, instance.as_ref()) {
                return Ok(expr.clone());
            }
            Expr::member(inst, member)?
        }
        ExprKind::Index { instance, indexer, arguments } => {
            let inst = v.visit(instance)?;
            let (args, changed) = visit_all(v, arguments)?;
            if !changed && inst.ptr_eq(instance) {
                return Ok(expr.clone());
            }
            Expr::index(inst, indexer, args)?
        }
        ExprKind::ArrayIndex { array, indexes } => {
            let a = v.visit(array)?;
            let (idx, changed) = visit_all(v, indexes)?;
            if !changed && a.ptr_eq(array) {
                return Ok(expr.clone());
            }
            Expr::array_index(a, idx)?
        }
        ExprKind::ArrayLength { array } => {
            let a = v.visit(array)?;
            if a.ptr_eq(array) {
                return Ok(expr.clone());
            }
            Expr::array_length(a)?
        }
        ExprKind::NewArray { element_type, expressions } => {
            let (exprs, changed) = visit_all(v, expressions)?;
            if !changed {
                return Ok(expr.clone());
            }
            Expr::new_array(element_type.clone(), exprs)?
        }
        ExprKind::Lambda { parameters, body, ty } => {
            let b = v.visit(body)?;
            if b.ptr_eq(body) {
                return Ok(expr.clone());
            }
            let ret = ty.function_signature().map(|(_, r)| r.clone());
            Expr::lambda(parameters.clone(), b, ret)?
        }
        ExprKind::Quote { lambda } => {
            let l = v.visit(lambda)?;
            if l.ptr_eq(lambda) {
                return Ok(expr.clone());
            }
            Expr::quote(l)?
        }
        ExprKind::MemberInit { new_expression, bindings } => {
            let n = v.visit(new_expression)?;
            let mut changed = !n.ptr_eq(new_expression);
            let mut out = Vec::with_capacity(bindings.len());
            for b in bindings {
                let e = v.visit(b.expression())?;
                changed |= !e.ptr_eq(b.expression());
                out.push(b.update(e)?);
            }
            if !changed {
                return Ok(expr.clone());
            }
            Expr::member_init(n, out)?
        }
        ExprKind::ListInit { new_expression, initializers } => {
            let n = v.visit(new_expression)?;
            let mut changed = !n.ptr_eq(new_expression);
            let mut out = Vec::with_capacity(initializers.len());
            for init in initializers {
                let (args, c) = visit_all(v, &init.arguments)?;
                changed |= c;
                out.push(if c { ElementInit::new(&init.add_method, args)? } else { init.clone() });
            }
            if !changed {
                return Ok(expr.clone());
            }
            Expr::list_init(n, out)?
        }
    };
    Ok(rebuilt)
}

/// Wrap an updated payload, or hand back `expr` when `update` returned the
/// original instance.
fn rewrap<T>(expr: &Expr, old: &Arc<T>, new: Arc<T>) -> Expr
where
    Arc<T>: Into<Expr>,
{
    if Arc::ptr_eq(old, &new) { expr.clone() } else { new.into() }
}

/// Rewrite the children of an extended node and `update` it.
pub fn walk_node<R: Rewriter + ?Sized>(v: &mut R, expr: &Expr, node: &Node) -> Result<Expr, R::Error> {
    let out = match node {
        Node::AssignBinary(n) => {
            let left = v.visit(n.left())?;
            let lc = visit_opt(v, n.left_conversion())?;
            let right = v.visit(n.right())?;
            let fc = visit_opt(v, n.final_conversion())?;
            rewrap(expr, n, n.update(left, lc, right, fc)?)
        }
        Node::AssignUnary(n) => {
            let operand = v.visit(n.operand())?;
            rewrap(expr, n, n.update(operand)?)
        }
        Node::Call(n) => {
            let instance = visit_opt(v, n.instance())?;
            let args = visit_arguments(v, n.arguments())?;
            rewrap(expr, n, n.update(instance, args)?)
        }
        Node::Invoke(n) => {
            let target = v.visit(n.target())?;
            let args = visit_arguments(v, n.arguments())?;
            rewrap(expr, n, n.update(target, args)?)
        }
        Node::New(n) => {
            let args = visit_arguments(v, n.arguments())?;
            rewrap(expr, n, n.update(args)?)
        }
        Node::Index(n) => {
            let object = v.visit(n.object())?;
            let args = visit_arguments(v, n.arguments())?;
            rewrap(expr, n, n.update(object, args)?)
        }
        Node::ConditionalAccess(n) => {
            let receiver = v.visit(n.receiver())?;
            let when_not_null = v.visit(n.when_not_null())?;
            rewrap(expr, n, n.update(receiver, when_not_null)?)
        }
        Node::ConditionalReceiver(_) | Node::Discard(_) => expr.clone(),
        Node::While(n) => {
            let test = v.visit(n.test())?;
            let body = v.visit(n.body())?;
            rewrap(expr, n, n.update(test, body)?)
        }
        Node::DoWhile(n) => {
            let body = v.visit(n.body())?;
            let test = v.visit(n.test())?;
            rewrap(expr, n, n.update(body, test)?)
        }
        Node::For(n) => {
            let (inits, _) = visit_all(v, n.initializers())?;
            let test = visit_opt(v, n.test())?;
            let (iters, _) = visit_all(v, n.iterators())?;
            let body = v.visit(n.body())?;
            rewrap(expr, n, n.update(inits, test, iters, body)?)
        }
        Node::SwitchExpression(n) => {
            let subject = v.visit(n.subject())?;
            let mut arms: Vec<SwitchExpressionArm> = Vec::with_capacity(n.arms().len());
            for arm in n.arms() {
                let guard = visit_opt(v, arm.guard())?;
                let value = v.visit(arm.value())?;
                arms.push(arm.update(guard, value)?);
            }
            rewrap(expr, n, n.update(subject, arms)?)
        }
        Node::SwitchStatement(n) => {
            let subject = v.visit(n.subject())?;
            let mut sections: Vec<SwitchSection> = Vec::with_capacity(n.sections().len());
            for section in n.sections() {
                let mut labels: Vec<SwitchLabel> = Vec::with_capacity(section.labels().len());
                for label in section.labels() {
                    let guard = visit_opt(v, label.guard())?;
                    labels.push(label.update(guard)?);
                }
                let body = v.visit(section.body())?;
                sections.push(section.update(labels, body)?);
            }
            rewrap(expr, n, n.update(subject, sections)?)
        }
        Node::CaseSwitch(n) => {
            let subject = v.visit(n.subject())?;
            let mut cases: Vec<SwitchCase> = Vec::with_capacity(n.cases().len());
            for case in n.cases() {
                let body = v.visit(case.body())?;
                cases.push(case.update(body)?);
            }
            rewrap(expr, n, n.update(subject, cases)?)
        }
        Node::TupleLiteral(n) => {
            let (args, _) = visit_all(v, n.arguments())?;
            rewrap(expr, n, n.update(args)?)
        }
        Node::TupleConvert(n) => {
            let operand = v.visit(n.operand())?;
            let (convs, _) = visit_all(v, n.conversions())?;
            rewrap(expr, n, n.update(operand, convs)?)
        }
        Node::InterpolatedString(n) => {
            let mut parts = Vec::with_capacity(n.parts().len());
            for part in n.parts() {
                parts.push(match part.value() {
                    Some(value) => part.update(v.visit(value)?),
                    None => part.clone(),
                });
            }
            rewrap(expr, n, n.update(parts)?)
        }
        Node::Lock(n) => {
            let object = v.visit(n.expression())?;
            let body = v.visit(n.body())?;
            rewrap(expr, n, n.update(object, body)?)
        }
        Node::FromEndIndex(n) => {
            let operand = v.visit(n.operand())?;
            rewrap(expr, n, n.update(operand)?)
        }
        Node::ArrayAccess(n) => {
            let array = v.visit(n.array())?;
            let index = v.visit(n.index())?;
            rewrap(expr, n, n.update(array, index)?)
        }
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::stmt::While;
    use crate::ir::expr::Variable;
    use crate::ir::types::Type;

    struct Identity;

    impl Rewriter for Identity {
        type Error = ConstructionError;
    }

    #[test]
    fn identity_rewrite_keeps_every_instance() {
        let x = Variable::named("x", Type::I32);
        let body = Expr::assign(x.expr(), Expr::int32(1)).unwrap();
        let w: Expr = While::new(Expr::boolean(false), body, None, None).unwrap().into();
        let tree = Expr::block_with(vec![x], vec![w, Expr::empty()]).unwrap();
        let out = Identity.visit(&tree).unwrap();
        assert!(out.ptr_eq(&tree));
    }
}
