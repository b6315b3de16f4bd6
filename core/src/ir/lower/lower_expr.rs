//! file: core/src/ir/lower/lower_expr.rs
//! description: lowering of expression-shaped extended nodes.
//!
//! Assignments spill the operands of their target into temporaries so the
//! location is evaluated once even when it is both read and written.

use std::fmt::Write as _;
use std::sync::Arc;

use log::trace;

use super::block_builder::BlockBuilder;
use super::err::LoweringError;
use super::lower_objects;
use super::lowering_context::LoweringContext;
use crate::ast::access::ConditionalAccess;
use crate::ast::err::ConstructionError;
use crate::ast::expr::{ArrayAccess, AssignBinary, AssignUnary, FromEndIndex};
use crate::ast::interp::{InterpolatedString, Interpolation};
use crate::ast::kind::{AssignOp, Node};
use crate::ir::expr::{Expr, ExprKind};
use crate::ir::op::UnaryOp;
use crate::ir::types::Type;
use crate::ir::value::ConstValue;
use crate::ir::visit::{Rewriter, walk_node};
use crate::ir::wellknown::{self, FORMAT_MAX_FIXED};

/// Statically known to evaluate to null.
pub(super) fn is_null_literal(expr: &Expr) -> bool {
    match expr.kind() {
        ExprKind::Constant { value: ConstValue::Null, .. } => true,
        ExprKind::Default { ty } => ty.can_be_null(),
        _ => false,
    }
}

/// Statically known never to evaluate to null.
fn is_never_null(expr: &Expr) -> bool {
    match expr.kind() {
        ExprKind::New { .. }
        | ExprKind::NewArray { .. }
        | ExprKind::Lambda { .. }
        | ExprKind::Quote { .. }
        | ExprKind::MemberInit { .. }
        | ExprKind::ListInit { .. } => true,
        ExprKind::Constant { value, .. } => !value.is_null(),
        ExprKind::Extension(Node::New(_)) => true,
        _ => false,
    }
}

/// Location form of an assignment target, with every operand of the
/// location evaluated once into `bb`.
fn spill_target(target: &Expr, bb: &mut BlockBuilder, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let loc = match target.kind() {
        ExprKind::Variable(_) | ExprKind::Member { instance: None, .. } => target.clone(),
        ExprKind::Member { instance: Some(instance), member } => {
            let instance = bb.spill(instance.clone(), "instance")?;
            Expr::member(Some(instance), member)?
        }
        ExprKind::Index { instance, indexer, arguments } => {
            let instance = bb.spill(instance.clone(), "instance")?;
            let mut args = Vec::with_capacity(arguments.len());
            for a in arguments {
                args.push(bb.spill(a.clone(), "index")?);
            }
            Expr::index(instance, indexer, args)?
        }
        ExprKind::ArrayIndex { array, indexes } => {
            let array = bb.spill(array.clone(), "array")?;
            let mut idx = Vec::with_capacity(indexes.len());
            for i in indexes {
                idx.push(bb.spill(i.clone(), "index")?);
            }
            Expr::array_index(array, idx)?
        }
        ExprKind::Extension(Node::Index(ix)) => lower_objects::index_location(ix, bb)?,
        ExprKind::Extension(Node::ArrayAccess(aa)) => array_access_location(aa, bb)?,
        _ => {
            return Err(LoweringError::new(
                format!("{} cannot be lowered as an assignment target", target.kind_name()),
                "lowerkit.ir.lower.lower_expr.spill_target",
            ));
        }
    };
    Ok(loc)
}

fn array_access_location(access: &ArrayAccess, bb: &mut BlockBuilder) -> Result<Expr, LoweringError> {
    let array = bb.spill(access.array().clone(), "array")?;
    let index = bb.spill(access.index().clone(), "index")?;
    let offset = if index.ty() == Type::I32 {
        index
    } else {
        let length = Expr::array_length(array.clone())?;
        bb.spill(Expr::call(Some(index), wellknown::index_get_offset(), vec![length])?, "offset")?
    };
    Ok(Expr::array_index(array, vec![offset])?)
}

pub(super) fn lower_assign_binary(node: &Arc<AssignBinary>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let left = node.left();
    let ty = node.ty().clone();
    let mut bb = BlockBuilder::new(ctx);

    if node.op() == AssignOp::Assign {
        if let Some(Node::Discard(_)) = left.as_node() {
            return Ok(Expr::convert_if_needed(node.right().clone(), &ty)?);
        }
        if !left.is_extension() {
            return Ok(Expr::assign(left.clone(), node.right().clone())?);
        }
        let loc = spill_target(left, &mut bb, ctx)?;
        return Ok(bb.finish(Expr::assign(loc, node.right().clone())?)?);
    }

    let loc = spill_target(left, &mut bb, ctx)?;

    if node.op() == AssignOp::Coalesce {
        let left_ty = left.ty();
        let current = bb.spill(loc.clone(), "current")?;
        let store = if ty == left_ty {
            Expr::assign(loc, Expr::convert_if_needed(node.right().clone(), &ty)?)?
        } else {
            let value = bb.temp(ty.clone(), "value");
            Expr::block(vec![
                Expr::assign(value.expr(), node.right().clone())?,
                Expr::assign(loc, Expr::convert(value.expr(), left_ty)?)?,
                value.expr(),
            ])?
        };
        let kept = Expr::convert_if_needed(current.clone(), &ty)?;
        let result = Expr::condition_typed(Expr::is_null(current)?, store, kept, ty)?;
        return Ok(bb.finish(result)?);
    }

    let bin = node.op().binary_op().ok_or_else(|| {
        LoweringError::new(format!("'{}' has no binary operator", node.op()), "lowerkit.ir.lower.lower_expr.lower_assign_binary")
    })?;
    let mut read = loc.clone();
    if let Some(lc) = node.left_conversion() {
        read = Expr::invoke(lc.clone(), vec![read])?;
    }
    let right = node.right().clone();
    let mut value = match node.method() {
        Some(m) => {
            let right = if m.parameters[1].ty == Type::Object { Expr::boxed(right)? } else { right };
            Expr::call(None, m, vec![read, right])?
        }
        None => Expr::binary(bin, read, right)?,
    };
    if let Some(fc) = node.final_conversion() {
        value = Expr::invoke(fc.clone(), vec![value])?;
    }
    let value = Expr::convert_if_needed(value, &ty)?;
    Ok(bb.finish(Expr::assign(loc, value)?)?)
}

fn one_of(ty: &Type) -> Result<Expr, ConstructionError> {
    let value = if ty.non_nullable().is_floating() { ConstValue::Float(1.0) } else { ConstValue::Int(1) };
    Expr::constant(value, ty.clone())
}

pub(super) fn lower_assign_unary(node: &Arc<AssignUnary>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let ty = node.ty().clone();
    let mut bb = BlockBuilder::new(ctx);
    let loc = spill_target(node.operand(), &mut bb, ctx)?;
    let step = |x: Expr| -> Result<Expr, ConstructionError> {
        match node.method() {
            Some(m) => Expr::call(None, m, vec![x]),
            None => Expr::binary(node.op().binary_op(), x, one_of(&ty)?),
        }
    };
    if node.op().is_prefix() {
        let value = step(loc.clone())?;
        return Ok(bb.finish(Expr::assign(loc, value)?)?);
    }
    let old = bb.temp(ty.clone(), "old");
    bb.emit(Expr::assign(old.expr(), loc.clone())?);
    bb.emit(Expr::assign(loc, step(old.expr())?)?);
    Ok(bb.finish(old.expr())?)
}

/// Replaces one conditional receiver placeholder by a concrete expression.
struct ReplaceReceiver {
    id: usize,
    with: Expr,
}

impl Rewriter for ReplaceReceiver {
    type Error = ConstructionError;

    fn visit_extension(&mut self, expr: &Expr, node: &Node) -> Result<Expr, ConstructionError> {
        match node {
            Node::ConditionalReceiver(r) if r.id() == self.id => Ok(self.with.clone()),
            _ => walk_node(self, expr, node),
        }
    }
}

pub(super) fn lower_conditional_access(node: &Arc<ConditionalAccess>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let receiver = node.receiver();
    let ty = node.ty().clone();
    let id = node.placeholder().id();

    if is_null_literal(receiver) {
        trace!("conditional access over a null receiver folds to default({})", ty);
        return Ok(Expr::default(ty));
    }
    if is_never_null(receiver) {
        let access = ReplaceReceiver { id, with: receiver.clone() }.visit(node.when_not_null())?;
        return Ok(if ty.is_void() { access } else { Expr::convert_if_needed(access, &ty)? });
    }

    let mut bb = BlockBuilder::new(ctx);
    let recv = bb.spill_to_variable(receiver.clone(), "receiver")?;
    let value = if recv.ty().is_nullable_type() {
        Expr::convert(recv.expr(), recv.ty().non_nullable().clone())?
    } else {
        recv.expr()
    };
    let access = ReplaceReceiver { id, with: value }.visit(node.when_not_null())?;
    let is_null = Expr::is_null(recv.expr())?;
    let result = if ty.is_void() {
        Expr::condition_typed(is_null, Expr::empty(), access, Type::Void)?
    } else {
        let access = Expr::convert_if_needed(access, &ty)?;
        Expr::condition_typed(is_null, Expr::default(ty.clone()), access, ty)?
    };
    Ok(bb.finish(result)?)
}

/// `Index` for the non-null operand `value` through the node's member.
fn make_index(node: &FromEndIndex, value: Expr) -> Result<Expr, ConstructionError> {
    match node.method() {
        None => Expr::new(wellknown::index_constructor(), vec![value, Expr::boolean(true)]),
        Some(m) => {
            let mut args = vec![value];
            if m.parameters.len() == 2 {
                args.push(Expr::boolean(true));
            }
            if m.is_constructor() { Expr::new(m, args) } else { Expr::call(None, m, args) }
        }
    }
}

pub(super) fn lower_from_end_index(node: &Arc<FromEndIndex>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let operand = node.operand();
    if !node.is_lifted() {
        return Ok(make_index(node, operand.clone())?);
    }
    let ty = node.ty().clone();
    if is_null_literal(operand) {
        return Ok(Expr::default(ty));
    }
    if let ExprKind::Unary { op: UnaryOp::Convert, operand: inner, .. } = operand.kind() {
        if inner.ty() == Type::I32 {
            return Ok(Expr::convert(make_index(node, inner.clone())?, ty)?);
        }
    }
    let mut bb = BlockBuilder::new(ctx);
    let v = bb.spill_to_variable(operand.clone(), "operand")?;
    let value = make_index(node, Expr::convert(v.expr(), Type::I32)?)?;
    let result = Expr::condition_typed(Expr::is_null(v.expr())?, Expr::default(ty.clone()), Expr::convert(value, ty.clone())?, ty)?;
    Ok(bb.finish(result)?)
}

pub(super) fn lower_array_access(node: &Arc<ArrayAccess>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    if node.index().ty() == Type::I32 {
        return Ok(Expr::array_index(node.array().clone(), vec![node.index().clone()])?);
    }
    let mut bb = BlockBuilder::new(ctx);
    let array = bb.spill(node.array().clone(), "array")?;
    let length = Expr::array_length(array.clone())?;
    let offset = Expr::call(Some(node.index().clone()), wellknown::index_get_offset(), vec![length])?;
    Ok(bb.finish(Expr::array_index(array, vec![offset])?)?)
}

fn escape_braces(text: &str) -> String {
    text.replace('{', "{{").replace('}', "}}")
}

pub(super) fn lower_interpolated_string(node: &Arc<InterpolatedString>) -> Result<Expr, LoweringError> {
    let mut template = String::new();
    let mut literal = String::new();
    let mut args = Vec::new();
    for part in node.parts() {
        match part {
            Interpolation::Literal(text) => {
                template.push_str(&escape_braces(text));
                literal.push_str(text);
            }
            Interpolation::Insert { value, alignment, format } => {
                let _ = write!(template, "{{{}", args.len());
                if let Some(a) = alignment {
                    let _ = write!(template, ",{}", a);
                }
                if let Some(f) = format {
                    let _ = write!(template, ":{}", f);
                }
                template.push('}');
                args.push(Expr::boxed(value.clone())?);
            }
        }
    }
    if args.is_empty() {
        return Ok(Expr::string(&literal));
    }
    let method = wellknown::string_format(args.len());
    let mut call_args = vec![Expr::string(&template)];
    if args.len() <= FORMAT_MAX_FIXED {
        call_args.extend(args);
    } else {
        call_args.push(Expr::new_array(Type::Object, args)?);
    }
    Ok(Expr::call(None, method, call_args)?)
}
