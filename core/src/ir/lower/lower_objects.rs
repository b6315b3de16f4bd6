//! file: core/src/ir/lower/lower_objects.rs
//! description: lowering of call-like nodes and tuples.
//!
//! Named arguments are bound to declared parameters here. When the caller
//! wrote them out of declaration order, the receiver and every supplied
//! argument are first evaluated into temporaries in the written order so
//! side effects keep that order in the positional call.

use std::sync::Arc;

use log::trace;

use super::block_builder::{BlockBuilder, is_invariant};
use super::err::LoweringError;
use super::lowering_context::LoweringContext;
use crate::ast::args::{ParameterAssignment, Slot, bind, in_declaration_order, missing_argument};
use crate::ast::err::ConstructionError;
use crate::ast::expr::{Call, Index, Invoke, New};
use crate::ast::kind::Node;
use crate::ast::tuple::{TupleConvert, TupleLiteral};
use crate::ir::expr::{Expr, ExprKind};
use crate::ir::meta::{Member, ParameterInfo};
use crate::ir::op::UnaryOp;
use crate::ir::types::{TUPLE_MAX_FIXED, Type};
use crate::ir::wellknown::{tuple_constructor, tuple_field};

/// Operand read in written order: invariant values stay in place, a
/// variable is read in place unless a later operand may reassign it, and
/// everything else is evaluated into a temporary.
fn capture_operand(bb: &mut BlockBuilder, value: &Expr, exposed: bool, hint: &str) -> Result<Expr, ConstructionError> {
    match value.kind() {
        ExprKind::Variable(_) if !exposed => Ok(value.clone()),
        _ if is_invariant(value) => Ok(value.clone()),
        _ => Ok(bb.capture(value.clone(), hint)?.expr()),
    }
}

/// Receiver and declaration-ordered arguments of one call-like node.
/// With `spill_all` every operand is evaluated into `bb` even when the
/// written order already matches.
fn bind_arguments(
    parameters: &[ParameterInfo],
    arguments: &[ParameterAssignment],
    receiver: Option<&Expr>,
    bb: &mut BlockBuilder,
    spill_all: bool,
    issuer: &str,
) -> Result<(Option<Expr>, Vec<Expr>), LoweringError> {
    let slots = bind(parameters, arguments, issuer)?;
    let reorder = spill_all || !in_declaration_order(arguments);
    if reorder {
        trace!("spilling {} named arguments for {}", arguments.len(), issuer);
    }

    // exposed[i]: some operand written after argument i may reassign a
    // variable it reads
    let exposed: Vec<bool> = (0..arguments.len())
        .map(|i| arguments[i + 1..].iter().any(|a| !is_invariant(a.expression())))
        .collect();
    let receiver_exposed = arguments.iter().any(|a| !is_invariant(a.expression()));

    let receiver = match receiver {
        Some(r) if reorder => Some(capture_operand(bb, r, receiver_exposed, "receiver")?),
        Some(r) => Some(r.clone()),
        None => None,
    };

    let mut supplied = Vec::with_capacity(arguments.len());
    for (a, exposed) in arguments.iter().zip(exposed) {
        let param = a.parameter();
        let value = a.expression();
        let value = match value.as_node() {
            Some(Node::Discard(_)) if param.is_by_ref() => bb.temp(param.value_type().clone(), "discard").expr(),
            _ if param.is_by_ref() => value.clone(),
            _ if reorder => capture_operand(bb, value, exposed, &param.name)?,
            _ => value.clone(),
        };
        supplied.push(value);
    }

    let mut out = Vec::with_capacity(slots.len());
    for (slot, param) in slots.iter().zip(parameters) {
        let value = match slot {
            Slot::Supplied(i) => supplied[*i].clone(),
            other => missing_argument(other)?.ok_or_else(|| {
                LoweringError::new(format!("no value for parameter '{}'", param.name), issuer)
            })?,
        };
        out.push(value);
    }
    Ok((receiver, out))
}

pub(super) fn lower_call(node: &Arc<Call>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let mut bb = BlockBuilder::new(ctx);
    let method = node.method();
    let (instance, args) = bind_arguments(
        &method.parameters,
        node.arguments(),
        node.instance(),
        &mut bb,
        false,
        "lowerkit.ir.lower.lower_objects.lower_call",
    )?;
    Ok(bb.finish(Expr::call(instance, method, args)?)?)
}

pub(super) fn lower_invoke(node: &Arc<Invoke>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let mut bb = BlockBuilder::new(ctx);
    let (target, args) = bind_arguments(
        node.parameters(),
        node.arguments(),
        Some(node.target()),
        &mut bb,
        false,
        "lowerkit.ir.lower.lower_objects.lower_invoke",
    )?;
    let target = target.unwrap_or_else(|| node.target().clone());
    Ok(bb.finish(Expr::invoke(target, args)?)?)
}

pub(super) fn lower_new(node: &Arc<New>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let mut bb = BlockBuilder::new(ctx);
    let ctor = node.constructor();
    let (_, args) = bind_arguments(
        &ctor.parameters,
        node.arguments(),
        None,
        &mut bb,
        false,
        "lowerkit.ir.lower.lower_objects.lower_new",
    )?;
    Ok(bb.finish(Expr::new(ctor, args)?)?)
}

pub(super) fn lower_index(node: &Arc<Index>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let mut bb = BlockBuilder::new(ctx);
    let location = indexer_access(node, &mut bb, false)?;
    Ok(bb.finish(location)?)
}

/// Indexer location whose object and arguments are all evaluated once into
/// `bb`, so it can be read and then written.
pub(super) fn index_location(node: &Index, bb: &mut BlockBuilder) -> Result<Expr, LoweringError> {
    indexer_access(node, bb, true)
}

fn indexer_access(node: &Index, bb: &mut BlockBuilder, spill_all: bool) -> Result<Expr, LoweringError> {
    let indexer = node.indexer();
    let (object, args) = bind_arguments(
        &indexer.index_parameters(),
        node.arguments(),
        Some(node.object()),
        bb,
        spill_all,
        "lowerkit.ir.lower.lower_objects.lower_index",
    )?;
    let object = object.unwrap_or_else(|| node.object().clone());
    Ok(Expr::index(object, indexer, args)?)
}

/// `New` of the storage container for tuple type `ty`, nesting the
/// components past the seventh into the `rest` argument.
fn build_tuple(ty: &Type, mut values: Vec<Expr>) -> Result<Expr, LoweringError> {
    let issuer = "lowerkit.ir.lower.lower_objects.build_tuple";
    let ctor = tuple_constructor(ty).ok_or_else(|| LoweringError::new(format!("{} is not a tuple type", ty), issuer))?;
    if values.len() > TUPLE_MAX_FIXED {
        let rest_ty = ctor.parameters[TUPLE_MAX_FIXED].ty.clone();
        let rest_values = values.split_off(TUPLE_MAX_FIXED);
        values.push(build_tuple(&rest_ty, rest_values)?);
    }
    Ok(Expr::new(&ctor, values)?)
}

pub(super) fn lower_tuple_literal(node: &Arc<TupleLiteral>) -> Result<Expr, LoweringError> {
    build_tuple(node.ty(), node.arguments().to_vec())
}

/// Read logical component `i` of `tuple`, walking the `Rest` chain.
fn read_component(tuple: Expr, ty: &Type, i: usize) -> Result<Expr, LoweringError> {
    let issuer = "lowerkit.ir.lower.lower_objects.read_component";
    let slot = i.min(TUPLE_MAX_FIXED);
    let field = tuple_field(ty, slot)
        .ok_or_else(|| LoweringError::new(format!("{} has no component {}", ty, i), issuer))?;
    let rest_ty = field.ty.clone();
    let read = Expr::member(Some(tuple), &Member::Field(field))?;
    if i < TUPLE_MAX_FIXED {
        Ok(read)
    } else {
        read_component(read, &rest_ty, i - TUPLE_MAX_FIXED)
    }
}

/// Apply one component conversion, inlining the shapes that need no
/// delegate call.
fn apply_conversion(conversion: &Expr, value: Expr) -> Result<Expr, ConstructionError> {
    if let ExprKind::Lambda { parameters, body, .. } = conversion.kind() {
        let param = &parameters[0];
        let is_param = |e: &Expr| e.as_variable() == Some(param);
        match body.kind() {
            ExprKind::Variable(v) if v == param => return Ok(value),
            ExprKind::Unary { op: UnaryOp::Convert, operand, ty, method: None } if is_param(operand) => {
                return Expr::convert(value, ty.clone());
            }
            ExprKind::Extension(Node::TupleConvert(inner)) if is_param(inner.operand()) => {
                let nested = TupleConvert::new(value, inner.ty().clone(), inner.conversions().to_vec())?;
                return Ok(nested.into());
            }
            _ => {}
        }
    }
    Expr::invoke(conversion.clone(), vec![value])
}

pub(super) fn lower_tuple_convert(node: &Arc<TupleConvert>, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let mut bb = BlockBuilder::new(ctx);
    let source_ty = node.operand().ty();
    let source = bb.spill(node.operand().clone(), "tuple")?;
    let mut values = Vec::with_capacity(node.conversions().len());
    for (i, conversion) in node.conversions().iter().enumerate() {
        let component = read_component(source.clone(), &source_ty, i)?;
        values.push(apply_conversion(conversion, component)?);
    }
    let result = build_tuple(node.ty(), values)?;
    Ok(bb.finish(result)?)
}
