//! file: core/src/ast/tuple.rs
//! description: tuple literals and element-wise tuple conversions.

use std::sync::Arc;

use super::err::{ConstructionErrorKind as Kind, ConstructionResult, fail};
use crate::ir::expr::{Expr, ExprKind};
use crate::ir::factory::is_assignable;
use crate::ir::types::Type;

fn tuple_elements<'a>(ty: &'a Type, what: &str, issuer: &str) -> ConstructionResult<&'a [Type]> {
    match ty.tuple_elements() {
        Some(elems) if !elems.is_empty() => Ok(elems),
        _ => fail(Kind::TypeMismatch, issuer, format!("{} must be a tuple type, got {}", what, ty)),
    }
}

/// `(a, b, ...)` with an optional element name per component.
#[derive(Debug)]
pub struct TupleLiteral {
    ty: Type,
    arguments: Vec<Expr>,
    names: Option<Vec<String>>,
}

impl TupleLiteral {
    pub fn new(ty: Type, arguments: Vec<Expr>, names: Option<Vec<String>>) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.tuple.TupleLiteral::new";
        let elems = tuple_elements(&ty, "tuple literal", issuer)?;
        if arguments.len() != elems.len() {
            return fail(
                Kind::ArgumentCount,
                issuer,
                format!("tuple of arity {} given {} arguments", elems.len(), arguments.len()),
            );
        }
        if let Some(n) = &names {
            if n.len() != elems.len() {
                return fail(Kind::ArgumentCount, issuer, format!("tuple of arity {} given {} names", elems.len(), n.len()));
            }
        }
        for (i, (arg, elem)) in arguments.iter().zip(elems).enumerate() {
            if !is_assignable(elem, &arg.ty()) {
                return fail(
                    Kind::TypeMismatch,
                    issuer,
                    format!("component {} of type {} cannot hold {}", i, elem, arg.ty()),
                );
            }
        }
        Ok(Arc::new(TupleLiteral { ty, arguments, names }))
    }

    /// Literal whose type is made of the argument types.
    pub fn of(arguments: Vec<Expr>) -> ConstructionResult<Arc<Self>> {
        let ty = Type::Tuple(arguments.iter().map(Expr::ty).collect());
        TupleLiteral::new(ty, arguments, None)
    }

    pub fn arguments(&self) -> &[Expr] {
        &self.arguments
    }

    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn update(self: &Arc<Self>, arguments: Vec<Expr>) -> ConstructionResult<Arc<Self>> {
        if arguments.len() == self.arguments.len() && arguments.iter().zip(&self.arguments).all(|(a, b)| a.ptr_eq(b)) {
            return Ok(Arc::clone(self));
        }
        TupleLiteral::new(self.ty.clone(), arguments, self.names.clone())
    }
}

/// Converts a tuple to another tuple type of the same arity by applying one
/// single-parameter lambda per component.
#[derive(Debug)]
pub struct TupleConvert {
    operand: Expr,
    ty: Type,
    conversions: Vec<Expr>,
}

impl TupleConvert {
    pub fn new(operand: Expr, ty: Type, conversions: Vec<Expr>) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.tuple.TupleConvert::new";
        let source_ty = operand.ty();
        let source = tuple_elements(&source_ty, "conversion source", issuer)?;
        let target = tuple_elements(&ty, "conversion target", issuer)?;
        if source.len() != target.len() {
            return fail(
                Kind::ArgumentCount,
                issuer,
                format!("cannot convert a tuple of arity {} to arity {}", source.len(), target.len()),
            );
        }
        if conversions.len() != source.len() {
            return fail(
                Kind::ArgumentCount,
                issuer,
                format!("{} components need {} conversions, got {}", source.len(), source.len(), conversions.len()),
            );
        }
        for (i, conv) in conversions.iter().enumerate() {
            let (params, ret) = match conv.kind() {
                ExprKind::Lambda { ty, .. } => match ty.function_signature() {
                    Some(sig) => sig,
                    None => return fail(Kind::InvalidArgument, issuer, format!("conversion {} has no signature", i)),
                },
                _ => return fail(Kind::InvalidArgument, issuer, format!("conversion {} must be a lambda", i)),
            };
            if params.len() != 1 || params[0] != source[i] {
                return fail(
                    Kind::TypeMismatch,
                    issuer,
                    format!("conversion {} must take exactly one {}", i, source[i]),
                );
            }
            if *ret != target[i] {
                return fail(
                    Kind::TypeMismatch,
                    issuer,
                    format!("conversion {} returns {}, expected {}", i, ret, target[i]),
                );
            }
        }
        Ok(Arc::new(TupleConvert { operand, ty, conversions }))
    }

    pub fn operand(&self) -> &Expr {
        &self.operand
    }

    pub fn conversions(&self) -> &[Expr] {
        &self.conversions
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn update(self: &Arc<Self>, operand: Expr, conversions: Vec<Expr>) -> ConstructionResult<Arc<Self>> {
        let same = conversions.len() == self.conversions.len()
            && conversions.iter().zip(&self.conversions).all(|(a, b)| a.ptr_eq(b));
        if operand.ptr_eq(&self.operand) && same {
            return Ok(Arc::clone(self));
        }
        TupleConvert::new(operand, self.ty.clone(), conversions)
    }
}
