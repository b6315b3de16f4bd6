//! file: core/src/ast/expr.rs
//! description: expression-shaped extended nodes.
//!
//! Assignments (plain, compound, increment/decrement), call-like nodes with
//! named arguments, from-end indexes, `Index`-aware array access and the
//! discard. Every constructor validates its operands; `update` hands back
//! the same instance when the supplied children are the current ones.

use std::sync::Arc;

use super::args::{ParameterAssignment, bind};
use super::err::{ConstructionErrorKind as Kind, ConstructionResult, fail};
use super::kind::{AssignOp, Node, UnaryAssignOp};
use crate::ir::expr::{Expr, ExprKind};
use crate::ir::factory::{binary_result_type, check_instance, check_writable, delegate_parameters, is_assignable};
use crate::ir::meta::{Method, ParameterInfo, Property};
use crate::ir::types::Type;
use crate::ir::wellknown;

fn same(a: &Expr, b: &Expr) -> bool {
    a.ptr_eq(b)
}

fn same_opt(a: &Option<Expr>, b: &Option<Expr>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x.ptr_eq(y),
        (None, None) => true,
        _ => false,
    }
}

fn same_args(a: &[ParameterAssignment], b: &[ParameterAssignment]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.expression().ptr_eq(y.expression()))
}

/// Check that `target` is a location an extended assignment can write:
/// a primitive writable location, a settable extended indexer, an extended
/// array access, or (plain `=` only) a discard.
pub fn check_assignment_target(target: &Expr, allow_discard: bool, issuer: &str) -> ConstructionResult<()> {
    match target.as_node() {
        Some(Node::Index(ix)) if ix.indexer().can_write() => Ok(()),
        Some(Node::ArrayAccess(_)) => Ok(()),
        Some(Node::Discard(_)) if allow_discard => Ok(()),
        Some(other) => fail(Kind::NotAssignable, issuer, format!("{} is not assignable", other.kind())),
        None => check_writable(target, issuer),
    }
}

/// Parameter and return types of a one-parameter conversion lambda.
fn conversion_signature(lambda: &Expr, issuer: &str) -> ConstructionResult<(Type, Type)> {
    if let ExprKind::Lambda { ty, .. } = lambda.kind() {
        if let Some((params, ret)) = ty.function_signature() {
            if params.len() == 1 && !ret.is_void() {
                return Ok((params[0].clone(), ret.clone()));
            }
        }
    }
    fail(Kind::InvalidArgument, issuer, "conversion must be a one-parameter lambda returning a value")
}

/// `left op= right`, `left = right` and `left ??= right`.
#[derive(Debug)]
pub struct AssignBinary {
    op: AssignOp,
    left: Expr,
    right: Expr,
    method: Option<Method>,
    resolved_method: Option<Method>,
    left_conversion: Option<Expr>,
    final_conversion: Option<Expr>,
    ty: Type,
}

impl AssignBinary {
    pub fn new(
        op: AssignOp,
        left: Expr,
        right: Expr,
        method: Option<Method>,
        left_conversion: Option<Expr>,
        final_conversion: Option<Expr>,
    ) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.expr.AssignBinary::new";
        check_assignment_target(&left, op == AssignOp::Assign, issuer)?;
        let (lt, rt) = (left.ty(), right.ty());
        let mut resolved_method = None;
        match op.binary_op() {
            None | Some(crate::ir::op::BinaryOp::Coalesce) => {
                if method.is_some() || left_conversion.is_some() || final_conversion.is_some() {
                    return fail(Kind::InvalidArgument, issuer, format!("'{}' takes no operator method or conversions", op));
                }
                if op == AssignOp::Coalesce {
                    if !lt.can_be_null() {
                        return fail(Kind::TypeMismatch, issuer, format!("??= needs a nullable left operand, got {}", lt));
                    }
                    if !(rt == *lt.non_nullable() || is_assignable(&lt, &rt)) {
                        return fail(Kind::TypeMismatch, issuer, format!("cannot assign {} to {}", rt, lt));
                    }
                } else if !is_assignable(&lt, &rt) {
                    return fail(Kind::TypeMismatch, issuer, format!("cannot assign {} to {}", rt, lt));
                }
            }
            Some(bin) => {
                let operand_ty = match &left_conversion {
                    Some(lc) => {
                        let (p, r) = conversion_signature(lc, issuer)?;
                        if p != lt {
                            return fail(Kind::TypeMismatch, issuer, format!("left conversion takes {}, operand is {}", p, lt));
                        }
                        r
                    }
                    None => lt.clone(),
                };
                let auto = method.is_none()
                    && matches!(op, AssignOp::Add | AssignOp::AddChecked)
                    && operand_ty == Type::String;
                let chosen = if auto {
                    if rt == Type::String {
                        Some(wellknown::string_concat().clone())
                    } else if rt.is_void() {
                        return fail(Kind::TypeMismatch, issuer, "cannot concatenate a void operand");
                    } else {
                        Some(wellknown::object_concat().clone())
                    }
                } else {
                    method.clone()
                };
                let result_ty = match &chosen {
                    Some(m) => {
                        if !m.is_static || m.parameters.len() != 2 {
                            return fail(Kind::InvalidArgument, issuer, format!("operator method {} must be static and binary", m));
                        }
                        let p1_ok = is_assignable(&m.parameters[1].ty, &rt) || (auto && m.parameters[1].ty == Type::Object);
                        if !is_assignable(&m.parameters[0].ty, &operand_ty) || !p1_ok {
                            return fail(Kind::TypeMismatch, issuer, format!("operands {} and {} do not match {}", operand_ty, rt, m));
                        }
                        m.return_type.clone()
                    }
                    None => match binary_result_type(bin, &operand_ty, &rt) {
                        Some((ty, _)) => ty,
                        None => {
                            return fail(Kind::TypeMismatch, issuer, format!("operator {} is not defined for {} and {}", bin, operand_ty, rt));
                        }
                    },
                };
                let final_ty = match &final_conversion {
                    Some(fc) => {
                        let (p, r) = conversion_signature(fc, issuer)?;
                        if p != result_ty {
                            return fail(Kind::TypeMismatch, issuer, format!("final conversion takes {}, result is {}", p, result_ty));
                        }
                        r
                    }
                    None => result_ty,
                };
                if !is_assignable(&lt, &final_ty) {
                    return fail(Kind::TypeMismatch, issuer, format!("result {} cannot be stored in {}", final_ty, lt));
                }
                resolved_method = chosen;
            }
        }
        // `T? ??= T` yields the non-null T
        let ty = if op == AssignOp::Coalesce && lt.is_nullable_type() && rt == *lt.non_nullable() {
            rt
        } else {
            lt
        };
        Ok(Arc::new(AssignBinary {
            op,
            left,
            right,
            method,
            resolved_method,
            left_conversion,
            final_conversion,
            ty,
        }))
    }

    /// Plain `left = right`.
    pub fn assign(left: Expr, right: Expr) -> ConstructionResult<Arc<Self>> {
        AssignBinary::new(AssignOp::Assign, left, right, None, None, None)
    }

    /// `left op= right` without operator method or conversions.
    pub fn compound(op: AssignOp, left: Expr, right: Expr) -> ConstructionResult<Arc<Self>> {
        AssignBinary::new(op, left, right, None, None, None)
    }

    pub fn op(&self) -> AssignOp {
        self.op
    }

    pub fn left(&self) -> &Expr {
        &self.left
    }

    pub fn right(&self) -> &Expr {
        &self.right
    }

    /// Operator method in effect: the supplied one or the automatically
    /// selected string concatenation.
    pub fn method(&self) -> Option<&Method> {
        self.resolved_method.as_ref()
    }

    pub fn left_conversion(&self) -> Option<&Expr> {
        self.left_conversion.as_ref()
    }

    pub fn final_conversion(&self) -> Option<&Expr> {
        self.final_conversion.as_ref()
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn update(
        self: &Arc<Self>,
        left: Expr,
        left_conversion: Option<Expr>,
        right: Expr,
        final_conversion: Option<Expr>,
    ) -> ConstructionResult<Arc<Self>> {
        if same(&left, &self.left)
            && same(&right, &self.right)
            && same_opt(&left_conversion, &self.left_conversion)
            && same_opt(&final_conversion, &self.final_conversion)
        {
            return Ok(Arc::clone(self));
        }
        AssignBinary::new(self.op, left, right, self.method.clone(), left_conversion, final_conversion)
    }
}

/// `++x`, `x++`, `--x`, `x--` (optionally checked).
#[derive(Debug)]
pub struct AssignUnary {
    op: UnaryAssignOp,
    operand: Expr,
    method: Option<Method>,
    ty: Type,
}

impl AssignUnary {
    pub fn new(op: UnaryAssignOp, operand: Expr, method: Option<Method>) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.expr.AssignUnary::new";
        check_assignment_target(&operand, false, issuer)?;
        let ty = operand.ty();
        match &method {
            Some(m) => {
                if !m.is_static || m.parameters.len() != 1 {
                    return fail(Kind::InvalidArgument, issuer, format!("operator method {} must be static and unary", m));
                }
                if !is_assignable(&m.parameters[0].ty, &ty) || !is_assignable(&ty, &m.return_type) {
                    return fail(Kind::TypeMismatch, issuer, format!("{} does not map {} to itself", m, ty));
                }
            }
            None => {
                if !ty.non_nullable().is_arithmetic() {
                    return fail(Kind::TypeMismatch, issuer, format!("cannot increment or decrement a {}", ty));
                }
            }
        }
        Ok(Arc::new(AssignUnary { op, operand, method, ty }))
    }

    pub fn op(&self) -> UnaryAssignOp {
        self.op
    }

    pub fn operand(&self) -> &Expr {
        &self.operand
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn update(self: &Arc<Self>, operand: Expr) -> ConstructionResult<Arc<Self>> {
        if same(&operand, &self.operand) {
            return Ok(Arc::clone(self));
        }
        AssignUnary::new(self.op, operand, self.method.clone())
    }
}

/// Method call with named arguments.
#[derive(Debug)]
pub struct Call {
    instance: Option<Expr>,
    method: Method,
    arguments: Vec<ParameterAssignment>,
    ty: Type,
}

impl Call {
    pub fn new(instance: Option<Expr>, method: Method, arguments: Vec<ParameterAssignment>) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.expr.Call::new";
        if method.is_constructor() {
            return fail(Kind::InvalidMember, issuer, format!("{} is a constructor", method));
        }
        if method.is_generic_definition() {
            return fail(Kind::InvalidMember, issuer, format!("{} is an open generic method", method));
        }
        check_instance(instance.as_ref(), method.is_static, &method.declaring_type, "method", issuer)?;
        bind(&method.parameters, &arguments, issuer)?;
        let ty = method.return_type.clone();
        Ok(Arc::new(Call { instance, method, arguments, ty }))
    }

    pub fn positional(instance: Option<Expr>, method: Method, values: Vec<Expr>) -> ConstructionResult<Arc<Self>> {
        let arguments = ParameterAssignment::positional(&method.parameters, values)?;
        Call::new(instance, method, arguments)
    }

    pub fn instance(&self) -> Option<&Expr> {
        self.instance.as_ref()
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn arguments(&self) -> &[ParameterAssignment] {
        &self.arguments
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn update(self: &Arc<Self>, instance: Option<Expr>, arguments: Vec<ParameterAssignment>) -> ConstructionResult<Arc<Self>> {
        if same_opt(&instance, &self.instance) && same_args(&arguments, &self.arguments) {
            return Ok(Arc::clone(self));
        }
        Call::new(instance, self.method.clone(), arguments)
    }
}

/// Delegate invocation with named arguments (`arg0`, `arg1`, ...).
#[derive(Debug)]
pub struct Invoke {
    target: Expr,
    parameters: Vec<ParameterInfo>,
    arguments: Vec<ParameterAssignment>,
    ty: Type,
}

impl Invoke {
    pub fn new(target: Expr, arguments: Vec<ParameterAssignment>) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.expr.Invoke::new";
        let (parameters, ty) = match target.ty() {
            Type::Function { params, ret } => (delegate_parameters(&params), *ret),
            other => return fail(Kind::TypeMismatch, issuer, format!("cannot invoke a {}", other)),
        };
        bind(&parameters, &arguments, issuer)?;
        Ok(Arc::new(Invoke { target, parameters, arguments, ty }))
    }

    pub fn positional(target: Expr, values: Vec<Expr>) -> ConstructionResult<Arc<Self>> {
        let parameters = match target.ty() {
            Type::Function { params, .. } => delegate_parameters(&params),
            other => {
                return fail(Kind::TypeMismatch, "lowerkit.ast.expr.Invoke::positional", format!("cannot invoke a {}", other));
            }
        };
        let arguments = ParameterAssignment::positional(&parameters, values)?;
        Invoke::new(target, arguments)
    }

    pub fn target(&self) -> &Expr {
        &self.target
    }

    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    pub fn arguments(&self) -> &[ParameterAssignment] {
        &self.arguments
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn update(self: &Arc<Self>, target: Expr, arguments: Vec<ParameterAssignment>) -> ConstructionResult<Arc<Self>> {
        if same(&target, &self.target) && same_args(&arguments, &self.arguments) {
            return Ok(Arc::clone(self));
        }
        Invoke::new(target, arguments)
    }
}

/// Object construction with named arguments.
#[derive(Debug)]
pub struct New {
    constructor: Method,
    arguments: Vec<ParameterAssignment>,
    ty: Type,
}

impl New {
    pub fn new(constructor: Method, arguments: Vec<ParameterAssignment>) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.expr.New::new";
        if !constructor.is_constructor() {
            return fail(Kind::InvalidMember, issuer, format!("{} is not a constructor", constructor));
        }
        bind(&constructor.parameters, &arguments, issuer)?;
        let ty = constructor.declaring_type.clone();
        Ok(Arc::new(New { constructor, arguments, ty }))
    }

    pub fn positional(constructor: Method, values: Vec<Expr>) -> ConstructionResult<Arc<Self>> {
        let arguments = ParameterAssignment::positional(&constructor.parameters, values)?;
        New::new(constructor, arguments)
    }

    pub fn constructor(&self) -> &Method {
        &self.constructor
    }

    pub fn arguments(&self) -> &[ParameterAssignment] {
        &self.arguments
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn update(self: &Arc<Self>, arguments: Vec<ParameterAssignment>) -> ConstructionResult<Arc<Self>> {
        if same_args(&arguments, &self.arguments) {
            return Ok(Arc::clone(self));
        }
        New::new(self.constructor.clone(), arguments)
    }
}

/// Indexer access with named arguments; readable and, when the indexer has
/// a setter, assignable.
#[derive(Debug)]
pub struct Index {
    object: Expr,
    indexer: Property,
    arguments: Vec<ParameterAssignment>,
    ty: Type,
}

impl Index {
    pub fn new(object: Expr, indexer: Property, arguments: Vec<ParameterAssignment>) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.expr.Index::new";
        if !indexer.is_indexer() {
            return fail(Kind::InvalidMember, issuer, format!("property {} is not an indexer", indexer.name));
        }
        check_instance(Some(&object), false, &indexer.declaring_type, "indexer", issuer)?;
        bind(&indexer.index_parameters(), &arguments, issuer)?;
        let ty = indexer.ty.clone();
        Ok(Arc::new(Index { object, indexer, arguments, ty }))
    }

    pub fn positional(object: Expr, indexer: Property, values: Vec<Expr>) -> ConstructionResult<Arc<Self>> {
        let arguments = ParameterAssignment::positional(&indexer.index_parameters(), values)?;
        Index::new(object, indexer, arguments)
    }

    pub fn object(&self) -> &Expr {
        &self.object
    }

    pub fn indexer(&self) -> &Property {
        &self.indexer
    }

    pub fn arguments(&self) -> &[ParameterAssignment] {
        &self.arguments
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn update(self: &Arc<Self>, object: Expr, arguments: Vec<ParameterAssignment>) -> ConstructionResult<Arc<Self>> {
        if same(&object, &self.object) && same_args(&arguments, &self.arguments) {
            return Ok(Arc::clone(self));
        }
        Index::new(object, self.indexer.clone(), arguments)
    }
}

/// `^operand`: an `Index` counted from the end.
#[derive(Debug)]
pub struct FromEndIndex {
    operand: Expr,
    method: Option<Method>,
    ty: Type,
}

impl FromEndIndex {
    pub fn new(operand: Expr, method: Option<Method>) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.expr.FromEndIndex::new";
        let ot = operand.ty();
        if *ot.non_nullable() != Type::I32 {
            return fail(Kind::TypeMismatch, issuer, format!("from-end index operand must be int, got {}", ot));
        }
        if let Some(m) = &method {
            if !(m.is_static || m.is_constructor()) || m.is_generic_definition() {
                return fail(Kind::InvalidMember, issuer, format!("{} must be a static non-generic method or a constructor", m));
            }
            if m.result_type() != Type::Index {
                return fail(Kind::TypeMismatch, issuer, format!("{} does not produce an Index", m));
            }
            let shape_ok = match m.parameters.as_slice() {
                [p] => p.ty == Type::I32,
                [p, q] => p.ty == Type::I32 && q.ty == Type::Bool,
                _ => false,
            };
            if !shape_ok {
                return fail(Kind::InvalidMember, issuer, format!("{} must take (int) or (int, bool)", m));
            }
        }
        let ty = if ot.is_nullable_type() { Type::nullable_of(Type::Index) } else { Type::Index };
        Ok(Arc::new(FromEndIndex { operand, method, ty }))
    }

    pub fn operand(&self) -> &Expr {
        &self.operand
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn is_lifted(&self) -> bool {
        self.ty.is_nullable_type()
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn update(self: &Arc<Self>, operand: Expr) -> ConstructionResult<Arc<Self>> {
        if same(&operand, &self.operand) {
            return Ok(Arc::clone(self));
        }
        FromEndIndex::new(operand, self.method.clone())
    }
}

/// `array[index]` over a vector where `index` is an `int` or an `Index`.
#[derive(Debug)]
pub struct ArrayAccess {
    array: Expr,
    index: Expr,
    ty: Type,
}

impl ArrayAccess {
    pub fn new(array: Expr, index: Expr) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.expr.ArrayAccess::new";
        let at = array.ty();
        let ty = match (&at, at.array_rank()) {
            (Type::Array { element, .. }, Some(1)) => element.as_ref().clone(),
            _ => return fail(Kind::TypeMismatch, issuer, format!("{} is not a one-dimensional array", at)),
        };
        let it = index.ty();
        if it != Type::I32 && it != Type::Index {
            return fail(Kind::TypeMismatch, issuer, format!("array index must be int or Index, got {}", it));
        }
        Ok(Arc::new(ArrayAccess { array, index, ty }))
    }

    pub fn array(&self) -> &Expr {
        &self.array
    }

    pub fn index(&self) -> &Expr {
        &self.index
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn update(self: &Arc<Self>, array: Expr, index: Expr) -> ConstructionResult<Arc<Self>> {
        if same(&array, &self.array) && same(&index, &self.index) {
            return Ok(Arc::clone(self));
        }
        ArrayAccess::new(array, index)
    }
}

/// `_`: a write-only sink of a given type.
#[derive(Debug)]
pub struct Discard {
    ty: Type,
}

impl Discard {
    pub fn new(ty: Type) -> ConstructionResult<Arc<Self>> {
        if ty.is_void() || ty.is_by_ref() || ty.is_pointer() {
            return fail(
                Kind::TypeMismatch,
                "lowerkit.ast.expr.Discard::new",
                format!("a discard cannot have type {}", ty),
            );
        }
        Ok(Arc::new(Discard { ty }))
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}
