//! file: core/src/ir/factory.rs
//! description: validating constructors for primitive expression nodes.
//!
//! Every constructor checks its operands the way the downstream expression
//! compiler would and returns a `ConstructionError` instead of building an
//! ill-typed node. Frequently used constants are interned.

use lazy_static::lazy_static;

use super::expr::{ElementInit, Expr, ExprKind, GotoKind, LabelTarget, Variable};
use super::meta::{Member, Method, ParameterInfo, Property};
use super::op::{BinaryOp, UnaryOp};
use super::types::Type;
use super::value::ConstValue;
use crate::ast::err::{ConstructionErrorKind as Kind, ConstructionResult, fail};
use crate::ast::init::MemberInitializer;
use crate::ast::kind::Node;

const SMALL_INT_MIN: i32 = -1;
const SMALL_INT_MAX: i32 = 10;

lazy_static! {
    static ref SMALL_INTS: Vec<Expr> = (SMALL_INT_MIN..=SMALL_INT_MAX)
        .map(|i| Expr::from_kind(ExprKind::Constant { value: ConstValue::Int(i as i64), ty: Type::I32 }))
        .collect();
    static ref TRUE: Expr = Expr::from_kind(ExprKind::Constant { value: ConstValue::Bool(true), ty: Type::Bool });
    static ref FALSE: Expr = Expr::from_kind(ExprKind::Constant { value: ConstValue::Bool(false), ty: Type::Bool });
    static ref NULL_OBJECT: Expr = Expr::from_kind(ExprKind::Constant { value: ConstValue::Null, ty: Type::Object });
    static ref EMPTY: Expr = Expr::from_kind(ExprKind::Default { ty: Type::Void });
}

/// Whether a value of type `from` may be stored in a location of type `to`
/// without an explicit conversion node.
pub fn is_assignable(to: &Type, from: &Type) -> bool {
    to.is_reference_assignable_from(from)
}

/// Whether `Convert` from `from` to `to` is a defined conversion.
pub fn is_convertible(from: &Type, to: &Type) -> bool {
    if from == to {
        return true;
    }
    if from.is_void() || to.is_void() {
        return false;
    }
    let numeric = |t: &Type| t.is_arithmetic() || *t == Type::Char;
    let (f, t) = (from.non_nullable(), to.non_nullable());
    if numeric(f) && numeric(t) {
        return true;
    }
    if f == t {
        // T -> T? and T? -> T
        return true;
    }
    if *to == Type::Object || *from == Type::Object {
        return true;
    }
    to.is_reference_assignable_from(from) || from.is_reference_assignable_from(to)
}

/// Check that an argument fits a parameter, wrapping a lambda in `Quote`
/// when the parameter expects a quoted function.
pub fn coerce_argument(param: &ParameterInfo, arg: Expr, issuer: &str) -> ConstructionResult<Expr> {
    if let Type::ByRef(inner) = &param.ty {
        return match arg.as_variable() {
            Some(v) if v.ty() == inner.as_ref() => Ok(arg),
            Some(v) => fail(
                Kind::TypeMismatch,
                issuer,
                format!("by-ref parameter '{}' of type {} received a variable of type {}", param.name, inner, v.ty()),
            ),
            None => fail(
                Kind::InvalidArgument,
                issuer,
                format!("by-ref parameter '{}' requires a variable, got {}", param.name, arg.kind_name()),
            ),
        };
    }
    let arg_ty = arg.ty();
    if is_assignable(&param.ty, &arg_ty) {
        return Ok(arg);
    }
    if let Type::Quoted(function) = &param.ty {
        if matches!(arg.kind(), ExprKind::Lambda { .. }) && is_assignable(function, &arg_ty) {
            return Expr::quote(arg);
        }
    }
    fail(
        Kind::TypeMismatch,
        issuer,
        format!("argument of type {} cannot be passed to parameter '{}' of type {}", arg_ty, param.name, param.ty),
    )
}

fn coerce_arguments(params: &[ParameterInfo], args: Vec<Expr>, issuer: &str) -> ConstructionResult<Vec<Expr>> {
    if params.len() != args.len() {
        return fail(
            Kind::ArgumentCount,
            issuer,
            format!("expected {} arguments, got {}", params.len(), args.len()),
        );
    }
    params
        .iter()
        .zip(args)
        .map(|(p, a)| coerce_argument(p, a, issuer))
        .collect()
}

/// Check that `expr` can appear on the left of a primitive `Assign`.
pub fn check_writable(expr: &Expr, issuer: &str) -> ConstructionResult<()> {
    let ok = match expr.kind() {
        ExprKind::Variable(_) | ExprKind::ArrayIndex { .. } => true,
        ExprKind::Member { member, .. } => member.can_write(),
        ExprKind::Index { indexer, .. } => indexer.can_write(),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        fail(Kind::NotAssignable, issuer, format!("{} is not a writable location", expr.kind_name()))
    }
}

pub(crate) fn check_instance(instance: Option<&Expr>, is_static: bool, declaring: &Type, what: &str, issuer: &str) -> ConstructionResult<()> {
    match (instance, is_static) {
        (None, true) => Ok(()),
        (Some(_), true) => fail(Kind::InvalidArgument, issuer, format!("static {} takes no instance", what)),
        (None, false) => fail(Kind::InvalidArgument, issuer, format!("instance {} requires an instance", what)),
        (Some(inst), false) => {
            let ty = inst.ty();
            if ty == *declaring || declaring.is_reference_assignable_from(&ty) {
                Ok(())
            } else {
                fail(
                    Kind::TypeMismatch,
                    issuer,
                    format!("instance of type {} is not a {} declared on {}", ty, what, declaring),
                )
            }
        }
    }
}

pub(crate) fn check_bool(test: &Expr, issuer: &str) -> ConstructionResult<()> {
    if test.ty().is_bool() {
        Ok(())
    } else {
        fail(Kind::NotBoolean, issuer, format!("test must be bool, got {}", test.ty()))
    }
}

pub(crate) fn check_unique_variables(variables: &[Variable], issuer: &str) -> ConstructionResult<()> {
    for (i, v) in variables.iter().enumerate() {
        if variables[..i].contains(v) {
            return fail(Kind::DuplicateVariable, issuer, format!("variable {} declared twice", v));
        }
    }
    Ok(())
}

/// Result type and lifted flag of a binary operator, or `None` when the
/// operand types are not supported.
pub fn binary_result_type(op: BinaryOp, left: &Type, right: &Type) -> Option<(Type, bool)> {
    let lifted = left.is_nullable_type() || right.is_nullable_type();
    let (l, r) = (left.non_nullable(), right.non_nullable());
    if op.is_arithmetic() {
        return (left == right && l.is_arithmetic()).then(|| (left.clone(), lifted));
    }
    if op.is_bitwise() {
        return (left == right && l.is_integral_or_bool()).then(|| (left.clone(), lifted));
    }
    if op.is_shift() {
        if l.is_integral() && *r == Type::I32 {
            let ty = if lifted { left.to_nullable() } else { left.clone() };
            return Some((ty, lifted));
        }
        return None;
    }
    if op.is_logical() {
        return (left.is_bool() && right.is_bool()).then_some((Type::Bool, false));
    }
    if op.is_equality() {
        let comparable = left == right
            || (left.is_reference_type()
                && right.is_reference_type()
                && (left.is_reference_assignable_from(right) || right.is_reference_assignable_from(left)));
        return (comparable && !left.is_void()).then_some((Type::Bool, lifted));
    }
    if op.is_relational() {
        return (left == right && (l.is_arithmetic() || *l == Type::Char)).then_some((Type::Bool, lifted));
    }
    None
}

impl Expr {
    // ---- constants ----

    /// Constant of an explicit type; the value must fit the type.
    pub fn constant(value: ConstValue, ty: Type) -> ConstructionResult<Expr> {
        if !value.fits(&ty) {
            return fail(Kind::TypeMismatch, "lowerkit.ir.factory.constant", format!("constant {} does not fit {}", value, ty));
        }
        if ty == Type::I32 {
            if let ConstValue::Int(i) = value {
                if (SMALL_INT_MIN as i64..=SMALL_INT_MAX as i64).contains(&i) {
                    return Ok(Expr::int32(i as i32));
                }
            }
        }
        if ty == Type::Bool {
            if let ConstValue::Bool(b) = value {
                return Ok(Expr::boolean(b));
            }
        }
        Ok(Expr::from_kind(ExprKind::Constant { value, ty }))
    }

    /// Constant typed with the value's natural type.
    pub fn constant_of(value: ConstValue) -> Expr {
        let ty = value.natural_type();
        match value {
            ConstValue::Null => NULL_OBJECT.clone(),
            other => Expr::constant(other.clone(), ty.clone())
                .unwrap_or_else(|_| Expr::from_kind(ExprKind::Constant { value: other, ty })),
        }
    }

    pub fn int32(i: i32) -> Expr {
        if (SMALL_INT_MIN..=SMALL_INT_MAX).contains(&i) {
            return SMALL_INTS[(i - SMALL_INT_MIN) as usize].clone();
        }
        Expr::from_kind(ExprKind::Constant { value: ConstValue::Int(i as i64), ty: Type::I32 })
    }

    pub fn boolean(b: bool) -> Expr {
        if b { TRUE.clone() } else { FALSE.clone() }
    }

    pub fn string(s: &str) -> Expr {
        Expr::from_kind(ExprKind::Constant { value: ConstValue::Str(s.to_string()), ty: Type::String })
    }

    /// Null constant of a reference or nullable type.
    pub fn null(ty: Type) -> ConstructionResult<Expr> {
        if ty == Type::Object {
            return Ok(NULL_OBJECT.clone());
        }
        Expr::constant(ConstValue::Null, ty)
    }

    pub fn default(ty: Type) -> Expr {
        if ty.is_void() {
            return Expr::empty();
        }
        Expr::from_kind(ExprKind::Default { ty })
    }

    /// `void`-typed no-op.
    pub fn empty() -> Expr {
        EMPTY.clone()
    }

    // ---- variables, assignment, operators ----

    pub fn assign(target: Expr, value: Expr) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.assign";
        check_writable(&target, issuer)?;
        let (tt, vt) = (target.ty(), value.ty());
        if !is_assignable(&tt, &vt) {
            return fail(Kind::TypeMismatch, issuer, format!("cannot assign {} to {}", vt, tt));
        }
        Ok(Expr::from_kind(ExprKind::Assign { target, value }))
    }

    pub fn unary(op: UnaryOp, operand: Expr, ty: Type, method: Option<Method>) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.unary";
        let ot = operand.ty();
        if let Some(m) = &method {
            if !m.is_static || m.parameters.len() != 1 {
                return fail(Kind::InvalidArgument, issuer, format!("operator method {} must be static and unary", m));
            }
            if !is_assignable(&m.parameters[0].ty, &ot) {
                return fail(Kind::TypeMismatch, issuer, format!("operand {} does not match {}", ot, m));
            }
            let ty = m.return_type.clone();
            return Ok(Expr::from_kind(ExprKind::Unary { op, operand, ty, method }));
        }
        let ok = match op {
            UnaryOp::Negate | UnaryOp::NegateChecked => {
                ty == ot && ot.non_nullable().is_arithmetic() && ot.non_nullable().is_signed()
            }
            UnaryOp::Not => ty == ot && ot.non_nullable().is_integral_or_bool(),
            UnaryOp::IsTrue | UnaryOp::IsFalse => ty.is_bool() && ot.non_nullable().is_bool(),
            UnaryOp::Convert | UnaryOp::ConvertChecked => is_convertible(&ot, &ty),
        };
        if !ok {
            return fail(Kind::TypeMismatch, issuer, format!("operator {} is not defined for {} -> {}", op, ot, ty));
        }
        Ok(Expr::from_kind(ExprKind::Unary { op, operand, ty, method: None }))
    }

    pub fn not(operand: Expr) -> ConstructionResult<Expr> {
        let ty = operand.ty();
        Expr::unary(UnaryOp::Not, operand, ty, None)
    }

    pub fn negate(operand: Expr) -> ConstructionResult<Expr> {
        let ty = operand.ty();
        Expr::unary(UnaryOp::Negate, operand, ty, None)
    }

    pub fn convert(operand: Expr, ty: Type) -> ConstructionResult<Expr> {
        Expr::unary(UnaryOp::Convert, operand, ty, None)
    }

    /// `Convert` unless the operand already has the requested type.
    pub fn convert_if_needed(operand: Expr, ty: &Type) -> ConstructionResult<Expr> {
        if operand.ty() == *ty {
            Ok(operand)
        } else {
            Expr::convert(operand, ty.clone())
        }
    }

    /// Box a value-typed operand to `object`; reference operands pass through.
    pub fn boxed(operand: Expr) -> ConstructionResult<Expr> {
        if operand.ty().is_value_type() {
            Expr::convert(operand, Type::Object)
        } else {
            Ok(operand)
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.binary";
        let (lt, rt) = (left.ty(), right.ty());
        if op == BinaryOp::Coalesce {
            if !lt.can_be_null() {
                return fail(Kind::TypeMismatch, issuer, format!("left operand of ?? must be nullable, got {}", lt));
            }
            let ty = if lt.is_nullable_type() && rt == *lt.non_nullable() {
                rt.clone()
            } else if is_assignable(&lt, &rt) {
                lt.clone()
            } else {
                return fail(Kind::TypeMismatch, issuer, format!("?? operands {} and {} do not agree", lt, rt));
            };
            return Ok(Expr::from_kind(ExprKind::Binary { op, left, right, ty, method: None, lifted: false }));
        }
        match binary_result_type(op, &lt, &rt) {
            Some((ty, lifted)) => Ok(Expr::from_kind(ExprKind::Binary { op, left, right, ty, method: None, lifted })),
            None => fail(Kind::TypeMismatch, issuer, format!("operator {} is not defined for {} and {}", op, lt, rt)),
        }
    }

    /// Binary node implemented by a user-defined static operator method.
    pub fn binary_with_method(op: BinaryOp, left: Expr, right: Expr, method: Method) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.binary";
        if !method.is_static || method.parameters.len() != 2 {
            return fail(Kind::InvalidArgument, issuer, format!("operator method {} must be static and binary", method));
        }
        let left = coerce_argument(&method.parameters[0], left, issuer)?;
        let right = coerce_argument(&method.parameters[1], right, issuer)?;
        let ty = method.return_type.clone();
        Ok(Expr::from_kind(ExprKind::Binary { op, left, right, ty, method: Some(method), lifted: false }))
    }

    pub fn equal(left: Expr, right: Expr) -> ConstructionResult<Expr> {
        Expr::binary(BinaryOp::Eq, left, right)
    }

    pub fn and_also(left: Expr, right: Expr) -> ConstructionResult<Expr> {
        Expr::binary(BinaryOp::AndAlso, left, right)
    }

    pub fn or_else(left: Expr, right: Expr) -> ConstructionResult<Expr> {
        Expr::binary(BinaryOp::OrElse, left, right)
    }

    /// `operand == null` for a reference or nullable operand.
    pub fn is_null(operand: Expr) -> ConstructionResult<Expr> {
        let ty = operand.ty();
        Expr::equal(operand, Expr::null(ty)?)
    }

    pub fn type_is(operand: Expr, test_type: Type) -> Expr {
        Expr::from_kind(ExprKind::TypeIs { operand, test_type })
    }

    // ---- control flow ----

    pub fn condition(test: Expr, if_true: Expr, if_false: Expr) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.condition";
        let (a, b) = (if_true.ty(), if_false.ty());
        if a != b {
            return fail(Kind::InconsistentTypes, issuer, format!("branches have types {} and {}", a, b));
        }
        Expr::condition_typed(test, if_true, if_false, a)
    }

    /// Conditional with an explicit result type; with `void` the branch
    /// types are unconstrained.
    pub fn condition_typed(test: Expr, if_true: Expr, if_false: Expr, ty: Type) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.condition";
        check_bool(&test, issuer)?;
        if !ty.is_void() {
            for branch in [&if_true, &if_false] {
                if !is_assignable(&ty, &branch.ty()) {
                    return fail(Kind::TypeMismatch, issuer, format!("branch of type {} is not a {}", branch.ty(), ty));
                }
            }
        }
        Ok(Expr::from_kind(ExprKind::Conditional { test, if_true, if_false, ty }))
    }

    /// `if (test) body;` as a void conditional.
    pub fn if_then(test: Expr, body: Expr) -> ConstructionResult<Expr> {
        Expr::condition_typed(test, body, Expr::empty(), Type::Void)
    }

    pub fn block(expressions: Vec<Expr>) -> ConstructionResult<Expr> {
        Expr::block_with(Vec::new(), expressions)
    }

    /// Block whose type is that of its last expression.
    pub fn block_with(variables: Vec<Variable>, expressions: Vec<Expr>) -> ConstructionResult<Expr> {
        let ty = match expressions.last() {
            Some(last) => last.ty(),
            None => return fail(Kind::ArgumentCount, "lowerkit.ir.factory.block", "block needs at least one expression"),
        };
        Expr::block_typed(ty, variables, expressions)
    }

    pub fn block_typed(ty: Type, variables: Vec<Variable>, mut expressions: Vec<Expr>) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.block";
        check_unique_variables(&variables, issuer)?;
        if expressions.is_empty() {
            if !ty.is_void() {
                return fail(Kind::ArgumentCount, issuer, format!("empty block cannot produce {}", ty));
            }
            expressions.push(Expr::empty());
        }
        if !ty.is_void() {
            let last = expressions.last().map(Expr::ty).unwrap_or(Type::Void);
            if !is_assignable(&ty, &last) {
                return fail(Kind::TypeMismatch, issuer, format!("block of type {} ends with {}", ty, last));
            }
        }
        Ok(Expr::from_kind(ExprKind::Block { variables, expressions, ty }))
    }

    pub fn label(target: LabelTarget, default_value: Option<Expr>) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.label";
        match (&default_value, target.ty().is_void()) {
            (None, true) => {}
            (None, false) => {
                return fail(Kind::InvalidLabel, issuer, format!("label {} of type {} needs a default value", target, target.ty()));
            }
            (Some(v), _) if !is_assignable(target.ty(), &v.ty()) => {
                return fail(Kind::TypeMismatch, issuer, format!("default value {} does not fit label {}", v.ty(), target));
            }
            _ => {}
        }
        Ok(Expr::from_kind(ExprKind::Label { target, default_value }))
    }

    pub fn make_goto(kind: GotoKind, target: LabelTarget, value: Option<Expr>) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.goto";
        match (&value, target.ty().is_void()) {
            (None, true) => {}
            (Some(v), false) if is_assignable(target.ty(), &v.ty()) => {}
            (Some(v), _) => {
                return fail(Kind::TypeMismatch, issuer, format!("value {} does not fit label {} of type {}", v.ty(), target, target.ty()));
            }
            (None, false) => {
                return fail(Kind::InvalidLabel, issuer, format!("jump to {} of type {} needs a value", target, target.ty()));
            }
        }
        Ok(Expr::from_kind(ExprKind::Goto { kind, target, value }))
    }

    pub fn goto(target: LabelTarget) -> ConstructionResult<Expr> {
        Expr::make_goto(GotoKind::Goto, target, None)
    }

    pub fn break_to(target: LabelTarget) -> ConstructionResult<Expr> {
        Expr::make_goto(GotoKind::Break, target, None)
    }

    pub fn continue_to(target: LabelTarget) -> ConstructionResult<Expr> {
        Expr::make_goto(GotoKind::Continue, target, None)
    }

    pub fn return_to(target: LabelTarget, value: Option<Expr>) -> ConstructionResult<Expr> {
        Expr::make_goto(GotoKind::Return, target, value)
    }

    pub fn try_finally(body: Expr, finally: Expr) -> Expr {
        Expr::from_kind(ExprKind::Try { body, finally })
    }

    pub fn throw(value: Expr, ty: Type) -> ConstructionResult<Expr> {
        if !value.ty().is_reference_type() {
            return fail(Kind::NotReferenceType, "lowerkit.ir.factory.throw", format!("cannot throw a {}", value.ty()));
        }
        Ok(Expr::from_kind(ExprKind::Throw { value, ty }))
    }

    // ---- members and calls ----

    pub fn call(instance: Option<Expr>, method: &Method, arguments: Vec<Expr>) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.call";
        if method.is_constructor() {
            return fail(Kind::InvalidArgument, issuer, format!("{} is a constructor; use New", method));
        }
        if method.is_generic_definition() {
            return fail(Kind::InvalidArgument, issuer, format!("{} is an open generic method", method));
        }
        check_instance(instance.as_ref(), method.is_static, &method.declaring_type, "method", issuer)?;
        let arguments = coerce_arguments(&method.parameters, arguments, issuer)?;
        Ok(Expr::from_kind(ExprKind::Call { instance, method: method.clone(), arguments }))
    }

    pub fn call_static(method: &Method, arguments: Vec<Expr>) -> ConstructionResult<Expr> {
        Expr::call(None, method, arguments)
    }

    pub fn new(constructor: &Method, arguments: Vec<Expr>) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.new";
        if !constructor.is_constructor() {
            return fail(Kind::InvalidArgument, issuer, format!("{} is not a constructor", constructor));
        }
        let arguments = coerce_arguments(&constructor.parameters, arguments, issuer)?;
        Ok(Expr::from_kind(ExprKind::New { constructor: constructor.clone(), arguments }))
    }

    pub fn invoke(target: Expr, arguments: Vec<Expr>) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.invoke";
        let params = match target.ty() {
            Type::Function { params, .. } => params,
            other => return fail(Kind::TypeMismatch, issuer, format!("cannot invoke a {}", other)),
        };
        let infos = delegate_parameters(&params);
        let arguments = coerce_arguments(&infos, arguments, issuer)?;
        Ok(Expr::from_kind(ExprKind::Invoke { target, arguments }))
    }

    pub fn member(instance: Option<Expr>, member: &Member) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.member";
        check_instance(instance.as_ref(), member.is_static(), member.declaring_type(), "member", issuer)?;
        Ok(Expr::from_kind(ExprKind::Member { instance, member: member.clone() }))
    }

    pub fn property(instance: Expr, property: &Property) -> ConstructionResult<Expr> {
        Expr::member(Some(instance), &Member::Property(property.clone()))
    }

    pub fn index(instance: Expr, indexer: &Property, arguments: Vec<Expr>) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.index";
        if !indexer.is_indexer() {
            return fail(Kind::InvalidMember, issuer, format!("property {} is not an indexer", indexer.name));
        }
        check_instance(Some(&instance), false, &indexer.declaring_type, "indexer", issuer)?;
        let arguments = coerce_arguments(&indexer.index_parameters(), arguments, issuer)?;
        Ok(Expr::from_kind(ExprKind::Index { instance, indexer: indexer.clone(), arguments }))
    }

    pub fn array_index(array: Expr, indexes: Vec<Expr>) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.array_index";
        let rank = match array.ty().array_rank() {
            Some(rank) => rank,
            None => return fail(Kind::TypeMismatch, issuer, format!("{} is not an array", array.ty())),
        };
        if indexes.len() != rank {
            return fail(Kind::ArgumentCount, issuer, format!("array of rank {} indexed with {} indexes", rank, indexes.len()));
        }
        if let Some(bad) = indexes.iter().find(|i| i.ty() != Type::I32) {
            return fail(Kind::TypeMismatch, issuer, format!("array index must be int, got {}", bad.ty()));
        }
        Ok(Expr::from_kind(ExprKind::ArrayIndex { array, indexes }))
    }

    pub fn array_length(array: Expr) -> ConstructionResult<Expr> {
        if array.ty().array_rank() != Some(1) {
            return fail(Kind::TypeMismatch, "lowerkit.ir.factory.array_length", format!("{} is not a vector", array.ty()));
        }
        Ok(Expr::from_kind(ExprKind::ArrayLength { array }))
    }

    pub fn new_array(element_type: Type, expressions: Vec<Expr>) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.new_array";
        if element_type.is_void() {
            return fail(Kind::InvalidArgument, issuer, "array element type cannot be void");
        }
        if let Some(bad) = expressions.iter().find(|e| !is_assignable(&element_type, &e.ty())) {
            return fail(Kind::TypeMismatch, issuer, format!("{} element in {} array", bad.ty(), element_type));
        }
        Ok(Expr::from_kind(ExprKind::NewArray { element_type, expressions }))
    }

    pub fn lambda(parameters: Vec<Variable>, body: Expr, return_type: Option<Type>) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.lambda";
        check_unique_variables(&parameters, issuer)?;
        let ret = return_type.unwrap_or_else(|| body.ty());
        if !ret.is_void() && !is_assignable(&ret, &body.ty()) {
            return fail(Kind::TypeMismatch, issuer, format!("lambda body of type {} does not return {}", body.ty(), ret));
        }
        let ty = Type::function(parameters.iter().map(|p| p.ty().clone()).collect(), ret);
        Ok(Expr::from_kind(ExprKind::Lambda { parameters, body, ty }))
    }

    pub fn quote(lambda: Expr) -> ConstructionResult<Expr> {
        if !matches!(lambda.kind(), ExprKind::Lambda { .. }) {
            return fail(Kind::InvalidArgument, "lowerkit.ir.factory.quote", format!("only lambdas can be quoted, got {}", lambda.kind_name()));
        }
        Ok(Expr::from_kind(ExprKind::Quote { lambda }))
    }

    pub fn member_init(new_expression: Expr, bindings: Vec<MemberInitializer>) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.member_init";
        if !matches!(new_expression.kind(), ExprKind::New { .. }) {
            return fail(Kind::InvalidArgument, issuer, "member initialization needs a New expression");
        }
        let ty = new_expression.ty();
        for b in bindings.iter() {
            if b.member().is_static() || !(ty == *b.member().declaring_type() || b.member().declaring_type().is_reference_assignable_from(&ty)) {
                return fail(Kind::InvalidMember, issuer, format!("{} is not an instance member of {}", b.member(), ty));
            }
        }
        Ok(Expr::from_kind(ExprKind::MemberInit { new_expression, bindings }))
    }

    pub fn list_init(new_expression: Expr, initializers: Vec<ElementInit>) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ir.factory.list_init";
        if !matches!(new_expression.kind(), ExprKind::New { .. }) {
            return fail(Kind::InvalidArgument, issuer, "list initialization needs a New expression");
        }
        let ty = new_expression.ty();
        for init in initializers.iter() {
            let declaring = &init.add_method.declaring_type;
            if !(ty == *declaring || declaring.is_reference_assignable_from(&ty)) {
                return fail(Kind::InvalidMember, issuer, format!("{} is not declared on {}", init.add_method, ty));
            }
        }
        Ok(Expr::from_kind(ExprKind::ListInit { new_expression, initializers }))
    }

    pub fn extension(node: Node) -> Expr {
        Expr::from_kind(ExprKind::Extension(node))
    }
}

impl ElementInit {
    pub fn new(add_method: &Method, arguments: Vec<Expr>) -> ConstructionResult<ElementInit> {
        let issuer = "lowerkit.ir.factory.element_init";
        if add_method.is_static || add_method.is_constructor() {
            return fail(Kind::InvalidMember, issuer, format!("{} must be an instance method", add_method));
        }
        let arguments = coerce_arguments(&add_method.parameters, arguments, issuer)?;
        Ok(ElementInit { add_method: add_method.clone(), arguments })
    }
}

impl From<Node> for Expr {
    fn from(node: Node) -> Expr {
        Expr::extension(node)
    }
}

/// Synthetic parameter list of a delegate type: `arg0`, `arg1`, ...
pub fn delegate_parameters(params: &[Type]) -> Vec<ParameterInfo> {
    params
        .iter()
        .enumerate()
        .map(|(i, t)| ParameterInfo::new(&format!("arg{}", i), t.clone()).at(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_int_constants_are_interned() {
        assert!(Expr::int32(3).ptr_eq(&Expr::int32(3)));
        let made = Expr::constant(ConstValue::Int(3), Type::I32).unwrap();
        assert!(made.ptr_eq(&Expr::int32(3)));
        assert!(!Expr::int32(1000).ptr_eq(&Expr::int32(1000)));
        assert!(Expr::boolean(true).ptr_eq(&Expr::boolean(true)));
    }

    #[test]
    fn binary_requires_matching_operands() {
        let err = Expr::binary(BinaryOp::Add, Expr::int32(1), Expr::string("x")).unwrap_err();
        assert_eq!(err.kind(), Kind::TypeMismatch);
        let lifted = Expr::binary(
            BinaryOp::Add,
            Expr::default(Type::nullable_of(Type::I32)),
            Expr::default(Type::nullable_of(Type::I32)),
        )
        .unwrap();
        assert_eq!(lifted.ty(), Type::nullable_of(Type::I32));
    }

    #[test]
    fn conditional_test_must_be_bool() {
        let err = Expr::condition(Expr::int32(1), Expr::int32(2), Expr::int32(3)).unwrap_err();
        assert_eq!(err.kind(), Kind::NotBoolean);
    }

    #[test]
    fn lambda_is_quoted_for_quoted_parameter() {
        let x = Variable::named("x", Type::I32);
        let lambda = Expr::lambda(vec![x.clone()], x.expr(), None).unwrap();
        let param = ParameterInfo::new("f", Type::quoted(lambda.ty()));
        let arg = coerce_argument(&param, lambda, "test").unwrap();
        assert!(matches!(arg.kind(), ExprKind::Quote { .. }));
    }
}
