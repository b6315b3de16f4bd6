//! file: core/src/vm/exec.rs
//! description: reference evaluator for primitive expression trees.
//!
//! Walks a fully reduced tree against a chain of variable scopes. Thrown
//! exceptions and label jumps unwind through `Flow`; a block that owns the
//! target label resumes right after it. Well-known and caller-supplied
//! members run through their native implementations, with by-ref arguments
//! written back to their variables after the call.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::{debug, trace};

use super::host::{
    self, DIVIDE_BY_ZERO_EXCEPTION, INDEX_OUT_OF_RANGE_EXCEPTION, INVALID_CAST_EXCEPTION, INVALID_OPERATION_EXCEPTION,
    NULL_REFERENCE_EXCEPTION, OVERFLOW_EXCEPTION,
};
use super::value::{ArrayValue, Closure, Value};
use crate::error::{Level, LowerkitErrorExt};
use crate::ir::expr::{Expr, ExprKind, LabelTarget, Variable};
use crate::ir::meta::{Member, Method, ParameterInfo, Property};
use crate::ir::op::{BinaryOp, UnaryOp};
use crate::ir::types::{TUPLE_MAX_FIXED, Type};

/// Upper bound on evaluated nodes per `evaluate` call.
const STEP_LIMIT: usize = 1_000_000;

/// One level of variable storage. Slots are shared so closures observe
/// later writes.
#[derive(Debug, Default)]
pub struct Scope {
    vars: RefCell<HashMap<usize, Rc<RefCell<Value>>>>,
    parent: Option<Rc<Scope>>,
}

impl Scope {
    fn child(parent: &Rc<Scope>) -> Rc<Scope> {
        Rc::new(Scope { vars: RefCell::default(), parent: Some(Rc::clone(parent)) })
    }

    fn declare(&self, variable: &Variable, value: Value) {
        self.vars.borrow_mut().insert(variable.id(), Rc::new(RefCell::new(value)));
    }

    fn lookup(&self, variable: &Variable) -> Option<Rc<RefCell<Value>>> {
        if let Some(slot) = self.vars.borrow().get(&variable.id()) {
            return Some(Rc::clone(slot));
        }
        self.parent.as_ref().and_then(|p| p.lookup(variable))
    }
}

#[derive(Debug, Clone)]
pub enum EvalError {
    /// An exception escaped the evaluated tree.
    Unhandled(Value),
    UnboundVariable(String),
    UnboundLabel(String),
    Unsupported(String),
    StepLimit(usize),
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Unhandled(v) => {
                let name = host::exception_type_name(v).unwrap_or_else(|| "value".to_string());
                match v.field("Message") {
                    Some(msg) => write!(f, "unhandled {}: {}", name, msg),
                    None => write!(f, "unhandled {}", name),
                }
            }
            EvalError::UnboundVariable(v) => write!(f, "variable {} is not in scope", v),
            EvalError::UnboundLabel(l) => write!(f, "jump to {} left the evaluated tree", l),
            EvalError::Unsupported(what) => write!(f, "cannot evaluate {}", what),
            EvalError::StepLimit(n) => write!(f, "evaluation exceeded {} steps", n),
        }
    }
}

impl std::error::Error for EvalError {}

impl LowerkitErrorExt for EvalError {
    fn level(&self) -> Level {
        match self {
            EvalError::StepLimit(_) => Level::Critical,
            _ => Level::Error,
        }
    }

    fn message(&self) -> String {
        self.to_string()
    }

    fn issuer(&self) -> String {
        "lowerkit.vm.exec.evaluate".to_string()
    }
}

impl EvalError {
    /// Type name of the escaped exception, if that is what happened.
    pub fn exception_type(&self) -> Option<String> {
        match self {
            EvalError::Unhandled(v) => host::exception_type_name(v),
            _ => None,
        }
    }
}

enum Flow {
    Throw(Value),
    Jump { label: LabelTarget, value: Option<Value> },
    Fault(EvalError),
}

type Eval<T> = Result<T, Flow>;

fn throw<T>(ty: &Type, message: &str) -> Eval<T> {
    Err(Flow::Throw(host::exception(ty, message)))
}

fn unsupported<T>(what: String) -> Eval<T> {
    Err(Flow::Fault(EvalError::Unsupported(what)))
}

/// Writable location resolved before the stored value is evaluated.
enum Place {
    Slot(Rc<RefCell<Value>>),
    Field { target: Value, name: String },
    Static(String),
    Property { target: Option<Value>, property: Property, args: Vec<Value> },
    Element { array: Rc<ArrayValue>, offset: usize },
}

fn int_of(v: &Value) -> Option<i128> {
    match v.unboxed() {
        Value::Int(i) => Some(*i as i128),
        Value::UInt(u) => Some(*u as i128),
        Value::Char(c) => Some(*c as u32 as i128),
        _ => None,
    }
}

fn float_of(v: &Value) -> Option<f64> {
    match v.unboxed() {
        Value::Float(x) => Some(*x),
        other => int_of(other).map(|i| i as f64),
    }
}

fn round_float(ty: &Type, x: f64) -> f64 {
    if *ty == Type::F32 { x as f32 as f64 } else { x }
}

/// Integer `n` stored as a value of integral type `ty`, wrapping unless
/// `checked`.
fn make_int(n: i128, ty: &Type, checked: bool) -> Eval<Value> {
    let (lo, hi) = ty.integral_range().unwrap_or((i64::MIN as i128, i64::MAX as i128));
    let n = if (lo..=hi).contains(&n) {
        n
    } else if checked {
        return throw(&OVERFLOW_EXCEPTION, "Arithmetic operation resulted in an overflow.");
    } else {
        (n - lo).rem_euclid(hi - lo + 1) + lo
    };
    Ok(match ty {
        Type::Char => Value::Char(char::from_u32(n as u32).unwrap_or('\u{fffd}')),
        t if t.is_signed() => Value::Int(n as i64),
        _ => Value::UInt(n as u64),
    })
}

/// Representation of a constant or converted scalar for static type `ty`.
fn scalar_for(value: Value, ty: &Type) -> Value {
    let t = ty.non_nullable();
    match (&value, t) {
        (Value::Null, _) => value,
        (Value::Int(i), t) if t.is_integral() && !t.is_signed() => Value::UInt(*i as u64),
        (Value::UInt(u), t) if t.is_integral() && t.is_signed() => Value::Int(*u as i64),
        (Value::Int(_) | Value::UInt(_), t) if t.is_floating() => Value::Float(float_of(&value).unwrap_or(0.0)),
        (Value::Str(_), _) => value,
        (_, Type::Object) => {
            let natural = match &value {
                Value::Bool(_) => Type::Bool,
                Value::Char(_) => Type::Char,
                Value::Int(_) => Type::I32,
                Value::UInt(_) => Type::U64,
                Value::Float(_) => Type::F64,
                _ => return value,
            };
            Value::Boxed(natural, Box::new(value))
        }
        _ => value,
    }
}

fn is_numeric(ty: &Type) -> bool {
    ty.is_arithmetic() || *ty == Type::Char
}

fn numeric_convert(v: &Value, to: &Type, checked: bool) -> Eval<Value> {
    if to.is_floating() {
        return Ok(Value::Float(round_float(to, float_of(v).unwrap_or(0.0))));
    }
    let n = match v.unboxed() {
        Value::Float(x) => {
            if checked && (x.is_nan() || x.is_infinite()) {
                return throw(&OVERFLOW_EXCEPTION, "Arithmetic operation resulted in an overflow.");
            }
            x.trunc() as i128
        }
        other => int_of(other).unwrap_or(0),
    };
    make_int(n, to, checked)
}

/// Dynamic type of `value` whose static type is `static_ty`.
fn runtime_type(value: &Value, static_ty: &Type) -> Type {
    match value {
        Value::Boxed(t, _) => t.clone(),
        Value::Object(o) => o.ty.clone(),
        Value::Str(_) => Type::String,
        Value::Array(a) => Type::Array { element: Box::new(a.element.clone()), rank: a.dims.len() },
        _ => static_ty.non_nullable().clone(),
    }
}

fn type_matches(value: &Value, static_ty: &Type, test: &Type) -> bool {
    if value.is_null() {
        return false;
    }
    let rt = runtime_type(value, static_ty);
    rt == *test || *test == Type::Object || test.is_reference_assignable_from(&rt) || *test.non_nullable() == rt
}

fn tuple_slot(name: &str) -> Option<usize> {
    if name == "Rest" {
        return Some(TUPLE_MAX_FIXED);
    }
    name.strip_prefix("Item").and_then(|n| n.parse::<usize>().ok()).map(|n| n - 1)
}

fn find_label(expressions: &[Expr], label: &LabelTarget) -> Option<usize> {
    expressions
        .iter()
        .position(|e| matches!(e.kind(), ExprKind::Label { target, .. } if target == label))
}

struct Machine {
    steps: usize,
    statics: HashMap<String, Value>,
}

impl Machine {
    fn eval_all(&mut self, exprs: &[Expr], scope: &Rc<Scope>) -> Eval<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e, scope)).collect()
    }

    /// Evaluate a receiver, throwing for a null reference.
    fn non_null(&mut self, expr: &Expr, scope: &Rc<Scope>) -> Eval<Value> {
        let v = self.eval(expr, scope)?;
        if v.is_null() {
            return throw(&NULL_REFERENCE_EXCEPTION, "Object reference not set to an instance of an object.");
        }
        Ok(v)
    }

    fn call_method(&mut self, method: &Method, instance: Option<&Value>, args: &mut [Value]) -> Eval<Value> {
        trace!("calling {}", method);
        match &method.native {
            Some(f) => f(instance, args).map_err(Flow::Throw),
            None => unsupported(format!("{} (no implementation)", method)),
        }
    }

    /// Copy by-ref argument slots back into their variables.
    fn write_back(&mut self, params: &[ParameterInfo], arguments: &[Expr], values: &[Value], scope: &Rc<Scope>) -> Eval<()> {
        for ((p, arg), value) in params.iter().zip(arguments).zip(values) {
            if !p.is_by_ref() {
                continue;
            }
            if let Some(v) = arg.as_variable() {
                let slot = scope
                    .lookup(v)
                    .ok_or_else(|| Flow::Fault(EvalError::UnboundVariable(v.to_string())))?;
                *slot.borrow_mut() = value.clone();
            }
        }
        Ok(())
    }

    fn place(&mut self, target: &Expr, scope: &Rc<Scope>) -> Eval<Place> {
        match target.kind() {
            ExprKind::Variable(v) => scope
                .lookup(v)
                .map(Place::Slot)
                .ok_or_else(|| Flow::Fault(EvalError::UnboundVariable(v.to_string()))),
            ExprKind::Member { instance, member } => {
                let target = match instance {
                    Some(i) => Some(self.non_null(i, scope)?),
                    None => None,
                };
                match (member, target) {
                    (Member::Field(f), None) => Ok(Place::Static(format!("{}.{}", f.declaring_type, f.name))),
                    (Member::Field(f), Some(t)) => Ok(Place::Field { target: t, name: f.name.clone() }),
                    (Member::Property(p), t) => Ok(Place::Property { target: t, property: p.clone(), args: Vec::new() }),
                }
            }
            ExprKind::Index { instance, indexer, arguments } => {
                let target = self.non_null(instance, scope)?;
                let args = self.eval_all(arguments, scope)?;
                Ok(Place::Property { target: Some(target), property: indexer.clone(), args })
            }
            ExprKind::ArrayIndex { array, indexes } => {
                let (array, offset) = self.element(array, indexes, scope)?;
                Ok(Place::Element { array, offset })
            }
            _ => unsupported(format!("assignment to {}", target.kind_name())),
        }
    }

    fn store(&mut self, place: Place, value: Value) -> Eval<()> {
        match place {
            Place::Slot(slot) => *slot.borrow_mut() = value,
            Place::Field { target, name } => {
                if !target.set_field(&name, value) {
                    return unsupported(format!("field store into a {}", runtime_type(&target, &Type::Object)));
                }
            }
            Place::Static(key) => {
                self.statics.insert(key, value);
            }
            Place::Property { target, property, mut args } => match property.setter.as_ref() {
                Some(setter) if setter.native.is_some() => {
                    args.push(value);
                    self.call_method(setter, target.as_ref(), &mut args)?;
                }
                _ => {
                    let stored = target.map(|t| t.set_field(&property.name, value)).unwrap_or(false);
                    if !stored {
                        return unsupported(format!("property store into {}", property.name));
                    }
                }
            },
            Place::Element { array, offset } => array.items.borrow_mut()[offset] = value,
        }
        Ok(())
    }

    fn read_member(&mut self, target: Option<Value>, member: &Member) -> Eval<Value> {
        match (member, target) {
            (Member::Field(f), None) => {
                let key = format!("{}.{}", f.declaring_type, f.name);
                Ok(self.statics.get(&key).cloned().unwrap_or_else(|| Value::default_of(&f.ty)))
            }
            (Member::Field(f), Some(t)) => match t.unboxed() {
                Value::Tuple(slots) => match tuple_slot(&f.name).and_then(|i| slots.get(i)) {
                    Some(v) => Ok(v.clone()),
                    None => unsupported(format!("tuple field {}", f.name)),
                },
                _ => Ok(t.field(&f.name).unwrap_or_else(|| Value::default_of(&f.ty))),
            },
            (Member::Property(p), t) => self.read_property(t, p, Vec::new()),
        }
    }

    fn read_property(&mut self, target: Option<Value>, property: &Property, mut args: Vec<Value>) -> Eval<Value> {
        match property.getter.as_ref() {
            Some(getter) if getter.native.is_some() => self.call_method(getter, target.as_ref(), &mut args),
            Some(_) => Ok(target
                .and_then(|t| t.field(&property.name))
                .unwrap_or_else(|| Value::default_of(&property.ty))),
            None => unsupported(format!("read of write-only property {}", property.name)),
        }
    }

    fn element(&mut self, array: &Expr, indexes: &[Expr], scope: &Rc<Scope>) -> Eval<(Rc<ArrayValue>, usize)> {
        let array = match self.non_null(array, scope)? {
            Value::Array(a) => a,
            other => return unsupported(format!("indexing a {}", runtime_type(&other, &Type::Object))),
        };
        let indexes = self.eval_all(indexes, scope)?;
        let mut offset = 0usize;
        for (i, dim) in indexes.iter().zip(&array.dims) {
            let i = int_of(i).unwrap_or(-1);
            if i < 0 || i >= *dim as i128 {
                return throw(&INDEX_OUT_OF_RANGE_EXCEPTION, "Index was outside the bounds of the array.");
            }
            offset = offset * dim + i as usize;
        }
        Ok((array, offset))
    }

    fn apply(&mut self, closure: &Closure, args: Vec<Value>) -> Eval<Value> {
        let scope = Scope::child(&closure.scope);
        for (p, a) in closure.parameters.iter().zip(args) {
            scope.declare(p, a);
        }
        match self.eval(&closure.body, &scope) {
            Err(Flow::Jump { label, value })
                if matches!(closure.body.kind(), ExprKind::Label { target, .. } if *target == label) =>
            {
                Ok(value.unwrap_or(Value::Null))
            }
            other => other,
        }
    }

    fn convert(&mut self, v: Value, from: &Type, to: &Type, checked: bool) -> Eval<Value> {
        if from == to {
            return Ok(v);
        }
        if v.is_null() {
            if to.can_be_null() {
                return Ok(Value::Null);
            }
            if from.is_nullable_type() {
                return throw(&INVALID_OPERATION_EXCEPTION, "Nullable object must have a value.");
            }
            return throw(&NULL_REFERENCE_EXCEPTION, "Object reference not set to an instance of an object.");
        }
        let (f, t) = (from.non_nullable(), to.non_nullable());
        if *to == Type::Object {
            return Ok(if f.is_value_type() { Value::Boxed(f.clone(), Box::new(v)) } else { v });
        }
        if f == t {
            return Ok(v);
        }
        if f.is_reference_type() && t.is_value_type() {
            return match v {
                Value::Boxed(bt, inner) if bt == *t => Ok(*inner),
                other => throw(
                    &INVALID_CAST_EXCEPTION,
                    &format!("Unable to cast object of type '{}' to type '{}'.", runtime_type(&other, f), t),
                ),
            };
        }
        if is_numeric(f) && is_numeric(t) {
            return numeric_convert(&v, t, checked);
        }
        let rt = runtime_type(&v, f);
        if t.is_reference_assignable_from(&rt) {
            Ok(v)
        } else {
            throw(&INVALID_CAST_EXCEPTION, &format!("Unable to cast object of type '{}' to type '{}'.", rt, t))
        }
    }

    fn unary(&mut self, op: UnaryOp, v: Value, from: &Type, ty: &Type) -> Eval<Value> {
        if v.is_null() && !matches!(op, UnaryOp::Convert | UnaryOp::ConvertChecked) {
            return Ok(Value::Null);
        }
        let t = ty.non_nullable();
        match op {
            UnaryOp::Negate | UnaryOp::NegateChecked => {
                if t.is_floating() {
                    Ok(Value::Float(-float_of(&v).unwrap_or(0.0)))
                } else {
                    make_int(-int_of(&v).unwrap_or(0), t, op == UnaryOp::NegateChecked)
                }
            }
            UnaryOp::Not => match v.unboxed() {
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => make_int(!int_of(other).unwrap_or(0), t, false),
            },
            UnaryOp::IsTrue => Ok(Value::Bool(v.as_bool() == Some(true))),
            UnaryOp::IsFalse => Ok(Value::Bool(v.as_bool() == Some(false))),
            UnaryOp::Convert => self.convert(v, from, ty, false),
            UnaryOp::ConvertChecked => self.convert(v, from, ty, true),
        }
    }

    fn arithmetic(&mut self, op: BinaryOp, l: &Value, r: &Value, ty: &Type) -> Eval<Value> {
        let t = ty.non_nullable();
        if t.is_floating() {
            let (a, b) = (float_of(l).unwrap_or(0.0), float_of(r).unwrap_or(0.0));
            let x = match op {
                BinaryOp::Add | BinaryOp::AddChecked => a + b,
                BinaryOp::Sub | BinaryOp::SubChecked => a - b,
                BinaryOp::Mul | BinaryOp::MulChecked => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            };
            return Ok(Value::Float(round_float(t, x)));
        }
        let (a, b) = (int_of(l).unwrap_or(0), int_of(r).unwrap_or(0));
        if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b == 0 {
            return throw(&DIVIDE_BY_ZERO_EXCEPTION, "Attempted to divide by zero.");
        }
        let n = match op {
            BinaryOp::Add | BinaryOp::AddChecked => a.checked_add(b),
            BinaryOp::Sub | BinaryOp::SubChecked => a.checked_sub(b),
            BinaryOp::Mul | BinaryOp::MulChecked => a.checked_mul(b),
            BinaryOp::Div => a.checked_div(b),
            _ => a.checked_rem(b),
        };
        match n {
            Some(n) => make_int(n, t, op.is_checked()),
            None if op.is_checked() => throw(&OVERFLOW_EXCEPTION, "Arithmetic operation resulted in an overflow."),
            None => make_int(a.wrapping_mul(b), t, false),
        }
    }

    fn bitwise(&mut self, op: BinaryOp, l: &Value, r: &Value, ty: &Type) -> Eval<Value> {
        if let (Some(a), Some(b)) = (l.as_bool(), r.as_bool()) {
            return Ok(Value::Bool(match op {
                BinaryOp::And => a & b,
                BinaryOp::Or => a | b,
                _ => a ^ b,
            }));
        }
        let t = ty.non_nullable();
        let (a, b) = (int_of(l).unwrap_or(0), int_of(r).unwrap_or(0));
        let n = match op {
            BinaryOp::And => a & b,
            BinaryOp::Or => a | b,
            BinaryOp::Xor => a ^ b,
            _ => {
                let wide = t.integral_range().map(|(_, hi)| hi > u32::MAX as i128).unwrap_or(false);
                let count = (b & if wide { 63 } else { 31 }) as u32;
                if op == BinaryOp::Shl { a << count } else { a >> count }
            }
        };
        make_int(n, t, false)
    }

    fn compare(op: BinaryOp, l: &Value, r: &Value) -> bool {
        let ord = match (l.unboxed(), r.unboxed()) {
            (Value::Float(_), _) | (_, Value::Float(_)) => {
                float_of(l).zip(float_of(r)).and_then(|(a, b)| a.partial_cmp(&b))
            }
            _ => int_of(l).zip(int_of(r)).map(|(a, b)| a.cmp(&b)),
        };
        match ord {
            Some(o) => match op {
                BinaryOp::Lt => o.is_lt(),
                BinaryOp::Le => o.is_le(),
                BinaryOp::Gt => o.is_gt(),
                _ => o.is_ge(),
            },
            None => false,
        }
    }

    fn binary(&mut self, expr: &Expr, scope: &Rc<Scope>) -> Eval<Value> {
        let ExprKind::Binary { op, left, right, ty, method, lifted } = expr.kind() else {
            return unsupported(expr.kind_name().to_string());
        };
        let op = *op;
        match op {
            BinaryOp::AndAlso => {
                let l = self.eval(left, scope)?;
                return if l.as_bool() == Some(false) { Ok(l) } else { self.eval(right, scope) };
            }
            BinaryOp::OrElse => {
                let l = self.eval(left, scope)?;
                return if l.as_bool() == Some(true) { Ok(l) } else { self.eval(right, scope) };
            }
            BinaryOp::Coalesce => {
                let l = self.eval(left, scope)?;
                return if l.is_null() { self.eval(right, scope) } else { Ok(l) };
            }
            _ => {}
        }
        let l = self.eval(left, scope)?;
        let r = self.eval(right, scope)?;
        if let Some(m) = method {
            return self.call_method(m, None, &mut [l, r]);
        }
        if *lifted && (l.is_null() || r.is_null()) {
            let both = l.is_null() && r.is_null();
            return Ok(match op {
                BinaryOp::Eq => Value::Bool(both),
                BinaryOp::Ne => Value::Bool(!both),
                o if o.is_relational() => Value::Bool(false),
                _ => Value::Null,
            });
        }
        match op {
            BinaryOp::Eq => Ok(Value::Bool(l.equals(&r))),
            BinaryOp::Ne => Ok(Value::Bool(!l.equals(&r))),
            o if o.is_relational() => Ok(Value::Bool(Self::compare(o, &l, &r))),
            o if o.is_arithmetic() => self.arithmetic(o, &l, &r, ty),
            o => self.bitwise(o, &l, &r, ty),
        }
    }

    fn block(&mut self, variables: &[Variable], expressions: &[Expr], ty: &Type, scope: &Rc<Scope>) -> Eval<Value> {
        let inner = Scope::child(scope);
        for v in variables {
            inner.declare(v, Value::default_of(v.ty()));
        }
        let mut last = Value::Null;
        let mut i = 0;
        while i < expressions.len() {
            match self.eval(&expressions[i], &inner) {
                Ok(v) => {
                    last = v;
                    i += 1;
                }
                Err(Flow::Jump { label, value }) => match find_label(expressions, &label) {
                    Some(j) => {
                        last = value.unwrap_or(Value::Null);
                        i = j + 1;
                    }
                    None => return Err(Flow::Jump { label, value }),
                },
                Err(other) => return Err(other),
            }
        }
        Ok(if ty.is_void() { Value::Null } else { last })
    }

    fn eval(&mut self, expr: &Expr, scope: &Rc<Scope>) -> Eval<Value> {
        self.steps += 1;
        if self.steps > STEP_LIMIT {
            return Err(Flow::Fault(EvalError::StepLimit(STEP_LIMIT)));
        }
        match expr.kind() {
            ExprKind::Constant { value, ty } => Ok(scalar_for(Value::from_const(value), ty)),
            ExprKind::Default { ty } => Ok(Value::default_of(ty)),
            ExprKind::Variable(v) => scope
                .lookup(v)
                .map(|slot| slot.borrow().clone())
                .ok_or_else(|| Flow::Fault(EvalError::UnboundVariable(v.to_string()))),
            ExprKind::Assign { target, value } => {
                let place = self.place(target, scope)?;
                let v = self.eval(value, scope)?;
                self.store(place, v.clone())?;
                Ok(v)
            }
            ExprKind::Unary { op, operand, ty, method } => {
                let v = self.eval(operand, scope)?;
                match method {
                    Some(m) => self.call_method(m, None, &mut [v]),
                    None => self.unary(*op, v, &operand.ty(), ty),
                }
            }
            ExprKind::Binary { .. } => self.binary(expr, scope),
            ExprKind::TypeIs { operand, test_type } => {
                let v = self.eval(operand, scope)?;
                Ok(Value::Bool(type_matches(&v, &operand.ty(), test_type)))
            }
            ExprKind::Conditional { test, if_true, if_false, .. } => {
                if self.eval(test, scope)?.as_bool() == Some(true) {
                    self.eval(if_true, scope)
                } else {
                    self.eval(if_false, scope)
                }
            }
            ExprKind::Block { variables, expressions, ty } => self.block(variables, expressions, ty, scope),
            ExprKind::Label { default_value, .. } => match default_value {
                Some(d) => self.eval(d, scope),
                None => Ok(Value::Null),
            },
            ExprKind::Goto { target, value, .. } => {
                let value = match value {
                    Some(v) => Some(self.eval(v, scope)?),
                    None => None,
                };
                Err(Flow::Jump { label: target.clone(), value })
            }
            ExprKind::Try { body, finally } => {
                let result = self.eval(body, scope);
                self.eval(finally, scope)?;
                result
            }
            ExprKind::Throw { value, .. } => {
                let v = self.eval(value, scope)?;
                if v.is_null() {
                    return throw(&NULL_REFERENCE_EXCEPTION, "Object reference not set to an instance of an object.");
                }
                Err(Flow::Throw(v))
            }
            ExprKind::Call { instance, method, arguments } => {
                let target = match instance {
                    Some(i) => Some(self.non_null(i, scope)?),
                    None => None,
                };
                let mut args = self.eval_all(arguments, scope)?;
                let out = self.call_method(method, target.as_ref(), &mut args)?;
                self.write_back(&method.parameters, arguments, &args, scope)?;
                Ok(out)
            }
            ExprKind::New { constructor, arguments } => {
                let mut args = self.eval_all(arguments, scope)?;
                let out = match &constructor.native {
                    Some(_) => self.call_method(constructor, None, &mut args)?,
                    None => Value::new_object(constructor.declaring_type.clone()),
                };
                self.write_back(&constructor.parameters, arguments, &args, scope)?;
                Ok(out)
            }
            ExprKind::Invoke { target, arguments } => {
                let f = self.non_null(target, scope)?;
                let args = self.eval_all(arguments, scope)?;
                match f {
                    Value::Function(c) => self.apply(&c, args),
                    other => unsupported(format!("invoking a {}", runtime_type(&other, &target.ty()))),
                }
            }
            ExprKind::Member { instance, member } => {
                let target = match instance {
                    Some(i) => Some(self.non_null(i, scope)?),
                    None => None,
                };
                self.read_member(target, member)
            }
            ExprKind::Index { instance, indexer, arguments } => {
                let target = self.non_null(instance, scope)?;
                let args = self.eval_all(arguments, scope)?;
                self.read_property(Some(target), indexer, args)
            }
            ExprKind::ArrayIndex { array, indexes } => {
                let (array, offset) = self.element(array, indexes, scope)?;
                let v = array.items.borrow()[offset].clone();
                Ok(v)
            }
            ExprKind::ArrayLength { array } => match self.non_null(array, scope)? {
                Value::Array(a) => Ok(Value::Int(a.items.borrow().len() as i64)),
                other => unsupported(format!("length of a {}", runtime_type(&other, &Type::Object))),
            },
            ExprKind::NewArray { element_type, expressions } => {
                let items = self.eval_all(expressions, scope)?;
                Ok(Value::new_array(element_type.clone(), vec![items.len()], items))
            }
            ExprKind::Lambda { parameters, body, .. } => Ok(Value::Function(Rc::new(Closure {
                parameters: parameters.clone(),
                body: body.clone(),
                scope: Rc::clone(scope),
            }))),
            ExprKind::Quote { lambda } => Ok(Value::Quoted(lambda.clone())),
            ExprKind::MemberInit { new_expression, bindings } => {
                let obj = self.eval(new_expression, scope)?;
                for b in bindings {
                    let v = self.eval(b.expression(), scope)?;
                    let place = match b.member() {
                        Member::Field(f) => Place::Field { target: obj.clone(), name: f.name.clone() },
                        Member::Property(p) => Place::Property { target: Some(obj.clone()), property: p.clone(), args: Vec::new() },
                    };
                    self.store(place, v)?;
                }
                Ok(obj)
            }
            ExprKind::ListInit { new_expression, initializers } => {
                let obj = self.eval(new_expression, scope)?;
                for init in initializers {
                    let mut args = self.eval_all(&init.arguments, scope)?;
                    self.call_method(&init.add_method, Some(&obj), &mut args)?;
                }
                Ok(obj)
            }
            ExprKind::Extension(node) => unsupported(format!("{} (reduce extension nodes first)", node)),
        }
    }
}

/// Evaluate a primitive tree with the given free-variable bindings.
pub fn evaluate(expr: &Expr, bindings: &[(Variable, Value)]) -> Result<Value, EvalError> {
    let root = Rc::new(Scope::default());
    for (v, value) in bindings {
        root.declare(v, value.clone());
    }
    let mut machine = Machine { steps: 0, statics: HashMap::new() };
    let out = machine.eval(expr, &root);
    debug!("evaluated tree of type {} in {} steps", expr.ty(), machine.steps);
    match out {
        Ok(v) => Ok(v),
        Err(Flow::Throw(v)) => Err(EvalError::Unhandled(v)),
        Err(Flow::Jump { label, .. }) => Err(EvalError::UnboundLabel(label.to_string())),
        Err(Flow::Fault(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchecked_arithmetic_wraps_and_checked_throws() {
        let max = Expr::int32(i32::MAX);
        let wrapped = Expr::binary(BinaryOp::Add, max.clone(), Expr::int32(1)).unwrap();
        assert!(matches!(evaluate(&wrapped, &[]).unwrap(), Value::Int(i) if i == i32::MIN as i64));
        let checked = Expr::binary(BinaryOp::AddChecked, max, Expr::int32(1)).unwrap();
        let err = evaluate(&checked, &[]).unwrap_err();
        assert_eq!(err.exception_type().as_deref(), Some("OverflowException"));
    }

    #[test]
    fn goto_resumes_after_label_in_enclosing_block() {
        let x = Variable::named("x", Type::I32);
        let skip = LabelTarget::void("skip");
        let body = Expr::block_with(
            vec![x.clone()],
            vec![
                Expr::assign(x.expr(), Expr::int32(1)).unwrap(),
                Expr::goto(skip.clone()).unwrap(),
                Expr::assign(x.expr(), Expr::int32(2)).unwrap(),
                Expr::label(skip, None).unwrap(),
                x.expr(),
            ],
        )
        .unwrap();
        assert!(matches!(evaluate(&body, &[]).unwrap(), Value::Int(1)));
    }

    #[test]
    fn finally_runs_when_body_throws() {
        let hits = Variable::named("hits", Type::I32);
        let thrown = Expr::throw(Expr::new(&Method::constructor(Type::class("Boom")).build(), vec![]).unwrap(), Type::Void).unwrap();
        let bump = Expr::assign(hits.expr(), Expr::binary(BinaryOp::Add, hits.expr(), Expr::int32(1)).unwrap()).unwrap();
        let tree = Expr::try_finally(thrown, bump);
        let slot = (hits.clone(), Value::Int(0));
        let root = Rc::new(Scope::default());
        root.declare(&slot.0, slot.1.clone());
        let mut machine = Machine { steps: 0, statics: HashMap::new() };
        assert!(matches!(machine.eval(&tree, &root), Err(Flow::Throw(_))));
        assert!(matches!(root.lookup(&hits).map(|s| s.borrow().clone()), Some(Value::Int(1))));
    }

    #[test]
    fn boxing_keeps_the_runtime_type() {
        let boxed = Expr::boxed(Expr::int32(3)).unwrap();
        let test = Expr::type_is(boxed.clone(), Type::I32);
        assert!(matches!(evaluate(&test, &[]).unwrap(), Value::Bool(true)));
        let back = Expr::convert(boxed, Type::I64).unwrap();
        let err = evaluate(&back, &[]).unwrap_err();
        assert_eq!(err.exception_type().as_deref(), Some("InvalidCastException"));
    }
}
