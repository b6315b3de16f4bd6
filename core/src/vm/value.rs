//! file: core/src/vm/value.rs
//! description: runtime values of the reference evaluator.
//!
//! Scalars are stored unboxed; `Boxed` remembers the static type of a value
//! converted to `object` so runtime type tests can see it. Arrays and
//! objects have reference identity through `Rc`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ir::expr::{Expr, Variable};
use crate::ir::types::Type;
use crate::ir::value::ConstValue;
use crate::vm::exec::Scope;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorState {
    pub depth: usize,
    pub enters: usize,
    pub exits: usize,
}

#[derive(Debug)]
pub struct ObjectValue {
    pub ty: Type,
    pub fields: RefCell<HashMap<String, Value>>,
    pub monitor: RefCell<MonitorState>,
}

#[derive(Debug)]
pub struct ArrayValue {
    pub element: Type,
    pub dims: Vec<usize>,
    pub items: RefCell<Vec<Value>>,
}

#[derive(Debug)]
pub struct Closure {
    pub parameters: Vec<Variable>,
    pub body: Expr,
    pub scope: Rc<Scope>,
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Char(char),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Index { value: i64, from_end: bool },
    /// Storage slots of one tuple container; slot 7 holds the `Rest` tuple.
    Tuple(Vec<Value>),
    Boxed(Type, Box<Value>),
    Array(Rc<ArrayValue>),
    Object(Rc<ObjectValue>),
    Function(Rc<Closure>),
    Quoted(Expr),
}

impl Value {
    pub fn string(s: &str) -> Value {
        Value::Str(s.to_string())
    }

    pub fn from_const(c: &ConstValue) -> Value {
        match c {
            ConstValue::Null => Value::Null,
            ConstValue::Bool(b) => Value::Bool(*b),
            ConstValue::Char(ch) => Value::Char(*ch),
            ConstValue::Int(i) => Value::Int(*i),
            ConstValue::UInt(u) => Value::UInt(*u),
            ConstValue::Float(x) => Value::Float(*x),
            ConstValue::Str(s) => Value::Str(s.clone()),
        }
    }

    /// Zero value of a type: `null` for references and nullables.
    pub fn default_of(ty: &Type) -> Value {
        match ty {
            Type::Bool => Value::Bool(false),
            Type::Char => Value::Char('\0'),
            Type::I8 | Type::I16 | Type::I32 | Type::I64 => Value::Int(0),
            Type::U8 | Type::U16 | Type::U32 | Type::U64 => Value::UInt(0),
            Type::F32 | Type::F64 => Value::Float(0.0),
            Type::Index => Value::Index { value: 0, from_end: false },
            Type::Tuple(_) => {
                let storage = ty.tuple_storage().unwrap_or_default();
                Value::Tuple(storage.iter().map(Value::default_of).collect())
            }
            _ => Value::Null,
        }
    }

    pub fn new_object(ty: Type) -> Value {
        Value::Object(Rc::new(ObjectValue {
            ty,
            fields: RefCell::new(HashMap::new()),
            monitor: RefCell::new(MonitorState::default()),
        }))
    }

    pub fn new_array(element: Type, dims: Vec<usize>, items: Vec<Value>) -> Value {
        Value::Array(Rc::new(ArrayValue { element, dims, items: RefCell::new(items) }))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.unboxed() {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.unboxed() {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            Value::Char(c) => Some(*c as i64),
            _ => None,
        }
    }

    /// The payload of a boxed value, or the value itself.
    pub fn unboxed(&self) -> &Value {
        match self {
            Value::Boxed(_, inner) => inner.unboxed(),
            other => other,
        }
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        match self {
            Value::Object(o) => o.fields.borrow().get(name).cloned(),
            _ => None,
        }
    }

    pub fn set_field(&self, name: &str, value: Value) -> bool {
        match self {
            Value::Object(o) => {
                o.fields.borrow_mut().insert(name.to_string(), value);
                true
            }
            _ => false,
        }
    }

    pub fn monitor(&self) -> Option<MonitorState> {
        match self {
            Value::Object(o) => Some(*o.monitor.borrow()),
            _ => None,
        }
    }

    /// Components of a tuple in logical order, following the `Rest` chain.
    pub fn tuple_items(&self) -> Option<Vec<Value>> {
        let slots = match self.unboxed() {
            Value::Tuple(slots) => slots,
            _ => return None,
        };
        let mut out = Vec::new();
        for (i, v) in slots.iter().enumerate() {
            if i == crate::ir::types::TUPLE_MAX_FIXED {
                out.extend(v.tuple_items()?);
            } else {
                out.push(v.clone());
            }
        }
        Some(out)
    }

    /// Equality used by `==`: values for scalars and strings, identity for
    /// arrays, objects and delegates.
    pub fn equals(&self, other: &Value) -> bool {
        match (self.unboxed(), other.unboxed()) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::UInt(a), Value::UInt(b)) => a == b,
            (Value::Int(a), Value::UInt(b)) | (Value::UInt(b), Value::Int(a)) => *a >= 0 && *a as u64 == *b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Index { value: a, from_end: x }, Value::Index { value: b, from_end: y }) => a == b && x == y,
            (Value::Tuple(a), Value::Tuple(b)) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equals(y)),
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        write!(f, "{}", x as i64)
    } else {
        write!(f, "{}", x)
    }
}

/// Text form used by string concatenation and formatting; `null` renders
/// as the empty string.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Char(c) => write!(f, "{}", c),
            Value::Int(i) => write!(f, "{}", i),
            Value::UInt(u) => write!(f, "{}", u),
            Value::Float(x) => write_float(f, *x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Index { value, from_end } => write!(f, "{}{}", if *from_end { "^" } else { "" }, value),
            Value::Tuple(_) => {
                let items = self.tuple_items().unwrap_or_default();
                write!(f, "(")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
            Value::Boxed(_, inner) => write!(f, "{}", inner),
            Value::Array(a) => write!(f, "{}[]", a.element),
            Value::Object(o) => write!(f, "{}", o.ty),
            Value::Function(_) => write!(f, "<function>"),
            Value::Quoted(e) => write!(f, "{}", e.ty()),
        }
    }
}
