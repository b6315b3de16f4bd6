//! file: core/src/ir/wellknown.rs
//! description: members the lowering engine selects on its own.
//!
//! String concatenation and formatting, monitor enter/exit, `Index`
//! construction, the switch-expression failure and tuple constructors are
//! resolved once per process. Each descriptor carries a native
//! implementation so the reference evaluator can run lowered trees.

use std::collections::HashMap;
use std::sync::Mutex;

use lazy_static::lazy_static;

use super::meta::{Field, Method};
use super::types::{TUPLE_MAX_FIXED, Type};
use crate::vm::host::{self, ARGUMENT_OUT_OF_RANGE_EXCEPTION, FORMAT_EXCEPTION, INVALID_OPERATION_EXCEPTION};
use crate::vm::value::Value;

/// Largest argument count served by a fixed-arity `String.Format` overload.
pub const FORMAT_MAX_FIXED: usize = 3;

fn concat_native(_: Option<&Value>, args: &mut [Value]) -> Result<Value, Value> {
    Ok(Value::Str(format!("{}{}", args[0], args[1])))
}

fn format_native(_: Option<&Value>, args: &mut [Value]) -> Result<Value, Value> {
    let template = match &args[0] {
        Value::Str(s) => s.clone(),
        _ => return Err(host::exception(&host::ARGUMENT_NULL_EXCEPTION, "format")),
    };
    let rest: Vec<Value> = match args.get(1) {
        Some(Value::Array(a)) if args.len() == 2 => a.items.borrow().clone(),
        _ => args[1..].to_vec(),
    };
    host::format_composite(&template, &rest)
        .map(Value::Str)
        .map_err(|msg| host::exception(&FORMAT_EXCEPTION, &msg))
}

fn format_overload(arity: usize) -> Method {
    let mut b = Method::builder("Format", Type::String)
        .static_method()
        .param("format", Type::String);
    for i in 0..arity {
        b = b.param(&format!("arg{}", i), Type::Object);
    }
    b.returns(Type::String).native(format_native).build()
}

lazy_static! {
    static ref MONITOR: Type = Type::class("Monitor");
    static ref SWITCH_EXCEPTION: Type =
        Type::class_with_base("SwitchExpressionException", INVALID_OPERATION_EXCEPTION.clone());

    static ref STRING_CONCAT: Method = Method::builder("Concat", Type::String)
        .static_method()
        .param("str0", Type::String)
        .param("str1", Type::String)
        .returns(Type::String)
        .native(concat_native)
        .build();
    static ref OBJECT_CONCAT: Method = Method::builder("Concat", Type::String)
        .static_method()
        .param("arg0", Type::Object)
        .param("arg1", Type::Object)
        .returns(Type::String)
        .native(concat_native)
        .build();

    static ref STRING_FORMAT: Vec<Method> = (1..=FORMAT_MAX_FIXED).map(format_overload).collect();
    static ref STRING_FORMAT_ARRAY: Method = Method::builder("Format", Type::String)
        .static_method()
        .param("format", Type::String)
        .params_array("args", Type::Object)
        .returns(Type::String)
        .native(format_native)
        .build();

    static ref MONITOR_ENTER: Method = Method::builder("Enter", MONITOR.clone())
        .static_method()
        .param("obj", Type::Object)
        .param("lockTaken", Type::by_ref(Type::Bool))
        .native(|_, args| {
            host::monitor_enter(&args[0])?;
            args[1] = Value::Bool(true);
            Ok(Value::Null)
        })
        .build();
    static ref MONITOR_EXIT: Method = Method::builder("Exit", MONITOR.clone())
        .static_method()
        .param("obj", Type::Object)
        .native(|_, args| host::monitor_exit(&args[0]).map(|_| Value::Null))
        .build();

    static ref INDEX_CTOR: Method = Method::constructor(Type::Index)
        .param("value", Type::I32)
        .param("fromEnd", Type::Bool)
        .native(|_, args| {
            let value = args[0].as_i64().unwrap_or(0);
            if value < 0 {
                return Err(host::exception(&ARGUMENT_OUT_OF_RANGE_EXCEPTION, "Non-negative number required. (Parameter 'value')"));
            }
            let from_end = args[1].as_bool().unwrap_or(false);
            Ok(Value::Index { value, from_end })
        })
        .build();
    static ref INDEX_GET_OFFSET: Method = Method::builder("GetOffset", Type::Index)
        .param("length", Type::I32)
        .returns(Type::I32)
        .native(|instance, args| {
            let length = args[0].as_i64().unwrap_or(0);
            match instance.map(Value::unboxed) {
                Some(Value::Index { value, from_end: true }) => Ok(Value::Int(length - value)),
                Some(Value::Index { value, from_end: false }) => Ok(Value::Int(*value)),
                _ => Err(host::exception(&host::NULL_REFERENCE_EXCEPTION, "Index.GetOffset on a non-index")),
            }
        })
        .build();

    static ref SWITCH_EXCEPTION_CTOR: Method = Method::constructor(SWITCH_EXCEPTION.clone())
        .param("unmatchedValue", Type::Object)
        .native(|_, args| {
            let e = host::exception(&SWITCH_EXCEPTION, "Non-exhaustive switch expression failed to match its input.");
            e.set_field("UnmatchedValue", args[0].clone());
            Ok(e)
        })
        .build();

    static ref TUPLE_CTORS: Mutex<HashMap<Type, Method>> = Mutex::new(HashMap::new());
}

/// `String.Concat(string, string)`.
pub fn string_concat() -> &'static Method {
    &STRING_CONCAT
}

/// `String.Concat(object, object)`.
pub fn object_concat() -> &'static Method {
    &OBJECT_CONCAT
}

/// `String.Format` overload taking `arity` boxed arguments: a fixed-arity
/// overload up to `FORMAT_MAX_FIXED`, the `object[]` overload beyond.
pub fn string_format(arity: usize) -> &'static Method {
    if (1..=FORMAT_MAX_FIXED).contains(&arity) {
        &STRING_FORMAT[arity - 1]
    } else {
        &STRING_FORMAT_ARRAY
    }
}

/// `Monitor.Enter(object, ref bool)`.
pub fn monitor_enter() -> &'static Method {
    &MONITOR_ENTER
}

/// `Monitor.Exit(object)`.
pub fn monitor_exit() -> &'static Method {
    &MONITOR_EXIT
}

/// `Index(int value, bool fromEnd)`.
pub fn index_constructor() -> &'static Method {
    &INDEX_CTOR
}

/// `Index.GetOffset(int length)`.
pub fn index_get_offset() -> &'static Method {
    &INDEX_GET_OFFSET
}

pub fn switch_exception_type() -> &'static Type {
    &SWITCH_EXCEPTION
}

/// `SwitchExpressionException(object unmatchedValue)`.
pub fn switch_exception_constructor() -> &'static Method {
    &SWITCH_EXCEPTION_CTOR
}

/// Constructor of the container storing tuple type `ty`: one parameter per
/// inline component plus `rest` when the arity exceeds seven. Memoized.
pub fn tuple_constructor(ty: &Type) -> Option<Method> {
    let storage = ty.tuple_storage()?;
    let mut cache = TUPLE_CTORS.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(m) = cache.get(ty) {
        return Some(m.clone());
    }
    let mut b = Method::constructor(ty.clone());
    for (i, t) in storage.iter().enumerate() {
        let name = if i == TUPLE_MAX_FIXED { "rest".to_string() } else { format!("item{}", i + 1) };
        b = b.param(&name, t.clone());
    }
    let ctor = b.native(|_, args| Ok(Value::Tuple(args.to_vec()))).build();
    cache.insert(ty.clone(), ctor.clone());
    Some(ctor)
}

/// Storage field `Item{n}` (or `Rest` at slot seven) of one tuple container.
pub fn tuple_field(ty: &Type, slot: usize) -> Option<Field> {
    let storage = ty.tuple_storage()?;
    let field_ty = storage.get(slot)?.clone();
    let name = if slot == TUPLE_MAX_FIXED { "Rest".to_string() } else { format!("Item{}", slot + 1) };
    Some(Field::new(&name, ty.clone(), field_ty))
}
