//! file: core/src/vm/host.rs
//! description: host services backing the well-known members.
//!
//! Composite formatting (`String.Format`), exception objects and monitor
//! bookkeeping live here so the native member implementations stay small.

use lazy_static::lazy_static;

use crate::ir::types::Type;
use crate::vm::value::Value;

lazy_static! {
    /// Root of the exception hierarchy used by runtime failures.
    pub static ref EXCEPTION: Type = Type::class("Exception");
    pub static ref NULL_REFERENCE_EXCEPTION: Type = Type::class_with_base("NullReferenceException", EXCEPTION.clone());
    pub static ref ARGUMENT_NULL_EXCEPTION: Type = Type::class_with_base("ArgumentNullException", EXCEPTION.clone());
    pub static ref ARGUMENT_OUT_OF_RANGE_EXCEPTION: Type =
        Type::class_with_base("ArgumentOutOfRangeException", EXCEPTION.clone());
    pub static ref INDEX_OUT_OF_RANGE_EXCEPTION: Type =
        Type::class_with_base("IndexOutOfRangeException", EXCEPTION.clone());
    pub static ref INVALID_CAST_EXCEPTION: Type = Type::class_with_base("InvalidCastException", EXCEPTION.clone());
    pub static ref INVALID_OPERATION_EXCEPTION: Type =
        Type::class_with_base("InvalidOperationException", EXCEPTION.clone());
    pub static ref OVERFLOW_EXCEPTION: Type = Type::class_with_base("OverflowException", EXCEPTION.clone());
    pub static ref DIVIDE_BY_ZERO_EXCEPTION: Type = Type::class_with_base("DivideByZeroException", EXCEPTION.clone());
    pub static ref FORMAT_EXCEPTION: Type = Type::class_with_base("FormatException", EXCEPTION.clone());
    pub static ref SYNCHRONIZATION_LOCK_EXCEPTION: Type =
        Type::class_with_base("SynchronizationLockException", EXCEPTION.clone());
}

/// New exception object of type `ty` carrying `message`.
pub fn exception(ty: &Type, message: &str) -> Value {
    let v = Value::new_object(ty.clone());
    v.set_field("Message", Value::string(message));
    v
}

/// Name of the exception type if `value` is an exception object.
pub fn exception_type_name(value: &Value) -> Option<String> {
    match value {
        Value::Object(o) if EXCEPTION.is_reference_assignable_from(&o.ty) => Some(o.ty.name()),
        _ => None,
    }
}

pub(crate) fn monitor_enter(target: &Value) -> Result<(), Value> {
    match target {
        Value::Null => Err(exception(&ARGUMENT_NULL_EXCEPTION, "Value cannot be null. (Parameter 'obj')")),
        Value::Object(o) => {
            let mut m = o.monitor.borrow_mut();
            m.depth += 1;
            m.enters += 1;
            Ok(())
        }
        _ => Ok(()),
    }
}

pub(crate) fn monitor_exit(target: &Value) -> Result<(), Value> {
    match target {
        Value::Null => Err(exception(&ARGUMENT_NULL_EXCEPTION, "Value cannot be null. (Parameter 'obj')")),
        Value::Object(o) => {
            let mut m = o.monitor.borrow_mut();
            if m.depth == 0 {
                return Err(exception(
                    &SYNCHRONIZATION_LOCK_EXCEPTION,
                    "Object synchronization method was called from an unsynchronized block of code.",
                ));
            }
            m.depth -= 1;
            m.exits += 1;
            Ok(())
        }
        _ => Ok(()),
    }
}

fn apply_format(value: &Value, spec: &str) -> String {
    let mut chars = spec.chars();
    let kind = chars.next();
    let digits: Option<usize> = chars.as_str().parse().ok();
    match (kind, value.unboxed()) {
        (Some('D') | Some('d'), Value::Int(i)) => {
            let width = digits.unwrap_or(0);
            if *i < 0 {
                format!("-{:0width$}", i.unsigned_abs(), width = width)
            } else {
                format!("{:0width$}", i, width = width)
            }
        }
        (Some('D') | Some('d'), Value::UInt(u)) => format!("{:0width$}", u, width = digits.unwrap_or(0)),
        (Some('X'), Value::Int(i)) => format!("{:0width$X}", i, width = digits.unwrap_or(0)),
        (Some('x'), Value::Int(i)) => format!("{:0width$x}", i, width = digits.unwrap_or(0)),
        (Some('F') | Some('f'), v) => match v {
            Value::Float(x) => format!("{:.prec$}", x, prec = digits.unwrap_or(2)),
            Value::Int(i) => format!("{:.prec$}", *i as f64, prec = digits.unwrap_or(2)),
            other => other.to_string(),
        },
        _ => value.to_string(),
    }
}

fn pad(text: String, alignment: i64) -> String {
    let width = alignment.unsigned_abs() as usize;
    let len = text.chars().count();
    if len >= width {
        return text;
    }
    let fill = " ".repeat(width - len);
    if alignment < 0 { text + &fill } else { fill + &text }
}

/// Composite formatting: `{index[,alignment][:format]}` items, `{{` and
/// `}}` escapes.
pub fn format_composite(template: &str, args: &[Value]) -> Result<String, String> {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::new();
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '{' {
            if chars.get(i + 1) == Some(&'{') {
                out.push('{');
                i += 2;
                continue;
            }
            let mut j = i + 1;
            let mut item = String::new();
            while j < chars.len() && chars[j] != '}' {
                item.push(chars[j]);
                j += 1;
            }
            if j >= chars.len() {
                return Err("Input string was not in a correct format: unmatched '{'".to_string());
            }
            let (head, spec) = match item.find(':') {
                Some(p) => (&item[..p], Some(&item[p + 1..])),
                None => (item.as_str(), None),
            };
            let (index, alignment) = match head.find(',') {
                Some(p) => (&head[..p], Some(&head[p + 1..])),
                None => (head, None),
            };
            let index: usize = index
                .trim()
                .parse()
                .map_err(|_| format!("Input string was not in a correct format: bad index '{}'", index))?;
            let value = args
                .get(index)
                .ok_or_else(|| format!("Index ({}) must be less than the size of the argument list", index))?;
            let mut text = match spec {
                Some(s) => apply_format(value, s),
                None => value.to_string(),
            };
            if let Some(a) = alignment {
                let a: i64 = a
                    .trim()
                    .parse()
                    .map_err(|_| format!("Input string was not in a correct format: bad alignment '{}'", a))?;
                text = pad(text, a);
            }
            out.push_str(&text);
            i = j + 1;
        } else if ch == '}' {
            if chars.get(i + 1) == Some(&'}') {
                out.push('}');
                i += 2;
                continue;
            }
            return Err("Input string was not in a correct format: unmatched '}'".to_string());
        } else {
            out.push(ch);
            i += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_format_handles_escapes_alignment_and_specs() {
        let args = vec![Value::Int(7), Value::string("ab"), Value::Float(1.5)];
        let s = format_composite("{{{0:D3}}}|{1,4}|{1,-4}|{2:F1}", &args).unwrap();
        assert_eq!(s, "{007}|  ab|ab  |1.5");
    }

    #[test]
    fn composite_format_rejects_missing_argument() {
        assert!(format_composite("{3}", &[Value::Int(1)]).is_err());
    }

    #[test]
    fn monitor_exit_without_enter_throws() {
        let o = Value::new_object(Type::class("Gate"));
        assert!(monitor_exit(&o).is_err());
        monitor_enter(&o).unwrap();
        monitor_exit(&o).unwrap();
        assert_eq!(o.monitor().unwrap().exits, 1);
    }
}
