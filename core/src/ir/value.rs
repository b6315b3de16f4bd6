use serde::{Deserialize, Serialize};
use std::fmt;

use super::types::Type;

/// Compile-time constant carried by `Constant` nodes, switch test values and
/// parameter defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Null,
    Bool(bool),
    Char(char),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
}

impl ConstValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ConstValue::Null)
    }

    /// Whether the constant is representable in a location of type `ty`.
    pub fn fits(&self, ty: &Type) -> bool {
        let target = ty.non_nullable();
        match self {
            ConstValue::Null => ty.can_be_null(),
            _ if *target == Type::Object => true,
            ConstValue::Bool(_) => target.is_bool(),
            ConstValue::Char(_) => *target == Type::Char,
            ConstValue::Int(i) => match target.integral_range() {
                Some((lo, hi)) if *target != Type::Char => (lo..=hi).contains(&(*i as i128)),
                _ => false,
            },
            ConstValue::UInt(u) => match target.integral_range() {
                Some((lo, hi)) if *target != Type::Char => (lo..=hi).contains(&(*u as i128)),
                _ => false,
            },
            ConstValue::Float(_) => target.is_floating(),
            ConstValue::Str(_) => *target == Type::String,
        }
    }

    /// The type a constant takes when none is given explicitly.
    pub fn natural_type(&self) -> Type {
        match self {
            ConstValue::Null => Type::Object,
            ConstValue::Bool(_) => Type::Bool,
            ConstValue::Char(_) => Type::Char,
            ConstValue::Int(i) => {
                if i32::try_from(*i).is_ok() {
                    Type::I32
                } else {
                    Type::I64
                }
            }
            ConstValue::UInt(_) => Type::U64,
            ConstValue::Float(_) => Type::F64,
            ConstValue::Str(_) => Type::String,
        }
    }

    /// Value identity used for duplicate detection; floats compare bitwise
    /// and integers compare across the signed/unsigned split.
    pub fn same_as(&self, other: &ConstValue) -> bool {
        match (self, other) {
            (ConstValue::Float(a), ConstValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ConstValue::Int(a), ConstValue::UInt(b)) | (ConstValue::UInt(b), ConstValue::Int(a)) => {
                *a >= 0 && *a as u64 == *b
            }
            _ => self == other,
        }
    }

    /// Coarse category of a non-null constant; literals of one switch
    /// section must share it.
    pub fn category(&self) -> Option<&'static str> {
        match self {
            ConstValue::Null => None,
            ConstValue::Bool(_) => Some("bool"),
            ConstValue::Char(_) => Some("char"),
            ConstValue::Int(_) | ConstValue::UInt(_) => Some("integer"),
            ConstValue::Float(_) => Some("float"),
            ConstValue::Str(_) => Some("string"),
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Null => write!(f, "null"),
            ConstValue::Bool(b) => write!(f, "{}", b),
            ConstValue::Char(c) => write!(f, "'{}'", c),
            ConstValue::Int(i) => write!(f, "{}", i),
            ConstValue::UInt(u) => write!(f, "{}u", u),
            ConstValue::Float(x) => write!(f, "{:?}", x),
            ConstValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}
