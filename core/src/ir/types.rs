//! file: core/src/ir/types.rs
//! description: type objects supplied by callers and the classification
//! helpers used by validation and lowering.
//!
//! Types are plain values: structural equality is type identity. Named
//! classes/structs/interfaces are shared through `Arc` and compare by their
//! full definition (name, kind, base and interfaces).

use std::fmt;
use std::sync::Arc;

/// Largest number of components a tuple container stores inline; the last
/// slot of a full container holds the `Rest` tuple.
pub const TUPLE_MAX_FIXED: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKind {
    Class,
    Struct,
    Interface,
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub struct NamedType {
    pub name: String,
    pub kind: NamedKind,
    pub base: Option<Type>,
    pub interfaces: Vec<Type>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Object,
    /// Position in a sequence, possibly counted from the end.
    Index,
    Nullable(Box<Type>),
    Array { element: Box<Type>, rank: usize },
    /// Logical tuple; the storage nesting is derived on demand.
    Tuple(Vec<Type>),
    Function { params: Vec<Type>, ret: Box<Type> },
    /// Expression tree of a function type.
    Quoted(Box<Type>),
    Named(Arc<NamedType>),
    ByRef(Box<Type>),
    Pointer(Box<Type>),
}

impl Type {
    // Convenience constructors
    pub fn nullable_of(inner: Type) -> Self {
        Type::Nullable(Box::new(inner))
    }
    pub fn array_of(element: Type) -> Self {
        Type::Array { element: Box::new(element), rank: 1 }
    }
    pub fn array_with_rank(element: Type, rank: usize) -> Self {
        Type::Array { element: Box::new(element), rank }
    }
    pub fn function(params: Vec<Type>, ret: Type) -> Self {
        Type::Function { params, ret: Box::new(ret) }
    }
    pub fn quoted(function: Type) -> Self {
        Type::Quoted(Box::new(function))
    }
    pub fn by_ref(inner: Type) -> Self {
        Type::ByRef(Box::new(inner))
    }
    pub fn pointer(inner: Type) -> Self {
        Type::Pointer(Box::new(inner))
    }
    pub fn class(name: &str) -> Self {
        Self::named(name, NamedKind::Class, None, Vec::new())
    }
    pub fn class_with_base(name: &str, base: Type) -> Self {
        Self::named(name, NamedKind::Class, Some(base), Vec::new())
    }
    pub fn structure(name: &str) -> Self {
        Self::named(name, NamedKind::Struct, None, Vec::new())
    }
    pub fn interface(name: &str) -> Self {
        Self::named(name, NamedKind::Interface, None, Vec::new())
    }
    pub fn named(name: &str, kind: NamedKind, base: Option<Type>, interfaces: Vec<Type>) -> Self {
        Type::Named(Arc::new(NamedType {
            name: name.to_string(),
            kind,
            base,
            interfaces,
        }))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Bool)
    }

    pub fn is_value_type(&self) -> bool {
        match self {
            Type::Bool
            | Type::Char
            | Type::I8
            | Type::I16
            | Type::I32
            | Type::I64
            | Type::U8
            | Type::U16
            | Type::U32
            | Type::U64
            | Type::F32
            | Type::F64
            | Type::Index
            | Type::Nullable(_)
            | Type::Tuple(_) => true,
            Type::Named(n) => n.kind == NamedKind::Struct,
            _ => false,
        }
    }

    pub fn is_reference_type(&self) -> bool {
        match self {
            Type::String | Type::Object | Type::Array { .. } | Type::Function { .. } | Type::Quoted(_) => true,
            Type::Named(n) => n.kind != NamedKind::Struct,
            _ => false,
        }
    }

    pub fn is_nullable_type(&self) -> bool {
        matches!(self, Type::Nullable(_))
    }

    /// True for types whose values may be null at run time.
    pub fn can_be_null(&self) -> bool {
        self.is_reference_type() || self.is_nullable_type()
    }

    /// Strip one level of `Nullable`.
    pub fn non_nullable(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            _ => self,
        }
    }

    /// Lift a non-nullable value type to its nullable form; other types are
    /// returned unchanged.
    pub fn to_nullable(&self) -> Type {
        if self.is_value_type() && !self.is_nullable_type() {
            Type::nullable_of(self.clone())
        } else {
            self.clone()
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            Type::I8 | Type::I16 | Type::I32 | Type::I64 | Type::U8 | Type::U16 | Type::U32 | Type::U64
        )
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    /// Integral or floating point; `char` and `bool` are excluded.
    pub fn is_arithmetic(&self) -> bool {
        self.is_integral() || self.is_floating()
    }

    pub fn is_integral_or_bool(&self) -> bool {
        self.is_integral() || self.is_bool()
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Type::I8 | Type::I16 | Type::I32 | Type::I64 | Type::F32 | Type::F64)
    }

    /// Inclusive value range of an integral type (or `char`).
    pub fn integral_range(&self) -> Option<(i128, i128)> {
        let range = match self {
            Type::I8 => (i8::MIN as i128, i8::MAX as i128),
            Type::I16 => (i16::MIN as i128, i16::MAX as i128),
            Type::I32 => (i32::MIN as i128, i32::MAX as i128),
            Type::I64 => (i64::MIN as i128, i64::MAX as i128),
            Type::U8 => (0, u8::MAX as i128),
            Type::U16 => (0, u16::MAX as i128),
            Type::U32 => (0, u32::MAX as i128),
            Type::U64 => (0, u64::MAX as i128),
            Type::Char => (0, u16::MAX as i128),
            _ => return None,
        };
        Some(range)
    }

    pub fn is_by_ref(&self) -> bool {
        matches!(self, Type::ByRef(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::Array { element, .. } => Some(element),
            Type::ByRef(inner) | Type::Pointer(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn array_rank(&self) -> Option<usize> {
        match self {
            Type::Array { rank, .. } => Some(*rank),
            _ => None,
        }
    }

    pub fn tuple_elements(&self) -> Option<&[Type]> {
        match self {
            Type::Tuple(elems) => Some(elems),
            _ => None,
        }
    }

    /// Component types as stored by one container: up to seven inline
    /// components followed by the nested `Rest` tuple when the arity exceeds
    /// seven.
    pub fn tuple_storage(&self) -> Option<Vec<Type>> {
        let elems = self.tuple_elements()?;
        if elems.len() <= TUPLE_MAX_FIXED {
            return Some(elems.to_vec());
        }
        let mut storage = elems[..TUPLE_MAX_FIXED].to_vec();
        storage.push(Type::Tuple(elems[TUPLE_MAX_FIXED..].to_vec()));
        Some(storage)
    }

    pub fn function_signature(&self) -> Option<(&[Type], &Type)> {
        match self {
            Type::Function { params, ret } => Some((params, ret)),
            _ => None,
        }
    }

    /// Whether a value of type `src` can be stored in a location of this type
    /// without a representation change: identical types, or reference types
    /// related by inheritance/interface implementation/array covariance.
    pub fn is_reference_assignable_from(&self, src: &Type) -> bool {
        if self == src {
            return true;
        }
        if !self.is_reference_type() || !src.is_reference_type() {
            return false;
        }
        match (self, src) {
            (Type::Object, _) => true,
            (
                Type::Array { element: de, rank: dr },
                Type::Array { element: se, rank: sr },
            ) => dr == sr && de.is_reference_type() && de.is_reference_assignable_from(se),
            _ => src.inherits_from(self),
        }
    }

    fn inherits_from(&self, target: &Type) -> bool {
        match self {
            Type::Named(n) => {
                if let Some(base) = &n.base {
                    if base == target || base.inherits_from(target) {
                        return true;
                    }
                }
                n.interfaces
                    .iter()
                    .any(|i| i == target || i.inherits_from(target))
            }
            _ => false,
        }
    }

    /// Name used for runtime type checks and diagnostics.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Type]) -> fmt::Result {
    for (i, t) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", t)?;
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Bool => write!(f, "bool"),
            Type::Char => write!(f, "char"),
            Type::I8 => write!(f, "sbyte"),
            Type::I16 => write!(f, "short"),
            Type::I32 => write!(f, "int"),
            Type::I64 => write!(f, "long"),
            Type::U8 => write!(f, "byte"),
            Type::U16 => write!(f, "ushort"),
            Type::U32 => write!(f, "uint"),
            Type::U64 => write!(f, "ulong"),
            Type::F32 => write!(f, "float"),
            Type::F64 => write!(f, "double"),
            Type::String => write!(f, "string"),
            Type::Object => write!(f, "object"),
            Type::Index => write!(f, "Index"),
            Type::Nullable(inner) => write!(f, "{}?", inner),
            Type::Array { element, rank } => {
                write!(f, "{}[{}]", element, ",".repeat(rank.saturating_sub(1)))
            }
            Type::Tuple(elems) => {
                write!(f, "(")?;
                write_list(f, elems)?;
                write!(f, ")")
            }
            Type::Function { params, ret } => {
                if ret.is_void() {
                    write!(f, "Action<")?;
                    write_list(f, params)?;
                } else {
                    write!(f, "Func<")?;
                    write_list(f, params)?;
                    if !params.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", ret)?;
                }
                write!(f, ">")
            }
            Type::Quoted(inner) => write!(f, "Expression<{}>", inner),
            Type::Named(n) => write!(f, "{}", n.name),
            Type::ByRef(inner) => write!(f, "ref {}", inner),
            Type::Pointer(inner) => write!(f, "{}*", inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullable_lifting_only_touches_value_types() {
        assert_eq!(Type::I32.to_nullable(), Type::nullable_of(Type::I32));
        assert_eq!(Type::nullable_of(Type::I32).to_nullable(), Type::nullable_of(Type::I32));
        assert_eq!(Type::String.to_nullable(), Type::String);
    }

    #[test]
    fn reference_assignability_follows_base_chain() {
        let animal = Type::class("Animal");
        let dog = Type::class_with_base("Dog", animal.clone());
        assert!(animal.is_reference_assignable_from(&dog));
        assert!(!dog.is_reference_assignable_from(&animal));
        assert!(Type::Object.is_reference_assignable_from(&dog));
        assert!(!Type::Object.is_reference_assignable_from(&Type::I32));
    }

    #[test]
    fn tuple_storage_nests_after_seven_components() {
        let t = Type::Tuple(vec![Type::I32; 9]);
        let storage = t.tuple_storage().unwrap();
        assert_eq!(storage.len(), 8);
        assert_eq!(storage[7], Type::Tuple(vec![Type::I32; 2]));
    }
}
