//! file: core/src/ir/meta.rs
//! description: metadata descriptors for methods, constructors, fields and
//! properties.
//!
//! Descriptors are resolved by the caller and handed to node factories,
//! which only check them. Each descriptor is shared through an `Arc` and
//! compares by identity, the way reflection handles do.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use super::types::Type;
use super::value::ConstValue;
use crate::vm::value::Value;

/// Host implementation used by the evaluator: receives the instance (if
/// any) and the argument slots (by-ref slots are written back), returns the
/// result or a thrown exception value.
pub type NativeFn = Arc<dyn Fn(Option<&Value>, &mut [Value]) -> Result<Value, Value> + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterInfo {
    pub name: String,
    pub ty: Type,
    pub position: usize,
    pub is_optional: bool,
    pub default_value: Option<ConstValue>,
    pub is_params_array: bool,
}

impl ParameterInfo {
    pub fn new(name: &str, ty: Type) -> Self {
        ParameterInfo {
            name: name.to_string(),
            ty,
            position: 0,
            is_optional: false,
            default_value: None,
            is_params_array: false,
        }
    }

    pub fn with_default(mut self, value: ConstValue) -> Self {
        self.is_optional = true;
        self.default_value = Some(value);
        self
    }

    pub fn as_params_array(mut self) -> Self {
        self.is_params_array = true;
        self
    }

    pub fn at(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    pub fn is_by_ref(&self) -> bool {
        self.ty.is_by_ref()
    }

    /// Declared type with any by-ref wrapper removed.
    pub fn value_type(&self) -> &Type {
        match &self.ty {
            Type::ByRef(inner) => inner,
            other => other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Constructor,
}

pub struct MethodDef {
    pub name: String,
    pub declaring_type: Type,
    pub parameters: Vec<ParameterInfo>,
    pub return_type: Type,
    pub is_static: bool,
    pub kind: MethodKind,
    pub generic_arity: usize,
    pub native: Option<NativeFn>,
}

#[derive(Clone)]
pub struct Method(Arc<MethodDef>);

impl Method {
    pub fn builder(name: &str, declaring_type: Type) -> MethodBuilder {
        MethodBuilder::new(name, declaring_type, MethodKind::Method)
    }

    pub fn constructor(declaring_type: Type) -> MethodBuilder {
        MethodBuilder::new(".ctor", declaring_type, MethodKind::Constructor)
    }

    pub fn ptr_eq(&self, other: &Method) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_constructor(&self) -> bool {
        self.kind == MethodKind::Constructor
    }

    pub fn is_generic_definition(&self) -> bool {
        self.generic_arity > 0
    }

    /// Type of the value produced by calling this member: the declaring type
    /// for constructors.
    pub fn result_type(&self) -> Type {
        match self.kind {
            MethodKind::Constructor => self.declaring_type.clone(),
            MethodKind::Method => self.return_type.clone(),
        }
    }
}

impl Deref for Method {
    type Target = MethodDef;

    fn deref(&self) -> &MethodDef {
        &self.0
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Method {}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static {
            write!(f, "static ")?;
        }
        write!(f, "{}.{}(", self.declaring_type, self.name)?;
        for (i, p) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", p.ty, p.name)?;
        }
        write!(f, ")")?;
        if self.kind == MethodKind::Method {
            write!(f, " -> {}", self.return_type)?;
        }
        Ok(())
    }
}

pub struct MethodBuilder {
    name: String,
    declaring_type: Type,
    parameters: Vec<ParameterInfo>,
    return_type: Type,
    is_static: bool,
    kind: MethodKind,
    generic_arity: usize,
    native: Option<NativeFn>,
}

impl MethodBuilder {
    fn new(name: &str, declaring_type: Type, kind: MethodKind) -> Self {
        MethodBuilder {
            name: name.to_string(),
            declaring_type,
            parameters: Vec::new(),
            return_type: Type::Void,
            is_static: false,
            kind,
            generic_arity: 0,
            native: None,
        }
    }

    pub fn param(self, name: &str, ty: Type) -> Self {
        self.parameter(ParameterInfo::new(name, ty))
    }

    pub fn optional_param(self, name: &str, ty: Type, default: ConstValue) -> Self {
        self.parameter(ParameterInfo::new(name, ty).with_default(default))
    }

    pub fn params_array(self, name: &str, element: Type) -> Self {
        self.parameter(ParameterInfo::new(name, Type::array_of(element)).as_params_array())
    }

    pub fn parameter(mut self, info: ParameterInfo) -> Self {
        let position = self.parameters.len();
        self.parameters.push(info.at(position));
        self
    }

    pub fn returns(mut self, ty: Type) -> Self {
        self.return_type = ty;
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn generic(mut self, arity: usize) -> Self {
        self.generic_arity = arity;
        self
    }

    pub fn native<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<&Value>, &mut [Value]) -> Result<Value, Value> + Send + Sync + 'static,
    {
        self.native = Some(Arc::new(f));
        self
    }

    pub fn build(self) -> Method {
        let return_type = match self.kind {
            MethodKind::Constructor => Type::Void,
            MethodKind::Method => self.return_type,
        };
        Method(Arc::new(MethodDef {
            name: self.name,
            declaring_type: self.declaring_type,
            parameters: self.parameters,
            return_type,
            is_static: self.is_static,
            kind: self.kind,
            generic_arity: self.generic_arity,
            native: self.native,
        }))
    }
}

#[derive(Debug)]
pub struct FieldDef {
    pub name: String,
    pub declaring_type: Type,
    pub ty: Type,
    pub is_static: bool,
    pub is_readonly: bool,
}

#[derive(Debug, Clone)]
pub struct Field(Arc<FieldDef>);

impl Field {
    pub fn new(name: &str, declaring_type: Type, ty: Type) -> Self {
        Field(Arc::new(FieldDef {
            name: name.to_string(),
            declaring_type,
            ty,
            is_static: false,
            is_readonly: false,
        }))
    }

    pub fn readonly(name: &str, declaring_type: Type, ty: Type) -> Self {
        Field(Arc::new(FieldDef {
            name: name.to_string(),
            declaring_type,
            ty,
            is_static: false,
            is_readonly: true,
        }))
    }

    pub fn ptr_eq(&self, other: &Field) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Field {
    type Target = FieldDef;

    fn deref(&self) -> &FieldDef {
        &self.0
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

#[derive(Debug)]
pub struct PropertyDef {
    pub name: String,
    pub declaring_type: Type,
    pub ty: Type,
    pub getter: Option<Method>,
    pub setter: Option<Method>,
}

#[derive(Debug, Clone)]
pub struct Property(Arc<PropertyDef>);

impl Property {
    pub fn new(name: &str, declaring_type: Type, ty: Type, getter: Option<Method>, setter: Option<Method>) -> Self {
        Property(Arc::new(PropertyDef {
            name: name.to_string(),
            declaring_type,
            ty,
            getter,
            setter,
        }))
    }

    /// Instance property backed by a field of the same name in the evaluator.
    pub fn auto(name: &str, declaring_type: Type, ty: Type) -> Self {
        let getter = Method::builder(&format!("get_{}", name), declaring_type.clone())
            .returns(ty.clone())
            .build();
        let setter = Method::builder(&format!("set_{}", name), declaring_type.clone())
            .param("value", ty.clone())
            .build();
        Self::new(name, declaring_type, ty, Some(getter), Some(setter))
    }

    pub fn read_only(name: &str, declaring_type: Type, ty: Type) -> Self {
        let getter = Method::builder(&format!("get_{}", name), declaring_type.clone())
            .returns(ty.clone())
            .build();
        Self::new(name, declaring_type, ty, Some(getter), None)
    }

    /// Indexer (`this[...]`) with the given index parameters. Accessors are
    /// created only for the supplied implementations.
    pub fn indexer(
        declaring_type: Type,
        ty: Type,
        index_params: Vec<ParameterInfo>,
        get: Option<NativeFn>,
        set: Option<NativeFn>,
    ) -> Self {
        let getter = get.map(|native| {
            let mut b = Method::builder("get_Item", declaring_type.clone()).returns(ty.clone());
            for p in index_params.iter() {
                b = b.parameter(p.clone());
            }
            b.native = Some(native);
            b.build()
        });
        let setter = set.map(|native| {
            let mut b = Method::builder("set_Item", declaring_type.clone());
            for p in index_params.iter() {
                b = b.parameter(p.clone());
            }
            b = b.param("value", ty.clone());
            b.native = Some(native);
            b.build()
        });
        Self::new("Item", declaring_type, ty, getter, setter)
    }

    pub fn ptr_eq(&self, other: &Property) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn can_read(&self) -> bool {
        self.getter.is_some()
    }

    pub fn can_write(&self) -> bool {
        self.setter.is_some()
    }

    pub fn is_static(&self) -> bool {
        self.getter
            .as_ref()
            .or(self.setter.as_ref())
            .map(|m| m.is_static)
            .unwrap_or(false)
    }

    /// Index parameters: the getter's parameters, or the setter's minus the
    /// trailing value parameter.
    pub fn index_parameters(&self) -> Vec<ParameterInfo> {
        if let Some(getter) = &self.getter {
            return getter.parameters.clone();
        }
        match &self.setter {
            Some(setter) => {
                let n = setter.parameters.len().saturating_sub(1);
                setter.parameters[..n].to_vec()
            }
            None => Vec::new(),
        }
    }

    pub fn is_indexer(&self) -> bool {
        !self.index_parameters().is_empty()
    }
}

impl Deref for Property {
    type Target = PropertyDef;

    fn deref(&self) -> &PropertyDef {
        &self.0
    }
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Field or property; the target of member access and member initializers.
#[derive(Debug, Clone, PartialEq)]
pub enum Member {
    Field(Field),
    Property(Property),
}

impl Member {
    pub fn name(&self) -> &str {
        match self {
            Member::Field(f) => &f.name,
            Member::Property(p) => &p.name,
        }
    }

    pub fn ty(&self) -> &Type {
        match self {
            Member::Field(f) => &f.ty,
            Member::Property(p) => &p.ty,
        }
    }

    pub fn declaring_type(&self) -> &Type {
        match self {
            Member::Field(f) => &f.declaring_type,
            Member::Property(p) => &p.declaring_type,
        }
    }

    pub fn is_static(&self) -> bool {
        match self {
            Member::Field(f) => f.is_static,
            Member::Property(p) => p.is_static(),
        }
    }

    pub fn can_read(&self) -> bool {
        match self {
            Member::Field(_) => true,
            Member::Property(p) => p.can_read(),
        }
    }

    pub fn can_write(&self) -> bool {
        match self {
            Member::Field(f) => !f.is_readonly,
            Member::Property(p) => p.can_write(),
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.declaring_type(), self.name())
    }
}
