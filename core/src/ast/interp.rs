//! file: core/src/ast/interp.rs
//! description: interpolated strings (`$"{a,5:F2} and {b}"`).

use std::sync::Arc;

use super::err::{ConstructionErrorKind as Kind, ConstructionResult, fail};
use crate::ir::expr::Expr;
use crate::ir::types::Type;

static STRING: Type = Type::String;

/// One piece of an interpolated string.
#[derive(Debug, Clone)]
pub enum Interpolation {
    Literal(String),
    Insert { value: Expr, alignment: Option<i32>, format: Option<String> },
}

impl Interpolation {
    pub fn literal(text: &str) -> Self {
        Interpolation::Literal(text.to_string())
    }

    pub fn insert(value: Expr, alignment: Option<i32>, format: Option<&str>) -> ConstructionResult<Self> {
        let issuer = "lowerkit.ast.interp.Interpolation::insert";
        if value.ty().is_void() {
            return fail(Kind::TypeMismatch, issuer, "cannot interpolate a void expression");
        }
        if format == Some("") {
            return fail(Kind::InvalidArgument, issuer, "format specifier must not be empty");
        }
        Ok(Interpolation::Insert { value, alignment, format: format.map(str::to_string) })
    }

    pub fn value(&self) -> Option<&Expr> {
        match self {
            Interpolation::Insert { value, .. } => Some(value),
            Interpolation::Literal(_) => None,
        }
    }

    /// Same piece with a new insert value; literals are returned unchanged.
    pub fn update(&self, new_value: Expr) -> Self {
        match self {
            Interpolation::Insert { value, alignment, format } if !value.ptr_eq(&new_value) => {
                Interpolation::Insert { value: new_value, alignment: *alignment, format: format.clone() }
            }
            _ => self.clone(),
        }
    }
}

#[derive(Debug)]
pub struct InterpolatedString {
    parts: Vec<Interpolation>,
}

impl InterpolatedString {
    pub fn new(parts: Vec<Interpolation>) -> ConstructionResult<Arc<Self>> {
        Ok(Arc::new(InterpolatedString { parts }))
    }

    pub fn parts(&self) -> &[Interpolation] {
        &self.parts
    }

    pub fn ty(&self) -> &Type {
        &STRING
    }

    pub fn update(self: &Arc<Self>, parts: Vec<Interpolation>) -> ConstructionResult<Arc<Self>> {
        let same = parts.len() == self.parts.len()
            && parts.iter().zip(&self.parts).all(|(a, b)| match (a.value(), b.value()) {
                (Some(x), Some(y)) => x.ptr_eq(y),
                (None, None) => true,
                _ => false,
            });
        if same {
            return Ok(Arc::clone(self));
        }
        InterpolatedString::new(parts)
    }
}
