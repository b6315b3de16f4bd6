//! file: core/src/ast/args.rs
//! description: parameter assignments and the argument binder.
//!
//! Call-like nodes keep their arguments in the order the source supplied
//! them. `bind` checks them against the member's parameter list and
//! produces a declaration-ordered slot list; the lowering side turns that
//! into call arguments, spilling to temporaries when the two orders differ.

use log::trace;

use crate::ast::err::{ConstructionErrorKind as Kind, ConstructionResult, fail};
use crate::ast::kind::Node;
use crate::ir::expr::Expr;
use crate::ir::factory::coerce_argument;
use crate::ir::meta::ParameterInfo;
use crate::ir::types::Type;
use crate::ir::value::ConstValue;

/// `parameter: expression`.
#[derive(Debug, Clone)]
pub struct ParameterAssignment {
    parameter: ParameterInfo,
    expression: Expr,
}

impl ParameterAssignment {
    pub fn new(parameter: &ParameterInfo, expression: Expr) -> ConstructionResult<Self> {
        let issuer = "lowerkit.ast.args.ParameterAssignment::new";
        if let Type::ByRef(inner) = &parameter.ty {
            if let Some(Node::Discard(d)) = expression.as_node() {
                if d.ty() != inner.as_ref() {
                    return fail(
                        Kind::TypeMismatch,
                        issuer,
                        format!("discard of type {} passed to ref {} '{}'", d.ty(), inner, parameter.name),
                    );
                }
                return Ok(ParameterAssignment { parameter: parameter.clone(), expression });
            }
        }
        let expression = coerce_argument(parameter, expression, issuer)?;
        Ok(ParameterAssignment { parameter: parameter.clone(), expression })
    }

    /// Assignment to the parameter called `name`.
    pub fn named(parameters: &[ParameterInfo], name: &str, expression: Expr) -> ConstructionResult<Self> {
        match parameters.iter().find(|p| p.name == name) {
            Some(p) => ParameterAssignment::new(p, expression),
            None => fail(
                Kind::InvalidArgument,
                "lowerkit.ast.args.ParameterAssignment::named",
                format!("no parameter named '{}'", name),
            ),
        }
    }

    /// Positional arguments. Surplus values for a trailing params-array
    /// parameter are collected into a new array.
    pub fn positional(parameters: &[ParameterInfo], mut values: Vec<Expr>) -> ConstructionResult<Vec<Self>> {
        let issuer = "lowerkit.ast.args.ParameterAssignment::positional";
        if let Some(last) = parameters.last() {
            let slot = parameters.len() - 1;
            let already_array = values.len() == parameters.len() && values[slot].ty() == last.ty;
            if last.is_params_array && values.len() >= parameters.len() && !already_array {
                let element = last.ty.element_type().cloned().unwrap_or(Type::Object);
                let tail = values.split_off(slot);
                values.push(Expr::new_array(element, tail)?);
            }
        }
        if values.len() > parameters.len() {
            return fail(
                Kind::ArgumentCount,
                issuer,
                format!("{} arguments supplied for {} parameters", values.len(), parameters.len()),
            );
        }
        parameters
            .iter()
            .zip(values)
            .map(|(p, v)| ParameterAssignment::new(p, v))
            .collect()
    }

    pub fn parameter(&self) -> &ParameterInfo {
        &self.parameter
    }

    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    pub fn update(&self, expression: Expr) -> ConstructionResult<Self> {
        if expression.ptr_eq(&self.expression) {
            return Ok(self.clone());
        }
        ParameterAssignment::new(&self.parameter, expression)
    }
}

/// One declared parameter after binding.
#[derive(Debug, Clone)]
pub enum Slot {
    /// Index into the supplied assignments.
    Supplied(usize),
    /// Missing optional parameter.
    Default(ConstValue, Type),
    /// Missing params-array parameter.
    EmptyParams(Type),
}

/// Match supplied assignments to `parameters`: exactly one per parameter,
/// missing ones must be optional or a params array.
pub fn bind(parameters: &[ParameterInfo], arguments: &[ParameterAssignment], issuer: &str) -> ConstructionResult<Vec<Slot>> {
    let mut slots: Vec<Option<Slot>> = vec![None; parameters.len()];
    for (i, arg) in arguments.iter().enumerate() {
        let pos = arg.parameter.position;
        match parameters.get(pos) {
            Some(p) if p.name == arg.parameter.name && p.ty == arg.parameter.ty => {}
            _ => {
                return fail(
                    Kind::InvalidArgument,
                    issuer,
                    format!("parameter '{}' is not declared by this member", arg.parameter.name),
                );
            }
        }
        if slots[pos].is_some() {
            return fail(
                Kind::DuplicateParameter,
                issuer,
                format!("parameter '{}' assigned more than once", arg.parameter.name),
            );
        }
        slots[pos] = Some(Slot::Supplied(i));
    }
    parameters
        .iter()
        .zip(slots)
        .map(|(p, slot)| match slot {
            Some(s) => Ok(s),
            None if p.is_params_array => Ok(Slot::EmptyParams(p.ty.element_type().cloned().unwrap_or(Type::Object))),
            None if p.is_optional => {
                let value = p.default_value.clone().unwrap_or(ConstValue::Null);
                Ok(Slot::Default(value, p.value_type().clone()))
            }
            None => fail(Kind::MissingParameter, issuer, format!("required parameter '{}' was not supplied", p.name)),
        })
        .collect()
}

/// True when the supplied order already matches declaration order.
pub fn in_declaration_order(arguments: &[ParameterAssignment]) -> bool {
    let ordered = arguments
        .windows(2)
        .all(|w| w[0].parameter.position < w[1].parameter.position);
    trace!("argument order check over {} assignments: {}", arguments.len(), ordered);
    ordered
}

/// Expression for a parameter the caller left out.
pub fn missing_argument(slot: &Slot) -> ConstructionResult<Option<Expr>> {
    match slot {
        Slot::Supplied(_) => Ok(None),
        Slot::Default(ConstValue::Null, ty) if !ty.can_be_null() => Ok(Some(Expr::default(ty.clone()))),
        Slot::Default(value, ty) => Expr::constant(value.clone(), ty.clone()).map(Some),
        Slot::EmptyParams(element) => Expr::new_array(element.clone(), Vec::new()).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::meta::Method;

    fn method() -> Method {
        Method::builder("M", Type::class("C"))
            .static_method()
            .param("a", Type::I32)
            .optional_param("b", Type::I32, ConstValue::Int(5))
            .params_array("rest", Type::I32)
            .build()
    }

    #[test]
    fn missing_optional_and_params_are_filled() {
        let m = method();
        let a = ParameterAssignment::named(&m.parameters, "a", Expr::int32(1)).unwrap();
        let slots = bind(&m.parameters, &[a], "test").unwrap();
        assert!(matches!(slots[0], Slot::Supplied(0)));
        assert!(matches!(slots[1], Slot::Default(ConstValue::Int(5), Type::I32)));
        assert!(matches!(slots[2], Slot::EmptyParams(Type::I32)));
    }

    #[test]
    fn duplicate_and_missing_parameters_fail() {
        let m = method();
        let a1 = ParameterAssignment::named(&m.parameters, "a", Expr::int32(1)).unwrap();
        let a2 = ParameterAssignment::named(&m.parameters, "a", Expr::int32(2)).unwrap();
        let err = bind(&m.parameters, &[a1, a2], "test").unwrap_err();
        assert_eq!(err.kind(), Kind::DuplicateParameter);
        let b = ParameterAssignment::named(&m.parameters, "b", Expr::int32(2)).unwrap();
        let err = bind(&m.parameters, &[b], "test").unwrap_err();
        assert_eq!(err.kind(), Kind::MissingParameter);
    }

    #[test]
    fn positional_packs_surplus_into_params_array() {
        let m = method();
        let args = ParameterAssignment::positional(
            &m.parameters,
            vec![Expr::int32(1), Expr::int32(2), Expr::int32(3), Expr::int32(4)],
        )
        .unwrap();
        assert_eq!(args.len(), 3);
        assert_eq!(args[2].expression().ty(), Type::array_of(Type::I32));
    }
}
