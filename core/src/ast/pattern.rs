//! file: core/src/ast/pattern.rs
//! description: patterns tested by switch arms and sections.
//!
//! A pattern knows its input type and turns an input expression of that
//! type into a boolean test. Designations (`var x`, `T x`) assign their
//! variable as part of the test; the switch that owns the pattern declares
//! the variables in its scope.

use std::sync::Arc;

use super::err::{ConstructionErrorKind as Kind, ConstructionResult, fail};
use crate::ir::expr::{Expr, Variable};
use crate::ir::factory::is_convertible;
use crate::ir::op::BinaryOp;
use crate::ir::types::Type;
use crate::ir::value::ConstValue;

#[derive(Debug)]
pub enum PatternKind {
    Discard,
    Var(Variable),
    Constant { value: ConstValue, ty: Type },
    Type { test_type: Type, designation: Option<Variable> },
    Relational { op: BinaryOp, value: ConstValue, ty: Type },
    Not(Pattern),
    And(Pattern, Pattern),
    Or(Pattern, Pattern),
}

#[derive(Debug)]
struct PatternData {
    input_type: Type,
    kind: PatternKind,
}

#[derive(Debug, Clone)]
pub struct Pattern(Arc<PatternData>);

fn make(input_type: Type, kind: PatternKind) -> Pattern {
    Pattern(Arc::new(PatternData { input_type, kind }))
}

/// Type a literal is compared at when matched against `input`.
fn literal_type(input: &Type, value: &ConstValue, issuer: &str) -> ConstructionResult<Type> {
    let target = input.non_nullable();
    if value.fits(target) && *target != Type::Object {
        return Ok(target.clone());
    }
    if input.is_reference_type() && !value.is_null() {
        let natural = value.natural_type();
        if is_convertible(input, &natural) {
            return Ok(natural);
        }
    }
    fail(Kind::TypeMismatch, issuer, format!("constant {} cannot match input of type {}", value, input))
}

impl Pattern {
    /// `_`
    pub fn discard(input_type: Type) -> Pattern {
        make(input_type, PatternKind::Discard)
    }

    /// `var x`
    pub fn var(variable: Variable) -> Pattern {
        make(variable.ty().clone(), PatternKind::Var(variable))
    }

    /// Constant pattern, including `null`.
    pub fn constant(input_type: Type, value: ConstValue) -> ConstructionResult<Pattern> {
        let issuer = "lowerkit.ast.pattern.Pattern::constant";
        if value.is_null() {
            if !input_type.can_be_null() {
                return fail(Kind::TypeMismatch, issuer, format!("null cannot match input of type {}", input_type));
            }
            let ty = input_type.clone();
            return Ok(make(input_type, PatternKind::Constant { value, ty }));
        }
        let ty = literal_type(&input_type, &value, issuer)?;
        Ok(make(input_type, PatternKind::Constant { value, ty }))
    }

    /// `T` or `T x`.
    pub fn type_test(input_type: Type, test_type: Type, designation: Option<Variable>) -> ConstructionResult<Pattern> {
        let issuer = "lowerkit.ast.pattern.Pattern::type_test";
        if !is_convertible(&input_type, &test_type) {
            return fail(Kind::TypeMismatch, issuer, format!("a {} can never be a {}", input_type, test_type));
        }
        if let Some(d) = &designation {
            if *d.ty() != test_type {
                return fail(Kind::TypeMismatch, issuer, format!("designation {} must have type {}", d, test_type));
            }
        }
        Ok(make(input_type, PatternKind::Type { test_type, designation }))
    }

    /// `< c`, `<= c`, `> c`, `>= c`.
    pub fn relational(input_type: Type, op: BinaryOp, value: ConstValue) -> ConstructionResult<Pattern> {
        let issuer = "lowerkit.ast.pattern.Pattern::relational";
        if !op.is_relational() {
            return fail(Kind::InvalidArgument, issuer, format!("{} is not a relational operator", op));
        }
        if value.is_null() {
            return fail(Kind::InvalidArgument, issuer, "relational pattern against null");
        }
        let ty = literal_type(&input_type, &value, issuer)?;
        if !(ty.is_arithmetic() || ty == Type::Char) {
            return fail(Kind::TypeMismatch, issuer, format!("{} values are not ordered", ty));
        }
        Ok(make(input_type, PatternKind::Relational { op, value, ty }))
    }

    pub fn not(pattern: Pattern) -> Pattern {
        let input = pattern.input_type().clone();
        make(input, PatternKind::Not(pattern))
    }

    pub fn and(left: Pattern, right: Pattern) -> ConstructionResult<Pattern> {
        Self::combine(left, right, true)
    }

    pub fn or(left: Pattern, right: Pattern) -> ConstructionResult<Pattern> {
        Self::combine(left, right, false)
    }

    fn combine(left: Pattern, right: Pattern, conjunction: bool) -> ConstructionResult<Pattern> {
        if left.input_type() != right.input_type() {
            return fail(
                Kind::InconsistentTypes,
                "lowerkit.ast.pattern.Pattern::combine",
                format!("combined patterns take {} and {}", left.input_type(), right.input_type()),
            );
        }
        let input = left.input_type().clone();
        let kind = if conjunction { PatternKind::And(left, right) } else { PatternKind::Or(left, right) };
        Ok(make(input, kind))
    }

    pub fn input_type(&self) -> &Type {
        &self.0.input_type
    }

    pub fn kind(&self) -> &PatternKind {
        &self.0.kind
    }

    /// Matches every input without observable effects.
    pub fn is_always_true(&self) -> bool {
        matches!(self.kind(), PatternKind::Discard)
    }

    /// Variables designated anywhere in the pattern, in order of appearance.
    pub fn variables(&self) -> Vec<Variable> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<Variable>) {
        match self.kind() {
            PatternKind::Var(v) => out.push(v.clone()),
            PatternKind::Type { designation: Some(v), .. } => out.push(v.clone()),
            PatternKind::Not(p) => p.collect_variables(out),
            PatternKind::And(a, b) | PatternKind::Or(a, b) => {
                a.collect_variables(out);
                b.collect_variables(out);
            }
            _ => {}
        }
    }

    /// Boolean test of `input` (which must have the pattern's input type).
    pub fn reduce(&self, input: &Expr) -> ConstructionResult<Expr> {
        let issuer = "lowerkit.ast.pattern.Pattern::reduce";
        if input.ty() != *self.input_type() {
            return fail(
                Kind::TypeMismatch,
                issuer,
                format!("pattern over {} applied to {}", self.input_type(), input.ty()),
            );
        }
        match self.kind() {
            PatternKind::Discard => Ok(Expr::boolean(true)),
            PatternKind::Var(v) => Expr::block(vec![Expr::assign(v.expr(), input.clone())?, Expr::boolean(true)]),
            PatternKind::Constant { value: ConstValue::Null, .. } => Expr::is_null(input.clone()),
            PatternKind::Constant { value, ty } => self.compare(BinaryOp::Eq, input, value, ty),
            PatternKind::Relational { op, value, ty } => self.compare(*op, input, value, ty),
            PatternKind::Type { test_type, designation } => {
                let test = if input.ty() == *test_type && !test_type.can_be_null() {
                    Expr::boolean(true)
                } else {
                    Expr::type_is(input.clone(), test_type.clone())
                };
                match designation {
                    None => Ok(test),
                    Some(d) => {
                        let bind = Expr::block(vec![
                            Expr::assign(d.expr(), Expr::convert_if_needed(input.clone(), test_type)?)?,
                            Expr::boolean(true),
                        ])?;
                        if test.is_true_constant() { Ok(bind) } else { Expr::and_also(test, bind) }
                    }
                }
            }
            PatternKind::Not(p) => Expr::not(p.reduce(input)?),
            PatternKind::And(a, b) => Expr::and_also(a.reduce(input)?, b.reduce(input)?),
            PatternKind::Or(a, b) => Expr::or_else(a.reduce(input)?, b.reduce(input)?),
        }
    }

    fn compare(&self, op: BinaryOp, input: &Expr, value: &ConstValue, ty: &Type) -> ConstructionResult<Expr> {
        let input_ty = input.ty();
        if input_ty == *ty || input_ty.non_nullable() == ty {
            let literal = Expr::constant(value.clone(), input_ty)?;
            return Expr::binary(op, input.clone(), literal);
        }
        // reference input: type test, then compare the unboxed value
        let is_type = Expr::type_is(input.clone(), ty.clone());
        let unboxed = Expr::convert(input.clone(), ty.clone())?;
        let cmp = Expr::binary(op, unboxed, Expr::constant(value.clone(), ty.clone())?)?;
        Expr::and_also(is_type, cmp)
    }
}
