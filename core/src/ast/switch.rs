//! file: core/src/ast/switch.rs
//! description: switch expression, pattern switch statement and the classic
//! literal-case switch.

use std::sync::Arc;

use super::err::{ConstructionErrorKind as Kind, ConstructionResult, fail};
use super::pattern::Pattern;
use crate::ir::expr::{Expr, LabelTarget, Variable};
use crate::ir::factory::{check_bool, check_unique_variables, is_assignable};
use crate::ir::types::Type;
use crate::ir::value::ConstValue;

static VOID: Type = Type::Void;

/// Whether a pattern over `input` can be applied to a subject of type
/// `subject` (identity, reference widening, boxing or nullable wrapping).
pub(crate) fn pattern_accepts(input: &Type, subject: &Type) -> bool {
    is_assignable(input, subject)
        || (*input == Type::Object && !subject.is_void())
        || (subject.is_value_type() && !subject.is_nullable_type() && *input == subject.to_nullable())
}

fn check_subject(pattern: &Pattern, subject: &Type, issuer: &str) -> ConstructionResult<()> {
    if pattern_accepts(pattern.input_type(), subject) {
        Ok(())
    } else {
        fail(
            Kind::TypeMismatch,
            issuer,
            format!("pattern over {} cannot test a subject of type {}", pattern.input_type(), subject),
        )
    }
}

fn check_guard(guard: Option<&Expr>, issuer: &str) -> ConstructionResult<()> {
    match guard {
        Some(g) => check_bool(g, issuer),
        None => Ok(()),
    }
}

fn check_break_label(label: Option<&LabelTarget>, issuer: &str) -> ConstructionResult<()> {
    match label {
        Some(l) if !l.ty().is_void() => fail(Kind::InvalidLabel, issuer, format!("break label {} must be void", l)),
        _ => Ok(()),
    }
}

fn same_opt(a: Option<&Expr>, b: Option<&Expr>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x.ptr_eq(y),
        (None, None) => true,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// switch expression
// ---------------------------------------------------------------------------

/// `pattern when guard => value`
#[derive(Debug, Clone)]
pub struct SwitchExpressionArm {
    pattern: Pattern,
    guard: Option<Expr>,
    value: Expr,
}

impl SwitchExpressionArm {
    pub fn new(pattern: Pattern, guard: Option<Expr>, value: Expr) -> ConstructionResult<Self> {
        check_guard(guard.as_ref(), "lowerkit.ast.switch.SwitchExpressionArm::new")?;
        Ok(SwitchExpressionArm { pattern, guard, value })
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn guard(&self) -> Option<&Expr> {
        self.guard.as_ref()
    }

    pub fn value(&self) -> &Expr {
        &self.value
    }

    fn is_same(&self, other: &SwitchExpressionArm) -> bool {
        same_opt(self.guard(), other.guard()) && self.value.ptr_eq(&other.value)
    }

    pub fn update(&self, guard: Option<Expr>, value: Expr) -> ConstructionResult<Self> {
        if same_opt(guard.as_ref(), self.guard()) && value.ptr_eq(&self.value) {
            return Ok(self.clone());
        }
        SwitchExpressionArm::new(self.pattern.clone(), guard, value)
    }
}

#[derive(Debug)]
pub struct SwitchExpression {
    subject: Expr,
    arms: Vec<SwitchExpressionArm>,
    explicit_type: Option<Type>,
    ty: Type,
}

impl SwitchExpression {
    /// Without `ty` every arm value must have the same type, which becomes the
    /// result type; with `ty` every arm value must be assignable to it.
    pub fn new(subject: Expr, arms: Vec<SwitchExpressionArm>, ty: Option<Type>) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.switch.SwitchExpression::new";
        if arms.is_empty() {
            return fail(Kind::ArgumentCount, issuer, "switch expression needs at least one arm");
        }
        let subject_ty = subject.ty();
        for arm in &arms {
            check_subject(arm.pattern(), &subject_ty, issuer)?;
        }
        let result = match &ty {
            Some(t) => {
                if let Some(bad) = arms.iter().find(|a| !is_assignable(t, &a.value().ty())) {
                    return fail(
                        Kind::TypeMismatch,
                        issuer,
                        format!("arm value of type {} is not assignable to {}", bad.value().ty(), t),
                    );
                }
                t.clone()
            }
            None => {
                let first = arms[0].value().ty();
                if let Some(bad) = arms.iter().find(|a| a.value().ty() != first) {
                    return fail(
                        Kind::InconsistentTypes,
                        issuer,
                        format!("arm values have types {} and {}", first, bad.value().ty()),
                    );
                }
                first
            }
        };
        Ok(Arc::new(SwitchExpression { subject, arms, explicit_type: ty, ty: result }))
    }

    pub fn subject(&self) -> &Expr {
        &self.subject
    }

    pub fn arms(&self) -> &[SwitchExpressionArm] {
        &self.arms
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Variables designated by the arm patterns, in arm order.
    pub fn variables(&self) -> Vec<Variable> {
        self.arms.iter().flat_map(|a| a.pattern().variables()).collect()
    }

    pub fn update(self: &Arc<Self>, subject: Expr, arms: Vec<SwitchExpressionArm>) -> ConstructionResult<Arc<Self>> {
        let same_arms = arms.len() == self.arms.len() && arms.iter().zip(&self.arms).all(|(a, b)| a.is_same(b));
        if subject.ptr_eq(&self.subject) && same_arms {
            return Ok(Arc::clone(self));
        }
        SwitchExpression::new(subject, arms, self.explicit_type.clone())
    }
}

// ---------------------------------------------------------------------------
// pattern switch statement
// ---------------------------------------------------------------------------

/// `case pattern when guard:` or `default:`
#[derive(Debug, Clone)]
pub struct SwitchLabel {
    pattern: Option<Pattern>,
    guard: Option<Expr>,
}

impl SwitchLabel {
    pub fn new(pattern: Pattern, guard: Option<Expr>) -> ConstructionResult<Self> {
        check_guard(guard.as_ref(), "lowerkit.ast.switch.SwitchLabel::new")?;
        Ok(SwitchLabel { pattern: Some(pattern), guard })
    }

    pub fn default_label() -> Self {
        SwitchLabel { pattern: None, guard: None }
    }

    pub fn pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    pub fn guard(&self) -> Option<&Expr> {
        self.guard.as_ref()
    }

    pub fn is_default(&self) -> bool {
        self.pattern.is_none()
    }

    pub fn update(&self, guard: Option<Expr>) -> ConstructionResult<Self> {
        if same_opt(guard.as_ref(), self.guard()) {
            return Ok(self.clone());
        }
        match &self.pattern {
            Some(p) => SwitchLabel::new(p.clone(), guard),
            None => Ok(SwitchLabel::default_label()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwitchSection {
    labels: Vec<SwitchLabel>,
    variables: Vec<Variable>,
    body: Expr,
}

impl SwitchSection {
    pub fn new(labels: Vec<SwitchLabel>, variables: Vec<Variable>, body: Expr) -> ConstructionResult<Self> {
        let issuer = "lowerkit.ast.switch.SwitchSection::new";
        if labels.is_empty() {
            return fail(Kind::ArgumentCount, issuer, "switch section needs at least one label");
        }
        let mut inputs = labels.iter().filter_map(SwitchLabel::pattern).map(Pattern::input_type);
        if let Some(first) = inputs.next() {
            if let Some(other) = inputs.find(|t| *t != first) {
                return fail(
                    Kind::InconsistentTypes,
                    issuer,
                    format!("labels of one section test {} and {}", first, other),
                );
            }
        }
        check_unique_variables(&variables, issuer)?;
        Ok(SwitchSection { labels, variables, body })
    }

    pub fn labels(&self) -> &[SwitchLabel] {
        &self.labels
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    pub fn has_default(&self) -> bool {
        self.labels.iter().any(SwitchLabel::is_default)
    }

    fn is_same(&self, other: &SwitchSection) -> bool {
        self.body.ptr_eq(&other.body)
            && self.labels.len() == other.labels.len()
            && self.labels.iter().zip(&other.labels).all(|(a, b)| same_opt(a.guard(), b.guard()))
    }

    pub fn update(&self, labels: Vec<SwitchLabel>, body: Expr) -> ConstructionResult<Self> {
        let candidate = SwitchSection { labels, variables: self.variables.clone(), body };
        if candidate.is_same(self) {
            return Ok(self.clone());
        }
        SwitchSection::new(candidate.labels, candidate.variables, candidate.body)
    }
}

#[derive(Debug)]
pub struct SwitchStatement {
    subject: Expr,
    sections: Vec<SwitchSection>,
    break_label: Option<LabelTarget>,
}

impl SwitchStatement {
    pub fn new(subject: Expr, sections: Vec<SwitchSection>, break_label: Option<LabelTarget>) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.switch.SwitchStatement::new";
        check_break_label(break_label.as_ref(), issuer)?;
        let subject_ty = subject.ty();
        for label in sections.iter().flat_map(|s| s.labels()) {
            if let Some(p) = label.pattern() {
                check_subject(p, &subject_ty, issuer)?;
            }
        }
        if sections.iter().flat_map(|s| s.labels()).filter(|l| l.is_default()).count() > 1 {
            return fail(Kind::DuplicateDefault, issuer, "switch statement has more than one default label");
        }
        Ok(Arc::new(SwitchStatement { subject, sections, break_label }))
    }

    pub fn subject(&self) -> &Expr {
        &self.subject
    }

    pub fn sections(&self) -> &[SwitchSection] {
        &self.sections
    }

    pub fn break_label(&self) -> Option<&LabelTarget> {
        self.break_label.as_ref()
    }

    pub fn ty(&self) -> &Type {
        &VOID
    }

    pub fn update(self: &Arc<Self>, subject: Expr, sections: Vec<SwitchSection>) -> ConstructionResult<Arc<Self>> {
        let same_sections =
            sections.len() == self.sections.len() && sections.iter().zip(&self.sections).all(|(a, b)| a.is_same(b));
        if subject.ptr_eq(&self.subject) && same_sections {
            return Ok(Arc::clone(self));
        }
        SwitchStatement::new(subject, sections, self.break_label.clone())
    }
}

// ---------------------------------------------------------------------------
// literal-case switch
// ---------------------------------------------------------------------------

/// A `case` test value; `Default` stands for the `default:` label.
#[derive(Debug, Clone, PartialEq)]
pub enum TestValue {
    Default,
    Literal(ConstValue),
}

#[derive(Debug, Clone)]
pub struct SwitchCase {
    test_values: Vec<TestValue>,
    body: Expr,
}

impl SwitchCase {
    pub fn new(test_values: Vec<TestValue>, body: Expr) -> ConstructionResult<Self> {
        let issuer = "lowerkit.ast.switch.SwitchCase::new";
        if test_values.is_empty() {
            return fail(Kind::ArgumentCount, issuer, "switch case needs at least one test value");
        }
        let mut category = None;
        for (i, tv) in test_values.iter().enumerate() {
            if test_values[..i].contains(tv) {
                let kind = if *tv == TestValue::Default { Kind::DuplicateDefault } else { Kind::DuplicateTestValue };
                return fail(kind, issuer, format!("test value {} appears twice in one case", tv));
            }
            if let TestValue::Literal(v) = tv {
                match (category, v.category()) {
                    (Some(c), Some(n)) if c != n => {
                        return fail(Kind::InconsistentTypes, issuer, format!("case mixes {} and {} test values", c, n));
                    }
                    (None, Some(n)) => category = Some(n),
                    _ => {}
                }
            }
        }
        Ok(SwitchCase { test_values, body })
    }

    pub fn test_values(&self) -> &[TestValue] {
        &self.test_values
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    pub fn is_default(&self) -> bool {
        self.test_values.contains(&TestValue::Default)
    }

    pub fn update(&self, body: Expr) -> ConstructionResult<Self> {
        if body.ptr_eq(&self.body) {
            return Ok(self.clone());
        }
        Ok(SwitchCase { test_values: self.test_values.clone(), body })
    }
}

impl std::fmt::Display for TestValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestValue::Default => write!(f, "default"),
            TestValue::Literal(v) => write!(f, "{}", v),
        }
    }
}

fn is_switchable(ty: &Type) -> bool {
    let inner = ty.non_nullable();
    inner.is_integral() || inner.is_bool() || *inner == Type::Char || *inner == Type::String
}

#[derive(Debug)]
pub struct CaseSwitch {
    subject: Expr,
    cases: Vec<SwitchCase>,
    break_label: Option<LabelTarget>,
}

impl CaseSwitch {
    pub fn new(subject: Expr, cases: Vec<SwitchCase>, break_label: Option<LabelTarget>) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.switch.CaseSwitch::new";
        check_break_label(break_label.as_ref(), issuer)?;
        let subject_ty = subject.ty();
        if !is_switchable(&subject_ty) {
            return fail(Kind::TypeMismatch, issuer, format!("cannot switch on a value of type {}", subject_ty));
        }
        let mut seen: Vec<&ConstValue> = Vec::new();
        let mut defaults = 0;
        for tv in cases.iter().flat_map(|c| c.test_values()) {
            match tv {
                TestValue::Default => defaults += 1,
                TestValue::Literal(v) => {
                    if !v.fits(&subject_ty) {
                        return fail(
                            Kind::TypeMismatch,
                            issuer,
                            format!("test value {} does not fit subject type {}", v, subject_ty),
                        );
                    }
                    if seen.iter().any(|s| s.same_as(v)) {
                        return fail(Kind::DuplicateTestValue, issuer, format!("duplicate test value {}", v));
                    }
                    seen.push(v);
                }
            }
        }
        if defaults > 1 {
            return fail(Kind::DuplicateDefault, issuer, "switch has more than one default case");
        }
        Ok(Arc::new(CaseSwitch { subject, cases, break_label }))
    }

    pub fn subject(&self) -> &Expr {
        &self.subject
    }

    pub fn cases(&self) -> &[SwitchCase] {
        &self.cases
    }

    pub fn break_label(&self) -> Option<&LabelTarget> {
        self.break_label.as_ref()
    }

    pub fn ty(&self) -> &Type {
        &VOID
    }

    pub fn update(self: &Arc<Self>, subject: Expr, cases: Vec<SwitchCase>) -> ConstructionResult<Arc<Self>> {
        let same_cases =
            cases.len() == self.cases.len() && cases.iter().zip(&self.cases).all(|(a, b)| a.body.ptr_eq(&b.body));
        if subject.ptr_eq(&self.subject) && same_cases {
            return Ok(Arc::clone(self));
        }
        CaseSwitch::new(subject, cases, self.break_label.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_across_cases_is_rejected() {
        let subject = Expr::int32(3);
        let a = SwitchCase::new(vec![TestValue::Literal(ConstValue::Int(1))], Expr::empty()).unwrap();
        let b = SwitchCase::new(
            vec![TestValue::Literal(ConstValue::Int(2)), TestValue::Literal(ConstValue::Int(1))],
            Expr::empty(),
        )
        .unwrap();
        let err = CaseSwitch::new(subject, vec![a, b], None).unwrap_err();
        assert_eq!(err.kind(), Kind::DuplicateTestValue);
    }

    #[test]
    fn second_default_is_rejected() {
        let a = SwitchCase::new(vec![TestValue::Default], Expr::empty()).unwrap();
        let b = SwitchCase::new(vec![TestValue::Default], Expr::empty()).unwrap();
        let err = CaseSwitch::new(Expr::int32(0), vec![a, b], None).unwrap_err();
        assert_eq!(err.kind(), Kind::DuplicateDefault);
    }

    #[test]
    fn mixed_categories_in_one_case_are_rejected() {
        let err = SwitchCase::new(
            vec![TestValue::Literal(ConstValue::Int(1)), TestValue::Literal(ConstValue::Str("a".into()))],
            Expr::empty(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), Kind::InconsistentTypes);
    }

    #[test]
    fn arm_values_must_agree_without_explicit_type() {
        let arms = vec![
            SwitchExpressionArm::new(Pattern::discard(Type::I32), None, Expr::int32(1)).unwrap(),
            SwitchExpressionArm::new(Pattern::discard(Type::I32), None, Expr::string("x")).unwrap(),
        ];
        let err = SwitchExpression::new(Expr::int32(0), arms, None).unwrap_err();
        assert_eq!(err.kind(), Kind::InconsistentTypes);
    }

    #[test]
    fn boxing_pattern_accepts_value_subject() {
        assert!(pattern_accepts(&Type::Object, &Type::I32));
        assert!(pattern_accepts(&Type::nullable_of(Type::I32), &Type::I32));
        assert!(!pattern_accepts(&Type::String, &Type::I32));
    }
}
