//! file: core/src/ast/stmt.rs
//! description: statement-shaped extended nodes: loops and `lock`.
//!
//! All of them are `void`. Loops may carry caller-supplied break/continue
//! labels so bodies can jump out of or back into them; missing labels are
//! created during lowering.

use std::sync::Arc;

use super::err::{ConstructionErrorKind as Kind, ConstructionResult, fail};
use crate::ir::expr::{Expr, LabelTarget, Variable};
use crate::ir::factory::{check_bool, check_unique_variables};
use crate::ir::types::Type;

static VOID: Type = Type::Void;

fn check_loop_labels(break_label: Option<&LabelTarget>, continue_label: Option<&LabelTarget>, issuer: &str) -> ConstructionResult<()> {
    for label in [break_label, continue_label].into_iter().flatten() {
        if !label.ty().is_void() {
            return fail(Kind::InvalidLabel, issuer, format!("loop label {} must be void, got {}", label, label.ty()));
        }
    }
    if let (Some(b), Some(c)) = (break_label, continue_label) {
        if b == c {
            return fail(Kind::InvalidLabel, issuer, format!("break and continue share label {}", b));
        }
    }
    Ok(())
}

fn same_opt(a: &Option<Expr>, b: &Option<Expr>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x.ptr_eq(y),
        (None, None) => true,
        _ => false,
    }
}

fn same_all(a: &[Expr], b: &[Expr]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.ptr_eq(y))
}

/// `while (test) body`
#[derive(Debug)]
pub struct While {
    test: Expr,
    body: Expr,
    break_label: Option<LabelTarget>,
    continue_label: Option<LabelTarget>,
}

impl While {
    pub fn new(
        test: Expr,
        body: Expr,
        break_label: Option<LabelTarget>,
        continue_label: Option<LabelTarget>,
    ) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.stmt.While::new";
        check_bool(&test, issuer)?;
        check_loop_labels(break_label.as_ref(), continue_label.as_ref(), issuer)?;
        Ok(Arc::new(While { test, body, break_label, continue_label }))
    }

    pub fn test(&self) -> &Expr {
        &self.test
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    pub fn break_label(&self) -> Option<&LabelTarget> {
        self.break_label.as_ref()
    }

    pub fn continue_label(&self) -> Option<&LabelTarget> {
        self.continue_label.as_ref()
    }

    pub fn ty(&self) -> &Type {
        &VOID
    }

    pub fn update(self: &Arc<Self>, test: Expr, body: Expr) -> ConstructionResult<Arc<Self>> {
        if test.ptr_eq(&self.test) && body.ptr_eq(&self.body) {
            return Ok(Arc::clone(self));
        }
        While::new(test, body, self.break_label.clone(), self.continue_label.clone())
    }
}

/// `do body while (test)`
#[derive(Debug)]
pub struct DoWhile {
    body: Expr,
    test: Expr,
    break_label: Option<LabelTarget>,
    continue_label: Option<LabelTarget>,
}

impl DoWhile {
    pub fn new(
        body: Expr,
        test: Expr,
        break_label: Option<LabelTarget>,
        continue_label: Option<LabelTarget>,
    ) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.stmt.DoWhile::new";
        check_bool(&test, issuer)?;
        check_loop_labels(break_label.as_ref(), continue_label.as_ref(), issuer)?;
        Ok(Arc::new(DoWhile { body, test, break_label, continue_label }))
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    pub fn test(&self) -> &Expr {
        &self.test
    }

    pub fn break_label(&self) -> Option<&LabelTarget> {
        self.break_label.as_ref()
    }

    pub fn continue_label(&self) -> Option<&LabelTarget> {
        self.continue_label.as_ref()
    }

    pub fn ty(&self) -> &Type {
        &VOID
    }

    pub fn update(self: &Arc<Self>, body: Expr, test: Expr) -> ConstructionResult<Arc<Self>> {
        if body.ptr_eq(&self.body) && test.ptr_eq(&self.test) {
            return Ok(Arc::clone(self));
        }
        DoWhile::new(body, test, self.break_label.clone(), self.continue_label.clone())
    }
}

/// `for (variables = initializers; test; iterators) body`; a missing test
/// loops until a jump leaves the body.
#[derive(Debug)]
pub struct For {
    variables: Vec<Variable>,
    initializers: Vec<Expr>,
    test: Option<Expr>,
    iterators: Vec<Expr>,
    body: Expr,
    break_label: Option<LabelTarget>,
    continue_label: Option<LabelTarget>,
}

impl For {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        variables: Vec<Variable>,
        initializers: Vec<Expr>,
        test: Option<Expr>,
        iterators: Vec<Expr>,
        body: Expr,
        break_label: Option<LabelTarget>,
        continue_label: Option<LabelTarget>,
    ) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.stmt.For::new";
        check_unique_variables(&variables, issuer)?;
        if let Some(t) = &test {
            check_bool(t, issuer)?;
        }
        check_loop_labels(break_label.as_ref(), continue_label.as_ref(), issuer)?;
        Ok(Arc::new(For { variables, initializers, test, iterators, body, break_label, continue_label }))
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn initializers(&self) -> &[Expr] {
        &self.initializers
    }

    pub fn test(&self) -> Option<&Expr> {
        self.test.as_ref()
    }

    pub fn iterators(&self) -> &[Expr] {
        &self.iterators
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    pub fn break_label(&self) -> Option<&LabelTarget> {
        self.break_label.as_ref()
    }

    pub fn continue_label(&self) -> Option<&LabelTarget> {
        self.continue_label.as_ref()
    }

    pub fn ty(&self) -> &Type {
        &VOID
    }

    pub fn update(
        self: &Arc<Self>,
        initializers: Vec<Expr>,
        test: Option<Expr>,
        iterators: Vec<Expr>,
        body: Expr,
    ) -> ConstructionResult<Arc<Self>> {
        if same_all(&initializers, &self.initializers)
            && same_opt(&test, &self.test)
            && same_all(&iterators, &self.iterators)
            && body.ptr_eq(&self.body)
        {
            return Ok(Arc::clone(self));
        }
        For::new(
            self.variables.clone(),
            initializers,
            test,
            iterators,
            body,
            self.break_label.clone(),
            self.continue_label.clone(),
        )
    }
}

/// `lock (expression) body`
#[derive(Debug)]
pub struct Lock {
    expression: Expr,
    body: Expr,
}

impl Lock {
    pub fn new(expression: Expr, body: Expr) -> ConstructionResult<Arc<Self>> {
        let ty = expression.ty();
        if !ty.is_reference_type() {
            return fail(
                Kind::NotReferenceType,
                "lowerkit.ast.stmt.Lock::new",
                format!("lock needs a reference type, got {}", ty),
            );
        }
        Ok(Arc::new(Lock { expression, body }))
    }

    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    pub fn body(&self) -> &Expr {
        &self.body
    }

    pub fn ty(&self) -> &Type {
        &VOID
    }

    pub fn update(self: &Arc<Self>, expression: Expr, body: Expr) -> ConstructionResult<Arc<Self>> {
        if expression.ptr_eq(&self.expression) && body.ptr_eq(&self.body) {
            return Ok(Arc::clone(self));
        }
        Lock::new(expression, body)
    }
}
