//! file: core/src/ir/verify.rs
//! description: structural checks applied to fully lowered trees.
//!
//! Mirrors what a primitive expression compiler rejects: leftover extension
//! nodes, variables used outside the block or lambda that declares them,
//! labels defined twice and jumps to labels that are never defined.

use std::collections::HashSet;

use log::trace;

use super::expr::{Expr, ExprKind, LabelTarget, Variable};
use super::visit::{Rewriter, walk_expr};
use crate::ast::err::ConstructionError;
use crate::error::{Level, LowerkitErrorExt};

#[derive(Debug, Clone)]
pub struct VerifyError {
    level: Level,
    message: String,
    issuer: String,
}

impl VerifyError {
    pub fn new(message: String, issuer: &str) -> Self {
        VerifyError {
            level: Level::Error,
            message,
            issuer: issuer.to_string(),
        }
    }
}

impl std::fmt::Display for VerifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.issuer)
    }
}

impl std::error::Error for VerifyError {}

impl LowerkitErrorExt for VerifyError {
    fn level(&self) -> Level {
        self.level
    }

    fn message(&self) -> String {
        self.message.clone()
    }

    fn issuer(&self) -> String {
        self.issuer.clone()
    }
}

const ISSUER: &str = "lowerkit.ir.verify.verify";

struct Verifier {
    scopes: Vec<Vec<Variable>>,
    defined: HashSet<LabelTarget>,
    referenced: Vec<LabelTarget>,
}

impl Verifier {
    fn in_scope(&self, v: &Variable) -> bool {
        self.scopes.iter().rev().any(|s| s.contains(v))
    }

    fn walk(&mut self, expr: &Expr) -> Result<(), VerifyError> {
        match expr.kind() {
            ExprKind::Extension(node) => {
                return Err(VerifyError::new(format!("extension node {} was not reduced", node), ISSUER));
            }
            ExprKind::Variable(v) if !self.in_scope(v) => {
                return Err(VerifyError::new(format!("variable {} is used outside its scope", v), ISSUER));
            }
            ExprKind::Label { target, .. } => {
                if !self.defined.insert(target.clone()) {
                    return Err(VerifyError::new(format!("label {} is defined more than once", target), ISSUER));
                }
            }
            ExprKind::Goto { target, .. } => self.referenced.push(target.clone()),
            _ => {}
        }
        let scope = match expr.kind() {
            ExprKind::Block { variables, .. } => Some(variables.clone()),
            ExprKind::Lambda { parameters, .. } => Some(parameters.clone()),
            _ => None,
        };
        let pushed = scope.is_some();
        if let Some(s) = scope {
            self.scopes.push(s);
        }
        for child in expr.children() {
            self.walk(child)?;
        }
        if pushed {
            self.scopes.pop();
        }
        Ok(())
    }
}

/// Check a primitive-only tree. `free` lists the variables the caller binds
/// from outside.
pub fn verify(expr: &Expr, free: &[Variable]) -> Result<(), VerifyError> {
    let mut v = Verifier {
        scopes: vec![free.to_vec()],
        defined: HashSet::new(),
        referenced: Vec::new(),
    };
    v.walk(expr)?;
    if let Some(missing) = v.referenced.iter().find(|t| !v.defined.contains(*t)) {
        return Err(VerifyError::new(format!("jump to undefined label {}", missing), ISSUER));
    }
    trace!("verified tree with {} labels", v.defined.len());
    Ok(())
}

struct FreeVariables {
    scopes: Vec<Vec<Variable>>,
    found: Vec<Variable>,
}

impl Rewriter for FreeVariables {
    type Error = ConstructionError;

    fn visit(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        let scope = match expr.kind() {
            ExprKind::Variable(v) => {
                if !self.scopes.iter().any(|s| s.contains(v)) && !self.found.contains(v) {
                    self.found.push(v.clone());
                }
                None
            }
            ExprKind::Block { variables, .. } => Some(variables.clone()),
            ExprKind::Lambda { parameters, .. } => Some(parameters.clone()),
            _ => None,
        };
        let pushed = scope.is_some();
        if let Some(s) = scope {
            self.scopes.push(s);
        }
        let out = walk_expr(self, expr);
        if pushed {
            self.scopes.pop();
        }
        out
    }
}

/// Variables referenced by `expr`, extension payloads included, that no
/// enclosing block or lambda inside it declares, in first-use order.
pub fn free_variables(expr: &Expr) -> Vec<Variable> {
    let mut collector = FreeVariables { scopes: Vec::new(), found: Vec::new() };
    // an identity walk only fails if a node refuses its own children
    if collector.visit(expr).is_err() {
        trace!("free variable scan stopped early");
    }
    collector.found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::types::Type;

    #[test]
    fn unbound_variable_is_reported() {
        let x = Variable::named("x", Type::I32);
        let err = verify(&x.expr(), &[]).unwrap_err();
        assert!(err.message().contains("outside its scope"));
        assert!(verify(&x.expr(), &[x.clone()]).is_ok());
    }

    #[test]
    fn jump_needs_a_defined_label() {
        let l = LabelTarget::void("end");
        let jump = Expr::goto(l.clone()).unwrap();
        assert!(verify(&jump, &[]).is_err());
        let tree = Expr::block(vec![jump, Expr::label(l, None).unwrap()]).unwrap();
        assert!(verify(&tree, &[]).is_ok());
    }

    #[test]
    fn free_variables_skip_block_locals() {
        let x = Variable::named("x", Type::I32);
        let y = Variable::named("y", Type::I32);
        let tree = Expr::block_with(vec![x.clone()], vec![Expr::assign(x.expr(), y.expr()).unwrap()]).unwrap();
        assert_eq!(free_variables(&tree), vec![y]);
    }
}
