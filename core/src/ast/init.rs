//! file: core/src/ast/init.rs
//! description: member and indexer initializer entries.

use crate::ast::err::{ConstructionErrorKind as Kind, ConstructionResult, fail};
use crate::ir::expr::{ElementInit, Expr};
use crate::ir::factory::coerce_argument;
use crate::ir::meta::{Member, ParameterInfo, Property};

/// `member = expression` inside an object initializer.
#[derive(Debug, Clone)]
pub struct MemberInitializer {
    member: Member,
    expression: Expr,
}

impl MemberInitializer {
    pub fn new(member: Member, expression: Expr) -> ConstructionResult<Self> {
        let issuer = "lowerkit.ast.init.MemberInitializer::new";
        if !member.can_write() {
            return fail(Kind::NotAssignable, issuer, format!("{} is not writable", member));
        }
        let slot = ParameterInfo::new(member.name(), member.ty().clone());
        let expression = coerce_argument(&slot, expression, issuer)?;
        Ok(MemberInitializer { member, expression })
    }

    pub fn member(&self) -> &Member {
        &self.member
    }

    pub fn expression(&self) -> &Expr {
        &self.expression
    }

    pub fn update(&self, expression: Expr) -> ConstructionResult<Self> {
        if expression.ptr_eq(&self.expression) {
            return Ok(self.clone());
        }
        MemberInitializer::new(self.member.clone(), expression)
    }
}

/// `[index...] = value` inside a collection initializer, expressed as an
/// element initializer whose add-member is the indexer setter. The argument
/// list is the index arguments followed by the assigned value.
pub fn indexer_initializer(indexer: &Property, arguments: Vec<Expr>, value: Expr) -> ConstructionResult<ElementInit> {
    let issuer = "lowerkit.ast.init.indexer_initializer";
    let setter = match &indexer.setter {
        Some(setter) => setter,
        None => return fail(Kind::NotAssignable, issuer, format!("indexer on {} has no setter", indexer.declaring_type)),
    };
    if !indexer.is_indexer() {
        return fail(Kind::InvalidMember, issuer, format!("property {} is not an indexer", indexer.name));
    }
    let mut all = arguments;
    all.push(value);
    ElementInit::new(setter, all)
}
