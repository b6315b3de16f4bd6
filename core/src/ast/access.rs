//! file: core/src/ast/access.rs
//! description: null-propagating access (`a?.b`, `a?.M()`, `a?[i]`).
//!
//! The access on the non-null path is built over a `ConditionalReceiver`
//! placeholder. Lowering evaluates the receiver once and substitutes the
//! placeholder; the placeholder itself never reduces.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::err::{ConstructionErrorKind as Kind, ConstructionResult, fail};
use super::kind::Node;
use crate::ir::expr::{Expr, ExprKind};
use crate::ir::meta::{Member, Method, Property};
use crate::ir::types::Type;

/// Stand-in for the already evaluated, non-null receiver of one
/// conditional access.
#[derive(Debug)]
pub struct ConditionalReceiver {
    id: usize,
    ty: Type,
}

impl ConditionalReceiver {
    pub fn new(ty: Type) -> Arc<Self> {
        static COUNTER: AtomicUsize = AtomicUsize::new(1);
        Arc::new(ConditionalReceiver { id: COUNTER.fetch_add(1, Ordering::Relaxed), ty })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Expression referring to this placeholder.
    pub fn expr(self: &Arc<Self>) -> Expr {
        Expr::extension(Node::ConditionalReceiver(Arc::clone(self)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalAccessKind {
    Member,
    Call,
    Invoke,
    Index,
    ArrayIndex,
}

#[derive(Debug)]
pub struct ConditionalAccess {
    kind: ConditionalAccessKind,
    receiver: Expr,
    placeholder: Arc<ConditionalReceiver>,
    when_not_null: Expr,
    ty: Type,
}

impl ConditionalAccess {
    /// General form: `when_not_null` is an access chain rooted at
    /// `placeholder`.
    pub fn new(receiver: Expr, placeholder: Arc<ConditionalReceiver>, when_not_null: Expr) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.access.ConditionalAccess::new";
        let rt = receiver.ty();
        if !rt.can_be_null() {
            return fail(Kind::NotReferenceType, issuer, format!("receiver of ?. must be a reference or nullable type, got {}", rt));
        }
        if placeholder.ty() != rt.non_nullable() {
            return fail(
                Kind::TypeMismatch,
                issuer,
                format!("placeholder of type {} does not match receiver {}", placeholder.ty(), rt),
            );
        }
        let kind = match when_not_null.kind() {
            ExprKind::Member { .. } => ConditionalAccessKind::Member,
            ExprKind::Call { .. } => ConditionalAccessKind::Call,
            ExprKind::Invoke { .. } => ConditionalAccessKind::Invoke,
            ExprKind::Index { .. } => ConditionalAccessKind::Index,
            ExprKind::ArrayIndex { .. } => ConditionalAccessKind::ArrayIndex,
            _ => {
                return fail(
                    Kind::InvalidArgument,
                    issuer,
                    format!("{} is not a member, call, invocation or element access", when_not_null.kind_name()),
                );
            }
        };
        let inner = when_not_null.ty();
        let ty = if inner.is_void() { Type::Void } else { inner.to_nullable() };
        Ok(Arc::new(ConditionalAccess { kind, receiver, placeholder, when_not_null, ty }))
    }

    fn placeholder_for(receiver: &Expr) -> Arc<ConditionalReceiver> {
        ConditionalReceiver::new(receiver.ty().non_nullable().clone())
    }

    /// `receiver?.member`
    pub fn member(receiver: Expr, member: &Member) -> ConstructionResult<Arc<Self>> {
        let ph = Self::placeholder_for(&receiver);
        let access = Expr::member(Some(ph.expr()), member)?;
        ConditionalAccess::new(receiver, ph, access)
    }

    /// `receiver?.method(arguments)`
    pub fn call(receiver: Expr, method: &Method, arguments: Vec<Expr>) -> ConstructionResult<Arc<Self>> {
        let ph = Self::placeholder_for(&receiver);
        let access = Expr::call(Some(ph.expr()), method, arguments)?;
        ConditionalAccess::new(receiver, ph, access)
    }

    /// `receiver?.Invoke(arguments)`
    pub fn invoke(receiver: Expr, arguments: Vec<Expr>) -> ConstructionResult<Arc<Self>> {
        let ph = Self::placeholder_for(&receiver);
        let access = Expr::invoke(ph.expr(), arguments)?;
        ConditionalAccess::new(receiver, ph, access)
    }

    /// `receiver?[arguments]` through an indexer property.
    pub fn index(receiver: Expr, indexer: &Property, arguments: Vec<Expr>) -> ConstructionResult<Arc<Self>> {
        let ph = Self::placeholder_for(&receiver);
        let access = Expr::index(ph.expr(), indexer, arguments)?;
        ConditionalAccess::new(receiver, ph, access)
    }

    /// `receiver?[indexes]` over an array: one `int` index per dimension.
    pub fn array_index(receiver: Expr, indexes: Vec<Expr>) -> ConstructionResult<Arc<Self>> {
        let issuer = "lowerkit.ast.access.ConditionalAccess::array_index";
        let rt = receiver.ty();
        let rank = match rt.array_rank() {
            Some(rank) => rank,
            None => return fail(Kind::TypeMismatch, issuer, format!("{} is not an array", rt)),
        };
        if indexes.len() != rank {
            return fail(Kind::ArgumentCount, issuer, format!("array of rank {} indexed with {} indexes", rank, indexes.len()));
        }
        if let Some(bad) = indexes.iter().find(|i| i.ty() != Type::I32) {
            return fail(Kind::TypeMismatch, issuer, format!("array index must be int, got {}", bad.ty()));
        }
        let ph = Self::placeholder_for(&receiver);
        let access = Expr::array_index(ph.expr(), indexes)?;
        ConditionalAccess::new(receiver, ph, access)
    }

    pub fn kind(&self) -> ConditionalAccessKind {
        self.kind
    }

    pub fn receiver(&self) -> &Expr {
        &self.receiver
    }

    pub fn placeholder(&self) -> &Arc<ConditionalReceiver> {
        &self.placeholder
    }

    pub fn when_not_null(&self) -> &Expr {
        &self.when_not_null
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn update(self: &Arc<Self>, receiver: Expr, when_not_null: Expr) -> ConstructionResult<Arc<Self>> {
        if receiver.ptr_eq(&self.receiver) && when_not_null.ptr_eq(&self.when_not_null) {
            return Ok(Arc::clone(self));
        }
        ConditionalAccess::new(receiver, Arc::clone(&self.placeholder), when_not_null)
    }
}
