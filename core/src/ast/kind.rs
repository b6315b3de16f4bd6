//! file: core/src/ast/kind.rs
//! description: the closed set of extended node kinds and operator enums.
//!
//! `Node` is the single type stored in the primitive tree's `Extension`
//! slot. Each variant shares an immutable payload through `Arc` so `update`
//! can hand back the very same instance when nothing changed.

use std::fmt;
use std::sync::Arc;

use super::access::{ConditionalAccess, ConditionalReceiver};
use super::expr::{ArrayAccess, AssignBinary, AssignUnary, Call, Discard, FromEndIndex, Index, Invoke, New};
use super::interp::InterpolatedString;
use super::stmt::{DoWhile, For, Lock, While};
use super::switch::{CaseSwitch, SwitchExpression, SwitchStatement};
use super::tuple::{TupleConvert, TupleLiteral};
use crate::ir::expr::Expr;
use crate::ir::lower::err::LoweringError;
use crate::ir::lower::lowering_context::LoweringContext;
use crate::ir::op::BinaryOp;
use crate::ir::types::Type;

/// Assignment operators, plain and compound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Assign,
    Add,
    AddChecked,
    Sub,
    SubChecked,
    Mul,
    MulChecked,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Coalesce,
}

impl AssignOp {
    /// Binary operator applied by a compound assignment.
    pub fn binary_op(self) -> Option<BinaryOp> {
        let op = match self {
            AssignOp::Assign => return None,
            AssignOp::Add => BinaryOp::Add,
            AssignOp::AddChecked => BinaryOp::AddChecked,
            AssignOp::Sub => BinaryOp::Sub,
            AssignOp::SubChecked => BinaryOp::SubChecked,
            AssignOp::Mul => BinaryOp::Mul,
            AssignOp::MulChecked => BinaryOp::MulChecked,
            AssignOp::Div => BinaryOp::Div,
            AssignOp::Mod => BinaryOp::Mod,
            AssignOp::And => BinaryOp::And,
            AssignOp::Or => BinaryOp::Or,
            AssignOp::Xor => BinaryOp::Xor,
            AssignOp::Shl => BinaryOp::Shl,
            AssignOp::Shr => BinaryOp::Shr,
            AssignOp::Coalesce => BinaryOp::Coalesce,
        };
        Some(op)
    }

    pub fn is_compound(self) -> bool {
        !matches!(self, AssignOp::Assign | AssignOp::Coalesce)
    }
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.binary_op() {
            None => write!(f, "="),
            Some(op) => write!(f, "{}=", op),
        }
    }
}

/// Increment/decrement forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryAssignOp {
    PreIncrement,
    PreDecrement,
    PostIncrement,
    PostDecrement,
    PreIncrementChecked,
    PreDecrementChecked,
    PostIncrementChecked,
    PostDecrementChecked,
}

impl UnaryAssignOp {
    pub fn is_prefix(self) -> bool {
        matches!(
            self,
            UnaryAssignOp::PreIncrement
                | UnaryAssignOp::PreDecrement
                | UnaryAssignOp::PreIncrementChecked
                | UnaryAssignOp::PreDecrementChecked
        )
    }

    pub fn is_checked(self) -> bool {
        matches!(
            self,
            UnaryAssignOp::PreIncrementChecked
                | UnaryAssignOp::PreDecrementChecked
                | UnaryAssignOp::PostIncrementChecked
                | UnaryAssignOp::PostDecrementChecked
        )
    }

    pub fn is_increment(self) -> bool {
        matches!(
            self,
            UnaryAssignOp::PreIncrement
                | UnaryAssignOp::PostIncrement
                | UnaryAssignOp::PreIncrementChecked
                | UnaryAssignOp::PostIncrementChecked
        )
    }

    /// `+`/`-` (checked or not) used to compute the new value.
    pub fn binary_op(self) -> BinaryOp {
        match (self.is_increment(), self.is_checked()) {
            (true, false) => BinaryOp::Add,
            (true, true) => BinaryOp::AddChecked,
            (false, false) => BinaryOp::Sub,
            (false, true) => BinaryOp::SubChecked,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    AssignBinary,
    AssignUnary,
    Call,
    Invoke,
    New,
    Index,
    ConditionalAccess,
    ConditionalReceiver,
    While,
    DoWhile,
    For,
    SwitchExpression,
    SwitchStatement,
    CaseSwitch,
    TupleLiteral,
    TupleConvert,
    InterpolatedString,
    Lock,
    FromEndIndex,
    ArrayAccess,
    Discard,
}

#[derive(Debug, Clone)]
pub enum Node {
    AssignBinary(Arc<AssignBinary>),
    AssignUnary(Arc<AssignUnary>),
    Call(Arc<Call>),
    Invoke(Arc<Invoke>),
    New(Arc<New>),
    Index(Arc<Index>),
    ConditionalAccess(Arc<ConditionalAccess>),
    ConditionalReceiver(Arc<ConditionalReceiver>),
    While(Arc<While>),
    DoWhile(Arc<DoWhile>),
    For(Arc<For>),
    SwitchExpression(Arc<SwitchExpression>),
    SwitchStatement(Arc<SwitchStatement>),
    CaseSwitch(Arc<CaseSwitch>),
    TupleLiteral(Arc<TupleLiteral>),
    TupleConvert(Arc<TupleConvert>),
    InterpolatedString(Arc<InterpolatedString>),
    Lock(Arc<Lock>),
    FromEndIndex(Arc<FromEndIndex>),
    ArrayAccess(Arc<ArrayAccess>),
    Discard(Arc<Discard>),
}

macro_rules! node_variants {
    ($($variant:ident),* $(,)?) => {
        impl Node {
            pub fn kind(&self) -> NodeKind {
                match self {
                    $(Node::$variant(_) => NodeKind::$variant,)*
                }
            }

            pub fn ty(&self) -> Type {
                match self {
                    $(Node::$variant(n) => n.ty().clone(),)*
                }
            }

            /// Same variant and same payload instance.
            pub fn ptr_eq(&self, other: &Node) -> bool {
                match (self, other) {
                    $((Node::$variant(a), Node::$variant(b)) => Arc::ptr_eq(a, b),)*
                    _ => false,
                }
            }
        }

        $(
            impl From<Arc<$variant>> for Node {
                fn from(n: Arc<$variant>) -> Node {
                    Node::$variant(n)
                }
            }

            impl From<Arc<$variant>> for Expr {
                fn from(n: Arc<$variant>) -> Expr {
                    Expr::extension(Node::$variant(n))
                }
            }
        )*
    };
}

node_variants!(
    AssignBinary,
    AssignUnary,
    Call,
    Invoke,
    New,
    Index,
    ConditionalAccess,
    ConditionalReceiver,
    While,
    DoWhile,
    For,
    SwitchExpression,
    SwitchStatement,
    CaseSwitch,
    TupleLiteral,
    TupleConvert,
    InterpolatedString,
    Lock,
    FromEndIndex,
    ArrayAccess,
    Discard,
);

impl Node {
    pub fn into_expr(self) -> Expr {
        Expr::extension(self)
    }

    /// Every node except the conditional-receiver placeholder can be
    /// lowered.
    pub fn can_reduce(&self) -> bool {
        !matches!(self, Node::ConditionalReceiver(_))
    }

    /// One lowering step: the result may still contain extended children.
    pub fn reduce_once(&self, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
        crate::ir::lower::reduce_node(self, ctx)
    }

    /// Lower this node and everything it contains into primitive nodes.
    pub fn reduce(&self) -> Result<Expr, LoweringError> {
        let ctx = LoweringContext::new();
        self.reduce_with(&ctx)
    }

    pub fn reduce_with(&self, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
        crate::ir::lower::reduce_extensions_with(&self.clone().into_expr(), ctx)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ext:{}<{}>", self.kind(), self.ty())
    }
}
