//! Extended node model layered over the primitive IR.
//!
//! Nodes are built bottom-up through validating constructors, rewritten
//! with `ir::visit::Rewriter` and lowered with `Node::reduce`.

pub mod access;
pub mod args;
pub mod err;
pub mod expr;
pub mod init;
pub mod interp;
pub mod kind;
pub mod pattern;
pub mod stmt;
pub mod switch;
pub mod tuple;

pub use access::{ConditionalAccess, ConditionalAccessKind, ConditionalReceiver};
pub use args::ParameterAssignment;
pub use err::{ConstructionError, ConstructionErrorKind, ConstructionResult};
pub use expr::{ArrayAccess, AssignBinary, AssignUnary, Call, Discard, FromEndIndex, Index, Invoke, New};
pub use init::{MemberInitializer, indexer_initializer};
pub use interp::{InterpolatedString, Interpolation};
pub use kind::{AssignOp, Node, NodeKind, UnaryAssignOp};
pub use pattern::{Pattern, PatternKind};
pub use stmt::{DoWhile, For, Lock, While};
pub use switch::{
    CaseSwitch, SwitchCase, SwitchExpression, SwitchExpressionArm, SwitchLabel, SwitchSection, SwitchStatement,
    TestValue,
};
pub use tuple::{TupleConvert, TupleLiteral};
