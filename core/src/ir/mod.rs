pub mod display;
pub mod expr;
pub mod factory;
pub mod lower;
pub mod meta;
pub mod op;
pub mod types;
pub mod value;
pub mod verify;
pub mod visit;
pub mod wellknown;

pub use self::expr::{ElementInit, Expr, ExprKind, GotoKind, LabelTarget, Variable};
pub use self::lower::{reduce_extensions, reduce_extensions_with};
pub use self::meta::{Field, Member, Method, ParameterInfo, Property};
pub use self::op::{BinaryOp, UnaryOp};
pub use self::types::Type;
pub use self::value::ConstValue;
pub use self::verify::{VerifyError, verify};
pub use self::visit::Rewriter;
