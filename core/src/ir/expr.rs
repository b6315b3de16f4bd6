//! file: core/src/ir/expr.rs
//! description: primitive expression tree.
//!
//! `Expr` is a shared, immutable handle to one `ExprKind`. The vocabulary is
//! fixed; extended nodes ride in the single `Extension` slot until they are
//! reduced. Construction goes through the validating factories in
//! `ir::factory`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::meta::{Member, Method, Property};
use super::op::{BinaryOp, UnaryOp};
use super::types::Type;
use super::value::ConstValue;
use crate::ast::init::MemberInitializer;
use crate::ast::kind::Node;

fn create_id() -> usize {
    static COUNTER: AtomicUsize = AtomicUsize::new(1);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug)]
pub struct VariableDef {
    id: usize,
    name: Option<String>,
    ty: Type,
}

/// Local variable or lambda parameter. Two handles are the same variable
/// only if they were created by the same `Variable::new` call.
#[derive(Clone)]
pub struct Variable(Arc<VariableDef>);

impl Variable {
    pub fn new(ty: Type, name: Option<&str>) -> Self {
        Variable(Arc::new(VariableDef {
            id: create_id(),
            name: name.map(str::to_string),
            ty,
        }))
    }

    pub fn named(name: &str, ty: Type) -> Self {
        Self::new(ty, Some(name))
    }

    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }

    /// Reference expression for this variable.
    pub fn expr(&self) -> Expr {
        Expr::from_kind(ExprKind::Variable(self.clone()))
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}#{}", name, self.id()),
            None => write!(f, "$v{}", self.id()),
        }
    }
}

#[derive(Debug)]
pub struct LabelDef {
    id: usize,
    name: Option<String>,
    ty: Type,
}

/// Jump target. Identity semantics, like `Variable`.
#[derive(Clone)]
pub struct LabelTarget(Arc<LabelDef>);

impl LabelTarget {
    pub fn new(ty: Type, name: Option<&str>) -> Self {
        LabelTarget(Arc::new(LabelDef {
            id: create_id(),
            name: name.map(str::to_string),
            ty,
        }))
    }

    pub fn void(name: &str) -> Self {
        Self::new(Type::Void, Some(name))
    }

    pub fn id(&self) -> usize {
        self.0.id
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    pub fn ty(&self) -> &Type {
        &self.0.ty
    }
}

impl PartialEq for LabelTarget {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for LabelTarget {}

impl Hash for LabelTarget {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for LabelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for LabelTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}#{}", name, self.id()),
            None => write!(f, "$L{}", self.id()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GotoKind {
    Goto,
    Break,
    Continue,
    Return,
}

/// One entry of a collection initializer: `add_method(arguments...)`.
#[derive(Debug, Clone)]
pub struct ElementInit {
    pub add_method: Method,
    pub arguments: Vec<Expr>,
}

pub enum ExprKind {
    Constant { value: ConstValue, ty: Type },
    Default { ty: Type },
    Variable(Variable),
    Assign { target: Expr, value: Expr },
    Unary { op: UnaryOp, operand: Expr, ty: Type, method: Option<Method> },
    Binary { op: BinaryOp, left: Expr, right: Expr, ty: Type, method: Option<Method>, lifted: bool },
    TypeIs { operand: Expr, test_type: Type },
    Conditional { test: Expr, if_true: Expr, if_false: Expr, ty: Type },
    Block { variables: Vec<Variable>, expressions: Vec<Expr>, ty: Type },
    Label { target: LabelTarget, default_value: Option<Expr> },
    Goto { kind: GotoKind, target: LabelTarget, value: Option<Expr> },
    Try { body: Expr, finally: Expr },
    Throw { value: Expr, ty: Type },
    Call { instance: Option<Expr>, method: Method, arguments: Vec<Expr> },
    New { constructor: Method, arguments: Vec<Expr> },
    Invoke { target: Expr, arguments: Vec<Expr> },
    Member { instance: Option<Expr>, member: Member },
    Index { instance: Expr, indexer: Property, arguments: Vec<Expr> },
    ArrayIndex { array: Expr, indexes: Vec<Expr> },
    ArrayLength { array: Expr },
    NewArray { element_type: Type, expressions: Vec<Expr> },
    Lambda { parameters: Vec<Variable>, body: Expr, ty: Type },
    Quote { lambda: Expr },
    MemberInit { new_expression: Expr, bindings: Vec<MemberInitializer> },
    ListInit { new_expression: Expr, initializers: Vec<ElementInit> },
    Extension(Node),
}

#[derive(Clone)]
pub struct Expr(Arc<ExprKind>);

impl Expr {
    pub(crate) fn from_kind(kind: ExprKind) -> Self {
        Expr(Arc::new(kind))
    }

    pub fn kind(&self) -> &ExprKind {
        &self.0
    }

    /// Reference identity; the basis of structural sharing.
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn ty(&self) -> Type {
        match self.kind() {
            ExprKind::Constant { ty, .. } | ExprKind::Default { ty } => ty.clone(),
            ExprKind::Variable(v) => v.ty().clone(),
            ExprKind::Assign { target, .. } => target.ty(),
            ExprKind::Unary { ty, .. } | ExprKind::Binary { ty, .. } => ty.clone(),
            ExprKind::TypeIs { .. } => Type::Bool,
            ExprKind::Conditional { ty, .. } | ExprKind::Block { ty, .. } => ty.clone(),
            ExprKind::Label { target, .. } => target.ty().clone(),
            ExprKind::Goto { .. } => Type::Void,
            ExprKind::Try { body, .. } => body.ty(),
            ExprKind::Throw { ty, .. } => ty.clone(),
            ExprKind::Call { method, .. } => method.return_type.clone(),
            ExprKind::New { constructor, .. } => constructor.declaring_type.clone(),
            ExprKind::Invoke { target, .. } => match target.ty() {
                Type::Function { ret, .. } => *ret,
                _ => Type::Void,
            },
            ExprKind::Member { member, .. } => member.ty().clone(),
            ExprKind::Index { indexer, .. } => indexer.ty.clone(),
            ExprKind::ArrayIndex { array, .. } => array.ty().element_type().cloned().unwrap_or(Type::Object),
            ExprKind::ArrayLength { .. } => Type::I32,
            ExprKind::NewArray { element_type, .. } => Type::array_of(element_type.clone()),
            ExprKind::Lambda { ty, .. } => ty.clone(),
            ExprKind::Quote { lambda } => Type::quoted(lambda.ty()),
            ExprKind::MemberInit { new_expression, .. } | ExprKind::ListInit { new_expression, .. } => {
                new_expression.ty()
            }
            ExprKind::Extension(node) => node.ty(),
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self.kind() {
            ExprKind::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self.kind() {
            ExprKind::Extension(node) => Some(node),
            _ => None,
        }
    }

    pub fn constant_value(&self) -> Option<&ConstValue> {
        match self.kind() {
            ExprKind::Constant { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn is_extension(&self) -> bool {
        matches!(self.kind(), ExprKind::Extension(_))
    }

    /// `Constant(true)` of type `bool`.
    pub fn is_true_constant(&self) -> bool {
        matches!(self.kind(), ExprKind::Constant { value: ConstValue::Bool(true), ty: Type::Bool })
    }

    pub fn is_false_constant(&self) -> bool {
        matches!(self.kind(), ExprKind::Constant { value: ConstValue::Bool(false), ty: Type::Bool })
    }

    /// Short name of the node kind for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self.kind() {
            ExprKind::Constant { .. } => "Constant",
            ExprKind::Default { .. } => "Default",
            ExprKind::Variable(_) => "Variable",
            ExprKind::Assign { .. } => "Assign",
            ExprKind::Unary { .. } => "Unary",
            ExprKind::Binary { .. } => "Binary",
            ExprKind::TypeIs { .. } => "TypeIs",
            ExprKind::Conditional { .. } => "Conditional",
            ExprKind::Block { .. } => "Block",
            ExprKind::Label { .. } => "Label",
            ExprKind::Goto { .. } => "Goto",
            ExprKind::Try { .. } => "Try",
            ExprKind::Throw { .. } => "Throw",
            ExprKind::Call { .. } => "Call",
            ExprKind::New { .. } => "New",
            ExprKind::Invoke { .. } => "Invoke",
            ExprKind::Member { .. } => "Member",
            ExprKind::Index { .. } => "Index",
            ExprKind::ArrayIndex { .. } => "ArrayIndex",
            ExprKind::ArrayLength { .. } => "ArrayLength",
            ExprKind::NewArray { .. } => "NewArray",
            ExprKind::Lambda { .. } => "Lambda",
            ExprKind::Quote { .. } => "Quote",
            ExprKind::MemberInit { .. } => "MemberInit",
            ExprKind::ListInit { .. } => "ListInit",
            ExprKind::Extension(_) => "Extension",
        }
    }
}

impl Expr {
    /// Direct primitive children in evaluation order. Extension payloads are
    /// opaque here.
    pub fn children(&self) -> Vec<&Expr> {
        let mut out: Vec<&Expr> = Vec::new();
        match self.kind() {
            ExprKind::Constant { .. } | ExprKind::Default { .. } | ExprKind::Variable(_) | ExprKind::Extension(_) => {}
            ExprKind::Assign { target, value } => out.extend([target, value]),
            ExprKind::Unary { operand, .. } | ExprKind::TypeIs { operand, .. } => out.push(operand),
            ExprKind::Binary { left, right, .. } => out.extend([left, right]),
            ExprKind::Conditional { test, if_true, if_false, .. } => out.extend([test, if_true, if_false]),
            ExprKind::Block { expressions, .. } => out.extend(expressions),
            ExprKind::Label { default_value, .. } => out.extend(default_value),
            ExprKind::Goto { value, .. } => out.extend(value),
            ExprKind::Try { body, finally } => out.extend([body, finally]),
            ExprKind::Throw { value, .. } => out.push(value),
            ExprKind::Call { instance, arguments, .. } => {
                out.extend(instance);
                out.extend(arguments);
            }
            ExprKind::New { arguments, .. } => out.extend(arguments),
            ExprKind::Invoke { target, arguments } => {
                out.push(target);
                out.extend(arguments);
            }
            ExprKind::Member { instance, .. } => out.extend(instance),
            ExprKind::Index { instance, arguments, .. } => {
                out.push(instance);
                out.extend(arguments);
            }
            ExprKind::ArrayIndex { array, indexes } => {
                out.push(array);
                out.extend(indexes);
            }
            ExprKind::ArrayLength { array } => out.push(array),
            ExprKind::NewArray { expressions, .. } => out.extend(expressions),
            ExprKind::Lambda { body, .. } => out.push(body),
            ExprKind::Quote { lambda } => out.push(lambda),
            ExprKind::MemberInit { new_expression, bindings } => {
                out.push(new_expression);
                out.extend(bindings.iter().map(|b| b.expression()));
            }
            ExprKind::ListInit { new_expression, initializers } => {
                out.push(new_expression);
                for init in initializers {
                    out.extend(&init.arguments);
                }
            }
        }
        out
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
