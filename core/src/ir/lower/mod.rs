//! file: core/src/ir/lower/mod.rs
//! description: reduction of extended nodes into primitive IR.
//!
//! `reduce_node` performs one lowering step for one node: the result may
//! still contain extended children (the node's own operands). The
//! `reduce_extensions` driver repeats that until no extension node is left
//! and, when the options ask for it, verifies the result.

pub mod block_builder;
pub mod err;
pub mod lowering_context;
mod lower_expr;
mod lower_objects;
mod lower_stmt;
mod lower_switch;

use log::{debug, trace};

use self::err::LoweringError;
use self::lowering_context::LoweringContext;
use crate::ast::kind::Node;
use crate::ir::expr::Expr;
use crate::ir::verify::{free_variables, verify};
use crate::ir::visit::{Rewriter, walk_expr};

/// One lowering step for `node`.
pub fn reduce_node(node: &Node, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    trace!("reducing {}", node);
    let out = match node {
        Node::AssignBinary(n) => lower_expr::lower_assign_binary(n, ctx)?,
        Node::AssignUnary(n) => lower_expr::lower_assign_unary(n, ctx)?,
        Node::ConditionalAccess(n) => lower_expr::lower_conditional_access(n, ctx)?,
        Node::FromEndIndex(n) => lower_expr::lower_from_end_index(n, ctx)?,
        Node::ArrayAccess(n) => lower_expr::lower_array_access(n, ctx)?,
        Node::InterpolatedString(n) => lower_expr::lower_interpolated_string(n)?,
        Node::Call(n) => lower_objects::lower_call(n, ctx)?,
        Node::Invoke(n) => lower_objects::lower_invoke(n, ctx)?,
        Node::New(n) => lower_objects::lower_new(n, ctx)?,
        Node::Index(n) => lower_objects::lower_index(n, ctx)?,
        Node::TupleLiteral(n) => lower_objects::lower_tuple_literal(n)?,
        Node::TupleConvert(n) => lower_objects::lower_tuple_convert(n, ctx)?,
        Node::While(n) => lower_stmt::lower_while(n, ctx)?,
        Node::DoWhile(n) => lower_stmt::lower_do_while(n, ctx)?,
        Node::For(n) => lower_stmt::lower_for(n, ctx)?,
        Node::Lock(n) => lower_stmt::lower_lock(n, ctx)?,
        Node::SwitchExpression(n) => lower_switch::lower_switch_expression(n, ctx)?,
        Node::SwitchStatement(n) => lower_switch::lower_switch_statement(n, ctx)?,
        Node::CaseSwitch(n) => lower_switch::lower_case_switch(n, ctx)?,
        Node::ConditionalReceiver(r) => {
            return Err(LoweringError::new(
                format!("conditional receiver #{} reached lowering outside its access", r.id()),
                "lowerkit.ir.lower.reduce_node",
            ));
        }
        Node::Discard(_) => {
            return Err(LoweringError::new(
                "a discard can only be the target of an assignment or a by-ref argument".to_string(),
                "lowerkit.ir.lower.reduce_node",
            ));
        }
    };
    if out.ty() != node.ty() {
        return Err(LoweringError::new(
            format!("{} lowered to a tree of type {}, expected {}", node.kind(), out.ty(), node.ty()),
            "lowerkit.ir.lower.reduce_node",
        ));
    }
    Ok(out)
}

/// Rewriter that replaces every extension node by its full reduction.
struct ExtensionReducer<'a> {
    ctx: &'a LoweringContext,
    depth: usize,
}

impl Rewriter for ExtensionReducer<'_> {
    type Error = LoweringError;

    fn visit_extension(&mut self, _expr: &Expr, node: &Node) -> Result<Expr, LoweringError> {
        if self.depth >= self.ctx.options.max_reduce_depth {
            return Err(LoweringError::new(
                format!("extension nesting exceeds {} levels", self.ctx.options.max_reduce_depth),
                "lowerkit.ir.lower.reduce_extensions",
            ));
        }
        let once = reduce_node(node, self.ctx)?;
        self.depth += 1;
        let out = walk_expr(self, &once);
        self.depth -= 1;
        out
    }
}

/// Reduce every extension node in `expr` with default options.
pub fn reduce_extensions(expr: &Expr) -> Result<Expr, LoweringError> {
    reduce_extensions_with(expr, &LoweringContext::new())
}

pub fn reduce_extensions_with(expr: &Expr, ctx: &LoweringContext) -> Result<Expr, LoweringError> {
    let mut reducer = ExtensionReducer { ctx, depth: 0 };
    let out = reducer.visit(expr)?;
    if ctx.options.verify {
        verify(&out, &free_variables(expr))?;
    }
    debug!("reduced tree of type {}", out.ty());
    Ok(out)
}
