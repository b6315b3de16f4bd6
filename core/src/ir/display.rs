//! file: core/src/ir/display.rs
//! description: readable dump of primitive trees.
//!
//! Used in debug logging and in test failure messages. The format is
//! indented, one node per line for blocks, inline for everything else.

use std::fmt::{self, Write};

use super::expr::{Expr, ExprKind, GotoKind};

struct Printer<'a, 'b> {
    f: &'a mut fmt::Formatter<'b>,
    indent: usize,
}

impl Printer<'_, '_> {
    fn newline(&mut self) -> fmt::Result {
        self.f.write_char('\n')?;
        for _ in 0..self.indent {
            self.f.write_str("  ")?;
        }
        Ok(())
    }

    fn list(&mut self, items: &[Expr]) -> fmt::Result {
        for (i, e) in items.iter().enumerate() {
            if i > 0 {
                self.f.write_str(", ")?;
            }
            self.expr(e)?;
        }
        Ok(())
    }

    fn expr(&mut self, e: &Expr) -> fmt::Result {
        match e.kind() {
            ExprKind::Constant { value, ty } => write!(self.f, "{}:{}", value, ty),
            ExprKind::Default { ty } => write!(self.f, "default({})", ty),
            ExprKind::Variable(v) => write!(self.f, "{}", v),
            ExprKind::Assign { target, value } => {
                self.expr(target)?;
                self.f.write_str(" = ")?;
                self.expr(value)
            }
            ExprKind::Unary { op, operand, ty, .. } => {
                write!(self.f, "{}<{}>(", op, ty)?;
                self.expr(operand)?;
                self.f.write_str(")")
            }
            ExprKind::Binary { op, left, right, method, .. } => {
                self.f.write_str("(")?;
                self.expr(left)?;
                match method {
                    Some(m) => write!(self.f, " {}[{}] ", op, m.name)?,
                    None => write!(self.f, " {} ", op)?,
                }
                self.expr(right)?;
                self.f.write_str(")")
            }
            ExprKind::TypeIs { operand, test_type } => {
                self.f.write_str("(")?;
                self.expr(operand)?;
                write!(self.f, " is {})", test_type)
            }
            ExprKind::Conditional { test, if_true, if_false, .. } => {
                self.f.write_str("if (")?;
                self.expr(test)?;
                self.f.write_str(") {")?;
                self.indent += 1;
                self.newline()?;
                self.expr(if_true)?;
                self.indent -= 1;
                self.newline()?;
                self.f.write_str("} else {")?;
                self.indent += 1;
                self.newline()?;
                self.expr(if_false)?;
                self.indent -= 1;
                self.newline()?;
                self.f.write_str("}")
            }
            ExprKind::Block { variables, expressions, ty } => {
                write!(self.f, "block<{}>", ty)?;
                if !variables.is_empty() {
                    self.f.write_str("(")?;
                    for (i, v) in variables.iter().enumerate() {
                        if i > 0 {
                            self.f.write_str(", ")?;
                        }
                        write!(self.f, "{}: {}", v, v.ty())?;
                    }
                    self.f.write_str(")")?;
                }
                self.f.write_str(" {")?;
                self.indent += 1;
                for e in expressions {
                    self.newline()?;
                    self.expr(e)?;
                }
                self.indent -= 1;
                self.newline()?;
                self.f.write_str("}")
            }
            ExprKind::Label { target, default_value } => {
                write!(self.f, "{}:", target)?;
                if let Some(v) = default_value {
                    self.f.write_str(" ")?;
                    self.expr(v)?;
                }
                Ok(())
            }
            ExprKind::Goto { kind, target, value } => {
                let word = match kind {
                    GotoKind::Goto => "goto",
                    GotoKind::Break => "break",
                    GotoKind::Continue => "continue",
                    GotoKind::Return => "return",
                };
                write!(self.f, "{} {}", word, target)?;
                if let Some(v) = value {
                    self.f.write_str(" ")?;
                    self.expr(v)?;
                }
                Ok(())
            }
            ExprKind::Try { body, finally } => {
                self.f.write_str("try {")?;
                self.indent += 1;
                self.newline()?;
                self.expr(body)?;
                self.indent -= 1;
                self.newline()?;
                self.f.write_str("} finally {")?;
                self.indent += 1;
                self.newline()?;
                self.expr(finally)?;
                self.indent -= 1;
                self.newline()?;
                self.f.write_str("}")
            }
            ExprKind::Throw { value, .. } => {
                self.f.write_str("throw ")?;
                self.expr(value)
            }
            ExprKind::Call { instance, method, arguments } => {
                match instance {
                    Some(i) => self.expr(i)?,
                    None => write!(self.f, "{}", method.declaring_type)?,
                }
                write!(self.f, ".{}(", method.name)?;
                self.list(arguments)?;
                self.f.write_str(")")
            }
            ExprKind::New { constructor, arguments } => {
                write!(self.f, "new {}(", constructor.declaring_type)?;
                self.list(arguments)?;
                self.f.write_str(")")
            }
            ExprKind::Invoke { target, arguments } => {
                self.expr(target)?;
                self.f.write_str(".Invoke(")?;
                self.list(arguments)?;
                self.f.write_str(")")
            }
            ExprKind::Member { instance, member } => {
                match instance {
                    Some(i) => self.expr(i)?,
                    None => write!(self.f, "{}", member.declaring_type())?,
                }
                write!(self.f, ".{}", member.name())
            }
            ExprKind::Index { instance, arguments, .. } => {
                self.expr(instance)?;
                self.f.write_str("[")?;
                self.list(arguments)?;
                self.f.write_str("]")
            }
            ExprKind::ArrayIndex { array, indexes } => {
                self.expr(array)?;
                self.f.write_str("[")?;
                self.list(indexes)?;
                self.f.write_str("]")
            }
            ExprKind::ArrayLength { array } => {
                self.expr(array)?;
                self.f.write_str(".Length")
            }
            ExprKind::NewArray { element_type, expressions } => {
                write!(self.f, "new {}[] {{", element_type)?;
                self.list(expressions)?;
                self.f.write_str("}")
            }
            ExprKind::Lambda { parameters, body, .. } => {
                self.f.write_str("(")?;
                for (i, p) in parameters.iter().enumerate() {
                    if i > 0 {
                        self.f.write_str(", ")?;
                    }
                    write!(self.f, "{}", p)?;
                }
                self.f.write_str(") => ")?;
                self.expr(body)
            }
            ExprKind::Quote { lambda } => {
                self.f.write_str("quote(")?;
                self.expr(lambda)?;
                self.f.write_str(")")
            }
            ExprKind::MemberInit { new_expression, bindings } => {
                self.expr(new_expression)?;
                self.f.write_str(" {")?;
                for (i, b) in bindings.iter().enumerate() {
                    if i > 0 {
                        self.f.write_str(",")?;
                    }
                    write!(self.f, " {} = ", b.member().name())?;
                    self.expr(b.expression())?;
                }
                self.f.write_str(" }")
            }
            ExprKind::ListInit { new_expression, initializers } => {
                self.expr(new_expression)?;
                self.f.write_str(" {")?;
                for (i, init) in initializers.iter().enumerate() {
                    if i > 0 {
                        self.f.write_str(",")?;
                    }
                    write!(self.f, " {}(", init.add_method.name)?;
                    self.list(&init.arguments)?;
                    self.f.write_str(")")?;
                }
                self.f.write_str(" }")
            }
            ExprKind::Extension(node) => write!(self.f, "{}", node),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Printer { f, indent: 0 }.expr(self)
    }
}
