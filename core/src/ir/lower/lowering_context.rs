//! file: core/src/ir/lower/lowering_context.rs
//! description: shared state handed to every lowering routine.
//!
//! The context is read-only during a reduction: it carries the options and
//! names the temporaries that lowering introduces.

use crate::ir::expr::{LabelTarget, Variable};
use crate::ir::types::Type;
use crate::options::LoweringOptions;

#[derive(Debug, Clone, Default)]
pub struct LoweringContext {
    pub options: LoweringOptions,
}

impl LoweringContext {
    /// Context with default options.
    pub fn new() -> Self {
        LoweringContext { options: LoweringOptions::default() }
    }

    pub fn with_options(options: LoweringOptions) -> Self {
        LoweringContext { options }
    }

    /// Fresh compiler temporary; `hint` only shapes the debug name.
    pub fn temp(&self, ty: Type, hint: &str) -> Variable {
        Variable::named(&format!("{}{}", self.options.temp_prefix, hint), ty)
    }

    /// Fresh compiler label.
    pub fn label(&self, ty: Type, hint: &str) -> LabelTarget {
        LabelTarget::new(ty, Some(&format!("{}{}", self.options.temp_prefix, hint)))
    }
}
