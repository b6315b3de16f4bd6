use crate::ast::err::ConstructionError;
use crate::error::{Level, LowerkitErrorExt};
use crate::ir::verify::VerifyError;

/// Failure while turning extended nodes into primitive ones.
///
/// Construction failures of the primitive nodes built during lowering and
/// verification failures of the result are folded into this type so the
/// whole reduction reports through one error.
#[derive(Debug, Clone)]
pub struct LoweringError {
    level: Level,
    message: String,
    issuer: String,
}

impl LoweringError {
    pub fn new(message: String, issuer: &str) -> Self {
        LoweringError {
            level: Level::Error,
            message,
            issuer: issuer.to_string(),
        }
    }

    pub fn with(level: Level, message: String, issuer: String) -> Self {
        LoweringError { level, message, issuer }
    }
}

impl std::fmt::Display for LoweringError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.issuer)
    }
}

impl std::error::Error for LoweringError {}

impl LowerkitErrorExt for LoweringError {
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

impl From<ConstructionError> for LoweringError {
    fn from(e: ConstructionError) -> Self {
        LoweringError::with(e.level(), e.message(), e.issuer())
    }
}

impl From<VerifyError> for LoweringError {
    fn from(e: VerifyError) -> Self {
        LoweringError::with(Level::Critical, format!("lowered tree failed verification: {}", e.message()), e.issuer())
    }
}
