use crate::error::{Level, LowerkitErrorExt};

/// Broad category of a construction failure, so callers can match on it
/// without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstructionErrorKind {
    InvalidArgument,
    TypeMismatch,
    ArgumentCount,
    NotAssignable,
    NotReadable,
    NotBoolean,
    NotReferenceType,
    InvalidMember,
    DuplicateParameter,
    MissingParameter,
    DuplicateTestValue,
    DuplicateDefault,
    DuplicateVariable,
    InvalidLabel,
    InconsistentTypes,
}

#[derive(Debug, Clone)]
pub struct ConstructionError {
    level: Level,
    kind: ConstructionErrorKind,
    message: String,
    issuer: String,
}

impl ConstructionError {
    pub fn new(kind: ConstructionErrorKind, message: String, issuer: &str) -> Self {
        ConstructionError {
            level: Level::Error,
            kind,
            message,
            issuer: issuer.to_string(),
        }
    }

    /// More explicit constructor when you need to set the level as well.
    pub fn with(level: Level, kind: ConstructionErrorKind, message: String, issuer: String) -> Self {
        ConstructionError {
            level,
            kind,
            message,
            issuer,
        }
    }

    pub fn kind(&self) -> ConstructionErrorKind {
        self.kind
    }
}

impl std::fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.issuer)
    }
}

impl std::error::Error for ConstructionError {}

impl LowerkitErrorExt for ConstructionError {
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

pub type ConstructionResult<T> = Result<T, ConstructionError>;

/// Shorthand used by every validating factory.
pub(crate) fn fail<T>(kind: ConstructionErrorKind, issuer: &str, message: impl Into<String>) -> ConstructionResult<T> {
    Err(ConstructionError::new(kind, message.into(), issuer))
}
