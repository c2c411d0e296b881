use crate::scope::ScopeId;
use aries_api::{ApiError, FilterError};

#[derive(Debug, thiserror::Error)]
pub enum ScopeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed scope data: {0}")]
    Format(String),
    #[error("Invalid share policy filter: {0}")]
    Filter(#[from] FilterError),
    #[error("Runtime error: {0}")]
    Runtime(#[from] ApiError),
    #[error("Only a top-level scope update can be committed")]
    NotTopLevel,
    #[error("Unknown scope: {0}")]
    UnknownScope(ScopeId),
    #[error("Scope {child} cannot be moved under its own descendant {parent}")]
    Cycle { child: ScopeId, parent: ScopeId },
}

pub type Result<T> = std::result::Result<T, ScopeError>;

impl From<ristretto_classfile::Error> for ScopeError {
    fn from(err: ristretto_classfile::Error) -> Self {
        ScopeError::Format(err.to_string())
    }
}
