use crate::filter::FilterError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Invalid filter: {0}")]
    Filter(#[from] FilterError),
    #[error("Runtime error: {0}")]
    Runtime(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
