use aries_proxy::ProxyError;
use aries_scope::ScopeError;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),
    #[error("Scope error: {0}")]
    Scope(#[from] ScopeError),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
