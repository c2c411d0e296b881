#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("class {class_name} is final and cannot be proxied")]
    FinalClass { class_name: String },

    #[error("class {class_name} has final methods that cannot be overridden: {}", .methods.join(", "))]
    FinalMethods {
        class_name: String,
        methods: Vec<String>,
    },

    #[error("unable to proxy {class_name}: {reason}")]
    UnableToProxy { class_name: String, reason: String },

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("malformed class file: {0}")]
    ClassFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl ProxyError {
    pub fn format(msg: impl Into<String>) -> Self {
        ProxyError::ClassFormat(msg.into())
    }

    pub fn unable(class_name: impl Into<String>, reason: impl Into<String>) -> Self {
        ProxyError::UnableToProxy {
            class_name: class_name.into(),
            reason: reason.into(),
        }
    }

    /// Structural failures that no retry can fix.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProxyError::FinalClass { .. }
                | ProxyError::FinalMethods { .. }
                | ProxyError::UnableToProxy { .. }
        )
    }

    /// Copy of a terminal error for the negative cache.
    pub(crate) fn terminal_copy(&self) -> Option<ProxyError> {
        match self {
            ProxyError::FinalClass { class_name } => Some(ProxyError::FinalClass {
                class_name: class_name.clone(),
            }),
            ProxyError::FinalMethods {
                class_name,
                methods,
            } => Some(ProxyError::FinalMethods {
                class_name: class_name.clone(),
                methods: methods.clone(),
            }),
            ProxyError::UnableToProxy { class_name, reason } => Some(ProxyError::UnableToProxy {
                class_name: class_name.clone(),
                reason: reason.clone(),
            }),
            _ => None,
        }
    }
}

impl From<ristretto_classfile::Error> for ProxyError {
    fn from(err: ristretto_classfile::Error) -> Self {
        ProxyError::ClassFormat(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
