pub mod error;
pub mod filter;
pub mod hooks;
pub mod models;
pub mod runtime;

// Re-export commonly used types
pub use error::{ApiError, ApiResult};
pub use filter::{Filter, FilterError};
pub use hooks::{
    BundleEventHook, BundleFindHook, FrameworkHooks, HookId, HookRegistry, ResolverHook,
    ServiceEventHook, ServiceFindHook,
};
pub use models::*;
pub use runtime::BundleRuntime;
