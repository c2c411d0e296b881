pub mod error;
pub mod framework;
pub mod manager;
pub mod persist;
pub mod policy;
pub mod scope;
pub mod scopes;
pub mod update;

// Re-export commonly used types
pub use error::{Result, ScopeError};
pub use framework::InMemoryFramework;
pub use manager::{ScopeManager, ScopeManagerConfig};
pub use persist::{ScopeRecord, ScopeStore};
pub use policy::{PolicyType, SERVICE_NAMESPACE, SharePolicies, SharePolicy};
pub use scope::{Scope, ScopeId, ScopeSnapshot};
pub use scopes::Scopes;
pub use update::{ScopeUpdate, scoped_location};
