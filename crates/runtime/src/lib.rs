pub mod config;
pub mod error;
pub mod logging;

use aries_api::BundleRuntime;
use aries_proxy::{ClassPath, ClassRepository, ProxySubclassGenerator, WovenProxyGenerator};
use aries_scope::ScopeManager;
use std::path::Path;
use std::sync::Arc;

// Re-export commonly used types
pub use config::{AriesConfig, WeavingConfig};
pub use error::{Result, RuntimeError};
pub use logging::init_logging;

/// Starts a scope manager on `runtime` with persisted state from
/// `config.data_dir`, hooks registered.
pub fn start_scope_manager(config: &AriesConfig, runtime: Arc<dyn BundleRuntime>) -> Arc<ScopeManager> {
    let manager = Arc::new(ScopeManager::new(runtime, config.scope_manager()));
    manager.start();
    manager
}

/// Class lookup over directories and jars, in order.
pub fn class_repository<P: AsRef<Path>>(class_path: &[P]) -> Result<Arc<ClassRepository>> {
    Ok(Arc::new(ClassRepository::new(ClassPath::from_paths(class_path)?)))
}

pub fn subclass_generator(config: &AriesConfig, repository: Arc<ClassRepository>) -> ProxySubclassGenerator {
    ProxySubclassGenerator::with_relocation_prefix(repository, &config.proxy_package_prefix)
}

pub fn woven_generator(config: &AriesConfig, repository: Arc<ClassRepository>) -> WovenProxyGenerator {
    WovenProxyGenerator::new(repository, config.weaving.policy())
}
