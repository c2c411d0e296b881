#![allow(dead_code)]

use aries_api::{BundleId, BundleRuntime, InstallInfo};
use aries_scope::{InMemoryFramework, ScopeId, ScopeManager, ScopeManagerConfig, SharePolicy};
use std::path::PathBuf;
use std::sync::Arc;

pub const PACKAGE: &str = "osgi.wiring.package";

pub struct Fixture {
    pub framework: Arc<InMemoryFramework>,
    pub manager: Arc<ScopeManager>,
    pub admin: BundleId,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_data_dir(None)
    }

    /// The scope-admin bundle is installed first and takes id 1.
    pub fn with_data_dir(data_dir: Option<PathBuf>) -> Self {
        let framework = Arc::new(InMemoryFramework::new());
        let admin = framework
            .install(BundleId::SYSTEM, &InstallInfo::new("scope-admin.jar", "scope.admin"))
            .unwrap()
            .id;
        let manager = start(&framework, data_dir);
        Self {
            framework,
            manager,
            admin,
        }
    }

    pub fn install(&self, name: &str) -> BundleId {
        self.framework
            .install(BundleId::SYSTEM, &InstallInfo::new(format!("{name}.jar"), name))
            .unwrap()
            .id
    }

    /// Commit a new child of `parent` holding `bundles` and `policies`.
    pub fn create_scope(
        &self,
        parent: ScopeId,
        name: &str,
        bundles: &[BundleId],
        policies: Vec<SharePolicy>,
    ) -> ScopeId {
        let mut update = self.manager.new_update(parent).unwrap();
        let child = update.new_child(name);
        for bundle in bundles {
            child.add_bundle(*bundle);
        }
        for policy in policies {
            child.add_share_policy(policy);
        }
        let id = child.scope_id();
        assert!(update.commit().unwrap());
        id
    }
}

pub fn start(framework: &Arc<InMemoryFramework>, data_dir: Option<PathBuf>) -> Arc<ScopeManager> {
    let config = ScopeManagerConfig {
        data_dir,
        manager_bundle: BundleId(1),
    };
    let manager = Arc::new(ScopeManager::new(framework.clone(), config));
    manager.start();
    manager
}

pub fn ids<T, F: Fn(&T) -> BundleId>(items: &[T], id: F) -> Vec<BundleId> {
    let mut ids: Vec<_> = items.iter().map(id).collect();
    ids.sort();
    ids
}
