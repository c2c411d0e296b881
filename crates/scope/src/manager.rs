//! Scope isolation through the framework hooks.
//!
//! A bundle sees bundles, services, capabilities and events of its own
//! scope. Anything else has to be exported by a descendant scope the
//! requester can reach, or imported along the requester's ancestry.

use crate::error::Result;
use crate::persist::ScopeStore;
use crate::policy::{PolicyType, SERVICE_NAMESPACE};
use crate::scope::{Scope, ScopeId, ScopeSnapshot};
use crate::scopes::Scopes;
use crate::update::{ScopeUpdate, UpdateContext};
use aries_api::{
    Attributes, Bundle, BundleEvent, BundleEventHook, BundleEventKind, BundleFindHook, BundleId,
    BundleRuntime, Capability, HookId, Requirement, ResolverHook, ServiceEvent, ServiceEventHook,
    ServiceFindHook, ServiceReference,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ScopeManagerConfig {
    /// Where scope files live. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Installs originating from this bundle go to the scope that queued them.
    pub manager_bundle: BundleId,
}

impl Default for ScopeManagerConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            manager_bundle: BundleId(1),
        }
    }
}

/// Something a bundle may or may not be allowed to see.
struct Candidate<'a> {
    owner: BundleId,
    namespace: &'a str,
    attributes: &'a Attributes,
    /// Capabilities may also come from a sibling subtree of an ancestor.
    /// Services only come from the ancestors themselves.
    via_siblings: bool,
}

pub struct ScopeManager {
    runtime: Arc<dyn BundleRuntime>,
    scopes: Arc<Scopes>,
    context: Arc<UpdateContext>,
    registration: Mutex<Option<HookId>>,
}

impl ScopeManager {
    pub fn new(runtime: Arc<dyn BundleRuntime>, config: ScopeManagerConfig) -> Self {
        let scopes = Arc::new(Scopes::new(config.data_dir.map(ScopeStore::new)));
        let context = Arc::new(UpdateContext {
            scopes: scopes.clone(),
            runtime: runtime.clone(),
            manager_bundle: config.manager_bundle,
        });
        Self {
            runtime,
            scopes,
            context,
            registration: Mutex::new(None),
        }
    }

    /// Restore persisted scopes, put every other installed bundle in root and
    /// register the hooks. Calling it twice is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut registration = self.registration.lock();
        if registration.is_some() {
            return;
        }

        let runtime = self.runtime.clone();
        if let Err(e) = self.scopes.load(|bundle| runtime.bundle(bundle).is_some()) {
            warn!("Failed to load persisted scopes, starting from an empty root: {}", e);
        }
        let root = self.scopes.root();
        for bundle in self.runtime.bundles() {
            if !self.scopes.contains(bundle.id) {
                self.scopes.assign(bundle.id, &root);
            }
        }

        *registration = Some(self.runtime.hooks().register(self.clone()));
        info!(
            "Scope manager started: {} scopes, {} bundles in root",
            self.scopes.len(),
            root.bundles().len()
        );
    }

    /// Unregister the hooks and forget all in-memory state.
    pub fn shutdown(&self) {
        if let Some(id) = self.registration.lock().take() {
            self.runtime.hooks().unregister(id);
        }
        self.scopes.clear();
        info!("Scope manager stopped");
    }

    pub fn is_started(&self) -> bool {
        self.registration.lock().is_some()
    }

    pub fn root_scope(&self) -> Arc<Scope> {
        self.scopes.root()
    }

    pub fn scope_of(&self, bundle: BundleId) -> Arc<Scope> {
        self.scopes.scope_of(bundle)
    }

    pub fn scope(&self, id: ScopeId) -> Option<Arc<Scope>> {
        self.scopes.get(id)
    }

    pub fn scopes(&self) -> &Arc<Scopes> {
        &self.scopes
    }

    pub fn snapshots(&self) -> Vec<ScopeSnapshot> {
        self.scopes.all().iter().map(|s| s.snapshot()).collect()
    }

    /// Stage changes to `id` and its descendants.
    pub fn new_update(&self, id: ScopeId) -> Result<ScopeUpdate> {
        let scope = self.scopes.require(id)?;
        Ok(ScopeUpdate::new(self.context.clone(), &scope))
    }

    fn same_scope(&self, a: BundleId, b: BundleId) -> bool {
        self.scopes.scope_of(a).id() == self.scopes.scope_of(b).id()
    }

    fn owns(&self, scope: &Scope, bundle: BundleId) -> bool {
        self.scopes.scope_of(bundle).id() == scope.id()
    }

    /// Whether `requester` may see a capability in `namespace` with
    /// `attributes` owned by `owner`.
    pub fn is_visible(
        &self,
        requester: BundleId,
        owner: BundleId,
        namespace: &str,
        attributes: &Attributes,
    ) -> bool {
        self.visible(
            requester,
            &Candidate {
                owner,
                namespace,
                attributes,
                via_siblings: true,
            },
        )
    }

    fn visible(&self, requester: BundleId, candidate: &Candidate<'_>) -> bool {
        let scope = self.scopes.scope_of(requester);
        let owner_scope = self.scopes.scope_of(candidate.owner);
        if scope.id() == owner_scope.id() {
            return true;
        }
        // Only a scope created after the requester's can sit below it.
        if scope.id() < owner_scope.id()
            && self.exported_below(&scope.children(), candidate, None)
        {
            return true;
        }
        self.imported_from_above(&scope, candidate)
    }

    fn exported_below(
        &self,
        children: &[ScopeId],
        candidate: &Candidate<'_>,
        skip: Option<ScopeId>,
    ) -> bool {
        children
            .iter()
            .filter(|id| Some(**id) != skip)
            .filter_map(|id| self.scopes.get(*id))
            .any(|child| {
                let exports = child.matches_policy(
                    PolicyType::Export,
                    candidate.namespace,
                    candidate.attributes,
                ) && self.owns(&child, candidate.owner);
                exports || self.exported_below(&child.children(), candidate, None)
            })
    }

    fn imported_from_above(&self, scope: &Scope, candidate: &Candidate<'_>) -> bool {
        let mut current = self.scopes.get(scope.id());
        while let Some(scope) = current {
            if !scope.matches_policy(PolicyType::Import, candidate.namespace, candidate.attributes) {
                return false;
            }
            let Some(parent) = scope.parent().and_then(|p| self.scopes.get(p)) else {
                return false;
            };
            if self.owns(&parent, candidate.owner) {
                return true;
            }
            if candidate.via_siblings
                && self.exported_below(&parent.children(), candidate, Some(scope.id()))
            {
                return true;
            }
            current = Some(parent);
        }
        false
    }

    /// Places a newly installed bundle in its installer's scope, or in the
    /// scope a committing update queued it for. The assignment lives in
    /// memory only; it reaches disk with the next commit of that scope.
    fn on_installed(&self, event: &BundleEvent) {
        let origin = event.origin.id;
        let root = self.scopes.root();
        if !self.scopes.contains(origin) {
            self.scopes.assign(origin, &root);
        }
        let target = if origin != self.context.manager_bundle {
            self.scopes.scope_of(origin)
        } else {
            self.scopes
                .take_pending(&event.bundle.location)
                .and_then(|id| self.scopes.get(id))
                .unwrap_or(root)
        };
        debug!(
            "Bundle {} ({}) installed by {} into scope {}",
            event.bundle.id,
            event.bundle.location,
            origin,
            target.id()
        );
        self.scopes.assign(event.bundle.id, &target);
    }
}

impl BundleEventHook for ScopeManager {
    fn bundle_event(&self, event: &BundleEvent, listeners: Vec<Bundle>) -> Vec<Bundle> {
        let source = event.bundle.id;
        if event.kind == BundleEventKind::Installed {
            self.on_installed(event);
        }
        if source.is_system() {
            return listeners;
        }

        let scope = self.scopes.scope_of(source);
        let kept = listeners
            .into_iter()
            .filter(|l| l.id.is_system() || self.owns(&scope, l.id))
            .collect();
        // After filtering, so the bundle's own scope still hears about it.
        if event.kind == BundleEventKind::Uninstalled {
            self.scopes.remove_bundle(source);
        }
        kept
    }
}

impl ServiceEventHook for ScopeManager {
    fn service_event(&self, event: &ServiceEvent, listeners: Vec<Bundle>) -> Vec<Bundle> {
        let registrar = event.reference.owner;
        listeners
            .into_iter()
            .filter(|l| self.same_scope(registrar, l.id))
            .collect()
    }
}

impl BundleFindHook for ScopeManager {
    fn find_bundles(&self, context: &Bundle, bundles: Vec<Bundle>) -> Vec<Bundle> {
        if context.id.is_system() {
            return bundles;
        }
        let scope = self.scopes.scope_of(context.id);
        bundles
            .into_iter()
            .filter(|b| b.id.is_system() || self.owns(&scope, b.id))
            .collect()
    }
}

impl ServiceFindHook for ScopeManager {
    fn find_services(
        &self,
        context: &Bundle,
        references: Vec<ServiceReference>,
    ) -> Vec<ServiceReference> {
        if context.id.is_system() {
            return references;
        }
        references
            .into_iter()
            .filter(|r| {
                self.visible(
                    context.id,
                    &Candidate {
                        owner: r.owner,
                        namespace: SERVICE_NAMESPACE,
                        attributes: &r.properties,
                        via_siblings: false,
                    },
                )
            })
            .collect()
    }
}

impl ResolverHook for ScopeManager {
    fn filter_resolvable(&self, candidates: Vec<Bundle>) -> Vec<Bundle> {
        candidates
            .into_iter()
            .filter(|b| !self.scopes.scope_of(b.id).is_updating())
            .collect()
    }

    fn filter_singleton_collisions(
        &self,
        singleton: &Capability,
        candidates: Vec<Capability>,
    ) -> Vec<Capability> {
        candidates
            .into_iter()
            .filter(|c| self.same_scope(singleton.owner, c.owner))
            .collect()
    }

    fn filter_matches(
        &self,
        requirement: &Requirement,
        candidates: Vec<Capability>,
    ) -> Vec<Capability> {
        candidates
            .into_iter()
            .filter(|c| self.is_visible(requirement.owner, c.owner, &c.namespace, &c.attributes))
            .collect()
    }
}
