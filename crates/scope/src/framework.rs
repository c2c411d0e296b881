//! A small in-process module runtime. It keeps bundles, services and
//! capabilities in memory and routes every lookup and event through the
//! registered hooks, which is all the scope manager needs to be driven.

use aries_api::{
    ApiError, ApiResult, Attributes, Bundle, BundleEvent, BundleEventKind, BundleId, BundleRuntime,
    Capability, HookRegistry, InstallInfo, Requirement, ServiceEvent, ServiceEventKind,
    ServiceReference,
};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

pub struct InMemoryFramework {
    hooks: HookRegistry,
    bundles: RwLock<IndexMap<BundleId, Bundle>>,
    services: RwLock<Vec<ServiceReference>>,
    capabilities: RwLock<Vec<Capability>>,
    next_bundle: AtomicU64,
    next_service: AtomicU64,
}

impl Default for InMemoryFramework {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFramework {
    /// A framework holding only the system bundle.
    pub fn new() -> Self {
        let mut bundles = IndexMap::new();
        bundles.insert(BundleId::SYSTEM, Bundle::system());
        Self {
            hooks: HookRegistry::new(),
            bundles: RwLock::new(bundles),
            services: RwLock::new(Vec::new()),
            capabilities: RwLock::new(Vec::new()),
            next_bundle: AtomicU64::new(1),
            next_service: AtomicU64::new(1),
        }
    }

    fn lookup(&self, id: BundleId) -> ApiResult<Bundle> {
        self.bundle(id)
            .ok_or_else(|| ApiError::NotFound(format!("bundle {id}")))
    }

    /// Deliver a bundle event. Returns the bundles that received it.
    pub fn fire(&self, kind: BundleEventKind, bundle: &Bundle, origin: &Bundle) -> Vec<Bundle> {
        let event = BundleEvent::new(kind, bundle.clone(), origin.clone());
        let delivered = self.hooks.fire_bundle_event(&event, self.bundles());
        debug!("{:?} of bundle {} delivered to {} bundles", kind, bundle.id, delivered.len());
        delivered
    }

    /// Register a service owned by `owner`. Returns the reference and the
    /// bundles that heard the REGISTERED event.
    pub fn register_service(
        &self,
        owner: BundleId,
        interfaces: &[&str],
        properties: Attributes,
    ) -> ApiResult<(ServiceReference, Vec<Bundle>)> {
        self.lookup(owner)?;
        let id = self.next_service.fetch_add(1, Ordering::Relaxed);
        let reference = ServiceReference::new(id, owner, interfaces, properties);
        self.services.write().push(reference.clone());
        let event = ServiceEvent {
            kind: ServiceEventKind::Registered,
            reference: reference.clone(),
        };
        let delivered = self.hooks.fire_service_event(&event, self.bundles());
        Ok((reference, delivered))
    }

    /// Services `context` can see.
    pub fn service_references(&self, context: BundleId) -> ApiResult<Vec<ServiceReference>> {
        let context = self.lookup(context)?;
        let all = self.services.read().clone();
        Ok(self.hooks.find_services(&context, all))
    }

    /// Bundles `context` can see.
    pub fn visible_bundles(&self, context: BundleId) -> ApiResult<Vec<Bundle>> {
        let context = self.lookup(context)?;
        Ok(self.hooks.find_bundles(&context, self.bundles()))
    }

    pub fn add_capability(&self, capability: Capability) -> ApiResult<()> {
        self.lookup(capability.owner)?;
        self.capabilities.write().push(capability);
        Ok(())
    }

    /// Capabilities that satisfy `requirement` and survive the resolver
    /// hooks.
    pub fn match_capabilities(&self, requirement: &Requirement) -> Vec<Capability> {
        let candidates = self
            .capabilities
            .read()
            .iter()
            .filter(|c| requirement.matches(c))
            .cloned()
            .collect();
        self.hooks.filter_matches(requirement, candidates)
    }

    /// The subset of `ids` that may be resolved right now.
    pub fn resolvable(&self, ids: &[BundleId]) -> Vec<BundleId> {
        let candidates = ids.iter().filter_map(|id| self.bundle(*id)).collect();
        self.hooks
            .filter_resolvable(candidates)
            .into_iter()
            .map(|b| b.id)
            .collect()
    }
}

impl BundleRuntime for InMemoryFramework {
    fn bundles(&self) -> Vec<Bundle> {
        self.bundles.read().values().cloned().collect()
    }

    fn bundle(&self, id: BundleId) -> Option<Bundle> {
        self.bundles.read().get(&id).cloned()
    }

    /// Installing a location twice returns the bundle already there.
    fn install(&self, origin: BundleId, info: &InstallInfo) -> ApiResult<Bundle> {
        let existing = self
            .bundles
            .read()
            .values()
            .find(|b| b.location == info.location)
            .cloned();
        if let Some(existing) = existing {
            return Ok(existing);
        }

        let origin = self
            .bundle(origin)
            .unwrap_or_else(|| Bundle::new(origin, "", ""));
        let bundle = Bundle {
            id: BundleId(self.next_bundle.fetch_add(1, Ordering::Relaxed)),
            symbolic_name: info.symbolic_name.clone(),
            version: info.version.clone(),
            location: info.location.clone(),
        };
        self.bundles.write().insert(bundle.id, bundle.clone());
        self.fire(BundleEventKind::Installed, &bundle, &origin);
        Ok(bundle)
    }

    fn uninstall(&self, id: BundleId) -> ApiResult<()> {
        if id.is_system() {
            return Err(ApiError::InvalidArgument(
                "the system bundle cannot be uninstalled".into(),
            ));
        }
        let bundle = self.lookup(id)?;
        self.fire(BundleEventKind::Uninstalled, &bundle, &bundle);
        self.bundles.write().shift_remove(&id);
        self.services.write().retain(|s| s.owner != id);
        self.capabilities.write().retain(|c| c.owner != id);
        Ok(())
    }

    fn start(&self, id: BundleId) -> ApiResult<()> {
        let bundle = self.lookup(id)?;
        self.fire(BundleEventKind::Started, &bundle, &bundle);
        Ok(())
    }

    fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_is_idempotent_per_location() {
        let framework = InMemoryFramework::new();
        let info = InstallInfo::new("file:a.jar", "a");
        let first = framework.install(BundleId::SYSTEM, &info).unwrap();
        let second = framework.install(BundleId::SYSTEM, &info).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(framework.bundles().len(), 2);
    }

    #[test]
    fn test_system_bundle_stays() {
        let framework = InMemoryFramework::new();
        assert!(framework.uninstall(BundleId::SYSTEM).is_err());
        assert!(matches!(
            framework.uninstall(BundleId(42)),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_without_hooks_everything_is_visible() {
        let framework = InMemoryFramework::new();
        let a = framework
            .install(BundleId::SYSTEM, &InstallInfo::new("a", "a"))
            .unwrap();
        let (_, heard) = framework
            .register_service(a.id, &["p.Api"], Attributes::new())
            .unwrap();
        assert_eq!(heard.len(), 2);
        assert_eq!(framework.service_references(BundleId::SYSTEM).unwrap().len(), 1);

        framework.uninstall(a.id).unwrap();
        assert!(framework.service_references(BundleId::SYSTEM).unwrap().is_empty());
    }
}
