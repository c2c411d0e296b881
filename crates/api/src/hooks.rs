//! Framework hook traits.
//!
//! Every hook receives the candidates the framework is about to act on and
//! returns the ones it keeps. Hooks never see each other's output directly;
//! [`HookRegistry`] threads the candidates through each registered hook in
//! registration order.

use crate::models::{Bundle, BundleEvent, Capability, Requirement, ServiceEvent, ServiceReference};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub trait BundleEventHook: Send + Sync {
    /// Decide which bundles get to hear about `event`.
    fn bundle_event(&self, event: &BundleEvent, listeners: Vec<Bundle>) -> Vec<Bundle>;
}

pub trait ServiceEventHook: Send + Sync {
    fn service_event(&self, event: &ServiceEvent, listeners: Vec<Bundle>) -> Vec<Bundle>;
}

pub trait BundleFindHook: Send + Sync {
    /// Bundles visible to `context` when it enumerates the framework.
    fn find_bundles(&self, context: &Bundle, bundles: Vec<Bundle>) -> Vec<Bundle>;
}

pub trait ServiceFindHook: Send + Sync {
    fn find_services(
        &self,
        context: &Bundle,
        references: Vec<ServiceReference>,
    ) -> Vec<ServiceReference>;
}

pub trait ResolverHook: Send + Sync {
    /// Bundles that may take part in the current resolve operation.
    fn filter_resolvable(&self, candidates: Vec<Bundle>) -> Vec<Bundle>;

    /// Singletons that `singleton` collides with.
    fn filter_singleton_collisions(
        &self,
        singleton: &Capability,
        candidates: Vec<Capability>,
    ) -> Vec<Capability>;

    /// Capabilities that may satisfy `requirement`.
    fn filter_matches(
        &self,
        requirement: &Requirement,
        candidates: Vec<Capability>,
    ) -> Vec<Capability>;
}

/// Everything a scope-style isolation layer has to intercept.
pub trait FrameworkHooks:
    BundleEventHook + ServiceEventHook + BundleFindHook + ServiceFindHook + ResolverHook
{
}

impl<T> FrameworkHooks for T where
    T: BundleEventHook + ServiceEventHook + BundleFindHook + ServiceFindHook + ResolverHook
{
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HookId(u64);

/// Ordered list of hooks of one kind.
pub struct HookList<T: ?Sized> {
    entries: RwLock<Vec<(HookId, Arc<T>)>>,
}

impl<T: ?Sized> Default for HookList<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> HookList<T> {
    fn push(&self, id: HookId, hook: Arc<T>) {
        self.entries.write().push((id, hook));
    }

    fn remove(&self, id: HookId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(hid, _)| *hid != id);
        entries.len() != before
    }

    /// Copy of the current hooks, so callbacks run without the list locked
    /// and may register or unregister hooks themselves.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries.read().iter().map(|(_, h)| h.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// The framework's hook-invocation layer.
#[derive(Default)]
pub struct HookRegistry {
    next_id: AtomicU64,
    pub bundle_event: HookList<dyn BundleEventHook>,
    pub service_event: HookList<dyn ServiceEventHook>,
    pub bundle_find: HookList<dyn BundleFindHook>,
    pub service_find: HookList<dyn ServiceFindHook>,
    pub resolver: HookList<dyn ResolverHook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> HookId {
        HookId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers `hook` for every hook kind under a single id.
    pub fn register<H: FrameworkHooks + 'static>(&self, hook: Arc<H>) -> HookId {
        let id = self.next_id();
        self.bundle_event.push(id, hook.clone());
        self.service_event.push(id, hook.clone());
        self.bundle_find.push(id, hook.clone());
        self.service_find.push(id, hook.clone());
        self.resolver.push(id, hook);
        id
    }

    pub fn register_resolver_hook(&self, hook: Arc<dyn ResolverHook>) -> HookId {
        let id = self.next_id();
        self.resolver.push(id, hook);
        id
    }

    pub fn register_bundle_event_hook(&self, hook: Arc<dyn BundleEventHook>) -> HookId {
        let id = self.next_id();
        self.bundle_event.push(id, hook);
        id
    }

    /// Removes every hook registered under `id`. Returns false if none was.
    pub fn unregister(&self, id: HookId) -> bool {
        let mut removed = self.bundle_event.remove(id);
        removed |= self.service_event.remove(id);
        removed |= self.bundle_find.remove(id);
        removed |= self.service_find.remove(id);
        removed |= self.resolver.remove(id);
        removed
    }

    pub fn fire_bundle_event(&self, event: &BundleEvent, listeners: Vec<Bundle>) -> Vec<Bundle> {
        self.bundle_event
            .snapshot()
            .into_iter()
            .fold(listeners, |acc, hook| hook.bundle_event(event, acc))
    }

    pub fn fire_service_event(&self, event: &ServiceEvent, listeners: Vec<Bundle>) -> Vec<Bundle> {
        self.service_event
            .snapshot()
            .into_iter()
            .fold(listeners, |acc, hook| hook.service_event(event, acc))
    }

    pub fn find_bundles(&self, context: &Bundle, bundles: Vec<Bundle>) -> Vec<Bundle> {
        self.bundle_find
            .snapshot()
            .into_iter()
            .fold(bundles, |acc, hook| hook.find_bundles(context, acc))
    }

    pub fn find_services(
        &self,
        context: &Bundle,
        references: Vec<ServiceReference>,
    ) -> Vec<ServiceReference> {
        self.service_find
            .snapshot()
            .into_iter()
            .fold(references, |acc, hook| hook.find_services(context, acc))
    }

    pub fn filter_resolvable(&self, candidates: Vec<Bundle>) -> Vec<Bundle> {
        self.resolver
            .snapshot()
            .into_iter()
            .fold(candidates, |acc, hook| hook.filter_resolvable(acc))
    }

    pub fn filter_singleton_collisions(
        &self,
        singleton: &Capability,
        candidates: Vec<Capability>,
    ) -> Vec<Capability> {
        self.resolver
            .snapshot()
            .into_iter()
            .fold(candidates, |acc, hook| {
                hook.filter_singleton_collisions(singleton, acc)
            })
    }

    pub fn filter_matches(
        &self,
        requirement: &Requirement,
        candidates: Vec<Capability>,
    ) -> Vec<Capability> {
        self.resolver
            .snapshot()
            .into_iter()
            .fold(candidates, |acc, hook| hook.filter_matches(requirement, acc))
    }
}
