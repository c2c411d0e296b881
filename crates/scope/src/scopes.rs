use crate::error::{Result, ScopeError};
use crate::persist::{ScopeRecord, ScopeStore};
use crate::scope::{Scope, ScopeId};
use aries_api::BundleId;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

pub const ROOT_NAME: &str = "root";

/// The scope tree plus the bundle → scope index.
///
/// Scope locks are never held while the index is touched, and the index is
/// never locked while a scope lock is taken.
pub struct Scopes {
    scopes: DashMap<ScopeId, Arc<Scope>>,
    root: RwLock<Arc<Scope>>,
    bundle_index: DashMap<BundleId, ScopeId>,
    /// Prefixed install location → scope the bundle is destined for.
    pending: DashMap<String, ScopeId>,
    next_id: AtomicU64,
    clock: AtomicU64,
    store: Option<ScopeStore>,
}

impl Scopes {
    pub fn new(store: Option<ScopeStore>) -> Self {
        let root = Arc::new(Scope::new(ScopeId::ROOT, ROOT_NAME, None, None));
        let scopes = DashMap::new();
        scopes.insert(ScopeId::ROOT, root.clone());
        Self {
            scopes,
            root: RwLock::new(root),
            bundle_index: DashMap::new(),
            pending: DashMap::new(),
            next_id: AtomicU64::new(1),
            clock: AtomicU64::new(0),
            store,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(None)
    }

    pub fn store(&self) -> Option<&ScopeStore> {
        self.store.as_ref()
    }

    pub fn root(&self) -> Arc<Scope> {
        self.root.read().clone()
    }

    pub fn get(&self, id: ScopeId) -> Option<Arc<Scope>> {
        self.scopes.get(&id).map(|s| s.value().clone())
    }

    pub fn require(&self, id: ScopeId) -> Result<Arc<Scope>> {
        self.get(id).ok_or(ScopeError::UnknownScope(id))
    }

    /// Every live scope, ordered by id.
    pub fn all(&self) -> Vec<Arc<Scope>> {
        let mut all: Vec<_> = self.scopes.iter().map(|s| s.value().clone()).collect();
        all.sort_by_key(|s| s.id());
        all
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn contains(&self, bundle: BundleId) -> bool {
        self.bundle_index.contains_key(&bundle)
    }

    /// Scope that owns `bundle`; root for bundles never assigned.
    pub fn scope_of(&self, bundle: BundleId) -> Arc<Scope> {
        let id = self.bundle_index.get(&bundle).map(|e| *e.value());
        id.and_then(|id| self.get(id))
            .unwrap_or_else(|| self.root())
    }

    /// Move `bundle` into `scope`, out of whatever scope held it before.
    ///
    /// The bundle's index entry stays locked until both scopes agree with
    /// it, so concurrent moves of one bundle leave it in exactly one scope.
    pub fn assign(&self, bundle: BundleId, scope: &Scope) {
        let mut entry = self.bundle_index.entry(bundle).or_insert(scope.id());
        let previous = std::mem::replace(entry.value_mut(), scope.id());
        if previous != scope.id() {
            if let Some(old) = self.get(previous) {
                old.state.write().bundles.shift_remove(&bundle);
            }
        }
        scope.state.write().bundles.insert(bundle);
        drop(entry);
        debug!("Bundle {} assigned to scope {}", bundle, scope.id());
    }

    /// Forget `bundle` entirely. Returns the scope that held it.
    pub fn remove_bundle(&self, bundle: BundleId) -> Option<ScopeId> {
        let Entry::Occupied(entry) = self.bundle_index.entry(bundle) else {
            return None;
        };
        let id = *entry.get();
        if let Some(scope) = self.get(id) {
            scope.state.write().bundles.shift_remove(&bundle);
        }
        entry.remove();
        Some(id)
    }

    pub(crate) fn register(&self, scope: Arc<Scope>) {
        self.next_id.fetch_max(scope.id().0 + 1, Ordering::AcqRel);
        self.scopes.insert(scope.id(), scope);
    }

    /// Drop `id` from the registry and from disk. Its bundles leave the index.
    pub(crate) fn remove_scope(&self, id: ScopeId) -> Option<Arc<Scope>> {
        let (_, scope) = self.scopes.remove(&id)?;
        let bundles = scope.bundles();
        for bundle in bundles {
            self.bundle_index.remove_if(&bundle, |_, owner| *owner == id);
        }
        if let Some(parent) = scope.parent().and_then(|p| self.get(p)) {
            parent.state.write().children.shift_remove(&id);
        }
        self.pending.retain(|_, target| *target != id);
        if let Some(store) = &self.store {
            if let Err(e) = store.remove(id) {
                warn!("Failed to delete persisted scope {}: {}", id, e);
            }
        }
        info!("Removed scope {} ({})", id, scope.name());
        Some(scope)
    }

    pub(crate) fn next_scope_id(&self) -> ScopeId {
        ScopeId(self.next_id.fetch_add(1, Ordering::AcqRel))
    }

    /// Global commit stamp. Every call returns a larger value.
    pub(crate) fn next_stamp(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn add_pending(&self, location: String, scope: ScopeId) {
        self.pending.insert(location, scope);
    }

    pub(crate) fn take_pending(&self, location: &str) -> Option<ScopeId> {
        self.pending.remove(location).map(|(_, id)| id)
    }

    /// Write `scope` to the store, if there is one. Failures are logged.
    pub(crate) fn persist(&self, scope: &Scope) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.write(&ScopeRecord::of(scope)) {
            warn!("Failed to persist scope {}: {}", scope.id(), e);
        }
    }

    /// Rebuild the tree from the store. Every record is checked before any
    /// scope is registered: records whose policies do not parse are skipped,
    /// and scopes with a missing parent or on a parent cycle hang off root.
    /// Bundles `exists` rejects are dropped.
    pub(crate) fn load(&self, exists: impl Fn(BundleId) -> bool) -> Result<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let mut valid = Vec::new();
        for record in store.load_all()? {
            match record.share_policies() {
                Ok(policies) => valid.push((record, policies)),
                Err(e) => warn!("Skipping persisted scope {}: {}", record.id, e),
            }
        }
        let parents = resolve_parents(valid.iter().map(|(r, _)| r));

        let mut scopes = Vec::with_capacity(valid.len());
        for (record, policies) in &valid {
            let scope = if record.id == ScopeId::ROOT {
                self.root()
            } else {
                let scope = Arc::new(Scope::new(
                    record.id,
                    record.name.clone(),
                    record.location.clone(),
                    parents.get(&record.id).copied(),
                ));
                self.register(scope.clone());
                scope
            };
            scope.state.write().policies = policies.clone();
            scopes.push(scope);
        }

        for scope in &scopes {
            if let Some(parent) = scope.parent().and_then(|p| self.get(p)) {
                parent.state.write().children.insert(scope.id());
            }
        }

        for (scope, (record, _)) in scopes.iter().zip(&valid) {
            for bundle in &record.bundles {
                if exists(*bundle) {
                    self.assign(*bundle, scope);
                } else {
                    debug!("Dropping bundle {} from scope {}: no longer installed", bundle, scope.id());
                }
            }
            let stamp = self.next_stamp();
            scope.state.write().last_update = stamp;
        }
        info!("Loaded {} persisted scopes from {}", valid.len(), store.dir().display());
        Ok(valid.len())
    }

    /// Back to a lone, empty root. The store is left alone.
    pub(crate) fn clear(&self) {
        self.scopes.clear();
        self.bundle_index.clear();
        self.pending.clear();
        let root = Arc::new(Scope::new(ScopeId::ROOT, ROOT_NAME, None, None));
        self.scopes.insert(ScopeId::ROOT, root.clone());
        *self.root.write() = root;
        self.next_id.store(1, Ordering::Release);
    }

    /// Ids of `id` and every scope below it, parents first.
    pub fn subtree(&self, id: ScopeId) -> Vec<ScopeId> {
        let mut out = vec![id];
        let mut i = 0;
        while i < out.len() {
            if let Some(scope) = self.get(out[i]) {
                out.extend(scope.children());
            }
            i += 1;
        }
        out
    }

    /// True if `ancestor` is `id` or lies on its parent chain.
    pub fn is_ancestor(&self, ancestor: ScopeId, id: ScopeId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.get(c).and_then(|s| s.parent());
        }
        false
    }
}

/// Parent of every non-root record. Parents that were not loaded, and
/// parent chains that loop back on themselves, are replaced by root.
fn resolve_parents<'a>(
    records: impl Iterator<Item = &'a ScopeRecord>,
) -> HashMap<ScopeId, ScopeId> {
    let mut parents: HashMap<ScopeId, Option<ScopeId>> = records
        .filter(|r| r.id != ScopeId::ROOT)
        .map(|r| (r.id, r.parent))
        .collect();
    let mut ids: Vec<ScopeId> = parents.keys().copied().collect();
    ids.sort();
    for id in &ids {
        let declared = parents[id];
        let known = declared.filter(|p| *p == ScopeId::ROOT || parents.contains_key(p));
        if known.is_none() {
            warn!("Scope {} names missing parent {:?}; attaching it to root", id, declared);
            parents.insert(*id, Some(ScopeId::ROOT));
        }
    }
    for id in &ids {
        let mut current = parents[id];
        for _ in 0..ids.len() {
            match current {
                Some(c) if c == *id => {
                    warn!("Scope {} is its own ancestor; attaching it to root", id);
                    parents.insert(*id, Some(ScopeId::ROOT));
                    break;
                }
                Some(c) if c != ScopeId::ROOT => current = parents.get(&c).copied().flatten(),
                _ => break,
            }
        }
    }
    parents
        .into_iter()
        .map(|(id, parent)| (id, parent.unwrap_or(ScopeId::ROOT)))
        .collect()
}

impl Default for Scopes {
    fn default() -> Self {
        Self::in_memory()
    }
}
