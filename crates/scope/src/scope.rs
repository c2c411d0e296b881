use crate::policy::{PolicyType, SharePolicies, SharePolicy};
use aries_api::{Attributes, BundleId};
use indexmap::IndexSet;
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u64);

impl ScopeId {
    /// Owner of every bundle that was not placed anywhere else.
    pub const ROOT: ScopeId = ScopeId(0);
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
pub(crate) struct ScopeState {
    pub(crate) bundles: IndexSet<BundleId>,
    pub(crate) children: IndexSet<ScopeId>,
    pub(crate) policies: SharePolicies,
    pub(crate) last_update: u64,
}

/// A live node of the scope tree. Only the registry and committing updates
/// change it.
#[derive(Debug)]
pub struct Scope {
    id: ScopeId,
    name: String,
    location: Option<String>,
    parent: RwLock<Option<ScopeId>>,
    pub(crate) state: RwLock<ScopeState>,
    updating: AtomicBool,
    commit_lock: Mutex<()>,
}

impl Scope {
    pub(crate) fn new(
        id: ScopeId,
        name: impl Into<String>,
        location: Option<String>,
        parent: Option<ScopeId>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            location,
            parent: RwLock::new(parent),
            state: RwLock::new(ScopeState::default()),
            updating: AtomicBool::new(false),
            commit_lock: Mutex::new(()),
        }
    }

    pub fn id(&self) -> ScopeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn parent(&self) -> Option<ScopeId> {
        *self.parent.read()
    }

    pub(crate) fn set_parent(&self, parent: Option<ScopeId>) {
        *self.parent.write() = parent;
    }

    pub fn bundles(&self) -> Vec<BundleId> {
        self.state.read().bundles.iter().copied().collect()
    }

    pub fn contains(&self, bundle: BundleId) -> bool {
        self.state.read().bundles.contains(&bundle)
    }

    pub fn children(&self) -> Vec<ScopeId> {
        self.state.read().children.iter().copied().collect()
    }

    pub fn share_policies(&self) -> SharePolicies {
        self.state.read().policies.clone()
    }

    pub fn matches_policy(&self, policy_type: PolicyType, namespace: &str, attributes: &Attributes) -> bool {
        self.state
            .read()
            .policies
            .matches(policy_type, namespace, attributes)
    }

    /// Stamp of the last committed update; strictly increasing.
    pub fn last_update(&self) -> u64 {
        self.state.read().last_update
    }

    /// True while an update of this scope is being committed.
    pub fn is_updating(&self) -> bool {
        self.updating.load(Ordering::Acquire)
    }

    /// Serialises commits on this scope and raises the updating flag until
    /// the guard is dropped.
    pub(crate) fn begin_update(&self) -> UpdateGuard<'_> {
        let lock = self.commit_lock.lock();
        self.updating.store(true, Ordering::Release);
        UpdateGuard {
            scope: self,
            _lock: lock,
        }
    }

    pub fn snapshot(&self) -> ScopeSnapshot {
        let state = self.state.read();
        let policies = |t: PolicyType| {
            state
                .policies
                .iter(t)
                .map(PolicySnapshot::from)
                .collect::<Vec<_>>()
        };
        ScopeSnapshot {
            id: self.id,
            name: self.name.clone(),
            location: self.location.clone(),
            parent: self.parent(),
            bundles: state.bundles.iter().copied().collect(),
            children: state.children.iter().copied().collect(),
            exports: policies(PolicyType::Export),
            imports: policies(PolicyType::Import),
            last_update: state.last_update,
        }
    }
}

pub(crate) struct UpdateGuard<'a> {
    scope: &'a Scope,
    _lock: MutexGuard<'a, ()>,
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.scope.updating.store(false, Ordering::Release);
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PolicySnapshot {
    pub namespace: String,
    pub filter: String,
}

impl From<&SharePolicy> for PolicySnapshot {
    fn from(policy: &SharePolicy) -> Self {
        Self {
            namespace: policy.namespace().to_string(),
            filter: policy.filter_source().to_string(),
        }
    }
}

/// Point-in-time copy of a scope, for display.
#[derive(Serialize, Debug, Clone)]
pub struct ScopeSnapshot {
    pub id: ScopeId,
    pub name: String,
    pub location: Option<String>,
    pub parent: Option<ScopeId>,
    pub bundles: Vec<BundleId>,
    pub children: Vec<ScopeId>,
    pub exports: Vec<PolicySnapshot>,
    pub imports: Vec<PolicySnapshot>,
    pub last_update: u64,
}
