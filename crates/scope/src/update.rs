//! Staged changes to a scope subtree.
//!
//! A [`ScopeUpdate`] copies a scope and all of its descendants. Changes are
//! made to the copy and applied by [`ScopeUpdate::commit`], which first
//! checks that nothing committed to the scope since the copy was taken.

use crate::error::{Result, ScopeError};
use crate::policy::{PolicyType, SharePolicies, SharePolicy};
use crate::scope::{Scope, ScopeId};
use crate::scopes::Scopes;
use aries_api::{BundleId, BundleRuntime, InstallInfo};
use indexmap::IndexSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Prefix that marks a location as installed into scope `id`.
pub fn scoped_location(id: ScopeId, location: &str) -> String {
    format!("scope-{id}: {location}")
}

pub(crate) struct UpdateContext {
    pub(crate) scopes: Arc<Scopes>,
    pub(crate) runtime: Arc<dyn BundleRuntime>,
    pub(crate) manager_bundle: BundleId,
}

pub struct ScopeUpdate {
    ctx: Arc<UpdateContext>,
    scope_id: ScopeId,
    name: String,
    location: Option<String>,
    parent: Option<ScopeId>,
    is_new: bool,
    /// Parent the scope had before it was adopted into this update.
    adopted_from: Option<ScopeId>,
    snapshot: IndexSet<BundleId>,
    bundles: IndexSet<BundleId>,
    policies: SharePolicies,
    children: Vec<ScopeUpdate>,
    removed_children: Vec<ScopeId>,
    installs: Vec<InstallInfo>,
    base_update: u64,
    top_level: bool,
    committed: bool,
}

impl ScopeUpdate {
    pub(crate) fn new(ctx: Arc<UpdateContext>, scope: &Scope) -> Self {
        Self::of(ctx, scope, true)
    }

    fn of(ctx: Arc<UpdateContext>, scope: &Scope, top_level: bool) -> Self {
        let (bundles, policies, child_ids, base_update) = {
            let state = scope.state.read();
            (
                state.bundles.clone(),
                state.policies.clone(),
                state.children.clone(),
                state.last_update,
            )
        };
        let children = child_ids
            .into_iter()
            .filter_map(|id| ctx.scopes.get(id))
            .map(|child| Self::of(ctx.clone(), &child, false))
            .collect();
        Self {
            scope_id: scope.id(),
            name: scope.name().to_string(),
            location: scope.location().map(str::to_string),
            parent: scope.parent(),
            is_new: false,
            adopted_from: None,
            snapshot: bundles.clone(),
            bundles,
            policies,
            children,
            removed_children: Vec::new(),
            installs: Vec::new(),
            base_update,
            top_level,
            committed: false,
            ctx,
        }
    }

    fn fresh(ctx: Arc<UpdateContext>, name: String, location: Option<String>, parent: ScopeId) -> Self {
        let scope_id = ctx.scopes.next_scope_id();
        Self {
            scope_id,
            name,
            location,
            parent: Some(parent),
            is_new: true,
            adopted_from: None,
            snapshot: IndexSet::new(),
            bundles: IndexSet::new(),
            policies: SharePolicies::new(),
            children: Vec::new(),
            removed_children: Vec::new(),
            installs: Vec::new(),
            base_update: 0,
            top_level: false,
            committed: false,
            ctx,
        }
    }

    pub fn scope_id(&self) -> ScopeId {
        self.scope_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// True for scopes this update creates.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn bundles(&self) -> impl Iterator<Item = BundleId> + '_ {
        self.bundles.iter().copied()
    }

    pub fn contains(&self, bundle: BundleId) -> bool {
        self.bundles.contains(&bundle)
    }

    pub fn add_bundle(&mut self, bundle: BundleId) -> bool {
        self.bundles.insert(bundle)
    }

    /// A bundle removed here and added nowhere else in the update is
    /// uninstalled on commit.
    pub fn remove_bundle(&mut self, bundle: BundleId) -> bool {
        self.bundles.shift_remove(&bundle)
    }

    /// Queue `info` for installation into this scope on commit.
    pub fn install(&mut self, info: InstallInfo) {
        self.installs.push(info);
    }

    pub fn bundles_to_install(&self) -> &[InstallInfo] {
        &self.installs
    }

    pub fn share_policies(&self, policy_type: PolicyType) -> impl Iterator<Item = &SharePolicy> {
        self.policies.iter(policy_type)
    }

    pub fn add_share_policy(&mut self, policy: SharePolicy) {
        self.policies.add(policy);
    }

    pub fn remove_share_policies(&mut self, policy_type: PolicyType, namespace: &str) -> Vec<SharePolicy> {
        self.policies.remove(policy_type, namespace)
    }

    pub fn children(&self) -> &[ScopeUpdate] {
        &self.children
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut ScopeUpdate> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    pub fn new_child(&mut self, name: impl Into<String>) -> &mut ScopeUpdate {
        self.push_child(name.into(), None)
    }

    pub fn new_child_with_location(
        &mut self,
        name: impl Into<String>,
        location: impl Into<String>,
    ) -> &mut ScopeUpdate {
        self.push_child(name.into(), Some(location.into()))
    }

    fn push_child(&mut self, name: String, location: Option<String>) -> &mut ScopeUpdate {
        let child = Self::fresh(self.ctx.clone(), name, location, self.scope_id);
        debug!("Staged new scope {} ({}) under {}", child.scope_id, child.name, self.scope_id);
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Drop the child named `name`. An existing child scope is deleted on
    /// commit, and every bundle in its subtree is uninstalled.
    pub fn remove_child(&mut self, name: &str) -> bool {
        let Some(pos) = self.children.iter().position(|c| c.name == name) else {
            return false;
        };
        let child = self.children.remove(pos);
        if !child.is_new && child.adopted_from.is_none() {
            self.removed_children.push(child.scope_id);
        }
        true
    }

    /// Move the existing scope `id` and its subtree under this one.
    pub fn adopt(&mut self, id: ScopeId) -> Result<&mut ScopeUpdate> {
        let scope = self.ctx.scopes.require(id)?;
        let scopes = &self.ctx.scopes;
        let anchor = if self.is_new { self.parent } else { Some(self.scope_id) };
        if id == self.scope_id || anchor.is_some_and(|a| scopes.is_ancestor(id, a)) {
            return Err(ScopeError::Cycle {
                child: id,
                parent: self.scope_id,
            });
        }
        if let Some(pos) = self.children.iter().position(|c| c.scope_id == id) {
            return Ok(&mut self.children[pos]);
        }
        let mut child = Self::of(self.ctx.clone(), &scope, false);
        child.adopted_from = scope.parent();
        child.parent = Some(self.scope_id);
        self.children.push(child);
        let last = self.children.len() - 1;
        Ok(&mut self.children[last])
    }

    /// Apply the update. `Ok(false)` means a scope in the subtree changed
    /// since this update was taken; nothing is modified then. Every live
    /// scope of the subtree is locked, in id order, and checked before the
    /// first change is applied.
    pub fn commit(&mut self) -> Result<bool> {
        if !self.top_level {
            return Err(ScopeError::NotTopLevel);
        }
        if self.committed {
            return Ok(false);
        }
        let Some(live) = self.live_scopes() else {
            info!("Update of scope {} ({}) is stale", self.scope_id, self.name);
            return Ok(false);
        };
        let guards: Vec<_> = live.iter().map(|scope| scope.begin_update()).collect();
        if !self.is_current() {
            info!("Update of scope {} ({}) is stale", self.scope_id, self.name);
            return Ok(false);
        }
        let mut moved = Vec::new();
        self.collect_adopted(&mut moved);
        let mut removed = Vec::new();
        let applied = self.apply(&mut removed, &moved);
        drop(guards);
        applied?;
        self.committed = true;

        // A removed bundle that no scope picked up would belong nowhere.
        for (bundle, from) in removed {
            if self.ctx.scopes.scope_of(bundle).id() != from {
                continue;
            }
            warn!("Bundle {} was removed from scope {} without a new home; uninstalling", bundle, from);
            if let Err(e) = self.ctx.runtime.uninstall(bundle) {
                warn!("Failed to uninstall orphaned bundle {}: {}", bundle, e);
            }
            self.ctx.scopes.remove_bundle(bundle);
        }
        Ok(true)
    }

    /// Existing scopes the update touches, by id, or `None` if one is gone.
    fn live_scopes(&self) -> Option<Vec<Arc<Scope>>> {
        let mut ids = Vec::new();
        self.collect_existing(&mut ids);
        ids.sort();
        ids.dedup();
        ids.into_iter().map(|id| self.ctx.scopes.get(id)).collect()
    }

    fn collect_existing(&self, out: &mut Vec<ScopeId>) {
        if !self.is_new {
            out.push(self.scope_id);
        }
        for child in &self.children {
            child.collect_existing(out);
        }
    }

    fn is_current(&self) -> bool {
        if !self.is_new {
            let live = self.ctx.scopes.get(self.scope_id);
            if live.is_none_or(|s| s.last_update() != self.base_update) {
                return false;
            }
        }
        self.children.iter().all(ScopeUpdate::is_current)
    }

    fn collect_adopted(&self, out: &mut Vec<ScopeId>) {
        for child in &self.children {
            if child.adopted_from.is_some() {
                out.push(child.scope_id);
            }
            child.collect_adopted(out);
        }
    }

    /// `moved` holds scopes adopted somewhere in the update; their copies at
    /// the old position are skipped. Existing scopes are already locked by
    /// `commit`.
    fn apply(&mut self, removed: &mut Vec<(BundleId, ScopeId)>, moved: &[ScopeId]) -> Result<()> {
        let scopes = self.ctx.scopes.clone();
        let scope = if self.is_new {
            let scope = Arc::new(Scope::new(
                self.scope_id,
                self.name.clone(),
                self.location.clone(),
                self.parent,
            ));
            scopes.register(scope.clone());
            if let Some(parent) = self.parent.and_then(|p| scopes.get(p)) {
                parent.state.write().children.insert(self.scope_id);
            }
            info!("Created scope {} ({})", self.scope_id, self.name);
            scope
        } else {
            scopes.require(self.scope_id)?
        };

        let _guard = self.is_new.then(|| scope.begin_update());

        for bundle in self.bundles.difference(&self.snapshot) {
            scopes.assign(*bundle, &scope);
        }
        removed.extend(
            self.snapshot
                .difference(&self.bundles)
                .map(|bundle| (*bundle, self.scope_id)),
        );
        scope.state.write().policies = self.policies.clone();

        for info in std::mem::take(&mut self.installs) {
            self.install_now(info)?;
        }

        for child in &mut self.children {
            if child.adopted_from.is_none() && moved.contains(&child.scope_id) {
                continue;
            }
            if let Some(from) = child.adopted_from.filter(|from| *from != self.scope_id) {
                if scopes.is_ancestor(child.scope_id, self.scope_id) {
                    return Err(ScopeError::Cycle {
                        child: child.scope_id,
                        parent: self.scope_id,
                    });
                }
                let adopted = scopes.require(child.scope_id)?;
                if let Some(old) = scopes.get(from) {
                    old.state.write().children.shift_remove(&child.scope_id);
                }
                adopted.set_parent(Some(self.scope_id));
                scope.state.write().children.insert(child.scope_id);
                info!("Moved scope {} from {} to {}", child.scope_id, from, self.scope_id);
            }
            child.apply(removed, moved)?;
        }

        for id in std::mem::take(&mut self.removed_children) {
            self.delete_subtree(id);
        }

        let stamp = scopes.next_stamp();
        scope.state.write().last_update = stamp;
        scopes.persist(&scope);
        self.base_update = stamp;
        self.snapshot = self.bundles.clone();
        self.is_new = false;
        info!(
            "Committed scope {} ({}): {} bundles, {} policies",
            self.scope_id,
            self.name,
            self.bundles.len(),
            self.policies.len()
        );
        Ok(())
    }

    fn install_now(&self, info: InstallInfo) -> Result<()> {
        let location = scoped_location(self.scope_id, &info.location);
        let runtime = &self.ctx.runtime;
        for existing in runtime.bundles().into_iter().filter(|b| b.location == location) {
            debug!("Replacing bundle {} at {}", existing.id, location);
            runtime.uninstall(existing.id)?;
            self.ctx.scopes.remove_bundle(existing.id);
        }

        self.ctx.scopes.add_pending(location.clone(), self.scope_id);
        let info = InstallInfo { location, ..info };
        match runtime.install(self.ctx.manager_bundle, &info) {
            Ok(bundle) => {
                // Without a hook in place nothing consumed the pending entry.
                if self.ctx.scopes.take_pending(&info.location).is_some() {
                    if let Some(scope) = self.ctx.scopes.get(self.scope_id) {
                        self.ctx.scopes.assign(bundle.id, &scope);
                    }
                }
                info!("Installed {} as bundle {} into scope {}", info.location, bundle.id, self.scope_id);
                Ok(())
            }
            Err(e) => {
                self.ctx.scopes.take_pending(&info.location);
                Err(e.into())
            }
        }
    }

    fn delete_subtree(&self, id: ScopeId) {
        let scopes = &self.ctx.scopes;
        let subtree = scopes.subtree(id);
        for scope in subtree.iter().filter_map(|s| scopes.get(*s)) {
            for bundle in scope.bundles() {
                if let Err(e) = self.ctx.runtime.uninstall(bundle) {
                    warn!("Failed to uninstall bundle {} of removed scope {}: {}", bundle, scope.id(), e);
                }
                scopes.remove_bundle(bundle);
            }
        }
        for scope in subtree.into_iter().rev() {
            scopes.remove_scope(scope);
        }
    }
}

impl std::fmt::Debug for ScopeUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeUpdate")
            .field("scope_id", &self.scope_id)
            .field("name", &self.name)
            .field("is_new", &self.is_new)
            .field("bundles", &self.bundles)
            .field("children", &self.children)
            .finish()
    }
}
