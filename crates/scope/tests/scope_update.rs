mod common;

use aries_api::{
    Bundle, BundleEvent, BundleEventHook, BundleRuntime, InstallInfo, ResolverHook,
};
use aries_scope::{ScopeError, ScopeId, ScopeManager, SharePolicy, scoped_location};
use common::{Fixture, PACKAGE};
use parking_lot::Mutex;
use std::sync::Arc;

#[test]
fn test_tenant_scenario() {
    let fx = Fixture::new();
    let a = fx.install("a");
    let b = fx.install("b");
    assert!(fx.manager.root_scope().contains(a));

    let mut update = fx.manager.new_update(ScopeId::ROOT).unwrap();
    update.new_child("tenant1").add_bundle(a);
    assert!(update.remove_bundle(a));
    assert!(update.commit().unwrap());

    let tenant = fx.manager.scope_of(a);
    assert_eq!(tenant.name(), "tenant1");
    assert_eq!(tenant.parent(), Some(ScopeId::ROOT));
    assert_eq!(tenant.bundles(), vec![a]);
    assert_eq!(fx.manager.scope_of(b).id(), ScopeId::ROOT);
    assert!(!fx.manager.root_scope().contains(a));
    assert_eq!(fx.manager.root_scope().children(), vec![tenant.id()]);
    // Moved, not orphaned.
    assert!(fx.framework.bundle(a).is_some());
}

#[test]
fn test_stale_update_is_rejected() {
    let fx = Fixture::new();
    let a = fx.install("a");
    let mut first = fx.manager.new_update(ScopeId::ROOT).unwrap();
    let mut second = fx.manager.new_update(ScopeId::ROOT).unwrap();

    first.new_child("x");
    assert!(first.commit().unwrap());
    let stamp = fx.manager.root_scope().last_update();

    second.new_child("y").add_bundle(a);
    second.remove_bundle(a);
    assert!(!second.commit().unwrap());

    let root = fx.manager.root_scope();
    assert_eq!(root.last_update(), stamp);
    assert_eq!(root.children().len(), 1);
    assert!(root.contains(a));
    assert!(fx.framework.bundle(a).is_some());
    assert_eq!(fx.manager.scopes().len(), 2);

    // Committed updates do not apply twice.
    assert!(!first.commit().unwrap());
}

#[test]
fn test_stale_descendant_rejects_whole_update() {
    let fx = Fixture::new();
    let tenant = fx.create_scope(ScopeId::ROOT, "tenant", &[], Vec::new());
    let mut outer = fx.manager.new_update(ScopeId::ROOT).unwrap();

    let mut inner = fx.manager.new_update(tenant).unwrap();
    inner.add_share_policy(SharePolicy::export(PACKAGE, "(osgi.wiring.package=*)").unwrap());
    assert!(inner.commit().unwrap());

    outer.new_child("late");
    assert!(!outer.commit().unwrap());
    assert_eq!(fx.manager.root_scope().children(), vec![tenant]);
}

#[test]
fn test_stale_child_leaves_parent_untouched() {
    let fx = Fixture::new();
    let a = fx.install("a");
    let tenant = fx.create_scope(ScopeId::ROOT, "tenant", &[], Vec::new());
    let root_stamp = fx.manager.root_scope().last_update();

    let mut outer = fx.manager.new_update(ScopeId::ROOT).unwrap();
    outer.add_share_policy(SharePolicy::export(PACKAGE, "(osgi.wiring.package=*)").unwrap());
    assert!(outer.remove_bundle(a));
    outer.child_mut("tenant").unwrap().add_bundle(a);

    let mut inner = fx.manager.new_update(tenant).unwrap();
    inner.add_share_policy(SharePolicy::import(PACKAGE, "(osgi.wiring.package=*)").unwrap());
    assert!(inner.commit().unwrap());

    assert!(!outer.commit().unwrap());
    let root = fx.manager.root_scope();
    assert_eq!(root.last_update(), root_stamp);
    assert!(root.share_policies().is_empty());
    assert!(root.contains(a));
    assert!(!fx.manager.scope(tenant).unwrap().contains(a));
    assert!(fx.framework.bundle(a).is_some());
}

/// Records, for every bundle event, whether `watched` was mid-commit.
struct TreeWatcher {
    manager: Arc<ScopeManager>,
    watched: ScopeId,
    seen: Mutex<Vec<bool>>,
}

impl BundleEventHook for TreeWatcher {
    fn bundle_event(&self, _event: &BundleEvent, listeners: Vec<Bundle>) -> Vec<Bundle> {
        let updating = self
            .manager
            .scope(self.watched)
            .is_some_and(|s| s.is_updating());
        self.seen.lock().push(updating);
        listeners
    }
}

#[test]
fn test_children_are_locked_before_parent_changes_apply() {
    let fx = Fixture::new();
    let tenant = fx.create_scope(ScopeId::ROOT, "tenant", &[], Vec::new());
    let watcher = Arc::new(TreeWatcher {
        manager: fx.manager.clone(),
        watched: tenant,
        seen: Mutex::new(Vec::new()),
    });
    fx.framework.hooks().register_bundle_event_hook(watcher.clone());

    let mut update = fx.manager.new_update(ScopeId::ROOT).unwrap();
    update.install(InstallInfo::new("file:early.jar", "early"));
    update
        .child_mut("tenant")
        .unwrap()
        .add_share_policy(SharePolicy::export(PACKAGE, "(osgi.wiring.package=*)").unwrap());
    assert!(update.commit().unwrap());

    let seen = watcher.seen.lock().clone();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|updating| *updating));
    assert!(!fx.manager.scope(tenant).unwrap().is_updating());
}

#[test]
fn test_last_update_increases() {
    let fx = Fixture::new();
    let before = fx.manager.root_scope().last_update();
    fx.create_scope(ScopeId::ROOT, "one", &[], Vec::new());
    let middle = fx.manager.root_scope().last_update();
    fx.create_scope(ScopeId::ROOT, "two", &[], Vec::new());
    assert!(before < middle);
    assert!(middle < fx.manager.root_scope().last_update());
}

#[test]
fn test_child_update_cannot_commit_alone() {
    let fx = Fixture::new();
    let mut update = fx.manager.new_update(ScopeId::ROOT).unwrap();
    let err = update.new_child("c").commit().unwrap_err();
    assert!(matches!(err, ScopeError::NotTopLevel));
}

#[test]
fn test_unknown_scope() {
    let fx = Fixture::new();
    assert!(matches!(
        fx.manager.new_update(ScopeId(99)),
        Err(ScopeError::UnknownScope(ScopeId(99)))
    ));
}

#[test]
fn test_removed_bundle_without_new_home_is_uninstalled() {
    let fx = Fixture::new();
    let a = fx.install("a");
    let mut update = fx.manager.new_update(ScopeId::ROOT).unwrap();
    update.remove_bundle(a);
    assert!(update.commit().unwrap());

    assert!(fx.framework.bundle(a).is_none());
    assert!(!fx.manager.scopes().contains(a));
}

#[test]
fn test_queued_install_lands_in_scope() {
    let fx = Fixture::new();
    let tenant = fx.create_scope(ScopeId::ROOT, "tenant", &[], Vec::new());

    let mut update = fx.manager.new_update(tenant).unwrap();
    update.install(InstallInfo::new("file:app.jar", "app"));
    assert_eq!(update.bundles_to_install().len(), 1);
    assert!(update.commit().unwrap());

    let location = scoped_location(tenant, "file:app.jar");
    assert_eq!(location, format!("scope-{tenant}: file:app.jar"));
    let app = fx
        .framework
        .bundles()
        .into_iter()
        .find(|b| b.location == location)
        .unwrap();
    assert_eq!(fx.manager.scope_of(app.id).id(), tenant);

    // Installing the same location again replaces the bundle.
    let mut update = fx.manager.new_update(tenant).unwrap();
    update.install(InstallInfo::new("file:app.jar", "app"));
    assert!(update.commit().unwrap());
    let replacement = fx
        .framework
        .bundles()
        .into_iter()
        .find(|b| b.location == location)
        .unwrap();
    assert_ne!(replacement.id, app.id);
    assert!(fx.framework.bundle(app.id).is_none());
    assert_eq!(fx.manager.scope(tenant).unwrap().bundles(), vec![replacement.id]);
}

#[test]
fn test_removing_child_uninstalls_its_subtree() {
    let fx = Fixture::new();
    let a = fx.install("a");
    let d = fx.install("d");
    let keep = fx.install("keep");
    let tenant = fx.create_scope(ScopeId::ROOT, "tenant", &[a], Vec::new());
    let nested = fx.create_scope(tenant, "nested", &[d], Vec::new());

    let mut update = fx.manager.new_update(ScopeId::ROOT).unwrap();
    assert!(update.remove_child("tenant"));
    assert!(!update.remove_child("tenant"));
    assert!(update.commit().unwrap());

    assert!(fx.framework.bundle(a).is_none());
    assert!(fx.framework.bundle(d).is_none());
    assert!(fx.framework.bundle(keep).is_some());
    assert!(fx.manager.scope(tenant).is_none());
    assert!(fx.manager.scope(nested).is_none());
    assert!(fx.manager.root_scope().children().is_empty());
}

#[test]
fn test_adopt_moves_subtree_and_rejects_cycles() {
    let fx = Fixture::new();
    let a = fx.install("a");
    let left = fx.create_scope(ScopeId::ROOT, "left", &[a], Vec::new());
    let right = fx.create_scope(ScopeId::ROOT, "right", &[], Vec::new());
    let below = fx.create_scope(left, "below", &[], Vec::new());

    let mut update = fx.manager.new_update(left).unwrap();
    assert!(matches!(
        update.child_mut("below").unwrap().adopt(left),
        Err(ScopeError::Cycle { .. })
    ));
    assert!(matches!(
        update.adopt(ScopeId::ROOT),
        Err(ScopeError::Cycle { .. })
    ));

    let mut update = fx.manager.new_update(ScopeId::ROOT).unwrap();
    update.child_mut("right").unwrap().adopt(left).unwrap();
    assert!(update.commit().unwrap());

    let moved = fx.manager.scope(left).unwrap();
    assert_eq!(moved.parent(), Some(right));
    assert_eq!(moved.bundles(), vec![a]);
    assert_eq!(moved.children(), vec![below]);
    assert_eq!(fx.manager.root_scope().children(), vec![right]);
    assert_eq!(fx.manager.scope(right).unwrap().children(), vec![left]);
}

/// Records whether the installed bundle's scope was mid-commit and whether
/// the resolver hook would let it resolve.
struct CommitObserver {
    manager: Arc<ScopeManager>,
    seen: Mutex<Vec<(bool, usize)>>,
}

impl BundleEventHook for CommitObserver {
    fn bundle_event(&self, event: &BundleEvent, listeners: Vec<Bundle>) -> Vec<Bundle> {
        let updating = self.manager.scope_of(event.bundle.id).is_updating();
        let resolvable = self.manager.filter_resolvable(vec![event.bundle.clone()]).len();
        self.seen.lock().push((updating, resolvable));
        listeners
    }
}

#[test]
fn test_scope_is_unresolvable_while_committing() {
    let fx = Fixture::new();
    let tenant = fx.create_scope(ScopeId::ROOT, "tenant", &[], Vec::new());
    let observer = Arc::new(CommitObserver {
        manager: fx.manager.clone(),
        seen: Mutex::new(Vec::new()),
    });
    fx.framework.hooks().register_bundle_event_hook(observer.clone());

    let mut update = fx.manager.new_update(tenant).unwrap();
    update.install(InstallInfo::new("file:late.jar", "late"));
    assert!(update.commit().unwrap());
    assert_eq!(*observer.seen.lock(), vec![(true, 0usize)]);

    let late = fx.manager.scope(tenant).unwrap().bundles()[0];
    assert!(!fx.manager.scope(tenant).unwrap().is_updating());
    assert_eq!(fx.framework.resolvable(&[late]), vec![late]);
}
