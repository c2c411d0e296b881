mod common;

use aries_api::{
    Bundle, BundleEventKind, BundleId, BundleRuntime, Capability, Filter, Requirement, attrs,
};
use aries_scope::{SERVICE_NAMESPACE, ScopeId, SharePolicy};
use common::{Fixture, PACKAGE, ids};

fn package(owner: BundleId, name: &str) -> Capability {
    Capability::new(PACKAGE, owner, attrs! { PACKAGE => name })
}

fn import(owner: BundleId, name: &str) -> Requirement {
    let filter = Filter::parse(&format!("({PACKAGE}={name})")).unwrap();
    Requirement::new(PACKAGE, owner, Some(filter))
}

#[test]
fn test_same_scope_always_visible() {
    let fx = Fixture::new();
    let a = fx.install("a");
    let b = fx.install("b");
    fx.create_scope(ScopeId::ROOT, "s", &[a, b], Vec::new());

    fx.framework.add_capability(package(b, "org.b")).unwrap();
    let matched = fx.framework.match_capabilities(&import(a, "org.b"));
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].owner, b);
}

#[test]
fn test_siblings_without_policies_are_isolated() {
    let fx = Fixture::new();
    let a = fx.install("a");
    let b = fx.install("b");
    fx.create_scope(ScopeId::ROOT, "s1", &[a], Vec::new());
    fx.create_scope(ScopeId::ROOT, "s2", &[b], Vec::new());

    fx.framework.add_capability(package(b, "org.b")).unwrap();
    assert!(fx.framework.match_capabilities(&import(a, "org.b")).is_empty());
    // Root exports nothing either way.
    let r = fx.install("r");
    assert!(fx.framework.match_capabilities(&import(r, "org.b")).is_empty());
}

#[test]
fn test_export_import_bridge() {
    let fx = Fixture::new();
    let p = fx.install("p");
    let c = fx.install("c");
    let shared = format!("({PACKAGE}=org.shared)");

    let parent = fx.create_scope(
        ScopeId::ROOT,
        "parent",
        &[p],
        vec![SharePolicy::export(PACKAGE, &shared).unwrap()],
    );
    let child = fx.create_scope(
        parent,
        "child",
        &[c],
        vec![SharePolicy::import(PACKAGE, &shared).unwrap()],
    );

    fx.framework.add_capability(package(p, "org.shared")).unwrap();
    fx.framework.add_capability(package(c, "org.shared")).unwrap();
    fx.framework.add_capability(package(p, "org.private")).unwrap();

    let seen_by_child = fx.framework.match_capabilities(&import(c, "org.shared"));
    assert_eq!(ids(&seen_by_child, |cap| cap.owner), vec![p, c]);
    assert!(fx.framework.match_capabilities(&import(c, "org.private")).is_empty());

    // The parent does not see into the child until the child exports.
    let seen_by_parent = fx.framework.match_capabilities(&import(p, "org.shared"));
    assert_eq!(ids(&seen_by_parent, |cap| cap.owner), vec![p]);

    let mut update = fx.manager.new_update(child).unwrap();
    update.add_share_policy(SharePolicy::export(PACKAGE, &shared).unwrap());
    assert!(update.commit().unwrap());

    let seen_by_parent = fx.framework.match_capabilities(&import(p, "org.shared"));
    assert_eq!(ids(&seen_by_parent, |cap| cap.owner), vec![p, c]);
}

#[test]
fn test_import_reaches_sibling_export() {
    let fx = Fixture::new();
    let a = fx.install("a");
    let b = fx.install("b");
    let any = format!("({PACKAGE}=*)");
    fx.create_scope(
        ScopeId::ROOT,
        "consumer",
        &[a],
        vec![SharePolicy::import(PACKAGE, &any).unwrap()],
    );
    fx.create_scope(
        ScopeId::ROOT,
        "provider",
        &[b],
        vec![SharePolicy::export(PACKAGE, &any).unwrap()],
    );

    fx.framework.add_capability(package(b, "org.b")).unwrap();
    assert_eq!(fx.framework.match_capabilities(&import(a, "org.b")).len(), 1);
    assert!(fx.manager.is_visible(a, b, PACKAGE, &attrs! { PACKAGE => "org.b" }));
    assert!(!fx.manager.is_visible(b, a, PACKAGE, &attrs! { PACKAGE => "org.a" }));
}

#[test]
fn test_services_follow_share_policies() {
    let fx = Fixture::new();
    let p = fx.install("p");
    let c = fx.install("c");
    let other = fx.install("other");
    let parent = fx.create_scope(ScopeId::ROOT, "parent", &[p], Vec::new());
    fx.create_scope(
        parent,
        "child",
        &[c],
        vec![SharePolicy::import(SERVICE_NAMESPACE, "(objectClass=p.Api)").unwrap()],
    );
    fx.create_scope(ScopeId::ROOT, "other", &[other], Vec::new());

    let (api, heard) = fx
        .framework
        .register_service(p, &["p.Api"], attrs! { "ranking" => 1i64 })
        .unwrap();
    fx.framework
        .register_service(p, &["p.Internal"], attrs! {})
        .unwrap();
    // Service events reach the registrar's scope only.
    assert_eq!(ids(&heard, |b| b.id), vec![p]);

    let seen = fx.framework.service_references(c).unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, api.id);
    assert!(fx.framework.service_references(other).unwrap().is_empty());
    assert_eq!(fx.framework.service_references(p).unwrap().len(), 2);
    assert_eq!(fx.framework.service_references(BundleId::SYSTEM).unwrap().len(), 2);
}

#[test]
fn test_bundle_events_stay_in_scope() {
    let fx = Fixture::new();
    let a = fx.install("a");
    let a2 = fx.install("a2");
    let b = fx.install("b");
    let s1 = fx.create_scope(ScopeId::ROOT, "s1", &[a, a2], Vec::new());
    fx.create_scope(ScopeId::ROOT, "s2", &[b], Vec::new());

    let bundle_a = fx.framework.bundle(a).unwrap();
    let heard = fx.framework.fire(BundleEventKind::Started, &bundle_a, &bundle_a);
    assert_eq!(ids(&heard, |l| l.id), vec![BundleId::SYSTEM, a, a2]);

    let system = Bundle::system();
    let heard = fx.framework.fire(BundleEventKind::Started, &system, &system);
    assert_eq!(heard.len(), fx.framework.bundles().len());

    fx.framework.uninstall(a).unwrap();
    assert_eq!(fx.manager.scope(s1).unwrap().bundles(), vec![a2]);
    assert!(!fx.manager.scopes().contains(a));
}

#[test]
fn test_find_bundles() {
    let fx = Fixture::new();
    let a = fx.install("a");
    let b = fx.install("b");
    fx.create_scope(ScopeId::ROOT, "s1", &[a], Vec::new());

    let visible = fx.framework.visible_bundles(a).unwrap();
    assert_eq!(ids(&visible, |v| v.id), vec![BundleId::SYSTEM, a]);

    let from_root = fx.framework.visible_bundles(b).unwrap();
    assert_eq!(ids(&from_root, |v| v.id), vec![BundleId::SYSTEM, fx.admin, b]);

    let everything = fx.framework.visible_bundles(BundleId::SYSTEM).unwrap();
    assert_eq!(everything.len(), 4);
}

#[test]
fn test_bundles_installed_by_a_scoped_bundle_join_its_scope() {
    let fx = Fixture::new();
    let a = fx.install("a");
    let s1 = fx.create_scope(ScopeId::ROOT, "s1", &[a], Vec::new());

    let installed = fx
        .framework
        .install(a, &aries_api::InstallInfo::new("child.jar", "child"))
        .unwrap();
    assert_eq!(fx.manager.scope_of(installed.id).id(), s1);
}

#[test]
fn test_singleton_collisions_limited_to_scope() {
    let fx = Fixture::new();
    let a = fx.install("a");
    let a2 = fx.install("a2");
    let b = fx.install("b");
    fx.create_scope(ScopeId::ROOT, "s1", &[a, a2], Vec::new());
    fx.create_scope(ScopeId::ROOT, "s2", &[b], Vec::new());

    let identity = |owner| Capability::new("osgi.identity", owner, attrs! { "osgi.identity" => "single" });
    let kept = fx
        .framework
        .hooks()
        .filter_singleton_collisions(&identity(a), vec![identity(a2), identity(b)]);
    assert_eq!(ids(&kept, |c| c.owner), vec![a2]);
}

#[test]
fn test_shutdown_unregisters_hooks() {
    let fx = Fixture::new();
    let a = fx.install("a");
    let b = fx.install("b");
    fx.create_scope(ScopeId::ROOT, "s1", &[a], Vec::new());
    fx.framework.add_capability(package(b, "org.b")).unwrap();
    assert!(fx.framework.match_capabilities(&import(a, "org.b")).is_empty());

    fx.manager.shutdown();
    assert!(!fx.manager.is_started());
    assert_eq!(fx.framework.match_capabilities(&import(a, "org.b")).len(), 1);
    assert_eq!(fx.manager.scopes().len(), 1);
}
