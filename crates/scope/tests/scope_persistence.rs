mod common;

use aries_api::BundleRuntime;
use aries_scope::{PolicyType, ScopeId, ScopeRecord, ScopeStore, SharePolicy};
use common::{Fixture, PACKAGE, start};
use tempfile::tempdir;

#[test]
fn test_scopes_survive_restart() {
    let dir = tempdir().unwrap();
    let fx = Fixture::with_data_dir(Some(dir.path().to_path_buf()));
    let a = fx.install("a");
    let gone = fx.install("gone");
    let tenant = fx.create_scope(
        ScopeId::ROOT,
        "tenant",
        &[a, gone],
        vec![SharePolicy::export(PACKAGE, "(osgi.wiring.package=org.a)").unwrap()],
    );
    let nested = fx.create_scope(tenant, "nested", &[], Vec::new());
    assert!(dir.path().join(tenant.to_string()).is_file());

    fx.manager.shutdown();
    // Uninstalled while nobody was tracking scopes.
    fx.framework.uninstall(gone).unwrap();
    let late = fx.install("late");

    let manager = start(&fx.framework, Some(dir.path().to_path_buf()));
    let restored = manager.scope(tenant).unwrap();
    assert_eq!(restored.name(), "tenant");
    assert_eq!(restored.parent(), Some(ScopeId::ROOT));
    assert_eq!(restored.bundles(), vec![a]);
    assert_eq!(restored.children(), vec![nested]);
    let exports: Vec<_> = restored
        .share_policies()
        .iter(PolicyType::Export)
        .map(|p| p.filter_source().to_string())
        .collect();
    assert_eq!(exports, vec!["(osgi.wiring.package=org.a)".to_string()]);

    assert_eq!(manager.scope_of(late).id(), ScopeId::ROOT);
    assert_eq!(manager.scope_of(fx.admin).id(), ScopeId::ROOT);

    // New scopes never reuse a persisted id.
    let mut update = manager.new_update(ScopeId::ROOT).unwrap();
    assert!(update.new_child("fresh").scope_id() > nested);
}

#[test]
fn test_unreadable_scope_file_does_not_hide_the_others() {
    let dir = tempdir().unwrap();
    let fx = Fixture::with_data_dir(Some(dir.path().to_path_buf()));
    let a = fx.install("a");
    let s1 = fx.create_scope(ScopeId::ROOT, "s1", &[a], Vec::new());
    assert_ne!(s1, ScopeId(7));
    fx.manager.shutdown();
    std::fs::write(dir.path().join("7"), [0xde, 0xad]).unwrap();

    let manager = start(&fx.framework, Some(dir.path().to_path_buf()));
    let restored = manager.scope(s1).unwrap();
    assert_eq!(restored.name(), "s1");
    assert_eq!(restored.bundles(), vec![a]);
    assert_eq!(manager.scope_of(a).id(), s1);
    assert!(manager.scope(ScopeId(7)).is_none());
}

#[test]
fn test_removed_scope_leaves_disk() {
    let dir = tempdir().unwrap();
    let fx = Fixture::with_data_dir(Some(dir.path().to_path_buf()));
    let tenant = fx.create_scope(ScopeId::ROOT, "tenant", &[], Vec::new());
    let path = dir.path().join(tenant.to_string());
    assert!(path.is_file());

    let mut update = fx.manager.new_update(ScopeId::ROOT).unwrap();
    update.remove_child("tenant");
    assert!(update.commit().unwrap());
    assert!(!path.exists());
}

#[test]
fn test_record_reflects_scope() {
    let dir = tempdir().unwrap();
    let fx = Fixture::with_data_dir(Some(dir.path().to_path_buf()));
    let a = fx.install("a");
    let tenant = fx.create_scope(ScopeId::ROOT, "tenant", &[a], Vec::new());

    let records = ScopeStore::new(dir.path()).load_all().unwrap();
    let record = records.iter().find(|r| r.id == tenant).unwrap();
    assert_eq!(record, &ScopeRecord::of(&fx.manager.scope(tenant).unwrap()));
    assert_eq!(record.bundles, vec![a]);
    assert!(records.iter().any(|r| r.id == ScopeId::ROOT));
}

#[test]
fn test_unwritable_store_keeps_working_in_memory() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file in the way").unwrap();

    let fx = Fixture::with_data_dir(Some(blocker));
    let a = fx.install("a");
    let tenant = fx.create_scope(ScopeId::ROOT, "tenant", &[a], Vec::new());
    assert_eq!(fx.manager.scope_of(a).id(), tenant);
}
