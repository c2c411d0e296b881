mod common;

use aries_proxy::classfile::access;
use aries_proxy::subclass::HANDLER_FIELD;
use aries_proxy::suid::default_serial_version_uid;
use aries_proxy::{ClassBuilder, ProxyError, ProxySubclassGenerator};
use common::{base, describe, repository};

#[test]
fn test_proxy_overrides_every_reachable_method() {
    let generator = ProxySubclassGenerator::new(repository(vec![base()]));
    let proxy = generator.generate("p.Base").expect("Base should be proxyable");

    assert!(proxy.class_name.starts_with("p/$Base"));
    let class = describe(&proxy.bytes);
    assert_eq!(class.super_name.as_deref(), Some("p/Base"));
    assert!(class.field(HANDLER_FIELD).is_some());
    assert!(class.method("getInvocationHandler", "()Ljava/lang/reflect/InvocationHandler;").is_some());
    assert!(class.method("setInvocationHandler", "(Ljava/lang/reflect/InvocationHandler;)V").is_some());

    for (name, desc) in [
        ("greet", "(Ljava/lang/String;)Ljava/lang/String;"),
        ("count", "()I"),
        ("sum", "(JD)J"),
        ("hook", "()V"),
        ("local", "()V"),
        ("toString", "()Ljava/lang/String;"),
        ("hashCode", "()I"),
        ("equals", "(Ljava/lang/Object;)Z"),
    ] {
        let m = class
            .method(name, desc)
            .unwrap_or_else(|| panic!("missing override {name}{desc}"));
        assert!(!m.has(access::NATIVE));
    }
    assert!(class.method("secret", "()V").is_none());
    assert!(class.method("util", "()V").is_none());
    assert!(class.method("getClass", "()Ljava/lang/Class;").is_none());
    assert!(class.method("<clinit>", "()V").is_some());
    assert_eq!(proxy.serial_version_uid, None);
}

#[test]
fn test_package_private_methods_skipped_for_relocated_proxy() {
    let target = ClassBuilder::new("java/util/Thing")
        .default_constructor()
        .method(0, "hidden", "()V")
        .method(access::PUBLIC, "shown", "()V");
    let generator = ProxySubclassGenerator::new(repository(vec![target]));
    let proxy = generator.generate("java/util/Thing").unwrap();

    assert!(proxy
        .class_name
        .starts_with("org/apache/aries/blueprint/proxy/java/util/$Thing"));
    let class = describe(&proxy.bytes);
    assert!(class.method("shown", "()V").is_some());
    assert!(class.method("hidden", "()V").is_none());
}

#[test]
fn test_final_class_is_rejected() {
    let target = ClassBuilder::new("p/Sealed")
        .access(access::PUBLIC | access::FINAL)
        .default_constructor();
    let generator = ProxySubclassGenerator::new(repository(vec![target]));
    let err = generator.generate("p/Sealed").unwrap_err();
    assert!(matches!(err, ProxyError::FinalClass { ref class_name } if class_name == "p.Sealed"));
}

#[test]
fn test_final_methods_are_reported_together() {
    let parent = ClassBuilder::new("p/Parent")
        .default_constructor()
        .method(access::PUBLIC | access::FINAL, "locked", "()V");
    let child = ClassBuilder::new("p/Child")
        .extends("p/Parent")
        .default_constructor()
        .method(access::PUBLIC | access::FINAL, "sealed", "()I")
        .method(access::PUBLIC | access::STATIC | access::FINAL, "ignored", "()V");
    let generator = ProxySubclassGenerator::new(repository(vec![parent, child]));

    match generator.generate("p/Child") {
        Err(ProxyError::FinalMethods { class_name, methods }) => {
            assert_eq!(class_name, "p.Child");
            assert_eq!(methods, vec!["sealed".to_string(), "locked".to_string()]);
        }
        other => panic!("expected FinalMethods, got {other:?}"),
    }
}

#[test]
fn test_no_arg_constructor_is_required() {
    let no_ctor = ClassBuilder::new("p/NoCtor").method(access::PUBLIC, "<init>", "(I)V");
    let private_ctor = ClassBuilder::new("p/Hidden").method(access::PRIVATE, "<init>", "()V");
    let inner = ClassBuilder::new("p/Outer$Inner")
        .inner_class("p/Outer", "Inner", access::PUBLIC)
        .default_constructor();
    let generator = ProxySubclassGenerator::new(repository(vec![no_ctor, private_ctor, inner]));

    for name in ["p/NoCtor", "p/Hidden", "p/Outer$Inner"] {
        let err = generator.generate(name).unwrap_err();
        assert!(
            matches!(err, ProxyError::UnableToProxy { .. }),
            "{name}: unexpected {err:?}"
        );
    }
}

#[test]
fn test_covariant_return_gets_bridge() {
    let parent = ClassBuilder::new("p/Parent")
        .default_constructor()
        .method(access::PUBLIC, "get", "()Ljava/lang/Object;");
    let child = ClassBuilder::new("p/Child")
        .extends("p/Parent")
        .default_constructor()
        .method(access::PUBLIC, "get", "()Ljava/lang/String;");
    let generator = ProxySubclassGenerator::new(repository(vec![parent, child]));
    let proxy = generator.generate("p/Child").unwrap();

    assert_eq!(proxy.bridge_count(), 1);
    let class = describe(&proxy.bytes);
    let main = class.method("get", "()Ljava/lang/String;").unwrap();
    assert!(!main.has(access::BRIDGE));
    let bridge = class.method("get", "()Ljava/lang/Object;").unwrap();
    assert!(bridge.has(access::BRIDGE) && bridge.has(access::SYNTHETIC));
}

#[test]
fn test_declared_serial_version_uid_is_copied() {
    let target = ClassBuilder::new("p/Data")
        .implements("java/io/Serializable")
        .default_constructor()
        .long_constant(access::PRIVATE | access::STATIC | access::FINAL, "serialVersionUID", 99);
    let generator = ProxySubclassGenerator::new(repository(vec![target]));
    let proxy = generator.generate("p/Data").unwrap();

    assert_eq!(proxy.serial_version_uid, Some(99));
    assert!(!proxy.synthetic_serial_version_uid);
    let field = describe(&proxy.bytes).field("serialVersionUID").cloned().unwrap();
    assert!(!access::is(field.access, access::SYNTHETIC));
}

#[test]
fn test_computed_serial_version_uid_is_synthetic() {
    let target = ClassBuilder::new("p/Data")
        .implements("java/io/Serializable")
        .default_constructor()
        .method(access::PUBLIC, "value", "()I");
    let expected = default_serial_version_uid(&describe(&target_bytes())).unwrap();
    let generator = ProxySubclassGenerator::new(repository(vec![target]));
    let proxy = generator.generate("p/Data").unwrap();

    assert_eq!(proxy.serial_version_uid, Some(expected));
    assert!(proxy.synthetic_serial_version_uid);
    let field = describe(&proxy.bytes).field("serialVersionUID").cloned().unwrap();
    assert!(access::is(field.access, access::SYNTHETIC));

    fn target_bytes() -> Vec<u8> {
        ClassBuilder::new("p/Data")
            .implements("java/io/Serializable")
            .default_constructor()
            .method(access::PUBLIC, "value", "()I")
            .build()
            .unwrap()
    }
}

#[test]
fn test_failures_are_cached() {
    let target = ClassBuilder::new("p/Sealed")
        .access(access::PUBLIC | access::FINAL)
        .default_constructor();
    let generator = ProxySubclassGenerator::new(repository(vec![target]));
    let first = generator.generate("p/Sealed").unwrap_err().to_string();
    let second = generator.generate("p.Sealed").unwrap_err().to_string();
    assert_eq!(first, second);
}

#[test]
fn test_generated_proxies_are_cached_and_recognised() {
    let generator = ProxySubclassGenerator::new(repository(vec![base()]));
    let first = generator.generate("p/Base").unwrap();
    let second = generator.generate("p/Base").unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert!(generator.is_proxy_class(&first.class_name));
    assert!(generator.is_proxy_class(&first.class_name.replace('/', ".")));
    assert!(!generator.is_proxy_class("p/Base"));
}

#[test]
fn test_missing_class() {
    let generator = ProxySubclassGenerator::new(repository(vec![]));
    assert!(matches!(
        generator.generate("p/Nowhere"),
        Err(ProxyError::ClassNotFound(name)) if name == "p.Nowhere"
    ));
}
