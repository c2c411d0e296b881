#![allow(dead_code)]

use aries_proxy::classfile::access;
use aries_proxy::{ClassBuilder, ClassDescriptor, ClassRepository, MemorySource};
use std::sync::Arc;

pub fn repository(classes: Vec<ClassBuilder>) -> Arc<ClassRepository> {
    let source = MemorySource::new();
    for builder in classes {
        let bytes = builder.build().expect("fixture should build");
        let name = ClassDescriptor::parse(&bytes).unwrap().name;
        source.insert(name, bytes);
    }
    Arc::new(ClassRepository::new(source))
}

/// `p/Base` with a no-arg constructor and a few overridable methods.
pub fn base() -> ClassBuilder {
    ClassBuilder::new("p/Base")
        .default_constructor()
        .method(access::PUBLIC, "greet", "(Ljava/lang/String;)Ljava/lang/String;")
        .method(access::PUBLIC, "count", "()I")
        .method(access::PUBLIC, "sum", "(JD)J")
        .method(access::PROTECTED, "hook", "()V")
        .method(0, "local", "()V")
        .method(access::PRIVATE, "secret", "()V")
        .method(access::PUBLIC | access::STATIC, "util", "()V")
}

pub fn describe(bytes: &[u8]) -> ClassDescriptor {
    ClassDescriptor::parse(bytes).expect("generated class should parse")
}
