pub mod builder;
pub mod classfile;
pub mod descriptor;
pub(crate) mod emit;
pub mod error;
pub mod method_set;
pub mod model;
pub mod source;
pub mod subclass;
pub mod suid;
pub mod weaving;

// Re-export commonly used types
pub use builder::ClassBuilder;
pub use error::{ProxyError, Result};
pub use method_set::{ProxyMethod, ProxySubclassMethodSet};
pub use model::ClassDescriptor;
pub use source::{ClassPath, ClassRepository, ClassSource, DirectorySource, JarSource, MemorySource};
pub use subclass::{GeneratedProxy, ProxySubclassGenerator};
pub use weaving::{
    PrefixWeavingPolicy, Rebinding, WeavingPolicy, WovenClass, WovenProxyGenerator,
};
