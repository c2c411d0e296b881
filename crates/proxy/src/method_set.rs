use crate::classfile::access;
use crate::descriptor::{MethodDescriptor, param_part, return_part};
use crate::model::{ClassDescriptor, MethodInfo};
use crate::error::Result;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// A method the proxy overrides.
#[derive(Debug, Clone, Serialize)]
pub struct ProxyMethod {
    pub name: String,
    /// Most-derived descriptor.
    pub descriptor: String,
    pub access: u16,
    pub declaring_class: String,
    pub signature: Option<String>,
    pub exceptions: Vec<String>,
    /// Descriptors that differ only in return type and need a bridge that
    /// forwards to `descriptor`.
    pub bridges: Vec<String>,
}

impl ProxyMethod {
    pub fn key(&self) -> String {
        method_key(&self.name, &self.descriptor)
    }

    fn from_info(info: &MethodInfo, declaring_class: &str) -> Self {
        Self {
            name: info.name.clone(),
            descriptor: info.descriptor.clone(),
            access: info.access,
            declaring_class: declaring_class.to_string(),
            signature: info.signature.clone(),
            exceptions: info.exceptions.clone(),
            bridges: Vec::new(),
        }
    }
}

/// Erased signature: name plus parameter descriptor.
pub fn method_key(name: &str, descriptor: &str) -> String {
    format!("{}{}", name, param_part(descriptor))
}

/// Methods a subclass proxy has to override, keyed by erased signature and
/// in discovery order (most-derived class first).
#[derive(Debug, Default, Serialize)]
pub struct ProxySubclassMethodSet {
    methods: IndexMap<String, ProxyMethod>,
}

impl ProxySubclassMethodSet {
    /// Collect from `chain`, the target followed by its superclasses.
    /// Package-private methods count only when their class sits in
    /// `proxy_package`.
    pub fn collect(chain: &[Arc<ClassDescriptor>], proxy_package: &str) -> Result<Self> {
        let existing_bridges: HashSet<(String, String)> = chain
            .iter()
            .flat_map(|c| c.methods.iter())
            .filter(|m| m.has(access::BRIDGE) && m.has(access::SYNTHETIC))
            .map(|m| (m.name.clone(), m.descriptor.clone()))
            .collect();

        let mut blocked = HashSet::new();
        let mut methods: IndexMap<String, ProxyMethod> = IndexMap::new();
        let mut pending_bridges: IndexMap<String, IndexSet<String>> = IndexMap::new();

        for class in chain {
            for m in &class.methods {
                if !is_overridable(m) {
                    continue;
                }
                if m.is_package_private() && class.package() != proxy_package {
                    continue;
                }
                let key = method_key(&m.name, &m.descriptor);
                if m.has(access::FINAL) {
                    blocked.insert(key);
                    continue;
                }
                if blocked.contains(&key) {
                    continue;
                }
                match methods.get(&key) {
                    None => {
                        methods.insert(key, ProxyMethod::from_info(m, &class.name));
                    }
                    Some(derived) if derived.descriptor != m.descriptor => {
                        if needs_bridge(derived, m)?
                            && !existing_bridges.contains(&(m.name.clone(), m.descriptor.clone()))
                        {
                            pending_bridges
                                .entry(key)
                                .or_default()
                                .insert(m.descriptor.clone());
                        }
                    }
                    Some(_) => {}
                }
            }
        }

        for (key, bridges) in pending_bridges {
            if let Some(method) = methods.get_mut(&key) {
                method.bridges = bridges.into_iter().collect();
            }
        }
        Ok(Self { methods })
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub fn get(&self, name: &str, descriptor: &str) -> Option<&ProxyMethod> {
        self.methods.get(&method_key(name, descriptor))
    }

    pub fn contains(&self, name: &str, descriptor: &str) -> bool {
        self.get(name, descriptor).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProxyMethod> {
        self.methods.values()
    }
}

fn is_overridable(m: &MethodInfo) -> bool {
    !m.is_constructor()
        && !m.is_static_init()
        && !m.has(access::STATIC)
        && !m.has(access::PRIVATE)
        && !m.has(access::SYNTHETIC)
        && !m.has(access::BRIDGE)
}

/// Covariant return: both returns are references and differ.
fn needs_bridge(derived: &ProxyMethod, ancestor: &MethodInfo) -> Result<bool> {
    if return_part(&derived.descriptor) == return_part(&ancestor.descriptor) {
        return Ok(false);
    }
    let derived = MethodDescriptor::parse(&derived.descriptor)?;
    let ancestor = MethodDescriptor::parse(&ancestor.descriptor)?;
    Ok(!derived.returns_primitive_or_void() && !ancestor.returns_primitive_or_void())
}
