//! Share policies: which capabilities and services may cross a scope
//! boundary.

use crate::error::Result;
use aries_api::{Attributes, Filter};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace that service share policies are declared under.
pub const SERVICE_NAMESPACE: &str = "scope.share.service";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyType {
    Export,
    Import,
}

impl PolicyType {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyType::Export => "EXPORT",
            PolicyType::Import => "IMPORT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EXPORT" => Some(PolicyType::Export),
            "IMPORT" => Some(PolicyType::Import),
            _ => None,
        }
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filter over capability attributes (or service properties) in one
/// namespace. The filter is parsed up front, so a policy always holds a
/// valid one.
#[derive(Debug, Clone, PartialEq)]
pub struct SharePolicy {
    policy_type: PolicyType,
    namespace: String,
    filter: Filter,
    filter_source: String,
}

impl SharePolicy {
    pub fn new(policy_type: PolicyType, namespace: impl Into<String>, filter: &str) -> Result<Self> {
        Ok(Self {
            policy_type,
            namespace: namespace.into(),
            filter: Filter::parse(filter)?,
            filter_source: filter.to_string(),
        })
    }

    pub fn export(namespace: impl Into<String>, filter: &str) -> Result<Self> {
        Self::new(PolicyType::Export, namespace, filter)
    }

    pub fn import(namespace: impl Into<String>, filter: &str) -> Result<Self> {
        Self::new(PolicyType::Import, namespace, filter)
    }

    pub fn policy_type(&self) -> PolicyType {
        self.policy_type
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// The filter as it was written.
    pub fn filter_source(&self) -> &str {
        &self.filter_source
    }

    pub fn matches(&self, attributes: &Attributes) -> bool {
        self.filter.matches(attributes)
    }
}

/// Policies grouped by type, then namespace, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SharePolicies {
    export: IndexMap<String, Vec<SharePolicy>>,
    import: IndexMap<String, Vec<SharePolicy>>,
}

impl SharePolicies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, policy_type: PolicyType) -> &IndexMap<String, Vec<SharePolicy>> {
        match policy_type {
            PolicyType::Export => &self.export,
            PolicyType::Import => &self.import,
        }
    }

    fn get_mut(&mut self, policy_type: PolicyType) -> &mut IndexMap<String, Vec<SharePolicy>> {
        match policy_type {
            PolicyType::Export => &mut self.export,
            PolicyType::Import => &mut self.import,
        }
    }

    pub fn add(&mut self, policy: SharePolicy) {
        self.get_mut(policy.policy_type)
            .entry(policy.namespace.clone())
            .or_default()
            .push(policy);
    }

    /// Drop every policy of `policy_type` in `namespace`.
    pub fn remove(&mut self, policy_type: PolicyType, namespace: &str) -> Vec<SharePolicy> {
        self.get_mut(policy_type)
            .shift_remove(namespace)
            .unwrap_or_default()
    }

    /// First match wins. A namespace without policies never matches.
    pub fn matches(&self, policy_type: PolicyType, namespace: &str, attributes: &Attributes) -> bool {
        self.get(policy_type)
            .get(namespace)
            .is_some_and(|policies| policies.iter().any(|p| p.matches(attributes)))
    }

    pub fn iter(&self, policy_type: PolicyType) -> impl Iterator<Item = &SharePolicy> {
        self.get(policy_type).values().flatten()
    }

    pub fn len(&self) -> usize {
        self.export.values().map(Vec::len).sum::<usize>()
            + self.import.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
