//! Runtime settings: an optional JSON file, then environment overrides.

use crate::error::Result;
use aries_api::BundleId;
use aries_proxy::PrefixWeavingPolicy;
use aries_proxy::subclass::DEFAULT_RELOCATION_PREFIX;
use aries_scope::ScopeManagerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DATA_DIR_ENV: &str = "ARIES_DATA_DIR";
pub const MANAGER_BUNDLE_ENV: &str = "ARIES_MANAGER_BUNDLE";

/// `~/.aries`, or `./.aries` without a home directory.
pub fn aries_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".aries")
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WeavingConfig {
    /// Internal-name prefixes that are never woven.
    pub excluded_prefixes: Vec<String>,
}

impl Default for WeavingConfig {
    fn default() -> Self {
        Self {
            excluded_prefixes: vec!["java/".into(), "javax/".into(), "sun/".into()],
        }
    }
}

impl WeavingConfig {
    pub fn policy(&self) -> PrefixWeavingPolicy {
        PrefixWeavingPolicy::new(self.excluded_prefixes.clone())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct AriesConfig {
    pub data_dir: PathBuf,
    pub manager_bundle_id: u64,
    pub proxy_package_prefix: String,
    pub weaving: WeavingConfig,
}

impl Default for AriesConfig {
    fn default() -> Self {
        Self {
            data_dir: aries_home().join("scopes"),
            manager_bundle_id: 1,
            proxy_package_prefix: DEFAULT_RELOCATION_PREFIX.to_string(),
            weaving: WeavingConfig::default(),
        }
    }
}

impl AriesConfig {
    /// Defaults, overlaid by `path` when given, then by the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                debug!("Reading configuration from {}", path.display());
                Self::from_json(&std::fs::read_to_string(path)?)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(id) = var(MANAGER_BUNDLE_ENV).and_then(|v| v.parse().ok()) {
            self.manager_bundle_id = id;
        }
    }

    pub fn scope_manager(&self) -> ScopeManagerConfig {
        ScopeManagerConfig {
            data_dir: Some(self.data_dir.clone()),
            manager_bundle: BundleId(self.manager_bundle_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AriesConfig::from_json(r#"{ "manager_bundle_id": 7 }"#).unwrap();
        assert_eq!(config.manager_bundle_id, 7);
        assert_eq!(config.proxy_package_prefix, DEFAULT_RELOCATION_PREFIX);
        assert_eq!(config.weaving, WeavingConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AriesConfig::default();
        config.apply_env(|key| match key {
            DATA_DIR_ENV => Some("/srv/scopes".to_string()),
            MANAGER_BUNDLE_ENV => Some("not a number".to_string()),
            _ => None,
        });
        assert_eq!(config.data_dir, PathBuf::from("/srv/scopes"));
        assert_eq!(config.manager_bundle_id, 1);
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aries.json");
        std::fs::write(&path, r#"{ "weaving": { "excluded_prefixes": ["lib/"] } }"#).unwrap();

        let config = AriesConfig::load(Some(&path)).unwrap();
        assert_eq!(config.weaving.excluded_prefixes, vec!["lib/".to_string()]);
        assert!(AriesConfig::load(Some(&dir.path().join("missing.json"))).is_err());
    }
}
