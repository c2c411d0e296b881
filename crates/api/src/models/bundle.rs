use super::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BundleId(pub u64);

impl BundleId {
    /// The framework itself. It sees everything and is seen by everyone.
    pub const SYSTEM: BundleId = BundleId(0);

    pub fn is_system(self) -> bool {
        self == Self::SYSTEM
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for BundleId {
    fn from(id: u64) -> Self {
        BundleId(id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bundle {
    pub id: BundleId,
    pub symbolic_name: String,
    pub version: Version,
    pub location: String,
}

impl Bundle {
    pub fn new(id: impl Into<BundleId>, symbolic_name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            symbolic_name: symbolic_name.into(),
            version: Version::empty(),
            location: location.into(),
        }
    }

    pub fn system() -> Self {
        Self::new(BundleId::SYSTEM, "system.bundle", "System Bundle")
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleState {
    Installed,
    Resolved,
    Starting,
    Active,
    Stopping,
    Uninstalled,
}

/// A bundle queued for installation into a scope.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstallInfo {
    pub location: String,
    pub symbolic_name: String,
    pub version: Version,
}

impl InstallInfo {
    pub fn new(location: impl Into<String>, symbolic_name: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            symbolic_name: symbolic_name.into(),
            version: Version::empty(),
        }
    }
}
