use super::bundle::BundleId;
use super::version::Version;
use crate::filter::Filter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Typed attribute value carried by capabilities and service properties.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum AttrValue {
    String(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Version(Version),
    List(Vec<AttrValue>),
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::String(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::String(s)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Long(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Double(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Boolean(v)
    }
}

impl From<Version> for AttrValue {
    fn from(v: Version) -> Self {
        AttrValue::Version(v)
    }
}

impl<T: Into<AttrValue>> From<Vec<T>> for AttrValue {
    fn from(v: Vec<T>) -> Self {
        AttrValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::String(s) => write!(f, "{}", s),
            AttrValue::Long(v) => write!(f, "{}", v),
            AttrValue::Double(v) => write!(f, "{}", v),
            AttrValue::Boolean(v) => write!(f, "{}", v),
            AttrValue::Version(v) => write!(f, "{}", v),
            AttrValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

pub type Attributes = BTreeMap<String, AttrValue>;

/// Builds an [`Attributes`] map from `key => value` pairs.
#[macro_export]
macro_rules! attrs {
    ($($key:expr => $value:expr),* $(,)?) => {{
        #[allow(unused_mut)]
        let mut map = $crate::models::capability::Attributes::new();
        $(map.insert($key.to_string(), $crate::models::capability::AttrValue::from($value));)*
        map
    }};
}

/// Something a bundle offers in a namespace (a package, a bundle identity, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    pub namespace: String,
    pub attributes: Attributes,
    pub directives: BTreeMap<String, String>,
    pub owner: BundleId,
}

impl Capability {
    pub fn new(namespace: impl Into<String>, owner: BundleId, attributes: Attributes) -> Self {
        Self {
            namespace: namespace.into(),
            attributes,
            directives: BTreeMap::new(),
            owner,
        }
    }
}

/// Something a bundle needs; candidates are capabilities in the same namespace
/// matching the filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub namespace: String,
    pub filter: Option<Filter>,
    pub owner: BundleId,
}

impl Requirement {
    pub fn new(namespace: impl Into<String>, owner: BundleId, filter: Option<Filter>) -> Self {
        Self {
            namespace: namespace.into(),
            filter,
            owner,
        }
    }

    pub fn matches(&self, capability: &Capability) -> bool {
        if capability.namespace != self.namespace {
            return false;
        }
        match &self.filter {
            Some(filter) => filter.matches(&capability.attributes),
            None => true,
        }
    }
}
