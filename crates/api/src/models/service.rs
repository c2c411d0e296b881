use super::bundle::BundleId;
use super::capability::{AttrValue, Attributes};

pub const OBJECT_CLASS: &str = "objectClass";
pub const SERVICE_ID: &str = "service.id";

/// A registered service as seen by find and event hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceReference {
    pub id: u64,
    pub owner: BundleId,
    pub properties: Attributes,
}

impl ServiceReference {
    pub fn new(id: u64, owner: BundleId, interfaces: &[&str], mut properties: Attributes) -> Self {
        properties.insert(
            OBJECT_CLASS.to_string(),
            AttrValue::List(interfaces.iter().map(|i| AttrValue::from(*i)).collect()),
        );
        properties.insert(SERVICE_ID.to_string(), AttrValue::Long(id as i64));
        Self {
            id,
            owner,
            properties,
        }
    }

    pub fn interfaces(&self) -> Vec<&str> {
        match self.properties.get(OBJECT_CLASS) {
            Some(AttrValue::List(items)) => items
                .iter()
                .filter_map(|v| match v {
                    AttrValue::String(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect(),
            Some(AttrValue::String(s)) => vec![s.as_str()],
            _ => Vec::new(),
        }
    }
}
