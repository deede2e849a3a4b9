use std::collections::BTreeMap;

use crate::arbitration::types::{ResourceCeiling, ResourceCeilingSnapshot, ResourceId};

#[derive(Debug, Clone, Default)]
pub struct ResourceCeilingRegistry {
    version: u64,
    by_resource: BTreeMap<ResourceId, f64>,
}

impl ResourceCeilingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, resource_id: &str, value: f64) -> Option<f64> {
        self.version = self.version.saturating_add(1);
        self.by_resource.insert(resource_id.to_string(), value)
    }

    pub fn get(&self, resource_id: &str) -> Option<f64> {
        self.by_resource.get(resource_id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_resource.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_resource.is_empty()
    }

    pub fn snapshot(&self) -> ResourceCeilingSnapshot {
        ResourceCeilingSnapshot {
            version: self.version,
            ceilings: self
                .by_resource
                .iter()
                .map(|(id, value)| ResourceCeiling {
                    id: id.clone(),
                    value: *value,
                })
                .collect(),
        }
    }
}
