use crate::capability::{fault, Capability, CapabilityDescriptor, CapabilityRequest};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Central registry for all available capability providers, keyed by name.
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.descriptor().name.clone();
        if self.capabilities.contains_key(&name) {
            warn!(capability = %name, "Replacing registered capability");
        }
        info!(capability = %name, "Registered capability");
        self.capabilities.insert(name, capability);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Capability>> {
        self.capabilities.get(name)
    }

    /// Descriptors sorted by capability name.
    pub fn descriptors(&self) -> Vec<&CapabilityDescriptor> {
        self.capabilities.values().map(|c| c.descriptor()).collect()
    }

    /// Invoke a capability by name. Unknown names and unsupported operations
    /// come back as structured faults, like any other provider error.
    pub async fn invoke(&self, name: &str, request: CapabilityRequest) -> Value {
        let Some(capability) = self.capabilities.get(name) else {
            warn!(capability = %name, "Invocation of unknown capability");
            return fault(
                format!("Unknown capability: {name}"),
                "No provider is registered under this name",
            );
        };

        if !capability.descriptor().supports(&request.operation) {
            return fault(
                format!("Unsupported operation: {}", request.operation),
                format!("Capability '{name}' does not expose this operation"),
            );
        }

        capability.invoke(request).await
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
