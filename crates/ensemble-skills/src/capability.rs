use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Describes one operation a capability exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
}

/// Metadata describing a capability provider and its operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    /// Operation invoked when the provider is handed a free-text task.
    pub primary_operation: String,
    pub operations: Vec<OperationDescriptor>,
}

impl CapabilityDescriptor {
    /// Whether `operation` is one of the declared operations.
    pub fn supports(&self, operation: &str) -> bool {
        self.operations.iter().any(|op| op.name == operation)
    }
}

/// A structured invocation of one capability operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityRequest {
    pub operation: String,
    #[serde(default)]
    pub arguments: Value,
}

impl CapabilityRequest {
    pub fn new(operation: impl Into<String>, arguments: Value) -> Self {
        Self {
            operation: operation.into(),
            arguments,
        }
    }

    /// A string argument, treating empty strings as absent.
    pub fn arg_str(&self, key: &str) -> Option<&str> {
        self.arguments[key].as_str().filter(|s| !s.is_empty())
    }
}

/// Trait that every domain capability implements.
///
/// `invoke` never fails: internal faults are returned as a JSON object with
/// `error` and `details` fields (see [`fault`]) so the caller can treat every
/// provider call as data.
#[async_trait]
pub trait Capability: Send + Sync {
    fn descriptor(&self) -> &CapabilityDescriptor;

    async fn invoke(&self, request: CapabilityRequest) -> Value;
}

/// Build the structured fault value a provider returns instead of failing.
pub fn fault(error: impl Into<String>, details: impl Into<String>) -> Value {
    serde_json::json!({
        "error": error.into(),
        "details": details.into(),
    })
}

/// Whether a provider result is a structured fault.
pub fn is_fault(value: &Value) -> bool {
    value.get("error").is_some_and(|e| !e.is_null())
}
