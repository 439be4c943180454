//! Capability providers: the uniform invocation contract every domain skill
//! implements, and the explicit registry they are resolved from at startup.

/// The `Capability` trait, requests, and structured fault values.
pub mod capability;
/// Named registry of capability providers.
pub mod registry;

pub use capability::{
    fault, is_fault, Capability, CapabilityDescriptor, CapabilityRequest, OperationDescriptor,
};
pub use registry::CapabilityRegistry;
