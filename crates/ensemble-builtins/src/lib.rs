//! Built-in capability providers for the Ensemble coordinator.
//!
//! Each provider wraps one external domain system behind the uniform
//! [`Capability`](ensemble_skills::Capability) contract. A provider runs in
//! *connected* mode when its endpoint is configured, and otherwise answers in
//! a *simulated* mode so the coordinator can be exercised end to end without
//! any external system.
//!
//! # Providers
//!
//! - [`SearchCapability`] — document and hotel search against a search index.
//! - [`AnalyticsCapability`] — natural-language analytics conversations.
//! - [`BusinessIntelligenceCapability`] — lakehouse KPI queries over trip data.
//! - [`WorkflowCapability`] — current time and workflow-triggered email.

/// Natural-language analytics conversations.
pub mod analytics;
/// Lakehouse business-intelligence queries.
pub mod business_intelligence;
/// Provider configuration sections.
pub mod config;
mod http;
/// Search index queries.
pub mod search;
/// Workflow automation triggers.
pub mod workflow;

pub use analytics::AnalyticsCapability;
pub use business_intelligence::BusinessIntelligenceCapability;
pub use config::{
    AnalyticsConfig, BuiltinsConfig, BusinessIntelligenceConfig, SearchConfig, WorkflowConfig,
};
pub use search::SearchCapability;
pub use workflow::WorkflowCapability;

use ensemble_skills::CapabilityRegistry;
use std::sync::Arc;

/// Name under which [`SearchCapability`] registers.
pub const SEARCH: &str = "search";
/// Name under which [`AnalyticsCapability`] registers.
pub const ANALYTICS: &str = "analytics";
/// Name under which [`BusinessIntelligenceCapability`] registers.
pub const BUSINESS_INTELLIGENCE: &str = "business_intelligence";
/// Name under which [`WorkflowCapability`] registers.
pub const WORKFLOW: &str = "workflow";

/// Register all four built-in providers into the given registry.
pub fn register_builtins(registry: &mut CapabilityRegistry, config: &BuiltinsConfig) {
    registry.register(Arc::new(SearchCapability::new(config.search.clone())));
    registry.register(Arc::new(AnalyticsCapability::new(config.analytics.clone())));
    registry.register(Arc::new(BusinessIntelligenceCapability::new(
        config.business_intelligence.clone(),
    )));
    registry.register(Arc::new(WorkflowCapability::new(config.workflow.clone())));
}
