use serde::Deserialize;

/// Configuration for every built-in provider. Each section is optional; a
/// provider without an endpoint runs in simulated mode.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuiltinsConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub business_intelligence: BusinessIntelligenceConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    #[serde(default = "default_index")]
    pub index: String,
    /// Maximum number of documents returned per search.
    #[serde(default = "default_top")]
    pub top: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            index: default_index(),
            top: default_top(),
        }
    }
}

fn default_index() -> String {
    "hotels".to_string()
}

fn default_top() -> u32 {
    5
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsConfig {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    pub space_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BusinessIntelligenceConfig {
    /// Name of the lakehouse connection. Queries fail with a structured
    /// error while it is unset.
    pub connection: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowConfig {
    pub trigger_url: Option<String>,
    /// Used when a send request names no recipient.
    pub recipient: Option<String>,
}
