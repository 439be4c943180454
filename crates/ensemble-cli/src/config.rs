//! `ensemble.toml` loading, environment overrides and validation.

use ensemble_builtins::{BuiltinsConfig, ANALYTICS, BUSINESS_INTELLIGENCE, SEARCH, WORKFLOW};
use ensemble_core::{EnsembleError, EnsembleResult};
use ensemble_orchestrator::{CoordinatorConfig, TaskCategory, TimeoutProfile};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// Smallest accepted deadline, in seconds.
pub const MIN_TIMEOUT_SECS: u64 = 2;

/// Full CLI configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnsembleConfig {
    #[serde(default)]
    pub orchestration: CoordinatorConfig,
    /// Per-category overrides of the recommended deadline, in seconds.
    #[serde(default)]
    pub timeouts: BTreeMap<String, u64>,
    #[serde(flatten)]
    pub builtins: BuiltinsConfig,
    /// Unset means the four built-in participants.
    #[serde(default)]
    pub participants: Option<Vec<ParticipantConfig>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParticipantConfig {
    /// Name of the capability provider backing this participant.
    pub capability: String,
    pub identity: String,
    /// Falls back to the capability's own description.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub protected: bool,
}

impl ParticipantConfig {
    fn builtin(capability: &str, identity: &str, protected: bool) -> Self {
        Self {
            capability: capability.to_string(),
            identity: identity.to_string(),
            description: None,
            protected,
        }
    }
}

/// Read `path` (if it exists), apply process environment overrides, validate.
pub fn load(path: &Path) -> EnsembleResult<EnsembleConfig> {
    let mut config = if path.exists() {
        parse_config(path)?
    } else {
        debug!(path = %path.display(), "No config file, using defaults");
        EnsembleConfig::default()
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    info!(
        response_timeout_s = config.orchestration.response_timeout,
        max_iterations = config.orchestration.max_iterations,
        participants = config.participants().len(),
        "Configuration loaded"
    );
    Ok(config)
}

pub fn parse_config(path: &Path) -> EnsembleResult<EnsembleConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        EnsembleError::Config(format!("Failed to read config '{}': {e}", path.display()))
    })?;
    toml::from_str(&content).map_err(|e| {
        EnsembleError::Config(format!("Failed to parse config '{}': {e}", path.display()))
    })
}

impl EnsembleConfig {
    /// Apply environment overrides. `lookup` returns the value of a variable;
    /// empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> EnsembleResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get("RESPONSE_TIMEOUT") {
            self.orchestration.response_timeout = parse_number("RESPONSE_TIMEOUT", &raw)?;
        }
        if let Some(raw) = get("MAX_ITERATIONS") {
            self.orchestration.max_iterations = parse_number("MAX_ITERATIONS", &raw)?;
        }

        let builtins = &mut self.builtins;
        for (key, slot) in [
            ("SEARCH_ENDPOINT", &mut builtins.search.endpoint),
            ("SEARCH_API_KEY", &mut builtins.search.api_key),
            ("ANALYTICS_ENDPOINT", &mut builtins.analytics.endpoint),
            ("ANALYTICS_TOKEN", &mut builtins.analytics.token),
            ("ANALYTICS_SPACE_ID", &mut builtins.analytics.space_id),
            ("BI_CONNECTION_NAME", &mut builtins.business_intelligence.connection),
            ("WORKFLOW_TRIGGER_URL", &mut builtins.workflow.trigger_url),
        ] {
            if let Some(value) = get(key) {
                debug!(key, "Environment override");
                *slot = Some(value);
            }
        }
        Ok(())
    }

    /// Reject settings the coordinator cannot run with.
    ///
    /// Deadlines below [`MIN_TIMEOUT_SECS`] would leave no time at all for
    /// the final-result wait, which gets half the effective deadline.
    pub fn validate(&self) -> EnsembleResult<()> {
        if self.orchestration.response_timeout < MIN_TIMEOUT_SECS {
            return Err(EnsembleError::Config(format!(
                "orchestration.response_timeout must be at least {MIN_TIMEOUT_SECS}s"
            )));
        }
        if self.orchestration.max_iterations == 0 {
            return Err(EnsembleError::Config(
                "orchestration.max_iterations must be greater than zero".to_string(),
            ));
        }

        for (label, seconds) in &self.timeouts {
            if TaskCategory::from_label(label).is_none() {
                return Err(EnsembleError::Config(format!(
                    "Unknown task category in [timeouts]: '{label}'"
                )));
            }
            if *seconds < MIN_TIMEOUT_SECS {
                return Err(EnsembleError::Config(format!(
                    "timeouts.{label} must be at least {MIN_TIMEOUT_SECS}s"
                )));
            }
        }

        for (name, url) in [
            ("search.endpoint", &self.builtins.search.endpoint),
            ("analytics.endpoint", &self.builtins.analytics.endpoint),
            ("workflow.trigger_url", &self.builtins.workflow.trigger_url),
        ] {
            if let Some(url) = url {
                reqwest::Url::parse(url).map_err(|e| {
                    EnsembleError::Config(format!("{name} is not a valid URL ('{url}'): {e}"))
                })?;
            }
        }

        let participants = self.participants();
        if participants.is_empty() {
            return Err(EnsembleError::Config(
                "No participants configured".to_string(),
            ));
        }
        let known = [SEARCH, ANALYTICS, BUSINESS_INTELLIGENCE, WORKFLOW];
        let mut seen = HashSet::new();
        for participant in &participants {
            if !known.contains(&participant.capability.as_str()) {
                return Err(EnsembleError::Config(format!(
                    "Participant '{}' uses unknown capability '{}'",
                    participant.identity, participant.capability
                )));
            }
            if !seen.insert(participant.identity.as_str()) {
                return Err(EnsembleError::Config(format!(
                    "Participant '{}' is configured more than once",
                    participant.identity
                )));
            }
        }
        Ok(())
    }

    /// Configured participants, or the four built-ins when none are listed.
    pub fn participants(&self) -> Vec<ParticipantConfig> {
        match &self.participants {
            Some(list) => list.clone(),
            None => vec![
                ParticipantConfig::builtin(SEARCH, "SearchAgent", true),
                ParticipantConfig::builtin(ANALYTICS, "AnalyticsAgent", false),
                ParticipantConfig::builtin(
                    BUSINESS_INTELLIGENCE,
                    "BusinessIntelligenceAgent",
                    false,
                ),
                ParticipantConfig::builtin(WORKFLOW, "WorkflowAgent", false),
            ],
        }
    }

    /// Default deadline table with the `[timeouts]` overrides applied.
    pub fn timeout_profile(&self) -> TimeoutProfile {
        self.timeouts
            .iter()
            .filter_map(|(label, seconds)| TaskCategory::from_label(label).map(|c| (c, *seconds)))
            .fold(TimeoutProfile::default(), |profile, (category, seconds)| {
                profile.with_override(category, seconds)
            })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> EnsembleResult<T> {
    raw.trim().parse().map_err(|_| {
        EnsembleError::Config(format!("{key} must be a whole number, got '{raw}'"))
    })
}
