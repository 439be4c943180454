use chrono::{DateTime, Utc};
use ensemble_skills::Capability;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Category label attached to a task; selects the recommended deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    /// A single participant answers directly (time lookup, one search).
    Simple,
    /// Document or hotel search.
    Search,
    /// Data analysis over the analytics or BI participants.
    Analysis,
    /// Several participants collaborate.
    MultiAgent,
    /// Integrated, multi-step requests.
    Complex,
    /// Fallback for unrecognized labels.
    Default,
}

impl TaskCategory {
    /// Every category, in ascending order of recommended deadline.
    pub const ALL: [TaskCategory; 6] = [
        TaskCategory::Default,
        TaskCategory::Simple,
        TaskCategory::Search,
        TaskCategory::Analysis,
        TaskCategory::MultiAgent,
        TaskCategory::Complex,
    ];

    /// Strict lookup by label. Accepts `multi-agent` as a spelling of
    /// `multi_agent`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "simple" => Some(Self::Simple),
            "search" => Some(Self::Search),
            "analysis" => Some(Self::Analysis),
            "multi_agent" => Some(Self::MultiAgent),
            "complex" => Some(Self::Complex),
            "default" => Some(Self::Default),
            _ => None,
        }
    }

    /// Lenient lookup: unknown labels map to [`TaskCategory::Default`].
    pub fn parse(label: &str) -> Self {
        Self::from_label(label).unwrap_or(Self::Default)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Search => "search",
            Self::Analysis => "analysis",
            Self::MultiAgent => "multi_agent",
            Self::Complex => "complex",
            Self::Default => "default",
        }
    }
}

impl std::fmt::Display for TaskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One user-submitted request, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub description: String,
    pub category: TaskCategory,
    pub started_at: DateTime<Utc>,
}

impl Task {
    pub fn new(description: impl Into<String>, category: TaskCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            category,
            started_at: Utc::now(),
        }
    }
}

/// A domain participant registered with the coordinator.
#[derive(Clone)]
pub struct Participant {
    pub identity: String,
    pub description: String,
    pub capability: Arc<dyn Capability>,
    /// Pre-existing shared resource: never removed or deregistered.
    pub protected: bool,
}

impl Participant {
    pub fn new(
        identity: impl Into<String>,
        description: impl Into<String>,
        capability: Arc<dyn Capability>,
    ) -> Self {
        Self {
            identity: identity.into(),
            description: description.into(),
            capability,
            protected: false,
        }
    }

    /// Mark the participant as protected.
    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("identity", &self.identity)
            .field("description", &self.description)
            .field("capability", &self.capability.descriptor().name)
            .field("protected", &self.protected)
            .finish()
    }
}

/// An intermediate participant message as recorded by the observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedMessage {
    pub source_participant: String,
    /// 1-based arrival order within the current task.
    pub sequence_number: u32,
    pub elapsed_seconds: f64,
    /// Content truncated to the display budget.
    pub content: String,
}

/// What went wrong with a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    CoordinatorFault,
    /// Another task was already in flight.
    Busy,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::CoordinatorFault => write!(f, "coordinator_fault"),
            FailureKind::Busy => write!(f, "busy"),
        }
    }
}

/// Which suspension point a failure happened at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePhase {
    Dispatch,
    FinalResult,
}

impl std::fmt::Display for FailurePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePhase::Dispatch => write!(f, "dispatch"),
            FailurePhase::FinalResult => write!(f, "final_result"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub kind: FailureKind,
    pub phase: FailurePhase,
    pub message: String,
    /// Category-aware remediation lines for the operator.
    pub hints: Vec<String>,
}

/// Terminal value returned once per task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: Uuid,
    pub success: bool,
    pub elapsed_seconds: f64,
    /// Total intermediate messages observed, including those past the display budget.
    pub response_count: u32,
    pub category: TaskCategory,
    pub final_text: Option<String>,
    pub failure: Option<FailureInfo>,
}

/// Lifecycle of the coordinator around one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    Idle,
    Dispatching,
    AwaitingFinal,
    Succeeded,
    TimedOut,
    Failed,
}

impl CoordinatorState {
    /// Whether a task is currently in flight.
    pub fn is_busy(&self) -> bool {
        !matches!(self, CoordinatorState::Idle)
    }
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordinatorState::Idle => write!(f, "idle"),
            CoordinatorState::Dispatching => write!(f, "dispatching"),
            CoordinatorState::AwaitingFinal => write!(f, "awaiting_final"),
            CoordinatorState::Succeeded => write!(f, "succeeded"),
            CoordinatorState::TimedOut => write!(f, "timed_out"),
            CoordinatorState::Failed => write!(f, "failed"),
        }
    }
}

/// Orchestration settings, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Ceiling on the dispatch wait, in seconds.
    #[serde(default = "default_response_timeout")]
    pub response_timeout: u64,
    /// Number of intermediate messages rendered per task.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Characters of each intermediate message shown before truncation.
    #[serde(default = "default_display_chars")]
    pub display_chars: usize,
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

fn default_response_timeout() -> u64 {
    90
}

fn default_max_iterations() -> u32 {
    15
}

fn default_display_chars() -> usize {
    200
}

fn default_progress_interval_ms() -> u64 {
    500
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            response_timeout: default_response_timeout(),
            max_iterations: default_max_iterations(),
            display_chars: default_display_chars(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

impl CoordinatorConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }
}
