//! Fan-out task coordination with bounded observation and adaptive timeouts.
//!
//! A task is handed, together with the registered participants, to an
//! injectable distribution engine. Intermediate participant messages flow
//! through a display-capped observer, and both the dispatch and the
//! final-result waits are bounded by deadlines derived from the task
//! category. Every failure comes back as data in a [`TaskResult`].
//!
//! # Main types
//!
//! - [`TaskCoordinator`] — Runs one task at a time through the engine.
//! - [`DistributionEngine`] — Decides how a task fans out; [`BroadcastEngine`]
//!   is the built-in one.
//! - [`ParticipantRegistry`] — Ordered participants, with protected-participant cleanup.
//! - [`TimeoutPolicy`] — Category deadlines and cancelling deadline races.
//! - [`ResponseObserver`] — Counts and truncates intermediate messages for display.

/// Task coordinator state machine.
pub mod coordinator;
/// Distribution engine contract and the broadcast engine.
pub mod engine;
/// Display-capped observation of participant messages.
pub mod observer;
/// Participant registry and cleanup.
pub mod registry;
/// Operator-facing rendering of task results.
pub mod report;
/// Adaptive deadlines and progress reporting.
pub mod timeout;
/// Shared coordination types (Task, Participant, TaskResult, etc.).
pub mod types;

pub use coordinator::TaskCoordinator;
pub use engine::{BroadcastEngine, DistributionEngine, DistributionRequest, PendingResult};
pub use observer::{truncate, DisplaySink, ResponseObserver, TracingDisplay};
pub use registry::{CleanupReport, Deregister, LocalDeregister, ParticipantRegistry};
pub use report::{remediation_hints, render_result};
pub use timeout::{
    ProgressSink, ProgressUpdate, TimeoutPolicy, TimeoutProfile, TracingProgress, CANCEL_GRACE,
    FINAL_RESULT_CAP_SECS,
};
pub use types::{
    CoordinatorConfig, CoordinatorState, FailureInfo, FailureKind, FailurePhase, ObservedMessage,
    Participant, Task, TaskCategory, TaskResult,
};
