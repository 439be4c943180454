use crate::engine::{DistributionEngine, DistributionRequest, PendingResult};
use crate::observer::{DisplaySink, ResponseObserver};
use crate::registry::{CleanupReport, Deregister, ParticipantRegistry};
use crate::report::remediation_hints;
use crate::timeout::{ProgressSink, TimeoutPolicy, TimeoutProfile};
use crate::types::{
    CoordinatorConfig, CoordinatorState, FailureInfo, FailureKind, FailurePhase, Participant, Task,
    TaskCategory, TaskResult,
};
use ensemble_core::{EnsembleError, EnsembleResult};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;
use tracing::{info, instrument, warn};

/// Fans one task at a time out through a distribution engine, bounding both
/// waits with adaptive deadlines.
///
/// `process_query` never fails: timeouts, engine errors and a concurrent
/// submission all come back as an unsuccessful [`TaskResult`].
pub struct TaskCoordinator {
    config: CoordinatorConfig,
    registry: RwLock<ParticipantRegistry>,
    engine: Arc<dyn DistributionEngine>,
    policy: TimeoutPolicy,
    observer: Arc<ResponseObserver>,
    state: Mutex<CoordinatorState>,
    tracker: TaskTracker,
}

impl TaskCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        profile: TimeoutProfile,
        registry: ParticipantRegistry,
        engine: Arc<dyn DistributionEngine>,
    ) -> Self {
        let policy = TimeoutPolicy::new(
            profile,
            config.response_timeout,
            config.progress_interval(),
        );
        let observer = Arc::new(ResponseObserver::new(
            config.max_iterations,
            config.display_chars,
        ));
        Self {
            config,
            registry: RwLock::new(registry),
            engine,
            policy,
            observer,
            state: Mutex::new(CoordinatorState::Idle),
            tracker: TaskTracker::new(),
        }
    }

    /// Render intermediate messages through `sink`.
    pub fn with_display_sink(mut self, sink: Arc<dyn DisplaySink>) -> Self {
        self.observer = Arc::new(
            ResponseObserver::new(self.config.max_iterations, self.config.display_chars)
                .with_sink(sink),
        );
        self
    }

    /// Report wait progress through `sink`.
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.policy = self.policy.with_sink(sink);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn policy(&self) -> &TimeoutPolicy {
        &self.policy
    }

    pub fn observer(&self) -> &Arc<ResponseObserver> {
        &self.observer
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.lock()
    }

    // --- Participants ---

    /// Snapshot of the registered participants, in registration order.
    pub fn participants(&self) -> Vec<Participant> {
        self.registry.read().all().to_vec()
    }

    pub fn register(&self, participant: Participant) -> EnsembleResult<()> {
        self.registry.write().register(participant)
    }

    pub fn remove_participant(&self, identity: &str) -> EnsembleResult<Participant> {
        self.registry.write().remove(identity)
    }

    /// Deregister every ephemeral participant. Protected ones stay registered.
    pub async fn cleanup(&self, hook: &dyn Deregister) -> CleanupReport {
        let mut registry = std::mem::take(&mut *self.registry.write());
        let report = registry.cleanup(hook).await;
        *self.registry.write() = registry;
        info!(
            removed = report.removed.len(),
            retained = report.retained.len(),
            failed = report.failed.len(),
            "Participant cleanup complete"
        );
        report
    }

    // --- Runtime ---

    /// Accept timed operations.
    pub fn start_runtime(&self) {
        self.tracker.reopen();
        info!(
            response_timeout_s = self.config.response_timeout,
            max_iterations = self.config.max_iterations,
            "Coordinator runtime started"
        );
    }

    /// Wait for in-flight operations to drain, then shut the engine down.
    pub async fn stop_runtime(&self) {
        self.tracker.close();
        info!(in_flight = self.tracker.len(), "Stopping coordinator runtime when idle");
        self.tracker.wait().await;
        self.engine.shutdown().await;
        info!("Coordinator runtime stopped");
    }

    // --- Task processing ---

    /// Distribute one task and wait for its aggregated result.
    #[instrument(skip_all, fields(category = %category))]
    pub async fn process_query(&self, description: &str, category: TaskCategory) -> TaskResult {
        let task = Task::new(description, category);
        let started = Instant::now();

        let Some(_busy) = self.begin() else {
            warn!(task_id = %task.id, "Rejected task: another task is in flight");
            let failure = FailureInfo {
                kind: FailureKind::Busy,
                phase: FailurePhase::Dispatch,
                message: "Another task is already in flight".to_string(),
                hints: remediation_hints(category, FailureKind::Busy),
            };
            return TaskResult {
                task_id: task.id,
                success: false,
                elapsed_seconds: 0.0,
                response_count: 0,
                category,
                final_text: None,
                failure: Some(failure),
            };
        };

        self.observer.reset();
        let effective = self.policy.effective_timeout(category);
        info!(
            task_id = %task.id,
            effective_timeout_s = effective,
            participants = self.registry.read().len(),
            "Processing task"
        );

        let pending = match self.dispatch(&task, effective).await {
            Ok(pending) => pending,
            Err(e) => return self.fail(&task, started, FailurePhase::Dispatch, e),
        };

        self.set_state(CoordinatorState::AwaitingFinal);
        let final_timeout = TimeoutPolicy::final_result_timeout(effective);
        let outcome = self
            .policy
            .with_progress(
                &self.tracker,
                "Waiting for the final result",
                final_timeout,
                move |cancel| pending.get(cancel),
            )
            .await;

        match outcome {
            Ok(text) => {
                self.set_state(CoordinatorState::Succeeded);
                let elapsed = started.elapsed().as_secs_f64();
                let response_count = self.observer.count();
                info!(
                    task_id = %task.id,
                    elapsed_s = elapsed,
                    responses = response_count,
                    "Task succeeded"
                );
                TaskResult {
                    task_id: task.id,
                    success: true,
                    elapsed_seconds: elapsed,
                    response_count,
                    category,
                    final_text: Some(text),
                    failure: None,
                }
            }
            Err(e) => self.fail(&task, started, FailurePhase::FinalResult, e),
        }
    }

    async fn dispatch(
        &self,
        task: &Task,
        effective: u64,
    ) -> EnsembleResult<Box<dyn PendingResult>> {
        let request = DistributionRequest {
            task: task.clone(),
            participants: self.participants(),
            observer: self.observer.clone(),
        };
        let engine = self.engine.clone();
        let label = format!("Processing {} task", task.category);
        self.policy
            .with_progress(&self.tracker, &label, effective, move |cancel| async move {
                engine.invoke(request, cancel).await
            })
            .await
    }

    fn fail(
        &self,
        task: &Task,
        started: Instant,
        phase: FailurePhase,
        error: EnsembleError,
    ) -> TaskResult {
        let kind = if error.is_timeout() {
            self.set_state(CoordinatorState::TimedOut);
            FailureKind::Timeout
        } else {
            self.set_state(CoordinatorState::Failed);
            FailureKind::CoordinatorFault
        };
        let elapsed = started.elapsed().as_secs_f64();
        warn!(
            task_id = %task.id,
            phase = %phase,
            kind = %kind,
            elapsed_s = elapsed,
            error = %error,
            "Task failed"
        );
        TaskResult {
            task_id: task.id,
            success: false,
            elapsed_seconds: elapsed,
            response_count: self.observer.count(),
            category: task.category,
            final_text: None,
            failure: Some(FailureInfo {
                kind,
                phase,
                message: error.to_string(),
                hints: remediation_hints(task.category, kind),
            }),
        }
    }

    /// Move from `Idle` to `Dispatching`, or `None` when a task is in flight.
    fn begin(&self) -> Option<InFlight<'_>> {
        let mut state = self.state.lock();
        if state.is_busy() {
            return None;
        }
        *state = CoordinatorState::Dispatching;
        Some(InFlight { state: &self.state })
    }

    fn set_state(&self, next: CoordinatorState) {
        *self.state.lock() = next;
    }
}

/// Returns the coordinator to `Idle` when the task is over, however it ended.
struct InFlight<'a> {
    state: &'a Mutex<CoordinatorState>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self.state.lock() = CoordinatorState::Idle;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    struct Immediate(&'static str);

    #[async_trait]
    impl PendingResult for Immediate {
        async fn get(self: Box<Self>, _cancel: CancellationToken) -> EnsembleResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct ImmediateEngine;

    #[async_trait]
    impl DistributionEngine for ImmediateEngine {
        async fn invoke(
            &self,
            request: DistributionRequest,
            _cancel: CancellationToken,
        ) -> EnsembleResult<Box<dyn PendingResult>> {
            request
                .observer
                .on_message(&ensemble_core::AgentMessage::new("Stub", request.task.description));
            Ok(Box::new(Immediate("done")))
        }
    }

    struct FailingEngine;

    #[async_trait]
    impl DistributionEngine for FailingEngine {
        async fn invoke(
            &self,
            _request: DistributionRequest,
            _cancel: CancellationToken,
        ) -> EnsembleResult<Box<dyn PendingResult>> {
            Err(EnsembleError::Engine("manager unavailable".to_string()))
        }
    }

    fn coordinator(engine: Arc<dyn DistributionEngine>) -> TaskCoordinator {
        TaskCoordinator::new(
            CoordinatorConfig::default(),
            TimeoutProfile::default(),
            ParticipantRegistry::new(),
            engine,
        )
    }

    #[tokio::test]
    async fn test_success_returns_to_idle() {
        let coordinator = coordinator(Arc::new(ImmediateEngine));
        coordinator.start_runtime();

        let result = coordinator.process_query("what time is it", TaskCategory::Simple).await;
        assert!(result.success);
        assert_eq!(result.final_text.as_deref(), Some("done"));
        assert_eq!(result.response_count, 1);
        assert_eq!(coordinator.state(), CoordinatorState::Idle);

        coordinator.stop_runtime().await;
    }

    #[tokio::test]
    async fn test_engine_error_is_coordinator_fault() {
        let coordinator = coordinator(Arc::new(FailingEngine));
        let result = coordinator.process_query("anything", TaskCategory::Complex).await;

        assert!(!result.success);
        let failure = result.failure.unwrap();
        assert_eq!(failure.kind, FailureKind::CoordinatorFault);
        assert_eq!(failure.phase, FailurePhase::Dispatch);
        assert!(failure.message.contains("manager unavailable"));
        assert!(failure.hints.iter().any(|h| h.contains("Split")));
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }

    #[tokio::test]
    async fn test_counter_resets_between_tasks() {
        let coordinator = coordinator(Arc::new(ImmediateEngine));
        let first = coordinator.process_query("one", TaskCategory::Simple).await;
        let second = coordinator.process_query("two", TaskCategory::Simple).await;
        assert_eq!(first.response_count, 1);
        assert_eq!(second.response_count, 1);
        assert_eq!(coordinator.observer().messages()[0].sequence_number, 1);
    }
}
