#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end coordinator tests.
//!
//! A scripted distribution engine stands in for the reasoning engine so
//! deadlines, cancellation and observation can be checked deterministically
//! under paused time.

use async_trait::async_trait;
use ensemble_builtins::{
    BusinessIntelligenceCapability, BusinessIntelligenceConfig, SearchCapability, SearchConfig,
    WorkflowCapability, WorkflowConfig,
};
use ensemble_core::{AgentMessage, EnsembleError, EnsembleResult};
use ensemble_orchestrator::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Scripted engine
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum Script {
    /// Dispatch is accepted at once; the final text arrives after `after`,
    /// with `messages` emitted evenly along the way.
    Resolve {
        after: Duration,
        messages: usize,
        final_text: &'static str,
    },
    /// Dispatch never completes on its own.
    StallDispatch,
    /// Dispatch is accepted but the final text never arrives.
    StallFinal,
}

struct ScriptedEngine {
    script: Script,
    cancellations: Arc<AtomicU32>,
    dispatched: Arc<AtomicU32>,
}

impl ScriptedEngine {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            cancellations: Arc::new(AtomicU32::new(0)),
            dispatched: Arc::new(AtomicU32::new(0)),
        })
    }
}

#[async_trait]
impl DistributionEngine for ScriptedEngine {
    async fn invoke(
        &self,
        request: DistributionRequest,
        cancel: CancellationToken,
    ) -> EnsembleResult<Box<dyn PendingResult>> {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        if let Script::StallDispatch = self.script {
            cancel.cancelled().await;
            self.cancellations.fetch_add(1, Ordering::SeqCst);
            return Err(EnsembleError::Cancelled);
        }
        Ok(Box::new(ScriptedPending {
            script: self.script.clone(),
            participants: request
                .participants
                .iter()
                .map(|p| p.identity.clone())
                .collect(),
            observer: request.observer,
            cancellations: self.cancellations.clone(),
        }))
    }
}

struct ScriptedPending {
    script: Script,
    participants: Vec<String>,
    observer: Arc<ResponseObserver>,
    cancellations: Arc<AtomicU32>,
}

#[async_trait]
impl PendingResult for ScriptedPending {
    async fn get(self: Box<Self>, cancel: CancellationToken) -> EnsembleResult<String> {
        match self.script {
            Script::Resolve {
                after,
                messages,
                final_text,
            } => {
                let step = after / messages.max(1) as u32;
                for i in 0..messages {
                    tokio::select! {
                        _ = tokio::time::sleep(step) => {}
                        _ = cancel.cancelled() => {
                            self.cancellations.fetch_add(1, Ordering::SeqCst);
                            return Err(EnsembleError::Cancelled);
                        }
                    }
                    let source = &self.participants[i % self.participants.len()];
                    self.observer
                        .on_message(&AgentMessage::new(source, format!("intermediate {i}")));
                }
                Ok(final_text.to_string())
            }
            _ => {
                cancel.cancelled().await;
                self.cancellations.fetch_add(1, Ordering::SeqCst);
                Err(EnsembleError::Cancelled)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn two_participants() -> ParticipantRegistry {
    let mut registry = ParticipantRegistry::new();
    registry
        .register(
            Participant::new(
                "SearchAgent",
                "Hotel and document search",
                Arc::new(SearchCapability::new(SearchConfig::default())),
            )
            .protected(),
        )
        .unwrap();
    registry
        .register(Participant::new(
            "WorkflowAgent",
            "Email and time",
            Arc::new(WorkflowCapability::new(WorkflowConfig::default())),
        ))
        .unwrap();
    registry
}

fn coordinator_with(
    engine: Arc<dyn DistributionEngine>,
    response_timeout: u64,
    max_iterations: u32,
) -> TaskCoordinator {
    let config = CoordinatorConfig {
        response_timeout,
        max_iterations,
        ..CoordinatorConfig::default()
    };
    let coordinator =
        TaskCoordinator::new(config, TimeoutProfile::default(), two_participants(), engine);
    coordinator.start_runtime();
    coordinator
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn resolves_with_three_messages() {
    let engine = ScriptedEngine::new(Script::Resolve {
        after: Duration::from_secs(1),
        messages: 3,
        final_text: "OK",
    });
    let coordinator = coordinator_with(engine.clone(), 60, 15);

    let result = coordinator
        .process_query("What time is it?", TaskCategory::Simple)
        .await;

    assert!(result.success);
    assert_eq!(result.response_count, 3);
    assert_eq!(result.final_text.as_deref(), Some("OK"));
    assert_eq!(result.category, TaskCategory::Simple);
    assert!(result.failure.is_none());
    assert!(result.elapsed_seconds >= 1.0 && result.elapsed_seconds < 1.5);
    assert_eq!(engine.cancellations.load(Ordering::SeqCst), 0);

    let seqs: Vec<u32> = coordinator
        .observer()
        .messages()
        .iter()
        .map(|m| m.sequence_number)
        .collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(coordinator.state(), CoordinatorState::Idle);

    coordinator.stop_runtime().await;
}

#[tokio::test(start_paused = true)]
async fn stalled_dispatch_times_out_and_cancels_once() {
    let engine = ScriptedEngine::new(Script::StallDispatch);
    let coordinator = coordinator_with(engine.clone(), 60, 15);
    assert_eq!(coordinator.policy().effective_timeout(TaskCategory::Simple), 60);

    let result = coordinator
        .process_query("Send a test email", TaskCategory::Simple)
        .await;

    assert!(!result.success);
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert_eq!(failure.phase, FailurePhase::Dispatch);
    assert!(result.elapsed_seconds >= 60.0);
    assert!(result.elapsed_seconds < 60.0 + CANCEL_GRACE.as_secs_f64());
    assert_eq!(engine.cancellations.load(Ordering::SeqCst), 1);

    tokio::time::timeout(Duration::from_secs(1), coordinator.stop_runtime())
        .await
        .expect("no orphaned work after a timeout");
    assert_eq!(engine.cancellations.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn stalled_final_result_uses_shorter_deadline() {
    let engine = ScriptedEngine::new(Script::StallFinal);
    let coordinator = coordinator_with(engine.clone(), 60, 15);

    let result = coordinator
        .process_query("Compare holiday and weekday trips", TaskCategory::Analysis)
        .await;

    assert!(!result.success);
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.kind, FailureKind::Timeout);
    assert_eq!(failure.phase, FailurePhase::FinalResult);
    // effective = min(60, 240) = 60, final-result deadline = min(30, 60 / 2)
    assert!(result.elapsed_seconds >= 30.0 && result.elapsed_seconds < 31.0);
    assert_eq!(engine.cancellations.load(Ordering::SeqCst), 1);

    coordinator.stop_runtime().await;
}

#[tokio::test(start_paused = true)]
async fn display_budget_does_not_stop_dispatch() {
    let engine = ScriptedEngine::new(Script::Resolve {
        after: Duration::from_secs(5),
        messages: 5,
        final_text: "aggregated",
    });
    let coordinator = coordinator_with(engine.clone(), 90, 2);

    let result = coordinator
        .process_query("Find hotels and analyze bookings", TaskCategory::MultiAgent)
        .await;

    assert!(result.success);
    assert_eq!(result.response_count, 5);
    assert_eq!(coordinator.observer().messages().len(), 2);
    assert_eq!(engine.cancellations.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_submission_is_rejected_as_busy() {
    let engine = ScriptedEngine::new(Script::StallDispatch);
    let coordinator = Arc::new(coordinator_with(engine.clone(), 60, 15));

    let first = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .process_query("long running", TaskCategory::Complex)
                .await
        })
    };
    while engine.dispatched.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(coordinator.state(), CoordinatorState::Dispatching);

    let second = coordinator
        .process_query("second", TaskCategory::Simple)
        .await;
    assert!(!second.success);
    assert_eq!(second.failure.unwrap().kind, FailureKind::Busy);

    let first = first.await.unwrap();
    assert_eq!(first.failure.unwrap().kind, FailureKind::Timeout);
    assert_eq!(coordinator.state(), CoordinatorState::Idle);
    assert_eq!(engine.dispatched.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn protected_participant_survives_removal_and_cleanup() {
    let engine = ScriptedEngine::new(Script::StallDispatch);
    let coordinator = coordinator_with(engine, 60, 15);

    let err = coordinator.remove_participant("SearchAgent").unwrap_err();
    assert!(matches!(err, EnsembleError::ProtectedParticipant(_)));
    assert_eq!(coordinator.participants().len(), 2);

    let report = coordinator.cleanup(&LocalDeregister).await;
    assert_eq!(report.retained, vec!["SearchAgent"]);
    assert_eq!(report.removed, vec!["WorkflowAgent"]);
    let remaining: Vec<String> = coordinator
        .participants()
        .into_iter()
        .map(|p| p.identity)
        .collect();
    assert_eq!(remaining, vec!["SearchAgent"]);
}

#[tokio::test]
async fn broadcast_engine_over_builtin_participants() {
    let mut registry = two_participants();
    registry
        .register(Participant::new(
            "FabricAgent",
            "Lakehouse KPIs",
            Arc::new(BusinessIntelligenceCapability::new(
                BusinessIntelligenceConfig::default(),
            )),
        ))
        .unwrap();

    let coordinator = TaskCoordinator::new(
        CoordinatorConfig::default(),
        TimeoutProfile::default(),
        registry,
        Arc::new(BroadcastEngine::new()),
    );
    coordinator.start_runtime();

    let result = coordinator
        .process_query("Recommend luxury hotels", TaskCategory::Search)
        .await;

    assert!(result.success, "{result:?}");
    assert_eq!(result.response_count, 3);
    let text = result.final_text.unwrap();
    assert!(text.contains("## SearchAgent"));
    assert!(text.contains("## WorkflowAgent"));
    assert!(text.contains("current_time"));
    // Unconfigured lakehouse reports a structured fault as content.
    assert!(text.contains("error: Business intelligence connection not initialized"));

    coordinator.stop_runtime().await;
}
