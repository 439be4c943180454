use crate::observer::ResponseObserver;
use crate::types::{Participant, Task};
use async_trait::async_trait;
use ensemble_core::{AgentMessage, EnsembleError, EnsembleResult};
use ensemble_skills::{is_fault, CapabilityDescriptor, CapabilityRequest};
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Everything an engine needs to distribute one task.
pub struct DistributionRequest {
    pub task: Task,
    /// Participants in registration order.
    pub participants: Vec<Participant>,
    /// Sink for intermediate participant messages.
    pub observer: Arc<ResponseObserver>,
}

/// Handle to a distribution whose fan-out has been accepted but whose final
/// text may not be ready yet.
#[async_trait]
pub trait PendingResult: Send {
    /// Wait for the aggregated final text. Must stop promptly once `cancel`
    /// fires.
    async fn get(self: Box<Self>, cancel: CancellationToken) -> EnsembleResult<String>;
}

/// Decides how a task fans out across participants and when it converges.
#[async_trait]
pub trait DistributionEngine: Send + Sync {
    /// Start distributing `request`. Returns once the fan-out is accepted.
    async fn invoke(
        &self,
        request: DistributionRequest,
        cancel: CancellationToken,
    ) -> EnsembleResult<Box<dyn PendingResult>>;

    /// Release engine resources, waiting for in-flight work to finish.
    async fn shutdown(&self) {}
}

/// Engine that hands the task to every participant at once.
///
/// Each participant's primary operation is invoked with the task text filled
/// into every required parameter. Provider results are reported to the
/// observer as they arrive, and the final text has one section per
/// participant in registration order. Structured provider faults are
/// reported like any other result.
pub struct BroadcastEngine {
    tracker: TaskTracker,
}

impl BroadcastEngine {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }
}

impl Default for BroadcastEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DistributionEngine for BroadcastEngine {
    async fn invoke(
        &self,
        request: DistributionRequest,
        cancel: CancellationToken,
    ) -> EnsembleResult<Box<dyn PendingResult>> {
        if request.participants.is_empty() {
            return Err(EnsembleError::Engine("No participants registered".to_string()));
        }
        if cancel.is_cancelled() {
            return Err(EnsembleError::Cancelled);
        }

        info!(
            task_id = %request.task.id,
            participants = request.participants.len(),
            "Broadcasting task"
        );
        let handle = self.tracker.spawn(broadcast(request));
        Ok(Box::new(BroadcastPending {
            handle: Some(handle),
        }))
    }

    async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        debug!("Broadcast engine drained");
    }
}

struct BroadcastPending {
    handle: Option<JoinHandle<String>>,
}

#[async_trait]
impl PendingResult for BroadcastPending {
    async fn get(self: Box<Self>, cancel: CancellationToken) -> EnsembleResult<String> {
        let mut this = self;
        let Some(mut handle) = this.handle.take() else {
            return Err(EnsembleError::Engine("Result already taken".to_string()));
        };

        tokio::select! {
            biased;

            joined = &mut handle => {
                joined.map_err(|e| EnsembleError::Engine(format!("Broadcast failed: {e}")))
            }
            _ = cancel.cancelled() => {
                handle.abort();
                Err(EnsembleError::Cancelled)
            }
        }
    }
}

impl Drop for BroadcastPending {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn broadcast(request: DistributionRequest) -> String {
    let DistributionRequest {
        task,
        participants,
        observer,
    } = request;

    let mut pending: FuturesUnordered<_> = participants
        .iter()
        .enumerate()
        .map(|(index, participant)| {
            let descriptor = participant.capability.descriptor();
            let call = CapabilityRequest::new(
                descriptor.primary_operation.clone(),
                task_arguments(descriptor, &task.description),
            );
            let capability = participant.capability.clone();
            async move {
                let started = Instant::now();
                let value = capability.invoke(call).await;
                (index, value, started.elapsed())
            }
        })
        .collect();

    let mut sections: Vec<Option<String>> = vec![None; participants.len()];
    while let Some((index, value, took)) = pending.next().await {
        let participant = &participants[index];
        if is_fault(&value) {
            warn!(
                participant = %participant.identity,
                error = %value["error"],
                "Participant reported a fault"
            );
        } else {
            debug!(
                participant = %participant.identity,
                duration_ms = took.as_millis() as u64,
                "Participant responded"
            );
        }
        let text = render_value(&value);
        observer.on_message(&AgentMessage::new(&participant.identity, text.clone()));
        sections[index] = Some(text);
    }

    participants
        .iter()
        .zip(sections)
        .map(|(participant, text)| {
            format!(
                "## {}\n{}",
                participant.identity,
                text.unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Arguments for a primary operation: the task text in every required
/// parameter.
fn task_arguments(descriptor: &CapabilityDescriptor, text: &str) -> Value {
    let required = descriptor
        .operations
        .iter()
        .find(|op| op.name == descriptor.primary_operation)
        .and_then(|op| op.parameters_schema["required"].as_array().cloned())
        .unwrap_or_default();

    let mut arguments = Map::new();
    for name in required.iter().filter_map(Value::as_str) {
        arguments.insert(name.to_string(), Value::String(text.to_string()));
    }
    Value::Object(arguments)
}

/// Operator-facing text for a provider result.
fn render_value(value: &Value) -> String {
    if is_fault(value) {
        let error = value["error"].as_str().unwrap_or("unknown error");
        return match value["details"].as_str().filter(|d| !d.is_empty()) {
            Some(details) => format!("error: {error} ({details})"),
            None => format!("error: {error}"),
        };
    }
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}
