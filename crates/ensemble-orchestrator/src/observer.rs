use crate::types::ObservedMessage;
use ensemble_core::AgentMessage;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info};

/// Renders observed messages for the operator.
pub trait DisplaySink: Send + Sync {
    fn on_message(&self, message: &ObservedMessage);

    /// Called once, for the first message past the display budget.
    fn on_budget_exhausted(&self, max_iterations: u32);
}

/// Default sink: observed messages as log events.
pub struct TracingDisplay;

impl DisplaySink for TracingDisplay {
    fn on_message(&self, message: &ObservedMessage) {
        info!(
            participant = %message.source_participant,
            seq = message.sequence_number,
            elapsed_s = message.elapsed_seconds,
            content = %message.content,
            "Participant response"
        );
    }

    fn on_budget_exhausted(&self, max_iterations: u32) {
        info!(max_iterations, "Response budget reached, waiting for the final result");
    }
}

struct ObserverState {
    count: u32,
    messages: Vec<ObservedMessage>,
    started: Instant,
}

/// Counts, truncates and timestamps intermediate participant messages.
///
/// Rendering stops after `max_iterations` messages; counting does not, and the
/// distribution process is never affected.
pub struct ResponseObserver {
    max_iterations: u32,
    display_chars: usize,
    sink: Arc<dyn DisplaySink>,
    state: Mutex<ObserverState>,
}

impl ResponseObserver {
    pub fn new(max_iterations: u32, display_chars: usize) -> Self {
        Self {
            max_iterations,
            display_chars,
            sink: Arc::new(TracingDisplay),
            state: Mutex::new(ObserverState {
                count: 0,
                messages: Vec::new(),
                started: Instant::now(),
            }),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DisplaySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Clear the counter and log and restart the elapsed clock.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.count = 0;
        state.messages.clear();
        state.started = Instant::now();
    }

    pub fn on_message(&self, message: &AgentMessage) {
        let observed = {
            let mut state = self.state.lock();
            state.count += 1;
            let count = state.count;

            if count > self.max_iterations {
                drop(state);
                if count == self.max_iterations + 1 {
                    self.sink.on_budget_exhausted(self.max_iterations);
                } else {
                    debug!(seq = count, participant = %message.source, "Suppressed response");
                }
                return;
            }

            let observed = ObservedMessage {
                source_participant: message.source.clone(),
                sequence_number: count,
                elapsed_seconds: state.started.elapsed().as_secs_f64(),
                content: truncate(&message.content, self.display_chars),
            };
            state.messages.push(observed.clone());
            observed
        };
        self.sink.on_message(&observed);
    }

    /// Messages seen since the last reset, including suppressed ones.
    pub fn count(&self) -> u32 {
        self.state.lock().count
    }

    /// Rendered messages since the last reset.
    pub fn messages(&self) -> Vec<ObservedMessage> {
        self.state.lock().messages.clone()
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }
}

/// Cut `content` to `max_chars` characters, marking the cut with `...`.
pub fn truncate(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}
