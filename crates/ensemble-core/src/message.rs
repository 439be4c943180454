use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An intermediate message emitted by a participant while a task is being
/// distributed. The engine hands these to the response observer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentMessage {
    /// Identity of the participant that produced the message.
    pub source: String,
    /// Full, untruncated content.
    pub content: String,
    /// UTC timestamp of when the message was produced.
    pub timestamp: DateTime<Utc>,
}

impl AgentMessage {
    /// Creates a new message stamped with the current time.
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}
