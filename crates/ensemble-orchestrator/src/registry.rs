use crate::types::Participant;
use async_trait::async_trait;
use ensemble_core::{EnsembleError, EnsembleResult};
use serde::Serialize;
use tracing::{info, warn};

/// Releases a participant in whatever external system created it.
#[async_trait]
pub trait Deregister: Send + Sync {
    /// Release `participant` on its hosting side. Failures are usually
    /// [`EnsembleError::Provider`].
    async fn deregister(&self, participant: &Participant) -> EnsembleResult<()>;
}

/// Deregistration for in-process participants: nothing to release.
pub struct LocalDeregister;

#[async_trait]
impl Deregister for LocalDeregister {
    async fn deregister(&self, _participant: &Participant) -> EnsembleResult<()> {
        Ok(())
    }
}

/// Outcome of [`ParticipantRegistry::cleanup`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<String>,
    pub retained: Vec<String>,
    /// Identity and error message of each failed deregistration.
    pub failed: Vec<(String, String)>,
}

/// Ordered set of participants available to the coordinator.
///
/// Registration order is preserved so fan-out order is reproducible.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: Vec<Participant>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, participant: Participant) -> EnsembleResult<()> {
        if self.get(&participant.identity).is_some() {
            return Err(EnsembleError::DuplicateParticipant(participant.identity));
        }
        info!(
            participant = %participant.identity,
            capability = %participant.capability.descriptor().name,
            protected = participant.protected,
            "Registered participant"
        );
        self.participants.push(participant);
        Ok(())
    }

    /// All participants in registration order.
    pub fn all(&self) -> &[Participant] {
        &self.participants
    }

    pub fn get(&self, identity: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.identity == identity)
    }

    pub fn identities(&self) -> Vec<&str> {
        self.participants.iter().map(|p| p.identity.as_str()).collect()
    }

    /// Remove a participant. Protected participants are left in place and
    /// reported as [`EnsembleError::ProtectedParticipant`].
    pub fn remove(&mut self, identity: &str) -> EnsembleResult<Participant> {
        let index = self
            .participants
            .iter()
            .position(|p| p.identity == identity)
            .ok_or_else(|| EnsembleError::UnknownParticipant(identity.to_string()))?;

        if self.participants[index].protected {
            warn!(participant = %identity, "Refusing to remove protected participant");
            return Err(EnsembleError::ProtectedParticipant(identity.to_string()));
        }

        info!(participant = %identity, "Removed participant");
        Ok(self.participants.remove(index))
    }

    /// Deregister and remove every ephemeral participant, keeping protected
    /// ones. Failures are recorded in the report and the walk continues.
    pub async fn cleanup(&mut self, hook: &dyn Deregister) -> CleanupReport {
        let mut report = CleanupReport::default();
        let mut kept = Vec::new();

        for participant in std::mem::take(&mut self.participants) {
            if participant.protected {
                info!(participant = %participant.identity, "Retained protected participant");
                report.retained.push(participant.identity.clone());
                kept.push(participant);
                continue;
            }

            match hook.deregister(&participant).await {
                Ok(()) => {
                    info!(participant = %participant.identity, "Deregistered participant");
                    report.removed.push(participant.identity);
                }
                Err(e) => {
                    warn!(
                        participant = %participant.identity,
                        error = %e,
                        "Failed to deregister participant"
                    );
                    report.failed.push((participant.identity, e.to_string()));
                }
            }
        }

        self.participants = kept;
        report
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
