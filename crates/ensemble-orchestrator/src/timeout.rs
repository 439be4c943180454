use crate::types::TaskCategory;
use ensemble_core::{EnsembleError, EnsembleResult};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Upper bound on the final-result wait, in seconds.
pub const FINAL_RESULT_CAP_SECS: u64 = 30;

/// How long a cancelled operation may take to unwind before it is aborted.
pub const CANCEL_GRACE: Duration = Duration::from_secs(2);

/// Static category → recommended deadline table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutProfile {
    table: BTreeMap<TaskCategory, u64>,
}

impl Default for TimeoutProfile {
    fn default() -> Self {
        let table = BTreeMap::from([
            (TaskCategory::Simple, 120),
            (TaskCategory::Search, 180),
            (TaskCategory::Analysis, 240),
            (TaskCategory::MultiAgent, 300),
            (TaskCategory::Complex, 360),
            (TaskCategory::Default, 60),
        ]);
        Self { table }
    }
}

impl TimeoutProfile {
    /// Replace the recommended deadline for one category.
    pub fn with_override(mut self, category: TaskCategory, seconds: u64) -> Self {
        self.table.insert(category, seconds);
        self
    }

    pub fn recommended(&self, category: TaskCategory) -> u64 {
        self.table
            .get(&category)
            .or_else(|| self.table.get(&TaskCategory::Default))
            .copied()
            .unwrap_or(60)
    }
}

/// A progress notice emitted while a timed operation is pending.
#[derive(Debug, Clone)]
pub struct ProgressUpdate<'a> {
    pub label: &'a str,
    pub elapsed: Duration,
    pub remaining: Duration,
}

/// Receives progress notices. Never influences the timed operation.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate<'_>);

    /// Called once when the timed operation settles, whatever the outcome.
    fn on_complete(&self, _label: &str) {}
}

/// Default sink: progress as debug-level log events.
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_progress(&self, update: &ProgressUpdate<'_>) {
        debug!(
            label = %update.label,
            elapsed_s = update.elapsed.as_secs_f64(),
            remaining_s = update.remaining.as_secs_f64(),
            "Waiting"
        );
    }
}

/// Maps categories to deadlines and races operations against them.
pub struct TimeoutPolicy {
    profile: TimeoutProfile,
    response_timeout: u64,
    progress_interval: Duration,
    sink: Arc<dyn ProgressSink>,
}

impl TimeoutPolicy {
    pub fn new(
        profile: TimeoutProfile,
        response_timeout: u64,
        progress_interval: Duration,
    ) -> Self {
        Self {
            profile,
            response_timeout,
            progress_interval,
            sink: Arc::new(TracingProgress),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn profile(&self) -> &TimeoutProfile {
        &self.profile
    }

    pub fn response_timeout(&self) -> u64 {
        self.response_timeout
    }

    pub fn recommended_timeout(&self, category: TaskCategory) -> u64 {
        self.profile.recommended(category)
    }

    /// `min(response_timeout, recommended_timeout(category))`.
    pub fn effective_timeout(&self, category: TaskCategory) -> u64 {
        self.response_timeout.min(self.recommended_timeout(category))
    }

    /// Deadline for retrieving the final text once dispatch has completed.
    pub fn final_result_timeout(effective: u64) -> u64 {
        FINAL_RESULT_CAP_SECS.min(effective / 2)
    }

    /// Run `operation` on `tracker` until it completes or `timeout_secs`
    /// elapse, reporting progress every interval.
    ///
    /// The operation receives a [`CancellationToken`]. On timeout the token is
    /// cancelled once, the operation gets [`CANCEL_GRACE`] to finish, and is
    /// then aborted; the call fails with [`EnsembleError::Timeout`]. Dropping
    /// the returned future also cancels the token.
    pub async fn with_progress<F, Fut, T>(
        &self,
        tracker: &TaskTracker,
        label: &str,
        timeout_secs: u64,
        operation: F,
    ) -> EnsembleResult<T>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = EnsembleResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let cancel = CancellationToken::new();
        let mut handle = tracker.spawn(operation(cancel.clone()));
        // Cancels the operation if this future is dropped while it is pending.
        let guard = cancel.clone().drop_guard();

        let started = Instant::now();
        let timeout = Duration::from_secs(timeout_secs);
        let deadline = tokio::time::sleep_until(started + timeout);
        tokio::pin!(deadline);

        let mut ticker =
            tokio::time::interval_at(started + self.progress_interval, self.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                joined = &mut handle => {
                    guard.disarm();
                    self.sink.on_complete(label);
                    return match joined {
                        Ok(result) => result,
                        Err(e) => Err(EnsembleError::Coordinator(format!("{label} failed: {e}"))),
                    };
                }
                _ = &mut deadline => break,
                _ = ticker.tick() => {
                    let elapsed = started.elapsed();
                    self.sink.on_progress(&ProgressUpdate {
                        label,
                        elapsed,
                        remaining: timeout.saturating_sub(elapsed),
                    });
                }
            }
        }

        self.sink.on_complete(label);
        warn!(label = %label, timeout_s = timeout_secs, "Deadline exceeded, cancelling");
        drop(guard);
        if tokio::time::timeout(CANCEL_GRACE, &mut handle).await.is_err() {
            warn!(label = %label, "Operation ignored cancellation, aborting");
            handle.abort();
        }

        Err(EnsembleError::Timeout {
            label: label.to_string(),
            seconds: timeout_secs,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(response_timeout: u64) -> TimeoutPolicy {
        TimeoutPolicy::new(
            TimeoutProfile::default(),
            response_timeout,
            Duration::from_millis(500),
        )
    }

    #[derive(Default)]
    struct RecordingSink {
        updates: Mutex<Vec<Duration>>,
        completed: AtomicU32,
    }

    impl ProgressSink for RecordingSink {
        fn on_progress(&self, update: &ProgressUpdate<'_>) {
            self.updates.lock().push(update.elapsed);
        }

        fn on_complete(&self, _label: &str) {
            self.completed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_recommended_table() {
        let profile = TimeoutProfile::default();
        assert_eq!(profile.recommended(TaskCategory::Simple), 120);
        assert_eq!(profile.recommended(TaskCategory::Search), 180);
        assert_eq!(profile.recommended(TaskCategory::Analysis), 240);
        assert_eq!(profile.recommended(TaskCategory::MultiAgent), 300);
        assert_eq!(profile.recommended(TaskCategory::Complex), 360);
        assert_eq!(profile.recommended(TaskCategory::Default), 60);
        assert_eq!(profile.recommended(TaskCategory::parse("unheard-of")), 60);
    }

    #[test]
    fn test_effective_never_exceeds_configured() {
        for configured in [1, 30, 90, 500] {
            let policy = policy(configured);
            for category in TaskCategory::ALL {
                let effective = policy.effective_timeout(category);
                assert!(effective <= configured);
                assert_eq!(effective, configured.min(policy.recommended_timeout(category)));
            }
        }
    }

    #[test]
    fn test_final_result_timeout() {
        assert_eq!(TimeoutPolicy::final_result_timeout(90), 30);
        assert_eq!(TimeoutPolicy::final_result_timeout(60), 30);
        assert_eq!(TimeoutPolicy::final_result_timeout(45), 22);
        assert_eq!(TimeoutPolicy::final_result_timeout(1), 0);
    }

    #[test]
    fn test_override() {
        let profile = TimeoutProfile::default().with_override(TaskCategory::Complex, 400);
        assert_eq!(profile.recommended(TaskCategory::Complex), 400);
        assert_eq!(profile.recommended(TaskCategory::Simple), 120);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_before_deadline_with_progress() {
        let sink = Arc::new(RecordingSink::default());
        let policy = policy(90).with_sink(sink.clone());
        let tracker = TaskTracker::new();

        let value = policy
            .with_progress(&tracker, "dispatch", 10, |_cancel| async {
                tokio::time::sleep(Duration::from_millis(1_750)).await;
                Ok(7)
            })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(sink.updates.lock().len(), 3);
        assert_eq!(sink.completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_cancels_once() {
        let policy = policy(90);
        let tracker = TaskTracker::new();
        let cancellations = Arc::new(AtomicU32::new(0));
        let seen = cancellations.clone();

        let started = Instant::now();
        let err = policy
            .with_progress(&tracker, "dispatch", 5, move |cancel| async move {
                cancel.cancelled().await;
                seen.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(EnsembleError::Cancelled)
            })
            .await
            .unwrap_err();

        assert!(matches!(err, EnsembleError::Timeout { seconds: 5, .. }));
        assert_eq!(cancellations.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_secs(5) + CANCEL_GRACE);

        tracker.close();
        tracker.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stubborn_operation_is_aborted() {
        let policy = policy(90);
        let tracker = TaskTracker::new();

        let err = policy
            .with_progress(&tracker, "final result", 1, |_cancel| async {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(err.is_timeout());

        tracker.close();
        tokio::time::timeout(Duration::from_secs(1), tracker.wait())
            .await
            .expect("aborted task should drain");
    }

    #[tokio::test]
    async fn test_operation_error_passes_through() {
        let policy = policy(90);
        let tracker = TaskTracker::new();
        let err = policy
            .with_progress(&tracker, "dispatch", 5, |_cancel| async {
                Err::<(), _>(EnsembleError::Engine("no participants".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EnsembleError::Engine(_)));
    }
}
