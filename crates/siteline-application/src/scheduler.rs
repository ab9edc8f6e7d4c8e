//! Batch scheduler - time-gated flushing of the submission backlog.
//!
//! The only persisted state is the watermark (`last_batch_sent_at`). A flush
//! is due when `now - watermark >= batch_interval`; a missing watermark counts
//! as zero, so a backlog left by a previous process is flushed on start-up.
//! The scheduler polls at the retry policy's interval (a quarter of the batch
//! interval by default). A failed send leaves the watermark alone, which makes
//! the very next poll due again.

use crate::recorder::Recorder;
use crate::sender::OutboundSender;
use crate::session_manager::SessionManager;
use chrono::SecondsFormat;
use siteline_core::clock::Clock;
use siteline_core::payload::{BatchSubmitPayload, PendingBatch};
use siteline_core::record::{Record, record_data};
use siteline_core::retry::RetryPolicy;
use siteline_core::storage::keys;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What a tick or a forced flush did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Batch delivery is switched off or has no endpoint
    Disabled,
    /// The batch interval has not elapsed since the watermark
    NotDue,
    /// Due, but the backlog is empty
    Empty,
    /// Another flush is still in flight
    InFlight,
    /// Retry attempts are exhausted; waiting out the cooldown
    CoolingDown,
    Sent { batch_id: String, count: usize },
    Failed {
        batch_id: String,
        count: usize,
        error: String,
    },
}

impl FlushOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

#[derive(Debug, Default)]
struct FailureState {
    consecutive: u32,
    last_failure_ms: Option<i64>,
}

pub struct BatchScheduler {
    recorder: Arc<Recorder>,
    sender: OutboundSender,
    sessions: Arc<SessionManager>,
    clock: Arc<dyn Clock>,
    site: String,
    batch_interval_ms: i64,
    policy: RetryPolicy,
    enabled: bool,
    failures: Mutex<FailureState>,
    in_flight: tokio::sync::Mutex<()>,
}

impl BatchScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        recorder: Arc<Recorder>,
        sender: OutboundSender,
        sessions: Arc<SessionManager>,
        clock: Arc<dyn Clock>,
        site: impl Into<String>,
        batch_interval: Duration,
        policy: RetryPolicy,
        enabled: bool,
    ) -> Self {
        let enabled = enabled && sender.endpoints().batch_url.is_some();
        Self {
            recorder,
            sender,
            sessions,
            clock,
            site: site.into(),
            batch_interval_ms: i64::try_from(batch_interval.as_millis()).unwrap_or(i64::MAX),
            policy,
            enabled,
            failures: Mutex::new(FailureState::default()),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Epoch millis of the last successful batch, if any.
    pub fn watermark(&self) -> Option<i64> {
        self.recorder.store().get(keys::LAST_BATCH_SENT_AT)
    }

    /// Whether a flush is due at `now_ms`.
    pub fn is_due_at(&self, now_ms: i64) -> bool {
        let watermark = self.watermark().unwrap_or(0);
        now_ms.saturating_sub(watermark) >= self.batch_interval_ms
    }

    pub fn is_due(&self) -> bool {
        self.is_due_at(self.clock.now_millis())
    }

    /// Consecutive failed attempts since the last success.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures().consecutive
    }

    fn failures(&self) -> std::sync::MutexGuard<'_, FailureState> {
        self.failures.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// One scheduler poll: flush if due and permitted by the retry policy.
    pub async fn tick(&self) -> FlushOutcome {
        if !self.enabled {
            return FlushOutcome::Disabled;
        }
        let now_ms = self.clock.now_millis();
        if !self.is_due_at(now_ms) {
            return FlushOutcome::NotDue;
        }
        if !self.retry_permitted(now_ms) {
            return FlushOutcome::CoolingDown;
        }
        self.flush().await
    }

    fn retry_permitted(&self, now_ms: i64) -> bool {
        let mut failures = self.failures();
        if self.policy.allows_attempt(failures.consecutive) {
            return true;
        }
        let cooldown_ms = i64::try_from(self.policy.cooldown.as_millis()).unwrap_or(i64::MAX);
        let since_failure = now_ms.saturating_sub(failures.last_failure_ms.unwrap_or(0));
        if since_failure >= cooldown_ms {
            tracing::info!("[BatchScheduler] Cooldown over, resuming batch attempts");
            *failures = FailureState::default();
            true
        } else {
            false
        }
    }

    /// Sends the backlog now, regardless of due-ness.
    ///
    /// Single-flight: a call made while another flush is awaiting the
    /// collector returns [`FlushOutcome::InFlight`] without sending.
    pub async fn flush(&self) -> FlushOutcome {
        if !self.enabled {
            return FlushOutcome::Disabled;
        }
        let Ok(_flight) = self.in_flight.try_lock() else {
            tracing::debug!("[BatchScheduler] Flush already in flight");
            return FlushOutcome::InFlight;
        };

        let backlog = self.recorder.submissions();
        if backlog.is_empty() {
            return FlushOutcome::Empty;
        }

        let record_ids: Vec<String> = backlog.iter().map(|r| r.record_id().to_string()).collect();
        let batch_id = self.batch_id_for(&record_ids);
        let store = self.recorder.store();
        store.put(
            keys::PENDING_BATCH,
            &PendingBatch {
                batch_id: batch_id.clone(),
                record_ids: record_ids.clone(),
                started_at: self.clock.now_millis(),
            },
        );

        let count = backlog.len();
        let sent_at = self.clock.now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let payload =
            BatchSubmitPayload::new(batch_id.clone(), self.site.clone(), sent_at, backlog);

        match self.sender.send_batch(&payload).await {
            Ok(_) => {
                let remaining = self.recorder.acknowledge_submissions(&record_ids);
                store.put(keys::LAST_BATCH_SENT_AT, &self.clock.now_millis());
                store.remove(keys::PENDING_BATCH);
                *self.failures() = FailureState::default();
                tracing::info!(
                    "[BatchScheduler] Batch {} delivered ({} submissions, {} remaining)",
                    batch_id,
                    count,
                    remaining
                );
                FlushOutcome::Sent { batch_id, count }
            }
            Err(e) => {
                let now_ms = self.clock.now_millis();
                let attempts = {
                    let mut failures = self.failures();
                    failures.consecutive = failures.consecutive.saturating_add(1);
                    failures.last_failure_ms = Some(now_ms);
                    failures.consecutive
                };
                self.recorder.record_internal(Record::new(
                    "batch_submit_failed",
                    Default::default(),
                    self.sessions.session_id(),
                    record_data([
                        ("batch_id", batch_id.clone()),
                        ("count", count.to_string()),
                        ("attempt", attempts.to_string()),
                        ("error", e.to_string()),
                    ]),
                    self.clock.now(),
                ));
                tracing::warn!(
                    "[BatchScheduler] Batch {} failed (attempt {}), backlog retained: {}",
                    batch_id,
                    attempts,
                    e
                );
                FlushOutcome::Failed {
                    batch_id,
                    count,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Reuses the pending batch id when retrying the exact same backlog.
    fn batch_id_for(&self, record_ids: &[String]) -> String {
        match self.recorder.store().get::<PendingBatch>(keys::PENDING_BATCH) {
            Some(pending) if pending.record_ids == record_ids => pending.batch_id,
            _ => Uuid::new_v4().to_string(),
        }
    }

    /// Spawns the polling loop. The first poll runs immediately.
    ///
    /// The loop stops when `cancel` fires.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler.policy.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(
                "[BatchScheduler] Polling every {:?} (batch interval {} ms)",
                scheduler.policy.interval,
                scheduler.batch_interval_ms
            );
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("[BatchScheduler] Stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let outcome = scheduler.tick().await;
                        tracing::debug!("[BatchScheduler] Tick: {:?}", outcome);
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockTransport, memory_store, submission};
    use siteline_core::capability::NoopCapabilities;
    use siteline_core::clock::ManualClock;
    use siteline_core::config::EndpointConfig;

    const INTERVAL_MS: i64 = 60_000;
    const BATCH_URL: &str = "http://collector/batch";

    struct Fixture {
        scheduler: Arc<BatchScheduler>,
        recorder: Arc<Recorder>,
        transport: Arc<MockTransport>,
        clock: ManualClock,
    }

    fn fixture_with(transport: MockTransport, max_attempts: Option<u32>) -> Fixture {
        let clock = ManualClock::at_millis(1_000_000);
        let recorder = Arc::new(Recorder::new(memory_store()));
        let transport = Arc::new(transport);
        let sender = OutboundSender::new(
            transport.clone(),
            EndpointConfig {
                batch_url: Some(BATCH_URL.to_string()),
                ..Default::default()
            },
        );
        let sessions = Arc::new(SessionManager::new(
            recorder.clone(),
            Arc::new(clock.clone()),
            Arc::new(NoopCapabilities),
        ));
        let interval = Duration::from_millis(INTERVAL_MS as u64);
        let scheduler = Arc::new(BatchScheduler::new(
            recorder.clone(),
            sender,
            sessions,
            Arc::new(clock.clone()),
            "acme",
            interval,
            RetryPolicy::for_batch_interval(interval).with_max_attempts(max_attempts),
            true,
        ));
        Fixture {
            scheduler,
            recorder,
            transport,
            clock,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(MockTransport::new(), None)
    }

    fn queue(recorder: &Recorder, n: usize) {
        for i in 1..=n {
            recorder.record_submission(submission(&i.to_string()));
        }
    }

    #[test]
    fn test_due_boundary() {
        let f = fixture();
        let t0 = 5_000_000;
        f.recorder.store().put(keys::LAST_BATCH_SENT_AT, &t0);

        assert!(!f.scheduler.is_due_at(t0 + INTERVAL_MS - 1));
        assert!(f.scheduler.is_due_at(t0 + INTERVAL_MS));
    }

    #[test]
    fn test_missing_watermark_is_due() {
        let f = fixture();
        assert!(f.scheduler.watermark().is_none());
        assert!(f.scheduler.is_due());
    }

    #[tokio::test]
    async fn test_success_clears_backlog_and_moves_watermark() {
        let f = fixture();
        queue(&f.recorder, 5);

        let outcome = f.scheduler.tick().await;

        assert!(matches!(outcome, FlushOutcome::Sent { count: 5, .. }));
        assert!(f.recorder.submissions().is_empty());
        assert_eq!(f.scheduler.watermark(), Some(f.clock.now_millis()));
        assert!(
            f.recorder
                .store()
                .get::<PendingBatch>(keys::PENDING_BATCH)
                .is_none()
        );

        let bodies = f.transport.sent_to(BATCH_URL);
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["site"], "acme");
        assert_eq!(bodies[0]["submissions"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_failure_retains_backlog_and_watermark() {
        let f = fixture_with(MockTransport::failing(), None);
        let t0 = f.clock.now_millis() - INTERVAL_MS;
        f.recorder.store().put(keys::LAST_BATCH_SENT_AT, &t0);
        queue(&f.recorder, 5);

        let outcome = f.scheduler.tick().await;

        assert!(matches!(outcome, FlushOutcome::Failed { count: 5, .. }));
        assert_eq!(f.recorder.submissions().len(), 5);
        assert_eq!(f.scheduler.watermark(), Some(t0));

        let internal = f.recorder.events("internal");
        assert_eq!(internal.len(), 1);
        assert_eq!(internal[0].event_type(), "batch_submit_failed");
        assert_eq!(internal[0].field("count"), Some("5"));
    }

    #[tokio::test]
    async fn test_failed_batch_is_retried_on_next_tick_with_same_id() {
        let f = fixture_with(MockTransport::failing(), None);
        queue(&f.recorder, 3);

        let first = f.scheduler.tick().await;
        f.clock.advance_millis(INTERVAL_MS / 4);
        f.transport.set_failing(false);
        let second = f.scheduler.tick().await;

        let FlushOutcome::Failed { batch_id: failed_id, .. } = first else {
            panic!("expected failure, got {:?}", first);
        };
        let FlushOutcome::Sent { batch_id: sent_id, .. } = second else {
            panic!("expected success, got {:?}", second);
        };
        assert_eq!(failed_id, sent_id);
        assert_eq!(f.transport.sent_to(BATCH_URL).len(), 2);
        assert!(f.recorder.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_not_due_after_success() {
        let f = fixture();
        queue(&f.recorder, 1);
        assert!(f.scheduler.tick().await.is_sent());

        queue(&f.recorder, 1);
        f.clock.advance_millis(INTERVAL_MS - 1);
        assert_eq!(f.scheduler.tick().await, FlushOutcome::NotDue);

        f.clock.advance_millis(1);
        assert!(f.scheduler.tick().await.is_sent());
    }

    #[tokio::test]
    async fn test_empty_backlog_sends_nothing() {
        let f = fixture();
        assert_eq!(f.scheduler.tick().await, FlushOutcome::Empty);
        assert!(f.transport.sent().is_empty());
        assert!(f.scheduler.watermark().is_none());
    }

    #[tokio::test]
    async fn test_two_submissions_in_one_tick_both_sent_once() {
        let f = fixture();
        f.recorder.record_submission(submission("a"));
        f.recorder.record_submission(submission("b"));

        f.scheduler.tick().await;
        f.clock.advance_millis(INTERVAL_MS);
        f.scheduler.tick().await;

        let bodies = f.transport.sent_to(BATCH_URL);
        assert_eq!(bodies.len(), 1);
        let ids: Vec<&str> = bodies[0]["submissions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["data"]["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_submission_during_flight_survives() {
        let f = fixture_with(MockTransport::gated(), None);
        queue(&f.recorder, 2);

        let scheduler = f.scheduler.clone();
        let flight = tokio::spawn(async move { scheduler.flush().await });
        while f.transport.sent().is_empty() {
            tokio::task::yield_now().await;
        }

        f.recorder.record_submission(submission("late"));
        assert_eq!(f.scheduler.flush().await, FlushOutcome::InFlight);
        f.transport.release();

        let outcome = flight.await.unwrap();
        assert!(matches!(outcome, FlushOutcome::Sent { count: 2, .. }));
        let remaining = f.recorder.submissions();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].field("id"), Some("late"));
    }

    #[tokio::test]
    async fn test_capped_retries_cool_down() {
        let f = fixture_with(MockTransport::failing(), Some(2));
        queue(&f.recorder, 1);

        assert!(matches!(f.scheduler.tick().await, FlushOutcome::Failed { .. }));
        assert!(matches!(f.scheduler.tick().await, FlushOutcome::Failed { .. }));
        assert_eq!(f.scheduler.tick().await, FlushOutcome::CoolingDown);
        assert_eq!(f.transport.sent().len(), 2);

        f.clock.advance_millis(INTERVAL_MS);
        f.transport.set_failing(false);
        assert!(f.scheduler.tick().await.is_sent());
        assert_eq!(f.scheduler.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn test_disabled_without_endpoint() {
        let recorder = Arc::new(Recorder::new(memory_store()));
        let clock = Arc::new(ManualClock::at_millis(0));
        let sessions = Arc::new(SessionManager::new(
            recorder.clone(),
            clock.clone(),
            Arc::new(NoopCapabilities),
        ));
        let scheduler = BatchScheduler::new(
            recorder.clone(),
            OutboundSender::new(Arc::new(MockTransport::new()), EndpointConfig::default()),
            sessions,
            clock,
            "acme",
            Duration::from_secs(60),
            RetryPolicy::for_batch_interval(Duration::from_secs(60)),
            true,
        );
        queue(&recorder, 1);
        assert_eq!(scheduler.tick().await, FlushOutcome::Disabled);
        assert_eq!(recorder.submissions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_polls_at_quarter_interval_until_cancelled() {
        let f = fixture_with(MockTransport::failing(), None);
        queue(&f.recorder, 1);
        let cancel = CancellationToken::new();
        let handle = f.scheduler.spawn(cancel.clone());

        // Immediate start-up poll
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(f.transport.sent().len(), 1);

        // Watermark unchanged after failure: every poll retries
        tokio::time::sleep(Duration::from_millis(INTERVAL_MS as u64 / 4)).await;
        assert_eq!(f.transport.sent().len(), 2);

        cancel.cancel();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_millis(INTERVAL_MS as u64)).await;
        assert_eq!(f.transport.sent().len(), 2);
    }
}
