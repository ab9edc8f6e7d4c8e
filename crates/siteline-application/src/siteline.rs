//! Siteline - the instrumentation context.
//!
//! One `Siteline` is built per process with injected configuration and
//! collaborators. It wires the store, recorder, sender, scheduler and session
//! manager together and exposes the tracking API. None of the tracking
//! operations return errors; delivery runs on spawned tasks whose handles are
//! returned so callers may await them or drop them.

use crate::performance::{PerformanceMonitor, timings_data};
use crate::recorder::{AnalyticsForwarder, Recorder};
use crate::scheduler::{BatchScheduler, FlushOutcome};
use crate::sender::OutboundSender;
use crate::session_manager::SessionManager;
use serde::Serialize;
use siteline_core::capability::{CapabilityProvider, EnvironmentSnapshot, NoopCapabilities};
use siteline_core::clock::{Clock, SystemClock};
use siteline_core::config::SitelineConfig;
use siteline_core::delivery::Transport;
use siteline_core::error::Result;
use siteline_core::record::{KnownCategory, PageId, Record, RecordData, record_data};
use siteline_core::session::{Session, SessionState};
use siteline_core::storage::StorageBackend;
use siteline_infrastructure::{LocalStore, MemoryBackend};
use siteline_interaction::HttpTransport;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Snapshot of the persisted state, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct SitelineStatus {
    pub backlog: usize,
    pub last_batch_sent_at: Option<i64>,
    pub batch_due: bool,
    pub session_state: SessionState,
    pub session: Option<Session>,
    pub completed_sessions: usize,
    pub categories: BTreeMap<String, usize>,
}

/// Builder for [`Siteline`].
pub struct SitelineBuilder {
    config: SitelineConfig,
    backend: Option<Arc<dyn StorageBackend>>,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
    capabilities: Option<Arc<dyn CapabilityProvider>>,
}

impl SitelineBuilder {
    pub fn new(config: SitelineConfig) -> Self {
        Self {
            config,
            backend: None,
            transport: None,
            clock: None,
            capabilities: None,
        }
    }

    /// Storage backend (default: in-memory).
    pub fn backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Outbound transport (default: HTTP).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Clock (default: system clock).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Host capabilities (default: none).
    pub fn capabilities(mut self, capabilities: Arc<dyn CapabilityProvider>) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Validates the configuration and wires the components.
    ///
    /// # Errors
    ///
    /// Returns `SitelineError::Config` if the configuration is invalid.
    pub fn build(self) -> Result<Siteline> {
        let config = self.config;
        config.validate()?;

        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MemoryBackend::new()));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new()));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let capabilities = self
            .capabilities
            .unwrap_or_else(|| Arc::new(NoopCapabilities));

        let store = LocalStore::new(
            backend,
            config.storage_prefix.clone(),
            config.max_storage_bytes,
        );
        let sender = OutboundSender::new(transport, config.endpoints.clone());
        let environment = capabilities.environment();

        let forward_analytics =
            config.analytics_enabled && config.endpoints.analytics_url.is_some();
        let recorder = Arc::new(if forward_analytics {
            Recorder::with_forwarder(
                store,
                AnalyticsForwarder::new(sender.clone(), environment.clone()),
            )
        } else {
            Recorder::new(store)
        });

        let sessions = Arc::new(SessionManager::new(
            recorder.clone(),
            clock.clone(),
            capabilities.clone(),
        ));
        let scheduler = Arc::new(BatchScheduler::new(
            recorder.clone(),
            sender.clone(),
            sessions.clone(),
            clock.clone(),
            config.site.clone(),
            config.batch_interval(),
            config.retry_policy(),
            config.external_submission_enabled,
        ));
        let performance = PerformanceMonitor::new(config.performance_thresholds.clone());

        Ok(Siteline {
            config,
            recorder,
            sender,
            scheduler,
            sessions,
            performance,
            clock,
            capabilities,
            environment,
            tasks: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        })
    }
}

pub struct Siteline {
    config: SitelineConfig,
    recorder: Arc<Recorder>,
    sender: OutboundSender,
    scheduler: Arc<BatchScheduler>,
    sessions: Arc<SessionManager>,
    performance: PerformanceMonitor,
    clock: Arc<dyn Clock>,
    capabilities: Arc<dyn CapabilityProvider>,
    environment: EnvironmentSnapshot,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Siteline {
    pub fn builder(config: SitelineConfig) -> SitelineBuilder {
        SitelineBuilder::new(config)
    }

    pub fn config(&self) -> &SitelineConfig {
        &self.config
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    pub fn scheduler(&self) -> &Arc<BatchScheduler> {
        &self.scheduler
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Starts the session, observes performance and starts the background
    /// tasks (batch polling, session timeout).
    ///
    /// Returns immediately. Outside a tokio runtime the background tasks are
    /// skipped with a warning.
    pub fn init(&self) {
        tracing::info!(
            "[Siteline] Initializing (analytics: {}, performance: {}, seo: {}, external submission: {})",
            self.config.analytics_enabled,
            self.config.performance_monitoring_enabled,
            self.config.seo_enabled,
            self.config.external_submission_enabled
        );

        if self.sessions.start().is_none() {
            tracing::warn!("[Siteline] init called twice; keeping the existing session");
            return;
        }

        if self.config.performance_monitoring_enabled {
            self.observe_performance();
        }

        if tokio::runtime::Handle::try_current().is_err() {
            tracing::warn!(
                "[Siteline] No async runtime; batch polling and session timeout disabled"
            );
            return;
        }
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.push(self.scheduler.spawn(self.cancel.child_token()));
        tasks.push(self.sessions.spawn_timeout(self.config.session_timeout()));
    }

    fn observe_performance(&self) {
        let Some(timings) = self.capabilities.performance() else {
            tracing::debug!("[Siteline] Performance timings unavailable; monitor skipped");
            return;
        };
        self.performance.attach();

        self.track(
            KnownCategory::Performance.as_ref(),
            "page_performance",
            record_data(timings_data(&timings)),
        );
        for alert in self.performance.evaluate(&timings) {
            tracing::warn!(
                "[Siteline] {} = {} exceeds threshold {}",
                alert.metric,
                alert.value,
                alert.threshold
            );
            self.track(
                KnownCategory::Performance.as_ref(),
                "performance_alert",
                record_data([
                    ("metric", alert.metric.to_string()),
                    ("value", alert.value.to_string()),
                    ("threshold", alert.threshold.to_string()),
                ]),
            );
        }
    }

    fn make_record(&self, event_type: &str, page: PageId, data: RecordData) -> Record {
        Record::new(
            event_type,
            page,
            self.sessions.session_id(),
            data,
            self.clock.now(),
        )
    }

    /// Records a form submission into the backlog and, when external
    /// submission is enabled, relays it immediately.
    ///
    /// # Returns
    ///
    /// The single-send task, if one was spawned. It resolves to `true` when
    /// the collector accepted the submission. A failed send is recorded as
    /// `single_submit_failed` and never retried; the backlog copy still goes
    /// out with the next batch.
    pub fn record_submission(&self, page: PageId, data: RecordData) -> Option<JoinHandle<bool>> {
        let record = Record::submission(page, self.sessions.session_id(), data, self.clock.now());
        self.recorder.record_submission(record.clone());
        tracing::debug!("[Siteline] Submission {} recorded", record.record_id());

        if !self.config.external_submission_enabled
            || self.config.endpoints.single_submit_url.is_none()
        {
            return None;
        }
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let sender = self.sender.clone();
        let recorder = self.recorder.clone();
        let clock = self.clock.clone();
        Some(runtime.spawn(async move {
            let Err(e) = sender.send_single(&record).await else {
                return true;
            };
            recorder.record_internal(Record::new(
                "single_submit_failed",
                record.page().clone(),
                record.session_id(),
                record_data([
                    ("record_id", record.record_id().to_string()),
                    ("error", e.to_string()),
                ]),
                clock.now(),
            ));
            false
        }))
    }

    /// Records an event into `category` and forwards it when analytics is
    /// enabled.
    pub fn track(
        &self,
        category: &str,
        event_type: &str,
        data: RecordData,
    ) -> Option<JoinHandle<()>> {
        let record = self.make_record(event_type, self.environment.page.clone(), data);
        if category == KnownCategory::Internal.as_ref() {
            self.recorder.record_internal(record);
            return None;
        }
        self.recorder.record_event(category, record)
    }

    pub fn track_page_view(&self, page: PageId) -> Option<JoinHandle<()>> {
        let record = self.make_record(
            "page_view",
            page.clone(),
            record_data([
                ("page", page.to_string()),
                ("referrer", self.environment.referrer.clone()),
            ]),
        );
        self.recorder
            .record_event(KnownCategory::PageViews.as_ref(), record)
    }

    pub fn track_error(&self, message: &str, source: &str) -> Option<JoinHandle<()>> {
        self.track(
            KnownCategory::Errors.as_ref(),
            "error",
            record_data([("message", message), ("source", source)]),
        )
    }

    pub fn track_interaction(&self, element: &str, action: &str) -> Option<JoinHandle<()>> {
        self.track(
            KnownCategory::Interactions.as_ref(),
            "interaction",
            record_data([("element", element), ("action", action)]),
        )
    }

    /// Attempts a batch send now, ignoring due-ness.
    pub async fn flush_now(&self) -> FlushOutcome {
        self.scheduler.flush().await
    }

    /// Ends the session explicitly. No-op if it already ended.
    pub fn end_session(&self) -> Option<Session> {
        self.sessions.end()
    }

    pub fn status(&self) -> SitelineStatus {
        SitelineStatus {
            backlog: self.recorder.submissions().len(),
            last_batch_sent_at: self.scheduler.watermark(),
            batch_due: self.scheduler.is_due(),
            session_state: self.sessions.state(),
            session: self.sessions.current(),
            completed_sessions: self.sessions.completed_sessions().len(),
            categories: self.recorder.category_sizes(),
        }
    }

    /// Ends the session, detaches performance observers and stops the
    /// background tasks.
    pub fn teardown(&self) {
        self.sessions.end();
        self.performance.detach();
        self.stop_tasks();
        tracing::info!("[Siteline] Torn down");
    }

    /// Removes everything under the store prefix: backlog, analytics,
    /// sessions and the watermark.
    ///
    /// # Returns
    ///
    /// The number of keys removed.
    pub fn purge(&self) -> usize {
        let removed = self.recorder.store().clear();
        tracing::info!("[Siteline] Purged {} stored keys", removed);
        removed
    }

    fn stop_tasks(&self) {
        self.cancel.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        for task in tasks {
            task.abort();
        }
    }
}

impl Drop for Siteline {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}
