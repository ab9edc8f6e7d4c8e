//! Recorder - appends records into bounded lists in the local store.
//!
//! Every list operation is a read-modify-write against the store, serialized
//! by an internal lock. Nothing is cached between calls.

use crate::sender::OutboundSender;
use siteline_core::capability::EnvironmentSnapshot;
use siteline_core::payload::AnalyticsPayload;
use siteline_core::record::{EVENT_CAP, KnownCategory, Record, SUBMISSION_CAP};
use siteline_core::storage::keys;
use siteline_infrastructure::LocalStore;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::task::JoinHandle;

/// Category name -> records, as persisted under `analytics`.
pub type AnalyticsMap = BTreeMap<String, Vec<Record>>;

/// Appends `item` and drops the oldest entries beyond `cap`.
pub fn append_bounded<T>(list: &mut Vec<T>, item: T, cap: usize) {
    list.push(item);
    if list.len() > cap {
        let excess = list.len() - cap;
        list.drain(..excess);
    }
}

/// Forwards recorded events to the analytics endpoint.
#[derive(Clone)]
pub struct AnalyticsForwarder {
    sender: OutboundSender,
    environment: EnvironmentSnapshot,
}

impl AnalyticsForwarder {
    pub fn new(sender: OutboundSender, environment: EnvironmentSnapshot) -> Self {
        Self {
            sender,
            environment,
        }
    }

    /// Spawns a fire-and-forget send. Returns `None` outside a tokio runtime.
    fn forward(&self, record: &Record) -> Option<JoinHandle<()>> {
        let handle = tokio::runtime::Handle::try_current().ok()?;
        let payload = AnalyticsPayload::from_record(record, &self.environment);
        let sender = self.sender.clone();
        Some(handle.spawn(async move {
            if let Err(e) = sender.send_analytics(&payload).await {
                tracing::debug!(
                    "[Recorder] Analytics forward of '{}' dropped: {}",
                    payload.event_type,
                    e
                );
            }
        }))
    }
}

pub struct Recorder {
    store: LocalStore,
    forwarder: Option<AnalyticsForwarder>,
    lists: Mutex<()>,
}

impl Recorder {
    /// Creates a recorder that only stores.
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            forwarder: None,
            lists: Mutex::new(()),
        }
    }

    /// Creates a recorder that also forwards every event to the analytics endpoint.
    pub fn with_forwarder(store: LocalStore, forwarder: AnalyticsForwarder) -> Self {
        Self {
            store,
            forwarder: Some(forwarder),
            lists: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lists.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Appends to the submission backlog, keeping the most recent 100.
    pub fn record_submission(&self, record: Record) {
        let _guard = self.lock();
        let mut backlog: Vec<Record> = self.store.get_or_default(keys::FORM_SUBMISSIONS);
        append_bounded(&mut backlog, record, SUBMISSION_CAP);
        self.store.put(keys::FORM_SUBMISSIONS, &backlog);
        tracing::debug!("[Recorder] Submission backlog now {}", backlog.len());
    }

    /// Appends to `category` (cap 1000) and forwards the event when a
    /// forwarder is configured.
    ///
    /// # Returns
    ///
    /// The forwarding task, if one was spawned. Awaiting it is optional.
    pub fn record_event(&self, category: &str, record: Record) -> Option<JoinHandle<()>> {
        let handle = self.forwarder.as_ref().and_then(|f| f.forward(&record));
        self.store_event(category, record);
        handle
    }

    /// Stores an event without forwarding it.
    pub fn store_event(&self, category: &str, record: Record) {
        let _guard = self.lock();
        let mut analytics: AnalyticsMap = self.store.get_or_default(keys::ANALYTICS);
        let list = analytics.entry(category.to_string()).or_default();
        append_bounded(list, record, EVENT_CAP);
        self.store.put(keys::ANALYTICS, &analytics);
    }

    /// Records a failure of the delivery path under `internal`.
    pub fn record_internal(&self, record: Record) {
        tracing::debug!("[Recorder] Internal event '{}'", record.event_type());
        self.store_event(KnownCategory::Internal.as_ref(), record);
    }

    /// Current submission backlog, oldest first.
    pub fn submissions(&self) -> Vec<Record> {
        self.store.get_or_default(keys::FORM_SUBMISSIONS)
    }

    /// Events stored under `category`, oldest first.
    pub fn events(&self, category: &str) -> Vec<Record> {
        let mut analytics: AnalyticsMap = self.store.get_or_default(keys::ANALYTICS);
        analytics.remove(category).unwrap_or_default()
    }

    /// Number of stored events per category.
    pub fn category_sizes(&self) -> BTreeMap<String, usize> {
        let analytics: AnalyticsMap = self.store.get_or_default(keys::ANALYTICS);
        analytics
            .into_iter()
            .map(|(category, list)| (category, list.len()))
            .collect()
    }

    /// Removes the given records from the backlog after a confirmed send.
    ///
    /// Records that arrived after the batch was read are kept.
    ///
    /// # Returns
    ///
    /// The number of records still in the backlog.
    pub fn acknowledge_submissions(&self, record_ids: &[String]) -> usize {
        let _guard = self.lock();
        let mut backlog: Vec<Record> = self.store.get_or_default(keys::FORM_SUBMISSIONS);
        backlog.retain(|r| !record_ids.iter().any(|id| id == r.record_id()));
        if backlog.is_empty() {
            self.store.remove(keys::FORM_SUBMISSIONS);
        } else {
            self.store.put(keys::FORM_SUBMISSIONS, &backlog);
        }
        backlog.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockTransport, memory_store, submission};
    use siteline_core::config::EndpointConfig;
    use siteline_core::record::{PageId, record_data};
    use std::sync::Arc;

    #[test]
    fn test_append_bounded_keeps_most_recent() {
        let mut list = Vec::new();
        for i in 1..=7 {
            append_bounded(&mut list, i, 5);
        }
        assert_eq!(list, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_cap_invariant_for_any_count() {
        for n in [0usize, 1, 99, 100, 101, 250] {
            let recorder = Recorder::new(memory_store());
            for i in 0..n {
                recorder.record_submission(submission(&i.to_string()));
            }
            let backlog = recorder.submissions();
            assert_eq!(backlog.len(), n.min(SUBMISSION_CAP));

            let first_kept = n.saturating_sub(SUBMISSION_CAP);
            let ids: Vec<String> = backlog
                .iter()
                .map(|r| r.field("id").unwrap().to_string())
                .collect();
            let expected: Vec<String> = (first_kept..n).map(|i| i.to_string()).collect();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn test_101_submissions_evict_the_first() {
        let recorder = Recorder::new(memory_store());
        for i in 1..=101 {
            recorder.record_submission(submission(&i.to_string()));
        }

        let backlog = recorder.submissions();
        assert_eq!(backlog.len(), 100);
        assert_eq!(backlog.first().unwrap().field("id"), Some("2"));
        assert_eq!(backlog.last().unwrap().field("id"), Some("101"));
    }

    #[test]
    fn test_event_categories_are_independent() {
        let recorder = Recorder::new(memory_store());
        for i in 0..(EVENT_CAP + 5) {
            recorder.store_event("clicks", submission(&i.to_string()));
        }
        recorder.store_event("errors", submission("e"));

        assert_eq!(recorder.events("clicks").len(), EVENT_CAP);
        assert_eq!(recorder.events("clicks")[0].field("id"), Some("5"));
        assert_eq!(recorder.events("errors").len(), 1);
        assert!(recorder.events("never").is_empty());

        let sizes = recorder.category_sizes();
        assert_eq!(sizes.get("clicks"), Some(&EVENT_CAP));
        assert_eq!(sizes.get("errors"), Some(&1));
    }

    #[test]
    fn test_acknowledge_keeps_late_arrivals() {
        let recorder = Recorder::new(memory_store());
        recorder.record_submission(submission("1"));
        recorder.record_submission(submission("2"));
        let sent: Vec<String> = recorder
            .submissions()
            .iter()
            .map(|r| r.record_id().to_string())
            .collect();

        recorder.record_submission(submission("3"));
        let remaining = recorder.acknowledge_submissions(&sent);

        assert_eq!(remaining, 1);
        assert_eq!(recorder.submissions()[0].field("id"), Some("3"));
    }

    #[test]
    fn test_acknowledge_all_removes_key() {
        let recorder = Recorder::new(memory_store());
        recorder.record_submission(submission("1"));
        let ids = vec![recorder.submissions()[0].record_id().to_string()];

        assert_eq!(recorder.acknowledge_submissions(&ids), 0);
        assert!(
            !recorder
                .store()
                .keys()
                .contains(&keys::FORM_SUBMISSIONS.to_string())
        );
    }

    #[tokio::test]
    async fn test_record_event_forwards_to_analytics_endpoint() {
        let transport = Arc::new(MockTransport::new());
        let sender = OutboundSender::new(
            transport.clone(),
            EndpointConfig {
                analytics_url: Some("http://collector/analytics".to_string()),
                ..Default::default()
            },
        );
        let env = EnvironmentSnapshot {
            user_agent: "agent".to_string(),
            ..Default::default()
        };
        let recorder =
            Recorder::with_forwarder(memory_store(), AnalyticsForwarder::new(sender, env));

        let record = Record::new(
            "page_view",
            PageId::new("home"),
            "s-1",
            record_data([("title", "Home")]),
            chrono::Utc::now(),
        );
        let handle = recorder.record_event("page_views", record).unwrap();
        handle.await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "http://collector/analytics");
        assert_eq!(sent[0].1["event_type"], "page_view");
        assert_eq!(sent[0].1["user_agent"], "agent");
        assert_eq!(recorder.events("page_views").len(), 1);
    }

    #[tokio::test]
    async fn test_internal_events_are_not_forwarded() {
        let transport = Arc::new(MockTransport::new());
        let sender = OutboundSender::new(
            transport.clone(),
            EndpointConfig {
                analytics_url: Some("http://collector/analytics".to_string()),
                ..Default::default()
            },
        );
        let recorder = Recorder::with_forwarder(
            memory_store(),
            AnalyticsForwarder::new(sender, EnvironmentSnapshot::default()),
        );

        recorder.record_internal(submission("x"));

        assert!(transport.sent().is_empty());
        assert_eq!(recorder.events("internal").len(), 1);
    }
}
