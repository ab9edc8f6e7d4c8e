//! Wire payloads sent to the remote collector.

use crate::capability::EnvironmentSnapshot;
use crate::record::Record;
use serde::{Deserialize, Serialize};

/// Body of the immediate single-send POST.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SingleSubmitPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub submission: Record,
}

impl SingleSubmitPayload {
    pub fn new(submission: Record) -> Self {
        Self {
            kind: "single_submit".to_string(),
            submission,
        }
    }
}

/// Body of the batch POST.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSubmitPayload {
    #[serde(rename = "type")]
    pub kind: String,
    /// Stable across retries of the same backlog so a receiver can deduplicate
    pub batch_id: String,
    pub site: String,
    /// ISO-8601
    pub sent_at: String,
    pub submissions: Vec<Record>,
}

impl BatchSubmitPayload {
    pub fn new(
        batch_id: impl Into<String>,
        site: impl Into<String>,
        sent_at: impl Into<String>,
        submissions: Vec<Record>,
    ) -> Self {
        Self {
            kind: "batch_submit".to_string(),
            batch_id: batch_id.into(),
            site: site.into(),
            sent_at: sent_at.into(),
            submissions,
        }
    }
}

/// Body of the per-event analytics POST.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsPayload {
    pub event_type: String,
    pub session_id: String,
    pub page: String,
    pub user_agent: String,
    pub screen_size: String,
    pub referrer: String,
    pub event_data: serde_json::Value,
    pub timestamp: String,
}

impl AnalyticsPayload {
    pub fn from_record(record: &Record, environment: &EnvironmentSnapshot) -> Self {
        Self {
            event_type: record.event_type().to_string(),
            session_id: record.session_id().to_string(),
            page: record.page().to_string(),
            user_agent: environment.user_agent.clone(),
            screen_size: environment.screen_size.clone(),
            referrer: environment.referrer.clone(),
            event_data: serde_json::to_value(record.data()).unwrap_or_default(),
            timestamp: record.timestamp().to_string(),
        }
    }
}

/// Marker persisted under `pending_batch` while a batch POST is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingBatch {
    pub batch_id: String,
    pub record_ids: Vec<String>,
    /// Epoch millis
    pub started_at: i64,
}

/// Reply from the remote collector: `{success, message|error, timestamp}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectorResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}
