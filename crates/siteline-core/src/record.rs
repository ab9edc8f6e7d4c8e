//! Record domain model.
//!
//! A [`Record`] is the unit that flows through the whole pipeline: form
//! submissions and analytics events are both records, distinguished by their
//! `event_type` and by the bounded list they are stored in.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Retention cap for the form submission backlog.
pub const SUBMISSION_CAP: usize = 100;

/// Retention cap for every analytics category.
pub const EVENT_CAP: usize = 1000;

/// Event type stamped on form submissions.
pub const FORM_SUBMISSION: &str = "form_submission";

/// Free-form key/value payload of a record.
pub type RecordData = BTreeMap<String, String>;

/// Page identifier (e.g. `home`, `contact`, `services`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    pub fn new(page: impl Into<String>) -> Self {
        Self(page.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derives a page id from a URL path: `/` is `home`, otherwise the first
    /// path segment without extension.
    pub fn from_path(path: &str) -> Self {
        let segment = path
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or_default();
        let stem = segment.split('.').next().unwrap_or_default();
        if stem.is_empty() || stem == "index" {
            Self::new("home")
        } else {
            Self::new(stem)
        }
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new("unknown")
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Analytics categories the instrumentation layer writes to itself.
///
/// Callers may record into any category name; these are the ones with a
/// fixed meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum KnownCategory {
    Session,
    PageViews,
    Interactions,
    Errors,
    Performance,
    /// Failures of the delivery path itself. Never forwarded.
    Internal,
}

/// An immutable, timestamped submission or event.
///
/// Fields are private; once built a record can only be read, cloned or
/// serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    record_id: String,
    event_type: String,
    /// ISO-8601 (RFC 3339, millisecond precision, UTC)
    timestamp: String,
    page: PageId,
    session_id: String,
    #[serde(default)]
    data: RecordData,
}

impl Record {
    /// Creates a record stamped at `at` with a fresh UUID v4 record id.
    pub fn new(
        event_type: impl Into<String>,
        page: PageId,
        session_id: impl Into<String>,
        data: RecordData,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            record_id: Uuid::new_v4().to_string(),
            event_type: event_type.into(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            page,
            session_id: session_id.into(),
            data,
        }
    }

    /// Creates a form submission record.
    pub fn submission(
        page: PageId,
        session_id: impl Into<String>,
        data: RecordData,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(FORM_SUBMISSION, page, session_id, data, at)
    }

    pub fn record_id(&self) -> &str {
        &self.record_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn page(&self) -> &PageId {
        &self.page
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn data(&self) -> &RecordData {
        &self.data
    }

    /// Looks up a single data field.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }
}

/// Builds a [`RecordData`] map from string pairs.
pub fn record_data<K, V, I>(pairs: I) -> RecordData
where
    K: Into<String>,
    V: Into<String>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
