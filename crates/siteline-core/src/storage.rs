//! Storage backend trait and persisted key names.
//!
//! A backend is a flat string-to-string mapping. Prefixing, JSON encoding,
//! size caps and failure absorption happen one layer up in the local store.

use crate::error::Result;

/// Persisted keys (unprefixed).
pub mod keys {
    /// Submission backlog, array of records (cap 100)
    pub const FORM_SUBMISSIONS: &str = "form_submissions";
    /// Mapping category -> array of records (each cap 1000)
    pub const ANALYTICS: &str = "analytics";
    pub const CURRENT_SESSION: &str = "current_session";
    pub const COMPLETED_SESSIONS: &str = "completed_sessions";
    /// Batch watermark, epoch millis
    pub const LAST_BATCH_SENT_AT: &str = "last_batch_sent_at";
    /// In-flight batch marker
    pub const PENDING_BATCH: &str = "pending_batch";
}

/// An abstract persistent key/value backend.
///
/// Implementations should handle:
/// - Returning `Ok(None)` for keys that were never written
/// - Their own capacity limits, reported as `SitelineError::QuotaExceeded`
pub trait StorageBackend: Send + Sync {
    /// Reads the raw value stored under `key`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(value))`: Value found
    /// - `Ok(None)`: Key never written (or removed)
    /// - `Err(_)`: Backend failure
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replaces the value stored under `key`.
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<()>;

    /// Lists keys starting with `prefix`.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}
