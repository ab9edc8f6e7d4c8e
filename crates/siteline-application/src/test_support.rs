//! Shared test doubles.

use async_trait::async_trait;
use siteline_core::delivery::{DeliveryReceipt, Transport};
use siteline_core::error::{Result, SitelineError};
use siteline_core::record::{PageId, Record, record_data};
use siteline_infrastructure::{LocalStore, MemoryBackend};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Transport that records every body and answers success or failure.
pub struct MockTransport {
    sent: Mutex<Vec<(String, serde_json::Value)>>,
    failing: AtomicBool,
    gate: Option<Notify>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            gate: None,
        }
    }

    pub fn failing() -> Self {
        let transport = Self::new();
        transport.set_failing(true);
        transport
    }

    /// Every post waits for [`release`](Self::release) before answering.
    pub fn gated() -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::new()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub fn sent(&self) -> Vec<(String, serde_json::Value)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, url: &str) -> Vec<serde_json::Value> {
        self.sent()
            .into_iter()
            .filter(|(u, _)| u == url)
            .map(|(_, body)| body)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<DeliveryReceipt> {
        self.sent
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            Err(SitelineError::HttpStatus {
                status: 500,
                url: url.to_string(),
            })
        } else {
            Ok(DeliveryReceipt {
                status: 200,
                response: None,
            })
        }
    }
}

pub fn memory_store() -> LocalStore {
    LocalStore::new(Arc::new(MemoryBackend::new()), "siteline_", 5 * 1024 * 1024)
}

/// A contact-form submission carrying `id` in its data.
pub fn submission(id: &str) -> Record {
    Record::submission(
        PageId::new("contact"),
        "test-session",
        record_data([("id", id)]),
        chrono::Utc::now(),
    )
}
