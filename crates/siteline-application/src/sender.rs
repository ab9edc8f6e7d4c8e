//! OutboundSender - relays single records, batches and analytics events.
//!
//! The sender holds no batch state. It serializes a payload, posts it and
//! reports the outcome; deciding what a failure means (internal event,
//! retained backlog) is up to the caller.

use siteline_core::config::EndpointConfig;
use siteline_core::delivery::{DeliveryReceipt, Transport};
use siteline_core::error::{Result, SitelineError};
use siteline_core::payload::{AnalyticsPayload, BatchSubmitPayload, SingleSubmitPayload};
use siteline_core::record::Record;
use std::sync::Arc;

#[derive(Clone)]
pub struct OutboundSender {
    transport: Arc<dyn Transport>,
    endpoints: EndpointConfig,
}

impl OutboundSender {
    pub fn new(transport: Arc<dyn Transport>, endpoints: EndpointConfig) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &EndpointConfig {
        &self.endpoints
    }

    /// Posts one submission as `{type: "single_submit", submission}`.
    ///
    /// # Errors
    ///
    /// `Config` when no single-submit endpoint is configured, otherwise
    /// whatever the transport reports.
    pub async fn send_single(&self, record: &Record) -> Result<DeliveryReceipt> {
        let url = Self::endpoint(&self.endpoints.single_submit_url, "single_submit_url")?;
        let body = serde_json::to_value(SingleSubmitPayload::new(record.clone()))?;
        self.post(url, &body, "single submission").await
    }

    /// Posts the whole backlog as one batch envelope.
    pub async fn send_batch(&self, payload: &BatchSubmitPayload) -> Result<DeliveryReceipt> {
        let url = Self::endpoint(&self.endpoints.batch_url, "batch_url")?;
        let body = serde_json::to_value(payload)?;
        tracing::info!(
            "[OutboundSender] Sending batch {} with {} submissions",
            payload.batch_id,
            payload.submissions.len()
        );
        self.post(url, &body, "batch").await
    }

    /// Posts one analytics event.
    pub async fn send_analytics(&self, payload: &AnalyticsPayload) -> Result<DeliveryReceipt> {
        let url = Self::endpoint(&self.endpoints.analytics_url, "analytics_url")?;
        let body = serde_json::to_value(payload)?;
        self.post(url, &body, "analytics event").await
    }

    fn endpoint<'a>(url: &'a Option<String>, name: &str) -> Result<&'a str> {
        url.as_deref()
            .ok_or_else(|| SitelineError::config(format!("{} is not configured", name)))
    }

    async fn post(
        &self,
        url: &str,
        body: &serde_json::Value,
        what: &str,
    ) -> Result<DeliveryReceipt> {
        match self.transport.post_json(url, body).await {
            Ok(receipt) => {
                tracing::debug!(
                    "[OutboundSender] Delivered {} to {} ({})",
                    what,
                    url,
                    receipt.status
                );
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!("[OutboundSender] Failed to deliver {} to {}: {}", what, url, e);
                Err(e)
            }
        }
    }
}
