//! Outbound transport trait.

use crate::error::Result;
use crate::payload::CollectorResponse;
use async_trait::async_trait;

/// Outcome of a POST that reached the collector and got a 2xx answer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryReceipt {
    pub status: u16,
    /// Parsed collector reply, when the body was one
    pub response: Option<CollectorResponse>,
}

/// Trait for posting JSON bodies to a collector endpoint.
///
/// Implementations must map non-2xx statuses to `SitelineError::HttpStatus`
/// and a 2xx reply carrying `success: false` to `SitelineError::Rejected`, so
/// that `Ok` always means "accepted".
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<DeliveryReceipt>;
}

/// A transport that accepts everything without sending.
pub struct NoOpTransport;

#[async_trait]
impl Transport for NoOpTransport {
    async fn post_json(&self, _url: &str, _body: &serde_json::Value) -> Result<DeliveryReceipt> {
        Ok(DeliveryReceipt {
            status: 204,
            response: None,
        })
    }
}
