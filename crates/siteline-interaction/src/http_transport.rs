//! HttpTransport - JSON POST delivery to the remote collector.

use async_trait::async_trait;
use reqwest::Client;
use siteline_core::delivery::{DeliveryReceipt, Transport};
use siteline_core::error::{Result, SitelineError};
use siteline_core::payload::CollectorResponse;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport that POSTs JSON bodies over HTTP.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            timeout: DEFAULT_TIMEOUT,
            api_key: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sends `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(api_key) = &self.api_key {
            request.header("Authorization", format!("Bearer {}", api_key))
        } else {
            request
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<DeliveryReceipt> {
        let request = self.auth_request(self.client.post(url).json(body).timeout(self.timeout));

        let response = request
            .send()
            .await
            .map_err(|e| SitelineError::transport(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("[HttpTransport] {} answered {}", url, status);
            return Err(SitelineError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // The collector usually answers JSON, but an empty or opaque body on a
        // 2xx is still an acceptance.
        let text = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<CollectorResponse>(&text).ok();

        if let Some(reply) = &parsed {
            if !reply.success {
                let reason = reply
                    .error
                    .clone()
                    .or_else(|| reply.message.clone())
                    .unwrap_or_else(|| "Unknown error".to_string());
                return Err(SitelineError::Rejected(reason));
            }
        }

        Ok(DeliveryReceipt {
            status: status.as_u16(),
            response: parsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_success_reply_is_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/collect"))
            .and(body_partial_json(json!({"type": "single_submit"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Row appended",
                "timestamp": "2024-03-01T00:00:00.000Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new();
        let receipt = transport
            .post_json(
                &format!("{}/collect", server.uri()),
                &json!({"type": "single_submit", "submission": {}}),
            )
            .await
            .unwrap();

        assert_eq!(receipt.status, 200);
        let reply = receipt.response.unwrap();
        assert!(reply.success);
        assert_eq!(reply.message.as_deref(), Some("Row appended"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = HttpTransport::new()
            .post_json(&server.uri(), &json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, SitelineError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_collector_rejection_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": false, "error": "sheet not found"})),
            )
            .mount(&server)
            .await;

        let err = HttpTransport::new()
            .post_json(&server.uri(), &json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, SitelineError::Rejected(ref reason) if reason == "sheet not found"));
    }

    #[tokio::test]
    async fn test_opaque_body_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let receipt = HttpTransport::new()
            .post_json(&server.uri(), &json!({}))
            .await
            .unwrap();
        assert!(receipt.response.is_none());
    }

    #[tokio::test]
    async fn test_api_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        HttpTransport::new()
            .with_api_key(Some("secret".to_string()))
            .post_json(&server.uri(), &json!({}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_host_is_a_transport_error() {
        let err = HttpTransport::new()
            .with_timeout(Duration::from_millis(500))
            .post_json("http://127.0.0.1:1/collect", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, SitelineError::Transport(_)));
    }
}
