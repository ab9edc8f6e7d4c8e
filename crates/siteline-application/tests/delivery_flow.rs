//! End-to-end delivery against a mock collector with on-disk storage.

use serde_json::json;
use siteline_application::{FlushOutcome, Siteline};
use siteline_core::clock::ManualClock;
use siteline_core::config::{EndpointConfig, SitelineConfig};
use siteline_core::record::{PageId, record_data};
use siteline_infrastructure::FileBackend;
use siteline_interaction::HttpTransport;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOW_MS: i64 = 1_760_000_000_000;

fn config(server: &MockServer) -> SitelineConfig {
    SitelineConfig {
        site: "example.test".to_string(),
        analytics_enabled: false,
        external_submission_enabled: true,
        endpoints: EndpointConfig {
            single_submit_url: None,
            batch_url: Some(format!("{}/batch", server.uri())),
            analytics_url: None,
        },
        ..Default::default()
    }
}

fn context(config: SitelineConfig, dir: &Path, clock: ManualClock) -> Siteline {
    Siteline::builder(config)
        .backend(Arc::new(FileBackend::new(dir).unwrap()))
        .transport(Arc::new(HttpTransport::new()))
        .clock(Arc::new(clock))
        .build()
        .unwrap()
}

async fn batch_bodies(server: &MockServer) -> Vec<serde_json::Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/batch")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_backlog_is_delivered_as_one_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/batch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let siteline = context(config(&server), dir.path(), ManualClock::at_millis(NOW_MS));

    siteline.record_submission(PageId::new("contact"), record_data([("name", "Ada")]));
    siteline.record_submission(PageId::new("quote"), record_data([("name", "Grace")]));

    let outcome = siteline.scheduler().tick().await;
    let FlushOutcome::Sent { batch_id, count } = outcome else {
        panic!("expected a sent batch, got {:?}", outcome);
    };
    assert_eq!(count, 2);

    let bodies = batch_bodies(&server).await;
    assert_eq!(bodies[0]["batch_id"], batch_id);
    assert_eq!(bodies[0]["type"], "batch_submit");
    assert_eq!(bodies[0]["site"], "example.test");
    assert_eq!(bodies[0]["submissions"][1]["page"], "quote");

    let status = siteline.status();
    assert_eq!(status.backlog, 0);
    assert_eq!(status.last_batch_sent_at, Some(NOW_MS));
    assert!(!status.batch_due);
}

#[tokio::test]
async fn test_backlog_survives_restart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/batch"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();

    let offline = SitelineConfig {
        external_submission_enabled: false,
        ..config(&server)
    };
    let first = context(offline, dir.path(), ManualClock::at_millis(NOW_MS));
    first.record_submission(PageId::new("contact"), record_data([("id", "1")]));
    drop(first);

    let second = context(config(&server), dir.path(), ManualClock::at_millis(NOW_MS));
    assert_eq!(second.status().backlog, 1);

    assert!(second.scheduler().tick().await.is_sent());
    let bodies = batch_bodies(&server).await;
    assert_eq!(bodies[0]["submissions"][0]["data"]["id"], "1");
}

#[tokio::test]
async fn test_failed_batch_is_retried_with_same_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/batch"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/batch"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let dir = TempDir::new().unwrap();
    let siteline = context(config(&server), dir.path(), ManualClock::at_millis(NOW_MS));
    siteline.record_submission(PageId::new("contact"), record_data([("id", "1")]));

    let failed = siteline.scheduler().tick().await;
    assert!(matches!(failed, FlushOutcome::Failed { count: 1, .. }));
    assert_eq!(siteline.status().backlog, 1);
    assert_eq!(siteline.status().last_batch_sent_at, None);
    assert_eq!(
        siteline.recorder().events("internal")[0].event_type(),
        "batch_submit_failed"
    );

    assert!(siteline.scheduler().tick().await.is_sent());
    let bodies = batch_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["batch_id"], bodies[1]["batch_id"]);
    assert_eq!(siteline.status().backlog, 0);
}

#[tokio::test]
async fn test_oversized_backlog_is_dropped_without_failing() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let tight = SitelineConfig {
        max_storage_bytes: 256,
        ..config(&server)
    };
    let siteline = context(tight, dir.path(), ManualClock::at_millis(NOW_MS));

    let notes = record_data([("notes", "x".repeat(1024))]);
    siteline.record_submission(PageId::new("contact"), notes);

    assert_eq!(siteline.status().backlog, 0);
    assert_eq!(siteline.flush_now().await, FlushOutcome::Empty);
}
