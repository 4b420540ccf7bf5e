//! Integration tests for the notification and quality advisory ports.

mod common;

use async_trait::async_trait;
use common::{config_for, magnet, submit_body, MockBackend, TestApp};
use dispatcher::config::AppConfig;
use dispatcher::metrics::Metrics;
use dispatcher::models::SubmitRequest;
use dispatcher::services::{
    Dispatcher, Event, Notifier, NotifyError, QualityAdvisor, QualitySuggestion, RoutingPlane,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const HASH: &str = "aaaabbbbccccddddeeeeffff0000111122223333";

/// Notifier that records delivered events.
#[derive(Default)]
struct CaptureNotifier {
    events: Mutex<Vec<Event>>,
}

#[async_trait]
impl Notifier for CaptureNotifier {
    fn name(&self) -> &str {
        "capture"
    }

    async fn notify(&self, event: &Event) -> Result<(), NotifyError> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

impl CaptureNotifier {
    /// Wait for at least `count` events; notifications are fire-and-forget.
    async fn wait_for(&self, count: usize) -> Vec<Event> {
        for _ in 0..100 {
            {
                let events = self.events.lock().await;
                if events.len() >= count {
                    return events.clone();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.events.lock().await.clone()
    }
}

/// Advisor that always suggests an upgrade.
struct UpgradeAdvisor;

#[async_trait]
impl QualityAdvisor for UpgradeAdvisor {
    async fn review(
        &self,
        _name: &str,
        _category: &str,
        _size_estimate_gb: f64,
    ) -> Option<QualitySuggestion> {
        Some(QualitySuggestion {
            current_quality: "1080p".to_string(),
            suggested_quality: "2160p".to_string(),
            reason: "profile allows upgrades".to_string(),
        })
    }
}

#[tokio::test]
async fn accepted_submission_publishes_a_started_event() {
    let alpha = MockBackend::reachable("alpha", 900.0);
    let capture = Arc::new(CaptureNotifier::default());
    let app = TestApp::with_config(
        config_for(&[alpha.clone()]),
        vec![alpha],
        vec![capture.clone()],
    )
    .await;

    app.server()
        .post("/submit")
        .json(&submit_body("Show.S01E01", &magnet(HASH), 2.0))
        .await
        .assert_status_ok();

    let events = capture.wait_for(1).await;
    assert!(matches!(
        &events[0],
        Event::DownloadStarted { node, .. } if node == "alpha"
    ));
}

#[tokio::test]
async fn duplicate_submission_publishes_a_duplicate_event() {
    let alpha = MockBackend::reachable("alpha", 900.0);
    let capture = Arc::new(CaptureNotifier::default());
    let app = TestApp::with_config(
        config_for(&[alpha.clone()]),
        vec![alpha],
        vec![capture.clone()],
    )
    .await;

    let body = submit_body("Show.S01E01", &magnet(HASH), 2.0);
    app.server().post("/submit").json(&body).await.assert_status_ok();
    app.server().post("/submit").json(&body).await;

    let events = capture.wait_for(2).await;
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::DuplicateDetected { .. })));
}

#[tokio::test]
async fn rejection_publishes_a_rejected_event() {
    let alpha = MockBackend::unreachable("alpha");
    let capture = Arc::new(CaptureNotifier::default());
    let app = TestApp::with_config(
        config_for(&[alpha.clone()]),
        vec![alpha],
        vec![capture.clone()],
    )
    .await;

    app.server()
        .post("/submit")
        .json(&submit_body("Show.S01E01", &magnet(HASH), 2.0))
        .await;

    let events = capture.wait_for(1).await;
    assert!(matches!(&events[0], Event::DownloadRejected { name } if name == "Show.S01E01"));
}

#[tokio::test]
async fn quality_advisor_suggestions_are_published_when_enabled() {
    let alpha = MockBackend::reachable("alpha", 900.0);
    let capture = Arc::new(CaptureNotifier::default());

    let mut config = config_for(&[alpha.clone()]);
    config.request_tracking.check_quality_profiles = true;
    config.request_tracking.send_suggestions = true;

    let plane = RoutingPlane::new(
        Arc::new(config),
        vec![alpha as Arc<dyn dispatcher::services::NodeBackend>],
        vec![capture.clone() as Arc<dyn Notifier>],
    );
    let dispatcher = Dispatcher::with_plane(plane, Metrics::new().unwrap())
        .with_advisor(Arc::new(UpgradeAdvisor));

    let req = SubmitRequest {
        name: "Show.S01E01.1080p".to_string(),
        category: "tv".to_string(),
        size_estimate_gb: 2.0,
        magnet: magnet(HASH),
    };
    dispatcher.submit(&req).await;

    let events = capture.wait_for(2).await;
    assert!(events.iter().any(|e| matches!(
        e,
        Event::QualitySuggestion { suggested_quality, .. } if suggested_quality == "2160p"
    )));
}

#[tokio::test]
async fn advisor_is_not_consulted_when_disabled() {
    let alpha = MockBackend::reachable("alpha", 900.0);
    let capture = Arc::new(CaptureNotifier::default());

    // check_quality_profiles defaults to false
    let config: AppConfig = config_for(&[alpha.clone()]);
    let plane = RoutingPlane::new(
        Arc::new(config),
        vec![alpha as Arc<dyn dispatcher::services::NodeBackend>],
        vec![capture.clone() as Arc<dyn Notifier>],
    );
    let dispatcher = Dispatcher::with_plane(plane, Metrics::new().unwrap())
        .with_advisor(Arc::new(UpgradeAdvisor));

    let req = SubmitRequest {
        name: "Show.S01E01.1080p".to_string(),
        category: "tv".to_string(),
        size_estimate_gb: 2.0,
        magnet: magnet(HASH),
    };
    dispatcher.submit(&req).await;

    let events = capture.wait_for(1).await;
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::QualitySuggestion { .. })));
}
