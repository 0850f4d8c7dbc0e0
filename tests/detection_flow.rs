//! End-to-end detection flow against a mocked gateway

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use vigil::capture::FrameSource;
use vigil::engine::{DetectionError, DetectionEvent};
use vigil::{DetectionEngine, FrameSpool, HttpGateway, Modality, RiskLedger, RiskState, TextBuffer};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    _frames_dir: TempDir,
    spool: Arc<FrameSpool>,
    engine: DetectionEngine,
}

async fn harness(server: &MockServer, start: f64) -> Harness {
    let frames_dir = TempDir::new().unwrap();
    fs::write(frames_dir.path().join("frame-0001.jpg"), [0xFF, 0xD8, 0xFF, 0xE0]).unwrap();

    let spool = Arc::new(FrameSpool::new(frames_dir.path()));
    let gateway = HttpGateway::new(&server.uri(), None).unwrap();
    let engine = DetectionEngine::new(
        spool.clone(),
        TextBuffer::new(),
        Arc::new(gateway),
        RiskLedger::spawn(RiskState::with_score(start)),
    );

    Harness {
        _frames_dir: frames_dir,
        spool,
        engine,
    }
}

#[tokio::test]
async fn weapon_then_text_accumulates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/detect/weapon"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "detected": true,
            "score": 88.0,
            "riskDelta": 30,
            "message": "⚠ Weapon-like threat detected (demo scoring)"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/text/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "hits": ["heroin", "buy now"],
            "score": 30,
            "riskDelta": 30,
            "summary": "Detected 2 suspicious keywords: heroin, buy now"
        })))
        .mount(&server)
        .await;

    let h = harness(&server, 0.0).await;
    h.spool.start().unwrap();

    let outcome = h.engine.run_detection(Modality::Weapon).await.unwrap();
    assert_eq!(outcome.snapshot.risk_score, 30.0);

    h.engine.set_text("heroin, buy now");
    let outcome = h.engine.run_detection(Modality::TextAnalysis).await.unwrap();

    let snapshot = outcome.snapshot;
    assert_eq!(snapshot.risk_score, 60.0);
    assert_eq!(snapshot.to_string(), "60.00% - Moderate Risk");
    assert_eq!(
        snapshot.alert_message.as_deref(),
        Some("⚠ Weapon-like threat detected (demo scoring)")
    );
    assert_eq!(
        snapshot.text_summary.as_deref(),
        Some("Detected 2 suspicious keywords: heroin, buy now")
    );
}

#[tokio::test]
async fn capture_not_started_never_calls_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, 12.0).await;
    let err = h.engine.run_detection(Modality::Violence).await.unwrap_err();

    assert!(matches!(err, DetectionError::Capture(_)));
    assert_eq!(h.engine.snapshot().risk_score, 12.0);
}

#[tokio::test]
async fn rejected_call_reports_failure_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/detect/violence"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let h = harness(&server, 45.0).await;
    h.spool.start().unwrap();
    let mut events = h.engine.events();

    let err = h.engine.run_detection(Modality::Violence).await.unwrap_err();
    assert_eq!(err.kind(), "gateway_rejected");
    assert_eq!(h.engine.snapshot().risk_score, 45.0);

    let mut saw_failure = false;
    while let Ok(Ok(event)) = tokio::time::timeout(Duration::from_millis(100), events.recv()).await {
        if let DetectionEvent::DetectionFailed { kind, .. } = event {
            assert_eq!(kind, "gateway_rejected");
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}

#[tokio::test]
async fn slow_and_fast_calls_both_land() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/detect/weapon"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_json(serde_json::json!({
                    "detected": true, "score": 90.0, "riskDelta": 30, "message": "slow weapon"
                })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/detect/violence"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "detected": true, "score": 75.0, "riskDelta": 25, "message": "fast violence"
        })))
        .mount(&server)
        .await;

    let h = harness(&server, 0.0).await;
    h.spool.start().unwrap();

    let slow = h.engine.trigger(Modality::Weapon);
    let fast = h.engine.trigger(Modality::Violence);

    let fast_outcome = fast.await.unwrap().unwrap();
    assert_eq!(fast_outcome.snapshot.alert_message.as_deref(), Some("fast violence"));
    slow.await.unwrap().unwrap();

    let snapshot = h.engine.snapshot();
    assert_eq!(snapshot.risk_score, 55.0);
    // last arrival wins the alert
    assert_eq!(snapshot.alert_message.as_deref(), Some("slow weapon"));
}
