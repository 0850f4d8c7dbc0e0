//! Dashboard control surface
//!
//! HTTP endpoints and a WebSocket channel through which the user triggers
//! detections and observers read the risk state. Rendering lives elsewhere.

pub mod websocket;

use crate::capture::CaptureError;
use crate::engine::{DetectionEngine, DetectionError, Modality, UnknownModality};
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpResponse, HttpServer, ResponseError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    UnknownModality(#[from] UnknownModality),
    #[error("Server error: {0}")]
    Server(#[from] std::io::Error),
}

impl DashboardError {
    pub fn kind(&self) -> &'static str {
        match self {
            DashboardError::Detection(e) => e.kind(),
            DashboardError::Capture(_) => "capture_unavailable",
            DashboardError::UnknownModality(_) => "unknown_modality",
            DashboardError::Server(_) => "server_error",
        }
    }
}

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

impl ResponseError for DashboardError {
    fn status_code(&self) -> StatusCode {
        match self {
            DashboardError::Detection(DetectionError::Capture(CaptureError::Unavailable(_)))
            | DashboardError::Capture(CaptureError::Unavailable(_)) => StatusCode::CONFLICT,
            DashboardError::Detection(DetectionError::Gateway(_)) => StatusCode::BAD_GATEWAY,
            DashboardError::Detection(DetectionError::State(_)) => StatusCode::SERVICE_UNAVAILABLE,
            DashboardError::UnknownModality(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
            kind: self.kind().to_string(),
        })
    }
}

/// Dashboard server bound to one port
pub struct DashboardServer {
    port: u16,
    engine: DetectionEngine,
}

impl DashboardServer {
    pub fn new(port: u16, engine: DetectionEngine) -> Self {
        Self { port, engine }
    }

    /// Serve until the process is stopped
    pub async fn run(&self) -> Result<(), DashboardError> {
        info!("Starting dashboard server on port {}", self.port);

        let engine = web::Data::new(self.engine.clone());

        HttpServer::new(move || App::new().app_data(engine.clone()).configure(configure))
            .bind(("0.0.0.0", self.port))?
            .run()
            .await?;

        Ok(())
    }
}

/// Register every dashboard route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/state", web::get().to(api::get_state))
        .route("/api/capture/start", web::post().to(api::start_capture))
        .route("/api/text", web::put().to(api::set_text))
        .route("/api/text/analyze", web::post().to(api::analyze_text))
        .route("/api/detect/{modality}", web::post().to(api::detect))
        .route("/ws", web::get().to(websocket::ws_handler));
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TextUpdate {
    pub text: String,
}

mod api {
    use super::*;

    /// Current risk snapshot
    pub async fn get_state(engine: web::Data<DetectionEngine>) -> HttpResponse {
        HttpResponse::Ok().json(engine.snapshot())
    }

    pub async fn start_capture(
        engine: web::Data<DetectionEngine>,
    ) -> Result<HttpResponse, DashboardError> {
        engine.start_capture()?;
        Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "capturing" })))
    }

    pub async fn set_text(
        engine: web::Data<DetectionEngine>,
        req: web::Json<TextUpdate>,
    ) -> HttpResponse {
        engine.set_text(req.into_inner().text);
        HttpResponse::NoContent().finish()
    }

    /// Run one image detection
    pub async fn detect(
        engine: web::Data<DetectionEngine>,
        modality: web::Path<String>,
    ) -> Result<HttpResponse, DashboardError> {
        let name = modality.into_inner();
        let modality: Modality = name.parse()?;
        if !modality.is_image() {
            return Err(UnknownModality(name).into());
        }
        let outcome = engine.run_detection(modality).await?;
        Ok(HttpResponse::Ok().json(outcome))
    }

    /// Analyze the current text buffer
    pub async fn analyze_text(
        engine: web::Data<DetectionEngine>,
    ) -> Result<HttpResponse, DashboardError> {
        let outcome = engine.run_detection(Modality::TextAnalysis).await?;
        Ok(HttpResponse::Ok().json(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::TextBuffer;
    use crate::engine::orchestrator::tests::{CannedGateway, StaticFrames};
    use crate::engine::{RiskLedger, RiskSnapshot, RiskState, Verdict};
    use actix_web::test;
    use std::sync::Arc;

    fn engine(live: bool, gateway: CannedGateway) -> DetectionEngine {
        DetectionEngine::new(
            Arc::new(StaticFrames { live }),
            TextBuffer::new(),
            Arc::new(gateway),
            RiskLedger::spawn(RiskState::with_score(50.0)),
        )
    }

    macro_rules! app {
        ($engine:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($engine))
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_get_state() {
        let app = app!(engine(true, CannedGateway::failing()));
        let req = test::TestRequest::get().uri("/api/state").to_request();
        let snapshot: RiskSnapshot = test::call_and_read_body_json(&app, req).await;
        assert_eq!(snapshot.risk_score, 50.0);
        assert!(snapshot.alert_message.is_none());
    }

    #[actix_web::test]
    async fn test_detect_weapon() {
        let gateway = CannedGateway::answering(Verdict::detection(15.0, Some("gun seen")));
        let app = app!(engine(true, gateway));

        let req = test::TestRequest::post().uri("/api/detect/weapon").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["snapshot"]["riskScore"], 65.0);
        assert_eq!(body["snapshot"]["alertMessage"], "gun seen");
        assert_eq!(body["snapshot"]["status"], "Moderate Risk");
    }

    #[actix_web::test]
    async fn test_unknown_modality_is_bad_request() {
        let app = app!(engine(true, CannedGateway::failing()));
        for uri in ["/api/detect/drone", "/api/detect/text"] {
            let req = test::TestRequest::post().uri(uri).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[actix_web::test]
    async fn test_capture_unavailable_is_conflict() {
        let app = app!(engine(false, CannedGateway::failing()));
        let req = test::TestRequest::post().uri("/api/detect/violence").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body.kind, "capture_unavailable");
    }

    #[actix_web::test]
    async fn test_gateway_failure_is_bad_gateway() {
        let app = app!(engine(true, CannedGateway::failing()));
        let req = test::TestRequest::post().uri("/api/detect/weapon").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }

    #[actix_web::test]
    async fn test_text_round_trip() {
        let gateway = CannedGateway::answering(Verdict::text(-5.0, "low threat language"));
        let app = app!(engine(true, gateway));

        let req = test::TestRequest::put()
            .uri("/api/text")
            .set_json(TextUpdate {
                text: "hello".to_string(),
            })
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::post().uri("/api/text/analyze").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["snapshot"]["riskScore"], 45.0);
        assert_eq!(body["snapshot"]["textSummary"], "low threat language");
    }
}
