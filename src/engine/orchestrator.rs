//! Detection orchestration
//!
//! One user trigger becomes one detection attempt: clear the alert, capture
//! evidence, make a single gateway call and fold the verdict into the risk
//! ledger. Attempts run independently and complete in whatever order the
//! gateway answers.

use crate::capture::{CaptureError, EvidenceUnit, FrameSource, TextBuffer};
use crate::engine::ledger::{LedgerClosed, RiskStateHandle};
use crate::engine::modality::{Modality, Verdict};
use crate::engine::risk_state::RiskSnapshot;
use crate::gateway::{DetectionGateway, GatewayError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    State(#[from] LedgerClosed),
}

impl DetectionError {
    pub fn kind(&self) -> &'static str {
        match self {
            DetectionError::Capture(_) => "capture_unavailable",
            DetectionError::Gateway(e) => e.kind(),
            DetectionError::State(_) => "state_unavailable",
        }
    }
}

/// Result of a completed detection attempt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionOutcome {
    pub modality: Modality,
    pub verdict: Verdict,
    pub snapshot: RiskSnapshot,
}

/// Live notifications for dashboard observers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetectionEvent {
    AlertCleared {
        modality: Modality,
    },
    VerdictApplied {
        modality: Modality,
        detected: bool,
        risk_delta: f64,
        snapshot: RiskSnapshot,
    },
    DetectionFailed {
        modality: Modality,
        kind: &'static str,
        message: String,
    },
}

/// Orchestration engine shared by every trigger surface
#[derive(Clone)]
pub struct DetectionEngine {
    frames: Arc<dyn FrameSource>,
    text: TextBuffer,
    gateway: Arc<dyn DetectionGateway>,
    state: RiskStateHandle,
    event_tx: broadcast::Sender<DetectionEvent>,
}

impl DetectionEngine {
    pub fn new(
        frames: Arc<dyn FrameSource>,
        text: TextBuffer,
        gateway: Arc<dyn DetectionGateway>,
        state: RiskStateHandle,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            frames,
            text,
            gateway,
            state,
            event_tx,
        }
    }

    /// Run one detection attempt to completion.
    ///
    /// Image modalities clear the alert before capturing. If the attempt is
    /// abandoned (capture or gateway failure) it gives its hold back; the
    /// alert returns once no attempt that cleared it is still in flight.
    pub async fn run_detection(&self, modality: Modality) -> Result<DetectionOutcome, DetectionError> {
        info!(%modality, "Detection triggered");

        let ticket = if modality.is_image() {
            let ticket = self.state.clear_alert().await?;
            self.emit(DetectionEvent::AlertCleared { modality });
            Some(ticket)
        } else {
            None
        };

        match self.acquire_and_submit(modality).await {
            Ok(verdict) => {
                let snapshot = self.state.settle_verdict(ticket, modality, verdict.clone()).await?;
                info!(
                    %modality,
                    detected = verdict.detected,
                    risk_delta = verdict.risk_delta,
                    "Verdict applied, risk now {}",
                    snapshot
                );
                self.emit(DetectionEvent::VerdictApplied {
                    modality,
                    detected: verdict.detected,
                    risk_delta: verdict.risk_delta,
                    snapshot: snapshot.clone(),
                });
                Ok(DetectionOutcome {
                    modality,
                    verdict,
                    snapshot,
                })
            }
            Err(e) => {
                warn!(%modality, "Detection abandoned: {}", e);
                if let Some(ticket) = ticket {
                    if let Err(closed) = self.state.restore_alert(ticket).await {
                        warn!("Could not restore alert: {}", closed);
                    }
                }
                self.emit(DetectionEvent::DetectionFailed {
                    modality,
                    kind: e.kind(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Spawn a detection attempt as its own task
    pub fn trigger(&self, modality: Modality) -> JoinHandle<Result<DetectionOutcome, DetectionError>> {
        let engine = self.clone();
        tokio::spawn(async move { engine.run_detection(modality).await })
    }

    /// Capture the evidence a modality submits
    pub fn acquire(&self, modality: Modality) -> Result<EvidenceUnit, CaptureError> {
        if modality.is_image() {
            Ok(EvidenceUnit::Image(self.frames.capture_image()?))
        } else {
            Ok(EvidenceUnit::Text(self.text.contents()))
        }
    }

    async fn acquire_and_submit(&self, modality: Modality) -> Result<Verdict, DetectionError> {
        let evidence = self.acquire(modality)?;
        let verdict = self.gateway.submit(modality, evidence).await?;
        Ok(verdict)
    }

    /// Start the frame source ("start camera")
    pub fn start_capture(&self) -> Result<(), CaptureError> {
        self.frames.start()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.text.set(text);
    }

    pub fn text(&self) -> String {
        self.text.contents()
    }

    pub fn snapshot(&self) -> RiskSnapshot {
        self.state.snapshot()
    }

    pub fn state(&self) -> &RiskStateHandle {
        &self.state
    }

    pub fn events(&self) -> broadcast::Receiver<DetectionEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: DetectionEvent) {
        // no receivers is fine
        let _ = self.event_tx.send(event);
    }
}
