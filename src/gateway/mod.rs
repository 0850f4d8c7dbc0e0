//! Detection gateway
//!
//! Boundary to the external analyzers. The engine only sees the
//! `DetectionGateway` trait; `HttpGateway` speaks the REST contract.

pub mod http;
pub mod wire;

pub use http::HttpGateway;

use crate::capture::EvidenceUnit;
use crate::engine::modality::{Modality, Verdict};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Gateway unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
    #[error("Gateway rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Malformed verdict: {0}")]
    MalformedVerdict(String),
    #[error("{0} detection cannot take this kind of evidence")]
    UnsupportedEvidence(Modality),
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl GatewayError {
    /// Stable name for the error class, used in API responses
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Unreachable(_) | GatewayError::Client(_) => "gateway_unreachable",
            GatewayError::Rejected { .. } | GatewayError::UnsupportedEvidence(_) => {
                "gateway_rejected"
            }
            GatewayError::MalformedVerdict(_) => "malformed_verdict",
        }
    }
}

/// Analyzer service reachable over a request/response channel
#[async_trait]
pub trait DetectionGateway: Send + Sync {
    /// Submit one evidence unit and wait for the verdict. No timeout is
    /// imposed here; the call may take arbitrarily long.
    async fn submit(&self, modality: Modality, evidence: EvidenceUnit)
        -> Result<Verdict, GatewayError>;
}
