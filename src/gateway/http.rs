//! HTTP client for the detection gateway

use crate::capture::EvidenceUnit;
use crate::engine::modality::{Modality, Verdict};
use crate::gateway::wire::{ImageRequest, ImageVerdictBody, TextRequest, TextVerdictBody};
use crate::gateway::{DetectionGateway, GatewayError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

// Longest response body echoed back in a rejection error
const MAX_ERROR_BODY: usize = 512;

pub struct HttpGateway {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpGateway {
    /// Create a client for the gateway at `base_url`.
    ///
    /// `timeout` of `None` leaves requests unbounded.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, GatewayError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .map_err(|e| GatewayError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, modality: Modality) -> String {
        match modality {
            Modality::Weapon | Modality::Violence => {
                format!("{}/api/detect/{}", self.base_url, modality.wire_name())
            }
            Modality::TextAnalysis => format!("{}/api/text/analyze", self.base_url),
        }
    }

    async fn post<B, R>(&self, url: &str, body: &B) -> Result<R, GatewayError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!("POST {}", url);

        let response = self
            .http_client
            .post(url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!("Gateway returned {} for {}", status, url);
            let mut body = text;
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&text).map_err(|e| GatewayError::MalformedVerdict(e.to_string()))
    }
}

#[async_trait]
impl DetectionGateway for HttpGateway {
    async fn submit(
        &self,
        modality: Modality,
        evidence: EvidenceUnit,
    ) -> Result<Verdict, GatewayError> {
        let url = self.endpoint(modality);

        match (modality, evidence) {
            (Modality::Weapon | Modality::Violence, EvidenceUnit::Image(frame)) => {
                let request = ImageRequest {
                    image_data_url: frame.to_data_url(),
                };
                let body: ImageVerdictBody = self.post(&url, &request).await?;
                Ok(body.into())
            }
            (Modality::TextAnalysis, EvidenceUnit::Text(text)) => {
                let request = TextRequest { text };
                let body: TextVerdictBody = self.post(&url, &request).await?;
                Ok(body.into())
            }
            (modality, _) => Err(GatewayError::UnsupportedEvidence(modality)),
        }
    }
}
