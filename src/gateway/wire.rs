//! Request and response bodies of the detection gateway

use crate::engine::modality::Verdict;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/detect/{modality}`
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub image_data_url: String,
}

/// Body of `POST /api/text/analyze`
#[derive(Debug, Serialize, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

/// Image analyzer response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageVerdictBody {
    pub detected: bool,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub risk_delta: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Text analyzer response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextVerdictBody {
    pub summary: String,
    #[serde(default)]
    pub risk_delta: Option<f64>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub hits: Vec<String>,
}

impl From<ImageVerdictBody> for Verdict {
    fn from(body: ImageVerdictBody) -> Self {
        Verdict {
            detected: body.detected,
            score: body.score,
            risk_delta: body.risk_delta.unwrap_or(0.0),
            message: body.message,
            summary: None,
            hits: Vec::new(),
        }
    }
}

impl From<TextVerdictBody> for Verdict {
    fn from(body: TextVerdictBody) -> Self {
        Verdict {
            // the text analyzer reports no detection flag
            detected: false,
            score: body.score.unwrap_or(0.0),
            risk_delta: body.risk_delta.unwrap_or(0.0),
            message: None,
            summary: Some(body.summary),
            hits: body.hits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_risk_delta_is_zero() {
        let body: ImageVerdictBody =
            serde_json::from_str(r#"{"detected": true, "score": 80.5, "message": null}"#).unwrap();
        let verdict = Verdict::from(body);
        assert!(verdict.detected);
        assert_eq!(verdict.risk_delta, 0.0);
        assert_eq!(verdict.score, 80.5);
    }

    #[test]
    fn test_text_body_with_hits() {
        let body: TextVerdictBody = serde_json::from_str(
            r#"{"hits": ["meth"], "score": 15, "riskDelta": 15, "summary": "Detected 1 suspicious keywords: meth"}"#,
        )
        .unwrap();
        let verdict = Verdict::from(body);
        assert!(!verdict.detected);
        assert_eq!(verdict.hits, vec!["meth".to_string()]);
        assert_eq!(verdict.risk_delta, 15.0);
        assert_eq!(verdict.summary.as_deref(), Some("Detected 1 suspicious keywords: meth"));
    }

    #[test]
    fn test_image_body_requires_detected() {
        assert!(serde_json::from_str::<ImageVerdictBody>(r#"{"score": 1}"#).is_err());
    }

    #[test]
    fn test_image_request_field_name() {
        let json = serde_json::to_value(ImageRequest {
            image_data_url: "data:image/jpeg;base64,AA==".to_string(),
        })
        .unwrap();
        assert_eq!(json["imageDataUrl"], "data:image/jpeg;base64,AA==");
    }
}
