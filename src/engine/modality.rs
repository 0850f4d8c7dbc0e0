//! Detection modalities and analyzer verdicts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid type: {0}")]
pub struct UnknownModality(pub String);

/// Detection category, selects the analyzer endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Weapon classifier over a still frame
    Weapon,
    /// Violence classifier over a still frame
    Violence,
    /// Risk-language analysis over free text
    #[serde(rename = "text")]
    TextAnalysis,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Weapon, Modality::Violence, Modality::TextAnalysis];

    /// Name used in gateway paths and dashboard commands
    pub fn wire_name(&self) -> &'static str {
        match self {
            Modality::Weapon => "weapon",
            Modality::Violence => "violence",
            Modality::TextAnalysis => "text",
        }
    }

    /// Whether this modality is fed by a captured still frame
    pub fn is_image(&self) -> bool {
        matches!(self, Modality::Weapon | Modality::Violence)
    }

    /// Alert shown when the analyzer reports a detection without a message
    pub fn default_alert(&self) -> String {
        format!("⚠ {} detected", self.wire_name())
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for Modality {
    type Err = UnknownModality;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weapon" => Ok(Modality::Weapon),
            "violence" => Ok(Modality::Violence),
            "text" | "text_analysis" | "textanalysis" => Ok(Modality::TextAnalysis),
            other => Err(UnknownModality(other.to_string())),
        }
    }
}

/// Analyzer judgment on one evidence unit.
///
/// Image analyzers fill `detected`, `score` and `message`; the text analyzer
/// fills `summary` and optionally `hits` and leaves `detected` false.
/// `risk_delta` is zero when the analyzer omitted it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    pub detected: bool,
    pub score: f64,
    pub risk_delta: f64,
    pub message: Option<String>,
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hits: Vec<String>,
}

impl Verdict {
    /// Image verdict with a detection and optional message
    pub fn detection(risk_delta: f64, message: Option<&str>) -> Self {
        Self {
            detected: true,
            risk_delta,
            message: message.map(str::to_string),
            ..Self::default()
        }
    }

    /// Image verdict with no detection
    pub fn clear(risk_delta: f64) -> Self {
        Self {
            risk_delta,
            ..Self::default()
        }
    }

    /// Text analysis verdict
    pub fn text(risk_delta: f64, summary: &str) -> Self {
        Self {
            risk_delta,
            summary: Some(summary.to_string()),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_names() {
        for modality in Modality::ALL {
            assert_eq!(modality.wire_name().parse::<Modality>(), Ok(modality));
        }
        assert_eq!(" Weapon ".parse::<Modality>(), Ok(Modality::Weapon));
        assert!("drone".parse::<Modality>().is_err());
    }

    #[test]
    fn test_default_alert() {
        assert_eq!(Modality::Violence.default_alert(), "⚠ violence detected");
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Modality::TextAnalysis).unwrap();
        assert_eq!(json, "\"text\"");
    }
}
