//! Risk state model
//!
//! A single bounded score plus the transient alert and text summary shown
//! on the dashboard. Every mutation keeps `0 <= risk_score <= 100`.

use crate::engine::modality::{Modality, Verdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_RISK_SCORE: f64 = 0.0;
pub const MAX_RISK_SCORE: f64 = 100.0;

/// Dashboard status derived from the risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Moderate Risk")]
    Moderate,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskLevel {
    /// Bucket a score. Exactly 40 and exactly 70 fall in the lower bucket.
    pub fn from_score(score: f64) -> Self {
        if score > 70.0 {
            RiskLevel::High
        } else if score > 40.0 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Moderate => "Moderate Risk",
            RiskLevel::High => "High Risk",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Hold on a cleared alert, taken by one detection attempt and given back
/// when that attempt settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertTicket {
    epoch: u64,
}

/// Read-only copy of the risk state handed to observers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSnapshot {
    pub risk_score: f64,
    pub alert_message: Option<String>,
    pub text_summary: Option<String>,
    pub status: RiskLevel,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for RiskSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}% - {}", self.risk_score, self.status)
    }
}

#[derive(Debug, Clone)]
pub struct RiskState {
    risk_score: f64,
    alert_message: Option<String>,
    text_summary: Option<String>,
    // Outstanding clears since the alert was last written, and the alert
    // they removed. Writing the alert starts a new epoch.
    open_clears: u32,
    cleared_alert: Option<String>,
    alert_epoch: u64,
    updated_at: DateTime<Utc>,
}

impl RiskState {
    pub fn new() -> Self {
        Self::with_score(MIN_RISK_SCORE)
    }

    /// Start from an arbitrary score, clamped into range
    pub fn with_score(score: f64) -> Self {
        let risk_score = if score.is_finite() {
            score.clamp(MIN_RISK_SCORE, MAX_RISK_SCORE)
        } else {
            MIN_RISK_SCORE
        };
        Self {
            risk_score,
            alert_message: None,
            text_summary: None,
            open_clears: 0,
            cleared_alert: None,
            alert_epoch: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn risk_score(&self) -> f64 {
        self.risk_score
    }

    pub fn alert_message(&self) -> Option<&str> {
        self.alert_message.as_deref()
    }

    pub fn text_summary(&self) -> Option<&str> {
        self.text_summary.as_deref()
    }

    pub fn level(&self) -> RiskLevel {
        RiskLevel::from_score(self.risk_score)
    }

    /// Add `delta` to the score and clamp. Non-finite deltas count as zero.
    pub fn apply_delta(&mut self, delta: f64) -> f64 {
        if delta.is_finite() {
            self.risk_score = (self.risk_score + delta).clamp(MIN_RISK_SCORE, MAX_RISK_SCORE);
            self.updated_at = Utc::now();
        }
        self.risk_score
    }

    /// Clear the alert at the start of a detection attempt
    pub fn clear_alert(&mut self) -> AlertTicket {
        if self.open_clears == 0 {
            self.cleared_alert = self.alert_message.take();
        }
        self.open_clears += 1;
        self.updated_at = Utc::now();
        AlertTicket {
            epoch: self.alert_epoch,
        }
    }

    /// Give back the hold of an abandoned attempt.
    ///
    /// The removed alert comes back once every attempt that cleared it has
    /// been abandoned, unless the alert was written in the meantime. Returns
    /// whether the alert was put back by this call.
    pub fn restore_alert(&mut self, ticket: AlertTicket) -> bool {
        if !self.release(&ticket) || self.open_clears > 0 {
            return false;
        }
        match self.cleared_alert.take() {
            Some(alert) => {
                self.alert_message = Some(alert);
                self.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Fold the verdict of an attempt that held `ticket`. The clear becomes
    /// final, so abandoning the remaining holders no longer restores.
    pub fn settle_verdict(
        &mut self,
        ticket: Option<AlertTicket>,
        modality: Modality,
        verdict: &Verdict,
    ) -> f64 {
        if let Some(ticket) = ticket {
            if self.release(&ticket) {
                self.cleared_alert = None;
            }
        }
        self.apply_verdict(modality, verdict)
    }

    fn release(&mut self, ticket: &AlertTicket) -> bool {
        if ticket.epoch != self.alert_epoch || self.open_clears == 0 {
            return false;
        }
        self.open_clears -= 1;
        true
    }

    fn set_alert(&mut self, message: String) {
        self.alert_message = Some(message);
        self.alert_epoch += 1;
        self.open_clears = 0;
        self.cleared_alert = None;
    }

    /// Fold one verdict into the state.
    ///
    /// Image modalities raise the alert on detection; text analysis only
    /// replaces the summary. The delta is applied in every case.
    pub fn apply_verdict(&mut self, modality: Modality, verdict: &Verdict) -> f64 {
        if modality.is_image() {
            if verdict.detected {
                let message = verdict
                    .message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| modality.default_alert());
                self.set_alert(message);
            }
        } else {
            self.text_summary = Some(verdict.summary.clone().unwrap_or_default());
        }
        self.updated_at = Utc::now();
        self.apply_delta(verdict.risk_delta)
    }

    pub fn snapshot(&self) -> RiskSnapshot {
        RiskSnapshot {
            risk_score: self.risk_score,
            alert_message: self.alert_message.clone(),
            text_summary: self.text_summary.clone(),
            status: self.level(),
            updated_at: self.updated_at,
        }
    }
}

impl Default for RiskState {
    fn default() -> Self {
        Self::new()
    }
}
