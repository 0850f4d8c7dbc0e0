//! Vigil - multi-modal risk dashboard engine
//!
//! Fuses verdicts from independent detectors (weapon and violence
//! classifiers over camera frames, a risk-language analyzer over free text)
//! into one bounded risk score with a transient alert, and serves that
//! state to a dashboard.

pub mod capture;
pub mod dashboard;
pub mod engine;
pub mod gateway;
pub mod logging;

/// Re-export commonly used types
pub use capture::{FrameSpool, TextBuffer};
pub use dashboard::DashboardServer;
pub use engine::{DetectionEngine, Modality, RiskLedger, RiskLevel, RiskSnapshot, RiskState};
pub use gateway::HttpGateway;

use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub gateway_url: String,
    /// Client-side request timeout; `None` waits indefinitely
    pub gateway_timeout: Option<Duration>,
    pub dashboard_port: u16,
    pub frame_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:8080".to_string(),
            gateway_timeout: None,
            dashboard_port: 8090,
            frame_dir: PathBuf::from("frames"),
            log_dir: default_log_dir(),
        }
    }
}

impl Config {
    /// Defaults overridden by `VIGIL_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("VIGIL_GATEWAY_URL") {
            config.gateway_url = url;
        }
        if let Some(port) = lookup("VIGIL_DASHBOARD_PORT").and_then(|p| p.parse().ok()) {
            config.dashboard_port = port;
        }
        if let Some(dir) = lookup("VIGIL_FRAME_DIR") {
            config.frame_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("VIGIL_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("VIGIL_GATEWAY_TIMEOUT_SECS").and_then(|s| s.parse::<u64>().ok()) {
            config.gateway_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        config
    }
}

fn default_log_dir() -> PathBuf {
    #[cfg(windows)]
    {
        std::env::var("ProgramData")
            .map(|p| PathBuf::from(p).join("Vigil").join("logs"))
            .unwrap_or_else(|_| PathBuf::from("C:/ProgramData/Vigil/logs"))
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("logs")
    }
}
