//! Risk aggregation and detection orchestration

pub mod ledger;
pub mod modality;
pub mod orchestrator;
pub mod risk_state;

pub use ledger::{LedgerClosed, RiskLedger, RiskStateHandle};
pub use modality::{Modality, UnknownModality, Verdict};
pub use orchestrator::{DetectionEngine, DetectionError, DetectionEvent, DetectionOutcome};
pub use risk_state::{RiskLevel, RiskSnapshot, RiskState};
