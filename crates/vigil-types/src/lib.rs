//! Core types shared across all Vigil crates.
//!
//! Defines intents, plans, verdicts, risk state, simulation results,
//! configuration, and error types used by the policy engine, drift engine,
//! plan simulator, audit ledger, and gateway.

pub mod config;
pub mod error;
pub mod intent;
pub mod risk;
pub mod simulation;
pub mod verdict;

pub use config::{CoreConfig, DriftConfig, RiskThresholds, SignalWeights};
pub use error::VigilError;
pub use intent::{apply_patch, Intent, Plan, PlanStep};
pub use risk::{
    AlertSeverity, DriftAlert, ForensicSnapshot, IntentSummary, Resurrection, RiskLevel,
    RiskState, SignalContribution,
};
pub use simulation::{SimulationOutcome, SimulationResult, StepResult, StepStatus};
pub use verdict::{Decision, Remediation, Reversibility, Verdict};
