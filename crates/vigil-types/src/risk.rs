//! Risk levels, drift alerts, and forensic snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The enforcement band an agent currently occupies.
///
/// Transitions are one-directional except through an admin resume
/// (Pause to Ok) or resurrection (Kill to Ok).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Ok,
    Warning,
    Throttle,
    Pause,
    Kill,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Ok => write!(f, "OK"),
            RiskLevel::Warning => write!(f, "WARNING"),
            RiskLevel::Throttle => write!(f, "THROTTLE"),
            RiskLevel::Pause => write!(f, "PAUSE"),
            RiskLevel::Kill => write!(f, "KILL"),
        }
    }
}

/// Severity attached to a drift alert.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// One signal's share of a composite risk score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalContribution {
    /// Signal name (`embedding_drift`, `capability_surprisal`, ...).
    pub signal: String,
    /// Raw signal value in [0, 1] before weighting.
    pub raw: f64,
    /// Weighted contribution to the composite score.
    pub contribution: f64,
}

/// Alert emitted when an agent transitions into WARNING, PAUSE, or KILL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftAlert {
    pub alert_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub severity: AlertSeverity,
    /// Composite score that triggered the alert.
    pub risk_score: f64,
    /// Top contributing signals, strongest first (at most two).
    pub dominant_signals: Vec<SignalContribution>,
    /// One-line human explanation of what drifted.
    pub explanation: String,
    /// What the operator should do about it.
    pub suggested_action: String,
    /// The intent that tipped the score.
    pub intent_id: Uuid,
}

/// Transient runtime risk status for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskState {
    pub agent_id: String,
    /// Latest composite risk score in [0, 1].
    pub score: f64,
    /// Current enforcement band.
    pub level: RiskLevel,
    /// Recent score history, oldest first, bounded.
    pub history: Vec<f64>,
    /// When the agent last changed band.
    pub last_transition: DateTime<Utc>,
    /// Why the agent is paused or killed, if it is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// How many times the agent has been resurrected.
    pub resurrections: u32,
    /// Set when the fingerprint failed validation on load; treated as PAUSE
    /// until an admin resumes the agent.
    #[serde(default)]
    pub quarantined: bool,
}

impl RiskState {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            score: 0.0,
            level: RiskLevel::Ok,
            history: Vec::new(),
            last_transition: Utc::now(),
            reason: None,
            resurrections: 0,
            quarantined: false,
        }
    }

    /// Whether new intents from this agent must be refused outright.
    pub fn suspended(&self) -> bool {
        self.quarantined || matches!(self.level, RiskLevel::Pause | RiskLevel::Kill)
    }
}

/// Compact record of one historical intent, carried in forensic snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentSummary {
    pub intent_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    pub description: String,
    pub denied: bool,
}

/// Full capture of an agent's internal state at a critical transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForensicSnapshot {
    pub agent_id: String,
    pub captured_at: DateTime<Utc>,
    pub reason: String,
    pub final_score: f64,
    pub risk_history: Vec<f64>,
    /// The last K intents, oldest first.
    pub recent_intents: Vec<IntentSummary>,
    pub capability_counts: BTreeMap<String, u64>,
    pub resurrections: u32,
}

/// Payload recorded in the ledger when a killed agent is brought back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resurrection {
    pub agent_id: String,
    pub admin_id: String,
    pub reason: String,
    /// Resurrection count after this one, 1-based.
    pub count: u32,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_level_ordering_matches_escalation() {
        assert!(RiskLevel::Ok < RiskLevel::Warning);
        assert!(RiskLevel::Warning < RiskLevel::Throttle);
        assert!(RiskLevel::Throttle < RiskLevel::Pause);
        assert!(RiskLevel::Pause < RiskLevel::Kill);
    }

    #[test]
    fn risk_level_display() {
        assert_eq!(RiskLevel::Ok.to_string(), "OK");
        assert_eq!(RiskLevel::Kill.to_string(), "KILL");
        assert_eq!(RiskLevel::Throttle.to_string(), "THROTTLE");
    }

    #[test]
    fn suspended_covers_pause_kill_and_quarantine() {
        let mut state = RiskState::new("agent-1");
        assert!(!state.suspended());
        state.level = RiskLevel::Pause;
        assert!(state.suspended());
        state.level = RiskLevel::Kill;
        assert!(state.suspended());
        state.level = RiskLevel::Ok;
        state.quarantined = true;
        assert!(state.suspended());
    }

    #[test]
    fn risk_state_serialization_roundtrip() {
        let mut state = RiskState::new("negotiator");
        state.score = 0.42;
        state.level = RiskLevel::Warning;
        state.history = vec![0.1, 0.3, 0.42];
        let json = serde_json::to_string(&state).unwrap();
        let back: RiskState = serde_json::from_str(&json).unwrap();
        assert_eq!(back.level, RiskLevel::Warning);
        assert_eq!(back.history.len(), 3);
    }
}
