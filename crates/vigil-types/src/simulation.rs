//! Simulation results produced by the plan simulator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::verdict::{Remediation, Verdict};

/// Outcome of one simulated step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StepStatus {
    Allow,
    Warn,
    Modify,
    Deny,
    /// A templated argument referenced a step that was not allowed.
    DependencyBlocked,
    /// The registered tool stub exceeded its deadline; treated as a deny.
    StubTimeout,
}

impl StepStatus {
    /// Whether the step would have been permitted to execute.
    pub fn permitted(&self) -> bool {
        matches!(self, StepStatus::Allow | StepStatus::Warn | StepStatus::Modify)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Allow => write!(f, "ALLOW"),
            StepStatus::Warn => write!(f, "WARN"),
            StepStatus::Modify => write!(f, "MODIFY"),
            StepStatus::Deny => write!(f, "DENY"),
            StepStatus::DependencyBlocked => write!(f, "DEPENDENCY_BLOCKED"),
            StepStatus::StubTimeout => write!(f, "STUB_TIMEOUT"),
        }
    }
}

/// Result of simulating a single plan step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub seq: usize,
    pub tool: String,
    /// Arguments after template resolution (and MODIFY patching, if any).
    pub args: Value,
    pub status: StepStatus,
    /// One-line reason mirrored from the policy verdict or step status.
    pub reason: String,
    /// Full policy verdict for the step, absent for dependency-blocked steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    /// Composite risk score on the cloned fingerprint after this step.
    pub risk_score: f64,
    /// Synthetic return value from the tool stub, when one was registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stub_output: Option<Value>,
    /// Remediation hint for blocked steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<Remediation>,
}

/// Overall verdict for a simulated plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SimulationOutcome {
    Allowed,
    Blocked,
}

/// Complete result of simulating a plan, with per-step detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub plan_id: Uuid,
    pub agent_id: String,
    pub simulated_at: DateTime<Utc>,
    pub overall: SimulationOutcome,
    pub steps: Vec<StepResult>,
    pub allowed_count: usize,
    pub blocked_count: usize,
    pub modified_count: usize,
    /// Union of capability strings the plan would exercise.
    pub capabilities_requested: Vec<String>,
}

impl SimulationResult {
    pub fn is_allowed(&self) -> bool {
        self.overall == SimulationOutcome::Allowed
    }
}
