//! Intents and plans submitted by agents.
//!
//! An [`Intent`] is a single proposed tool invocation annotated with a
//! description and declared capabilities. A [`Plan`] is an ordered sequence
//! of proposed steps submitted together for speculative evaluation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A single proposed tool invocation by an agent.
///
/// Created by the gateway on each action, consumed by the policy and drift
/// engines, persisted once in the ledger, and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    /// Unique identifier for this intent instance.
    pub id: Uuid,
    /// The agent proposing the action.
    pub agent_id: String,
    /// When the intent was created.
    pub timestamp: DateTime<Utc>,
    /// Free-text description of what the agent wants to do.
    pub description: String,
    /// Capabilities the agent declares for this action (e.g. `hris.read`).
    pub capabilities: Vec<String>,
    /// Tool being invoked, as `Service.action` (e.g. `Calendar.book`).
    pub tool: String,
    /// Structured tool arguments.
    pub args: Value,
    /// Pre-computed embedding of the description, if the caller has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Intent {
    /// Create a new intent with an auto-generated id and current timestamp.
    pub fn new(
        agent_id: impl Into<String>,
        tool: impl Into<String>,
        description: impl Into<String>,
        capabilities: Vec<String>,
        args: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
            description: description.into(),
            capabilities,
            tool: tool.into(),
            args,
            embedding: None,
        }
    }

    /// Same as [`new`](Self::new) but with an explicit timestamp.
    ///
    /// Used by the simulator for synthetic step intents and by tests that
    /// need reproducible inter-arrival times.
    pub fn at(
        agent_id: impl Into<String>,
        tool: impl Into<String>,
        description: impl Into<String>,
        capabilities: Vec<String>,
        args: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let mut intent = Self::new(agent_id, tool, description, capabilities, args);
        intent.timestamp = timestamp;
        intent
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} by {}", self.tool, self.agent_id)
    }
}

/// A single step in a proposed plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// Zero-based position within the plan.
    pub seq: usize,
    /// Tool to invoke, as `Service.action`.
    pub tool: String,
    /// Structured arguments. String values of the form `"$steps[k].field"`
    /// are resolved against the simulated output of step `k`.
    pub args: Value,
}

/// An ordered list of proposed steps, immutable input to the simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: Uuid,
    /// The agent that owns the plan.
    pub agent_id: String,
    /// Steps in execution order.
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Build a plan from `(tool, args)` pairs, numbering steps by position.
    pub fn new(agent_id: impl Into<String>, steps: Vec<(&str, Value)>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            steps: steps
                .into_iter()
                .enumerate()
                .map(|(seq, (tool, args))| PlanStep {
                    seq,
                    tool: tool.to_string(),
                    args,
                })
                .collect(),
        }
    }
}

/// Merge a MODIFY patch into an argument object, returning the mutated form.
///
/// Only top-level object keys are patched. Non-object arguments are returned
/// unchanged when the patch is empty, or replaced by the patch otherwise.
pub fn apply_patch(args: &Value, patch: &Value) -> Value {
    match (args, patch) {
        (Value::Object(base), Value::Object(overlay)) => {
            let mut merged = base.clone();
            for (key, value) in overlay {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        (_, Value::Object(overlay)) if overlay.is_empty() => args.clone(),
        _ => patch.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn intent_serialization_roundtrip() {
        let intent = Intent::new(
            "scheduler",
            "Calendar.book",
            "Book an interview slot",
            vec!["calendar.book".into()],
            json!({"date": "2026-02-10", "time": "14:00"}),
        );
        let json = serde_json::to_string(&intent).unwrap();
        let back: Intent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.agent_id, "scheduler");
        assert_eq!(back.tool, "Calendar.book");
        assert_eq!(back.capabilities, vec!["calendar.book".to_string()]);
    }

    #[test]
    fn plan_numbers_steps_in_order() {
        let plan = Plan::new(
            "scheduler",
            vec![
                ("Calendar.check", json!({"date": "2026-02-10"})),
                ("Calendar.book", json!({"date": "2026-02-10"})),
            ],
        );
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].seq, 0);
        assert_eq!(plan.steps[1].seq, 1);
        assert_eq!(plan.steps[1].tool, "Calendar.book");
    }

    #[test]
    fn apply_patch_overwrites_only_patched_fields() {
        let args = json!({"to": "x@example.com", "body": "555-123-4567"});
        let patch = json!({"body": "[REDACTED_PHONE]"});
        let merged = apply_patch(&args, &patch);
        assert_eq!(merged["to"], "x@example.com");
        assert_eq!(merged["body"], "[REDACTED_PHONE]");
    }

    #[test]
    fn apply_patch_empty_patch_is_identity() {
        let args = json!({"a": 1});
        let merged = apply_patch(&args, &json!({}));
        assert_eq!(merged, args);
    }
}
