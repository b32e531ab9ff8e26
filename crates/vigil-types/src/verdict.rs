//! Policy verdicts and remediation records.
//!
//! A [`Verdict`] is the outcome of evaluating one intent against the active
//! rule set. MODIFY verdicts carry a patch that the gateway applies to the
//! arguments before downstream execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The composite decision produced by the policy engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Decision {
    /// The action may proceed unchanged.
    Allow,
    /// The action is blocked.
    Deny,
    /// The action may proceed with the mutated arguments in the patch.
    Modify,
    /// The action proceeds, with a warning surfaced to the caller.
    Warn,
}

impl Decision {
    /// Whether the action is permitted to execute (possibly mutated).
    pub fn permits_execution(&self) -> bool {
        !matches!(self, Decision::Deny)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Allow => write!(f, "ALLOW"),
            Decision::Deny => write!(f, "DENY"),
            Decision::Modify => write!(f, "MODIFY"),
            Decision::Warn => write!(f, "WARN"),
        }
    }
}

/// How easily applying a remediation can be undone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Reversibility {
    High,
    Medium,
    Low,
}

/// A remediation record attached to a Deny outcome by the rule that denied.
///
/// Rules own their remediations; the engine never synthesizes one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Remediation {
    /// Short natural-language suggestion for the caller.
    pub suggestion: String,
    /// Optional concrete fix: a patch that, applied to the arguments,
    /// would make the action pass (e.g. clamp a salary to the band cap).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_fix: Option<Value>,
    /// How reversible applying the fix would be.
    pub reversibility: Reversibility,
}

impl Remediation {
    pub fn new(suggestion: impl Into<String>, reversibility: Reversibility) -> Self {
        Self {
            suggestion: suggestion.into(),
            auto_fix: None,
            reversibility,
        }
    }

    pub fn with_fix(mut self, fix: Value) -> Self {
        self.auto_fix = Some(fix);
        self
    }
}

/// Outcome of evaluating an intent against the active rule set.
///
/// Immutable once produced. Recorded alongside the intent in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// The composite decision after precedence resolution.
    pub decision: Decision,
    /// Ids of every rule that triggered, in evaluation (rule id) order.
    pub rule_ids: Vec<String>,
    /// Human-readable reasons, parallel to `rule_ids`.
    pub reasons: Vec<String>,
    /// Accumulated MODIFY patch, present only when `decision` is Modify.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Value>,
    /// Remediation from the headline Deny, when `decision` is Deny.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<Remediation>,
    /// Rules whose evaluation failed and were converted to denies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub crashed_rules: Vec<String>,
    /// When the evaluation occurred.
    pub timestamp: DateTime<Utc>,
}

impl Verdict {
    /// An ALLOW verdict with no triggered rules.
    pub fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            rule_ids: Vec::new(),
            reasons: Vec::new(),
            patch: None,
            remediation: None,
            crashed_rules: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// A DENY verdict from a single rule.
    pub fn deny(
        rule_id: impl Into<String>,
        reason: impl Into<String>,
        remediation: Option<Remediation>,
    ) -> Self {
        Self {
            decision: Decision::Deny,
            rule_ids: vec![rule_id.into()],
            reasons: vec![reason.into()],
            patch: None,
            remediation,
            crashed_rules: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// The first triggered rule id, if any.
    pub fn headline_rule(&self) -> Option<&str> {
        self.rule_ids.first().map(String::as_str)
    }

    /// The first reason, if any.
    pub fn headline_reason(&self) -> Option<&str> {
        self.reasons.first().map(String::as_str)
    }

    pub fn is_deny(&self) -> bool {
        self.decision == Decision::Deny
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decision_display() {
        assert_eq!(Decision::Allow.to_string(), "ALLOW");
        assert_eq!(Decision::Deny.to_string(), "DENY");
        assert_eq!(Decision::Modify.to_string(), "MODIFY");
        assert_eq!(Decision::Warn.to_string(), "WARN");
    }

    #[test]
    fn deny_does_not_permit_execution() {
        assert!(!Decision::Deny.permits_execution());
        assert!(Decision::Allow.permits_execution());
        assert!(Decision::Modify.permits_execution());
        assert!(Decision::Warn.permits_execution());
    }

    #[test]
    fn verdict_serialization_roundtrip() {
        let verdict = Verdict::deny(
            "hr_compensation_bands",
            "salary exceeds band cap",
            Some(
                Remediation::new("clamp salary to the band cap", Reversibility::High)
                    .with_fix(json!({"salary": 180000})),
            ),
        );
        let json = serde_json::to_string(&verdict).unwrap();
        let back: Verdict = serde_json::from_str(&json).unwrap();
        assert!(back.is_deny());
        assert_eq!(back.headline_rule(), Some("hr_compensation_bands"));
        let fix = back.remediation.unwrap().auto_fix.unwrap();
        assert_eq!(fix["salary"], 180000);
    }
}
