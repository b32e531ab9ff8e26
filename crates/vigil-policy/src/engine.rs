//! The policy evaluation engine.
//!
//! Holds the active [`RuleSet`] behind a reader-writer lock. `evaluate`
//! captures an `Arc` snapshot, so in-flight evaluations keep their rule set
//! across a concurrent `reload`.

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use vigil_types::{Decision, Intent, Remediation, Verdict, VigilError};

use crate::rule::{PolicyContext, Rule, RuleOutcome};
use crate::source::parse_rules;
use crate::DEFAULT_RULES;

/// An immutable, id-sorted rule set with a version stamp.
#[derive(Debug)]
pub struct RuleSet {
    /// Monotonically increasing version, bumped on every reload.
    pub version: u64,
    rules: Vec<Rule>,
}

impl RuleSet {
    fn new(version: u64, rules: Vec<Rule>) -> Self {
        Self { version, rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Evaluate every applicable rule and compose the outcomes.
    ///
    /// Pure: repeated calls with the same intent return the same verdict.
    /// Composition precedence is Deny over Modify over Warn over Allow;
    /// ties are broken by rule id order, which is the evaluation order.
    pub fn evaluate(&self, intent: &Intent, ctx: &PolicyContext) -> Verdict {
        let mut denies: Vec<(String, String, Option<Remediation>)> = Vec::new();
        let mut modifies: Vec<(String, Value, String)> = Vec::new();
        let mut warns: Vec<(String, String)> = Vec::new();
        let mut crashed: Vec<String> = Vec::new();

        for rule in &self.rules {
            match rule.kind.evaluate(intent, ctx) {
                Ok(RuleOutcome::NotApplicable) | Ok(RuleOutcome::Allow) => {}
                Ok(RuleOutcome::Warn { reason }) => warns.push((rule.id.clone(), reason)),
                Ok(RuleOutcome::Modify { patch, reason }) => {
                    modifies.push((rule.id.clone(), patch, reason))
                }
                Ok(RuleOutcome::Deny { reason, remediation }) => {
                    denies.push((rule.id.clone(), reason, remediation))
                }
                Err(e) => {
                    tracing::error!(rule_id = %rule.id, error = %e, "rule evaluation failed");
                    crashed.push(rule.id.clone());
                    denies.push((rule.id.clone(), format!("rule crash: {}", rule.id), None));
                }
            }
        }

        if !denies.is_empty() {
            let remediation = denies[0].2.clone();
            return Verdict {
                decision: Decision::Deny,
                rule_ids: denies.iter().map(|(id, _, _)| id.clone()).collect(),
                reasons: denies.into_iter().map(|(_, reason, _)| reason).collect(),
                patch: None,
                remediation,
                crashed_rules: crashed,
                timestamp: chrono::Utc::now(),
            };
        }

        if !modifies.is_empty() {
            match merge_patches(&modifies) {
                Ok(patch) => {
                    return Verdict {
                        decision: Decision::Modify,
                        rule_ids: modifies.iter().map(|(id, _, _)| id.clone()).collect(),
                        reasons: modifies.into_iter().map(|(_, _, r)| r).collect(),
                        patch: Some(Value::Object(patch)),
                        remediation: None,
                        crashed_rules: crashed,
                        timestamp: chrono::Utc::now(),
                    }
                }
                Err(reason) => {
                    // Overlapping patches are a configuration error; fail closed.
                    tracing::error!(reason = %reason, "conflicting modify patches");
                    return Verdict {
                        decision: Decision::Deny,
                        rule_ids: modifies.iter().map(|(id, _, _)| id.clone()).collect(),
                        reasons: vec![reason],
                        patch: None,
                        remediation: None,
                        crashed_rules: crashed,
                        timestamp: chrono::Utc::now(),
                    };
                }
            }
        }

        if !warns.is_empty() {
            return Verdict {
                decision: Decision::Warn,
                rule_ids: warns.iter().map(|(id, _)| id.clone()).collect(),
                reasons: warns.into_iter().map(|(_, reason)| reason).collect(),
                patch: None,
                remediation: None,
                crashed_rules: crashed,
                timestamp: chrono::Utc::now(),
            };
        }

        let mut verdict = Verdict::allow();
        verdict.crashed_rules = crashed;
        verdict
    }
}

/// Merge MODIFY patches, requiring disjoint top-level fields.
fn merge_patches(modifies: &[(String, Value, String)]) -> Result<Map<String, Value>, String> {
    let mut merged = Map::new();
    let mut owners: Vec<(String, String)> = Vec::new();

    for (rule_id, patch, _) in modifies {
        let Value::Object(fields) = patch else {
            return Err(format!("rule {rule_id} produced a non-object patch"));
        };
        for (field, value) in fields {
            if let Some((_, prior)) = owners.iter().find(|(f, _)| f == field) {
                return Err(format!(
                    "conflicting modify patches on field '{field}' ({prior}, {rule_id})"
                ));
            }
            owners.push((field.clone(), rule_id.clone()));
            merged.insert(field.clone(), value.clone());
        }
    }
    Ok(merged)
}

/// Introspection record for one loaded rule.
#[derive(Debug, Clone, Serialize)]
pub struct RuleDescriptor {
    pub id: String,
    pub domain: String,
    pub kind: &'static str,
}

/// The engine: an atomically swappable rule set plus evaluation entry points.
pub struct PolicyEngine {
    active: RwLock<Arc<RuleSet>>,
}

impl PolicyEngine {
    /// Create an engine from a rule document.
    pub fn from_source(json: &str) -> Result<Self, VigilError> {
        let rules = parse_rules(json)?;
        tracing::info!(rules = rules.len(), "policy engine loaded");
        Ok(Self {
            active: RwLock::new(Arc::new(RuleSet::new(1, rules))),
        })
    }

    /// Create an engine with the built-in default rule set.
    pub fn with_builtin() -> Result<Self, VigilError> {
        Self::from_source(DEFAULT_RULES)
    }

    /// Capture the active rule set. In-flight evaluations against the
    /// returned snapshot are unaffected by later reloads.
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.active.read().clone()
    }

    /// Evaluate an intent against the active rule set.
    pub fn evaluate(&self, intent: &Intent, ctx: &PolicyContext) -> Verdict {
        self.snapshot().evaluate(intent, ctx)
    }

    /// Atomically replace the active rule set, returning the new version.
    ///
    /// On any parse or validation failure the previous set stays active.
    pub fn reload(&self, json: &str) -> Result<u64, VigilError> {
        let rules = parse_rules(json)?;
        let mut active = self.active.write();
        let version = active.version + 1;
        *active = Arc::new(RuleSet::new(version, rules));
        tracing::info!(version, "policy rule set reloaded");
        Ok(version)
    }

    /// List the active rules for introspection.
    pub fn list_rules(&self) -> Vec<RuleDescriptor> {
        self.snapshot()
            .rules()
            .iter()
            .map(|r| RuleDescriptor {
                id: r.id.clone(),
                domain: r.domain.clone(),
                kind: r.kind.name(),
            })
            .collect()
    }
}
