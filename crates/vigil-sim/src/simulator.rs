//! The plan simulator.
//!
//! Each step becomes a synthetic intent evaluated against a pinned policy
//! snapshot; risk deltas accrue on a cloned fingerprint, so the agent's
//! live profile is untouched. Deterministic for a fixed (plan, fingerprint
//! snapshot, policy version, stub set, base timestamp).

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Arc;

use vigil_drift::{DriftEngine, Fingerprint, HashEmbedder, IntentRecord};
use vigil_policy::{PolicyContext, PolicyEngine, RuleSet};
use vigil_types::{
    Decision, Intent, Plan, SimulationOutcome, SimulationResult, StepResult, StepStatus,
};

use crate::stub::{StubError, StubRegistry};

/// Overrides for `what_if` simulations.
#[derive(Default)]
pub struct WhatIfOverrides {
    /// Fingerprint to simulate against instead of the agent's live one.
    pub fingerprint: Option<Fingerprint>,
    /// Pinned policy snapshot instead of the engine's active set.
    pub rules: Option<Arc<RuleSet>>,
}

/// Simulates plans without side effects.
pub struct PlanSimulator {
    policy: Arc<PolicyEngine>,
    drift: Arc<DriftEngine>,
    stubs: StubRegistry,
}

impl PlanSimulator {
    pub fn new(policy: Arc<PolicyEngine>, drift: Arc<DriftEngine>, stubs: StubRegistry) -> Self {
        Self {
            policy,
            drift,
            stubs,
        }
    }

    pub fn stubs(&self) -> &StubRegistry {
        &self.stubs
    }

    /// Simulate a plan against the agent's current fingerprint and the
    /// active policy set.
    pub fn simulate(&self, agent_id: &str, plan: &Plan) -> SimulationResult {
        self.simulate_at(agent_id, plan, Utc::now(), WhatIfOverrides::default())
    }

    /// Hypothetical simulation with an explicit fingerprint and/or policy
    /// snapshot.
    pub fn what_if(
        &self,
        agent_id: &str,
        plan: &Plan,
        overrides: WhatIfOverrides,
    ) -> SimulationResult {
        self.simulate_at(agent_id, plan, Utc::now(), overrides)
    }

    /// Core simulation with an explicit base timestamp. Step `k` is
    /// evaluated as if submitted at `base + k` seconds.
    pub fn simulate_at(
        &self,
        agent_id: &str,
        plan: &Plan,
        base: DateTime<Utc>,
        overrides: WhatIfOverrides,
    ) -> SimulationResult {
        let config = self.drift.config().clone();
        let rules = overrides
            .rules
            .unwrap_or_else(|| self.policy.snapshot());
        let mut fingerprint = overrides
            .fingerprint
            .or_else(|| self.drift.fingerprint(agent_id))
            .unwrap_or_else(|| Fingerprint::new(agent_id, config.window));
        let embedder = HashEmbedder::new(config.embedding_dimension);
        let ctx = PolicyContext::default();

        let mut steps: Vec<StepResult> = Vec::with_capacity(plan.steps.len());
        let mut outputs: Vec<Option<Value>> = Vec::with_capacity(plan.steps.len());
        let mut permitted: Vec<bool> = Vec::with_capacity(plan.steps.len());
        let mut capabilities_requested: Vec<String> = Vec::new();
        let mut crossed_pause = false;

        for step in &plan.steps {
            let timestamp = base + Duration::seconds(step.seq as i64);

            // Resolve chained argument templates against earlier outputs.
            let args = match resolve_templates(&step.args, &outputs, &permitted) {
                Ok(resolved) => resolved,
                Err(reason) => {
                    tracing::debug!(seq = step.seq, reason = %reason, "step dependency blocked");
                    steps.push(StepResult {
                        seq: step.seq,
                        tool: step.tool.clone(),
                        args: step.args.clone(),
                        status: StepStatus::DependencyBlocked,
                        reason,
                        verdict: None,
                        risk_score: fingerprint_score_placeholder(&steps),
                        stub_output: None,
                        remediation: None,
                    });
                    outputs.push(None);
                    permitted.push(false);
                    continue;
                }
            };

            let caps = self.stubs.capabilities_for(&step.tool, &args);
            for cap in &caps {
                if !capabilities_requested.contains(cap) {
                    capabilities_requested.push(cap.clone());
                }
            }

            let intent = Intent::at(
                agent_id,
                step.tool.clone(),
                format!("{} {}", step.tool, args),
                caps,
                args.clone(),
                timestamp,
            );

            let verdict = rules.evaluate(&intent, &ctx);
            let mut status = match verdict.decision {
                Decision::Allow => StepStatus::Allow,
                Decision::Warn => StepStatus::Warn,
                Decision::Modify => StepStatus::Modify,
                Decision::Deny => StepStatus::Deny,
            };
            let mut reason = verdict
                .headline_reason()
                .unwrap_or("policy approved")
                .to_string();

            // Downstream steps see the mutated form, like real execution.
            let effective_args = match (&status, &verdict.patch) {
                (StepStatus::Modify, Some(patch)) => vigil_types::apply_patch(&args, patch),
                _ => args.clone(),
            };

            let mut stub_output = None;
            if status.permitted() {
                if let Some((stub, action)) = self.stubs.resolve(&step.tool) {
                    match stub.invoke(action, &effective_args, None) {
                        Ok(value) => stub_output = Some(value),
                        Err(StubError::Timeout) => {
                            status = StepStatus::StubTimeout;
                            reason = "tool stub deadline expired".to_string();
                        }
                        Err(StubError::Failure(msg)) => {
                            status = StepStatus::Deny;
                            reason = format!("tool stub failed: {msg}");
                        }
                    }
                }
            }

            // Risk delta on the clone, never on the live fingerprint.
            let embedding = embedder.vector(&intent.description);
            let learning = fingerprint.total_intents < config.learning_intents as u64;
            let signals = vigil_drift::score::compute_signals(
                &fingerprint,
                &embedding,
                &intent.capabilities,
                timestamp,
                &config,
            );
            let (risk_score, _) = signals.composite(&config, learning);
            if !learning && risk_score >= config.thresholds.pause {
                crossed_pause = true;
            }
            fingerprint.record(
                IntentRecord {
                    intent_id: intent.id,
                    timestamp,
                    tool: intent.tool.clone(),
                    description: intent.description.clone(),
                    capabilities: intent.capabilities.clone(),
                    embedding,
                    denied: !status.permitted(),
                },
                config.interval_smoothing,
            );

            let remediation = if status == StepStatus::Deny {
                verdict.remediation.clone()
            } else {
                None
            };

            outputs.push(stub_output.clone());
            permitted.push(status.permitted());
            steps.push(StepResult {
                seq: step.seq,
                tool: step.tool.clone(),
                args: effective_args,
                status,
                reason,
                verdict: Some(verdict),
                risk_score,
                stub_output,
                remediation,
            });
        }

        let blocked_count = steps.iter().filter(|s| !s.status.permitted()).count();
        let allowed_count = steps.len() - blocked_count;
        let modified_count = steps
            .iter()
            .filter(|s| s.status == StepStatus::Modify)
            .count();
        let overall = if blocked_count == 0 && !crossed_pause {
            SimulationOutcome::Allowed
        } else {
            SimulationOutcome::Blocked
        };

        tracing::info!(
            plan_id = %plan.id,
            agent_id = %agent_id,
            overall = ?overall,
            allowed = allowed_count,
            blocked = blocked_count,
            "plan simulated"
        );

        SimulationResult {
            plan_id: plan.id,
            agent_id: agent_id.to_string(),
            simulated_at: base,
            overall,
            steps,
            allowed_count,
            blocked_count,
            modified_count,
            capabilities_requested,
        }
    }
}

/// Risk score carried by a dependency-blocked step: the last computed
/// score, or zero at the start of the plan.
fn fingerprint_score_placeholder(steps: &[StepResult]) -> f64 {
    steps.last().map(|s| s.risk_score).unwrap_or(0.0)
}

/// Resolve `"$steps[k].field"` templates against earlier step outputs.
///
/// Referencing a step that was not allowed (or produced no output) blocks
/// the dependent step.
fn resolve_templates(
    args: &Value,
    outputs: &[Option<Value>],
    permitted: &[bool],
) -> Result<Value, String> {
    match args {
        Value::String(s) => match parse_reference(s) {
            Some((index, field)) => {
                if index >= outputs.len() {
                    return Err(format!("step {index} has not been simulated yet"));
                }
                if !permitted.get(index).copied().unwrap_or(false) {
                    return Err(format!("depends on blocked step {index}"));
                }
                let Some(output) = &outputs[index] else {
                    return Err(format!("step {index} produced no output"));
                };
                output
                    .get(field)
                    .cloned()
                    .ok_or_else(|| format!("step {index} output has no field '{field}'"))
            }
            None => Ok(args.clone()),
        },
        Value::Array(items) => {
            let mut resolved = Vec::with_capacity(items.len());
            for item in items {
                resolved.push(resolve_templates(item, outputs, permitted)?);
            }
            Ok(Value::Array(resolved))
        }
        Value::Object(map) => {
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                resolved.insert(key.clone(), resolve_templates(value, outputs, permitted)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

/// Parse `$steps[k].field` into `(k, field)`.
fn parse_reference(s: &str) -> Option<(usize, &str)> {
    let rest = s.strip_prefix("$steps[")?;
    let close = rest.find(']')?;
    let index: usize = rest[..close].parse().ok()?;
    let field = rest[close + 1..].strip_prefix('.')?;
    if field.is_empty() {
        return None;
    }
    Some((index, field))
}
