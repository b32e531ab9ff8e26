//! The supervision gateway.
//!
//! [`SupervisorCore`] is the typed mediator every tool invocation must
//! pass through: suspension gate, policy evaluation, drift observation,
//! and exactly one INTENT_VERIFIED ledger entry per request. It also
//! fronts plan simulation, agent status, resurrection, and ledger
//! verification for the host.

pub mod persistence;

use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use vigil_drift::{Admission, DriftEngine, HashEmbedder};
use vigil_ledger::{
    ChainReport, EventKind, FileStore, HmacSigner, Ledger, LedgerStore, MemoryStore, Signer,
};
use vigil_policy::{PolicyContext, PolicyEngine};
use vigil_sim::{PlanSimulator, StubRegistry, WhatIfOverrides};
use vigil_types::{
    CoreConfig, Decision, DriftAlert, Intent, Plan, Resurrection, RiskLevel, RiskState,
    SimulationOutcome, SimulationResult, Verdict, VigilError,
};

/// Outcome of one `verify_intent` call, returned to the host.
#[derive(Debug, Clone)]
pub struct IntentDecision {
    pub intent_id: Uuid,
    /// The terminal decision after both policy and drift gating.
    pub decision: Decision,
    /// The policy verdict (synthetic for suspension denies).
    pub verdict: Verdict,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    /// Mutated arguments to use downstream when `decision` is Modify.
    pub patch: Option<Value>,
    /// Drift alert raised by this intent, if any.
    pub alert: Option<DriftAlert>,
    /// Ledger entry id; `None` only in explicit unaudited degraded mode.
    pub ledger_entry: Option<u64>,
}

/// The core mediator. Cheap to share behind an `Arc`.
pub struct SupervisorCore {
    config: CoreConfig,
    policy: Arc<PolicyEngine>,
    drift: Arc<DriftEngine>,
    ledger: Arc<Ledger>,
    simulator: PlanSimulator,
}

impl SupervisorCore {
    /// Compose a core from pre-built subsystems.
    pub fn new(
        config: CoreConfig,
        policy: Arc<PolicyEngine>,
        drift: Arc<DriftEngine>,
        ledger: Arc<Ledger>,
        stubs: StubRegistry,
    ) -> Self {
        let simulator = PlanSimulator::new(policy.clone(), drift.clone(), stubs);
        Self {
            config,
            policy,
            drift,
            ledger,
            simulator,
        }
    }

    /// Core with builtin rules, hash embeddings, builtin stubs, and the
    /// store/signer implied by the config (file-backed when `ledger_path`
    /// is set, in-memory otherwise; demo HMAC signing).
    ///
    /// Replays any existing audit log so state survives restarts.
    pub fn open(config: CoreConfig) -> Result<Self, VigilError> {
        let provider = Arc::new(HashEmbedder::new(config.drift.embedding_dimension));
        let signer: Box<dyn Signer> = Box::new(HmacSigner::ephemeral());
        Self::open_with(config, provider, signer)
    }

    /// Like [`open`](Self::open) but with an explicit embedding provider
    /// and signer.
    pub fn open_with(
        config: CoreConfig,
        provider: Arc<dyn vigil_drift::EmbeddingProvider>,
        signer: Box<dyn Signer>,
    ) -> Result<Self, VigilError> {
        let store: Box<dyn LedgerStore> = match &config.ledger_path {
            Some(path) => Box::new(FileStore::open(path)?),
            None => Box::new(MemoryStore::new()),
        };
        let policy = Arc::new(PolicyEngine::with_builtin()?);
        let drift = Arc::new(DriftEngine::new(config.drift.clone(), provider)?);
        let ledger = Arc::new(Ledger::new(store, signer)?);
        let core = Self::new(
            config,
            policy,
            drift,
            ledger,
            StubRegistry::with_builtin(),
        );
        core.recover()?;
        Ok(core)
    }

    pub fn policy(&self) -> &Arc<PolicyEngine> {
        &self.policy
    }

    pub fn drift(&self) -> &Arc<DriftEngine> {
        &self.drift
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn simulator(&self) -> &PlanSimulator {
        &self.simulator
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Verify a single intent: gate, evaluate, score, record.
    ///
    /// Every call appends exactly one INTENT_VERIFIED entry (plus alert,
    /// enforcement, and snapshot entries as triggered). The pipeline never
    /// throws for policy denies or suspensions; only storage and integrity
    /// failures surface as errors.
    pub fn verify_intent(&self, intent: &Intent) -> Result<IntentDecision, VigilError> {
        match self.drift.admission(&intent.agent_id, Utc::now()) {
            Admission::Clear => {}
            Admission::Throttled => {
                return self.refuse(
                    intent,
                    "drift_throttle",
                    format!(
                        "agent throttled to {} actions/minute",
                        self.config.drift.throttle_per_minute
                    ),
                );
            }
            Admission::Suspended { level, reason } => {
                let rule = match level {
                    RiskLevel::Kill => "drift_kill",
                    _ => "drift_pause",
                };
                return self.refuse(intent, rule, format!("agent suspended: {reason}"));
            }
            Admission::Quarantined { reason } => {
                return self.refuse(intent, "drift_quarantine", format!("agent quarantined: {reason}"));
            }
        }

        let ctx = PolicyContext {
            actions_today: self.drift.actions_today(&intent.agent_id, intent.timestamp),
        };
        let verdict = self.policy.evaluate(intent, &ctx);
        let observation = self.drift.observe(intent, &verdict);

        let ledger_entry = self.append_intent_entry(
            intent,
            &verdict,
            observation.score,
            observation.level,
            observation.embedding_degraded,
            false,
        )?;

        if !verdict.crashed_rules.is_empty() {
            self.append_guarded(
                EventKind::DriftAlert,
                &intent.agent_id,
                json!({
                    "severity": "CRITICAL",
                    "crashed_rules": verdict.crashed_rules.clone(),
                    "intent_id": intent.id,
                }),
            )?;
        }
        if let Some(alert) = &observation.alert {
            let payload = serde_json::to_value(alert)
                .map_err(|e| VigilError::Internal(format!("alert serialization: {e}")))?;
            self.append_guarded(EventKind::DriftAlert, &intent.agent_id, payload)?;
        }
        if observation.transitioned() && observation.level >= RiskLevel::Throttle {
            self.append_guarded(
                EventKind::Enforcement,
                &intent.agent_id,
                json!({
                    "action": observation.level.to_string(),
                    "risk_score": observation.score,
                    "intent_id": intent.id,
                }),
            )?;
        }
        if let Some(snapshot) = &observation.snapshot {
            if let Err(e) = self.ledger.snapshot(snapshot) {
                if !self.config.allow_unaudited {
                    return Err(e);
                }
                tracing::error!(error = %e, "forensic snapshot append failed (unaudited mode)");
            }
        }

        Ok(IntentDecision {
            intent_id: intent.id,
            decision: verdict.decision,
            patch: verdict.patch.clone(),
            alert: observation.alert,
            risk_score: observation.score,
            risk_level: observation.level,
            verdict,
            ledger_entry,
        })
    }

    /// Structured refusal for suspended, quarantined, or throttled agents.
    /// Still appends the INTENT_VERIFIED entry; policy and scoring are
    /// skipped.
    fn refuse(
        &self,
        intent: &Intent,
        rule: &str,
        reason: String,
    ) -> Result<IntentDecision, VigilError> {
        let state = self.drift.status(&intent.agent_id);
        let (score, level) = state
            .map(|s| (s.score, s.level))
            .unwrap_or((0.0, RiskLevel::Ok));
        let verdict = Verdict::deny(rule, reason, None);
        let ledger_entry = self.append_intent_entry(intent, &verdict, score, level, false, true)?;
        Ok(IntentDecision {
            intent_id: intent.id,
            decision: Decision::Deny,
            patch: None,
            alert: None,
            risk_score: score,
            risk_level: level,
            verdict,
            ledger_entry,
        })
    }

    fn append_intent_entry(
        &self,
        intent: &Intent,
        verdict: &Verdict,
        score: f64,
        level: RiskLevel,
        embedding_degraded: bool,
        gated: bool,
    ) -> Result<Option<u64>, VigilError> {
        let mut description = intent.description.clone();
        description.truncate(200);
        let payload = json!({
            "intent_id": intent.id,
            "intent_timestamp": intent.timestamp.to_rfc3339(),
            "tool": intent.tool,
            "description": description,
            "capabilities": intent.capabilities,
            "decision": verdict.decision.to_string(),
            "rule_ids": verdict.rule_ids,
            "reason": verdict.headline_reason(),
            "risk_score": score,
            "risk_level": level.to_string(),
            "embedding_degraded": embedding_degraded,
            // Gated refusals never reached the drift engine; replay skips them.
            "gated": gated,
        });
        match self
            .ledger
            .append(EventKind::IntentVerified, &intent.agent_id, payload)
        {
            Ok(id) => Ok(Some(id)),
            Err(e) if self.config.allow_unaudited => {
                tracing::error!(error = %e, "intent entry append failed (unaudited mode)");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn append_guarded(
        &self,
        kind: EventKind,
        agent_id: &str,
        payload: Value,
    ) -> Result<Option<u64>, VigilError> {
        match self.ledger.append(kind, agent_id, payload) {
            Ok(id) => Ok(Some(id)),
            Err(e) if self.config.allow_unaudited => {
                tracing::error!(error = %e, kind = %kind, "ledger append failed (unaudited mode)");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Simulate a plan. Appends exactly one PLAN_SIMULATED entry and never
    /// touches the agent's live fingerprint.
    pub fn simulate_plan(&self, plan: &Plan) -> Result<SimulationResult, VigilError> {
        match self.drift.admission(&plan.agent_id, Utc::now()) {
            Admission::Suspended { reason, .. } | Admission::Quarantined { reason } => {
                let result = refused_simulation(plan, &reason);
                self.append_guarded(
                    EventKind::PlanSimulated,
                    &plan.agent_id,
                    json!({
                        "plan_id": plan.id,
                        "overall_verdict": "BLOCKED",
                        "refused": true,
                        "reason": reason,
                    }),
                )?;
                return Ok(result);
            }
            _ => {}
        }

        let result = self.simulator.simulate(&plan.agent_id, plan);
        self.append_simulation_entry(&result, false)?;
        Ok(result)
    }

    /// Hypothetical simulation against an explicit fingerprint and/or
    /// policy snapshot.
    pub fn what_if(
        &self,
        plan: &Plan,
        overrides: WhatIfOverrides,
    ) -> Result<SimulationResult, VigilError> {
        let result = self.simulator.what_if(&plan.agent_id, plan, overrides);
        self.append_simulation_entry(&result, true)?;
        Ok(result)
    }

    fn append_simulation_entry(
        &self,
        result: &SimulationResult,
        hypothetical: bool,
    ) -> Result<(), VigilError> {
        self.append_guarded(
            EventKind::PlanSimulated,
            &result.agent_id,
            json!({
                "plan_id": result.plan_id,
                "overall_verdict": result.overall,
                "total_steps": result.steps.len(),
                "allowed": result.allowed_count,
                "blocked": result.blocked_count,
                "modified": result.modified_count,
                "capabilities_requested": result.capabilities_requested,
                "hypothetical": hypothetical,
            }),
        )?;
        Ok(())
    }

    /// Read-only risk state for one agent.
    pub fn agent_status(&self, agent_id: &str) -> Option<RiskState> {
        self.drift.status(agent_id)
    }

    /// Bring a killed agent back, recording a RESURRECTION entry.
    pub fn resurrect(
        &self,
        agent_id: &str,
        admin_id: &str,
        reason: &str,
    ) -> Result<Resurrection, VigilError> {
        let receipt = self.drift.resurrect(agent_id, admin_id, reason)?;
        let payload = serde_json::to_value(&receipt)
            .map_err(|e| VigilError::Internal(format!("resurrection serialization: {e}")))?;
        self.append_guarded(EventKind::Resurrection, agent_id, payload)?;
        Ok(receipt)
    }

    /// Admin resume for a paused or quarantined agent.
    pub fn resume(&self, agent_id: &str, admin_id: &str) -> Result<(), VigilError> {
        self.drift.resume(agent_id, admin_id)?;
        self.append_guarded(
            EventKind::Enforcement,
            agent_id,
            json!({ "action": "resume", "admin_id": admin_id }),
        )?;
        Ok(())
    }

    /// Walk the audit chain, verifying hashes and signatures.
    pub fn verify_ledger(&self) -> Result<ChainReport, VigilError> {
        self.ledger.verify_chain()
    }

    /// Swap in a new policy rule document.
    pub fn reload_policy(&self, json: &str) -> Result<u64, VigilError> {
        self.policy.reload(json)
    }
}

/// A blocked result for a plan refused before simulation.
fn refused_simulation(plan: &Plan, reason: &str) -> SimulationResult {
    tracing::warn!(agent_id = %plan.agent_id, reason = %reason, "plan refused before simulation");
    SimulationResult {
        plan_id: plan.id,
        agent_id: plan.agent_id.clone(),
        simulated_at: Utc::now(),
        overall: SimulationOutcome::Blocked,
        steps: Vec::new(),
        allowed_count: 0,
        blocked_count: plan.steps.len(),
        modified_count: 0,
        capabilities_requested: Vec::new(),
    }
}
