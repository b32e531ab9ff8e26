//! The drift engine: observation, enforcement, and resurrection.
//!
//! Agent state lives in a map of per-agent records, each behind its own
//! lock; the outer map lock is held only for lookup and insertion. No
//! operation ever holds two agent locks, so there is no deadlock surface.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use uuid::Uuid;

use vigil_types::{
    DriftConfig, ForensicSnapshot, Intent, IntentSummary, Resurrection, RiskLevel, RiskState,
    RiskThresholds, Verdict, VigilError,
};

use crate::alert::build_alert;
use crate::embedding::{EmbeddingProvider, HashEmbedder};
use crate::fingerprint::{Fingerprint, IntentRecord};
use crate::score::compute_signals;

/// Result of gating a request before any engine work.
#[derive(Debug, Clone)]
pub enum Admission {
    /// Proceed to policy evaluation and scoring.
    Clear,
    /// The agent is inside its throttle window; deny without engine work.
    Throttled,
    /// The agent is paused or killed; deny with the stored reason.
    Suspended { level: RiskLevel, reason: String },
    /// The agent's fingerprint failed validation on load; deny until an
    /// admin resumes it.
    Quarantined { reason: String },
}

/// Everything `observe` learned about one intent.
#[derive(Debug, Clone)]
pub struct Observation {
    pub intent_id: Uuid,
    pub score: f64,
    pub level: RiskLevel,
    pub previous_level: RiskLevel,
    /// Present on any transition into WARNING, PAUSE, or KILL.
    pub alert: Option<vigil_types::DriftAlert>,
    /// Present when this intent pushed the agent into KILL.
    pub snapshot: Option<ForensicSnapshot>,
    /// The embedding provider failed and the hash fallback was used.
    pub embedding_degraded: bool,
}

impl Observation {
    pub fn transitioned(&self) -> bool {
        self.level != self.previous_level
    }
}

/// An intent reconstructed from the audit log during recovery.
#[derive(Debug, Clone)]
pub struct ReplayedIntent {
    pub intent_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub denied: bool,
}

struct AgentEntry {
    fingerprint: Fingerprint,
    risk: RiskState,
    /// Timestamps of recently admitted actions, for the throttle window.
    admitted: VecDeque<DateTime<Utc>>,
}

/// The drift engine. Cheap to share behind an `Arc`.
pub struct DriftEngine {
    config: DriftConfig,
    provider: Arc<dyn EmbeddingProvider>,
    fallback: HashEmbedder,
    agents: Mutex<HashMap<String, Arc<Mutex<AgentEntry>>>>,
}

impl DriftEngine {
    pub fn new(
        config: DriftConfig,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, VigilError> {
        config.validate()?;
        let fallback = HashEmbedder::new(config.embedding_dimension);
        Ok(Self {
            config,
            provider,
            fallback,
            agents: Mutex::new(HashMap::new()),
        })
    }

    /// Engine with no external provider: hash embeddings only.
    pub fn with_hash_embeddings(config: DriftConfig) -> Result<Self, VigilError> {
        let provider = Arc::new(HashEmbedder::new(config.embedding_dimension));
        Self::new(config, provider)
    }

    pub fn config(&self) -> &DriftConfig {
        &self.config
    }

    fn entry(&self, agent_id: &str) -> Arc<Mutex<AgentEntry>> {
        let mut agents = self.agents.lock();
        agents
            .entry(agent_id.to_string())
            .or_insert_with(|| {
                tracing::info!(agent_id = %agent_id, "created drift profile");
                Arc::new(Mutex::new(AgentEntry {
                    fingerprint: Fingerprint::new(agent_id, self.config.window),
                    risk: RiskState::new(agent_id),
                    admitted: VecDeque::new(),
                }))
            })
            .clone()
    }

    fn existing(&self, agent_id: &str) -> Option<Arc<Mutex<AgentEntry>>> {
        self.agents.lock().get(agent_id).cloned()
    }

    /// Gate a request before policy evaluation.
    ///
    /// Suspended and quarantined agents are refused outright. A throttled
    /// agent is admitted at most `throttle_per_minute` times per minute and
    /// refused immediately past that, without policy or scoring work.
    pub fn admission(&self, agent_id: &str, now: DateTime<Utc>) -> Admission {
        let Some(entry) = self.existing(agent_id) else {
            return Admission::Clear;
        };
        let mut entry = entry.lock();
        if entry.risk.quarantined {
            return Admission::Quarantined {
                reason: entry
                    .risk
                    .reason
                    .clone()
                    .unwrap_or_else(|| "fingerprint quarantined".to_string()),
            };
        }
        match entry.risk.level {
            RiskLevel::Kill | RiskLevel::Pause => Admission::Suspended {
                level: entry.risk.level,
                reason: entry
                    .risk
                    .reason
                    .clone()
                    .unwrap_or_else(|| "risk threshold exceeded".to_string()),
            },
            RiskLevel::Throttle => {
                let window_start = now - chrono::Duration::seconds(60);
                while entry
                    .admitted
                    .front()
                    .is_some_and(|ts| *ts < window_start)
                {
                    entry.admitted.pop_front();
                }
                if entry.admitted.len() >= self.config.throttle_per_minute as usize {
                    Admission::Throttled
                } else {
                    entry.admitted.push_back(now);
                    Admission::Clear
                }
            }
            _ => Admission::Clear,
        }
    }

    /// Record an intent and its verdict, recompute the composite risk, and
    /// apply threshold enforcement.
    ///
    /// A killed or quarantined agent is left untouched: the call returns
    /// the frozen state without mutating the fingerprint.
    pub fn observe(&self, intent: &Intent, verdict: &Verdict) -> Observation {
        self.observe_inner(intent, verdict.is_deny(), false)
    }

    /// Replay an intent from the audit log during recovery.
    ///
    /// Uses the deterministic hash embedding, emits no alerts to the
    /// caller, and applies the same enforcement transitions the live run
    /// would have.
    pub fn replay(&self, agent_id: &str, replayed: ReplayedIntent) {
        let intent = Intent {
            id: replayed.intent_id,
            agent_id: agent_id.to_string(),
            timestamp: replayed.timestamp,
            description: replayed.description,
            capabilities: replayed.capabilities,
            tool: replayed.tool,
            args: serde_json::Value::Null,
            embedding: None,
        };
        let _ = self.observe_inner(&intent, replayed.denied, true);
    }

    fn observe_inner(&self, intent: &Intent, denied: bool, replaying: bool) -> Observation {
        let entry = self.entry(&intent.agent_id);
        let mut entry = entry.lock();

        if entry.risk.level == RiskLevel::Kill || entry.risk.quarantined {
            return Observation {
                intent_id: intent.id,
                score: entry.risk.score,
                level: entry.risk.level,
                previous_level: entry.risk.level,
                alert: None,
                snapshot: None,
                embedding_degraded: false,
            };
        }

        let (embedding, degraded) = self.resolve_embedding(intent, replaying);

        let learning = entry.fingerprint.total_intents < self.config.learning_intents as u64;
        let signals = compute_signals(
            &entry.fingerprint,
            &embedding,
            &intent.capabilities,
            intent.timestamp,
            &self.config,
        );
        let (score, contributions) = signals.composite(&self.config, learning);

        // Capability novelty is judged against the pre-update baseline.
        let novel_capabilities: Vec<String> = intent
            .capabilities
            .iter()
            .filter(|cap| !entry.fingerprint.capability_counts.contains_key(*cap))
            .cloned()
            .collect();

        let previous_level = entry.risk.level;
        let computed = level_for(score, &self.config.thresholds);
        // During learning, warnings still fire but enforcement does not.
        let effective = if learning {
            computed.min(RiskLevel::Warning)
        } else {
            computed
        };
        let new_level = previous_level.max(effective);

        entry.fingerprint.record(
            IntentRecord {
                intent_id: intent.id,
                timestamp: intent.timestamp,
                tool: intent.tool.clone(),
                description: intent.description.clone(),
                capabilities: intent.capabilities.clone(),
                embedding,
                denied,
            },
            self.config.interval_smoothing,
        );

        entry.risk.score = score;
        entry.risk.history.push(score);
        let overflow = entry
            .risk
            .history
            .len()
            .saturating_sub(self.config.risk_history_len);
        if overflow > 0 {
            entry.risk.history.drain(..overflow);
        }

        let mut alert = None;
        let mut snapshot = None;
        if new_level > previous_level {
            entry.risk.level = new_level;
            entry.risk.last_transition = Utc::now();
            entry.risk.reason = Some(format!(
                "risk {score:.2} crossed the {new_level} threshold"
            ));
            tracing::warn!(
                agent_id = %intent.agent_id,
                risk = score,
                level = %new_level,
                "drift enforcement transition"
            );
            if matches!(
                new_level,
                RiskLevel::Warning | RiskLevel::Pause | RiskLevel::Kill
            ) && !replaying
            {
                alert = Some(build_alert(
                    &intent.agent_id,
                    intent.id,
                    score,
                    new_level,
                    &contributions,
                    &novel_capabilities,
                ));
            }
            if new_level == RiskLevel::Kill {
                snapshot = Some(snapshot_of(
                    &entry,
                    "risk score crossed the kill threshold",
                    self.config.snapshot_intents,
                ));
            }
        }

        Observation {
            intent_id: intent.id,
            score,
            level: entry.risk.level,
            previous_level,
            alert,
            snapshot,
            embedding_degraded: degraded,
        }
    }

    /// Use the caller-supplied embedding, else the provider, else the hash
    /// fallback. Dimension mismatches count as provider failures.
    fn resolve_embedding(&self, intent: &Intent, replaying: bool) -> (Vec<f32>, bool) {
        if replaying {
            return (self.fallback.vector(&intent.description), false);
        }
        if let Some(e) = &intent.embedding {
            if e.len() == self.config.embedding_dimension {
                return (e.clone(), false);
            }
            tracing::warn!(
                agent_id = %intent.agent_id,
                got = e.len(),
                expected = self.config.embedding_dimension,
                "supplied embedding has wrong dimension, falling back"
            );
            return (self.fallback.vector(&intent.description), true);
        }
        match self.provider.embed(&intent.description, None) {
            Ok(e) if e.len() == self.config.embedding_dimension => (e, false),
            Ok(e) => {
                tracing::warn!(
                    provider = self.provider.provider_name(),
                    got = e.len(),
                    "provider returned wrong dimension, falling back"
                );
                (self.fallback.vector(&intent.description), true)
            }
            Err(e) => {
                tracing::warn!(
                    provider = self.provider.provider_name(),
                    error = %e,
                    "embedding provider failed, falling back"
                );
                (self.fallback.vector(&intent.description), true)
            }
        }
    }

    /// Read-only snapshot of an agent's risk state.
    pub fn status(&self, agent_id: &str) -> Option<RiskState> {
        let entry = self.existing(agent_id)?;
        let entry = entry.lock();
        let mut state = entry.risk.clone();
        state.resurrections = entry.fingerprint.resurrections;
        Some(state)
    }

    /// Clone of an agent's fingerprint, for simulation and persistence.
    pub fn fingerprint(&self, agent_id: &str) -> Option<Fingerprint> {
        let entry = self.existing(agent_id)?;
        let fingerprint = entry.lock().fingerprint.clone();
        Some(fingerprint)
    }

    /// Ids of every agent the engine has seen.
    pub fn agent_ids(&self) -> Vec<String> {
        self.agents.lock().keys().cloned().collect()
    }

    /// Capture a forensic snapshot of an agent on demand.
    pub fn forensic_snapshot(&self, agent_id: &str, reason: &str) -> Option<ForensicSnapshot> {
        let entry = self.existing(agent_id)?;
        let entry = entry.lock();
        Some(snapshot_of(&entry, reason, self.config.snapshot_intents))
    }

    /// How many intents the fingerprint remembers for today (UTC). Bounded
    /// by the ring window; used for daily-quota context.
    pub fn actions_today(&self, agent_id: &str, now: DateTime<Utc>) -> u32 {
        let Some(entry) = self.existing(agent_id) else {
            return 0;
        };
        let entry = entry.lock();
        entry
            .fingerprint
            .history()
            .iter()
            .filter(|r| r.timestamp.date_naive() == now.date_naive())
            .count() as u32
    }

    /// Bring a killed agent back: KILL to OK, counted against the cap.
    ///
    /// Resets the score below the warning threshold and clears violation
    /// flags (configurable), but preserves intent history and the
    /// capability map.
    pub fn resurrect(
        &self,
        agent_id: &str,
        admin_id: &str,
        reason: &str,
    ) -> Result<Resurrection, VigilError> {
        let entry = self
            .existing(agent_id)
            .ok_or_else(|| VigilError::UnknownAgent(agent_id.to_string()))?;
        let mut entry = entry.lock();

        if entry.risk.level != RiskLevel::Kill {
            return Err(VigilError::NotKilled {
                agent_id: agent_id.to_string(),
            });
        }
        if entry.fingerprint.resurrections >= self.config.max_resurrections {
            return Err(VigilError::ResurrectionLimit {
                agent_id: agent_id.to_string(),
                limit: self.config.max_resurrections,
            });
        }

        entry.fingerprint.resurrections += 1;
        entry.risk.resurrections = entry.fingerprint.resurrections;
        entry.risk.level = RiskLevel::Ok;
        entry.risk.quarantined = false;
        entry.risk.reason = None;
        entry.risk.last_transition = Utc::now();
        if self.config.reset_score_on_resurrect {
            entry.risk.score = (self.config.thresholds.warning - 0.01).max(0.0);
            let score = entry.risk.score;
            entry.risk.history.push(score);
            entry.fingerprint.clear_violations();
        }

        tracing::warn!(
            agent_id = %agent_id,
            admin_id = %admin_id,
            count = entry.fingerprint.resurrections,
            "agent resurrected"
        );

        Ok(Resurrection {
            agent_id: agent_id.to_string(),
            admin_id: admin_id.to_string(),
            reason: reason.to_string(),
            count: entry.fingerprint.resurrections,
            timestamp: Utc::now(),
        })
    }

    /// Admin resume: PAUSE (or quarantine) back to OK. Not counted against
    /// the resurrection cap.
    pub fn resume(&self, agent_id: &str, admin_id: &str) -> Result<(), VigilError> {
        let entry = self
            .existing(agent_id)
            .ok_or_else(|| VigilError::UnknownAgent(agent_id.to_string()))?;
        let mut entry = entry.lock();

        if entry.risk.level != RiskLevel::Pause && !entry.risk.quarantined {
            return Err(VigilError::NotPaused {
                agent_id: agent_id.to_string(),
            });
        }

        entry.risk.level = RiskLevel::Ok;
        entry.risk.quarantined = false;
        entry.risk.reason = None;
        entry.risk.last_transition = Utc::now();
        if self.config.reset_score_on_resurrect {
            entry.risk.score = (self.config.thresholds.warning - 0.01).max(0.0);
        }
        tracing::info!(agent_id = %agent_id, admin_id = %admin_id, "agent resumed");
        Ok(())
    }

    /// Quarantine an agent (equivalent to PAUSE) until admin action.
    pub fn quarantine(&self, agent_id: &str, reason: &str) {
        let entry = self.entry(agent_id);
        let mut entry = entry.lock();
        entry.risk.quarantined = true;
        entry.risk.reason = Some(reason.to_string());
        entry.risk.last_transition = Utc::now();
        tracing::error!(agent_id = %agent_id, reason = %reason, "agent quarantined");
    }

    /// Install a fingerprint loaded from a snapshot.
    ///
    /// A fingerprint that fails validation quarantines the agent and
    /// returns the validation error.
    pub fn restore(
        &self,
        agent_id: &str,
        fingerprint: Fingerprint,
        risk: Option<RiskState>,
    ) -> Result<(), VigilError> {
        if let Err(problem) = fingerprint.validate(self.config.embedding_dimension) {
            self.quarantine(agent_id, &format!("fingerprint corrupt: {problem}"));
            return Err(VigilError::Internal(format!(
                "fingerprint for {agent_id} failed validation: {problem}"
            )));
        }
        let entry = self.entry(agent_id);
        let mut entry = entry.lock();
        entry.risk = risk.unwrap_or_else(|| {
            let mut state = RiskState::new(agent_id);
            state.resurrections = fingerprint.resurrections;
            state
        });
        entry.fingerprint = fingerprint;
        Ok(())
    }
}

fn level_for(score: f64, thresholds: &RiskThresholds) -> RiskLevel {
    if score >= thresholds.kill {
        RiskLevel::Kill
    } else if score >= thresholds.pause {
        RiskLevel::Pause
    } else if score >= thresholds.throttle {
        RiskLevel::Throttle
    } else if score >= thresholds.warning {
        RiskLevel::Warning
    } else {
        RiskLevel::Ok
    }
}

fn snapshot_of(entry: &AgentEntry, reason: &str, last_k: usize) -> ForensicSnapshot {
    ForensicSnapshot {
        agent_id: entry.fingerprint.agent_id.clone(),
        captured_at: Utc::now(),
        reason: reason.to_string(),
        final_score: entry.risk.score,
        risk_history: entry.risk.history.clone(),
        recent_intents: entry
            .fingerprint
            .recent(last_k)
            .into_iter()
            .map(|r| IntentSummary {
                intent_id: r.intent_id,
                timestamp: r.timestamp,
                tool: r.tool.clone(),
                description: r.description.clone(),
                denied: r.denied,
            })
            .collect(),
        capability_counts: entry.fingerprint.capability_counts.clone(),
        resurrections: entry.fingerprint.resurrections,
    }
}
