//! State persistence and recovery.
//!
//! The audit log is authoritative: on restart the core replays
//! INTENT_VERIFIED, RESURRECTION, and resume ENFORCEMENT entries through
//! the drift engine to rebuild fingerprints and risk state. Periodic
//! fingerprint snapshots (one JSON file per agent) only shorten the
//! replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

use vigil_drift::{Fingerprint, ReplayedIntent};
use vigil_ledger::EventKind;
use vigil_types::{RiskState, VigilError};

use crate::SupervisorCore;

/// On-disk snapshot of one agent's state.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    fingerprint: Fingerprint,
    risk: RiskState,
}

impl SupervisorCore {
    /// Write a fingerprint snapshot per agent into `snapshot_dir`.
    ///
    /// Returns the number of snapshots written; a no-op when no snapshot
    /// directory is configured.
    pub fn save_snapshots(&self) -> Result<usize, VigilError> {
        let Some(dir) = &self.config().snapshot_dir else {
            return Ok(0);
        };
        std::fs::create_dir_all(dir)
            .map_err(|e| VigilError::Storage(format!("create {}: {e}", dir.display())))?;

        let mut written = 0usize;
        for agent_id in self.drift().agent_ids() {
            let (Some(fingerprint), Some(risk)) = (
                self.drift().fingerprint(&agent_id),
                self.drift().status(&agent_id),
            ) else {
                continue;
            };
            let snapshot = SnapshotFile { fingerprint, risk };
            let path = dir.join(snapshot_filename(&agent_id));
            let bytes = serde_json::to_vec_pretty(&snapshot)
                .map_err(|e| VigilError::Internal(format!("snapshot serialization: {e}")))?;
            std::fs::write(&path, bytes)
                .map_err(|e| VigilError::Storage(format!("write {}: {e}", path.display())))?;
            written += 1;
        }
        tracing::info!(written, "fingerprint snapshots saved");
        Ok(written)
    }

    /// Load fingerprint snapshots, returning per-agent intent counts the
    /// replay can skip. Corrupt snapshots quarantine the agent.
    fn load_snapshots(&self) -> Result<HashMap<String, u64>, VigilError> {
        let mut covered = HashMap::new();
        let Some(dir) = &self.config().snapshot_dir else {
            return Ok(covered);
        };
        if !dir.is_dir() {
            return Ok(covered);
        }
        let entries = std::fs::read_dir(dir)
            .map_err(|e| VigilError::Storage(format!("read {}: {e}", dir.display())))?;
        for entry in entries {
            let entry =
                entry.map_err(|e| VigilError::Storage(format!("read snapshot dir: {e}")))?;
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let bytes = std::fs::read(&path)
                .map_err(|e| VigilError::Storage(format!("read {}: {e}", path.display())))?;
            let snapshot: SnapshotFile = match serde_json::from_slice(&bytes) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "unreadable snapshot");
                    continue;
                }
            };
            let agent_id = snapshot.fingerprint.agent_id.clone();
            let total = snapshot.fingerprint.total_intents;
            match self
                .drift()
                .restore(&agent_id, snapshot.fingerprint, Some(snapshot.risk))
            {
                Ok(()) => {
                    covered.insert(agent_id, total);
                }
                Err(e) => {
                    // restore() has already quarantined the agent.
                    tracing::error!(agent_id = %agent_id, error = %e, "snapshot rejected");
                }
            }
        }
        Ok(covered)
    }

    /// Rebuild authoritative state from the audit log.
    ///
    /// Entries already covered by a loaded fingerprint snapshot are
    /// skipped; everything after is replayed in ledger order.
    pub fn recover(&self) -> Result<(), VigilError> {
        let covered = self.load_snapshots()?;
        let mut replayed_per_agent: HashMap<String, u64> = HashMap::new();
        let mut replayed = 0u64;

        for entry in self.ledger().entries()? {
            match entry.kind {
                EventKind::IntentVerified => {
                    if entry.payload["gated"] == true {
                        continue;
                    }
                    let seen = replayed_per_agent
                        .entry(entry.agent_id.clone())
                        .or_insert(0);
                    *seen += 1;
                    if *seen <= covered.get(&entry.agent_id).copied().unwrap_or(0) {
                        continue;
                    }
                    match parse_replayed_intent(&entry.payload, entry.timestamp) {
                        Some(intent) => {
                            self.drift().replay(&entry.agent_id, intent);
                            replayed += 1;
                        }
                        None => {
                            tracing::warn!(
                                entry_id = entry.entry_id,
                                "intent entry missing replay fields"
                            );
                        }
                    }
                }
                EventKind::Resurrection => {
                    let admin = entry.payload["admin_id"].as_str().unwrap_or("replay");
                    let reason = entry.payload["reason"].as_str().unwrap_or("replay");
                    if let Err(e) = self.drift().resurrect(&entry.agent_id, admin, reason) {
                        tracing::debug!(
                            agent_id = %entry.agent_id,
                            error = %e,
                            "resurrection replay skipped"
                        );
                    }
                }
                EventKind::Enforcement => {
                    if entry.payload["action"] == "resume" {
                        let admin = entry.payload["admin_id"].as_str().unwrap_or("replay");
                        if let Err(e) = self.drift().resume(&entry.agent_id, admin) {
                            tracing::debug!(
                                agent_id = %entry.agent_id,
                                error = %e,
                                "resume replay skipped"
                            );
                        }
                    }
                }
                _ => {}
            }
        }

        if replayed > 0 {
            tracing::info!(replayed, "audit log replay complete");
        }
        Ok(())
    }
}

fn parse_replayed_intent(payload: &Value, fallback_ts: DateTime<Utc>) -> Option<ReplayedIntent> {
    let intent_id = payload["intent_id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())?;
    let timestamp = payload["intent_timestamp"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(fallback_ts);
    let tool = payload["tool"].as_str()?.to_string();
    let description = payload["description"].as_str().unwrap_or("").to_string();
    let capabilities = payload["capabilities"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    let denied = payload["decision"] == "DENY";
    Some(ReplayedIntent {
        intent_id,
        timestamp,
        tool,
        description,
        capabilities,
        denied,
    })
}

/// Stable, filesystem-safe snapshot filename for an agent id.
fn snapshot_filename(agent_id: &str) -> String {
    let sanitized: String = agent_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let mut hasher = Sha256::new();
    hasher.update(agent_id.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{sanitized}-{}.json", &digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_filenames_are_safe_and_distinct() {
        let a = snapshot_filename("hr/negotiator");
        let b = snapshot_filename("hr?negotiator");
        assert!(a.ends_with(".json"));
        assert!(!a.contains('/'));
        assert_ne!(a, b, "different agents must not collide");
        assert_eq!(snapshot_filename("scheduler"), snapshot_filename("scheduler"));
    }

    #[test]
    fn parse_replayed_intent_reads_payload() {
        let id = Uuid::new_v4();
        let payload = serde_json::json!({
            "intent_id": id,
            "intent_timestamp": "2026-02-10T14:00:00+00:00",
            "tool": "Calendar.book",
            "description": "book a slot",
            "capabilities": ["calendar.book"],
            "decision": "DENY",
        });
        let replayed = parse_replayed_intent(&payload, Utc::now()).unwrap();
        assert_eq!(replayed.intent_id, id);
        assert_eq!(replayed.tool, "Calendar.book");
        assert_eq!(replayed.capabilities, vec!["calendar.book".to_string()]);
        assert!(replayed.denied);
    }

    #[test]
    fn parse_replayed_intent_requires_tool() {
        let payload = serde_json::json!({ "intent_id": Uuid::new_v4() });
        assert!(parse_replayed_intent(&payload, Utc::now()).is_none());
    }
}
