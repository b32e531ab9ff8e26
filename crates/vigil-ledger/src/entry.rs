//! AuditEntry: one hash-chained, signed ledger record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::canonical::canonical_bytes;

/// What kind of event an entry records.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    IntentVerified,
    PlanSimulated,
    DriftAlert,
    Enforcement,
    ForensicSnapshot,
    Resurrection,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::IntentVerified => write!(f, "INTENT_VERIFIED"),
            EventKind::PlanSimulated => write!(f, "PLAN_SIMULATED"),
            EventKind::DriftAlert => write!(f, "DRIFT_ALERT"),
            EventKind::Enforcement => write!(f, "ENFORCEMENT"),
            EventKind::ForensicSnapshot => write!(f, "FORENSIC_SNAPSHOT"),
            EventKind::Resurrection => write!(f, "RESURRECTION"),
        }
    }
}

/// A single entry in the append-only audit ledger.
///
/// `hash` covers the canonical bytes of the entry envelope concatenated
/// with `previous_hash`; `signature` covers `hash || previous_hash`.
/// Entries are never modified or deleted after append.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    /// Monotonic id, 1-based.
    pub entry_id: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: EventKind,
    pub agent_id: String,
    /// Event-specific structured data.
    pub payload: Value,
    pub previous_hash: String,
    pub hash: String,
    pub signature: String,
    /// Entries signed with the demo HMAC key are tagged so auditors know
    /// they are not offline-verifiable.
    pub demo_signed: bool,
}

impl AuditEntry {
    /// The hashed portion of the entry, canonically encoded.
    fn envelope(&self) -> Value {
        json!({
            "entry_id": self.entry_id,
            "timestamp": self.timestamp.to_rfc3339(),
            "kind": self.kind,
            "agent_id": self.agent_id,
            "payload": self.payload,
        })
    }

    /// Recompute this entry's hash from its fields.
    ///
    /// Compare the result against `self.hash` to detect tampering.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(canonical_bytes(&self.envelope()));
        hasher.update(self.previous_hash.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// The byte string the signature covers: `hash || previous_hash`.
    pub fn signing_message(&self) -> Vec<u8> {
        let mut message = Vec::with_capacity(self.hash.len() + self.previous_hash.len());
        message.extend_from_slice(self.hash.as_bytes());
        message.extend_from_slice(self.previous_hash.as_bytes());
        message
    }
}

/// The `previous_hash` of the very first entry: the hash of a fixed
/// genesis document, identical across ledger instances.
pub fn genesis_hash() -> String {
    let genesis = json!({ "type": "GENESIS", "version": "vigil-ledger-1" });
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(&genesis));
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> AuditEntry {
        let mut entry = AuditEntry {
            entry_id: 1,
            timestamp: Utc::now(),
            kind: EventKind::IntentVerified,
            agent_id: "scheduler".to_string(),
            payload: json!({"tool": "Calendar.book", "decision": "ALLOW"}),
            previous_hash: genesis_hash(),
            hash: String::new(),
            signature: String::new(),
            demo_signed: true,
        };
        entry.hash = entry.compute_hash();
        entry
    }

    #[test]
    fn hash_is_deterministic() {
        let entry = sample_entry();
        assert_eq!(entry.hash, entry.compute_hash());
        assert_eq!(entry.compute_hash(), entry.compute_hash());
    }

    #[test]
    fn hash_changes_with_payload() {
        let mut entry = sample_entry();
        entry.payload = json!({"tool": "Calendar.book", "decision": "DENY"});
        assert_ne!(entry.hash, entry.compute_hash());
    }

    #[test]
    fn hash_changes_with_previous_hash() {
        let mut entry = sample_entry();
        entry.previous_hash = "0".repeat(64);
        assert_ne!(entry.hash, entry.compute_hash());
    }

    #[test]
    fn hash_survives_serde_roundtrip() {
        let entry = sample_entry();
        let bytes = serde_json::to_vec(&entry).unwrap();
        let back: AuditEntry = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back.compute_hash(), back.hash);
    }

    #[test]
    fn genesis_hash_is_stable() {
        assert_eq!(genesis_hash(), genesis_hash());
        assert_eq!(genesis_hash().len(), 64);
    }

    #[test]
    fn event_kind_display_matches_serde() {
        for kind in [
            EventKind::IntentVerified,
            EventKind::PlanSimulated,
            EventKind::DriftAlert,
            EventKind::Enforcement,
            EventKind::ForensicSnapshot,
            EventKind::Resurrection,
        ] {
            let serde_form = serde_json::to_string(&kind).unwrap();
            assert_eq!(serde_form, format!("\"{kind}\""));
        }
    }
}
