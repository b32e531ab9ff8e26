//! The per-agent behavioral fingerprint.
//!
//! A fingerprint holds the last W intents in a fixed-size ring buffer plus
//! aggregate statistics: a running centroid of intent embeddings, a
//! capability frequency map, an hour-of-day histogram, and an exponential
//! moving average of inter-arrival times. Created on the agent's first
//! intent and never destroyed; a killed agent keeps its fingerprint frozen
//! at time of death.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::embedding::l2_normalize;

/// One remembered intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentRecord {
    pub intent_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub tool: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub embedding: Vec<f32>,
    /// Whether policy denied the intent.
    pub denied: bool,
}

/// The statistical profile of an agent's normal behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    pub agent_id: String,
    window: usize,
    /// Fixed-capacity ring of the last `window` records.
    ring: Vec<IntentRecord>,
    /// Next overwrite position once the ring is full.
    cursor: usize,
    /// L2-normalized mean of the embeddings currently in the ring.
    pub centroid: Option<Vec<f32>>,
    /// How often each capability has been declared, over the agent's lifetime.
    pub capability_counts: BTreeMap<String, u64>,
    /// Total capability declarations, denominator for the frequency map.
    pub total_capabilities: u64,
    /// Action counts per hour of day (UTC).
    pub hour_histogram: [u64; 24],
    /// EMA of inter-arrival seconds.
    pub interval_ema: Option<f64>,
    pub last_timestamp: Option<DateTime<Utc>>,
    /// Highest privilege level observed, 0 read / 0.5 write / 1 admin.
    pub max_privilege: f64,
    /// Lifetime intent count (the ring only keeps the last `window`).
    pub total_intents: u64,
    pub resurrections: u32,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Fingerprint {
    pub fn new(agent_id: impl Into<String>, window: usize) -> Self {
        let now = Utc::now();
        Self {
            agent_id: agent_id.into(),
            window: window.max(1),
            ring: Vec::new(),
            cursor: 0,
            centroid: None,
            capability_counts: BTreeMap::new(),
            total_capabilities: 0,
            hour_histogram: [0; 24],
            interval_ema: None,
            last_timestamp: None,
            max_privilege: 0.0,
            total_intents: 0,
            resurrections: 0,
            created_at: now,
            last_updated: now,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Record a new intent, updating every aggregate.
    ///
    /// `lambda` is the EMA smoothing factor for inter-arrival times.
    pub fn record(&mut self, record: IntentRecord, lambda: f64) {
        if let Some(last) = self.last_timestamp {
            let interval = (record.timestamp - last).num_milliseconds().max(0) as f64 / 1000.0;
            self.interval_ema = Some(match self.interval_ema {
                Some(ema) => (1.0 - lambda) * ema + lambda * interval,
                None => interval,
            });
        }
        self.last_timestamp = Some(record.timestamp);
        self.hour_histogram[record.timestamp.hour() as usize] += 1;

        for cap in &record.capabilities {
            *self.capability_counts.entry(cap.clone()).or_insert(0) += 1;
            self.total_capabilities += 1;
        }
        self.max_privilege = self.max_privilege.max(privilege_of(&record.capabilities));

        if self.ring.len() < self.window {
            self.ring.push(record);
        } else {
            self.ring[self.cursor] = record;
            self.cursor = (self.cursor + 1) % self.window;
        }
        self.total_intents += 1;
        self.last_updated = Utc::now();
        self.recompute_centroid();
    }

    /// Mean of the ring's embeddings, normalized. O(W); W is small.
    fn recompute_centroid(&mut self) {
        let Some(first) = self.ring.first() else {
            self.centroid = None;
            return;
        };
        let dim = first.embedding.len();
        let mut mean = vec![0.0f32; dim];
        let mut counted = 0usize;
        for record in &self.ring {
            if record.embedding.len() != dim {
                continue;
            }
            for (m, x) in mean.iter_mut().zip(record.embedding.iter()) {
                *m += x;
            }
            counted += 1;
        }
        if counted == 0 {
            self.centroid = None;
            return;
        }
        for m in mean.iter_mut() {
            *m /= counted as f32;
        }
        l2_normalize(&mut mean);
        self.centroid = Some(mean);
    }

    /// The remembered intents, oldest first.
    pub fn history(&self) -> Vec<&IntentRecord> {
        if self.ring.len() < self.window {
            self.ring.iter().collect()
        } else {
            self.ring[self.cursor..]
                .iter()
                .chain(self.ring[..self.cursor].iter())
                .collect()
        }
    }

    /// The most recent `n` intents, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&IntentRecord> {
        let history = self.history();
        let start = history.len().saturating_sub(n);
        history[start..].to_vec()
    }

    /// How many of the last `n` intents were denied.
    pub fn recent_denials(&self, n: usize) -> usize {
        self.recent(n).iter().filter(|r| r.denied).count()
    }

    /// Clear violation flags. Used on resurrection: history and capability
    /// counts survive, the violation signal starts over.
    pub fn clear_violations(&mut self) {
        for record in self.ring.iter_mut() {
            record.denied = false;
        }
    }

    /// Structural validation for fingerprints loaded from snapshots.
    pub fn validate(&self, expected_dim: usize) -> Result<(), String> {
        if self.window == 0 {
            return Err("window is zero".to_string());
        }
        if self.ring.len() > self.window {
            return Err(format!(
                "ring holds {} records but window is {}",
                self.ring.len(),
                self.window
            ));
        }
        if self.cursor >= self.window && !self.ring.is_empty() {
            return Err(format!("cursor {} outside window {}", self.cursor, self.window));
        }
        for record in &self.ring {
            if record.embedding.len() != expected_dim {
                return Err(format!(
                    "record {} embedding has dimension {}, expected {expected_dim}",
                    record.intent_id,
                    record.embedding.len()
                ));
            }
        }
        if let Some(centroid) = &self.centroid {
            if centroid.len() != expected_dim {
                return Err(format!(
                    "centroid has dimension {}, expected {expected_dim}",
                    centroid.len()
                ));
            }
        }
        Ok(())
    }
}

/// Estimate the privilege level implied by a capability set.
///
/// 0 for read-only, 0.5 for write-ish, 1 for admin-ish, taking the mean
/// over the declared capabilities.
pub fn privilege_of(capabilities: &[String]) -> f64 {
    const ADMIN: &[&str] = &["admin", "delete", "export", "execute", "create", "modify"];
    const WRITE: &[&str] = &["write", "update", "send", "book", "schedule", "edit"];

    if capabilities.is_empty() {
        return 0.0;
    }
    let total: f64 = capabilities
        .iter()
        .map(|cap| {
            let lower = cap.to_lowercase();
            if ADMIN.iter().any(|kw| lower.contains(kw)) {
                1.0
            } else if WRITE.iter().any(|kw| lower.contains(kw)) {
                0.5
            } else {
                0.0
            }
        })
        .sum();
    total / capabilities.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(hour: u32, minute: u32, caps: &[&str], denied: bool) -> IntentRecord {
        IntentRecord {
            intent_id: Uuid::new_v4(),
            timestamp: Utc.with_ymd_and_hms(2026, 2, 10, hour, minute, 0).unwrap(),
            tool: "Email.send".to_string(),
            description: "send an email".to_string(),
            capabilities: caps.iter().map(|c| c.to_string()).collect(),
            embedding: vec![1.0, 0.0],
            denied,
        }
    }

    #[test]
    fn ring_keeps_exactly_min_n_w_entries() {
        let mut fp = Fingerprint::new("agent", 5);
        for i in 0..12 {
            fp.record(record(10, i, &["email.send"], false), 0.2);
        }
        assert_eq!(fp.total_intents, 12);
        assert_eq!(fp.history().len(), 5);
    }

    #[test]
    fn history_is_chronological_after_wraparound() {
        let mut fp = Fingerprint::new("agent", 3);
        for i in 0..5 {
            fp.record(record(10, i, &["email.send"], false), 0.2);
        }
        let minutes: Vec<u32> = fp
            .history()
            .iter()
            .map(|r| r.timestamp.minute())
            .collect();
        assert_eq!(minutes, vec![2, 3, 4]);
    }

    #[test]
    fn capability_counts_accumulate_beyond_window() {
        let mut fp = Fingerprint::new("agent", 2);
        for i in 0..4 {
            fp.record(record(10, i, &["email.send", "hris.read"], false), 0.2);
        }
        assert_eq!(fp.capability_counts["email.send"], 4);
        assert_eq!(fp.total_capabilities, 8);
    }

    #[test]
    fn interval_ema_tracks_cadence() {
        let mut fp = Fingerprint::new("agent", 10);
        fp.record(record(10, 0, &[], false), 0.2);
        fp.record(record(10, 1, &[], false), 0.2);
        // First interval initializes the EMA directly.
        assert_eq!(fp.interval_ema, Some(60.0));
        fp.record(record(10, 2, &[], false), 0.2);
        assert_eq!(fp.interval_ema, Some(60.0));
    }

    #[test]
    fn recent_denials_counts_flags() {
        let mut fp = Fingerprint::new("agent", 10);
        for i in 0..6 {
            fp.record(record(10, i, &[], i % 2 == 0), 0.2);
        }
        assert_eq!(fp.recent_denials(10), 3);
        fp.clear_violations();
        assert_eq!(fp.recent_denials(10), 0);
    }

    #[test]
    fn centroid_is_normalized_mean() {
        let mut fp = Fingerprint::new("agent", 10);
        let mut a = record(10, 0, &[], false);
        a.embedding = vec![1.0, 0.0];
        let mut b = record(10, 1, &[], false);
        b.embedding = vec![0.0, 1.0];
        fp.record(a, 0.2);
        fp.record(b, 0.2);
        let centroid = fp.centroid.clone().unwrap();
        let expected = 1.0 / 2.0f32.sqrt();
        assert!((centroid[0] - expected).abs() < 1e-5);
        assert!((centroid[1] - expected).abs() < 1e-5);
    }

    #[test]
    fn hour_histogram_fills() {
        let mut fp = Fingerprint::new("agent", 10);
        fp.record(record(9, 0, &[], false), 0.2);
        fp.record(record(9, 30, &[], false), 0.2);
        fp.record(record(15, 0, &[], false), 0.2);
        assert_eq!(fp.hour_histogram[9], 2);
        assert_eq!(fp.hour_histogram[15], 1);
        assert_eq!(fp.hour_histogram[3], 0);
    }

    #[test]
    fn privilege_estimation() {
        assert_eq!(privilege_of(&[]), 0.0);
        assert_eq!(privilege_of(&["hris.read".into()]), 0.0);
        assert_eq!(privilege_of(&["email.send".into()]), 0.5);
        assert_eq!(privilege_of(&["hris.delete_all".into()]), 1.0);
        let mixed = privilege_of(&["hris.read".into(), "hris.export".into()]);
        assert!((mixed - 0.5).abs() < 1e-9);
    }

    #[test]
    fn validate_rejects_mismatched_dimensions() {
        let mut fp = Fingerprint::new("agent", 5);
        fp.record(record(10, 0, &[], false), 0.2);
        assert!(fp.validate(2).is_ok());
        assert!(fp.validate(128).is_err());
    }

    #[test]
    fn serde_roundtrip_preserves_ring_order() {
        let mut fp = Fingerprint::new("agent", 3);
        for i in 0..5 {
            fp.record(record(10, i, &["email.send"], false), 0.2);
        }
        let json = serde_json::to_string(&fp).unwrap();
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        let minutes: Vec<u32> = back.history().iter().map(|r| r.timestamp.minute()).collect();
        assert_eq!(minutes, vec![2, 3, 4]);
        assert_eq!(back.total_intents, 5);
    }
}
