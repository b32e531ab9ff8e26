//! Composite risk scoring.
//!
//! Five signals, each in [0, 1], combined as a weighted sum. The signals
//! are computed against the fingerprint *before* the new intent is
//! recorded, so the score measures deviation from established behavior.

use chrono::{DateTime, Timelike, Utc};

use vigil_types::{DriftConfig, SignalContribution};

use crate::embedding::cosine;
use crate::fingerprint::Fingerprint;

/// Raw signal values before weighting.
#[derive(Debug, Clone, Copy)]
pub struct SignalBreakdown {
    /// `1 - cosine(e, centroid)`, clamped. 0 with no centroid yet.
    pub embedding: f64,
    /// Mean capability surprisal, squashed to [0, 1].
    pub surprisal: f64,
    /// Policy denies among the last 10 intents, over 10.
    pub violation: f64,
    /// Deviation of the latest inter-arrival time from its EMA.
    pub velocity: f64,
    /// Inverted hour-of-day bucket mass; off-hours score high.
    pub temporal: f64,
}

/// Compute the five raw signals for a new intent.
pub fn compute_signals(
    fingerprint: &Fingerprint,
    embedding: &[f32],
    capabilities: &[String],
    timestamp: DateTime<Utc>,
    config: &DriftConfig,
) -> SignalBreakdown {
    SignalBreakdown {
        embedding: embedding_drift(fingerprint, embedding),
        surprisal: capability_surprisal(fingerprint, capabilities, config),
        violation: fingerprint.recent_denials(10) as f64 / 10.0,
        velocity: velocity_anomaly(fingerprint, timestamp),
        temporal: temporal_deviation(fingerprint, timestamp),
    }
}

fn embedding_drift(fingerprint: &Fingerprint, embedding: &[f32]) -> f64 {
    match &fingerprint.centroid {
        Some(centroid) => clamp01(1.0 - cosine(embedding, centroid)),
        None => 0.0,
    }
}

/// Mean of `-ln p(c)` over the declared capabilities, with Laplace
/// smoothing for unseen ones, squashed by `x / (x + knee)`.
fn capability_surprisal(
    fingerprint: &Fingerprint,
    capabilities: &[String],
    config: &DriftConfig,
) -> f64 {
    if capabilities.is_empty() || fingerprint.total_capabilities == 0 {
        return 0.0;
    }
    let alpha = config.surprisal_alpha;
    let total = fingerprint.total_capabilities as f64;
    let sum: f64 = capabilities
        .iter()
        .map(|cap| {
            let count = fingerprint.capability_counts.get(cap).copied().unwrap_or(0) as f64;
            let p = (count + alpha) / (total + alpha);
            -p.ln()
        })
        .sum();
    let mean = sum / capabilities.len() as f64;
    clamp01(mean / (mean + config.surprisal_knee))
}

fn velocity_anomaly(fingerprint: &Fingerprint, timestamp: DateTime<Utc>) -> f64 {
    let (Some(last), Some(ema)) = (fingerprint.last_timestamp, fingerprint.interval_ema) else {
        return 0.0;
    };
    if ema <= f64::EPSILON {
        return 0.0;
    }
    let interval = (timestamp - last).num_milliseconds().max(0) as f64 / 1000.0;
    clamp01((interval - ema).abs() / ema)
}

fn temporal_deviation(fingerprint: &Fingerprint, timestamp: DateTime<Utc>) -> f64 {
    let max = fingerprint.hour_histogram.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return 0.0;
    }
    let mass = fingerprint.hour_histogram[timestamp.hour() as usize] as f64;
    clamp01(1.0 - mass / max as f64)
}

impl SignalBreakdown {
    /// Weight the signals into a composite score plus the contribution
    /// list, strongest contribution first.
    ///
    /// During the learning phase (when `suppress_embedding` is set) the
    /// embedding term contributes nothing and its weight is redistributed
    /// proportionally across the other four signals.
    pub fn composite(
        &self,
        config: &DriftConfig,
        learning: bool,
    ) -> (f64, Vec<SignalContribution>) {
        let w = &config.weights;
        let suppress = learning && config.suppress_embedding_during_learning;

        let (we, scale) = if suppress && w.embedding < 1.0 {
            (0.0, 1.0 / (1.0 - w.embedding))
        } else {
            (w.embedding, 1.0)
        };

        let mut contributions = vec![
            SignalContribution {
                signal: "embedding_drift".to_string(),
                raw: self.embedding,
                contribution: we * self.embedding,
            },
            SignalContribution {
                signal: "capability_surprisal".to_string(),
                raw: self.surprisal,
                contribution: w.surprisal * scale * self.surprisal,
            },
            SignalContribution {
                signal: "violation_rate".to_string(),
                raw: self.violation,
                contribution: w.violation * scale * self.violation,
            },
            SignalContribution {
                signal: "velocity_anomaly".to_string(),
                raw: self.velocity,
                contribution: w.velocity * scale * self.velocity,
            },
            SignalContribution {
                signal: "temporal_context".to_string(),
                raw: self.temporal,
                contribution: w.temporal * scale * self.temporal,
            },
        ];

        let score = clamp01(contributions.iter().map(|c| c.contribution).sum());
        contributions.sort_by(|a, b| {
            b.contribution
                .partial_cmp(&a.contribution)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        (score, contributions)
    }
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}
