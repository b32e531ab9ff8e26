//! Configuration for the supervision core.
//!
//! [`CoreConfig`] is the top-level configuration loaded from `vigil.toml`,
//! controlling drift scoring, enforcement thresholds, ledger and snapshot
//! paths.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::VigilError;

/// Weights of the five composite risk signals. Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SignalWeights {
    #[serde(default = "default_w_embedding")]
    pub embedding: f64,
    #[serde(default = "default_w_surprisal")]
    pub surprisal: f64,
    #[serde(default = "default_w_violation")]
    pub violation: f64,
    #[serde(default = "default_w_velocity")]
    pub velocity: f64,
    #[serde(default = "default_w_temporal")]
    pub temporal: f64,
}

fn default_w_embedding() -> f64 {
    0.30
}
fn default_w_surprisal() -> f64 {
    0.25
}
fn default_w_violation() -> f64 {
    0.20
}
fn default_w_velocity() -> f64 {
    0.15
}
fn default_w_temporal() -> f64 {
    0.10
}

impl Default for SignalWeights {
    fn default() -> Self {
        Self {
            embedding: default_w_embedding(),
            surprisal: default_w_surprisal(),
            violation: default_w_violation(),
            velocity: default_w_velocity(),
            temporal: default_w_temporal(),
        }
    }
}

impl SignalWeights {
    pub fn sum(&self) -> f64 {
        self.embedding + self.surprisal + self.violation + self.velocity + self.temporal
    }
}

/// Score thresholds separating the enforcement bands.
///
/// Bands: `[0, warning)` OK, `[warning, throttle)` WARNING,
/// `[throttle, pause)` THROTTLE, `[pause, kill)` PAUSE, `[kill, 1]` KILL.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RiskThresholds {
    #[serde(default = "default_warning")]
    pub warning: f64,
    #[serde(default = "default_throttle")]
    pub throttle: f64,
    #[serde(default = "default_pause")]
    pub pause: f64,
    #[serde(default = "default_kill")]
    pub kill: f64,
}

fn default_warning() -> f64 {
    0.30
}
fn default_throttle() -> f64 {
    0.50
}
fn default_pause() -> f64 {
    0.70
}
fn default_kill() -> f64 {
    0.85
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            warning: default_warning(),
            throttle: default_throttle(),
            pause: default_pause(),
            kill: default_kill(),
        }
    }
}

/// Drift engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriftConfig {
    /// Ring buffer size W: how many intents the fingerprint remembers.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Learning phase length L: intents before PAUSE/KILL may fire.
    #[serde(default = "default_learning_intents")]
    pub learning_intents: usize,
    #[serde(default)]
    pub weights: SignalWeights,
    #[serde(default)]
    pub thresholds: RiskThresholds,
    /// Allowed actions per minute while an agent is THROTTLEd.
    #[serde(default = "default_throttle_per_minute")]
    pub throttle_per_minute: u32,
    /// How many times a killed agent may be resurrected.
    #[serde(default = "default_max_resurrections")]
    pub max_resurrections: u32,
    /// EMA smoothing factor for inter-arrival times.
    #[serde(default = "default_interval_smoothing")]
    pub interval_smoothing: f64,
    /// Laplace smoothing constant for capability surprisal.
    #[serde(default = "default_surprisal_alpha")]
    pub surprisal_alpha: f64,
    /// Knee of the surprisal squash `x / (x + knee)`.
    #[serde(default = "default_surprisal_knee")]
    pub surprisal_knee: f64,
    /// During learning, zero the embedding term and redistribute its weight
    /// proportionally across the other four signals.
    #[serde(default = "default_true")]
    pub suppress_embedding_during_learning: bool,
    /// On resurrection, reset the score to `warning - 0.01` and clear the
    /// violation flags; history and the capability map are preserved.
    #[serde(default = "default_true")]
    pub reset_score_on_resurrect: bool,
    /// Dimension of the fallback hash embedding.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,
    /// How many scores the per-agent risk history retains.
    #[serde(default = "default_risk_history_len")]
    pub risk_history_len: usize,
    /// How many recent intents a forensic snapshot captures (K).
    #[serde(default = "default_snapshot_intents")]
    pub snapshot_intents: usize,
}

fn default_window() -> usize {
    20
}
fn default_learning_intents() -> usize {
    20
}
fn default_throttle_per_minute() -> u32 {
    6
}
fn default_max_resurrections() -> u32 {
    3
}
fn default_interval_smoothing() -> f64 {
    0.2
}
fn default_surprisal_alpha() -> f64 {
    0.01
}
fn default_surprisal_knee() -> f64 {
    3.0
}
fn default_true() -> bool {
    true
}
fn default_embedding_dimension() -> usize {
    128
}
fn default_risk_history_len() -> usize {
    50
}
fn default_snapshot_intents() -> usize {
    50
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            learning_intents: default_learning_intents(),
            weights: SignalWeights::default(),
            thresholds: RiskThresholds::default(),
            throttle_per_minute: default_throttle_per_minute(),
            max_resurrections: default_max_resurrections(),
            interval_smoothing: default_interval_smoothing(),
            surprisal_alpha: default_surprisal_alpha(),
            surprisal_knee: default_surprisal_knee(),
            suppress_embedding_during_learning: default_true(),
            reset_score_on_resurrect: default_true(),
            embedding_dimension: default_embedding_dimension(),
            risk_history_len: default_risk_history_len(),
            snapshot_intents: default_snapshot_intents(),
        }
    }
}

impl DriftConfig {
    /// Validate weight and threshold consistency.
    pub fn validate(&self) -> Result<(), VigilError> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(VigilError::Config(format!(
                "signal weights must sum to 1.0, got {sum}"
            )));
        }
        let t = &self.thresholds;
        if !(0.0 < t.warning && t.warning < t.throttle && t.throttle < t.pause && t.pause < t.kill)
        {
            return Err(VigilError::Config(
                "risk thresholds must be strictly increasing in (0, 1]".to_string(),
            ));
        }
        if self.window == 0 {
            return Err(VigilError::Config("window must be at least 1".to_string()));
        }
        if !(0.0 < self.interval_smoothing && self.interval_smoothing <= 1.0) {
            return Err(VigilError::Config(
                "interval_smoothing must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration for a supervision core instance.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoreConfig {
    /// Path to the append-only audit log file. `None` keeps the ledger in
    /// memory (tests, demos).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_path: Option<PathBuf>,
    /// Directory for periodic fingerprint snapshots. `None` disables them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,
    /// Continue serving requests when the ledger store fails. Off by
    /// default: a request that cannot be audited fails.
    #[serde(default)]
    pub allow_unaudited: bool,
    #[serde(default)]
    pub drift: DriftConfig,
}

impl CoreConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, VigilError> {
        let config: Self =
            toml::from_str(content).map_err(|e| VigilError::Config(e.to_string()))?;
        config.drift.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String, VigilError> {
        toml::to_string_pretty(self).map_err(|e| VigilError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one() {
        let config = DriftConfig::default();
        assert!((config.weights.sum() - 1.0).abs() < 1e-12);
        config.validate().expect("default config should validate");
    }

    #[test]
    fn bad_weights_rejected() {
        let mut config = DriftConfig::default();
        config.weights.embedding = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_monotonic_thresholds_rejected() {
        let mut config = DriftConfig::default();
        config.thresholds.pause = 0.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_toml_roundtrip() {
        let config = CoreConfig {
            ledger_path: Some(PathBuf::from("/var/lib/vigil/audit.log")),
            snapshot_dir: Some(PathBuf::from("/var/lib/vigil/snapshots")),
            allow_unaudited: false,
            drift: DriftConfig::default(),
        };
        let toml_str = config.to_toml().unwrap();
        let parsed = CoreConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed.ledger_path, config.ledger_path);
        assert_eq!(parsed.drift, config.drift);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let parsed = CoreConfig::from_toml("").unwrap();
        assert!(parsed.ledger_path.is_none());
        assert_eq!(parsed.drift.window, 20);
        assert_eq!(parsed.drift.thresholds.kill, 0.85);
    }
}
