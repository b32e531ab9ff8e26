//! Drift alert construction.
//!
//! Alerts are generated on any transition into WARNING, PAUSE, or KILL and
//! carry the top contributing signals, a one-line explanation, and a
//! suggested admin action.

use chrono::Utc;
use uuid::Uuid;

use vigil_types::{AlertSeverity, DriftAlert, RiskLevel, SignalContribution};

/// Build an alert for a transition into `level`.
///
/// `novel_capabilities` are the declared capabilities absent from the
/// fingerprint baseline at evaluation time; they sharpen the explanation
/// when capability surprisal dominates.
pub fn build_alert(
    agent_id: &str,
    intent_id: Uuid,
    score: f64,
    level: RiskLevel,
    contributions: &[SignalContribution],
    novel_capabilities: &[String],
) -> DriftAlert {
    let severity = match level {
        RiskLevel::Kill => AlertSeverity::Critical,
        RiskLevel::Pause => AlertSeverity::Warning,
        _ => AlertSeverity::Info,
    };

    let dominant: Vec<SignalContribution> = contributions.iter().take(2).cloned().collect();
    let explanation = explain(dominant.first(), novel_capabilities, score);
    let suggested_action = suggest(level, &dominant);

    DriftAlert {
        alert_id: Uuid::new_v4(),
        timestamp: Utc::now(),
        agent_id: agent_id.to_string(),
        severity,
        risk_score: score,
        dominant_signals: dominant,
        explanation,
        suggested_action,
        intent_id,
    }
}

fn explain(
    dominant: Option<&SignalContribution>,
    novel_capabilities: &[String],
    score: f64,
) -> String {
    let Some(top) = dominant else {
        return format!("risk score elevated to {score:.2}");
    };
    match top.signal.as_str() {
        "capability_surprisal" => match novel_capabilities.first() {
            Some(cap) => {
                format!("capability surprisal spiked: new capability `{cap}` not in baseline")
            }
            None => format!("capability surprisal spiked to {:.2}", top.raw),
        },
        "embedding_drift" => format!(
            "intent semantics drifted {:.2} from the behavioral centroid",
            top.raw
        ),
        "violation_rate" => format!(
            "policy violations accumulating: {:.0}% of recent intents denied",
            top.raw * 100.0
        ),
        "velocity_anomaly" => "action rate deviates sharply from the baseline cadence".to_string(),
        "temporal_context" => "acting at an unusual hour for this agent".to_string(),
        other => format!("{other} elevated to {:.2}", top.raw),
    }
}

fn suggest(level: RiskLevel, dominant: &[SignalContribution]) -> String {
    match level {
        RiskLevel::Kill => {
            "IMMEDIATE: agent killed. Review the forensic snapshot and recent actions.".to_string()
        }
        RiskLevel::Pause => "Agent paused. Review recent behavior before resuming.".to_string(),
        RiskLevel::Throttle => "Agent throttled. Verify the workload is legitimate.".to_string(),
        _ => match dominant.first().map(|c| c.signal.as_str()) {
            Some("velocity_anomaly") => {
                "Review the action rate; consider rate-limiting this agent.".to_string()
            }
            Some("temporal_context") => {
                "Unusual timing detected; verify the operation is authorized.".to_string()
            }
            _ => "Monitor this agent; drift patterns are emerging.".to_string(),
        },
    }
}
