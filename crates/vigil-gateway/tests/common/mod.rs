//! Shared helpers for integration tests.
//!
//! Each integration test file compiles common/ as its own module, so not
//! every helper is used in every file.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use vigil_drift::DriftEngine;
use vigil_gateway::SupervisorCore;
use vigil_ledger::{HmacSigner, Ledger, MemoryStore};
use vigil_policy::PolicyEngine;
use vigil_sim::StubRegistry;
use vigil_types::{CoreConfig, Intent, Plan, RiskThresholds};

/// Deterministic HMAC key shared by test ledgers.
pub const TEST_KEY: &[u8] = b"vigil-test-key";

/// In-memory core with builtin rules and stubs.
pub fn core() -> SupervisorCore {
    core_with(CoreConfig::default())
}

/// In-memory core with the given configuration.
pub fn core_with(config: CoreConfig) -> SupervisorCore {
    let policy = Arc::new(PolicyEngine::with_builtin().expect("builtin rules should load"));
    let drift = Arc::new(
        DriftEngine::with_hash_embeddings(config.drift.clone()).expect("drift config valid"),
    );
    let ledger = Arc::new(
        Ledger::new(
            Box::new(MemoryStore::new()),
            Box::new(HmacSigner::new(TEST_KEY.to_vec())),
        )
        .expect("ledger should open"),
    );
    SupervisorCore::new(config, policy, drift, ledger, StubRegistry::with_builtin())
}

/// Drift config that skips the learning phase so enforcement fires in
/// short scenarios.
pub fn no_learning() -> CoreConfig {
    let mut config = CoreConfig::default();
    config.drift.learning_intents = 0;
    config
}

/// Tight thresholds that let a handful of hostile intents reach KILL.
pub fn strict_config() -> CoreConfig {
    let mut config = no_learning();
    config.drift.thresholds = RiskThresholds {
        warning: 0.05,
        throttle: 0.10,
        pause: 0.15,
        kill: 0.20,
    };
    config
}

/// A fixed weekday-afternoon timestamp (Tuesday 2026-02-10 10:00 UTC).
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 10, 10, 0, 0).unwrap()
}

/// Intent for booking a calendar slot.
pub fn calendar_book(agent: &str, date: &str, time: &str) -> Intent {
    Intent::new(
        agent,
        "Calendar.book",
        format!("Book a meeting on {date} at {time}"),
        vec!["calendar.book".to_string()],
        json!({ "date": date, "time": time }),
    )
}

/// Intent for generating an offer.
pub fn offer(agent: &str, role: &str, salary: u64) -> Intent {
    Intent::new(
        agent,
        "Offer.generate",
        format!("Generate a {role} offer at {salary}"),
        vec!["offer.generate".to_string()],
        json!({ "role": role, "salary": salary }),
    )
}

/// Intent for sending an email.
pub fn email(agent: &str, to: &str, body: &str) -> Intent {
    Intent::new(
        agent,
        "Email.send",
        format!("Send an email to {to}"),
        vec!["email.send".to_string()],
        json!({ "to": to, "body": body }),
    )
}

/// A routine intent that matches no policy rule.
pub fn routine(agent: &str, text: &str, caps: &[&str], timestamp: DateTime<Utc>) -> Intent {
    Intent::at(
        agent,
        "Ops.run",
        text,
        caps.iter().map(|c| c.to_string()).collect(),
        json!({}),
        timestamp,
    )
}

/// Single-step plan.
pub fn plan1(agent: &str, tool: &str, args: Value) -> Plan {
    Plan::new(agent, vec![(tool, args)])
}
