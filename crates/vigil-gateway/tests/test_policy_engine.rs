//! Policy evaluation through the gateway: verdict composition, reload
//! semantics, and idempotence.

mod common;

use common::*;
use serde_json::json;
use vigil_types::{Decision, Reversibility};

#[test]
fn benign_intent_allowed_and_ledgered() {
    let core = core();
    let decision = core
        .verify_intent(&calendar_book("scheduler", "2026-02-10", "14:00"))
        .unwrap();
    assert_eq!(decision.decision, Decision::Allow);
    assert!(decision.ledger_entry.is_some());

    let entries = core.ledger().entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].payload["decision"], "ALLOW");
    assert_eq!(entries[0].payload["tool"], "Calendar.book");
}

#[test]
fn weekend_booking_denied_with_weekday_remediation() {
    let core = core();
    let decision = core
        .verify_intent(&calendar_book("scheduler", "2026-02-08", "14:00"))
        .unwrap();
    assert_eq!(decision.decision, Decision::Deny);
    assert_eq!(
        decision.verdict.headline_rule(),
        Some("sched_weekend_ban")
    );
    assert!(decision
        .verdict
        .headline_reason()
        .unwrap()
        .contains("weekend"));
    let remediation = decision.verdict.remediation.as_ref().unwrap();
    assert_eq!(remediation.reversibility, Reversibility::High);
    assert_eq!(remediation.auto_fix.as_ref().unwrap()["date"], "2026-02-09");
}

#[test]
fn salary_over_cap_denied_with_clamp_fix() {
    let core = core();
    let decision = core.verify_intent(&offer("negotiator", "L4", 200_000)).unwrap();
    assert_eq!(decision.decision, Decision::Deny);
    assert!(decision
        .verdict
        .rule_ids
        .contains(&"hr_compensation_bands".to_string()));
    let fix = decision
        .verdict
        .remediation
        .as_ref()
        .unwrap()
        .auto_fix
        .as_ref()
        .unwrap();
    assert_eq!(fix["salary"], 180_000);

    // The clamped offer passes.
    let decision = core.verify_intent(&offer("negotiator", "L4", 180_000)).unwrap();
    assert_eq!(decision.decision, Decision::Allow);
}

#[test]
fn pii_to_external_recipient_modifies_body() {
    let core = core();
    let decision = core
        .verify_intent(&email(
            "sourcer",
            "external@example.com",
            "Contact John at 555-123-4567",
        ))
        .unwrap();
    assert_eq!(decision.decision, Decision::Modify);
    let body = decision.patch.as_ref().unwrap()["body"].as_str().unwrap();
    assert!(body.contains("[REDACTED_PHONE]"));
    let digits: String = body.chars().filter(|c| c.is_ascii_digit()).collect();
    assert!(digits.len() < 10, "10-digit sequence survived: {body}");
}

#[test]
fn internal_recipient_left_untouched() {
    let core = core();
    let decision = core
        .verify_intent(&email(
            "sourcer",
            "peer@company.com",
            "Contact John at 555-123-4567",
        ))
        .unwrap();
    assert_eq!(decision.decision, Decision::Allow);
    assert!(decision.patch.is_none());
}

#[test]
fn bias_term_denied_even_with_pii_present() {
    let core = core();
    let decision = core
        .verify_intent(&email(
            "sourcer",
            "external@example.com",
            "We need a rockstar, call 555-123-4567",
        ))
        .unwrap();
    assert_eq!(decision.decision, Decision::Deny);
    assert_eq!(
        decision.verdict.headline_rule(),
        Some("comm_inclusive_language")
    );
}

#[test]
fn evaluation_is_idempotent_across_repeats() {
    let core = core();
    let intent = offer("negotiator", "L5", 400_000);
    let first = core.verify_intent(&intent).unwrap();
    let second = core.verify_intent(&intent).unwrap();
    assert_eq!(first.decision, second.decision);
    assert_eq!(first.verdict.rule_ids, second.verdict.rule_ids);
    assert_eq!(first.verdict.reasons, second.verdict.reasons);
}

#[test]
fn onboarding_requires_verified_authorization() {
    let core = core();
    let blocked = core
        .verify_intent(&vigil_types::Intent::new(
            "onboarder",
            "Onboard.employee",
            "Onboard the new hire",
            vec!["hris.create".to_string()],
            json!({ "employee": "E009", "i9_status": "pending" }),
        ))
        .unwrap();
    assert_eq!(blocked.decision, Decision::Deny);
    assert!(blocked
        .verdict
        .rule_ids
        .contains(&"id_right_to_work".to_string()));

    let cleared = core
        .verify_intent(&vigil_types::Intent::new(
            "onboarder",
            "Onboard.employee",
            "Onboard the new hire",
            vec!["hris.create".to_string()],
            json!({ "employee": "E009", "i9_status": "verified", "background_check": "cleared" }),
        ))
        .unwrap();
    assert_eq!(cleared.decision, Decision::Allow);
}

#[test]
fn expense_rules_compose() {
    let core = core();
    // Over the receipt floor without a receipt: denied.
    let no_receipt = core
        .verify_intent(&vigil_types::Intent::new(
            "spender",
            "Payroll.process_expense",
            "Team dinner expense",
            vec!["payroll.process_expense".to_string()],
            json!({ "amount": 180.0, "category": "meals", "has_receipt": false,
                    "submitter": "E001", "approver": "E002" }),
        ))
        .unwrap();
    assert_eq!(no_receipt.decision, Decision::Deny);
    assert!(no_receipt
        .verdict
        .rule_ids
        .contains(&"fin_receipt_required".to_string()));

    // With a receipt but self-approved: both denies reported, headline by id order.
    let self_approved = core
        .verify_intent(&vigil_types::Intent::new(
            "spender",
            "Payroll.process_expense",
            "Team dinner expense",
            vec!["payroll.process_expense".to_string()],
            json!({ "amount": 300.0, "category": "meals", "has_receipt": true,
                    "submitter": "E001", "approver": "E001" }),
        ))
        .unwrap();
    assert_eq!(self_approved.decision, Decision::Deny);
    assert!(self_approved
        .verdict
        .rule_ids
        .contains(&"fin_category_subcap".to_string()));
    assert!(self_approved
        .verdict
        .rule_ids
        .contains(&"fin_self_approval_ban".to_string()));
    assert_eq!(
        self_approved.verdict.headline_rule(),
        Some("fin_category_subcap")
    );
}

#[test]
fn warn_surfaces_but_proceeds() {
    let core = core();
    let decision = core
        .verify_intent(&email("sourcer", "clean@example.com", "See you at the meetup"))
        .unwrap();
    assert_eq!(decision.decision, Decision::Warn);
    assert!(decision
        .verdict
        .rule_ids
        .contains(&"comm_external_recipient".to_string()));
    assert!(decision.decision.permits_execution());
}

#[test]
fn reload_swaps_rules_for_new_requests() {
    let core = core();
    let before = core
        .verify_intent(&offer("negotiator", "L4", 999_999))
        .unwrap();
    assert_eq!(before.decision, Decision::Deny);

    let narrow = r#"{
        "version": "weekends-only",
        "rules": [
            {
                "id": "sched_weekend_ban",
                "domain": "temporal",
                "kind": "weekend_ban",
                "params": { "tools": ["Calendar.book"] }
            }
        ]
    }"#;
    core.reload_policy(narrow).unwrap();

    let after = core
        .verify_intent(&offer("negotiator", "L4", 999_999))
        .unwrap();
    assert_eq!(after.decision, Decision::Allow);
}

#[test]
fn bad_reload_keeps_previous_rules() {
    let core = core();
    let err = core.reload_policy(r#"{"version": "x", "rules": [{"id": "a", "domain": "d", "kind": "no_such_kind", "params": {}}]}"#);
    assert!(err.is_err());

    let decision = core
        .verify_intent(&offer("negotiator", "L4", 999_999))
        .unwrap();
    assert_eq!(decision.decision, Decision::Deny, "previous rules must stay active");
}
