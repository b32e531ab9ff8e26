//! Built-in rule document for the Vigil policy engine.
//!
//! This is the default rule set loaded when no external document is
//! supplied. Deployments override it through `PolicyEngine::reload`.

/// Default declarative rule document covering the seven policy domains.
pub const DEFAULT_RULES: &str = r#"{
  "version": "2026.1",
  "rules": [
    {
      "id": "sched_weekend_ban",
      "domain": "temporal",
      "kind": "weekend_ban",
      "params": { "tools": ["Calendar.book", "Interview.schedule"] }
    },
    {
      "id": "sched_business_hours",
      "domain": "temporal",
      "kind": "business_hours",
      "params": {
        "tools": ["Calendar.book", "Interview.schedule"],
        "open_hour": 9,
        "close_hour": 17
      }
    },
    {
      "id": "sched_daily_quota",
      "domain": "temporal",
      "kind": "daily_quota",
      "params": {
        "tools": ["Calendar.book", "Interview.schedule"],
        "max_per_day": 50
      }
    },
    {
      "id": "hr_compensation_bands",
      "domain": "compensation",
      "kind": "compensation_bands",
      "params": {
        "tool": "Offer.generate",
        "bands": {
          "L3": { "min": 100000, "max": 140000 },
          "L4": { "min": 130000, "max": 180000 },
          "L5": { "min": 170000, "max": 240000 }
        }
      }
    },
    {
      "id": "hr_equity_cap",
      "domain": "compensation",
      "kind": "equity_cap",
      "params": {
        "tool": "Offer.generate",
        "caps": { "L3": 0.05, "L4": 0.1, "L5": 0.25 }
      }
    },
    {
      "id": "hr_level_known",
      "domain": "compensation",
      "kind": "level_known",
      "params": { "tool": "Offer.generate", "known": ["L3", "L4", "L5"] }
    },
    {
      "id": "comm_inclusive_language",
      "domain": "communication",
      "kind": "inclusive_language",
      "params": {
        "tools": ["Email.send", "Offer.send"],
        "denylist": ["rockstar", "ninja", "guru", "crush code", "guys", "salesman", "manpower"]
      }
    },
    {
      "id": "comm_offer_pii_redaction",
      "domain": "communication",
      "kind": "pii_redaction",
      "params": { "tools": ["Offer.send"], "internal_domain": "company.com" }
    },
    {
      "id": "comm_pii_redaction",
      "domain": "communication",
      "kind": "pii_redaction",
      "params": { "tools": ["Email.send"], "internal_domain": "company.com" }
    },
    {
      "id": "comm_external_recipient",
      "domain": "communication",
      "kind": "external_recipient",
      "params": { "tools": ["Email.send"], "internal_domain": "company.com" }
    },
    {
      "id": "fin_receipt_required",
      "domain": "expense",
      "kind": "receipt_required",
      "params": { "tool": "Payroll.process_expense", "floor": 50.0 }
    },
    {
      "id": "fin_amount_threshold",
      "domain": "expense",
      "kind": "amount_threshold",
      "params": { "tool": "Payroll.process_expense", "max": 10000.0 }
    },
    {
      "id": "fin_self_approval_ban",
      "domain": "expense",
      "kind": "self_approval_ban",
      "params": { "tool": "Payroll.process_expense" }
    },
    {
      "id": "fin_category_subcap",
      "domain": "expense",
      "kind": "category_subcap",
      "params": {
        "tool": "Payroll.process_expense",
        "caps": { "meals": 200.0, "travel": 2500.0, "alcohol": 50.0 }
      }
    },
    {
      "id": "id_contractor_right_to_work",
      "domain": "identity",
      "kind": "right_to_work",
      "params": { "tool": "Onboard.contractor" }
    },
    {
      "id": "id_right_to_work",
      "domain": "identity",
      "kind": "right_to_work",
      "params": { "tool": "Onboard.employee" }
    },
    {
      "id": "id_background_check",
      "domain": "identity",
      "kind": "background_check",
      "params": { "tool": "Onboard.employee" }
    },
    {
      "id": "priv_minimum_necessary",
      "domain": "privacy",
      "kind": "minimum_necessary",
      "params": { "tools": ["Performance.get_reviews", "HRIS.get_employee"] }
    },
    {
      "id": "priv_bulk_export",
      "domain": "privacy",
      "kind": "bulk_export",
      "params": { "tools": ["HRIS.export"] }
    },
    {
      "id": "priv_retention_limit",
      "domain": "privacy",
      "kind": "retention_limit",
      "params": { "tool": "HRIS.archive", "max_days": 365 }
    },
    {
      "id": "priv_cross_border",
      "domain": "privacy",
      "kind": "cross_border",
      "params": { "tools": ["HRIS.transfer"], "home_region": "us" }
    },
    {
      "id": "ops_change_window",
      "domain": "operational",
      "kind": "change_window",
      "params": { "tools": ["Deploy.apply"], "open_hour": 6, "close_hour": 20 }
    },
    {
      "id": "ops_db_change_window",
      "domain": "operational",
      "kind": "change_window",
      "params": { "tools": ["Database.migrate"], "open_hour": 1, "close_hour": 5 }
    },
    {
      "id": "ops_sla_threshold",
      "domain": "operational",
      "kind": "sla_threshold",
      "params": { "tool": "Ticket.respond", "max_hours": 24.0 }
    }
  ]
}"#;
