//! The sealed rule taxonomy.
//!
//! Every rule is a pure predicate over `(intent, context)` returning a
//! [`RuleOutcome`]. A rule that cannot decide returns `NotApplicable`; a
//! rule that fails internally returns an error, which the engine converts
//! to a deny without stopping the other rules.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use vigil_types::{Intent, Remediation, Reversibility, VigilError};

use crate::pii;

/// Per-request evaluation context supplied by the caller.
///
/// Carries the dynamic state rules cannot derive from the intent itself.
/// Static policy parameters live in the rule document, not here.
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    /// How many actions this agent has already performed today.
    pub actions_today: u32,
}

/// Outcome of evaluating one rule against one intent.
#[derive(Debug, Clone)]
pub enum RuleOutcome {
    /// The rule does not apply to this intent.
    NotApplicable,
    /// The rule applies and permits the action.
    Allow,
    /// The action proceeds, with a warning surfaced.
    Warn { reason: String },
    /// The action proceeds with the given argument patch applied.
    Modify { patch: Value, reason: String },
    /// The action is blocked.
    Deny {
        reason: String,
        remediation: Option<Remediation>,
    },
}

/// Salary band for one compensation level, in whole currency units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SalaryBand {
    pub min: u64,
    pub max: u64,
}

/// The sealed set of rule kinds, each carrying its declarative parameters.
///
/// Loaded from a JSON rule document; unknown kinds fail the load and leave
/// the previous rule set active.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum RuleKind {
    /// Deny scheduling tools on Saturdays and Sundays.
    WeekendBan { tools: Vec<String> },
    /// Deny scheduling tools outside `[open_hour, close_hour)`.
    BusinessHours {
        tools: Vec<String>,
        open_hour: u32,
        close_hour: u32,
    },
    /// Deny once the agent has performed `max_per_day` actions today.
    DailyQuota { tools: Vec<String>, max_per_day: u32 },
    /// Deny offers whose salary falls outside the level's band.
    CompensationBands {
        tool: String,
        bands: BTreeMap<String, SalaryBand>,
    },
    /// Deny offers whose equity exceeds the level's cap.
    EquityCap {
        tool: String,
        caps: BTreeMap<String, f64>,
    },
    /// Deny offers for levels missing from the band table.
    LevelKnown { tool: String, known: Vec<String> },
    /// Deny outbound text containing denylisted terms.
    InclusiveLanguage {
        tools: Vec<String>,
        denylist: Vec<String>,
    },
    /// Redact structured PII from bodies sent to external recipients.
    PiiRedaction {
        tools: Vec<String>,
        internal_domain: String,
    },
    /// Flag (warn) sends to recipients outside the internal domain.
    ExternalRecipient {
        tools: Vec<String>,
        internal_domain: String,
    },
    /// Deny expenses above `floor` without a receipt.
    ReceiptRequired { tool: String, floor: f64 },
    /// Deny amounts above the hard approval ceiling.
    AmountThreshold { tool: String, max: f64 },
    /// Deny requests where the submitter approves their own expense.
    SelfApprovalBan { tool: String },
    /// Deny category spend above its sub-cap.
    CategorySubcap {
        tool: String,
        caps: BTreeMap<String, f64>,
    },
    /// Deny onboarding without verified work authorization.
    RightToWork { tool: String },
    /// Deny onboarding when a background check is present but not cleared.
    BackgroundCheck { tool: String },
    /// Deny reading another person's records without consent.
    MinimumNecessary { tools: Vec<String> },
    /// Deny bulk data exports outright; admin approval path only.
    BulkExport { tools: Vec<String> },
    /// Deny retention requests beyond the regulatory limit.
    RetentionLimit { tool: String, max_days: u64 },
    /// Warn on transfers that leave the home region.
    CrossBorder {
        tools: Vec<String>,
        home_region: String,
    },
    /// Deny infrastructure changes outside the change window, unless a
    /// change ticket is attached.
    ChangeWindow {
        tools: Vec<String>,
        open_hour: u32,
        close_hour: u32,
    },
    /// Warn when the projected resolution time breaches the SLA.
    SlaThreshold { tool: String, max_hours: f64 },
}

/// A loaded rule: a stable id, its domain, and its parameterized kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    pub domain: String,
    #[serde(flatten)]
    pub kind: RuleKind,
}

impl RuleKind {
    /// Short kind name for introspection.
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::WeekendBan { .. } => "weekend_ban",
            RuleKind::BusinessHours { .. } => "business_hours",
            RuleKind::DailyQuota { .. } => "daily_quota",
            RuleKind::CompensationBands { .. } => "compensation_bands",
            RuleKind::EquityCap { .. } => "equity_cap",
            RuleKind::LevelKnown { .. } => "level_known",
            RuleKind::InclusiveLanguage { .. } => "inclusive_language",
            RuleKind::PiiRedaction { .. } => "pii_redaction",
            RuleKind::ExternalRecipient { .. } => "external_recipient",
            RuleKind::ReceiptRequired { .. } => "receipt_required",
            RuleKind::AmountThreshold { .. } => "amount_threshold",
            RuleKind::SelfApprovalBan { .. } => "self_approval_ban",
            RuleKind::CategorySubcap { .. } => "category_subcap",
            RuleKind::RightToWork { .. } => "right_to_work",
            RuleKind::BackgroundCheck { .. } => "background_check",
            RuleKind::MinimumNecessary { .. } => "minimum_necessary",
            RuleKind::BulkExport { .. } => "bulk_export",
            RuleKind::RetentionLimit { .. } => "retention_limit",
            RuleKind::CrossBorder { .. } => "cross_border",
            RuleKind::ChangeWindow { .. } => "change_window",
            RuleKind::SlaThreshold { .. } => "sla_threshold",
        }
    }

    /// Evaluate this rule against an intent.
    ///
    /// Pure: no side effects, no hidden state. Errors are converted to
    /// denies by the engine, tagged with the rule id.
    pub fn evaluate(
        &self,
        intent: &Intent,
        ctx: &PolicyContext,
    ) -> Result<RuleOutcome, VigilError> {
        match self {
            RuleKind::WeekendBan { tools } => {
                if !tools.contains(&intent.tool) {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let Some(date_str) = str_arg(&intent.args, "date") else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                let date = match NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
                    Ok(d) => d,
                    Err(_) => {
                        return Ok(RuleOutcome::Deny {
                            reason: format!("date '{date_str}' is not in YYYY-MM-DD form"),
                            remediation: None,
                        })
                    }
                };
                if date.weekday().number_from_monday() >= 6 {
                    let next = next_weekday(date);
                    return Ok(RuleOutcome::Deny {
                        reason: format!(
                            "no scheduling on weekends ({date_str} is a {})",
                            date.weekday()
                        ),
                        remediation: Some(
                            Remediation::new(
                                format!("reschedule to the next weekday ({next})"),
                                Reversibility::High,
                            )
                            .with_fix(json!({ "date": next.to_string() })),
                        ),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::BusinessHours {
                tools,
                open_hour,
                close_hour,
            } => {
                if !tools.contains(&intent.tool) {
                    return Ok(RuleOutcome::NotApplicable);
                }
                check_window(*open_hour, *close_hour)?;
                let Some(time_str) = str_arg(&intent.args, "time") else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                let time = match NaiveTime::parse_from_str(time_str, "%H:%M") {
                    Ok(t) => t,
                    Err(_) => {
                        return Ok(RuleOutcome::Deny {
                            reason: format!("time '{time_str}' is not in HH:MM form"),
                            remediation: None,
                        })
                    }
                };
                let hour = time.hour();
                if hour < *open_hour || hour >= *close_hour {
                    return Ok(RuleOutcome::Deny {
                        reason: format!(
                            "outside business hours ({open_hour}:00-{close_hour}:00)"
                        ),
                        remediation: Some(
                            Remediation::new(
                                format!(
                                    "reschedule between {open_hour}:00 and {close_hour}:00"
                                ),
                                Reversibility::High,
                            )
                            .with_fix(json!({ "time": format!("{:02}:00", open_hour + 1) })),
                        ),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::DailyQuota { tools, max_per_day } => {
                if !tools.contains(&intent.tool) {
                    return Ok(RuleOutcome::NotApplicable);
                }
                if ctx.actions_today >= *max_per_day {
                    return Ok(RuleOutcome::Deny {
                        reason: format!(
                            "daily action quota reached ({}/{max_per_day})",
                            ctx.actions_today
                        ),
                        remediation: Some(Remediation::new(
                            "wait until tomorrow or request a quota increase",
                            Reversibility::Medium,
                        )),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::CompensationBands { tool, bands } => {
                if intent.tool != *tool {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let (Some(role), Some(salary)) = (
                    str_arg(&intent.args, "role"),
                    f64_arg(&intent.args, "salary"),
                ) else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                let Some(band) = bands.get(role) else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                if salary > band.max as f64 {
                    return Ok(RuleOutcome::Deny {
                        reason: format!(
                            "salary {salary} exceeds the {} cap for {role}",
                            band.max
                        ),
                        remediation: Some(
                            Remediation::new(
                                format!("clamp salary to the {role} band maximum ({})", band.max),
                                Reversibility::High,
                            )
                            .with_fix(json!({ "salary": band.max })),
                        ),
                    });
                }
                if salary < band.min as f64 {
                    return Ok(RuleOutcome::Deny {
                        reason: format!(
                            "salary {salary} is below the {} floor for {role}",
                            band.min
                        ),
                        remediation: Some(
                            Remediation::new(
                                format!("raise salary to the {role} band floor ({})", band.min),
                                Reversibility::High,
                            )
                            .with_fix(json!({ "salary": band.min })),
                        ),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::EquityCap { tool, caps } => {
                if intent.tool != *tool {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let (Some(role), Some(equity)) = (
                    str_arg(&intent.args, "role"),
                    f64_arg(&intent.args, "equity"),
                ) else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                let Some(cap) = caps.get(role) else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                if equity > *cap {
                    return Ok(RuleOutcome::Deny {
                        reason: format!("equity {equity} exceeds the {cap} cap for {role}"),
                        remediation: Some(
                            Remediation::new(
                                format!("reduce equity to the {role} cap ({cap})"),
                                Reversibility::High,
                            )
                            .with_fix(json!({ "equity": cap })),
                        ),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::LevelKnown { tool, known } => {
                if intent.tool != *tool {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let Some(role) = str_arg(&intent.args, "role") else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                if !known.iter().any(|k| k == role) {
                    return Ok(RuleOutcome::Deny {
                        reason: format!("unknown compensation level '{role}'"),
                        remediation: Some(Remediation::new(
                            format!("use one of the known levels: {}", known.join(", ")),
                            Reversibility::High,
                        )),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::InclusiveLanguage { tools, denylist } => {
                if !tools.contains(&intent.tool) {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let Some(body) = str_arg(&intent.args, "body") else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                let lower = body.to_lowercase();
                if let Some(term) = denylist.iter().find(|t| lower.contains(t.as_str())) {
                    return Ok(RuleOutcome::Deny {
                        reason: format!("non-inclusive language: '{term}'"),
                        remediation: Some(Remediation::new(
                            format!("rephrase the message without '{term}'"),
                            Reversibility::High,
                        )),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::PiiRedaction {
                tools,
                internal_domain,
            } => {
                if !tools.contains(&intent.tool) {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let Some(recipient) = recipient_arg(&intent.args) else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                if recipient.ends_with(&format!("@{internal_domain}")) {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let Some(body) = str_arg(&intent.args, "body") else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                let (redacted, count) = pii::redact(body, Some(recipient));
                if count == 0 {
                    return Ok(RuleOutcome::NotApplicable);
                }
                Ok(RuleOutcome::Modify {
                    patch: json!({ "body": redacted }),
                    reason: format!("redacted {count} PII value(s) for external recipient"),
                })
            }

            RuleKind::ExternalRecipient {
                tools,
                internal_domain,
            } => {
                if !tools.contains(&intent.tool) {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let Some(recipient) = recipient_arg(&intent.args) else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                if recipient.ends_with(&format!("@{internal_domain}")) {
                    return Ok(RuleOutcome::NotApplicable);
                }
                Ok(RuleOutcome::Warn {
                    reason: format!("recipient {recipient} is outside {internal_domain}"),
                })
            }

            RuleKind::ReceiptRequired { tool, floor } => {
                if intent.tool != *tool {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let Some(amount) = f64_arg(&intent.args, "amount") else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                let has_receipt = bool_arg(&intent.args, "has_receipt").unwrap_or(false);
                if amount > *floor && !has_receipt {
                    return Ok(RuleOutcome::Deny {
                        reason: format!("expenses over {floor} require a receipt"),
                        remediation: Some(Remediation::new(
                            "attach a receipt and resubmit",
                            Reversibility::High,
                        )),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::AmountThreshold { tool, max } => {
                if intent.tool != *tool {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let Some(amount) = f64_arg(&intent.args, "amount") else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                if amount > *max {
                    return Ok(RuleOutcome::Deny {
                        reason: format!("amount {amount} exceeds the {max} approval ceiling"),
                        remediation: Some(Remediation::new(
                            "request finance approval for amounts above the ceiling",
                            Reversibility::Medium,
                        )),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::SelfApprovalBan { tool } => {
                if intent.tool != *tool {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let (Some(submitter), Some(approver)) = (
                    str_arg(&intent.args, "submitter"),
                    str_arg(&intent.args, "approver"),
                ) else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                if submitter == approver {
                    return Ok(RuleOutcome::Deny {
                        reason: "self-approval is not permitted".to_string(),
                        remediation: Some(Remediation::new(
                            "route the expense to a different approver",
                            Reversibility::Medium,
                        )),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::CategorySubcap { tool, caps } => {
                if intent.tool != *tool {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let (Some(category), Some(amount)) = (
                    str_arg(&intent.args, "category"),
                    f64_arg(&intent.args, "amount"),
                ) else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                let Some(cap) = caps.get(category) else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                if amount > *cap {
                    return Ok(RuleOutcome::Deny {
                        reason: format!("{category} spend {amount} exceeds the {cap} sub-cap"),
                        remediation: Some(Remediation::new(
                            format!("split or reduce the {category} expense to {cap}"),
                            Reversibility::Medium,
                        )),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::RightToWork { tool } => {
                if intent.tool != *tool {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let status = str_arg(&intent.args, "i9_status").unwrap_or("missing");
                if status != "verified" {
                    return Ok(RuleOutcome::Deny {
                        reason: "cannot onboard without verified work authorization".to_string(),
                        remediation: Some(Remediation::new(
                            "complete I-9 verification before onboarding",
                            Reversibility::High,
                        )),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::BackgroundCheck { tool } => {
                if intent.tool != *tool {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let Some(status) = str_arg(&intent.args, "background_check") else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                if status != "cleared" {
                    return Ok(RuleOutcome::Deny {
                        reason: format!("background check is '{status}', not cleared"),
                        remediation: Some(Remediation::new(
                            "wait for the background check to clear",
                            Reversibility::High,
                        )),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::MinimumNecessary { tools } => {
                if !tools.contains(&intent.tool) {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let (Some(subject), Some(requester)) = (
                    str_arg(&intent.args, "employee_id"),
                    str_arg(&intent.args, "requester"),
                ) else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                if subject != requester {
                    return Ok(RuleOutcome::Deny {
                        reason: "accessing another person's records requires consent".to_string(),
                        remediation: Some(Remediation::new(
                            "access only your own records or obtain the subject's consent",
                            Reversibility::Medium,
                        )),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::BulkExport { tools } => {
                if !tools.contains(&intent.tool) {
                    return Ok(RuleOutcome::NotApplicable);
                }
                Ok(RuleOutcome::Deny {
                    reason: "bulk data export requires admin approval".to_string(),
                    remediation: Some(Remediation::new(
                        "request admin approval or use a filtered query instead",
                        Reversibility::Medium,
                    )),
                })
            }

            RuleKind::RetentionLimit { tool, max_days } => {
                if intent.tool != *tool {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let Some(days) = u64_arg(&intent.args, "retention_days") else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                if days > *max_days {
                    return Ok(RuleOutcome::Deny {
                        reason: format!(
                            "retention of {days} days exceeds the {max_days}-day limit"
                        ),
                        remediation: Some(
                            Remediation::new(
                                format!("reduce retention to {max_days} days"),
                                Reversibility::High,
                            )
                            .with_fix(json!({ "retention_days": max_days })),
                        ),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::CrossBorder { tools, home_region } => {
                if !tools.contains(&intent.tool) {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let Some(region) = str_arg(&intent.args, "destination_region") else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                if region != home_region {
                    return Ok(RuleOutcome::Warn {
                        reason: format!(
                            "cross-border transfer to {region} (home region {home_region})"
                        ),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::ChangeWindow {
                tools,
                open_hour,
                close_hour,
            } => {
                if !tools.contains(&intent.tool) {
                    return Ok(RuleOutcome::NotApplicable);
                }
                check_window(*open_hour, *close_hour)?;
                if str_arg(&intent.args, "change_ticket").is_some() {
                    return Ok(RuleOutcome::Allow);
                }
                let hour = intent.timestamp.hour();
                if hour < *open_hour || hour >= *close_hour {
                    return Ok(RuleOutcome::Deny {
                        reason: format!(
                            "changes only within the {open_hour}:00-{close_hour}:00 window"
                        ),
                        remediation: Some(Remediation::new(
                            "wait for the change window or attach an approved change ticket",
                            Reversibility::High,
                        )),
                    });
                }
                Ok(RuleOutcome::Allow)
            }

            RuleKind::SlaThreshold { tool, max_hours } => {
                if intent.tool != *tool {
                    return Ok(RuleOutcome::NotApplicable);
                }
                let Some(projected) = f64_arg(&intent.args, "projected_hours") else {
                    return Ok(RuleOutcome::NotApplicable);
                };
                if projected > *max_hours {
                    return Ok(RuleOutcome::Warn {
                        reason: format!(
                            "projected resolution {projected}h exceeds the {max_hours}h SLA"
                        ),
                    });
                }
                Ok(RuleOutcome::Allow)
            }
        }
    }
}

/// Reject hour windows that cannot be evaluated.
fn check_window(open_hour: u32, close_hour: u32) -> Result<(), VigilError> {
    if open_hour >= 24 || close_hour > 24 || open_hour >= close_hour {
        return Err(VigilError::Internal(format!(
            "unusable hour window {open_hour}..{close_hour}"
        )));
    }
    Ok(())
}

/// The first weekday strictly after `date`.
fn next_weekday(date: NaiveDate) -> NaiveDate {
    let mut next = date + chrono::Duration::days(1);
    while next.weekday().number_from_monday() >= 6 {
        next += chrono::Duration::days(1);
    }
    next
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn f64_arg(args: &Value, key: &str) -> Option<f64> {
    args.get(key).and_then(Value::as_f64)
}

fn u64_arg(args: &Value, key: &str) -> Option<u64> {
    args.get(key).and_then(Value::as_u64)
}

fn bool_arg(args: &Value, key: &str) -> Option<bool> {
    args.get(key).and_then(Value::as_bool)
}

/// Recipient field: `to` with `recipient` as the fallback spelling.
fn recipient_arg(args: &Value) -> Option<&str> {
    str_arg(args, "to").or_else(|| str_arg(args, "recipient"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(tool: &str, args: Value) -> Intent {
        Intent::new("test-agent", tool, format!("{tool} test"), vec![], args)
    }

    fn ctx() -> PolicyContext {
        PolicyContext::default()
    }

    #[test]
    fn weekend_ban_denies_sunday() {
        let rule = RuleKind::WeekendBan {
            tools: vec!["Calendar.book".into()],
        };
        let outcome = rule
            .evaluate(
                &intent("Calendar.book", json!({"date": "2026-02-08"})),
                &ctx(),
            )
            .unwrap();
        match outcome {
            RuleOutcome::Deny {
                reason,
                remediation,
            } => {
                assert!(reason.contains("weekend"));
                let fix = remediation.unwrap().auto_fix.unwrap();
                assert_eq!(fix["date"], "2026-02-09"); // Monday
            }
            other => panic!("expected deny, got {other:?}"),
        }
    }

    #[test]
    fn weekend_ban_allows_tuesday() {
        let rule = RuleKind::WeekendBan {
            tools: vec!["Calendar.book".into()],
        };
        let outcome = rule
            .evaluate(
                &intent("Calendar.book", json!({"date": "2026-02-10"})),
                &ctx(),
            )
            .unwrap();
        assert!(matches!(outcome, RuleOutcome::Allow));
    }

    #[test]
    fn weekend_ban_ignores_other_tools() {
        let rule = RuleKind::WeekendBan {
            tools: vec!["Calendar.book".into()],
        };
        let outcome = rule
            .evaluate(&intent("Email.send", json!({"date": "2026-02-08"})), &ctx())
            .unwrap();
        assert!(matches!(outcome, RuleOutcome::NotApplicable));
    }

    #[test]
    fn business_hours_denies_early_morning() {
        let rule = RuleKind::BusinessHours {
            tools: vec!["Calendar.book".into()],
            open_hour: 9,
            close_hour: 17,
        };
        let outcome = rule
            .evaluate(&intent("Calendar.book", json!({"time": "07:30"})), &ctx())
            .unwrap();
        assert!(matches!(outcome, RuleOutcome::Deny { .. }));

        let outcome = rule
            .evaluate(&intent("Calendar.book", json!({"time": "14:00"})), &ctx())
            .unwrap();
        assert!(matches!(outcome, RuleOutcome::Allow));
    }

    #[test]
    fn bad_hour_window_is_an_error() {
        let rule = RuleKind::BusinessHours {
            tools: vec!["Calendar.book".into()],
            open_hour: 17,
            close_hour: 9,
        };
        let result = rule.evaluate(&intent("Calendar.book", json!({"time": "14:00"})), &ctx());
        assert!(result.is_err());
    }

    #[test]
    fn compensation_band_caps_salary() {
        let mut bands = BTreeMap::new();
        bands.insert("L4".to_string(), SalaryBand { min: 130_000, max: 180_000 });
        let rule = RuleKind::CompensationBands {
            tool: "Offer.generate".into(),
            bands,
        };
        let outcome = rule
            .evaluate(
                &intent("Offer.generate", json!({"role": "L4", "salary": 200000})),
                &ctx(),
            )
            .unwrap();
        match outcome {
            RuleOutcome::Deny { remediation, .. } => {
                let fix = remediation.unwrap().auto_fix.unwrap();
                assert_eq!(fix["salary"], 180_000);
            }
            other => panic!("expected deny, got {other:?}"),
        }

        let outcome = rule
            .evaluate(
                &intent("Offer.generate", json!({"role": "L4", "salary": 180000})),
                &ctx(),
            )
            .unwrap();
        assert!(matches!(outcome, RuleOutcome::Allow));
    }

    #[test]
    fn pii_redaction_modifies_external_sends_only() {
        let rule = RuleKind::PiiRedaction {
            tools: vec!["Email.send".into()],
            internal_domain: "company.com".into(),
        };
        let external = intent(
            "Email.send",
            json!({"to": "external@example.com", "body": "Call 555-123-4567"}),
        );
        match rule.evaluate(&external, &ctx()).unwrap() {
            RuleOutcome::Modify { patch, .. } => {
                let body = patch["body"].as_str().unwrap();
                assert!(body.contains("[REDACTED_PHONE]"));
            }
            other => panic!("expected modify, got {other:?}"),
        }

        let internal = intent(
            "Email.send",
            json!({"to": "peer@company.com", "body": "Call 555-123-4567"}),
        );
        assert!(matches!(
            rule.evaluate(&internal, &ctx()).unwrap(),
            RuleOutcome::NotApplicable
        ));
    }

    #[test]
    fn receipt_required_over_floor() {
        let rule = RuleKind::ReceiptRequired {
            tool: "Payroll.process_expense".into(),
            floor: 50.0,
        };
        let over = intent(
            "Payroll.process_expense",
            json!({"amount": 120.0, "has_receipt": false}),
        );
        assert!(matches!(
            rule.evaluate(&over, &ctx()).unwrap(),
            RuleOutcome::Deny { .. }
        ));

        let with_receipt = intent(
            "Payroll.process_expense",
            json!({"amount": 120.0, "has_receipt": true}),
        );
        assert!(matches!(
            rule.evaluate(&with_receipt, &ctx()).unwrap(),
            RuleOutcome::Allow
        ));
    }

    #[test]
    fn self_approval_denied() {
        let rule = RuleKind::SelfApprovalBan {
            tool: "Payroll.process_expense".into(),
        };
        let own = intent(
            "Payroll.process_expense",
            json!({"submitter": "E001", "approver": "E001", "amount": 20.0}),
        );
        assert!(matches!(
            rule.evaluate(&own, &ctx()).unwrap(),
            RuleOutcome::Deny { .. }
        ));
    }

    #[test]
    fn bulk_export_always_denied() {
        let rule = RuleKind::BulkExport {
            tools: vec!["HRIS.export".into()],
        };
        assert!(matches!(
            rule.evaluate(&intent("HRIS.export", json!({})), &ctx()).unwrap(),
            RuleOutcome::Deny { .. }
        ));
    }

    #[test]
    fn right_to_work_requires_verified() {
        let rule = RuleKind::RightToWork {
            tool: "Onboard.employee".into(),
        };
        let pending = intent("Onboard.employee", json!({"i9_status": "pending"}));
        assert!(matches!(
            rule.evaluate(&pending, &ctx()).unwrap(),
            RuleOutcome::Deny { .. }
        ));
        let missing = intent("Onboard.employee", json!({}));
        assert!(matches!(
            rule.evaluate(&missing, &ctx()).unwrap(),
            RuleOutcome::Deny { .. }
        ));
        let verified = intent("Onboard.employee", json!({"i9_status": "verified"}));
        assert!(matches!(
            rule.evaluate(&verified, &ctx()).unwrap(),
            RuleOutcome::Allow
        ));
    }

    #[test]
    fn cross_border_warns() {
        let rule = RuleKind::CrossBorder {
            tools: vec!["HRIS.transfer".into()],
            home_region: "eu".into(),
        };
        let outcome = rule
            .evaluate(
                &intent("HRIS.transfer", json!({"destination_region": "us"})),
                &ctx(),
            )
            .unwrap();
        assert!(matches!(outcome, RuleOutcome::Warn { .. }));
    }

    #[test]
    fn daily_quota_uses_context() {
        let rule = RuleKind::DailyQuota {
            tools: vec!["Calendar.book".into()],
            max_per_day: 3,
        };
        let mut context = PolicyContext::default();
        context.actions_today = 3;
        assert!(matches!(
            rule.evaluate(&intent("Calendar.book", json!({})), &context)
                .unwrap(),
            RuleOutcome::Deny { .. }
        ));
        context.actions_today = 2;
        assert!(matches!(
            rule.evaluate(&intent("Calendar.book", json!({})), &context)
                .unwrap(),
            RuleOutcome::Allow
        ));
    }
}
