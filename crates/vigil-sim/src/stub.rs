//! Non-destructive tool stubs.
//!
//! A stub answers "what would this tool return" without touching the
//! outside world. Stubs must be pure: the same input always produces the
//! same output. Each stub also derives the capability strings an action
//! implies, which feed the drift engine's surprisal signal.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Why a stub invocation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubError {
    /// The caller-supplied deadline expired. The simulator treats the
    /// step as denied with status STUB_TIMEOUT.
    Timeout,
    /// The stub could not produce a value.
    Failure(String),
}

impl std::fmt::Display for StubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StubError::Timeout => write!(f, "stub deadline expired"),
            StubError::Failure(msg) => write!(f, "stub failed: {msg}"),
        }
    }
}

/// One simulated tool service.
pub trait ToolStub: Send + Sync {
    /// Service name, the part of the tool before the dot (`Calendar`).
    fn service(&self) -> &str;

    /// Produce a synthetic return value for `action` with `args`.
    fn invoke(
        &self,
        action: &str,
        args: &Value,
        deadline: Option<Duration>,
    ) -> Result<Value, StubError>;

    /// Capability strings the action implies.
    fn capabilities(&self, action: &str, args: &Value) -> Vec<String>;
}

/// Registry mapping service names to stubs.
pub struct StubRegistry {
    stubs: HashMap<String, Arc<dyn ToolStub>>,
}

impl StubRegistry {
    pub fn empty() -> Self {
        Self {
            stubs: HashMap::new(),
        }
    }

    /// Registry with the six builtin service stubs.
    pub fn with_builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(CalendarStub));
        registry.register(Arc::new(EmailStub));
        registry.register(Arc::new(HrisStub));
        registry.register(Arc::new(PayrollStub));
        registry.register(Arc::new(OfferStub));
        registry.register(Arc::new(PerformanceStub));
        registry
    }

    pub fn register(&mut self, stub: Arc<dyn ToolStub>) {
        self.stubs.insert(stub.service().to_string(), stub);
    }

    /// Split a tool name into its registered stub and action.
    pub fn resolve<'a>(&self, tool: &'a str) -> Option<(Arc<dyn ToolStub>, &'a str)> {
        let (service, action) = tool.split_once('.')?;
        let stub = self.stubs.get(service)?.clone();
        Some((stub, action))
    }

    /// Capability strings for a tool invocation. Falls back to the
    /// lowercased tool name when no stub is registered.
    pub fn capabilities_for(&self, tool: &str, args: &Value) -> Vec<String> {
        match self.resolve(tool) {
            Some((stub, action)) => stub.capabilities(action, args),
            None => vec![tool.to_lowercase()],
        }
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

/// Calendar service stub.
pub struct CalendarStub;

impl ToolStub for CalendarStub {
    fn service(&self) -> &str {
        "Calendar"
    }

    fn invoke(&self, action: &str, args: &Value, _: Option<Duration>) -> Result<Value, StubError> {
        Ok(match action {
            "check" => json!({
                "status": "ok",
                "available": true,
                "date": args.get("date").cloned().unwrap_or(Value::Null),
                "time": args.get("time").cloned().unwrap_or(Value::Null),
            }),
            "book" => json!({
                "status": "would_book",
                "event_id": "EVT-SIM-1",
                "date": args.get("date").cloned().unwrap_or(Value::Null),
                "time": args.get("time").cloned().unwrap_or(Value::Null),
            }),
            other => json!({ "status": "simulated", "action": other }),
        })
    }

    fn capabilities(&self, action: &str, _args: &Value) -> Vec<String> {
        vec![format!("calendar.{action}")]
    }
}

/// Email service stub.
pub struct EmailStub;

impl ToolStub for EmailStub {
    fn service(&self) -> &str {
        "Email"
    }

    fn invoke(&self, action: &str, args: &Value, _: Option<Duration>) -> Result<Value, StubError> {
        Ok(match action {
            "send" => json!({
                "status": "would_send",
                "to": args.get("to").cloned().unwrap_or(Value::Null),
                "body_length": str_arg(args, "body").map(str::len).unwrap_or(0),
            }),
            "draft" => json!({ "status": "drafted", "draft_id": "DRAFT-SIM-1" }),
            other => json!({ "status": "simulated", "action": other }),
        })
    }

    fn capabilities(&self, action: &str, args: &Value) -> Vec<String> {
        let mut caps = vec![format!("email.{action}")];
        if let Some(to) = str_arg(args, "to") {
            if !to.ends_with("@company.com") {
                caps.push("email.external".to_string());
            }
        }
        caps
    }
}

/// HRIS service stub with a tiny fixed employee directory.
pub struct HrisStub;

impl ToolStub for HrisStub {
    fn service(&self) -> &str {
        "HRIS"
    }

    fn invoke(&self, action: &str, args: &Value, _: Option<Duration>) -> Result<Value, StubError> {
        Ok(match action {
            "get_employee" => match str_arg(args, "employee_id") {
                Some("E001") => json!({ "status": "ok", "data": { "name": "Dana Okafor", "role": "L4", "department": "Engineering" } }),
                Some("E002") => json!({ "status": "ok", "data": { "name": "Priya Nair", "role": "L5", "department": "Product" } }),
                Some("E003") => json!({ "status": "ok", "data": { "name": "Sam Reyes", "role": "L3", "department": "Sales" } }),
                _ => json!({ "status": "not_found" }),
            },
            "get_salary_band" => {
                let role = str_arg(args, "role").unwrap_or("L3");
                let (min, max) = match role {
                    "L4" => (130_000, 180_000),
                    "L5" => (170_000, 240_000),
                    _ => (100_000, 140_000),
                };
                json!({ "status": "ok", "role": role, "min": min, "max": max })
            }
            "export" => json!({ "status": "would_export", "records": 3 }),
            other => json!({ "status": "simulated", "action": other }),
        })
    }

    fn capabilities(&self, action: &str, _args: &Value) -> Vec<String> {
        let mut caps = vec![format!("hris.{action}")];
        if action == "export" {
            caps.push("hris.bulk_read".to_string());
        }
        if matches!(action, "update" | "delete" | "create") {
            caps.push("hris.write".to_string());
        }
        caps
    }
}

/// Payroll service stub.
pub struct PayrollStub;

impl ToolStub for PayrollStub {
    fn service(&self) -> &str {
        "Payroll"
    }

    fn invoke(&self, action: &str, args: &Value, _: Option<Duration>) -> Result<Value, StubError> {
        Ok(match action {
            "get_salary" => json!({ "status": "ok", "salary": 150000, "currency": "USD" }),
            "process_expense" => json!({
                "status": "would_process",
                "amount": args.get("amount").cloned().unwrap_or(Value::Null),
                "category": args.get("category").cloned().unwrap_or(Value::Null),
            }),
            other => json!({ "status": "simulated", "action": other }),
        })
    }

    fn capabilities(&self, action: &str, _args: &Value) -> Vec<String> {
        let mut caps = vec![format!("payroll.{action}")];
        if matches!(action, "get_salary" | "get_compensation") {
            caps.push("payroll.read_sensitive".to_string());
        }
        caps
    }
}

/// Offer generation stub.
pub struct OfferStub;

impl ToolStub for OfferStub {
    fn service(&self) -> &str {
        "Offer"
    }

    fn invoke(&self, action: &str, args: &Value, _: Option<Duration>) -> Result<Value, StubError> {
        Ok(match action {
            "generate" => json!({
                "status": "would_generate",
                "offer_id": "OFR-SIM-1",
                "role": args.get("role").cloned().unwrap_or(Value::Null),
                "salary": args.get("salary").cloned().unwrap_or(Value::Null),
                "equity": args.get("equity").cloned().unwrap_or(Value::Null),
            }),
            "send" => json!({
                "status": "would_send",
                "to": args.get("candidate_email").cloned().unwrap_or(Value::Null),
            }),
            other => json!({ "status": "simulated", "action": other }),
        })
    }

    fn capabilities(&self, action: &str, _args: &Value) -> Vec<String> {
        vec![format!("offer.{action}")]
    }
}

/// Performance review stub.
pub struct PerformanceStub;

impl ToolStub for PerformanceStub {
    fn service(&self) -> &str {
        "Performance"
    }

    fn invoke(&self, action: &str, _args: &Value, _: Option<Duration>) -> Result<Value, StubError> {
        Ok(match action {
            "get_reviews" => json!({
                "status": "ok",
                "reviews": [ { "rating": 4, "period": "Q4" } ],
            }),
            "submit_feedback" => json!({ "status": "would_submit" }),
            other => json!({ "status": "simulated", "action": other }),
        })
    }

    fn capabilities(&self, action: &str, _args: &Value) -> Vec<String> {
        let mut caps = vec![format!("perf.{action}")];
        if matches!(action, "get_reviews" | "get_ratings") {
            caps.push("perf.read".to_string());
        }
        caps
    }
}
