//! Rule-based policy engine for Vigil authorization.
//!
//! Rules are a sealed set of kinds loaded from a declarative JSON document
//! and evaluated in deterministic (rule id) order against each intent. The
//! engine composes per-rule outcomes into a single [`Verdict`] with strict
//! precedence: Deny over Modify over Warn over Allow.
//!
//! [`Verdict`]: vigil_types::Verdict

pub mod builtin;
pub mod engine;
pub mod pii;
pub mod rule;
pub mod source;

pub use builtin::DEFAULT_RULES;
pub use engine::{PolicyEngine, RuleDescriptor, RuleSet};
pub use rule::{PolicyContext, Rule, RuleKind, RuleOutcome, SalaryBand};
pub use source::parse_rules;
