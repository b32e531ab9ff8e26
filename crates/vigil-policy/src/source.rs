//! Declarative rule source parsing.
//!
//! A rule document is a JSON object with a `version` label and a list of
//! rules, each naming its kind and parameters. Unknown kinds or malformed
//! parameters fail the whole load so a partially-understood document never
//! becomes active.

use serde::Deserialize;

use vigil_types::VigilError;

use crate::rule::Rule;

#[derive(Debug, Deserialize)]
struct RuleDocument {
    #[allow(dead_code)]
    version: String,
    rules: Vec<Rule>,
}

/// Parse a rule document into a validated, id-sorted rule list.
///
/// Fails on JSON errors, unknown rule kinds, and duplicate rule ids. The
/// caller keeps its previous rule set when this returns an error.
pub fn parse_rules(json: &str) -> Result<Vec<Rule>, VigilError> {
    let document: RuleDocument = serde_json::from_str(json)
        .map_err(|e| VigilError::PolicyMisconfiguration(format!("rule document: {e}")))?;

    let mut rules = document.rules;
    rules.sort_by(|a, b| a.id.cmp(&b.id));

    for pair in rules.windows(2) {
        if pair[0].id == pair[1].id {
            return Err(VigilError::PolicyMisconfiguration(format!(
                "duplicate rule id '{}'",
                pair[0].id
            )));
        }
    }
    if rules.is_empty() {
        return Err(VigilError::PolicyMisconfiguration(
            "rule document contains no rules".to_string(),
        ));
    }

    Ok(rules)
}
