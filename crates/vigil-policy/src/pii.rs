//! Regex-based PII detection and redaction.
//!
//! The pattern set is intentionally narrow: structured identifiers only
//! (phone, SSN, email). Statistical name detection is out of scope. Matches
//! are replaced with fixed sentinels so downstream consumers can tell what
//! was removed.

use regex::Regex;
use std::sync::LazyLock;

static SSN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").expect("ssn pattern"));

static PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+?1?[-. ]?\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}").expect("phone pattern")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("email pattern")
});

/// Sentinel substituted for each redacted phone number.
pub const REDACTED_PHONE: &str = "[REDACTED_PHONE]";
/// Sentinel substituted for each redacted SSN.
pub const REDACTED_SSN: &str = "[REDACTED_SSN]";
/// Sentinel substituted for each redacted email address.
pub const REDACTED_EMAIL: &str = "[REDACTED_EMAIL]";

/// Redact structured PII from `text`, returning the redacted text and the
/// number of values replaced.
///
/// `skip` is typically the recipient's own address: a value equal to it is
/// left in place, since the recipient already knows it.
pub fn redact(text: &str, skip: Option<&str>) -> (String, usize) {
    let mut redacted = text.to_string();
    let mut count = 0usize;

    for (pattern, sentinel) in [
        (&*SSN, REDACTED_SSN),
        (&*PHONE, REDACTED_PHONE),
        (&*EMAIL, REDACTED_EMAIL),
    ] {
        let mut replaced = 0usize;
        let next = pattern.replace_all(&redacted, |caps: &regex::Captures<'_>| {
            let matched = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            if Some(matched) == skip {
                matched.to_string()
            } else {
                replaced += 1;
                sentinel.to_string()
            }
        });
        redacted = next.into_owned();
        count += replaced;
    }

    (redacted, count)
}

/// Whether `text` contains any structured PII other than `skip`.
pub fn contains_pii(text: &str, skip: Option<&str>) -> bool {
    redact(text, skip).1 > 0
}
