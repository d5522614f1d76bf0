//! Lexical gate applied to raw SQL before it can reach a connection.
//!
//! Checks run in a fixed order and the first failing check decides the reason.
//! Matching is substring based on purpose: it is a conservative filter, not a parser.
//!
//! Known gaps, kept so the accepted set stays stable:
//!
//! - Whitespace is not normalized. Multi-word phrases match only with a single
//!   literal space, so `CREATE\nROLE x` or `CREATE\tROLE x` passes the phrase check,
//!   and the space-padded entries miss words next to tabs, newlines or punctuation.
//!   The database server and role grants remain the real boundary for these.
//! - The `CREATE|DROP DATABASE` name check only sees a plain word name. A target it
//!   cannot read (`CREATE DATABASE/**/evil`, `CREATE DATABASE "évil"`) is not
//!   prefix-checked and the statement is accepted.

use serde::Serialize;

use crate::lexer::{contains_word, leading_word, unquoted_terminators};
use crate::protected::ProtectedIdentifierSet;

/// Statements may only start with one of these verbs.
pub const ALLOWED_LEADING_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER",
];

/// Phrases rejected anywhere in the upper-cased statement.
///
/// The space-padded entries only match when surrounded by literal spaces, and
/// two-word entries only with exactly one space between the words. `CREATE\nROLE x`
/// is therefore not rejected here.
pub const BLOCKED_PHRASES: &[&str] = &[
    "ALTER ROLE",
    "CREATE ROLE",
    "DROP ROLE",
    "CREATE USER",
    "DROP USER",
    "ALTER USER",
    "GRANT",
    "REVOKE",
    "EXTENSION",
    "FUNCTION",
    "TRIGGER",
    "PROCEDURE",
    "SYSTEM",
    "ALTER SYSTEM",
    "SECURITY",
    " PROGRAM ",
    " COPY ",
    " ROLE ",
    " USER ",
];

pub(crate) const REASON_EMPTY: &str = "empty statement";
pub(crate) const REASON_MULTIPLE: &str = "only single statements are allowed";
pub(crate) const REASON_VERB: &str = "only DML/DQL/DDL statements are allowed";
pub(crate) const REASON_BLOCKED: &str = "statement contains blocked keywords";
pub(crate) const REASON_PROCEDURAL: &str = "procedural blocks are not permitted";
pub(crate) const REASON_PROTECTED: &str = "access to protected objects is denied";

/// Result of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    /// Whether the statement may proceed
    pub accepted: bool,
    /// Trimmed text without its trailing terminator; empty on rejection
    pub normalized_sql: String,
    /// Why the statement was rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl ValidationOutcome {
    fn accept(normalized_sql: &str) -> Self {
        Self {
            accepted: true,
            normalized_sql: normalized_sql.to_string(),
            rejection_reason: None,
        }
    }

    fn reject(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            normalized_sql: String::new(),
            rejection_reason: Some(reason.into()),
        }
    }

    /// Converts into the normalized text, or the rejection reason.
    pub fn into_result(self) -> Result<String, String> {
        match self.rejection_reason {
            None if self.accepted => Ok(self.normalized_sql),
            Some(reason) => Err(reason),
            None => Err(REASON_EMPTY.to_string()),
        }
    }
}

/// Validates `sql` against the standard protected set.
pub fn validate(sql: &str, allow_protected: bool) -> ValidationOutcome {
    validate_with(ProtectedIdentifierSet::standard(), sql, allow_protected)
}

/// Validates `sql` against an explicit protected set.
pub fn validate_with(
    protected: &ProtectedIdentifierSet,
    sql: &str,
    allow_protected: bool,
) -> ValidationOutcome {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return ValidationOutcome::reject(REASON_EMPTY);
    }

    let normalized = match trimmed.strip_suffix(';') {
        Some(rest) => rest.trim(),
        None => trimmed,
    };
    if normalized.is_empty() {
        return ValidationOutcome::reject(REASON_EMPTY);
    }

    if unquoted_terminators(normalized) > 0 {
        return ValidationOutcome::reject(REASON_MULTIPLE);
    }

    let upper = normalized.to_ascii_uppercase();
    let verb = leading_word(&upper);
    if !ALLOWED_LEADING_KEYWORDS.contains(&verb) {
        return ValidationOutcome::reject(REASON_VERB);
    }

    if BLOCKED_PHRASES.iter().any(|phrase| upper.contains(phrase)) {
        return ValidationOutcome::reject(REASON_BLOCKED);
    }

    if contains_word(&upper, "DO") {
        return ValidationOutcome::reject(REASON_PROCEDURAL);
    }

    if !allow_protected && protected.mentions_blocked_name(&normalized.to_ascii_lowercase()) {
        return ValidationOutcome::reject(REASON_PROTECTED);
    }

    if let Some((action, name)) = database_target(normalized) {
        if !protected.is_safe_database_name(name) {
            return ValidationOutcome::reject(format!(
                "{action} DATABASE is limited to names starting with \"{}\"",
                protected.safe_database_prefix
            ));
        }
    }

    ValidationOutcome::accept(normalized)
}

/// Extracts `(CREATE|DROP, name)` from a leading `CREATE|DROP DATABASE <name>`.
///
/// The name is a run of word characters and `-`, optionally preceded by `"`.
fn database_target(sql: &str) -> Option<(&'static str, &str)> {
    let verb = leading_word(sql);
    let action = if verb.eq_ignore_ascii_case("CREATE") {
        "CREATE"
    } else if verb.eq_ignore_ascii_case("DROP") {
        "DROP"
    } else {
        return None;
    };

    let rest = &sql[verb.len()..];
    let after_ws = rest.trim_start();
    if after_ws.len() == rest.len() {
        return None;
    }

    let object = leading_word(after_ws);
    if !object.eq_ignore_ascii_case("DATABASE") {
        return None;
    }

    let rest = &after_ws[object.len()..];
    let after_ws = rest.trim_start();
    if after_ws.len() == rest.len() {
        return None;
    }

    let candidate = after_ws.strip_prefix('"').unwrap_or(after_ws);
    let end = candidate
        .bytes()
        .position(|b| !(b.is_ascii_alphanumeric() || b == b'_' || b == b'-'))
        .unwrap_or(candidate.len());
    if end == 0 {
        return None;
    }
    Some((action, &candidate[..end]))
}
