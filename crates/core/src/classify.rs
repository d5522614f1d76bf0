//! Statement shape labels used by the executor.

use crate::lexer::{contains_word, leading_word};

const WRITE_WORDS: &[&str] = &["INSERT", "UPDATE", "DELETE", "CREATE", "DROP", "ALTER"];
const SCHEMA_VERBS: &[&str] = &["CREATE", "DROP", "ALTER"];
const SCHEMA_OBJECTS: &[&str] = &["TABLE", "SCHEMA", "DATABASE"];

/// Whether the statement only reads.
///
/// `SELECT …` is select-like. `WITH …` is select-like when it mentions `SELECT`
/// and none of the write verbs as whole words. Labeling only; never used to authorize.
pub fn is_select_like(sql: &str) -> bool {
    let upper = sql.trim_start().to_ascii_uppercase();
    if upper.starts_with("SELECT") {
        return true;
    }
    if upper.starts_with("WITH") {
        if WRITE_WORDS.iter().any(|word| contains_word(&upper, word)) {
            return false;
        }
        return contains_word(&upper, "SELECT");
    }
    false
}

/// Whether the statement creates, drops or alters a table, schema or database.
///
/// A `true` result means a cached hierarchy is stale.
pub fn is_schema_changing(sql: &str) -> bool {
    let trimmed = sql.trim_start();
    let verb = leading_word(trimmed);
    if !SCHEMA_VERBS.iter().any(|v| v.eq_ignore_ascii_case(verb)) {
        return false;
    }
    let rest = &trimmed[verb.len()..];
    let after_ws = rest.trim_start();
    if after_ws.len() == rest.len() {
        return false;
    }
    let object = after_ws.as_bytes();
    SCHEMA_OBJECTS.iter().any(|o| {
        object.len() >= o.len() && object[..o.len()].eq_ignore_ascii_case(o.as_bytes())
    })
}
