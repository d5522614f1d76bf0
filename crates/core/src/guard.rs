//! Second line of defence after validation: token-level deny-list check.

use crate::lexer::word_tokens;
use crate::protected::ProtectedIdentifierSet;

/// Token scanner that denies references to protected schemas and tables.
#[derive(Debug, Clone, Copy)]
pub struct IdentifierGuard {
    protected: &'static ProtectedIdentifierSet,
}

impl Default for IdentifierGuard {
    fn default() -> Self {
        Self::new(ProtectedIdentifierSet::standard())
    }
}

impl IdentifierGuard {
    /// Create a guard over `protected`.
    pub fn new(protected: &'static ProtectedIdentifierSet) -> Self {
        Self { protected }
    }

    /// Whether `normalized_sql` may run for a caller with the given privilege.
    ///
    /// Privileged callers are always allowed. The answer never says which token
    /// tripped the check.
    pub fn is_allowed(&self, normalized_sql: &str, is_privileged: bool) -> bool {
        if is_privileged {
            return true;
        }
        !word_tokens(normalized_sql).any(|token| self.is_blocked_token(&token))
    }

    fn is_blocked_token(&self, token: &str) -> bool {
        let lower = token.to_ascii_lowercase();

        if self.protected.is_protected_table(&lower) {
            return true;
        }

        if let Some((schema, table)) = lower.split_once('.') {
            if self.protected.is_protected_schema(schema) || self.protected.is_protected_table(table)
            {
                return true;
            }
        }

        self.protected.schemas.iter().any(|schema| {
            lower.len() > schema.len()
                && lower.as_bytes()[schema.len()] == b'.'
                && lower.starts_with(schema)
        })
    }
}

/// Shorthand for [`IdentifierGuard::is_allowed`] over the standard set.
pub fn is_allowed(normalized_sql: &str, is_privileged: bool) -> bool {
    IdentifierGuard::default().is_allowed(normalized_sql, is_privileged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privileged_callers_bypass_the_scan() {
        assert!(is_allowed("SELECT * FROM protected.secrets", true));
        assert!(is_allowed("SELECT * FROM migrations", true));
    }

    #[test]
    fn plain_playground_queries_pass() {
        assert!(is_allowed("SELECT s.name, c.course_name FROM students s JOIN enrollments e ON e.student_id = s.id JOIN courses c ON c.id = e.course_id", false));
        assert!(is_allowed("UPDATE playground.students SET age = 21 WHERE id = 1", false));
    }

    #[test]
    fn bare_protected_tables_are_denied() {
        assert!(!is_allowed("SELECT * FROM migrations", false));
        assert!(!is_allowed("DELETE FROM AUDIT_LOGS", false));
        assert!(!is_allowed("INSERT INTO system_logs VALUES (1)", false));
    }

    #[test]
    fn qualified_references_are_denied() {
        assert!(!is_allowed("SELECT * FROM protected.secrets", false));
        assert!(!is_allowed("SELECT * FROM Internal.config", false));
        assert!(!is_allowed("SELECT * FROM playground.migrations", false));
        assert!(!is_allowed("SELECT * FROM pg_catalog.pg_class", false));
    }

    #[test]
    fn quoting_and_spacing_do_not_hide_references() {
        assert!(!is_allowed(r#"SELECT * FROM "migrations""#, false));
        assert!(!is_allowed(r#"SELECT * FROM "setup"."keys""#, false));
        assert!(!is_allowed("SELECT * FROM x WHERE y IN (SELECT * FROM\n\tsystem.t)", false));
        assert!(!is_allowed("SELECT 1 FROM students, migrations", false));
    }

    #[test]
    fn quoted_or_spaced_qualifiers_are_denied() {
        assert!(!is_allowed(r#"SELECT * FROM "setup"."keys""#, false));
        assert!(!is_allowed(r#"SELECT * FROM "internal".t"#, false));
        assert!(!is_allowed("SELECT * FROM protected . secrets", false));
        assert!(!is_allowed("SELECT * FROM pg_catalog .pg_class", false));
        assert!(!is_allowed("SELECT * FROM \"system\"\n.\n\"t\"", false));
        assert!(is_allowed(r#"SELECT "name" FROM "students""#, false));
    }

    #[test]
    fn deeper_qualification_still_checks_the_schema() {
        assert!(!is_allowed("SELECT * FROM internal.t.c", false));
        assert!(!is_allowed("SELECT db.system_logs.id FROM students", false));
    }

    #[test]
    fn similar_names_are_not_denied() {
        assert!(is_allowed("SELECT * FROM migrations_archive", false));
        assert!(is_allowed("SELECT protected_flag FROM students", false));
    }
}
