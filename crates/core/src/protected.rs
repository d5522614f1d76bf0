//! Deny-list of schemas, tables and catalog objects unprivileged callers may not touch.

/// Immutable set of protected identifiers.
///
/// The standard set is a `static`; changing it requires a redeploy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedIdentifierSet {
    /// Schemas that are off limits.
    pub schemas: &'static [&'static str],
    /// Table names that are off limits in any schema.
    pub tables: &'static [&'static str],
    /// Catalog views and tables that are off limits.
    pub catalog_names: &'static [&'static str],
    /// Prefix required for `CREATE DATABASE` / `DROP DATABASE` targets.
    pub safe_database_prefix: &'static str,
}

static STANDARD: ProtectedIdentifierSet = ProtectedIdentifierSet {
    schemas: &[
        "protected",
        "system",
        "internal",
        "setup",
        "pg_catalog",
        "information_schema",
        "pg_toast",
        "pg_temp",
    ],
    tables: &["migrations", "audit_logs", "system_logs"],
    catalog_names: &[
        "pg_database",
        "pg_roles",
        "pg_user",
        "pg_authid",
        "pg_shadow",
        "pg_settings",
        "pg_stat_activity",
        "pg_stat_replication",
        "pg_locks",
        "pg_stat_bgwriter",
        "pg_stat_wal",
        "pg_stat_ssl",
        "pg_stat_progress_vacuum",
        "pg_stat_progress_analyze",
        "pg_proc",
        "pg_extension",
        "pg_namespace",
    ],
    safe_database_prefix: "sandbox",
};

impl ProtectedIdentifierSet {
    /// The process-wide deny-list.
    pub fn standard() -> &'static ProtectedIdentifierSet {
        &STANDARD
    }

    /// Every blocked name: schemas, then tables, then catalog objects.
    pub fn blocked_names(&self) -> impl Iterator<Item = &'static str> {
        self.schemas
            .iter()
            .chain(self.tables.iter())
            .chain(self.catalog_names.iter())
            .copied()
    }

    /// Exact, case-insensitive schema match.
    pub fn is_protected_schema(&self, name: &str) -> bool {
        self.schemas.iter().any(|s| s.eq_ignore_ascii_case(name))
    }

    /// Exact, case-insensitive table match.
    pub fn is_protected_table(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.eq_ignore_ascii_case(name))
    }

    /// Whether `lowered` contains any blocked name as a substring.
    ///
    /// `lowered` must already be lower-cased.
    pub fn mentions_blocked_name(&self, lowered: &str) -> bool {
        self.blocked_names().any(|name| lowered.contains(name))
    }

    /// Case-insensitive check of a database name against the safe prefix.
    pub fn is_safe_database_name(&self, name: &str) -> bool {
        name.to_ascii_lowercase()
            .starts_with(&self.safe_database_prefix.to_ascii_lowercase())
    }
}
