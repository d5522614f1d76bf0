//! Catalog reads behind the hierarchy view.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::Row;

use sqlsandbox_core::traits::CatalogReader;
use sqlsandbox_core::{CatalogColumn, PoolTarget, SandboxResult};

use crate::error::map_db_error;
use crate::router::ConnectionRouter;

const PLAYGROUND_COLUMNS_SQL: &str = r#"
SELECT
    current_database()::text AS database_name,
    nsp.nspname::text AS schema_name,
    cls.relname::text AS table_name,
    att.attname::text AS column_name,
    pg_catalog.format_type(att.atttypid, att.atttypmod)::text AS data_type
FROM pg_catalog.pg_attribute att
JOIN pg_catalog.pg_class cls ON cls.oid = att.attrelid
JOIN pg_catalog.pg_namespace nsp ON nsp.oid = cls.relnamespace
WHERE nsp.nspname = $1
  AND cls.relkind = 'r'
  AND att.attnum > 0
  AND NOT att.attisdropped
  AND cls.relname <> ALL($2::text[])
ORDER BY nsp.nspname, cls.relname, att.attnum
"#;

/// [`CatalogReader`] querying `pg_catalog` through the router.
#[derive(Debug, Clone)]
pub struct PgCatalogReader {
    router: Arc<ConnectionRouter>,
}

impl PgCatalogReader {
    /// Reader checking connections out of `router`.
    pub fn new(router: Arc<ConnectionRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl CatalogReader for PgCatalogReader {
    async fn playground_columns(
        &self,
        target: PoolTarget,
        schema: &str,
        excluded_tables: &[&str],
    ) -> SandboxResult<Vec<CatalogColumn>> {
        let mut conn = self.router.acquire(target).await?;
        let excluded: Vec<String> = excluded_tables.iter().map(|t| t.to_string()).collect();

        let rows = sqlx::query(PLAYGROUND_COLUMNS_SQL)
            .bind(schema)
            .bind(excluded)
            .fetch_all(&mut *conn)
            .await
            .map_err(map_db_error)?;

        rows.iter()
            .map(|row| {
                Ok(CatalogColumn {
                    database_name: row.try_get("database_name")?,
                    schema_name: row.try_get("schema_name")?,
                    table_name: row.try_get("table_name")?,
                    column_name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(map_db_error)
    }
}
