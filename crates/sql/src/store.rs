//! Drop and reseed steps of a sandbox reset.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Postgres, Transaction};
use tracing::{debug, info, warn};

use sqlsandbox_core::traits::SandboxStore;
use sqlsandbox_core::{quote_ident, PoolTarget, SandboxError, SandboxResult, SeedPlan, SeedValue};

use crate::error::map_db_error;
use crate::router::ConnectionRouter;

/// [`SandboxStore`] on top of the admin pool and the direct reseed connection.
#[derive(Debug, Clone)]
pub struct PgSandboxStore {
    router: Arc<ConnectionRouter>,
}

impl PgSandboxStore {
    /// Store using `router` for both phases.
    pub fn new(router: Arc<ConnectionRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl SandboxStore for PgSandboxStore {
    async fn drop_schema_tables(&self, schema: &str) -> SandboxResult<usize> {
        let mut conn = self.router.acquire(PoolTarget::Admin).await?;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT tablename::text FROM pg_catalog.pg_tables WHERE schemaname = $1 ORDER BY tablename",
        )
        .bind(schema)
        .fetch_all(&mut *conn)
        .await
        .map_err(map_db_error)?;

        let qualified_schema = quote_ident(schema);
        for table in &tables {
            let stmt = format!(
                "DROP TABLE IF EXISTS {qualified_schema}.{} CASCADE",
                quote_ident(table)
            );
            sqlx::query(&stmt)
                .persistent(false)
                .execute(&mut *conn)
                .await
                .map_err(|err| {
                    SandboxError::internal(format!("dropping {schema}.{table} failed: {err}"))
                })?;
            debug!(schema, table = %table, "dropped table");
        }

        Ok(tables.len())
    }

    async fn reseed(&self, plan: &SeedPlan) -> SandboxResult<()> {
        let mut conn = self.router.direct_connection().await?;

        let outcome = seed_in_transaction(&mut conn, plan).await;

        if let Err(err) = conn.close().await {
            warn!(error = %err, "closing reseed connection failed");
        }

        outcome.map_err(map_db_error)?;
        info!(schema = plan.schema(), tables = plan.tables().len(), "reseed committed");
        Ok(())
    }
}

async fn seed_in_transaction(conn: &mut PgConnection, plan: &SeedPlan) -> Result<(), sqlx::Error> {
    let mut tx = conn.begin().await?;
    match apply_plan(&mut tx, plan).await {
        Ok(()) => tx.commit().await,
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "reseed rollback failed");
            }
            Err(err)
        }
    }
}

async fn apply_plan(tx: &mut Transaction<'_, Postgres>, plan: &SeedPlan) -> Result<(), sqlx::Error> {
    sqlx::query(&plan.create_schema_sql()).execute(&mut **tx).await?;
    sqlx::query(&plan.search_path_sql()).execute(&mut **tx).await?;

    for stmt in plan.create_table_sql() {
        sqlx::query(&stmt).execute(&mut **tx).await?;
    }
    sqlx::query(&plan.truncate_sql()).execute(&mut **tx).await?;

    for table in plan.tables() {
        let stmt = plan.insert_sql(table);
        let mut query = sqlx::query(&stmt);
        for value in table.rows.iter().flat_map(|row| row.iter()) {
            query = match *value {
                SeedValue::Text(text) => query.bind(text),
                SeedValue::Int(number) => query.bind(number),
            };
        }
        let inserted = query.execute(&mut **tx).await?.rows_affected();
        debug!(table = table.name, inserted, "seeded table");
    }

    for stmt in plan.grant_sql() {
        sqlx::query(&stmt).execute(&mut **tx).await?;
    }
    Ok(())
}
