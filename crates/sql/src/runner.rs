//! Runs caller statements on pooled connections.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::pool::PoolConnection;
use sqlx::{Column, Connection, Either, Executor, Postgres};
use tracing::debug;

use sqlsandbox_core::traits::StatementRunner;
use sqlsandbox_core::{PoolTarget, RawRowSet, SandboxResult};

use crate::error::map_statement_error;
use crate::router::ConnectionRouter;
use crate::values::{row_columns, row_values};

/// [`StatementRunner`] backed by the [`ConnectionRouter`] pools.
#[derive(Debug, Clone)]
pub struct PgStatementRunner {
    router: Arc<ConnectionRouter>,
}

impl PgStatementRunner {
    /// Runner checking connections out of `router`.
    pub fn new(router: Arc<ConnectionRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl StatementRunner for PgStatementRunner {
    async fn run(
        &self,
        target: PoolTarget,
        sql: &str,
        select_like: bool,
    ) -> SandboxResult<RawRowSet> {
        let mut conn = self.router.acquire(target).await?;

        // Unnamed statement: caller SQL is never cached server-side. The extended
        // protocol also refuses more than one statement per string.
        let started = Instant::now();
        let mut stream = (&mut *conn).fetch_many(sqlx::query(sql).persistent(false));

        let mut raw = RawRowSet::default();
        while let Some(item) = stream.try_next().await.map_err(map_statement_error)? {
            match item {
                Either::Left(done) => raw.row_count += done.rows_affected(),
                Either::Right(row) => {
                    if raw.columns.is_empty() {
                        raw.columns = row_columns(&row);
                    }
                    raw.rows.push(row_values(&row));
                }
            }
        }
        drop(stream);
        raw.elapsed = started.elapsed();

        if select_like && raw.rows.is_empty() {
            raw.columns = describe_columns(&mut conn, sql).await?;
        }

        debug!(
            pool = %target,
            rows = raw.rows.len(),
            row_count = raw.row_count,
            elapsed_us = raw.elapsed.as_micros() as u64,
            "statement finished"
        );
        Ok(raw)
    }
}

/// Column names of `sql` without running it.
///
/// The pooled connection must not keep a named statement for caller SQL: a later
/// run of the same text after `ALTER TABLE` would reuse the stale row shape.
async fn describe_columns(
    conn: &mut PoolConnection<Postgres>,
    sql: &str,
) -> SandboxResult<Vec<String>> {
    let cached_before = conn.cached_statements_size();
    let described = (&mut **conn).describe(sql).await.map_err(map_statement_error)?;

    if conn.cached_statements_size() > cached_before {
        conn.clear_cached_statements()
            .await
            .map_err(map_statement_error)?;
    }

    Ok(described
        .columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect())
}
