//! Seams between the database-free core and a concrete database backend.
//!
//! The executor, resetter and introspector only talk to these traits, so tests can
//! swap in the fakes from `mocks`.

use async_trait::async_trait;

use crate::error::SandboxResult;
use crate::hierarchy::CatalogColumn;
use crate::privilege::PoolTarget;
use crate::result::RawRowSet;
use crate::seed::SeedPlan;

/// Runs one already-validated statement on a connection from the given pool.
///
/// Implementations must check the connection out once and return it to its home
/// pool on every exit path.
#[async_trait]
pub trait StatementRunner: Send + Sync {
    /// Execute `sql` and collect its rows.
    ///
    /// `select_like` is a label: implementations may use it to report column names
    /// for empty results, never to decide whether the statement may run.
    ///
    /// # Errors
    ///
    /// `Execution` for database errors, `PoolExhausted` when checkout times out.
    async fn run(&self, target: PoolTarget, sql: &str, select_like: bool)
        -> SandboxResult<RawRowSet>;
}

/// Storage operations behind a sandbox reset.
#[async_trait]
pub trait SandboxStore: Send + Sync {
    /// Drops every table in `schema` with `CASCADE`, each in its own autocommit
    /// statement, stopping at the first failure. Returns how many were dropped.
    async fn drop_schema_tables(&self, schema: &str) -> SandboxResult<usize>;

    /// Recreates and reseeds the fixed tables in one transaction on a direct,
    /// unpooled connection that is closed afterwards.
    async fn reseed(&self, plan: &SeedPlan) -> SandboxResult<()>;
}

/// Reads catalog metadata for the hierarchy view.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Live columns of ordinary tables in `schema`, excluding `excluded_tables`,
    /// ordered by table name then ordinal position.
    async fn playground_columns(
        &self,
        target: PoolTarget,
        schema: &str,
        excluded_tables: &[&str],
    ) -> SandboxResult<Vec<CatalogColumn>>;
}
