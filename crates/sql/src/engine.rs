//! PostgreSQL-backed sandbox: router, executor, resetter and introspector wired together.

use std::sync::Arc;

use tracing::info;

use sqlsandbox_core::{
    CallerIdentity, ExecutionResult, HierarchyIntrospector, QueryExecutor, SandboxResetter,
    SandboxResult, SchemaHierarchy, SeedPlan,
};

use crate::catalog::PgCatalogReader;
use crate::config::{ConfigError, SandboxConfig};
use crate::router::ConnectionRouter;
use crate::runner::PgStatementRunner;
use crate::store::PgSandboxStore;

/// Everything a caller needs to run statements against the sandbox.
///
/// Owns the [`ConnectionRouter`]; call [`shutdown`](Self::shutdown) before dropping
/// it so pooled connections close cleanly.
pub struct Sandbox {
    router: Arc<ConnectionRouter>,
    executor: QueryExecutor<PgStatementRunner>,
    resetter: SandboxResetter<PgSandboxStore>,
    introspector: HierarchyIntrospector<PgCatalogReader>,
}

impl Sandbox {
    /// Builds the pools and components from `config`.
    ///
    /// Pools are lazy, so this succeeds without a reachable server.
    pub fn connect(config: &SandboxConfig) -> Result<Self, ConfigError> {
        let router = Arc::new(ConnectionRouter::new(config)?);
        let plan = SeedPlan::new(&config.playground_schema, &config.practice_role);

        info!(
            schema = %config.playground_schema,
            practice_role = %config.practice_role,
            "sandbox ready"
        );

        Ok(Self {
            executor: QueryExecutor::new(PgStatementRunner::new(Arc::clone(&router))),
            resetter: SandboxResetter::new(PgSandboxStore::new(Arc::clone(&router)), plan),
            introspector: HierarchyIntrospector::new(
                PgCatalogReader::new(Arc::clone(&router)),
                config.playground_schema.clone(),
            ),
            router,
        })
    }

    /// See [`QueryExecutor::execute`].
    pub async fn execute(
        &self,
        sql: &str,
        identity: Option<&CallerIdentity>,
    ) -> SandboxResult<ExecutionResult> {
        self.executor.execute(sql, identity).await
    }

    /// See [`HierarchyIntrospector::describe`].
    pub async fn describe(
        &self,
        identity: Option<&CallerIdentity>,
    ) -> SandboxResult<SchemaHierarchy> {
        self.introspector.describe(identity).await
    }

    /// See [`SandboxResetter::reset`].
    pub async fn reset(&self, identity: Option<&CallerIdentity>) -> SandboxResult<()> {
        self.resetter.reset(identity).await
    }

    /// The shared router.
    pub fn router(&self) -> &ConnectionRouter {
        &self.router
    }

    /// Closes every pool.
    pub async fn shutdown(&self) {
        self.router.shutdown().await;
    }
}
