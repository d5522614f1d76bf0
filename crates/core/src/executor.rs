//! Validate, guard, route and run one caller statement.

use std::time::Instant;

use tracing::{debug, warn};
use uuid::Uuid;

use sqlsandbox_observability::{
    record_pool_exhausted, record_query_failure, record_query_latency, record_query_rejection,
};

use crate::classify::{is_schema_changing, is_select_like};
use crate::error::{SandboxError, SandboxResult};
use crate::guard::IdentifierGuard;
use crate::privilege::{route, CallerIdentity, Operation};
use crate::protected::ProtectedIdentifierSet;
use crate::result::{ExecutionResult, RowSet};
use crate::traits::StatementRunner;
use crate::validator::validate_with;

/// Runs caller SQL through the gate and onto a routed connection.
pub struct QueryExecutor<R> {
    runner: R,
    protected: &'static ProtectedIdentifierSet,
    guard: IdentifierGuard,
}

impl<R: StatementRunner> QueryExecutor<R> {
    /// Executor over the standard protected set.
    pub fn new(runner: R) -> Self {
        Self::with_protected(runner, ProtectedIdentifierSet::standard())
    }

    /// Executor over an explicit protected set.
    pub fn with_protected(runner: R, protected: &'static ProtectedIdentifierSet) -> Self {
        Self {
            runner,
            protected,
            guard: IdentifierGuard::new(protected),
        }
    }

    /// The underlying runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Executes `sql` for `identity`.
    ///
    /// Rejections never reach the runner, so no connection is checked out for them.
    pub async fn execute(
        &self,
        sql: &str,
        identity: Option<&CallerIdentity>,
    ) -> SandboxResult<ExecutionResult> {
        let identity = identity.ok_or(SandboxError::AuthenticationRequired)?;
        let privileged = identity.role.is_privileged();
        let query_id = Uuid::new_v4();

        let outcome = validate_with(self.protected, sql, privileged);
        let normalized = match outcome.into_result() {
            Ok(normalized) => normalized,
            Err(reason) => {
                record_query_rejection(query_id, &identity.username, &reason);
                return Err(SandboxError::validation(reason));
            }
        };

        if !self.guard.is_allowed(&normalized, privileged) {
            record_query_rejection(query_id, &identity.username, "protected identifier");
            return Err(SandboxError::AccessDenied);
        }

        let select_like = is_select_like(&normalized);
        let target = route(identity.role, Operation::Query);
        debug!(
            query_id = %query_id,
            user = %identity.username,
            role = %identity.role,
            pool = %target,
            select_like,
            "executing statement"
        );

        let started = Instant::now();
        let raw = match self.runner.run(target, &normalized, select_like).await {
            Ok(raw) => raw,
            Err(err) => {
                match &err {
                    SandboxError::PoolExhausted { pool } => record_pool_exhausted(pool),
                    SandboxError::Execution(message) => {
                        record_query_failure(query_id, target.as_str(), started.elapsed(), message)
                    }
                    other => warn!(
                        query_id = %query_id,
                        user = %identity.username,
                        pool = %target,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %other.log_detail(),
                        "statement failed"
                    ),
                }
                return Err(err);
            }
        };

        let elapsed = raw.elapsed;
        let execution_time_ms = (elapsed.as_secs_f64() * 1000.0).round() as u64;
        let hierarchy_changed = is_schema_changing(&normalized);
        let rows = RowSet::from_raw(raw);
        record_query_latency(query_id, target.as_str(), elapsed, rows.rows().len());

        Ok(ExecutionResult::new(rows, execution_time_ms, hierarchy_changed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockStatementRunner;
    use crate::privilege::{PoolTarget, Privilege};
    use crate::result::RawRowSet;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn practice() -> CallerIdentity {
        CallerIdentity::new("learner", Privilege::Practice)
    }

    fn admin() -> CallerIdentity {
        CallerIdentity::new("teacher", Privilege::Admin)
    }

    #[tokio::test]
    async fn missing_identity_is_rejected_before_validation() {
        let executor = QueryExecutor::new(MockStatementRunner::new());
        let err = executor.execute("", None).await.unwrap_err();
        assert_eq!(err, SandboxError::AuthenticationRequired);
        assert!(executor.runner().calls().is_empty());
    }

    #[tokio::test]
    async fn protected_reference_is_rejected_without_a_connection() {
        let executor = QueryExecutor::new(MockStatementRunner::new());
        let err = executor
            .execute("SELECT * FROM protected.secrets", Some(&practice()))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SandboxError::validation("access to protected objects is denied")
        );
        assert_eq!(err.status_code(), 400);
        assert!(executor.runner().calls().is_empty());
    }

    #[tokio::test]
    async fn multiple_statements_never_reach_the_runner() {
        let executor = QueryExecutor::new(MockStatementRunner::new());
        let err = executor
            .execute("SELECT 1; DELETE FROM students", Some(&practice()))
            .await
            .unwrap_err();
        assert_eq!(err, SandboxError::validation("only single statements are allowed"));
        assert!(executor.runner().calls().is_empty());
    }

    #[tokio::test]
    async fn guard_denial_is_access_denied() {
        static NOTHING: ProtectedIdentifierSet = ProtectedIdentifierSet {
            schemas: &[],
            tables: &[],
            catalog_names: &[],
            safe_database_prefix: "sandbox",
        };
        // Validation sees an empty deny-list, so only the guard can refuse.
        let executor = QueryExecutor {
            runner: MockStatementRunner::new(),
            protected: &NOTHING,
            guard: IdentifierGuard::default(),
        };

        let err = executor
            .execute("SELECT * FROM playground.migrations", Some(&practice()))
            .await
            .unwrap_err();
        assert_eq!(err, SandboxError::AccessDenied);
        assert_eq!(err.to_string(), "access denied");
        assert!(executor.runner().calls().is_empty());

        executor
            .execute("SELECT * FROM playground.migrations", Some(&admin()))
            .await
            .expect("admin bypasses the guard");
        assert_eq!(executor.runner().calls().len(), 1);
    }

    #[tokio::test]
    async fn practice_and_admin_use_their_own_pools() {
        let executor = QueryExecutor::new(MockStatementRunner::new());
        executor
            .execute("SELECT * FROM students", Some(&practice()))
            .await
            .expect("practice query");
        executor
            .execute("SELECT * FROM pg_roles", Some(&admin()))
            .await
            .expect("admin query");

        let calls = executor.runner().calls();
        assert_eq!(calls[0].target, PoolTarget::Practice);
        assert_eq!(calls[1].target, PoolTarget::AdminSandbox);
        assert!(calls.iter().all(|c| c.select_like));
    }

    #[tokio::test]
    async fn runner_receives_normalized_sql() {
        let executor = QueryExecutor::new(MockStatementRunner::new());
        executor
            .execute("  UPDATE students SET age = 20 WHERE id = 1 ;", Some(&practice()))
            .await
            .expect("update");
        let call = &executor.runner().calls()[0];
        assert_eq!(call.sql, "UPDATE students SET age = 20 WHERE id = 1");
        assert!(!call.select_like);
    }

    #[tokio::test]
    async fn admin_drop_table_flags_hierarchy_change() {
        let runner = MockStatementRunner::new();
        runner.push_response(Ok(RawRowSet::default()));
        let executor = QueryExecutor::new(runner);
        let result = executor
            .execute("DROP TABLE students", Some(&admin()))
            .await
            .expect("drop");
        assert!(result.hierarchy_changed);
        assert_eq!(result.row_count, 0);
    }

    #[tokio::test]
    async fn timing_is_rounded_to_whole_milliseconds() {
        let executor = QueryExecutor::new(MockStatementRunner::new());
        let result = executor
            .execute("SELECT 1", Some(&practice()))
            .await
            .expect("select");
        assert_eq!(result.execution_time_ms, 2);
        assert!(!result.hierarchy_changed);
    }

    #[tokio::test]
    async fn reserved_fields_are_stripped() {
        let runner = MockStatementRunner::new();
        runner.push_response(Ok(RawRowSet {
            columns: vec!["_ctid".into(), "name".into()],
            rows: vec![vec![json!("(0,1)"), json!("Aarav Patel")]],
            row_count: 1,
            elapsed: Duration::from_millis(1),
        }));
        let executor = QueryExecutor::new(runner);
        let result = executor
            .execute("SELECT ctid AS _ctid, name FROM students", Some(&practice()))
            .await
            .expect("select");
        assert_eq!(result.fields, vec!["name".to_string()]);
        let json = serde_json::to_value(&result.rows).expect("serialize");
        assert_eq!(json, json!([{"name": "Aarav Patel"}]));
    }

    #[tokio::test]
    async fn database_errors_pass_through_as_execution() {
        let runner = MockStatementRunner::new();
        runner.push_response(Err(SandboxError::execution(
            "relation \"studnts\" does not exist",
        )));
        let executor = QueryExecutor::new(runner);
        let err = executor
            .execute("SELECT * FROM studnts", Some(&practice()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "relation \"studnts\" does not exist");
    }

    #[tokio::test]
    async fn pool_exhaustion_is_retriable() {
        let runner = MockStatementRunner::new();
        runner.push_response(Err(SandboxError::PoolExhausted { pool: "practice" }));
        let executor = QueryExecutor::new(runner);
        let err = executor
            .execute("SELECT 1", Some(&practice()))
            .await
            .unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(err.status_code(), 503);
    }

    #[tokio::test]
    async fn concurrent_calls_do_not_share_rows() {
        let executor = Arc::new(QueryExecutor::new(MockStatementRunner::new()));
        let mut handles = Vec::new();
        for i in 0..16 {
            let executor = Arc::clone(&executor);
            handles.push(tokio::spawn(async move {
                let sql = format!("SELECT {i} AS n");
                let result = executor
                    .execute(&sql, Some(&practice()))
                    .await
                    .expect("select");
                (sql, result)
            }));
        }
        for handle in handles {
            let (sql, result) = handle.await.expect("join");
            assert_eq!(result.rows.len(), 1);
            assert_eq!(result.rows[0].get("sql"), Some(&json!(sql)));
        }
        assert_eq!(executor.runner().calls().len(), 16);
    }
}
