//! In-memory fakes of the backend traits for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{SandboxError, SandboxResult};
use crate::hierarchy::CatalogColumn;
use crate::privilege::PoolTarget;
use crate::result::RawRowSet;
use crate::seed::SeedPlan;
use crate::traits::{CatalogReader, SandboxStore, StatementRunner};

/// A statement the mock runner received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Pool the statement was routed to
    pub target: PoolTarget,
    /// Normalized SQL
    pub sql: String,
    /// Select-like label passed along
    pub select_like: bool,
}

/// Mock statement runner.
///
/// Replays queued responses in order; when the queue is empty it echoes the SQL
/// back as a single `sql` column.
#[derive(Clone, Default)]
pub struct MockStatementRunner {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    responses: Arc<Mutex<VecDeque<SandboxResult<RawRowSet>>>>,
}

impl MockStatementRunner {
    /// Create a new mock runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next response.
    pub fn push_response(&self, response: SandboxResult<RawRowSet>) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatementRunner for MockStatementRunner {
    async fn run(
        &self,
        target: PoolTarget,
        sql: &str,
        select_like: bool,
    ) -> SandboxResult<RawRowSet> {
        self.calls.lock().unwrap().push(RecordedCall {
            target,
            sql: sql.to_string(),
            select_like,
        });
        let queued = self.responses.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| {
            Ok(RawRowSet {
                columns: vec!["sql".to_string()],
                rows: vec![vec![Value::String(sql.to_string())]],
                row_count: 1,
                elapsed: Duration::from_micros(1_600),
            })
        })
    }
}

/// Mock sandbox store tracking which tables exist.
#[derive(Clone)]
pub struct MockSandboxStore {
    tables: Arc<Mutex<Vec<String>>>,
    fail_drop: Arc<Mutex<Option<String>>>,
    fail_seed: Arc<Mutex<Option<String>>>,
    drops: Arc<Mutex<usize>>,
    seeds: Arc<Mutex<Vec<SeedPlan>>>,
}

impl MockSandboxStore {
    /// Store with the given tables already present.
    pub fn with_tables(tables: &[&str]) -> Self {
        Self {
            tables: Arc::new(Mutex::new(tables.iter().map(|t| t.to_string()).collect())),
            fail_drop: Arc::new(Mutex::new(None)),
            fail_seed: Arc::new(Mutex::new(None)),
            drops: Arc::new(Mutex::new(0)),
            seeds: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Make the next drop phase fail.
    pub fn fail_drop_with(&self, message: &str) {
        *self.fail_drop.lock().unwrap() = Some(message.to_string());
    }

    /// Make the next seed phase fail.
    pub fn fail_seed_with(&self, message: &str) {
        *self.fail_seed.lock().unwrap() = Some(message.to_string());
    }

    /// Tables currently present.
    pub fn tables(&self) -> Vec<String> {
        self.tables.lock().unwrap().clone()
    }

    /// Number of drop phases attempted.
    pub fn drop_calls(&self) -> usize {
        *self.drops.lock().unwrap()
    }

    /// Plans passed to `reseed`.
    pub fn seed_calls(&self) -> Vec<SeedPlan> {
        self.seeds.lock().unwrap().clone()
    }
}

#[async_trait]
impl SandboxStore for MockSandboxStore {
    async fn drop_schema_tables(&self, _schema: &str) -> SandboxResult<usize> {
        *self.drops.lock().unwrap() += 1;
        if let Some(message) = self.fail_drop.lock().unwrap().take() {
            return Err(SandboxError::internal(message));
        }
        let mut tables = self.tables.lock().unwrap();
        let dropped = tables.len();
        tables.clear();
        Ok(dropped)
    }

    async fn reseed(&self, plan: &SeedPlan) -> SandboxResult<()> {
        self.seeds.lock().unwrap().push(plan.clone());
        if let Some(message) = self.fail_seed.lock().unwrap().take() {
            return Err(SandboxError::internal(message));
        }
        let mut tables = self.tables.lock().unwrap();
        for table in plan.tables() {
            if !tables.iter().any(|t| t == table.name) {
                tables.push(table.name.to_string());
            }
        }
        Ok(())
    }
}

/// Mock catalog returning fixed rows, filtered like the real query.
#[derive(Clone, Default)]
pub struct MockCatalogReader {
    rows: Arc<Mutex<Vec<CatalogColumn>>>,
    targets: Arc<Mutex<Vec<PoolTarget>>>,
    failure: Arc<Mutex<Option<String>>>,
}

impl MockCatalogReader {
    /// Reader serving `rows`.
    pub fn with_rows(rows: Vec<CatalogColumn>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows)),
            ..Self::default()
        }
    }

    /// Make every read fail.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    /// Pools that were read from.
    pub fn targets(&self) -> Vec<PoolTarget> {
        self.targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogReader for MockCatalogReader {
    async fn playground_columns(
        &self,
        target: PoolTarget,
        schema: &str,
        excluded_tables: &[&str],
    ) -> SandboxResult<Vec<CatalogColumn>> {
        self.targets.lock().unwrap().push(target);
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(SandboxError::internal(message));
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.schema_name == schema)
            .filter(|row| !excluded_tables.contains(&row.table_name.as_str()))
            .cloned()
            .collect())
    }
}
