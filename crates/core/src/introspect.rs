//! Builds the [`SchemaHierarchy`] for a caller.

use std::time::Instant;

use tracing::warn;

use sqlsandbox_observability::record_introspection_latency;

use crate::error::{SandboxError, SandboxResult};
use crate::hierarchy::SchemaHierarchy;
use crate::privilege::{route, CallerIdentity, Operation};
use crate::protected::ProtectedIdentifierSet;
use crate::traits::CatalogReader;

/// Reads the playground schema's tables and columns.
pub struct HierarchyIntrospector<C> {
    reader: C,
    schema: String,
    protected: &'static ProtectedIdentifierSet,
}

impl<C: CatalogReader> HierarchyIntrospector<C> {
    /// Introspector over `schema` using the standard protected set.
    pub fn new(reader: C, schema: impl Into<String>) -> Self {
        Self {
            reader,
            schema: schema.into(),
            protected: ProtectedIdentifierSet::standard(),
        }
    }

    /// The underlying catalog reader.
    pub fn reader(&self) -> &C {
        &self.reader
    }

    /// Describes the playground schema from the caller's pool.
    ///
    /// Any backend failure becomes [`SandboxError::Introspection`]; checkout
    /// timeouts stay retriable.
    pub async fn describe(
        &self,
        identity: Option<&CallerIdentity>,
    ) -> SandboxResult<SchemaHierarchy> {
        let identity = identity.ok_or(SandboxError::AuthenticationRequired)?;
        let target = route(identity.role, Operation::Introspect);

        let started = Instant::now();
        let rows = self
            .reader
            .playground_columns(target, &self.schema, self.protected.tables)
            .await
            .map_err(|err| {
                warn!(
                    user = %identity.username,
                    pool = %target,
                    error = %err.log_detail(),
                    "hierarchy fetch failed"
                );
                match err {
                    SandboxError::PoolExhausted { .. } => err,
                    other => SandboxError::introspection(other.log_detail()),
                }
            })?;

        let hierarchy = SchemaHierarchy::from_catalog(rows, self.protected);
        record_introspection_latency(
            target.as_str(),
            started.elapsed(),
            hierarchy.table_names().count(),
        );
        Ok(hierarchy)
    }
}
