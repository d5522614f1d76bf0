//! sqlsandbox-core
//!
//! Database-free core of the SQL sandbox: the lexical statement gate, the
//! protected identifier guard, pool routing, and the executor, resetter and
//! introspector that drive a backend through the traits in [`traits`].

#![warn(missing_docs)]

mod classify;
mod error;
mod executor;
mod guard;
mod hierarchy;
mod introspect;
mod lexer;
mod privilege;
mod protected;
mod reset;
mod result;
mod seed;
pub mod traits;
mod validator;

#[cfg(test)]
mod mocks;

pub use classify::{is_schema_changing, is_select_like};
pub use error::{ErrorResponse, ResetStage, SandboxError, SandboxResult};
pub use executor::QueryExecutor;
pub use guard::{is_allowed, IdentifierGuard};
pub use hierarchy::{CatalogColumn, ColumnInfo, SchemaHierarchy, TableInfo};
pub use introspect::HierarchyIntrospector;
pub use privilege::{route, CallerIdentity, Operation, PoolTarget, Privilege};
pub use protected::ProtectedIdentifierSet;
pub use reset::{ResetPhase, SandboxResetter};
pub use result::{ExecutionResult, RawRowSet, Row, RowSet, RESERVED_FIELD_PREFIX};
pub use seed::{quote_ident, SeedPlan, SeedTable, SeedValue, SEED_TABLES};
pub use traits::{CatalogReader, SandboxStore, StatementRunner};
pub use validator::{
    validate, validate_with, ValidationOutcome, ALLOWED_LEADING_KEYWORDS, BLOCKED_PHRASES,
};
