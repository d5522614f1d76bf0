//! sqlsandbox-sql
//!
//! PostgreSQL backend for the SQL sandbox: environment configuration, the three
//! connection pools, and sqlx implementations of the core traits.

#![warn(missing_docs)]

mod catalog;
/// Environment-driven settings.
pub mod config;
mod engine;
mod error;
/// Pools and the direct connection factory.
pub mod router;
mod runner;
mod store;
/// TLS selection for connection URLs.
pub mod tls;
mod values;

pub use catalog::PgCatalogReader;
pub use config::{redact_url, ConfigError, SandboxConfig, DEFAULT_PLAYGROUND_SCHEMA};
pub use engine::Sandbox;
pub use router::ConnectionRouter;
pub use runner::PgStatementRunner;
pub use store::PgSandboxStore;
