//! The three long-lived pools plus the direct connection factory.

use std::str::FromStr;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions};
use sqlx::{ConnectOptions, Postgres};
use tracing::{debug, info, warn};
use url::Url;

use sqlsandbox_core::{quote_ident, PoolTarget, SandboxError, SandboxResult};

use crate::config::{redact_url, ConfigError, SandboxConfig};
use crate::error::map_checkout_error;
use crate::tls::ssl_mode;

/// `application_name` of practice connections.
pub const PRACTICE_APPLICATION_NAME: &str = "sql-practice-app";
/// `application_name` of admin connections.
pub const ADMIN_APPLICATION_NAME: &str = "sql-practice-admin";
/// `application_name` of admin-sandbox connections.
pub const ADMIN_SANDBOX_APPLICATION_NAME: &str = "sql-practice-admin-sandbox";
/// `application_name` of the unpooled reseed connection.
pub const RESEED_APPLICATION_NAME: &str = "sql-practice-reseed";

/// Owns the practice, admin and admin-sandbox pools.
///
/// Pools connect lazily. A [`PoolConnection`] returns to its home pool when dropped,
/// so every checkout is released on every exit path.
#[derive(Debug)]
pub struct ConnectionRouter {
    practice: PgPool,
    admin: PgPool,
    admin_sandbox: PgPool,
    direct: PgConnectOptions,
    connect_timeout: Duration,
}

impl ConnectionRouter {
    /// Builds all three pools from `config`. No connection is opened yet.
    pub fn new(config: &SandboxConfig) -> Result<Self, ConfigError> {
        let sandbox_url = config.sandbox_url();

        let playground = Some(config.playground_schema.clone());

        let practice_options = connect_options(
            config,
            "DB_PRACTICE_URL",
            &config.practice_url,
            PRACTICE_APPLICATION_NAME,
        )?;
        let admin_options =
            connect_options(config, "DB_ADMIN_URL", &config.admin_url, ADMIN_APPLICATION_NAME)?;
        let sandbox_options = connect_options(
            config,
            "DB_ADMIN_URL",
            &sandbox_url,
            ADMIN_SANDBOX_APPLICATION_NAME,
        )?;
        let direct =
            connect_options(config, "DB_ADMIN_URL", &sandbox_url, RESEED_APPLICATION_NAME)?;

        let practice = build_pool(
            config,
            practice_options,
            PRACTICE_APPLICATION_NAME,
            playground.clone(),
        );
        let admin = build_pool(config, admin_options, ADMIN_APPLICATION_NAME, None);
        let admin_sandbox = build_pool(
            config,
            sandbox_options,
            ADMIN_SANDBOX_APPLICATION_NAME,
            playground,
        );

        info!(
            practice = %redact_url(&config.practice_url),
            admin = %redact_url(&config.admin_url),
            sandbox = %redact_url(&sandbox_url),
            max_connections = config.max_connections,
            "connection pools configured"
        );

        Ok(Self {
            practice,
            admin,
            admin_sandbox,
            direct,
            connect_timeout: config.connect_timeout,
        })
    }

    /// The pool behind `target`.
    pub fn pool(&self, target: PoolTarget) -> &PgPool {
        match target {
            PoolTarget::Practice => &self.practice,
            PoolTarget::Admin => &self.admin,
            PoolTarget::AdminSandbox => &self.admin_sandbox,
        }
    }

    /// Checks a connection out of `target`.
    ///
    /// A checkout timeout surfaces as [`SandboxError::PoolExhausted`].
    pub async fn acquire(&self, target: PoolTarget) -> SandboxResult<PoolConnection<Postgres>> {
        let conn = self
            .pool(target)
            .acquire()
            .await
            .map_err(|err| map_checkout_error(target, err))?;
        debug!(pool = %target, "acquired pooled connection");
        Ok(conn)
    }

    /// Opens an unpooled connection to the sandbox database.
    ///
    /// The caller owns the connection and must close it.
    pub async fn direct_connection(&self) -> SandboxResult<PgConnection> {
        info!(application_name = RESEED_APPLICATION_NAME, "opening direct connection");
        match tokio::time::timeout(self.connect_timeout, self.direct.connect()).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(err)) => Err(SandboxError::internal(format!(
                "direct connection failed: {err}"
            ))),
            Err(_) => Err(SandboxError::internal(format!(
                "direct connection timed out after {:?}",
                self.connect_timeout
            ))),
        }
    }

    /// Closes every pool, waiting for checked-out connections to come back.
    pub async fn shutdown(&self) {
        info!("shutting down connection pools");
        tokio::join!(
            self.practice.close(),
            self.admin.close(),
            self.admin_sandbox.close()
        );
        info!("connection pools closed");
    }

    /// Whether [`shutdown`](Self::shutdown) has run.
    pub fn is_closed(&self) -> bool {
        self.practice.is_closed() && self.admin.is_closed() && self.admin_sandbox.is_closed()
    }
}

fn connect_options(
    config: &SandboxConfig,
    var: &'static str,
    url: &Url,
    application_name: &str,
) -> Result<PgConnectOptions, ConfigError> {
    let options = PgConnectOptions::from_str(url.as_str()).map_err(|err| ConfigError::Invalid {
        var,
        reason: err.to_string(),
    })?;
    Ok(options
        .application_name(application_name)
        .ssl_mode(ssl_mode(url, &config.tls_host_suffixes))
        .options([(
            "statement_timeout",
            config.statement_timeout.as_millis().to_string(),
        )])
        .disable_statement_logging())
}

fn build_pool(
    config: &SandboxConfig,
    options: PgConnectOptions,
    application_name: &'static str,
    search_path: Option<String>,
) -> PgPool {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .idle_timeout(config.idle_timeout)
        .acquire_timeout(config.connect_timeout)
        .after_connect(move |conn, _meta| {
            let search_path = search_path.clone();
            Box::pin(async move {
                debug!(application_name, "pool connection established");
                if let Some(schema) = search_path {
                    let stmt = format!("SET search_path TO {}", quote_ident(&schema));
                    match sqlx::query(&stmt).execute(&mut *conn).await {
                        Ok(_) => {
                            debug!(application_name, search_path = %schema, "applied search_path")
                        }
                        Err(err) => warn!(
                            application_name,
                            search_path = %schema,
                            error = %err,
                            "failed to apply search_path"
                        ),
                    }
                }
                Ok(())
            })
        })
        .connect_lazy_with(options)
}
