//! Environment-driven configuration for the pools and the reset procedure.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use url::Url;

/// Errors raised while reading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be used.
    #[error("invalid value for {var}: {reason}")]
    Invalid {
        /// Variable name
        var: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

impl ConfigError {
    fn invalid(var: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            var,
            reason: reason.into(),
        }
    }
}

/// Default playground schema.
pub const DEFAULT_PLAYGROUND_SCHEMA: &str = "playground";

/// Settings for the three pools, the direct connection and the reseed grants.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SandboxConfig {
    /// Low-privilege connection URL
    #[serde(serialize_with = "serialize_redacted")]
    pub practice_url: Url,
    /// Admin connection URL
    #[serde(serialize_with = "serialize_redacted")]
    pub admin_url: Url,
    /// Database the admin-sandbox pool and reseed connection target
    pub sandbox_db_name: String,
    /// Schema practice users work in
    pub playground_schema: String,
    /// Role receiving read/write grants after reseeding
    pub practice_role: String,
    /// Upper bound on connections per pool
    pub max_connections: u32,
    /// Idle connections are closed after this long
    #[serde(serialize_with = "serialize_millis")]
    pub idle_timeout: Duration,
    /// Checkout and connect timeout
    #[serde(serialize_with = "serialize_millis")]
    pub connect_timeout: Duration,
    /// Server-side `statement_timeout` for pooled connections
    #[serde(serialize_with = "serialize_millis")]
    pub statement_timeout: Duration,
    /// Host suffixes that imply TLS when the URL has no `sslmode`
    pub tls_host_suffixes: Vec<String>,
}

impl std::fmt::Debug for SandboxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxConfig")
            .field("practice_url", &redact_url(&self.practice_url))
            .field("admin_url", &redact_url(&self.admin_url))
            .field("sandbox_db_name", &self.sandbox_db_name)
            .field("playground_schema", &self.playground_schema)
            .field("practice_role", &self.practice_role)
            .field("max_connections", &self.max_connections)
            .field("idle_timeout", &self.idle_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .field("tls_host_suffixes", &self.tls_host_suffixes)
            .finish()
    }
}

impl SandboxConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let practice_url = parse_url("DB_PRACTICE_URL", &required("DB_PRACTICE_URL")?)?;
        let admin_url = parse_url("DB_ADMIN_URL", &required("DB_ADMIN_URL")?)?;
        let sandbox_db_name = required("SANDBOX_DB_NAME")?.trim().to_string();

        let playground_schema = get("PLAYGROUND_SCHEMA")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_PLAYGROUND_SCHEMA.to_string());

        let practice_role = match get("PRACTICE_DB_ROLE") {
            Some(role) => role.trim().to_string(),
            None if !practice_url.username().is_empty() => practice_url.username().to_string(),
            None => {
                return Err(ConfigError::invalid(
                    "PRACTICE_DB_ROLE",
                    "unset and DB_PRACTICE_URL carries no user name",
                ))
            }
        };

        let max_connections = parse_number("POOL_MAX_CONNECTIONS", get("POOL_MAX_CONNECTIONS"), 10)?;
        if max_connections == 0 {
            return Err(ConfigError::invalid("POOL_MAX_CONNECTIONS", "must be at least 1"));
        }
        let idle_timeout = Duration::from_millis(parse_number(
            "POOL_IDLE_TIMEOUT_MS",
            get("POOL_IDLE_TIMEOUT_MS"),
            30_000,
        )?);
        let connect_timeout = Duration::from_millis(parse_number(
            "POOL_CONNECT_TIMEOUT_MS",
            get("POOL_CONNECT_TIMEOUT_MS"),
            5_000,
        )?);
        let statement_timeout = Duration::from_millis(parse_number(
            "STATEMENT_TIMEOUT_MS",
            get("STATEMENT_TIMEOUT_MS"),
            15_000,
        )?);

        let tls_host_suffixes = get("TLS_HOST_SUFFIXES")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().trim_start_matches('.').to_ascii_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec!["render.com".to_string()]);

        Ok(Self {
            practice_url,
            admin_url,
            sandbox_db_name,
            playground_schema,
            practice_role,
            max_connections,
            idle_timeout,
            connect_timeout,
            statement_timeout,
            tls_host_suffixes,
        })
    }

    /// Admin URL with its database path replaced by the sandbox database.
    pub fn sandbox_url(&self) -> Url {
        let mut url = self.admin_url.clone();
        url.set_path(&format!("/{}", self.sandbox_db_name));
        url
    }
}

fn parse_url(var: &'static str, raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|err| ConfigError::invalid(var, err.to_string()))?;
    match url.scheme() {
        "postgres" | "postgresql" => Ok(url),
        other => Err(ConfigError::invalid(
            var,
            format!("unsupported scheme '{other}'"),
        )),
    }
}

fn parse_number<T>(var: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|err: T::Err| ConfigError::invalid(var, err.to_string())),
        None => Ok(default),
    }
}

/// Renders `url` with its password replaced by `***`.
pub fn redact_url(url: &Url) -> String {
    let mut redacted = url.clone();
    if redacted.password().is_some() {
        // set_password only fails for URLs that cannot have credentials
        let _ = redacted.set_password(Some("***"));
    }
    redacted.to_string()
}

fn serialize_redacted<S: serde::Serializer>(url: &Url, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&redact_url(url))
}

fn serialize_millis<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
