use sqlsandbox_core::{CallerIdentity, Privilege};
use sqlsandbox_sql::{Sandbox, SandboxConfig};
use url::Url;

/// Schema the integration tests reset and query.
pub const TEST_SCHEMA: &str = "playground_it";

/// Sandbox whose three pools all point at the database in `dsn`.
pub fn sandbox_from_dsn(dsn: &str) -> Result<Sandbox, Box<dyn std::error::Error>> {
    sandbox_with(dsn, &[])
}

/// Like [`sandbox_from_dsn`], with extra configuration variables taking precedence.
pub fn sandbox_with(
    dsn: &str,
    overrides: &[(&str, &str)],
) -> Result<Sandbox, Box<dyn std::error::Error>> {
    let url = Url::parse(dsn)?;
    let database = url.path().trim_start_matches('/').to_string();

    let config = SandboxConfig::from_lookup(|key| {
        if let Some((_, value)) = overrides.iter().find(|(name, _)| *name == key) {
            return Some(value.to_string());
        }
        match key {
            "DB_PRACTICE_URL" | "DB_ADMIN_URL" => Some(dsn.to_string()),
            "SANDBOX_DB_NAME" => Some(database.clone()),
            "PLAYGROUND_SCHEMA" => Some(TEST_SCHEMA.to_string()),
            "POOL_MAX_CONNECTIONS" => Some("4".to_string()),
            _ => None,
        }
    })?;
    Ok(Sandbox::connect(&config)?)
}

pub fn admin() -> CallerIdentity {
    CallerIdentity::new("it-admin", Privilege::Admin)
}

pub fn learner() -> CallerIdentity {
    CallerIdentity::new("it-learner", Privilege::Practice)
}
