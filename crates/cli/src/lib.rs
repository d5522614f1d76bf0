//! Command handling behind the `sqlsandbox` binary.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use sqlsandbox_core::{is_allowed, validate, CallerIdentity, ErrorResponse, Privilege};
use sqlsandbox_sql::{Sandbox, SandboxConfig};

/// Top-level arguments.
#[derive(Parser, Debug)]
#[command(author, version, about = "SQL sandbox gatekeeper and reset tool")]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a statement offline, without touching the database.
    Check(CheckArgs),
    /// Validate and run a statement.
    Execute(ExecuteArgs),
    /// Print the playground schema hierarchy.
    Describe(IdentityArgs),
    /// Drop and reseed the playground schema.
    Reset(IdentityArgs),
}

/// Arguments for `check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Statement to check
    pub sql: String,
    /// Check as an admin caller
    #[arg(long)]
    pub admin: bool,
}

/// Caller identity flags.
#[derive(Args, Debug)]
pub struct IdentityArgs {
    /// Caller user name
    #[arg(long, env = "SANDBOX_USER")]
    pub user: String,
    /// Caller role: admin or practice
    #[arg(long, env = "SANDBOX_ROLE", default_value = "practice")]
    pub role: Privilege,
}

impl IdentityArgs {
    fn identity(&self) -> CallerIdentity {
        CallerIdentity::new(self.user.clone(), self.role)
    }
}

/// Arguments for `execute`.
#[derive(Args, Debug)]
pub struct ExecuteArgs {
    /// Statement to run
    pub sql: String,
    /// Caller identity
    #[command(flatten)]
    pub identity: IdentityArgs,
}

/// Offline verdict printed by `check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    /// Whether the statement would be sent to the database
    pub accepted: bool,
    /// Text that would run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized_sql: Option<String>,
    /// Why it would not run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// HTTP-equivalent status of the rejection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

/// Runs the validator and identifier guard the way the executor would.
pub fn check(sql: &str, admin: bool) -> CheckReport {
    match validate(sql, admin).into_result() {
        Err(reason) => CheckReport {
            accepted: false,
            normalized_sql: None,
            rejection_reason: Some(reason),
            status: Some(400),
        },
        Ok(normalized) if !is_allowed(&normalized, admin) => CheckReport {
            accepted: false,
            normalized_sql: None,
            rejection_reason: Some("access denied".to_string()),
            status: Some(403),
        },
        Ok(normalized) => CheckReport {
            accepted: true,
            normalized_sql: Some(normalized),
            rejection_reason: None,
            status: None,
        },
    }
}

/// What a command printed and whether it succeeded.
#[derive(Debug)]
pub struct CommandOutput {
    /// JSON body for stdout
    pub body: Value,
    /// Whether the process should exit successfully
    pub success: bool,
}

impl CommandOutput {
    fn ok<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            body: serde_json::to_value(value)?,
            success: true,
        })
    }

    fn failed<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self {
            body: serde_json::to_value(value)?,
            success: false,
        })
    }
}

/// Runs one command. Database commands build the pools from the environment and
/// close them before returning, whatever the outcome.
pub async fn run(command: Commands) -> Result<CommandOutput> {
    if let Commands::Check(args) = &command {
        return check_output(args);
    }

    let config = SandboxConfig::from_env().context("loading sandbox configuration")?;
    info!(config = ?config, "configuration loaded");
    let sandbox = Sandbox::connect(&config).context("building connection pools")?;

    let output = run_against(&sandbox, command).await;
    sandbox.shutdown().await;
    output
}

fn check_output(args: &CheckArgs) -> Result<CommandOutput> {
    let report = check(&args.sql, args.admin);
    if report.accepted {
        CommandOutput::ok(&report)
    } else {
        CommandOutput::failed(&report)
    }
}

async fn run_against(sandbox: &Sandbox, command: Commands) -> Result<CommandOutput> {
    match command {
        Commands::Check(args) => check_output(&args),
        Commands::Execute(args) => {
            let identity = args.identity.identity();
            match sandbox.execute(&args.sql, Some(&identity)).await {
                Ok(result) => CommandOutput::ok(&result),
                Err(err) => CommandOutput::failed(&ErrorResponse::from(&err)),
            }
        }
        Commands::Describe(args) => match sandbox.describe(Some(&args.identity())).await {
            Ok(hierarchy) => CommandOutput::ok(&hierarchy),
            Err(err) => CommandOutput::failed(&ErrorResponse::from(&err)),
        },
        Commands::Reset(args) => match sandbox.reset(Some(&args.identity())).await {
            Ok(()) => CommandOutput::ok(&serde_json::json!({ "reset": "complete" })),
            Err(err) => CommandOutput::failed(&ErrorResponse::from(&err)),
        },
    }
}
