//! Error taxonomy shared by every sandbox operation.
//!
//! The validator and guard never produce these directly; they return structured
//! outcomes which the executor maps into [`SandboxError::Validation`] and
//! [`SandboxError::AccessDenied`]. Infrastructure failures carry a `detail` string for
//! logs, but their `Display` output stays generic so that database internals never
//! reach the caller. Only [`SandboxError::Execution`] forwards the database message,
//! because it describes the caller's own SQL.

use serde::Serialize;
use thiserror::Error;

/// Result type for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Phase of the reset procedure that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetStage {
    /// Dropping the playground tables.
    Drop,
    /// Recreating and reseeding the playground tables.
    Seed,
}

impl ResetStage {
    /// Caller-facing message for a failure in this stage.
    pub fn failure_message(self) -> &'static str {
        match self {
            ResetStage::Drop => "failed to reset sandbox",
            ResetStage::Seed => "sandbox reset incomplete due to seeding error",
        }
    }
}

/// Errors surfaced at the sandbox boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// Malformed or forbidden statement shape; always fixable by the caller.
    #[error("{0}")]
    Validation(String),

    /// Unprivileged reference to a protected object. Never names the identifier.
    #[error("access denied")]
    AccessDenied,

    /// No caller identity was supplied.
    #[error("authentication required")]
    AuthenticationRequired,

    /// The database rejected a policy-valid statement.
    #[error("{0}")]
    Execution(String),

    /// Pool checkout timed out; the caller may retry.
    #[error("database is busy, retry shortly")]
    PoolExhausted {
        /// Name of the exhausted pool
        pool: &'static str,
    },

    /// Reset failed in the given stage.
    #[error("{}", .stage.failure_message())]
    Reset {
        /// Stage that failed
        stage: ResetStage,
        /// Underlying failure, for logs only
        detail: String,
    },

    /// Catalog introspection failed.
    #[error("failed to fetch schema hierarchy")]
    Introspection {
        /// Underlying failure, for logs only
        detail: String,
    },

    /// Any other infrastructure failure.
    #[error("internal server error")]
    Internal {
        /// Underlying failure, for logs only
        detail: String,
    },
}

impl SandboxError {
    /// Create a validation error
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// Create an execution error carrying the database message
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution(message.into())
    }

    /// Create a reset error for the given stage
    pub fn reset(stage: ResetStage, detail: impl Into<String>) -> Self {
        Self::Reset {
            stage,
            detail: detail.into(),
        }
    }

    /// Create an introspection error
    pub fn introspection(detail: impl Into<String>) -> Self {
        Self::Introspection {
            detail: detail.into(),
        }
    }

    /// Create an internal error
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::Internal {
            detail: detail.into(),
        }
    }

    /// HTTP-equivalent status class for the boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            SandboxError::Validation(_) | SandboxError::Execution(_) => 400,
            SandboxError::AuthenticationRequired => 401,
            SandboxError::AccessDenied => 403,
            SandboxError::PoolExhausted { .. } => 503,
            SandboxError::Reset { .. }
            | SandboxError::Introspection { .. }
            | SandboxError::Internal { .. } => 500,
        }
    }

    /// Whether the same request may succeed if retried unchanged.
    pub fn is_retriable(&self) -> bool {
        matches!(self, SandboxError::PoolExhausted { .. })
    }

    /// Diagnostic text for logs. Includes details hidden from `Display`.
    pub fn log_detail(&self) -> String {
        match self {
            SandboxError::Reset { stage, detail } => format!("{stage:?} stage: {detail}"),
            SandboxError::Introspection { detail } | SandboxError::Internal { detail } => {
                detail.clone()
            }
            SandboxError::PoolExhausted { pool } => format!("checkout timed out on {pool} pool"),
            other => other.to_string(),
        }
    }
}

/// Boundary-shaped failure body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    /// Human-readable reason
    pub error: String,
    /// HTTP-equivalent status
    pub status: u16,
    /// Failed reset stage, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<ResetStage>,
}

impl From<&SandboxError> for ErrorResponse {
    fn from(err: &SandboxError) -> Self {
        let stage = match err {
            SandboxError::Reset { stage, .. } => Some(*stage),
            _ => None,
        };
        Self {
            error: err.to_string(),
            status: err.status_code(),
            stage,
        }
    }
}
