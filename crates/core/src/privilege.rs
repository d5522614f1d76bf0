//! Caller identity, privilege and the pool routing rule.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Capability threaded through every core call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privilege {
    /// Full access to the isolated sandbox database.
    Admin,
    /// Confined to the playground schema.
    Practice,
}

impl Privilege {
    /// Whether protected objects may be referenced.
    pub fn is_privileged(self) -> bool {
        matches!(self, Privilege::Admin)
    }

    /// Role name as used by the auth collaborator.
    pub fn as_str(self) -> &'static str {
        match self {
            Privilege::Admin => "admin",
            Privilege::Practice => "practice",
        }
    }
}

impl fmt::Display for Privilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Privilege {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Privilege::Admin),
            "practice" => Ok(Privilege::Practice),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Already-authenticated caller, supplied by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Login name, used for logging only.
    pub username: String,
    /// Role claimed by the verified token.
    pub role: Privilege,
}

impl CallerIdentity {
    /// Create a new identity.
    pub fn new(username: impl Into<String>, role: Privilege) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }
}

/// The three isolated connection pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolTarget {
    /// Practice-scoped pool bound to the playground search path.
    Practice,
    /// Unscoped admin pool over the full database.
    Admin,
    /// Admin pool bound to the isolated sandbox database.
    AdminSandbox,
}

impl PoolTarget {
    /// Stable name used in logs and as the connection application name suffix.
    pub fn as_str(self) -> &'static str {
        match self {
            PoolTarget::Practice => "practice",
            PoolTarget::Admin => "admin",
            PoolTarget::AdminSandbox => "admin-sandbox",
        }
    }
}

impl fmt::Display for PoolTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of work a connection is acquired for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Running a caller statement.
    Query,
    /// Reading catalog metadata for the hierarchy.
    Introspect,
    /// Reset and other maintenance.
    Maintenance,
}

/// Picks the pool for `privilege` doing `operation`.
///
/// Practice callers always land on [`PoolTarget::Practice`]; admin callers never do.
pub fn route(privilege: Privilege, operation: Operation) -> PoolTarget {
    match (privilege, operation) {
        (Privilege::Practice, _) => PoolTarget::Practice,
        (Privilege::Admin, Operation::Maintenance) => PoolTarget::Admin,
        (Privilege::Admin, Operation::Query | Operation::Introspect) => PoolTarget::AdminSandbox,
    }
}
