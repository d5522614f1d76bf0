//! Maps sqlx failures onto the sandbox error taxonomy.

use sqlsandbox_core::{PoolTarget, SandboxError};

/// Failure while checking a connection out of `target`.
pub(crate) fn map_checkout_error(target: PoolTarget, err: sqlx::Error) -> SandboxError {
    match err {
        sqlx::Error::PoolTimedOut => SandboxError::PoolExhausted {
            pool: target.as_str(),
        },
        other => SandboxError::internal(format!("{target} pool checkout failed: {other}")),
    }
}

/// Failure while running caller SQL.
///
/// Only errors reported by the server carry the caller-visible message; transport
/// and decoding problems stay internal.
pub(crate) fn map_statement_error(err: sqlx::Error) -> SandboxError {
    match err {
        sqlx::Error::Database(db) => SandboxError::execution(db.message()),
        sqlx::Error::PoolTimedOut => SandboxError::internal("pool timed out mid-statement"),
        other => SandboxError::internal(format!("postgres query failed: {other}")),
    }
}

/// Any other database failure, kept for logs only.
pub(crate) fn map_db_error(err: sqlx::Error) -> SandboxError {
    SandboxError::internal(format!("postgres query failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_timeout_is_pool_exhaustion() {
        let err = map_checkout_error(PoolTarget::Practice, sqlx::Error::PoolTimedOut);
        assert_eq!(err, SandboxError::PoolExhausted { pool: "practice" });
    }

    #[test]
    fn closed_pool_is_internal() {
        let err = map_checkout_error(PoolTarget::AdminSandbox, sqlx::Error::PoolClosed);
        assert_eq!(err.status_code(), 500);
        assert!(err.log_detail().contains("admin-sandbox"));
    }

    #[test]
    fn transport_errors_do_not_leak() {
        let err = map_statement_error(sqlx::Error::Protocol("unexpected message".into()));
        assert_eq!(err.to_string(), "internal server error");
    }
}
