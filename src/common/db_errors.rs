//! Database error categorisation
//!
//! Classifies `sea_orm::DbErr` values so callers can decide whether to retry
//! (order-list writes) or which status to answer with (HTTP handlers).
//!
//! ```rust
//! use portal::common::db_errors::DbErrorKind;
//! use sea_orm::DbErr;
//!
//! let err = DbErr::RecordNotFound("material 7".to_string());
//! assert_eq!(DbErrorKind::from_db_err(&err), DbErrorKind::NotFound);
//! ```

use sea_orm::DbErr;

/// Categories of database errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// Query returned no row where one was required
    NotFound,

    /// Unique constraint violation
    UniqueViolation,

    /// Foreign key constraint violation
    ForeignKeyViolation,

    /// Could not reach the database
    ConnectionError,

    /// Pool acquisition or statement timeout
    Timeout,

    /// SQLite refused a write lock (`database is locked` / `SQLITE_BUSY`)
    ///
    /// Another transaction holds the lock; retrying the whole transaction
    /// normally succeeds.
    Busy,

    /// Anything else
    Unknown,
}

impl DbErrorKind {
    pub fn from_db_err(err: &DbErr) -> Self {
        match err {
            DbErr::RecordNotFound(_) => Self::NotFound,
            DbErr::ConnectionAcquire(_) => Self::Timeout,
            DbErr::Conn(runtime) => {
                if runtime.to_string().to_lowercase().contains("timeout") {
                    Self::Timeout
                } else {
                    Self::ConnectionError
                }
            }
            other => Self::from_message(&other.to_string()),
        }
    }

    fn from_message(message: &str) -> Self {
        let msg_lower = message.to_lowercase();
        if msg_lower.contains("unique") || msg_lower.contains("duplicate") {
            Self::UniqueViolation
        } else if msg_lower.contains("foreign key") || msg_lower.contains("fk_") {
            Self::ForeignKeyViolation
        } else if msg_lower.contains("database is locked")
            || msg_lower.contains("busy")
            || msg_lower.contains("deadlock")
        {
            Self::Busy
        } else if msg_lower.contains("timeout") || msg_lower.contains("timed out") {
            Self::Timeout
        } else {
            Self::Unknown
        }
    }

    /// Transient errors that may succeed when the transaction is replayed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionError | Self::Timeout | Self::Busy)
    }
}

/// Format a database error with the operation that failed.
pub fn format_db_error(operation: &str, err: &DbErr) -> (DbErrorKind, String) {
    let kind = DbErrorKind::from_db_err(err);

    let message = match kind {
        DbErrorKind::NotFound => format!("{}: record not found", operation),
        DbErrorKind::UniqueViolation => format!("{}: duplicate key violation", operation),
        DbErrorKind::ForeignKeyViolation => {
            format!("{}: foreign key constraint violation", operation)
        }
        DbErrorKind::ConnectionError => format!("{}: database connection failed", operation),
        DbErrorKind::Timeout => format!("{}: query timeout", operation),
        DbErrorKind::Busy => format!("{}: database busy", operation),
        DbErrorKind::Unknown => format!("{}: database error - {}", operation, err),
    };

    (kind, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::RuntimeErr;

    fn query_err(message: &str) -> DbErr {
        DbErr::Query(RuntimeErr::Internal(message.to_string()))
    }

    #[test]
    fn test_categorize_record_not_found() {
        let err = DbErr::RecordNotFound("Material not found".to_string());
        let kind = DbErrorKind::from_db_err(&err);
        assert_eq!(kind, DbErrorKind::NotFound);
        assert!(!kind.is_retryable());
    }

    #[test]
    fn test_categorize_sqlite_locked() {
        let kind = DbErrorKind::from_db_err(&query_err("error returned from database: (code: 5) database is locked"));
        assert_eq!(kind, DbErrorKind::Busy);
        assert!(kind.is_retryable());
    }

    #[test]
    fn test_categorize_unique_violation() {
        let kind = DbErrorKind::from_db_err(&query_err("UNIQUE constraint failed: materials.unique_id"));
        assert_eq!(kind, DbErrorKind::UniqueViolation);
        assert!(!kind.is_retryable());
    }

    #[test]
    fn test_categorize_foreign_key_violation() {
        let err = DbErr::Exec(RuntimeErr::Internal("FOREIGN KEY constraint failed".to_string()));
        let kind = DbErrorKind::from_db_err(&err);
        assert_eq!(kind, DbErrorKind::ForeignKeyViolation);
        assert!(!kind.is_retryable());
    }

    #[test]
    fn test_categorize_connection_error() {
        let err = DbErr::Conn(RuntimeErr::Internal("Connection refused".to_string()));
        let kind = DbErrorKind::from_db_err(&err);
        assert_eq!(kind, DbErrorKind::ConnectionError);
        assert!(kind.is_retryable());
    }

    #[test]
    fn test_format_db_error() {
        let err = DbErr::RecordNotFound("Layer not found".to_string());
        let (kind, message) = format_db_error("find layer", &err);

        assert_eq!(kind, DbErrorKind::NotFound);
        assert_eq!(message, "find layer: record not found");
    }
}
