//! # Database and Engine Error Types
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← adds context and categorization               │
//! │       │                          CoreError (till-core)                 │
//! │       │                               │                                 │
//! │       └───────────┬───────────────────┘                                 │
//! │                   ▼                                                     │
//! │  LedgerError (this module) ← the engine boundary; every engine call    │
//! │       │                      returns this                               │
//! │       ▼                                                                 │
//! │  Caller maps ErrorCode → transport status (404/409/422/retry)          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;
use till_core::{CoreError, ValidationError};

// =============================================================================
// Database Error
// =============================================================================

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU
    /// - Opening a second session for a cashier (partial unique index)
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Lock wait exceeded the bounded busy timeout. The operation performed
    /// no partial writes and is safe to retry.
    #[error("Storage contention: {0}")]
    Contention(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Whether retrying the whole transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::Contention(_) | DbError::PoolExhausted)
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → constraint / busy analysis
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                // FK constraint: "FOREIGN KEY constraint failed"
                // Busy writer: "database is locked" / "database table is locked"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("database is locked")
                    || msg.contains("database table is locked")
                {
                    DbError::Contention(msg.to_string())
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Engine Boundary Error
// =============================================================================

/// Transport-agnostic classification of an engine failure.
///
/// Callers (HTTP shells, IPC commands) map these to their status codes;
/// the engines themselves never speak HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Malformed input; rejected before any transaction began. 400-class.
    Validation,
    /// Referenced entity does not exist. 404-class.
    NotFound,
    /// State-machine violation (already voided/closed/open). 409-class.
    /// Never retried automatically.
    Conflict,
    /// Not enough stock to cover a sale line. 409-class, names the product.
    InsufficientStock,
    /// Lock contention; safe to retry a bounded number of times.
    Contention,
    /// Everything else. 500-class.
    Internal,
}

/// The error type every engine call returns.
///
/// Either a business rule violation ([`CoreError`]) or a storage failure
/// ([`DbError`]); `code()` collapses both into the §transport taxonomy.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl LedgerError {
    /// Classifies the error for the caller's transport mapping.
    pub fn code(&self) -> ErrorCode {
        match self {
            LedgerError::Core(core) => match core {
                CoreError::Validation(_) => ErrorCode::Validation,
                CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                CoreError::ProductNotFound(_)
                | CoreError::OrderNotFound(_)
                | CoreError::SessionNotFound(_)
                | CoreError::PurchaseNotFound(_)
                | CoreError::LocationNotFound(_) => ErrorCode::NotFound,
                CoreError::AlreadyVoided { .. }
                | CoreError::AlreadyClosed { .. }
                | CoreError::SessionAlreadyOpen { .. }
                | CoreError::InvalidPurchaseState { .. } => ErrorCode::Conflict,
            },
            LedgerError::Db(db) => match db {
                DbError::NotFound { .. } => ErrorCode::NotFound,
                DbError::Contention(_) | DbError::PoolExhausted => ErrorCode::Contention,
                _ => ErrorCode::Internal,
            },
        }
    }

    /// Whether the failed transaction is safe to retry automatically.
    ///
    /// Only contention qualifies; state-machine conflicts are permanent.
    pub fn is_contention(&self) -> bool {
        self.code() == ErrorCode::Contention
    }
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::Core(CoreError::Validation(err))
    }
}

/// Result type for engine operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_codes() {
        let err: LedgerError = CoreError::AlreadyVoided {
            order_id: "o1".into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::Conflict);
        assert!(!err.is_contention());
    }

    #[test]
    fn test_contention_is_retryable() {
        let err: LedgerError = DbError::Contention("database is locked".into()).into();
        assert_eq!(err.code(), ErrorCode::Contention);
        assert!(err.is_contention());
    }

    #[test]
    fn test_validation_code() {
        let err: LedgerError = ValidationError::Required {
            field: "items".into(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::Validation);
    }
}
