//! # Database Error Types
//!
//! What repository calls return when they fail, and how each failure
//! maps onto the shared [`ErrorKind`] taxonomy.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          CoreError (medicare-core)         │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ◄──────────── DbError::Domain                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError::kind() → ErrorKind                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Presentation layer picks a message per kind                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every storage-level failure classifies as `TRANSACTION_FAILURE`: the
//! caller cannot tell whether a write happened and must re-read before
//! retrying.

use medicare_core::{CoreError, ErrorKind, ValidationError};
use thiserror::Error;

/// Everything a repository call can fail with.
#[derive(Debug, Error)]
pub enum DbError {
    /// No row with this id.
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    /// Business rule violation detected by the store.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// The schema's item reference check fired. Only reachable if a
    /// write bypassed the delete guard.
    #[error("Item still referenced: {message}")]
    ForeignKeyViolation { message: String },

    #[error("Could not open store: {0}")]
    ConnectionFailed(String),

    #[error("Schema migration failed: {0}")]
    MigrationFailed(String),

    /// A statement was rejected (constraint, trigger, locked database).
    #[error("Statement failed: {0}")]
    QueryFailed(String),

    /// Begin, commit or rollback failed, or a statement failed mid-transaction.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// No pooled connection became free within the acquire timeout.
    #[error("No store connection available")]
    PoolExhausted,

    #[error("Store error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::Domain(err) => err.kind(),
            DbError::ForeignKeyViolation { .. }
            | DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::TransactionFailed(_)
            | DbError::PoolExhausted
            | DbError::Internal(_) => ErrorKind::TransactionFailure,
        }
    }

    /// Rewraps storage failures raised inside a transaction.
    ///
    /// Domain errors and lookups keep their kind; anything the store itself
    /// reported becomes [`DbError::TransactionFailed`].
    pub fn in_transaction(self) -> Self {
        match self {
            DbError::NotFound { .. } | DbError::Domain(_) | DbError::TransactionFailed(_) => self,
            other => DbError::TransactionFailed(other.to_string()),
        }
    }
}

impl From<ValidationError> for DbError {
    fn from(err: ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

/// Storage failures from sqlx.
///
/// ```text
/// constraint: FOREIGN KEY      → ForeignKeyViolation
/// constraint / trigger / other → QueryFailed
/// PoolTimedOut                 → PoolExhausted
/// PoolClosed                   → ConnectionFailed
/// Io / Tls / Protocol / ...    → Internal
/// ```
///
/// `RowNotFound` never reaches here from the repositories: every lookup
/// uses `fetch_optional` and names the missing entity itself.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            let message = db_err.message().to_string();
            return if db_err.is_foreign_key_violation() {
                DbError::ForeignKeyViolation { message }
            } else {
                DbError::QueryFailed(message)
            };
        }

        match err {
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
