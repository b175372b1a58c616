use thiserror::Error;

use crate::transactions::store::StoreError;

#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
}

#[derive(Debug, Clone, Error)]
pub enum DatabaseErrorKind {
    #[error("Connection failure: {message}")]
    ConnectionFailure { message: String },

    #[error("Query failure: {message}")]
    QueryFailure { message: String },

    #[error("Row decode failure: {message}")]
    RowDecode { message: String },
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn from_sqlx(error: sqlx::Error) -> Self {
        let kind = match &error {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => DatabaseErrorKind::ConnectionFailure {
                message: error.to_string(),
            },
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DatabaseErrorKind::RowDecode {
                    message: error.to_string(),
                }
            }
            _ => DatabaseErrorKind::QueryFailure {
                message: error.to_string(),
            },
        };
        Self { kind }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, DatabaseErrorKind::ConnectionFailure { .. })
    }
}

impl From<DatabaseError> for StoreError {
    fn from(error: DatabaseError) -> Self {
        let retryable = error.is_retryable();
        StoreError::Unavailable {
            message: error.to_string(),
            retryable,
        }
    }
}
