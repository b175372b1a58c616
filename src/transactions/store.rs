use async_trait::async_trait;
use thiserror::Error;

use crate::transactions::{Transaction, TransactionStatus};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("storage unavailable: {message}")]
    Unavailable { message: String, retryable: bool },

    #[error("stored transaction {transaction_id} is corrupt: {message}")]
    Corrupt {
        transaction_id: String,
        message: String,
    },
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Unavailable { retryable, .. } => *retryable,
            StoreError::Corrupt { .. } => false,
        }
    }
}

/// Persistence seam for transactions.
///
/// `update` is compare-and-set on status: the write only lands when the
/// stored row still has `expected_status`, and the boolean says whether it
/// did. Concurrent notification deliveries race through this without locks.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn insert(&self, transaction: &Transaction) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Transaction>, StoreError>;

    async fn update(
        &self,
        transaction: &Transaction,
        expected_status: TransactionStatus,
    ) -> Result<bool, StoreError>;
}
