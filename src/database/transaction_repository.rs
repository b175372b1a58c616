use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};

use crate::database::error::DatabaseError;
use crate::payments::types::PaymentMethod;
use crate::transactions::store::{StoreError, TransactionStore};
use crate::transactions::{
    ProcessingLogEntry, Transaction, TransactionKind, TransactionStatus,
};

/// Row shape for the `transactions` table
#[derive(Debug, Clone, FromRow)]
struct TransactionRow {
    id: String,
    tenant_id: i64,
    name: String,
    kind: String,
    amount: Decimal,
    currency: String,
    amount_fee: Option<Decimal>,
    amount_net: Option<Decimal>,
    status: String,
    gateway_payment_id: Option<String>,
    payee_name: Option<String>,
    payee_email: Option<String>,
    payment_method: Option<String>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

/// Row shape for the `transaction_processing_log` table
#[derive(Debug, Clone, FromRow)]
struct LogRow {
    from_status: String,
    to_status: String,
    occurred_at: DateTime<Utc>,
}

/// Postgres-backed transaction store
pub struct PgTransactionStore {
    pool: PgPool,
}

impl PgTransactionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_transaction(
        row: TransactionRow,
        log_rows: Vec<LogRow>,
    ) -> Result<Transaction, StoreError> {
        let corrupt = |message: String| StoreError::Corrupt {
            transaction_id: row.id.clone(),
            message,
        };

        let kind = TransactionKind::parse_db_value(&row.kind)
            .ok_or_else(|| corrupt(format!("unknown kind: {}", row.kind)))?;
        let status = TransactionStatus::parse_db_value(&row.status)
            .ok_or_else(|| corrupt(format!("unknown status: {}", row.status)))?;
        let payment_method = match &row.payment_method {
            Some(value) => Some(
                PaymentMethod::parse_db_value(value)
                    .ok_or_else(|| corrupt(format!("unknown payment method: {}", value)))?,
            ),
            None => None,
        };

        let mut processing_log = Vec::with_capacity(log_rows.len());
        for log_row in log_rows {
            let from = TransactionStatus::parse_db_value(&log_row.from_status)
                .ok_or_else(|| corrupt(format!("unknown log status: {}", log_row.from_status)))?;
            let to = TransactionStatus::parse_db_value(&log_row.to_status)
                .ok_or_else(|| corrupt(format!("unknown log status: {}", log_row.to_status)))?;
            processing_log.push(ProcessingLogEntry {
                from,
                to,
                at: log_row.occurred_at,
            });
        }

        Ok(Transaction {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            kind,
            amount: row.amount,
            currency: row.currency,
            amount_fee: row.amount_fee,
            amount_net: row.amount_net,
            status,
            gateway_payment_id: row.gateway_payment_id,
            payee_name: row.payee_name,
            payee_email: row.payee_email,
            payment_method,
            completed_at: row.completed_at,
            created_at: row.created_at,
            processing_log,
        })
    }
}

#[async_trait]
impl TransactionStore for PgTransactionStore {
    async fn insert(&self, transaction: &Transaction) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DatabaseError::from_sqlx)?;

        sqlx::query(
            "INSERT INTO transactions
             (id, tenant_id, name, kind, amount, currency, amount_fee, amount_net,
              status, gateway_payment_id, payee_name, payee_email, payment_method,
              completed_at, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(&transaction.id)
        .bind(transaction.tenant_id)
        .bind(&transaction.name)
        .bind(transaction.kind.as_str())
        .bind(transaction.amount)
        .bind(&transaction.currency)
        .bind(transaction.amount_fee)
        .bind(transaction.amount_net)
        .bind(transaction.status.as_str())
        .bind(&transaction.gateway_payment_id)
        .bind(&transaction.payee_name)
        .bind(&transaction.payee_email)
        .bind(transaction.payment_method.map(|m| m.as_str()))
        .bind(transaction.completed_at)
        .bind(transaction.created_at)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        for entry in &transaction.processing_log {
            sqlx::query(
                "INSERT INTO transaction_processing_log
                 (transaction_id, from_status, to_status, occurred_at)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(&transaction.id)
            .bind(entry.from.as_str())
            .bind(entry.to.as_str())
            .bind(entry.at)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        }

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, tenant_id, name, kind, amount, currency, amount_fee, amount_net,
                    status, gateway_payment_id, payee_name, payee_email, payment_method,
                    completed_at, created_at
             FROM transactions
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let log_rows = sqlx::query_as::<_, LogRow>(
            "SELECT from_status, to_status, occurred_at
             FROM transaction_processing_log
             WHERE transaction_id = $1
             ORDER BY occurred_at ASC, id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Self::row_to_transaction(row, log_rows).map(Some)
    }

    async fn update(
        &self,
        transaction: &Transaction,
        expected_status: TransactionStatus,
    ) -> Result<bool, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(DatabaseError::from_sqlx)?;

        // Compare-and-set on status; a concurrent writer that already moved
        // the row leaves rows_affected at zero and we change nothing.
        let result = sqlx::query(
            "UPDATE transactions
             SET status = $3, amount_fee = $4, amount_net = $5,
                 gateway_payment_id = $6, payment_method = $7, completed_at = $8
             WHERE id = $1 AND status = $2",
        )
        .bind(&transaction.id)
        .bind(expected_status.as_str())
        .bind(transaction.status.as_str())
        .bind(transaction.amount_fee)
        .bind(transaction.amount_net)
        .bind(&transaction.gateway_payment_id)
        .bind(transaction.payment_method.map(|m| m.as_str()))
        .bind(transaction.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(false);
        }

        // Append log entries the table does not have yet.
        let persisted: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM transaction_processing_log WHERE transaction_id = $1",
        )
        .bind(&transaction.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        for entry in transaction.processing_log.iter().skip(persisted as usize) {
            sqlx::query(
                "INSERT INTO transaction_processing_log
                 (transaction_id, from_status, to_status, occurred_at)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(&transaction.id)
            .bind(entry.from.as_str())
            .bind(entry.to.as_str())
            .bind(entry.at)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;
        }

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(true)
    }
}
