//! Transaction aggregate and its status state machine.
//!
//! Every money movement on the platform is a `Transaction`. Status changes go
//! through the named transition methods, which enforce the machine and append
//! to the processing log; fields written on completion are write-once.

pub mod store;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::payments::types::PaymentMethod;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Donation,
    Subscription,
    ApplicationFee,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Donation => "donation",
            TransactionKind::Subscription => "subscription",
            TransactionKind::ApplicationFee => "application_fee",
        }
    }

    pub fn parse_db_value(value: &str) -> Option<Self> {
        match value {
            "donation" => Some(TransactionKind::Donation),
            "subscription" => Some(TransactionKind::Subscription),
            "application_fee" => Some(TransactionKind::ApplicationFee),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Cancelled,
    ManualReview,
    Refunded,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Processing => "processing",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Cancelled => "cancelled",
            TransactionStatus::ManualReview => "manual_review",
            TransactionStatus::Refunded => "refunded",
        }
    }

    pub fn parse_db_value(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TransactionStatus::Pending),
            "processing" => Some(TransactionStatus::Processing),
            "success" => Some(TransactionStatus::Success),
            "failed" => Some(TransactionStatus::Failed),
            "cancelled" => Some(TransactionStatus::Cancelled),
            "manual_review" => Some(TransactionStatus::ManualReview),
            "refunded" => Some(TransactionStatus::Refunded),
            _ => None,
        }
    }

    /// States this status may move to.
    pub fn valid_transitions(&self) -> &'static [TransactionStatus] {
        use TransactionStatus::*;
        match self {
            Pending => &[Processing, Failed, Cancelled],
            Processing => &[Success, Failed, Cancelled, ManualReview],
            Success => &[Refunded],
            ManualReview => &[Success, Failed, Refunded],
            Failed | Cancelled | Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, next: TransactionStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Failed | TransactionStatus::Cancelled | TransactionStatus::Refunded
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid status transition {from} -> {to} for transaction {transaction_id}")]
pub struct InvalidTransition {
    pub transaction_id: String,
    pub from: TransactionStatus,
    pub to: TransactionStatus,
}

/// One entry per status change, in order of occurrence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessingLogEntry {
    pub from: TransactionStatus,
    pub to: TransactionStatus,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub tenant_id: i64,
    pub name: String,
    pub kind: TransactionKind,
    /// Requested gross amount. Immutable after creation.
    pub amount: Decimal,
    pub currency: String,
    /// Gateway-reported fee, set once on completion.
    pub amount_fee: Option<Decimal>,
    /// Gateway-reported net, set once on completion.
    pub amount_net: Option<Decimal>,
    pub status: TransactionStatus,
    pub gateway_payment_id: Option<String>,
    pub payee_name: Option<String>,
    pub payee_email: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub processing_log: Vec<ProcessingLogEntry>,
}

impl Transaction {
    pub fn new(
        tenant_id: i64,
        name: String,
        kind: TransactionKind,
        amount: Decimal,
        currency: String,
        payee_name: Option<String>,
        payee_email: Option<String>,
    ) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            tenant_id,
            name,
            kind,
            amount,
            currency,
            amount_fee: None,
            amount_net: None,
            status: TransactionStatus::Pending,
            gateway_payment_id: None,
            payee_name,
            payee_email,
            payment_method: None,
            completed_at: None,
            created_at: Utc::now(),
            processing_log: Vec::new(),
        }
    }

    fn transition(&mut self, to: TransactionStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(to) {
            return Err(InvalidTransition {
                transaction_id: self.id.clone(),
                from: self.status,
                to,
            });
        }
        self.processing_log.push(ProcessingLogEntry {
            from: self.status,
            to,
            at: Utc::now(),
        });
        self.status = to;
        Ok(())
    }

    pub fn mark_processing(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TransactionStatus::Processing)
    }

    /// Complete the transaction, recording what the gateway reported.
    /// Completion fields are write-once; a value already present is kept.
    pub fn mark_success(
        &mut self,
        amount_fee: Option<Decimal>,
        amount_net: Option<Decimal>,
        payment_method: Option<PaymentMethod>,
        gateway_payment_id: Option<String>,
    ) -> Result<(), InvalidTransition> {
        self.transition(TransactionStatus::Success)?;
        if self.amount_fee.is_none() {
            self.amount_fee = amount_fee;
        }
        if self.amount_net.is_none() {
            self.amount_net = amount_net;
        }
        if self.payment_method.is_none() {
            self.payment_method = payment_method;
        }
        if self.gateway_payment_id.is_none() {
            self.gateway_payment_id = gateway_payment_id;
        }
        if self.completed_at.is_none() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    pub fn mark_failed(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TransactionStatus::Failed)
    }

    pub fn mark_cancelled(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TransactionStatus::Cancelled)
    }

    pub fn mark_manual_review(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TransactionStatus::ManualReview)
    }

    pub fn mark_refunded(&mut self) -> Result<(), InvalidTransition> {
        self.transition(TransactionStatus::Refunded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn donation() -> Transaction {
        Transaction::new(
            7,
            "Winter appeal".to_string(),
            TransactionKind::Donation,
            Decimal::new(15000, 2),
            "ZAR".to_string(),
            Some("Thandi".to_string()),
            None,
        )
    }

    #[test]
    fn new_transactions_start_pending_with_ulid_ids() {
        let tx = donation();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.id.len(), 26);
        assert!(tx.id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(tx.processing_log.is_empty());
        assert!(tx.completed_at.is_none());
    }

    #[test]
    fn happy_path_logs_every_transition() {
        let mut tx = donation();
        tx.mark_processing().expect("pending -> processing");
        tx.mark_success(
            Some(Decimal::new(-450, 2)),
            Some(Decimal::new(14550, 2)),
            Some(PaymentMethod::Eft),
            Some("1089250".to_string()),
        )
        .expect("processing -> success");

        assert_eq!(tx.status, TransactionStatus::Success);
        assert_eq!(tx.amount_net, Some(Decimal::new(14550, 2)));
        assert_eq!(tx.payment_method, Some(PaymentMethod::Eft));
        assert!(tx.completed_at.is_some());
        assert_eq!(tx.processing_log.len(), 2);
        assert_eq!(tx.processing_log[0].from, TransactionStatus::Pending);
        assert_eq!(tx.processing_log[1].to, TransactionStatus::Success);
    }

    #[test]
    fn completion_fields_are_write_once() {
        let mut tx = donation();
        tx.mark_processing().expect("pending -> processing");
        tx.mark_success(Some(Decimal::new(-450, 2)), Some(Decimal::new(14550, 2)), None, None)
            .expect("processing -> success");
        let first_completed_at = tx.completed_at;

        tx.mark_refunded().expect("success -> refunded");
        assert_eq!(tx.amount_net, Some(Decimal::new(14550, 2)));
        assert_eq!(tx.completed_at, first_completed_at);
    }

    #[test]
    fn success_from_pending_is_rejected() {
        let mut tx = donation();
        let err = tx
            .mark_success(None, None, None, None)
            .expect_err("pending cannot complete directly");
        assert_eq!(err.from, TransactionStatus::Pending);
        assert_eq!(err.to, TransactionStatus::Success);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.processing_log.is_empty());
    }

    #[test]
    fn terminal_states_accept_nothing() {
        let mut tx = donation();
        tx.mark_processing().expect("pending -> processing");
        tx.mark_failed().expect("processing -> failed");
        assert!(tx.status.is_terminal());
        assert!(tx.mark_processing().is_err());
        assert!(tx.mark_success(None, None, None, None).is_err());
        assert!(tx.mark_refunded().is_err());
    }

    #[test]
    fn refund_only_from_success() {
        let mut tx = donation();
        assert!(tx.mark_refunded().is_err());
        tx.mark_processing().expect("pending -> processing");
        assert!(tx.mark_refunded().is_err());
        tx.mark_success(None, None, None, None)
            .expect("processing -> success");
        assert!(tx.mark_refunded().is_ok());
    }

    #[test]
    fn manual_review_can_resolve_either_way() {
        let mut tx = donation();
        tx.mark_processing().expect("pending -> processing");
        tx.mark_manual_review().expect("processing -> manual review");
        assert!(!tx.status.is_terminal());
        assert!(tx.mark_success(None, None, None, None).is_ok());
    }

    #[test]
    fn status_db_round_trip() {
        for status in [
            TransactionStatus::Pending,
            TransactionStatus::Processing,
            TransactionStatus::Success,
            TransactionStatus::Failed,
            TransactionStatus::Cancelled,
            TransactionStatus::ManualReview,
            TransactionStatus::Refunded,
        ] {
            assert_eq!(TransactionStatus::parse_db_value(status.as_str()), Some(status));
        }
        assert_eq!(TransactionStatus::parse_db_value("unknown"), None);
    }
}
