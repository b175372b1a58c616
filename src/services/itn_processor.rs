//! Instant Transaction Notification processing.
//!
//! Runs every inbound gateway notification through a fixed pipeline: source
//! authentication, reference verification, tenant lookup, signature replay,
//! then a guarded state transition persisted with compare-and-set. The whole
//! pipeline is idempotent; redelivered notifications acknowledge without
//! changing anything.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::payments::amount;
use crate::payments::factory::GatewayFactory;
use crate::payments::providers::payfast::{self, ItnPayload, ItnStatus};
use crate::payments::reference::ReferenceCodec;
use crate::payments::types::VerifyRequest;
use crate::tenants::TenantSettingsStore;
use crate::transactions::store::{StoreError, TransactionStore};
use crate::transactions::{Transaction, TransactionStatus};

/// Why a notification was rejected. All of these are permanent: redelivering
/// the same notification can never succeed, so the endpoint still
/// acknowledges receipt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItnRejection {
    #[error("source address not in the gateway's notification ranges")]
    SourceIpNotAllowed,
    #[error("notification carries no merchant reference")]
    MissingReference,
    #[error("merchant reference failed verification")]
    InvalidReference,
    #[error("tenant {tenant_id} has no payment configuration")]
    TenantNotConfigured { tenant_id: i64 },
    #[error("no gateway available for tenant {tenant_id}")]
    GatewayUnavailable { tenant_id: i64 },
    #[error("notification carries no signature")]
    MissingSignature,
    #[error("notification signature does not verify")]
    SignatureMismatch,
    #[error("transaction {transaction_id} not found")]
    TransactionNotFound { transaction_id: String },
    #[error("transaction {transaction_id} is {current}, cannot apply {requested}")]
    StateConflict {
        transaction_id: String,
        current: TransactionStatus,
        requested: TransactionStatus,
    },
}

#[derive(Debug, Error)]
pub enum ItnError {
    /// Permanent rejection; acknowledge the delivery.
    #[error(transparent)]
    Rejected(#[from] ItnRejection),
    /// Transient storage failure; the gateway should redeliver.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItnOutcome {
    Processed {
        transaction_id: String,
        status: TransactionStatus,
    },
    /// The notification restated something already recorded.
    DuplicateIgnored { transaction_id: String },
}

pub struct ItnProcessor {
    codec: ReferenceCodec,
    factory: Arc<GatewayFactory>,
    /// Authoritative, uncached: a rotated passphrase must apply immediately.
    tenants: Arc<dyn TenantSettingsStore>,
    transactions: Arc<dyn TransactionStore>,
}

impl ItnProcessor {
    pub fn new(
        codec: ReferenceCodec,
        factory: Arc<GatewayFactory>,
        tenants: Arc<dyn TenantSettingsStore>,
        transactions: Arc<dyn TransactionStore>,
    ) -> Self {
        Self {
            codec,
            factory,
            tenants,
            transactions,
        }
    }

    #[instrument(skip(self, fields))]
    pub async fn handle(
        &self,
        source_ip: Option<&str>,
        fields: &[(String, String)],
    ) -> Result<ItnOutcome, ItnError> {
        let source = source_ip.unwrap_or("");
        if !payfast::is_ip_allowlisted(source) {
            warn!(source_ip = source, "notification from unlisted source");
            return Err(ItnRejection::SourceIpNotAllowed.into());
        }

        let payload = ItnPayload::from_fields(fields);

        let reference = payload
            .merchant_reference
            .as_deref()
            .ok_or(ItnRejection::MissingReference)?;
        let parsed = self.codec.parse(reference);
        if !parsed.is_valid {
            warn!("notification reference failed verification");
            return Err(ItnRejection::InvalidReference.into());
        }

        let tenant_config = self
            .tenants
            .payment_config(parsed.tenant_id)
            .await?
            .ok_or(ItnRejection::TenantNotConfigured {
                tenant_id: parsed.tenant_id,
            })?;
        // Without a webhook secret the signature commits to nothing a donor
        // could not compute themselves; treat the tenant as unconfigured.
        let has_secret = tenant_config
            .webhook_secret
            .as_deref()
            .is_some_and(|secret| !secret.trim().is_empty());
        if !has_secret {
            warn!(
                tenant_id = parsed.tenant_id,
                "tenant has no webhook secret, rejecting notification"
            );
            return Err(ItnRejection::TenantNotConfigured {
                tenant_id: parsed.tenant_id,
            }
            .into());
        }

        let signature = payload
            .signature
            .clone()
            .ok_or(ItnRejection::MissingSignature)?;
        let gateway =
            self.factory
                .resolve(&tenant_config)
                .ok_or(ItnRejection::GatewayUnavailable {
                    tenant_id: parsed.tenant_id,
                })?;
        let verification = gateway
            .verify_payment(VerifyRequest {
                fields: fields.to_vec(),
                signature,
            })
            .await
            .map_err(|e| {
                warn!(error = %e, "signature verification errored");
                ItnRejection::SignatureMismatch
            })?;
        match verification {
            Some(result) if result.valid => {}
            _ => {
                warn!(
                    tenant_id = parsed.tenant_id,
                    transaction_id = %parsed.transaction_id,
                    "notification signature rejected"
                );
                return Err(ItnRejection::SignatureMismatch.into());
            }
        }

        let mut transaction = self
            .transactions
            .find_by_id(&parsed.transaction_id)
            .await?
            .ok_or_else(|| ItnRejection::TransactionNotFound {
                transaction_id: parsed.transaction_id.clone(),
            })?;
        if transaction.tenant_id != parsed.tenant_id {
            warn!(
                transaction_id = %transaction.id,
                "reference tenant does not match stored transaction"
            );
            return Err(ItnRejection::InvalidReference.into());
        }

        let status = payload
            .status
            .clone()
            .unwrap_or_else(|| ItnStatus::Other(String::new()));
        let expected = transaction.status;

        let applied = self.apply_status(&mut transaction, &status, &payload)?;
        let target = match applied {
            Some(target) => target,
            None => {
                info!(
                    transaction_id = %transaction.id,
                    status = %transaction.status,
                    "duplicate notification ignored"
                );
                return Ok(ItnOutcome::DuplicateIgnored {
                    transaction_id: transaction.id,
                });
            }
        };

        let updated = self.transactions.update(&transaction, expected).await?;
        if !updated {
            // A concurrent delivery won the compare-and-set; treat ours as
            // the duplicate it is.
            info!(
                transaction_id = %transaction.id,
                "concurrent notification already applied"
            );
            return Ok(ItnOutcome::DuplicateIgnored {
                transaction_id: transaction.id,
            });
        }

        info!(
            tenant_id = transaction.tenant_id,
            transaction_id = %transaction.id,
            status = %target,
            "notification processed"
        );
        Ok(ItnOutcome::Processed {
            transaction_id: transaction.id,
            status: target,
        })
    }

    /// Apply the notification's status to the in-memory aggregate.
    ///
    /// Returns the resulting status, or `None` when the notification restates
    /// the current state and nothing should be written.
    fn apply_status(
        &self,
        transaction: &mut Transaction,
        status: &ItnStatus,
        payload: &ItnPayload,
    ) -> Result<Option<TransactionStatus>, ItnRejection> {
        let current = transaction.status;
        let transaction_id = transaction.id.clone();
        let conflict = move |requested: TransactionStatus| ItnRejection::StateConflict {
            transaction_id: transaction_id.clone(),
            current,
            requested,
        };

        match status {
            ItnStatus::Complete => {
                if current == TransactionStatus::Success {
                    return Ok(None);
                }
                // A completion can outrun our own checkout write.
                if current == TransactionStatus::Pending {
                    transaction
                        .mark_processing()
                        .map_err(|_| conflict(TransactionStatus::Success))?;
                }
                transaction
                    .mark_success(
                        payload.amount_fee.map(amount::normalize),
                        payload.amount_net.map(amount::normalize),
                        payload.payment_method,
                        payload.gateway_payment_id.clone(),
                    )
                    .map_err(|_| conflict(TransactionStatus::Success))?;
                Ok(Some(TransactionStatus::Success))
            }
            ItnStatus::Failed => {
                if current == TransactionStatus::Failed {
                    return Ok(None);
                }
                transaction
                    .mark_failed()
                    .map_err(|_| conflict(TransactionStatus::Failed))?;
                Ok(Some(TransactionStatus::Failed))
            }
            ItnStatus::Cancelled => {
                if current == TransactionStatus::Cancelled {
                    return Ok(None);
                }
                transaction
                    .mark_cancelled()
                    .map_err(|_| conflict(TransactionStatus::Cancelled))?;
                Ok(Some(TransactionStatus::Cancelled))
            }
            ItnStatus::Pending => {
                if current == TransactionStatus::Processing {
                    return Ok(None);
                }
                transaction
                    .mark_processing()
                    .map_err(|_| conflict(TransactionStatus::Processing))?;
                Ok(Some(TransactionStatus::Processing))
            }
            ItnStatus::Other(raw) => {
                if current == TransactionStatus::ManualReview {
                    return Ok(None);
                }
                warn!(
                    transaction_id = %transaction.id,
                    status = raw.as_str(),
                    "unrecognized payment status, routing to manual review"
                );
                transaction
                    .mark_manual_review()
                    .map_err(|_| conflict(TransactionStatus::ManualReview))?;
                Ok(Some(TransactionStatus::ManualReview))
            }
        }
    }
}
