//! Donation checkout.
//!
//! Creates the transaction record, builds the signed merchant reference, and
//! asks the tenant's gateway for a hosted-page redirect. The transaction is
//! persisted before the gateway is contacted so an inbound notification can
//! never reference a transaction we do not know about.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};

use crate::error::{AppError, AppErrorKind};
use crate::payments::amount;
use crate::payments::factory::GatewayFactory;
use crate::payments::reference::ReferenceCodec;
use crate::payments::types::{BillingFrequency, ChargeRequest, SubscriptionRequest};
use crate::tenants::TenantSettingsStore;
use crate::transactions::store::TransactionStore;
use crate::transactions::{Transaction, TransactionKind, TransactionStatus};

/// Inbound donation parameters, validated here.
#[derive(Debug, Clone)]
pub struct DonationRequest {
    pub amount: Decimal,
    pub item_name: String,
    pub item_description: Option<String>,
    pub return_url: String,
    pub cancel_url: String,
    pub payee_name: Option<String>,
    pub payee_email: Option<String>,
    /// Present for recurring donations.
    pub recurring: Option<RecurringSchedule>,
}

#[derive(Debug, Clone)]
pub struct RecurringSchedule {
    pub amount: Decimal,
    pub frequency: BillingFrequency,
    pub cycles: u32,
}

/// What the frontend needs to hand the donor over to the gateway.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub transaction_id: String,
    pub redirect_url: String,
    pub fields: Vec<(String, String)>,
}

pub struct CheckoutService {
    codec: ReferenceCodec,
    factory: Arc<GatewayFactory>,
    tenants: Arc<dyn TenantSettingsStore>,
    transactions: Arc<dyn TransactionStore>,
    /// Where the gateway posts notifications; platform-wide.
    notify_url: String,
}

impl CheckoutService {
    pub fn new(
        codec: ReferenceCodec,
        factory: Arc<GatewayFactory>,
        tenants: Arc<dyn TenantSettingsStore>,
        transactions: Arc<dyn TransactionStore>,
        notify_url: String,
    ) -> Self {
        Self {
            codec,
            factory,
            tenants,
            transactions,
            notify_url,
        }
    }

    #[instrument(skip(self, request))]
    pub async fn initiate_donation(
        &self,
        tenant_id: i64,
        request: DonationRequest,
    ) -> Result<CheckoutSession, AppError> {
        amount::validate_positive(request.amount, "amount")?;
        if request.item_name.trim().is_empty() {
            return Err(AppError::validation("item_name", "must not be empty"));
        }

        let tenant_config = self
            .tenants
            .payment_config(tenant_id)
            .await?
            .ok_or_else(|| AppError::new(AppErrorKind::TenantNotConfigured { tenant_id }))?;

        let gateway = self.factory.resolve(&tenant_config).ok_or_else(|| {
            AppError::new(AppErrorKind::GatewayUnavailable {
                provider: tenant_config
                    .provider
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "default".to_string()),
            })
        })?;

        let normalized = amount::normalize(request.amount);
        let kind = if request.recurring.is_some() {
            TransactionKind::Subscription
        } else {
            TransactionKind::Donation
        };
        let mut transaction = Transaction::new(
            tenant_id,
            request.item_name.clone(),
            kind,
            normalized,
            tenant_config.currency.clone(),
            request.payee_name.clone(),
            request.payee_email.clone(),
        );
        self.transactions.insert(&transaction).await?;

        let reference = self.codec.generate(tenant_id, &transaction.id);
        let charge = ChargeRequest {
            amount: normalized,
            currency: tenant_config.currency.clone(),
            item_name: request.item_name,
            item_description: request.item_description,
            merchant_reference: reference,
            return_url: request.return_url,
            cancel_url: request.cancel_url,
            notify_url: self.notify_url.clone(),
            payee_name: request.payee_name,
            payee_email: request.payee_email,
        };

        let response = match request.recurring {
            Some(schedule) => {
                gateway
                    .create_subscription(SubscriptionRequest {
                        charge,
                        recurring_amount: schedule.amount,
                        frequency: schedule.frequency,
                        cycles: schedule.cycles,
                    })
                    .await?
            }
            None => gateway.initiate_payment(charge).await?,
        };

        let response = response.ok_or_else(|| {
            AppError::new(AppErrorKind::GatewayUnavailable {
                provider: gateway.name().to_string(),
            })
        })?;

        transaction
            .mark_processing()
            .map_err(|e| AppError::internal(e.to_string()))?;
        self.transactions
            .update(&transaction, TransactionStatus::Pending)
            .await?;

        info!(
            tenant_id,
            transaction_id = %transaction.id,
            provider = %gateway.name(),
            "checkout session created"
        );

        Ok(CheckoutSession {
            transaction_id: transaction.id,
            redirect_url: response.redirect_url,
            fields: response.fields,
        })
    }
}
