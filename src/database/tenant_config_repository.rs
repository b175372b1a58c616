use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::warn;

use crate::database::error::DatabaseError;
use crate::payments::types::ProviderName;
use crate::tenants::{TenantPaymentConfig, TenantSettingsStore};
use crate::transactions::store::StoreError;

#[derive(Debug, Clone, FromRow)]
struct TenantConfigRow {
    tenant_id: i64,
    provider: Option<String>,
    merchant_id: String,
    api_key: String,
    api_secret: Option<String>,
    webhook_secret: Option<String>,
    is_test_mode: bool,
    currency: String,
}

/// Postgres-backed tenant payment settings
pub struct PgTenantSettings {
    pool: PgPool,
}

impl PgTenantSettings {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantSettingsStore for PgTenantSettings {
    async fn payment_config(
        &self,
        tenant_id: i64,
    ) -> Result<Option<TenantPaymentConfig>, StoreError> {
        let row = sqlx::query_as::<_, TenantConfigRow>(
            "SELECT tenant_id, provider, merchant_id, api_key, api_secret,
                    webhook_secret, is_test_mode, currency
             FROM tenant_payment_configs
             WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.map(|row| {
            // A provider name we no longer recognize falls back to the
            // platform default at resolution time.
            let provider = row.provider.as_deref().and_then(|name| {
                match ProviderName::from_str(name) {
                    Ok(provider) => Some(provider),
                    Err(_) => {
                        warn!(tenant_id, provider = name, "unrecognized provider in tenant config");
                        None
                    }
                }
            });
            TenantPaymentConfig {
                tenant_id: row.tenant_id,
                provider,
                merchant_id: row.merchant_id,
                api_key: row.api_key,
                api_secret: row.api_secret,
                webhook_secret: row.webhook_secret,
                is_test_mode: row.is_test_mode,
                currency: row.currency,
            }
        }))
    }
}
