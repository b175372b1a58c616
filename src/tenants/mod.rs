//! Per-tenant payment configuration.
//!
//! Each tenant brings its own gateway credentials. The checkout path may read
//! through a short TTL cache; notification verification always goes to the
//! authoritative store so a rotated passphrase takes effect immediately.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::payments::types::ProviderName;
use crate::transactions::store::StoreError;

#[derive(Debug, Clone)]
pub struct TenantPaymentConfig {
    pub tenant_id: i64,
    pub provider: Option<ProviderName>,
    pub merchant_id: String,
    /// Provider-specific key; PayFast's merchant key.
    pub api_key: String,
    pub api_secret: Option<String>,
    /// Secret verifying inbound notifications; PayFast's passphrase.
    pub webhook_secret: Option<String>,
    pub is_test_mode: bool,
    pub currency: String,
}

#[async_trait]
pub trait TenantSettingsStore: Send + Sync {
    /// Look up a tenant's payment config. `None` means the tenant exists
    /// without payment setup, or not at all; callers treat both the same.
    async fn payment_config(
        &self,
        tenant_id: i64,
    ) -> Result<Option<TenantPaymentConfig>, StoreError>;
}

/// Read-through TTL cache over a settings store.
///
/// Only positive lookups are cached; a tenant configuring payments for the
/// first time is visible immediately.
pub struct CachedTenantSettings {
    inner: Arc<dyn TenantSettingsStore>,
    ttl: Duration,
    cache: RwLock<HashMap<i64, (Instant, TenantPaymentConfig)>>,
}

impl CachedTenantSettings {
    pub fn new(inner: Arc<dyn TenantSettingsStore>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl TenantSettingsStore for CachedTenantSettings {
    async fn payment_config(
        &self,
        tenant_id: i64,
    ) -> Result<Option<TenantPaymentConfig>, StoreError> {
        {
            let cache = self.cache.read().await;
            if let Some((cached_at, config)) = cache.get(&tenant_id) {
                if cached_at.elapsed() < self.ttl {
                    debug!(tenant_id, "tenant payment config cache hit");
                    return Ok(Some(config.clone()));
                }
            }
        }

        let config = self.inner.payment_config(tenant_id).await?;
        if let Some(config) = &config {
            let mut cache = self.cache.write().await;
            cache.insert(tenant_id, (Instant::now(), config.clone()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        calls: AtomicUsize,
        config: Option<TenantPaymentConfig>,
    }

    #[async_trait]
    impl TenantSettingsStore for CountingStore {
        async fn payment_config(
            &self,
            _tenant_id: i64,
        ) -> Result<Option<TenantPaymentConfig>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.config.clone())
        }
    }

    fn sample_config() -> TenantPaymentConfig {
        TenantPaymentConfig {
            tenant_id: 7,
            provider: Some(ProviderName::Payfast),
            merchant_id: "10000100".to_string(),
            api_key: "46f0cd694581a".to_string(),
            api_secret: None,
            webhook_secret: Some("secretphrase".to_string()),
            is_test_mode: true,
            currency: "ZAR".to_string(),
        }
    }

    #[tokio::test]
    async fn repeated_lookups_within_ttl_hit_cache() {
        let inner = Arc::new(CountingStore {
            calls: AtomicUsize::new(0),
            config: Some(sample_config()),
        });
        let cached = CachedTenantSettings::new(inner.clone(), Duration::from_secs(60));

        for _ in 0..3 {
            let config = cached
                .payment_config(7)
                .await
                .expect("lookup succeeds")
                .expect("tenant is configured");
            assert_eq!(config.merchant_id, "10000100");
        }
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn negative_lookups_are_not_cached() {
        let inner = Arc::new(CountingStore {
            calls: AtomicUsize::new(0),
            config: None,
        });
        let cached = CachedTenantSettings::new(inner.clone(), Duration::from_secs(60));

        assert!(cached.payment_config(9).await.expect("lookup").is_none());
        assert!(cached.payment_config(9).await.expect("lookup").is_none());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let inner = Arc::new(CountingStore {
            calls: AtomicUsize::new(0),
            config: Some(sample_config()),
        });
        let cached = CachedTenantSettings::new(inner.clone(), Duration::from_millis(0));

        cached.payment_config(7).await.expect("lookup");
        cached.payment_config(7).await.expect("lookup");
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
