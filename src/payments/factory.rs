//! Gateway construction from per-tenant configuration.
//!
//! Tenants carry their own gateway credentials, so gateways are built per
//! request from the tenant's stored config rather than once at startup. The
//! factory holds a registry of builders keyed by provider name; resolution
//! falls back to the platform default when a tenant names no provider or an
//! unregistered one.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::payments::error::PaymentResult;
use crate::payments::provider::PaymentGateway;
use crate::payments::types::ProviderName;
use crate::tenants::TenantPaymentConfig;

type GatewayBuilder =
    Box<dyn Fn(&TenantPaymentConfig) -> PaymentResult<Arc<dyn PaymentGateway>> + Send + Sync>;

pub struct GatewayFactory {
    registry: HashMap<ProviderName, GatewayBuilder>,
    default_provider: ProviderName,
}

impl GatewayFactory {
    pub fn new(default_provider: ProviderName) -> Self {
        Self {
            registry: HashMap::new(),
            default_provider,
        }
    }

    pub fn register<F>(&mut self, provider: ProviderName, builder: F)
    where
        F: Fn(&TenantPaymentConfig) -> PaymentResult<Arc<dyn PaymentGateway>>
            + Send
            + Sync
            + 'static,
    {
        self.registry.insert(provider, Box::new(builder));
    }

    /// Build a gateway for the tenant's configured provider.
    ///
    /// Falls back to the default provider when the tenant names none or an
    /// unregistered one; returns `None` only when the default itself is
    /// unregistered or construction fails.
    pub fn resolve(&self, config: &TenantPaymentConfig) -> Option<Arc<dyn PaymentGateway>> {
        let requested = config.provider.unwrap_or(self.default_provider);
        let builder = match self.registry.get(&requested) {
            Some(b) => b,
            None => {
                warn!(
                    tenant_id = config.tenant_id,
                    provider = %requested,
                    fallback = %self.default_provider,
                    "provider not registered, falling back to default"
                );
                self.registry.get(&self.default_provider)?
            }
        };

        match builder(config) {
            Ok(gateway) => Some(gateway),
            Err(error) => {
                warn!(
                    tenant_id = config.tenant_id,
                    provider = %requested,
                    error = %error,
                    "gateway construction failed"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::error::PaymentError;
    use crate::payments::types::{
        CancelSubscriptionRequest, CancelSubscriptionResponse, ChargeRequest, ChargeResponse,
        RefundRequest, RefundResponse, SubscriptionRequest, VerifyRequest, VerifyResponse,
    };
    use async_trait::async_trait;

    struct StubGateway(ProviderName);

    #[async_trait]
    impl PaymentGateway for StubGateway {
        fn name(&self) -> ProviderName {
            self.0
        }

        async fn initiate_payment(
            &self,
            _request: ChargeRequest,
        ) -> PaymentResult<Option<ChargeResponse>> {
            Ok(None)
        }

        async fn verify_payment(
            &self,
            _request: VerifyRequest,
        ) -> PaymentResult<Option<VerifyResponse>> {
            Ok(None)
        }

        async fn create_subscription(
            &self,
            _request: SubscriptionRequest,
        ) -> PaymentResult<Option<ChargeResponse>> {
            Ok(None)
        }

        async fn cancel_subscription(
            &self,
            _request: CancelSubscriptionRequest,
        ) -> PaymentResult<Option<CancelSubscriptionResponse>> {
            Ok(None)
        }

        async fn process_refund(
            &self,
            _request: RefundRequest,
        ) -> PaymentResult<Option<RefundResponse>> {
            Ok(None)
        }
    }

    fn tenant_config(provider: Option<ProviderName>) -> TenantPaymentConfig {
        TenantPaymentConfig {
            tenant_id: 1,
            provider,
            merchant_id: "10000100".to_string(),
            api_key: "46f0cd694581a".to_string(),
            api_secret: None,
            webhook_secret: Some("passphrase".to_string()),
            is_test_mode: true,
            currency: "ZAR".to_string(),
        }
    }

    #[test]
    fn resolves_registered_provider() {
        let mut factory = GatewayFactory::new(ProviderName::Payfast);
        factory.register(ProviderName::Payfast, |_| {
            Ok(Arc::new(StubGateway(ProviderName::Payfast)) as Arc<dyn PaymentGateway>)
        });

        let gateway = factory
            .resolve(&tenant_config(Some(ProviderName::Payfast)))
            .expect("registered provider resolves");
        assert_eq!(gateway.name(), ProviderName::Payfast);
    }

    #[test]
    fn missing_provider_falls_back_to_default() {
        let mut factory = GatewayFactory::new(ProviderName::Payfast);
        factory.register(ProviderName::Payfast, |_| {
            Ok(Arc::new(StubGateway(ProviderName::Payfast)) as Arc<dyn PaymentGateway>)
        });

        let gateway = factory
            .resolve(&tenant_config(None))
            .expect("falls back to default");
        assert_eq!(gateway.name(), ProviderName::Payfast);
    }

    #[test]
    fn unregistered_provider_falls_back_to_default() {
        let mut factory = GatewayFactory::new(ProviderName::Payfast);
        factory.register(ProviderName::Payfast, |_| {
            Ok(Arc::new(StubGateway(ProviderName::Payfast)) as Arc<dyn PaymentGateway>)
        });

        let gateway = factory
            .resolve(&tenant_config(Some(ProviderName::Stripe)))
            .expect("falls back to default");
        assert_eq!(gateway.name(), ProviderName::Payfast);
    }

    #[test]
    fn unregistered_default_resolves_to_none() {
        let factory = GatewayFactory::new(ProviderName::Payfast);
        assert!(factory.resolve(&tenant_config(None)).is_none());
    }

    #[test]
    fn builder_failure_resolves_to_none() {
        let mut factory = GatewayFactory::new(ProviderName::Payfast);
        factory.register(ProviderName::Payfast, |_| {
            Err(PaymentError::ValidationError {
                message: "merchant_id missing".to_string(),
                field: Some("merchant_id".to_string()),
            })
        });
        assert!(factory.resolve(&tenant_config(None)).is_none());
    }
}
