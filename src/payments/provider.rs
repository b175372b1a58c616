use async_trait::async_trait;

use crate::payments::error::PaymentResult;
use crate::payments::types::{
    CancelSubscriptionRequest, CancelSubscriptionResponse, ChargeRequest, ChargeResponse,
    ProviderName, RefundRequest, RefundResponse, SubscriptionRequest, VerifyRequest,
    VerifyResponse,
};

/// Common interface over payment gateways.
///
/// Every operation returns `Ok(None)` when the gateway does not support it,
/// letting callers distinguish "not offered" from a hard failure. A gateway
/// that implements an operation returns `Ok(Some(..))` or `Err(..)`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn name(&self) -> ProviderName;

    /// Build the hosted-page redirect for a once-off payment.
    async fn initiate_payment(
        &self,
        request: ChargeRequest,
    ) -> PaymentResult<Option<ChargeResponse>>;

    /// Verify an inbound notification's authenticity.
    async fn verify_payment(
        &self,
        request: VerifyRequest,
    ) -> PaymentResult<Option<VerifyResponse>>;

    async fn create_subscription(
        &self,
        request: SubscriptionRequest,
    ) -> PaymentResult<Option<ChargeResponse>>;

    async fn cancel_subscription(
        &self,
        request: CancelSubscriptionRequest,
    ) -> PaymentResult<Option<CancelSubscriptionResponse>>;

    async fn process_refund(
        &self,
        request: RefundRequest,
    ) -> PaymentResult<Option<RefundResponse>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    struct RedirectOnlyGateway;

    #[async_trait]
    impl PaymentGateway for RedirectOnlyGateway {
        fn name(&self) -> ProviderName {
            ProviderName::Payfast
        }

        async fn initiate_payment(
            &self,
            request: ChargeRequest,
        ) -> PaymentResult<Option<ChargeResponse>> {
            Ok(Some(ChargeResponse {
                redirect_url: "https://gateway.test/process".to_string(),
                fields: vec![("m_payment_id".to_string(), request.merchant_reference)],
            }))
        }

        async fn verify_payment(
            &self,
            _request: VerifyRequest,
        ) -> PaymentResult<Option<VerifyResponse>> {
            Ok(Some(VerifyResponse {
                valid: true,
                reason: None,
            }))
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

    #[tokio::test]
    async fn unsupported_operations_are_none_not_errors() {
        let gateway = RedirectOnlyGateway;
        let refund = gateway
            .process_refund(RefundRequest {
                gateway_payment_id: "pf-123".to_string(),
                amount: Decimal::new(5000, 2),
                reason: None,
            })
            .await
            .expect("should not error");
        assert!(refund.is_none());
    }

    #[tokio::test]
    async fn supported_operation_returns_payload() {
        let gateway = RedirectOnlyGateway;
        let response = gateway
            .initiate_payment(ChargeRequest {
                amount: Decimal::new(10000, 2),
                currency: "ZAR".to_string(),
                item_name: "Donation".to_string(),
                item_description: None,
                merchant_reference: "1:01ARZ3NDEKTSV4RRFFQ69G5FAV:abcdef012345".to_string(),
                return_url: "https://example.org/r".to_string(),
                cancel_url: "https://example.org/c".to_string(),
                notify_url: "https://example.org/n".to_string(),
                payee_name: None,
                payee_email: None,
            })
            .await
            .expect("should not error")
            .expect("initiation is supported");
        assert_eq!(response.redirect_url, "https://gateway.test/process");
    }
}
