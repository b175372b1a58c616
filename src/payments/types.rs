use crate::payments::error::PaymentError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderName {
    Payfast,
    Stripe,
}

impl ProviderName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Payfast => "payfast",
            ProviderName::Stripe => "stripe",
        }
    }
}

impl std::fmt::Display for ProviderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderName {
    type Err = PaymentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "payfast" => Ok(ProviderName::Payfast),
            "stripe" => Ok(ProviderName::Stripe),
            _ => Err(PaymentError::ValidationError {
                message: format!("unsupported provider: {}", value),
                field: Some("provider".to_string()),
            }),
        }
    }
}

/// Payment instrument reported by the gateway on a completed payment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Eft,
    CreditCard,
    DebitCard,
    Masterpass,
    Mobicred,
    SCode,
    SnapScan,
    Zapper,
    MoreTyme,
    StoreCard,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Eft => "eft",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Masterpass => "masterpass",
            PaymentMethod::Mobicred => "mobicred",
            PaymentMethod::SCode => "scode",
            PaymentMethod::SnapScan => "snapscan",
            PaymentMethod::Zapper => "zapper",
            PaymentMethod::MoreTyme => "moretyme",
            PaymentMethod::StoreCard => "store_card",
        }
    }

    /// Inverse of `as_str`, used when loading persisted transactions.
    pub fn parse_db_value(value: &str) -> Option<Self> {
        match value {
            "eft" => Some(PaymentMethod::Eft),
            "credit_card" => Some(PaymentMethod::CreditCard),
            "debit_card" => Some(PaymentMethod::DebitCard),
            "masterpass" => Some(PaymentMethod::Masterpass),
            "mobicred" => Some(PaymentMethod::Mobicred),
            "scode" => Some(PaymentMethod::SCode),
            "snapscan" => Some(PaymentMethod::SnapScan),
            "zapper" => Some(PaymentMethod::Zapper),
            "moretyme" => Some(PaymentMethod::MoreTyme),
            "store_card" => Some(PaymentMethod::StoreCard),
            _ => None,
        }
    }
}

/// Request to initiate a once-off payment at the gateway's hosted page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub amount: Decimal,
    pub currency: String,
    pub item_name: String,
    pub item_description: Option<String>,
    /// Signed `tenant:transaction:sig` token; the only cross-boundary handle
    /// the gateway echoes back.
    pub merchant_reference: String,
    pub return_url: String,
    pub cancel_url: String,
    pub notify_url: String,
    pub payee_name: Option<String>,
    pub payee_email: Option<String>,
}

/// Redirect target plus the signed field map the caller's browser submits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeResponse {
    pub redirect_url: String,
    pub fields: Vec<(String, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Notification fields in the order they were received.
    pub fields: Vec<(String, String)>,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingFrequency {
    Monthly,
    Quarterly,
    Biannual,
    Annual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub charge: ChargeRequest,
    pub recurring_amount: Decimal,
    pub frequency: BillingFrequency,
    /// 0 means until cancelled.
    pub cycles: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelSubscriptionRequest {
    /// Gateway-assigned subscription token.
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelSubscriptionResponse {
    pub cancelled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub gateway_payment_id: String,
    pub amount: Decimal,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundResponse {
    pub refund_reference: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_name_parsing_works() {
        assert!(matches!(
            ProviderName::from_str("payfast"),
            Ok(ProviderName::Payfast)
        ));
        assert!(matches!(
            ProviderName::from_str(" PayFast "),
            Ok(ProviderName::Payfast)
        ));
        assert!(ProviderName::from_str("unknown").is_err());
    }

    #[test]
    fn payment_method_db_round_trip() {
        for method in [
            PaymentMethod::Eft,
            PaymentMethod::CreditCard,
            PaymentMethod::SnapScan,
            PaymentMethod::MoreTyme,
        ] {
            assert_eq!(PaymentMethod::parse_db_value(method.as_str()), Some(method));
        }
        assert_eq!(PaymentMethod::parse_db_value("bitcoin"), None);
    }

    #[test]
    fn charge_request_serializes_to_json() {
        let request = ChargeRequest {
            amount: Decimal::new(15000, 2),
            currency: "ZAR".to_string(),
            item_name: "Winter appeal".to_string(),
            item_description: None,
            merchant_reference: "7:01ARZ3NDEKTSV4RRFFQ69G5FAV:abcdef012345".to_string(),
            return_url: "https://example.org/return".to_string(),
            cancel_url: "https://example.org/cancel".to_string(),
            notify_url: "https://example.org/itn".to_string(),
            payee_name: Some("Thandi".to_string()),
            payee_email: None,
        };
        let json = serde_json::to_value(&request).expect("serialization should succeed");
        assert_eq!(json["currency"], "ZAR");
        assert_eq!(json["amount"], "150.00");
    }
}
