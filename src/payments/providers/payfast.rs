//! PayFast gateway integration.
//!
//! PayFast is redirect-based: initiation builds a signed field map the
//! donor's browser posts to the hosted payment page, and completion arrives
//! asynchronously as an Instant Transaction Notification (ITN) posted to our
//! webhook. Signatures on both legs are MD5 over url-encoded fields with the
//! merchant passphrase appended; the ITN leg additionally checks the source
//! IP against PayFast's published notification ranges.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{
    BillingFrequency, CancelSubscriptionRequest, CancelSubscriptionResponse, ChargeRequest,
    ChargeResponse, PaymentMethod, ProviderName, RefundRequest, RefundResponse,
    SubscriptionRequest, VerifyRequest, VerifyResponse,
};
use crate::payments::utils::{secure_eq, PaymentHttpClient};
use crate::tenants::TenantPaymentConfig;

const LIVE_PROCESS_URL: &str = "https://www.payfast.co.za/eng/process";
const SANDBOX_PROCESS_URL: &str = "https://sandbox.payfast.co.za/eng/process";
const API_BASE_URL: &str = "https://api.payfast.co.za";
const API_VERSION: &str = "v1";

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);
const HTTP_MAX_RETRIES: u32 = 2;

/// Field order PayFast requires in the outbound signature string. Fields the
/// request does not carry are skipped, never emitted empty.
const OUTBOUND_FIELD_ORDER: &[&str] = &[
    "merchant_id",
    "merchant_key",
    "return_url",
    "cancel_url",
    "notify_url",
    "name_first",
    "name_last",
    "email_address",
    "cell_number",
    "m_payment_id",
    "amount",
    "item_name",
    "item_description",
    "custom_int1",
    "custom_str1",
    "custom_str2",
    "custom_str3",
    "custom_str4",
    "custom_str5",
    "email_confirmation",
    "confirmation_address",
    "payment_method",
    "subscription_type",
    "billing_date",
    "recurring_amount",
    "frequency",
    "cycles",
];

/// PayFast posts notifications only from these address blocks
/// (inclusive ranges, network byte order).
const ITN_SOURCE_RANGES: &[(u32, u32)] = &[
    (ip(197, 97, 145, 144), ip(197, 97, 145, 159)),
    (ip(41, 74, 179, 192), ip(41, 74, 179, 223)),
    (ip(102, 216, 36, 0), ip(102, 216, 36, 15)),
    (ip(102, 216, 36, 128), ip(102, 216, 36, 143)),
    (ip(144, 126, 193, 139), ip(144, 126, 193, 139)),
];

const fn ip(a: u8, b: u8, c: u8, d: u8) -> u32 {
    u32::from_be_bytes([a, b, c, d])
}

#[derive(Debug, Clone)]
pub struct PayfastConfig {
    pub merchant_id: String,
    pub merchant_key: String,
    pub passphrase: Option<String>,
    pub test_mode: bool,
}

impl PayfastConfig {
    pub fn from_tenant(config: &TenantPaymentConfig) -> PaymentResult<Self> {
        if config.merchant_id.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "merchant_id is required".to_string(),
                field: Some("merchant_id".to_string()),
            });
        }
        if config.api_key.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "merchant key is required".to_string(),
                field: Some("api_key".to_string()),
            });
        }
        Ok(Self {
            merchant_id: config.merchant_id.clone(),
            merchant_key: config.api_key.clone(),
            passphrase: config
                .webhook_secret
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .map(|p| p.to_string()),
            test_mode: config.is_test_mode,
        })
    }
}

/// Url-encode a value the way PayFast's signature algorithm expects:
/// RFC 3986 percent-encoding with spaces rendered as `+`.
fn pf_encode(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

/// MD5 signature over fields in their given order, non-empty values only,
/// passphrase appended last when configured. Lowercase hex.
pub fn compute_signature(fields: &[(String, String)], passphrase: Option<&str>) -> String {
    let mut parts: Vec<String> = fields
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", k, pf_encode(v)))
        .collect();
    if let Some(phrase) = passphrase {
        parts.push(format!("passphrase={}", pf_encode(phrase)));
    }
    let payload = parts.join("&");
    format!("{:x}", md5::compute(payload.as_bytes()))
}

/// Verify an ITN signature by replaying the computation over the fields in
/// received order, excluding the signature field itself. Received-but-empty
/// values are dropped from the replay, matching the sender's own signature
/// construction.
pub fn verify_itn_signature(
    fields: &[(String, String)],
    passphrase: Option<&str>,
    received_signature: &str,
) -> bool {
    let replay: Vec<(String, String)> = fields
        .iter()
        .filter(|(k, _)| k != "signature")
        .map(|(k, v)| (k.clone(), v.trim().to_string()))
        .collect();
    let expected = compute_signature(&replay, passphrase);
    let received = received_signature.trim().to_ascii_lowercase();
    secure_eq(expected.as_bytes(), received.as_bytes())
}

/// Check whether a notification source address falls inside PayFast's
/// published ranges. Accepts a raw header value; only the first
/// comma-separated hop counts, and only IPv4 is ever allowlisted.
pub fn is_ip_allowlisted(source: &str) -> bool {
    let first_hop = match source.split(',').next() {
        Some(hop) => hop.trim(),
        None => return false,
    };
    let addr: Ipv4Addr = match first_hop.parse() {
        Ok(addr) => addr,
        Err(_) => return false,
    };
    let value = u32::from(addr);
    ITN_SOURCE_RANGES
        .iter()
        .any(|(lo, hi)| value >= *lo && value <= *hi)
}

/// Map PayFast's short payment-method codes to our instrument enum.
/// Unknown codes are dropped rather than rejected; the instrument is
/// informational.
pub fn parse_payment_method_code(code: &str) -> Option<PaymentMethod> {
    match code.trim() {
        "eft" => Some(PaymentMethod::Eft),
        "cc" => Some(PaymentMethod::CreditCard),
        "dc" => Some(PaymentMethod::DebitCard),
        "mp" => Some(PaymentMethod::Masterpass),
        "mc" => Some(PaymentMethod::Mobicred),
        "sc" => Some(PaymentMethod::SCode),
        "ss" => Some(PaymentMethod::SnapScan),
        "zp" => Some(PaymentMethod::Zapper),
        "mt" => Some(PaymentMethod::MoreTyme),
        "rc" => Some(PaymentMethod::StoreCard),
        _ => None,
    }
}

/// Parse an `application/x-www-form-urlencoded` body preserving field order.
/// Framework form extractors collect into maps, which destroys the ordering
/// the signature replay depends on.
pub fn parse_form_fields(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(raw_key), decode_component(raw_value))
        })
        .collect()
}

fn decode_component(raw: &str) -> String {
    let plus_decoded = raw.replace('+', " ");
    match urlencoding::decode(&plus_decoded) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => plus_decoded,
    }
}

/// Payment status carried in an ITN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItnStatus {
    Complete,
    Failed,
    Cancelled,
    Pending,
    Other(String),
}

impl ItnStatus {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "COMPLETE" => ItnStatus::Complete,
            "FAILED" => ItnStatus::Failed,
            "CANCELLED" => ItnStatus::Cancelled,
            "PENDING" => ItnStatus::Pending,
            other => ItnStatus::Other(other.to_string()),
        }
    }
}

/// Typed view over the raw ITN field list.
#[derive(Debug, Clone)]
pub struct ItnPayload {
    pub merchant_reference: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub status: Option<ItnStatus>,
    pub amount_gross: Option<Decimal>,
    pub amount_fee: Option<Decimal>,
    pub amount_net: Option<Decimal>,
    pub payment_method: Option<PaymentMethod>,
    pub signature: Option<String>,
}

impl ItnPayload {
    pub fn from_fields(fields: &[(String, String)]) -> Self {
        let get = |name: &str| {
            fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let amount = |name: &str| get(name).and_then(|v| v.parse::<Decimal>().ok());

        Self {
            merchant_reference: get("m_payment_id"),
            gateway_payment_id: get("pf_payment_id"),
            status: get("payment_status").map(|s| ItnStatus::parse(&s)),
            amount_gross: amount("amount_gross"),
            amount_fee: amount("amount_fee"),
            amount_net: amount("amount_net"),
            payment_method: get("payment_method")
                .and_then(|code| parse_payment_method_code(&code)),
            signature: get("signature"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CancelApiResponse {
    code: Option<u16>,
    status: Option<String>,
}

pub struct PayfastGateway {
    config: PayfastConfig,
    http: PaymentHttpClient,
}

impl PayfastGateway {
    pub fn new(config: PayfastConfig) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(HTTP_TIMEOUT, HTTP_MAX_RETRIES)?;
        Ok(Self { config, http })
    }

    pub fn from_tenant_config(config: &TenantPaymentConfig) -> PaymentResult<Self> {
        Self::new(PayfastConfig::from_tenant(config)?)
    }

    fn process_url(&self) -> &'static str {
        if self.config.test_mode {
            SANDBOX_PROCESS_URL
        } else {
            LIVE_PROCESS_URL
        }
    }

    fn push_if_set(fields: &mut Vec<(String, String)>, key: &str, value: Option<&str>) {
        if let Some(v) = value {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                fields.push((key.to_string(), trimmed.to_string()));
            }
        }
    }

    /// Assemble the hosted-page field map in PayFast's published order and
    /// sign it. The order of the returned vec is the signature order.
    fn build_charge_fields(
        &self,
        request: &ChargeRequest,
        subscription: Option<&SubscriptionRequest>,
    ) -> PaymentResult<Vec<(String, String)>> {
        if request.currency != "ZAR" {
            return Err(PaymentError::ValidationError {
                message: format!("unsupported currency: {}", request.currency),
                field: Some("currency".to_string()),
            });
        }
        crate::payments::amount::validate_positive(request.amount, "amount")?;

        let amount = crate::payments::amount::normalize(request.amount);
        let mut unordered: Vec<(String, String)> = Vec::new();
        unordered.push(("merchant_id".to_string(), self.config.merchant_id.clone()));
        unordered.push(("merchant_key".to_string(), self.config.merchant_key.clone()));
        unordered.push(("return_url".to_string(), request.return_url.clone()));
        unordered.push(("cancel_url".to_string(), request.cancel_url.clone()));
        unordered.push(("notify_url".to_string(), request.notify_url.clone()));
        Self::push_if_set(&mut unordered, "name_first", request.payee_name.as_deref());
        Self::push_if_set(
            &mut unordered,
            "email_address",
            request.payee_email.as_deref(),
        );
        unordered.push((
            "m_payment_id".to_string(),
            request.merchant_reference.clone(),
        ));
        unordered.push(("amount".to_string(), format!("{:.2}", amount)));
        unordered.push(("item_name".to_string(), request.item_name.clone()));
        Self::push_if_set(
            &mut unordered,
            "item_description",
            request.item_description.as_deref(),
        );

        if let Some(sub) = subscription {
            crate::payments::amount::validate_positive(sub.recurring_amount, "recurring_amount")?;
            let recurring = crate::payments::amount::normalize(sub.recurring_amount);
            let frequency = match sub.frequency {
                BillingFrequency::Monthly => "3",
                BillingFrequency::Quarterly => "4",
                BillingFrequency::Biannual => "5",
                BillingFrequency::Annual => "6",
            };
            unordered.push(("subscription_type".to_string(), "1".to_string()));
            unordered.push(("recurring_amount".to_string(), format!("{:.2}", recurring)));
            unordered.push(("frequency".to_string(), frequency.to_string()));
            unordered.push(("cycles".to_string(), sub.cycles.to_string()));
        }

        // Reorder into the published signature order.
        let mut fields: Vec<(String, String)> = Vec::with_capacity(unordered.len() + 1);
        for name in OUTBOUND_FIELD_ORDER {
            if let Some(entry) = unordered.iter().find(|(k, _)| k == name) {
                fields.push(entry.clone());
            }
        }

        let signature = compute_signature(&fields, self.config.passphrase.as_deref());
        fields.push(("signature".to_string(), signature));
        Ok(fields)
    }

    /// Signature for PayFast's management API: alphabetically sorted
    /// url-encoded params, passphrase included as an ordinary param.
    fn api_signature(&self, params: &[(String, String)]) -> String {
        let mut sorted: Vec<(String, String)> = params.to_vec();
        if let Some(phrase) = &self.config.passphrase {
            sorted.push(("passphrase".to_string(), phrase.clone()));
        }
        sorted.sort_by(|a, b| a.0.cmp(&b.0));
        let payload = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, pf_encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{:x}", md5::compute(payload.as_bytes()))
    }
}

#[async_trait]
impl PaymentGateway for PayfastGateway {
    fn name(&self) -> ProviderName {
        ProviderName::Payfast
    }

    async fn initiate_payment(
        &self,
        request: ChargeRequest,
    ) -> PaymentResult<Option<ChargeResponse>> {
        let fields = self.build_charge_fields(&request, None)?;
        debug!(
            reference = %request.merchant_reference,
            field_count = fields.len(),
            "built hosted-page payment fields"
        );
        Ok(Some(ChargeResponse {
            redirect_url: self.process_url().to_string(),
            fields,
        }))
    }

    async fn verify_payment(
        &self,
        request: VerifyRequest,
    ) -> PaymentResult<Option<VerifyResponse>> {
        let valid = verify_itn_signature(
            &request.fields,
            self.config.passphrase.as_deref(),
            &request.signature,
        );
        let reason = if valid {
            None
        } else {
            Some("signature mismatch".to_string())
        };
        Ok(Some(VerifyResponse { valid, reason }))
    }

    async fn create_subscription(
        &self,
        request: SubscriptionRequest,
    ) -> PaymentResult<Option<ChargeResponse>> {
        let fields = self.build_charge_fields(&request.charge, Some(&request))?;
        Ok(Some(ChargeResponse {
            redirect_url: self.process_url().to_string(),
            fields,
        }))
    }

    async fn cancel_subscription(
        &self,
        request: CancelSubscriptionRequest,
    ) -> PaymentResult<Option<CancelSubscriptionResponse>> {
        if request.token.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "subscription token is required".to_string(),
                field: Some("token".to_string()),
            });
        }

        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%:z").to_string();
        let params = vec![
            ("merchant-id".to_string(), self.config.merchant_id.clone()),
            ("version".to_string(), API_VERSION.to_string()),
            ("timestamp".to_string(), timestamp.clone()),
        ];
        let signature = self.api_signature(&params);

        let mut url = format!(
            "{}/subscriptions/{}/cancel",
            API_BASE_URL,
            request.token.trim()
        );
        if self.config.test_mode {
            url.push_str("?testing=true");
        }

        let response: CancelApiResponse = self
            .http
            .request_json(
                reqwest::Method::PUT,
                &url,
                &[
                    ("merchant-id", self.config.merchant_id.as_str()),
                    ("version", API_VERSION),
                    ("timestamp", timestamp.as_str()),
                    ("signature", signature.as_str()),
                ],
                None,
            )
            .await?;

        let cancelled = response.code == Some(200)
            || response.status.as_deref() == Some("success");
        if !cancelled {
            warn!(
                code = ?response.code,
                status = ?response.status,
                "subscription cancellation not confirmed"
            );
        }
        Ok(Some(CancelSubscriptionResponse { cancelled }))
    }

    async fn process_refund(
        &self,
        _request: RefundRequest,
    ) -> PaymentResult<Option<RefundResponse>> {
        // PayFast has no refund API; refunds are operator-driven through the
        // merchant dashboard and land back here as status changes.
        Ok(None)
    }
}
