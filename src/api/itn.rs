//! Notification webhook endpoint.
//!
//! The gateway retries deliveries that do not get a 2xx. Permanent
//! rejections (forged signatures, unknown references) therefore acknowledge
//! with 200: redelivery cannot fix them and would only generate noise. Only
//! transient storage failures answer 5xx to request a retry.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode};
use tracing::{error, warn};

use crate::api::AppState;
use crate::payments::providers::payfast::parse_form_fields;
use crate::services::itn_processor::ItnError;

pub async fn handle_itn(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let source_ip = source_address(&headers, &peer);
    let fields = parse_form_fields(&body);

    match state.itn.handle(Some(&source_ip), &fields).await {
        Ok(_) => StatusCode::OK,
        Err(ItnError::Rejected(rejection)) => {
            warn!(source_ip = %source_ip, reason = %rejection, "notification rejected");
            StatusCode::OK
        }
        Err(ItnError::Storage(error)) => {
            error!(error = %error, "notification processing hit storage failure");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Source address for allowlisting: first `X-Forwarded-For` hop when behind
/// a proxy, otherwise the peer address.
fn source_address(headers: &HeaderMap, peer: &SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|hop| hop.trim().to_string())
        .filter(|hop| !hop.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "10.1.2.3:443".parse().expect("socket addr")
    }

    #[test]
    fn forwarded_header_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("197.97.145.150, 10.0.0.1"),
        );
        assert_eq!(source_address(&headers, &peer()), "197.97.145.150");
    }

    #[test]
    fn missing_header_falls_back_to_peer() {
        let headers = HeaderMap::new();
        assert_eq!(source_address(&headers, &peer()), "10.1.2.3");
    }

    #[test]
    fn empty_header_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(""));
        assert_eq!(source_address(&headers, &peer()), "10.1.2.3");
    }
}
