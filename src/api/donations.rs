use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::api::AppState;
use crate::error::AppError;
use crate::payments::types::BillingFrequency;
use crate::services::checkout::{DonationRequest, RecurringSchedule};

#[derive(Debug, Deserialize)]
pub struct DonationBody {
    pub amount: Decimal,
    pub item_name: String,
    pub item_description: Option<String>,
    pub return_url: String,
    pub cancel_url: String,
    pub payee_name: Option<String>,
    pub payee_email: Option<String>,
    pub recurring: Option<RecurringBody>,
}

#[derive(Debug, Deserialize)]
pub struct RecurringBody {
    pub amount: Decimal,
    pub frequency: BillingFrequency,
    #[serde(default)]
    pub cycles: u32,
}

#[derive(Debug, Serialize)]
pub struct DonationResponse {
    pub transaction_id: String,
    pub redirect_url: String,
    /// Hidden form fields the donor's browser posts to `redirect_url`.
    pub fields: Vec<(String, String)>,
}

pub async fn create_donation(
    State(state): State<AppState>,
    Path(tenant_id): Path<i64>,
    Json(body): Json<DonationBody>,
) -> Result<(StatusCode, Json<DonationResponse>), AppError> {
    let request = DonationRequest {
        amount: body.amount,
        item_name: body.item_name,
        item_description: body.item_description,
        return_url: body.return_url,
        cancel_url: body.cancel_url,
        payee_name: body.payee_name,
        payee_email: body.payee_email,
        recurring: body.recurring.map(|r| RecurringSchedule {
            amount: r.amount,
            frequency: r.frequency,
            cycles: r.cycles,
        }),
    };

    let session = state.checkout.initiate_donation(tenant_id, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(DonationResponse {
            transaction_id: session.transaction_id,
            redirect_url: session.redirect_url,
            fields: session.fields,
        }),
    ))
}
