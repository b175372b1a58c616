pub mod donations;
pub mod itn;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use sqlx::PgPool;

use crate::services::checkout::CheckoutService;
use crate::services::itn_processor::ItnProcessor;

#[derive(Clone)]
pub struct AppState {
    pub checkout: Arc<CheckoutService>,
    pub itn: Arc<ItnProcessor>,
    pub pool: PgPool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/tenants/{tenant_id}/donations",
            post(donations::create_donation),
        )
        .route("/webhooks/payfast", post(itn::handle_itn))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match crate::database::health_check(&state.pool).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "degraded" })),
        ),
    }
}
