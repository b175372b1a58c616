//! Unified error handling for the GiveFast backend
//!
//! Provides a single application error type with HTTP status mapping,
//! user-facing messages, and structured error codes for client handling.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::payments::error::PaymentError;
use crate::transactions::store::StoreError;

/// Error codes for programmatic client handling
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "TRANSACTION_NOT_FOUND")]
    TransactionNotFound,
    #[serde(rename = "TENANT_NOT_CONFIGURED")]
    TenantNotConfigured,
    #[serde(rename = "GATEWAY_UNAVAILABLE")]
    GatewayUnavailable,
    #[serde(rename = "PAYMENT_PROVIDER_ERROR")]
    PaymentProviderError,
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    /// Input validation failure (4xx)
    Validation { field: String, message: String },
    /// Transaction with the given id doesn't exist
    TransactionNotFound { transaction_id: String },
    /// Tenant has no usable payment configuration
    TenantNotConfigured { tenant_id: i64 },
    /// No gateway implementation is registered for the resolved provider
    GatewayUnavailable { provider: String },
    /// Payment provider (gateway) failure
    PaymentProvider { message: String, is_retryable: bool },
    /// Database connection or query failure
    Database { message: String, is_retryable: bool },
    /// Catch-all internal failure
    Internal { message: String },
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation {
            field: field.into(),
            message: message.into(),
        })
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Internal {
            message: message.into(),
        })
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match &self.kind {
            AppErrorKind::Validation { .. } => StatusCode::BAD_REQUEST,
            AppErrorKind::TransactionNotFound { .. } => StatusCode::NOT_FOUND,
            AppErrorKind::TenantNotConfigured { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppErrorKind::GatewayUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppErrorKind::PaymentProvider { .. } => StatusCode::BAD_GATEWAY,
            AppErrorKind::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppErrorKind::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Validation { .. } => ErrorCode::ValidationError,
            AppErrorKind::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
            AppErrorKind::TenantNotConfigured { .. } => ErrorCode::TenantNotConfigured,
            AppErrorKind::GatewayUnavailable { .. } => ErrorCode::GatewayUnavailable,
            AppErrorKind::PaymentProvider { .. } => ErrorCode::PaymentProviderError,
            AppErrorKind::Database { .. } => ErrorCode::DatabaseError,
            AppErrorKind::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// User-facing message; never leaks internals or secrets.
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Validation { field, message } => {
                format!("Invalid {}: {}", field, message)
            }
            AppErrorKind::TransactionNotFound { transaction_id } => {
                format!("Transaction not found: {}", transaction_id)
            }
            AppErrorKind::TenantNotConfigured { .. } => {
                "Payments are not configured for this organization".to_string()
            }
            AppErrorKind::GatewayUnavailable { .. } => {
                "The configured payment gateway is not available".to_string()
            }
            AppErrorKind::PaymentProvider { .. } => {
                "Payment gateway returned an error".to_string()
            }
            AppErrorKind::Database { .. } => "A storage error occurred".to_string(),
            AppErrorKind::Internal { .. } => "An internal error occurred".to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::PaymentProvider { is_retryable, .. } => *is_retryable,
            AppErrorKind::Database { is_retryable, .. } => *is_retryable,
            _ => false,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            AppErrorKind::Validation { field, message } => {
                write!(f, "validation error on {}: {}", field, message)
            }
            AppErrorKind::TransactionNotFound { transaction_id } => {
                write!(f, "transaction not found: {}", transaction_id)
            }
            AppErrorKind::TenantNotConfigured { tenant_id } => {
                write!(f, "tenant {} has no payment configuration", tenant_id)
            }
            AppErrorKind::GatewayUnavailable { provider } => {
                write!(f, "no gateway registered for provider {}", provider)
            }
            AppErrorKind::PaymentProvider { message, .. } => {
                write!(f, "payment provider error: {}", message)
            }
            AppErrorKind::Database { message, .. } => write!(f, "database error: {}", message),
            AppErrorKind::Internal { message } => write!(f, "internal error: {}", message),
        }
    }
}

impl std::error::Error for AppError {}

#[derive(Serialize)]
struct ErrorBody {
    code: ErrorCode,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    retryable: Option<bool>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorBody {
            code: self.error_code(),
            message: self.user_message(),
            retryable: if status.is_server_error() {
                Some(self.is_retryable())
            } else {
                None
            },
        };
        (status, Json(serde_json::json!({ "error": body }))).into_response()
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::ValidationError { message, field } => {
                AppError::new(AppErrorKind::Validation {
                    field: field.unwrap_or_else(|| "request".to_string()),
                    message,
                })
            }
            other => AppError::new(AppErrorKind::PaymentProvider {
                message: other.to_string(),
                is_retryable: other.is_retryable(),
            }),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::new(AppErrorKind::Database {
            is_retryable: err.is_retryable(),
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_is_correct() {
        assert_eq!(
            AppError::validation("amount", "must be positive").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::new(AppErrorKind::TenantNotConfigured { tenant_id: 7 }).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::new(AppErrorKind::Database {
                message: "down".to_string(),
                is_retryable: true
            })
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn user_message_hides_internals() {
        let err = AppError::new(AppErrorKind::Database {
            message: "connection refused to 10.0.0.5:5432".to_string(),
            is_retryable: true,
        });
        assert!(!err.user_message().contains("10.0.0.5"));
    }
}
