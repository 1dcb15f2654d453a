//! Crate-wide error taxonomy (spec §7: Validation / Transient / Terminal / Fatal).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::protocol::validate::InvalidReason;

/// Transient failures from node RPC, the database, or outbound HTTP.
///
/// Owning drivers log and retry these; they never roll back state and are
/// never surfaced to a synchronous caller except as a generic 503.
#[derive(thiserror::Error, Debug)]
pub enum TransientError {
    #[error("node rpc call failed: {0}")]
    NodeRpc(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("webhook http dispatch failed: {0}")]
    WebhookHttp(String),
    #[error("system clock error: {0}")]
    Clock(#[from] std::time::SystemTimeError),
}

/// Terminal failures surfaced by the lifecycle store as 4xx to the merchant API.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("payment intent not found: {0}")]
    IntentNotFound(uuid::Uuid),
    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition { from: String, to: String },
    #[error("payment intent is already in a terminal state")]
    AlreadyTerminal,
    #[error("refund amount exceeds payment amount")]
    RefundExceedsAmount,
    #[error(transparent)]
    Transient(#[from] TransientError),
}

/// Top-level error returned by the facilitator-standard HTTP handlers.
#[derive(thiserror::Error, Debug)]
pub enum FacilitatorError {
    #[error("invalid authorization: {0:?}")]
    Validation(InvalidReason),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transient(#[from] TransientError),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
}

impl IntoResponse for FacilitatorError {
    fn into_response(self) -> Response {
        // Validation failures are body-signaled with HTTP 200 on the
        // facilitator-standard endpoints (spec §7); callers that need the
        // protected-resource 402 semantics construct that response
        // themselves from `InvalidReason` rather than via this impl.
        match self {
            FacilitatorError::Validation(reason) => (
                StatusCode::OK,
                Json(ErrorBody {
                    error: reason.to_string(),
                }),
            )
                .into_response(),
            FacilitatorError::Store(store_error) => {
                let status = match &store_error {
                    StoreError::IntentNotFound(_) => StatusCode::NOT_FOUND,
                    StoreError::InvalidTransition { .. }
                    | StoreError::AlreadyTerminal
                    | StoreError::RefundExceedsAmount => StatusCode::CONFLICT,
                    StoreError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                (
                    status,
                    Json(ErrorBody {
                        error: store_error.to_string(),
                    }),
                )
                    .into_response()
            }
            FacilitatorError::Transient(transient) => {
                tracing::warn!(error = %transient, "transient failure surfaced to caller");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(ErrorBody {
                        error: "temporarily unavailable".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}
