//! The facilitator-standard HTTP surface (spec §6): `/supported`,
//! `/verify-standard`, `/settle-standard`, plus `/health`.
//!
//! Per spec.md's Non-goal excluding the merchant-facing REST API, this is
//! deliberately not the full intent-management surface — only the
//! standard verify/settle contract other x402 facilitators expose.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use crate::protocol::types::ChallengeRecord;
use crate::protocol::validate::{self, InvalidReason};
use crate::store::{PaymentState, TransitionPatch, TxStatus, WebhookEventType};
use crate::timestamp::UnixTimestamp;

use super::state::AppState;

/// The anti-replay freshness window for a transparent authorization's
/// embedded timestamp (spec §4.1, rule 3): fixed, not configurable.
const FRESHNESS_WINDOW_SECONDS: u64 = 3600;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/supported", get(get_supported))
        .route("/verify-standard", post(post_verify))
        .route("/settle-standard", post(post_settle))
        .route("/health", get(get_health))
        .with_state(state)
}

#[derive(Serialize)]
struct SupportedKind {
    scheme: &'static str,
    network: &'static str,
}

#[instrument(skip_all)]
async fn get_supported(State(state): State<AppState>) -> Json<serde_json::Value> {
    let network = match state.network {
        crate::config::ZcashNetwork::Mainnet => "mainnet",
        crate::config::ZcashNetwork::Testnet => "testnet",
    };
    Json(json!({
        "kinds": [
            SupportedKind { scheme: "transparent", network },
            SupportedKind { scheme: "shielded", network },
        ]
    }))
}

#[instrument(skip_all)]
async fn get_health() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyStandardRequest {
    #[allow(dead_code)]
    x402_version: u8,
    payment_header: String,
    payment_requirements: ChallengeRecord,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyStandardResponse {
    is_valid: bool,
    invalid_reason: Option<String>,
}

/// `POST /verify-standard`: read-only check of whether a presented
/// authorization satisfies the pinned requirements (spec §6). Always
/// responds `200`; failure is signaled in the body.
#[instrument(skip_all)]
async fn post_verify(
    State(state): State<AppState>,
    Json(body): Json<VerifyStandardRequest>,
) -> Json<VerifyStandardResponse> {
    let result = verify_inner(&state, &body).await;
    match result {
        Ok(()) => Json(VerifyStandardResponse {
            is_valid: true,
            invalid_reason: None,
        }),
        Err(reason) => Json(VerifyStandardResponse {
            is_valid: false,
            invalid_reason: Some(reason.to_string()),
        }),
    }
}

async fn verify_inner(
    state: &AppState,
    body: &VerifyStandardRequest,
) -> Result<(), InvalidReason> {
    let authorization = validate::decode_authorization_header(&body.payment_header)?;
    let now = UnixTimestamp::try_now().map_err(|_| InvalidReason::BadHeaderJson)?;
    let payment_intent_id = body.payment_requirements.payment_intent_id;
    let txid = authorization.payload.txid().to_string();

    // `validate_authorization`'s double-spend check takes a synchronous
    // predicate, so resolve the (async) store lookup first.
    let already_bound = is_bound_elsewhere(state, &txid, payment_intent_id).await;

    validate::validate_authorization(
        &authorization,
        &body.payment_requirements,
        &state.signing_secret,
        now,
        FRESHNESS_WINDOW_SECONDS,
        |_| already_bound,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleStandardRequest {
    #[allow(dead_code)]
    x402_version: u8,
    payment_header: String,
    payment_requirements: ChallengeRecord,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SettleStandardResponse {
    success: bool,
    tx_hash: Option<String>,
    confirmations: u32,
    error: Option<String>,
}

/// `POST /settle-standard`: binds a presented, valid authorization to its
/// PaymentIntent (the client-submitted equivalent of the mempool scanner's
/// own match-and-bind step). Idempotent for an intent already past
/// `Created` (spec §6: "MUST be read-only/idempotent for already-settled
/// transactions").
#[instrument(skip_all)]
async fn post_settle(
    State(state): State<AppState>,
    Json(body): Json<SettleStandardRequest>,
) -> Json<SettleStandardResponse> {
    let payment_intent_id = body.payment_requirements.payment_intent_id;
    let intent = match state.payments.get(payment_intent_id).await {
        Ok(intent) => intent,
        Err(error) => {
            return Json(SettleStandardResponse {
                success: false,
                tx_hash: None,
                confirmations: 0,
                error: Some(error.to_string()),
            });
        }
    };

    if intent.state != PaymentState::Created {
        return Json(SettleStandardResponse {
            success: !matches!(intent.state, PaymentState::Failed),
            tx_hash: intent.observed_txid,
            confirmations: intent.confirmations.max(0) as u32,
            error: None,
        });
    }

    let authorization = match validate::decode_authorization_header(&body.payment_header) {
        Ok(auth) => auth,
        Err(reason) => {
            return Json(SettleStandardResponse {
                success: false,
                tx_hash: None,
                confirmations: 0,
                error: Some(reason.to_string()),
            });
        }
    };
    let now = match UnixTimestamp::try_now() {
        Ok(now) => now,
        Err(error) => {
            return Json(SettleStandardResponse {
                success: false,
                tx_hash: None,
                confirmations: 0,
                error: Some(error.to_string()),
            });
        }
    };

    let txid = authorization.payload.txid().to_string();
    let already_bound = is_bound_elsewhere(&state, &txid, payment_intent_id).await;
    if let Err(reason) = validate::validate_authorization(
        &authorization,
        &body.payment_requirements,
        &state.signing_secret,
        now,
        FRESHNESS_WINDOW_SECONDS,
        |_| already_bound,
    ) {
        return Json(SettleStandardResponse {
            success: false,
            tx_hash: None,
            confirmations: 0,
            error: Some(reason.to_string()),
        });
    }

    let from = match &authorization.payload {
        crate::protocol::types::AuthorizationPayload::Transparent(p) => p.from.clone(),
        crate::protocol::types::AuthorizationPayload::Shielded(_) => String::new(),
    };

    let bound_to = match state
        .transactions
        .first_seen(
            &txid,
            intent.id,
            authorization.payload.amount(),
            &from,
            authorization.payload.to(),
            None,
            0,
            TxStatus::Mempool,
        )
        .await
    {
        Ok(id) => id,
        Err(error) => {
            return Json(SettleStandardResponse {
                success: false,
                tx_hash: None,
                confirmations: 0,
                error: Some(error.to_string()),
            });
        }
    };
    if bound_to != intent.id {
        return Json(SettleStandardResponse {
            success: false,
            tx_hash: None,
            confirmations: 0,
            error: Some(InvalidReason::DuplicateTxid.to_string()),
        });
    }

    let _ = state
        .payments
        .try_transition(
            intent.id,
            &intent.merchant_id,
            PaymentState::Created,
            PaymentState::AwaitingConfirmation,
            TransitionPatch {
                observed_txid: Some(txid.clone()),
                observed_from: Some(from),
                observed_at: Some(now),
                confirmations: Some(0),
                ..Default::default()
            },
            WebhookEventType::Pending,
            &json!({
                "id": intent.id,
                "type": "payment.pending",
                "data": { "paymentIntentId": intent.id, "txid": txid },
                "timestamp": now.seconds_since_epoch(),
            }),
        )
        .await;

    // Force-scan immediately rather than wait for the next block-scan tick,
    // so a client that just broadcast an already-confirmed transaction sees
    // its real confirmation count without a round trip through the sweeps.
    if let Err(error) = state.scanner.scan_payment_intent(intent.id).await {
        tracing::warn!(%error, payment_intent_id = %intent.id, "force-scan after settle failed");
    }

    Json(SettleStandardResponse {
        success: true,
        tx_hash: Some(txid),
        confirmations: 0,
        error: None,
    })
}

async fn is_bound_elsewhere(state: &AppState, txid: &str, payment_intent_id: uuid::Uuid) -> bool {
    match state.transactions.find_by_txid(txid).await {
        Ok(Some(record)) => record.payment_intent_id != payment_intent_id,
        _ => false,
    }
}
