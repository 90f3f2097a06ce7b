/// Axum HTTP handlers for the ledger API
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Duration;
use std::sync::Arc;

use instant_send::ledger::types::{
    AdvanceRequest, AirdropRequest, BalanceQuery, BalanceResponse, RejectResponse,
    SubmitResponse, TimeResponse,
};
use instant_send::{
    AssetClass, EscrowAccount, InMemoryLedger, LedgerClient, LedgerError, RejectReason,
    SignedTransaction, TransactionId, TransactionStatus,
};
use wallet::Address;

/// Shared application state
pub type AppState = Arc<InMemoryLedger>;

/// Custom error type for handlers
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    /// The program refused a transaction
    Rejected(RejectResponse),
    Unavailable(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::Rejected(body) => {
                let status = match body.reason {
                    RejectReason::Malformed { .. } => StatusCode::BAD_REQUEST,
                    _ => StatusCode::UNPROCESSABLE_ENTITY,
                };
                (status, Json(body)).into_response()
            }
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg).into_response(),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Rejected(reason) => ApiError::Rejected(RejectResponse {
                transaction_id: None,
                reason,
            }),
            other => ApiError::Unavailable(other.to_string()),
        }
    }
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid address {}: {}", raw, e)))
}

/// GET /time
/// Current ledger time; escrow expiry is judged against this clock
pub async fn get_time(State(ledger): State<AppState>) -> Result<Json<TimeResponse>, ApiError> {
    let now = ledger.current_time().await?;
    Ok(Json(TimeResponse { now }))
}

/// GET /balance/{address}?asset=
/// `asset` is `native` (the default) or `fungible:<mint>`
pub async fn get_balance(
    State(ledger): State<AppState>,
    Path(address): Path<String>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let address = parse_address(&address)?;
    let asset: AssetClass = match query.asset {
        Some(raw) => raw
            .parse()
            .map_err(|e| ApiError::BadRequest(format!("Invalid asset: {}", e)))?,
        None => AssetClass::Native,
    };
    let amount = ledger.get_balance(&address, &asset).await?;
    Ok(Json(BalanceResponse {
        address,
        asset,
        amount,
    }))
}

/// GET /escrow/{address}
pub async fn get_escrow(
    State(ledger): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<EscrowAccount>, ApiError> {
    let address = parse_address(&address)?;
    ledger
        .get_escrow(&address)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Escrow not found: {}", address)))
}

/// POST /tx
/// Body is a signed transaction as JSON bytes. Returns the transaction id,
/// or the program's reason for refusing it.
pub async fn submit_transaction(
    State(ledger): State<AppState>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
    match ledger.process(&body) {
        Ok(transaction_id) => Ok(Json(SubmitResponse { transaction_id })),
        Err(LedgerError::Rejected(reason)) => {
            let transaction_id = SignedTransaction::from_bytes(&body).ok().map(|tx| tx.id());
            Err(ApiError::Rejected(RejectResponse {
                transaction_id,
                reason,
            }))
        }
        Err(other) => Err(other.into()),
    }
}

/// GET /tx/{id}/status
/// Unknown ids answer `not_found` rather than 404
pub async fn get_transaction_status(
    State(ledger): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TransactionStatus>, ApiError> {
    let status = ledger
        .get_transaction_status(&TransactionId::from(id))
        .await?;
    Ok(Json(status))
}

// ============================================================================
// DEVNET HELPER ENDPOINTS
// ============================================================================

/// POST /devnet/airdrop
/// Mint test funds to an address
pub async fn airdrop(
    State(ledger): State<AppState>,
    Json(req): Json<AirdropRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let amount = ledger.airdrop(&req.address, &req.asset, req.amount)?;
    Ok(Json(BalanceResponse {
        address: req.address,
        asset: req.asset,
        amount,
    }))
}

/// POST /devnet/advance
/// Move ledger time forward, to exercise expiry
pub async fn advance_time(
    State(ledger): State<AppState>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<TimeResponse>, ApiError> {
    log::info!("Advancing ledger time by {}s", req.seconds);
    let now = ledger.advance_time(Duration::seconds(req.seconds))?;
    Ok(Json(TimeResponse { now }))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}
