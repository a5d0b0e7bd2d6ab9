use crate::state::{AppState, WalletInfo};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cryptochain_core::{
    Channel, LedgerBlock, LedgerError, Transaction, TransactionMap,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct MineIn {
    data: Vec<Transaction>,
}

#[derive(Deserialize)]
pub struct TransactIn {
    recipient: String,
    amount: u64,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransactOut {
    Success { transaction: Transaction },
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        let status = match e {
            LedgerError::InsufficientBalance { .. }
            | LedgerError::Validation(_)
            | LedgerError::UnknownChannel(_)
            | LedgerError::Serialization(_) => StatusCode::BAD_REQUEST,
            LedgerError::ReplacementRejected(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{}", self.message);
        }
        let body = serde_json::json!({ "type": "error", "message": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// Runs lock-taking or CPU-heavy ledger work off the async workers.
async fn blocking<F, R>(f: F) -> Result<R, ApiError>
where
    F: FnOnce() -> Result<R, LedgerError> + Send + 'static,
    R: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => Err(ApiError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("worker failed: {e}"),
        }),
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/api/blocks", get(blocks))
        .route("/api/mine", post(mine))
        .route("/api/transact", post(transact))
        .route("/api/transaction-pool-map", get(transaction_pool_map))
        .route("/api/mine-transactions", get(mine_transactions))
        .route("/api/wallet-info", get(wallet_info))
        .route("/api/pubsub/{channel}", post(pubsub_inbound))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn blocks(State(state): State<AppState>) -> Result<Json<Vec<LedgerBlock>>, ApiError> {
    let chain = blocking(move || {
        let chain = state.chain()?.chain().to_vec();
        Ok(chain)
    })
    .await?;
    Ok(Json(chain))
}

async fn mine(
    State(state): State<AppState>,
    Json(req): Json<MineIn>,
) -> Result<Json<Vec<LedgerBlock>>, ApiError> {
    let chain = blocking(move || {
        state.mine(req.data)?;
        let chain = state.chain()?.chain().to_vec();
        Ok(chain)
    })
    .await?;
    Ok(Json(chain))
}

async fn transact(
    State(state): State<AppState>,
    Json(req): Json<TransactIn>,
) -> Result<Json<TransactOut>, ApiError> {
    let transaction = blocking(move || {
        let transaction = state.transact(&req.recipient, req.amount)?;
        state.pubsub.broadcast_transaction(&transaction)?;
        Ok(transaction)
    })
    .await?;
    info!("pending transaction {}", transaction.id);
    Ok(Json(TransactOut::Success { transaction }))
}

async fn transaction_pool_map(
    State(state): State<AppState>,
) -> Result<Json<TransactionMap>, ApiError> {
    let map = blocking(move || {
        let map = state.pool()?.transaction_map().clone();
        Ok(map)
    })
    .await?;
    Ok(Json(map))
}

async fn mine_transactions(
    State(state): State<AppState>,
) -> Result<Json<Vec<LedgerBlock>>, ApiError> {
    let chain = blocking(move || {
        state.miner.mine_transactions()?;
        let chain = state.chain()?.chain().to_vec();
        Ok(chain)
    })
    .await?;
    Ok(Json(chain))
}

async fn wallet_info(State(state): State<AppState>) -> Result<Json<WalletInfo>, ApiError> {
    let info = blocking(move || state.wallet_info()).await?;
    Ok(Json(info))
}

async fn pubsub_inbound(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    body: String,
) -> Result<StatusCode, ApiError> {
    let channel: Channel = channel.parse()?;
    tokio::task::spawn_blocking(move || state.pubsub.handle_message(channel.as_str(), &body));
    Ok(StatusCode::ACCEPTED)
}
