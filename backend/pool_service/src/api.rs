//! Axum REST API handlers.
//!
//! There is no session layer: every mutating request names its caller
//! explicitly, the way a signed transaction would. Amounts travel as decimal
//! strings (a `0x` prefix selects hex), byte strings as `0x` hex.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use deposit_pool::{
    Address, Amount, ContributorView, DepositRecord, Pool, PoolCreator, PoolStatus, TokenReceipt,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config;
use crate::db;
use crate::errors::{Result, ServiceError};
use crate::events::EventRecord;

#[derive(Clone)]
pub struct ApiState {
    pub engine: Arc<PoolCreator>,
    pub pool: SqlitePool,
    pub instance_id: i64,
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/pools", post(setup))
        .route("/pools/:index", get(get_pool))
        .route("/pools/:index/contributors/:address", get(get_contributor))
        .route("/pools/:index/deposits", post(deposit))
        .route("/pools/:index/finalize", post(finalize))
        .route("/pools/:index/events", get(get_pool_events))
        .route("/token/callback", post(token_callback))
        .route("/transfers", post(transfer))
        .route("/admin/rugpull", post(rugpull))
        .route("/events", get(get_all_events))
        .route("/finalized/:reward_address", get(get_finalized))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request shapes
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SetupRequest {
    pub caller: Address,
    pub value: String,
    pub addresses: Vec<Address>,
    pub expected_amounts: Vec<String>,
}

#[derive(Deserialize)]
pub struct DepositBody {
    pub caller: Address,
    pub value: String,
    pub contributor_position: usize,
}

#[derive(Deserialize)]
pub struct FinalizeRequest {
    pub caller: Address,
    pub validator_pubkey: String,
    pub signature: String,
    pub deposit_data_root: String,
}

#[derive(Deserialize)]
pub struct TokenCallbackRequest {
    pub token: Address,
    pub from: Address,
    pub amount: String,
    pub payload: String,
}

#[derive(Deserialize)]
pub struct TransferRequest {
    pub from: Address,
    pub amount: String,
}

#[derive(Deserialize)]
pub struct RugpullRequest {
    pub caller: Address,
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub pools: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetupResponse {
    pub pool_index: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContributorResponse {
    pub address: Address,
    pub expected_amount: String,
    pub deposited_amount: String,
    pub share: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PoolResponse {
    pub index: u64,
    pub status: PoolStatus,
    pub target_amount: String,
    pub total_deposited: String,
    pub reward_address: Address,
    pub contributors: Vec<ContributorResponse>,
    pub deposit_record: Option<DepositRecord>,
}

impl From<Pool> for PoolResponse {
    fn from(pool: Pool) -> Self {
        Self {
            index: pool.index,
            status: pool.status(),
            target_amount: pool.target_amount.to_string(),
            total_deposited: pool.total_deposited().to_string(),
            reward_address: pool.reward_address,
            contributors: pool
                .contributors
                .into_iter()
                .map(|c| ContributorResponse {
                    address: c.address,
                    expected_amount: c.expected_amount.to_string(),
                    deposited_amount: c.deposited_amount.to_string(),
                    share: c.share.to_string(),
                })
                .collect(),
            deposit_record: pool.deposit_record,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContributorViewResponse {
    pub friend_index: usize,
    pub expected: String,
    pub deposited: String,
    pub share: String,
    pub is_first_friend: bool,
}

impl From<ContributorView> for ContributorViewResponse {
    fn from(view: ContributorView) -> Self {
        Self {
            friend_index: view.friend_index,
            expected: view.expected.to_string(),
            deposited: view.deposited.to_string(),
            share: view.share.to_string(),
            is_first_friend: view.is_first_friend,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenCallbackResponse {
    pub operation: String,
    pub pool_index: u64,
    pub contributor_position: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SweepResponse {
    pub to: Address,
    pub amount: String,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub pool_index: u64,
    pub count: usize,
    pub events: Vec<EventRecord>,
}

#[derive(Serialize)]
pub struct AllEventsResponse {
    pub count: usize,
    pub events: Vec<EventRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FinalizedResponse {
    pub reward_address: Address,
    pub pool_indices: Vec<i64>,
}

// ─────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────

fn parse_amount(raw: &str) -> Result<Amount> {
    config::parse_amount(raw)
        .ok_or_else(|| ServiceError::BadRequest(format!("invalid amount: {raw:?}")))
}

fn parse_hex(field: &str, raw: &str) -> Result<Vec<u8>> {
    hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
        .map_err(|e| ServiceError::BadRequest(format!("{field}: {e}")))
}

fn parse_root(raw: &str) -> Result<[u8; 32]> {
    let bytes = parse_hex("deposit_data_root", raw)?;
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| {
        ServiceError::BadRequest(format!(
            "deposit_data_root must be 32 bytes, got {}",
            bytes.len()
        ))
    })
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        pools: state.engine.pool_count(),
    })
}

/// `POST /pools`
///
/// Direct-value setup: creates the pool and pays the caller's own share.
pub async fn setup(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<SetupRequest>,
) -> Result<Json<SetupResponse>> {
    let value = parse_amount(&body.value)?;
    let expected_amounts = body
        .expected_amounts
        .iter()
        .map(|a| parse_amount(a))
        .collect::<Result<Vec<_>>>()?;
    let pool_index = state
        .engine
        .setup(body.caller, value, body.addresses, expected_amounts)?;
    Ok(Json(SetupResponse { pool_index }))
}

/// `GET /pools/:index`
pub async fn get_pool(
    State(state): State<Arc<ApiState>>,
    Path(index): Path<u64>,
) -> Result<Json<PoolResponse>> {
    Ok(Json(state.engine.get_pool(index)?.into()))
}

/// `GET /pools/:index/contributors/:address`
///
/// 404 when the address does not take part in the pool.
pub async fn get_contributor(
    State(state): State<Arc<ApiState>>,
    Path((index, address)): Path<(u64, Address)>,
) -> Result<Json<ContributorViewResponse>> {
    let view = state
        .engine
        .contributor_view(index, &address)?
        .ok_or_else(|| ServiceError::NotFound(format!("{address} is not in pool {index}")))?;
    Ok(Json(view.into()))
}

/// `POST /pools/:index/deposits`
pub async fn deposit(
    State(state): State<Arc<ApiState>>,
    Path(index): Path<u64>,
    Json(body): Json<DepositBody>,
) -> Result<Json<PoolResponse>> {
    let value = parse_amount(&body.value)?;
    state
        .engine
        .deposit(body.caller, value, index, body.contributor_position)?;
    Ok(Json(state.engine.get_pool(index)?.into()))
}

/// `POST /pools/:index/finalize`
pub async fn finalize(
    State(state): State<Arc<ApiState>>,
    Path(index): Path<u64>,
    Json(body): Json<FinalizeRequest>,
) -> Result<Json<PoolResponse>> {
    let pubkey = parse_hex("validator_pubkey", &body.validator_pubkey)?;
    let signature = parse_hex("signature", &body.signature)?;
    let root = parse_root(&body.deposit_data_root)?;
    state
        .engine
        .finalize(body.caller, index, pubkey, signature, root)?;
    Ok(Json(state.engine.get_pool(index)?.into()))
}

/// `POST /token/callback`
///
/// Relayed transfer-with-payload notification from the funding token.
pub async fn token_callback(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<TokenCallbackRequest>,
) -> Result<Json<TokenCallbackResponse>> {
    let amount = parse_amount(&body.amount)?;
    let payload = parse_hex("payload", &body.payload)?;
    let receipt = state
        .engine
        .on_token_received(body.token, body.from, amount, &payload)?;
    let response = match receipt {
        TokenReceipt::PoolCreated(pool_index) => TokenCallbackResponse {
            operation: "setup".to_string(),
            pool_index,
            contributor_position: 0,
        },
        TokenReceipt::Deposited {
            pool_index,
            position,
        } => TokenCallbackResponse {
            operation: "deposit".to_string(),
            pool_index,
            contributor_position: position,
        },
    };
    Ok(Json(response))
}

/// `POST /transfers`
///
/// Plain transfer that bypasses the ingress protocol.
pub async fn transfer(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<TransferRequest>,
) -> Result<Json<deposit_pool::Balances>> {
    let amount = parse_amount(&body.amount)?;
    state.engine.receive(body.from, amount);
    Ok(Json(state.engine.balances()))
}

/// `POST /admin/rugpull`
pub async fn rugpull(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<RugpullRequest>,
) -> Result<Json<SweepResponse>> {
    let sweep = state.engine.rugpull(body.caller)?;
    Ok(Json(SweepResponse {
        to: sweep.to,
        amount: sweep.amount.to_string(),
    }))
}

/// `GET /pools/:index/events`
///
/// Returns all recorded events for the given pool.
pub async fn get_pool_events(
    State(state): State<Arc<ApiState>>,
    Path(pool_index): Path<u64>,
) -> Result<Json<EventsResponse>> {
    let events = db::get_events_for_pool(&state.pool, state.instance_id, pool_index as i64).await?;
    Ok(Json(EventsResponse {
        pool_index,
        count: events.len(),
        events,
    }))
}

/// `GET /events`
///
/// Returns all recorded events across all pools.
pub async fn get_all_events(State(state): State<Arc<ApiState>>) -> Result<Json<AllEventsResponse>> {
    let events = db::get_all_events(&state.pool, state.instance_id).await?;
    Ok(Json(AllEventsResponse {
        count: events.len(),
        events,
    }))
}

/// `GET /finalized/:reward_address`
///
/// Pools finalized in favour of `reward_address`.
///
/// The recorder writes finalized events asynchronously, so a row may lag the
/// finalize call or be missing after a failed insert. The live ledger is
/// authoritative for this run and is merged with the recorded rows.
pub async fn get_finalized(
    State(state): State<Arc<ApiState>>,
    Path(reward_address): Path<Address>,
) -> Result<Json<FinalizedResponse>> {
    let mut pool_indices =
        db::get_finalized_pools(&state.pool, state.instance_id, &reward_address.to_string())
            .await?;
    pool_indices.extend(
        state
            .engine
            .finalized_pools(&reward_address)
            .into_iter()
            .map(|i| i as i64),
    );
    pool_indices.sort_unstable();
    pool_indices.dedup();
    Ok(Json(FinalizedResponse {
        reward_address,
        pool_indices,
    }))
}
