//! HTTP routes exposing client state and actions

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::{get, post}, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::client::Client;
use crate::error::AtmError;
use crate::ledger::quantity;
use alloy_primitives::U256;

#[derive(Clone)]
pub struct AtmState { pub client: Arc<Client>, pub app_name: String }

impl AtmState {
    pub fn new(client: Arc<Client>, app_name: impl Into<String>) -> Self {
        Self { client, app_name: app_name.into() }
    }
}

#[derive(Deserialize)]
pub struct AmountRequest {
    /// JSON number, or a decimal / `0x` string for values past 2^64.
    #[serde(default = "default_amount", deserialize_with = "quantity::deserialize")]
    amount: U256,
}
fn default_amount() -> U256 { U256::from(1) }

type ApiError = (StatusCode, Json<Value>);

pub fn create_router(client: Arc<Client>) -> Router { create_router_with_name(client, "beeatm") }

pub fn create_router_with_name(client: Arc<Client>, app_name: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(state))
        .route("/transactions", get(transactions))
        .route("/connect", post(connect))
        .route("/disconnect", post(disconnect))
        .route("/balance", post(balance))
        .route("/deposit", post(deposit))
        .route("/withdraw", post(withdraw))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(AtmState::new(client, app_name))
}

pub fn status_for(err: &AtmError) -> StatusCode {
    match err {
        AtmError::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        AtmError::UserRejected => StatusCode::FORBIDDEN,
        AtmError::Unauthorized | AtmError::NotBound => StatusCode::CONFLICT,
        AtmError::OperationRejected { .. } | AtmError::InvalidAmount | AtmError::InvalidAddress(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AtmError::WaitAbandoned { .. } | AtmError::ConfirmationTimeout { .. } => StatusCode::ACCEPTED,
        AtmError::Provider(_) => StatusCode::BAD_GATEWAY,
        AtmError::StaleConfirmationDiscarded | AtmError::Abi(_) | AtmError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn api_error(err: AtmError) -> ApiError {
    (status_for(&err), Json(json!({"error": err.kind(), "message": err.to_string()})))
}

async fn health(State(s): State<AtmState>) -> impl IntoResponse {
    Json(json!({"status": "ok", "service": s.app_name}))
}

async fn state(State(s): State<AtmState>) -> impl IntoResponse {
    Json(s.client.snapshot())
}

async fn transactions(State(s): State<AtmState>) -> impl IntoResponse {
    let records = s.client.transactions();
    let lines: Vec<String> = records.iter().map(|r| r.display_line()).collect();
    Json(json!({"transactions": records, "lines": lines, "count": records.len()}))
}

async fn connect(State(s): State<AtmState>) -> Result<Json<Value>, ApiError> {
    let session = s.client.connect().await.map_err(api_error)?;
    Ok(Json(json!({"session": session, "status": s.client.status()})))
}

async fn disconnect(State(s): State<AtmState>) -> impl IntoResponse {
    s.client.disconnect();
    Json(json!({"status": s.client.status()}))
}

async fn balance(State(s): State<AtmState>) -> Result<Json<Value>, ApiError> {
    let balance = s.client.query_balance().await.map_err(api_error)?;
    Ok(Json(json!({"balance": balance.to_string()})))
}

async fn deposit(State(s): State<AtmState>, Json(req): Json<AmountRequest>) -> Result<Json<Value>, ApiError> {
    let confirmation = s.client.deposit(req.amount).await.map_err(api_error)?;
    Ok(Json(json!({"confirmation": confirmation, "ledger": s.client.snapshot().ledger})))
}

async fn withdraw(State(s): State<AtmState>, Json(req): Json<AmountRequest>) -> Result<Json<Value>, ApiError> {
    let confirmation = s.client.withdraw(req.amount).await.map_err(api_error)?;
    Ok(Json(json!({"confirmation": confirmation, "ledger": s.client.snapshot().ledger})))
}
