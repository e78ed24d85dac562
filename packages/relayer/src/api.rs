//! Operational HTTP endpoints for the relayer.
//!
//! - GET /health - liveness (public)
//! - GET /metrics - Prometheus exposition (public)
//! - GET /status - queue counts and per-chain sync state (auth-gated)
//! - GET /transactions - recent bridge transactions (auth-gated)
//! - GET /signatures/:source_tx_hash - validator signatures for pickup by
//!   a withdrawal-claiming UI (public)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bridge_core::TxStatus;
use eyre::Result;
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::db;
use crate::metrics;

#[derive(Clone)]
struct AppState {
    db: PgPool,
    api_token: Option<Arc<str>>,
    start_time: Instant,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    uptime_seconds: u64,
    queues: QueueStatus,
    chains: Vec<db::ChainCursor>,
}

#[derive(Serialize)]
struct QueueStatus {
    pending: i64,
    relaying: i64,
    completed: i64,
    failed: i64,
}

#[derive(Deserialize)]
struct TransactionsQuery {
    status: Option<String>,
    limit: Option<i64>,
}

#[derive(Serialize)]
struct SignaturesResponse {
    source_tx_hash: String,
    signatures: Vec<db::ValidatorSignature>,
}

/// Start the API server.
pub async fn start_api_server(addr: SocketAddr, db: PgPool) -> Result<()> {
    // Optional bearer token for the operational endpoints.
    let api_token: Option<Arc<str>> = std::env::var("API_AUTH_TOKEN")
        .ok()
        .filter(|t| !t.is_empty())
        .map(|t| Arc::from(t.as_str()));

    if api_token.is_some() {
        tracing::info!("API_AUTH_TOKEN set — /status and /transactions require authentication");
    }

    metrics::UP.set(1.0);

    let state = AppState {
        db,
        api_token,
        start_time: Instant::now(),
    };

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/status", get(status_handler))
        .route("/transactions", get(transactions_handler))
        .route("/signatures/:source_tx_hash", get(signatures_handler))
        .with_state(state);

    tracing::info!(%addr, "API server started");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> &'static str {
    "OK"
}

async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response();
    }

    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], buffer).into_response()
}

async fn status_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !check_auth(&headers, state.api_token.as_deref()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let queues = QueueStatus {
        pending: db::count_by_status(&state.db, TxStatus::Pending.as_str())
            .await
            .unwrap_or(0),
        relaying: db::count_by_status(&state.db, TxStatus::Relaying.as_str())
            .await
            .unwrap_or(0),
        completed: db::count_by_status(&state.db, TxStatus::Completed.as_str())
            .await
            .unwrap_or(0),
        failed: db::count_by_status(&state.db, TxStatus::Failed.as_str())
            .await
            .unwrap_or(0),
    };

    let chains = db::get_cursors(&state.db).await.unwrap_or_default();

    Json(StatusResponse {
        status: "ok".to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        queues,
        chains,
    })
    .into_response()
}

async fn transactions_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TransactionsQuery>,
) -> Response {
    if !check_auth(&headers, state.api_token.as_deref()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let limit = clamp_limit(query.limit);
    match db::get_transactions(&state.db, query.status.as_deref(), limit).await {
        Ok(rows) => Json(rows).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list transactions");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn signatures_handler(
    State(state): State<AppState>,
    Path(source_tx_hash): Path<String>,
) -> Response {
    if !bridge_core::validate::is_tx_hash(&source_tx_hash) {
        return (StatusCode::BAD_REQUEST, "malformed transaction hash").into_response();
    }

    match db::get_signatures(&state.db, &source_tx_hash).await {
        Ok(signatures) if signatures.is_empty() => StatusCode::NOT_FOUND.into_response(),
        Ok(signatures) => Json(SignaturesResponse {
            source_tx_hash,
            signatures,
        })
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to get signatures");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Result set bound: ≤ 100, default 50.
fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 100)
}

/// Accepts when no token is configured, or a matching
/// `Authorization: Bearer <token>` header is present.
fn check_auth(headers: &HeaderMap, required_token: Option<&str>) -> bool {
    let token = match required_token {
        Some(t) if !t.is_empty() => t,
        _ => return true,
    };

    match headers.get(header::AUTHORIZATION) {
        Some(value) => match value.to_str() {
            Ok(value_str) => value_str
                .strip_prefix("Bearer ")
                .or_else(|| value_str.strip_prefix("bearer "))
                .map(|t| t.trim() == token)
                .unwrap_or(false),
            Err(_) => false,
        },
        None => false,
    }
}
