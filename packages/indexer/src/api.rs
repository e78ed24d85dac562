//! Read-only query surface over indexed bridge data.
//!
//! - GET /health - liveness
//! - GET /metrics - Prometheus exposition
//! - GET /status - per-chain sync state and transfer counts
//! - GET /events?chain_id=&address=&limit= - recent raw events
//! - GET /transfers?status=&address=&limit= - correlated transfers
//! - GET /transfers/pending - transfers still waiting on a withdrawal
//! - GET /transfers/:deposit_tx_hash - one transfer by its deposit hash

use std::net::SocketAddr;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bridge_core::validate::{is_address, is_tx_hash};
use bridge_core::TransferStatus;
use eyre::Result;
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::db;
use crate::metrics;

#[derive(Clone)]
struct AppState {
    db: PgPool,
}

#[derive(Deserialize)]
struct EventsQuery {
    chain_id: Option<i64>,
    address: Option<String>,
    limit: Option<i64>,
}

#[derive(Deserialize)]
struct TransfersQuery {
    status: Option<String>,
    address: Option<String>,
    limit: Option<i64>,
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    chains: Vec<db::ChainCursor>,
    transfers: TransferCounts,
}

#[derive(Serialize)]
struct TransferCounts {
    pending: i64,
    completed: i64,
    failed: i64,
}

/// Start the query API server.
pub async fn start_api_server(addr: SocketAddr, db: PgPool) -> Result<()> {
    metrics::UP.set(1.0);

    let state = AppState { db };

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/status", get(status_handler))
        .route("/events", get(events_handler))
        .route("/transfers", get(transfers_handler))
        .route("/transfers/pending", get(pending_transfers_handler))
        .route("/transfers/:deposit_tx_hash", get(transfer_handler))
        .with_state(state);

    tracing::info!(%addr, "Query API server started");

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

async fn status_handler(State(state): State<AppState>) -> Response {
    let chains = db::get_cursors(&state.db).await.unwrap_or_default();
    let transfers = TransferCounts {
        pending: db::count_transfers_by_status(&state.db, TransferStatus::Pending.as_str())
            .await
            .unwrap_or(0),
        completed: db::count_transfers_by_status(&state.db, TransferStatus::Completed.as_str())
            .await
            .unwrap_or(0),
        failed: db::count_transfers_by_status(&state.db, TransferStatus::Failed.as_str())
            .await
            .unwrap_or(0),
    };

    Json(StatusResponse {
        status: "ok".to_string(),
        chains,
        transfers,
    })
    .into_response()
}

async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Response {
    let limit = clamp_limit(query.limit);

    let result = match (&query.address, query.chain_id) {
        (Some(address), _) => {
            let Some(address) = normalize_address(address) else {
                return (StatusCode::BAD_REQUEST, "malformed address").into_response();
            };
            db::get_events_by_address(&state.db, &address, limit).await
        }
        (None, Some(chain_id)) => db::get_events_by_chain(&state.db, chain_id, limit).await,
        (None, None) => db::get_recent_events(&state.db, limit).await,
    };

    match result {
        Ok(events) => Json(events).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list events");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn transfers_handler(
    State(state): State<AppState>,
    Query(query): Query<TransfersQuery>,
) -> Response {
    let limit = clamp_limit(query.limit);

    let result = match &query.address {
        Some(address) => {
            let Some(address) = normalize_address(address) else {
                return (StatusCode::BAD_REQUEST, "malformed address").into_response();
            };
            db::get_transfers_by_address(&state.db, &address, limit).await
        }
        None => db::get_transfers(&state.db, query.status.as_deref(), limit).await,
    };

    match result {
        Ok(transfers) => Json(transfers).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list transfers");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn pending_transfers_handler(State(state): State<AppState>) -> Response {
    match db::get_transfers(&state.db, Some(TransferStatus::Pending.as_str()), 100).await {
        Ok(transfers) => Json(transfers).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list pending transfers");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn transfer_handler(
    State(state): State<AppState>,
    Path(deposit_tx_hash): Path<String>,
) -> Response {
    if !is_tx_hash(&deposit_tx_hash) {
        return (StatusCode::BAD_REQUEST, "malformed transaction hash").into_response();
    }

    match db::get_transfer_by_deposit(&state.db, &deposit_tx_hash).await {
        Ok(Some(transfer)) => Json(transfer).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to get transfer");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Result set bound: ≤ 100, default 50.
fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 100)
}

/// Address filters match the stored lowercase form.
fn normalize_address(address: &str) -> Option<String> {
    if is_address(address) {
        Some(address.to_lowercase())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit_bounds() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some(25)), 25);
        assert_eq!(clamp_limit(Some(100)), 100);
        assert_eq!(clamp_limit(Some(101)), 100);
        assert_eq!(clamp_limit(Some(0)), 1);
    }

    #[test]
    fn test_normalize_address_lowercases() {
        let checksummed = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
        assert_eq!(
            normalize_address(checksummed).as_deref(),
            Some("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );
    }

    #[test]
    fn test_normalize_address_rejects_malformed() {
        assert!(normalize_address("0x123").is_none());
        assert!(normalize_address("hello").is_none());
    }
}
