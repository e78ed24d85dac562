use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

// Amounts are NUMERIC(78,0); see the relayer store for the cast
// convention (text in, TEXT out).

/// A raw on-chain event, exactly as observed.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BridgeEvent {
    pub id: i64,
    pub tx_hash: String,
    pub log_index: i32,
    pub event_type: String,
    pub chain_id: i64,
    pub block_number: i64,
    pub block_hash: String,
    pub block_time: DateTime<Utc>,
    pub token: String,
    pub sender: Option<String>,
    pub recipient: String,
    pub amount: String,
    pub nonce: i64,
    pub source_chain_id: Option<i64>,
    pub target_chain_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Insert form for a raw event.
///
/// `sender`/`target_chain_id` are set for deposits only,
/// `source_chain_id` for withdrawals only.
#[derive(Debug, Clone)]
pub struct NewBridgeEvent {
    pub tx_hash: String,
    pub log_index: i32,
    pub event_type: String,
    pub chain_id: i64,
    pub block_number: i64,
    pub block_hash: String,
    pub block_time: DateTime<Utc>,
    pub token: String,
    pub sender: Option<String>,
    pub recipient: String,
    pub amount: String,
    pub nonce: i64,
    pub source_chain_id: Option<i64>,
    pub target_chain_id: Option<i64>,
}

/// The cross-chain lifecycle record correlating a deposit with its
/// withdrawal.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Transfer {
    pub id: i64,
    pub deposit_tx_hash: String,
    pub withdraw_tx_hash: Option<String>,
    pub source_chain_id: i64,
    pub target_chain_id: i64,
    pub token: String,
    pub sender: String,
    pub recipient: String,
    pub amount: String,
    pub nonce: i64,
    pub deposit_block: i64,
    pub withdraw_block: Option<i64>,
    pub deposit_time: DateTime<Utc>,
    pub withdraw_time: Option<DateTime<Utc>>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Durable per-chain scan position.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChainCursor {
    pub chain_id: i64,
    pub chain_name: String,
    pub last_block_number: i64,
    pub last_block_hash: Option<String>,
    pub total_events: i64,
    pub last_synced_at: DateTime<Utc>,
}
