use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

// Amounts are NUMERIC(78,0) in the database; queries cast text in on
// insert ($n::NUMERIC) and cast back out on read (amount::TEXT) so the
// full uint256 range survives the round trip.

/// A deposit the relayer owns end to end.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct BridgeTransaction {
    pub id: i64,
    pub source_tx_hash: String,
    pub target_tx_hash: Option<String>,
    pub source_chain_id: i64,
    pub target_chain_id: i64,
    pub token: String,
    pub sender: String,
    pub recipient: String,
    pub amount: String,
    pub nonce: i64,
    pub block_number: i64,
    pub status: String,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert form for a freshly observed deposit.
#[derive(Debug, Clone)]
pub struct NewBridgeTransaction {
    pub source_tx_hash: String,
    pub source_chain_id: i64,
    pub target_chain_id: i64,
    pub token: String,
    pub sender: String,
    pub recipient: String,
    pub amount: String,
    pub nonce: i64,
    pub block_number: i64,
}

/// One validator's signature over a deposit's withdrawal message.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ValidatorSignature {
    pub id: i64,
    pub source_tx_hash: String,
    pub validator: String,
    pub signature: String,
    pub created_at: DateTime<Utc>,
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
