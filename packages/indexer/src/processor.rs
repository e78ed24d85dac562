//! Event ingestion: raw-event recording plus transfer correlation.
//!
//! The store layer makes each ingest atomic; this layer owns the mapping
//! from decoded logs to rows and the operational logging around the
//! out-of-order cases. Errors bubble to the watcher, which re-scans the
//! window; `(tx_hash, log_index)` dedup makes re-delivery harmless.

use bridge_core::evm::{BridgeLog, DepositEvent, WithdrawEvent};
use bridge_core::types::{format_address, format_hash};
use bridge_core::EventKind;
use chrono::{DateTime, Utc};
use eyre::Result;
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::db::{self, DepositIngest, NewBridgeEvent, WithdrawIngest};
use crate::metrics;

pub struct EventProcessor {
    db: PgPool,
}

impl EventProcessor {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn process(
        &self,
        chain_name: &str,
        chain_id: u64,
        event: &BridgeLog,
        block_time: DateTime<Utc>,
    ) -> Result<()> {
        match event {
            BridgeLog::Deposit(deposit) => {
                self.process_deposit(chain_name, chain_id, deposit, block_time)
                    .await
            }
            BridgeLog::Withdraw(withdraw) => {
                self.process_withdraw(chain_name, chain_id, withdraw, block_time)
                    .await
            }
        }
    }

    async fn process_deposit(
        &self,
        chain_name: &str,
        chain_id: u64,
        event: &DepositEvent,
        block_time: DateTime<Utc>,
    ) -> Result<()> {
        let row = NewBridgeEvent {
            tx_hash: format_hash(event.tx_hash),
            log_index: event.log_index as i32,
            event_type: EventKind::Deposit.as_str().to_string(),
            chain_id: chain_id as i64,
            block_number: event.block_number as i64,
            block_hash: format_hash(event.block_hash),
            block_time,
            token: format_address(event.token),
            sender: Some(format_address(event.sender)),
            recipient: format_address(event.recipient),
            amount: event.amount.to_string(),
            nonce: event.nonce.try_into().unwrap_or(i64::MAX),
            source_chain_id: None,
            target_chain_id: Some(event.target_chain_id as i64),
        };

        match db::record_deposit(&self.db, &row).await? {
            DepositIngest::Duplicate => {
                debug!(
                    chain = %chain_name,
                    tx_hash = %row.tx_hash,
                    log_index = row.log_index,
                    "Deposit already indexed"
                );
            }
            DepositIngest::Pending => {
                info!(
                    chain = %chain_name,
                    tx_hash = %row.tx_hash,
                    nonce = row.nonce,
                    target_chain_id = event.target_chain_id,
                    amount = %event.amount,
                    "Deposit indexed, transfer pending"
                );
                metrics::record_event_indexed(chain_name, "deposit");
            }
            DepositIngest::CompletedByPriorWithdraw => {
                info!(
                    chain = %chain_name,
                    tx_hash = %row.tx_hash,
                    nonce = row.nonce,
                    "Deposit indexed; earlier withdrawal matched, transfer completed"
                );
                metrics::record_event_indexed(chain_name, "deposit");
                metrics::record_transfer_completed();
            }
        }

        Ok(())
    }

    async fn process_withdraw(
        &self,
        chain_name: &str,
        chain_id: u64,
        event: &WithdrawEvent,
        block_time: DateTime<Utc>,
    ) -> Result<()> {
        let row = NewBridgeEvent {
            tx_hash: format_hash(event.tx_hash),
            log_index: event.log_index as i32,
            event_type: EventKind::Withdraw.as_str().to_string(),
            chain_id: chain_id as i64,
            block_number: event.block_number as i64,
            block_hash: format_hash(event.block_hash),
            block_time,
            token: format_address(event.token),
            sender: None,
            recipient: format_address(event.recipient),
            amount: event.amount.to_string(),
            nonce: event.nonce.try_into().unwrap_or(i64::MAX),
            source_chain_id: Some(event.source_chain_id as i64),
            target_chain_id: None,
        };

        match db::record_withdraw(&self.db, &row).await? {
            WithdrawIngest::Duplicate => {
                debug!(
                    chain = %chain_name,
                    tx_hash = %row.tx_hash,
                    log_index = row.log_index,
                    "Withdrawal already indexed"
                );
            }
            WithdrawIngest::Matched => {
                info!(
                    chain = %chain_name,
                    tx_hash = %row.tx_hash,
                    nonce = row.nonce,
                    source_chain_id = event.source_chain_id,
                    "Withdrawal matched its deposit, transfer completed"
                );
                metrics::record_event_indexed(chain_name, "withdraw");
                metrics::record_transfer_completed();
            }
            WithdrawIngest::Unmatched => {
                // Possible when the target chain is indexed ahead of the
                // source chain; the deposit handler completes the pair on
                // arrival.
                warn!(
                    chain = %chain_name,
                    tx_hash = %row.tx_hash,
                    nonce = row.nonce,
                    source_chain_id = event.source_chain_id,
                    "Withdrawal arrived before its deposit, left uncorrelated"
                );
                metrics::record_event_indexed(chain_name, "withdraw");
            }
        }

        Ok(())
    }
}
