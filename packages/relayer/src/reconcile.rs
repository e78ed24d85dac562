//! Recovery for transactions interrupted mid-relay.
//!
//! Rows left in `relaying` (crash during submission, or signature-store
//! mode waiting on an out-of-band claim) are re-checked against the target
//! chain's replay map. A processed message hash means the withdrawal
//! landed, so the row flips to `completed`; anything else is left alone
//! for operator inspection. Rows are never auto-failed here.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use bridge_core::validate::parse_amount;
use bridge_core::WithdrawalMessage;
use eyre::{eyre, Result};
use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::chains::ChainRuntime;
use crate::db::{self, BridgeTransaction};

pub struct Reconciler {
    db: PgPool,
    chains: HashMap<u64, Arc<ChainRuntime>>,
    interval: Duration,
}

impl Reconciler {
    pub fn new(db: PgPool, chains: HashMap<u64, Arc<ChainRuntime>>, poll_interval: Duration) -> Self {
        Self {
            db,
            chains,
            // Low-frequency: this is recovery, not the hot path.
            interval: poll_interval.saturating_mul(10),
        }
    }

    /// One pass at startup, then periodic re-checks until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        loop {
            match self.reconcile_once().await {
                Ok(0) => {}
                Ok(n) => info!(completed = n, "Reconciliation completed stuck transactions"),
                Err(e) => warn!(error = %e, "Reconciliation pass failed"),
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Reconciler shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// Check every `relaying` row once. Returns how many were completed.
    pub async fn reconcile_once(&self) -> Result<u64> {
        let stuck = db::get_relaying_transactions(&self.db).await?;
        let mut completed = 0u64;

        for row in stuck {
            match self.check_row(&row).await {
                Ok(true) => {
                    // No target hash is known for a recovered row; the
                    // empty sentinel marks the on-chain short-circuit.
                    db::mark_completed(&self.db, &row.source_tx_hash, "").await?;
                    info!(
                        source_tx = %row.source_tx_hash,
                        target_chain_id = row.target_chain_id,
                        "Stuck transaction already processed on target, completed"
                    );
                    completed += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        source_tx = %row.source_tx_hash,
                        error = %e,
                        "Could not reconcile transaction"
                    );
                }
            }
        }

        Ok(completed)
    }

    async fn check_row(&self, row: &BridgeTransaction) -> Result<bool> {
        let target = self
            .chains
            .get(&(row.target_chain_id as u64))
            .ok_or_else(|| eyre!("target chain {} not configured", row.target_chain_id))?;

        let message = withdrawal_message_from_row(row)?;
        target.client.is_processed(message.message_hash()).await
    }
}

/// Rebuild the canonical message from a persisted row.
fn withdrawal_message_from_row(row: &BridgeTransaction) -> Result<WithdrawalMessage> {
    let token = Address::from_str(&row.token)
        .map_err(|_| eyre!("stored token address is malformed: {}", row.token))?;
    let recipient = Address::from_str(&row.recipient)
        .map_err(|_| eyre!("stored recipient address is malformed: {}", row.recipient))?;
    let amount = parse_amount(&row.amount)
        .ok_or_else(|| eyre!("stored amount is malformed: {}", row.amount))?;

    Ok(WithdrawalMessage {
        token,
        recipient,
        amount,
        nonce: U256::from(row.nonce as u64),
        source_chain_id: row.source_chain_id as u64,
        target_chain_id: row.target_chain_id as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row() -> BridgeTransaction {
        BridgeTransaction {
            id: 1,
            source_tx_hash: format!("0x{}", "ab".repeat(32)),
            target_tx_hash: None,
            source_chain_id: 1,
            target_chain_id: 137,
            token: "0x0000000000000000000000000000000000000000".to_string(),
            sender: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".to_string(),
            recipient: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".to_string(),
            amount: "1000000000000000000".to_string(),
            nonce: 0,
            block_number: 100,
            status: "relaying".to_string(),
            error_message: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_message_rebuilt_from_row_matches_event_form() {
        let message = withdrawal_message_from_row(&row()).unwrap();
        assert_eq!(message.source_chain_id, 1);
        assert_eq!(message.target_chain_id, 137);
        assert_eq!(message.amount, U256::from(1_000_000_000_000_000_000u64));
        assert_eq!(message.nonce, U256::ZERO);
        // The digest is a pure function of the row fields.
        assert_eq!(
            message.message_hash(),
            withdrawal_message_from_row(&row()).unwrap().message_hash()
        );
    }

    #[test]
    fn test_malformed_row_rejected() {
        let mut bad = row();
        bad.amount = "not-a-number".to_string();
        assert!(withdrawal_message_from_row(&bad).is_err());

        let mut bad = row();
        bad.token = "0xdead".to_string();
        assert!(withdrawal_message_from_row(&bad).is_err());
    }
}
