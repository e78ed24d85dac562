//! Per-deposit relaying pipeline.
//!
//! Consumes decoded Deposit events from the source-chain watchers and
//! drives the corresponding `withdraw` on the target chain. Errors
//! returned from [`DepositProcessor::process_deposit`] are retryable
//! infrastructure failures; the watcher reacts by aborting the window
//! without advancing its cursor. Everything terminal (invalid event,
//! insufficient liquidity, exhausted submission retries) is absorbed here
//! and recorded on the transaction row instead.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Bytes;
use bridge_core::evm::{DepositEvent, WithdrawArgs};
use bridge_core::types::{format_address, format_hash, is_native_token};
use bridge_core::{with_retry, RetryConfig, TxStatus, ValidatorSigner, WithdrawalMessage};
use eyre::{eyre, Result};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::chains::ChainRuntime;
use crate::config::{Config, SubmissionMode};
use crate::db::{self, NewBridgeTransaction};
use crate::metrics;

/// Receipt wait bound per submission attempt.
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(300);

pub struct DepositProcessor {
    db: PgPool,
    chains: HashMap<u64, Arc<ChainRuntime>>,
    signer: ValidatorSigner,
    mode: SubmissionMode,
    min_confirmations: u64,
    max_gas_price_gwei: u64,
    gas_limit_multiplier: f64,
    retry: RetryConfig,
}

impl DepositProcessor {
    pub fn new(
        config: &Config,
        chains: HashMap<u64, Arc<ChainRuntime>>,
        signer: ValidatorSigner,
        db: PgPool,
    ) -> Self {
        Self {
            db,
            chains,
            signer,
            mode: config.submission_mode,
            min_confirmations: config.min_confirmations,
            max_gas_price_gwei: config.max_gas_price_gwei,
            gas_limit_multiplier: config.gas_limit_multiplier,
            retry: RetryConfig {
                max_attempts: config.retry_attempts,
                initial_backoff: Duration::from_millis(config.retry_delay_ms),
                ..RetryConfig::default()
            },
        }
    }

    /// Handle one deposit observed on `source`.
    pub async fn process_deposit(&self, source: &ChainRuntime, event: &DepositEvent) -> Result<()> {
        let source_tx_hash = format_hash(event.tx_hash);

        // 1. Well-formedness. Bad events are logged and skipped; nothing is
        //    persisted for them.
        if let Err(reason) = validate_event(source.chain_id, event) {
            warn!(
                chain = %source.name,
                tx_hash = %source_tx_hash,
                log_index = event.log_index,
                reason = %reason,
                "Invalid deposit event, skipping"
            );
            metrics::record_error(&source.name, "invalid_event");
            return Ok(());
        }

        let Some(target) = self.chains.get(&event.target_chain_id) else {
            warn!(
                chain = %source.name,
                tx_hash = %source_tx_hash,
                target_chain_id = event.target_chain_id,
                "Deposit targets an unconfigured chain, skipping"
            );
            metrics::record_error(&source.name, "unknown_target_chain");
            return Ok(());
        };

        // 2. Confirmation gate. The watcher already refuses to scan past
        //    head − minConfirmations, so this only fires when a reorg
        //    shrank the head underneath us. Failing the window keeps the
        //    cursor put; the check clears once head regrows.
        let head = source.client.head().await?;
        if head.saturating_sub(event.block_number) < self.min_confirmations {
            return Err(eyre!(
                "deposit {source_tx_hash} on {} lost confirmation depth (head {head}, block {})",
                source.name,
                event.block_number
            ));
        }

        // 3. Record the transaction. Re-delivery leaves existing rows
        //    untouched.
        let inserted = db::insert_transaction(
            &self.db,
            &NewBridgeTransaction {
                source_tx_hash: source_tx_hash.clone(),
                source_chain_id: source.chain_id as i64,
                target_chain_id: event.target_chain_id as i64,
                token: format_address(event.token),
                sender: format_address(event.sender),
                recipient: format_address(event.recipient),
                amount: event.amount.to_string(),
                nonce: event.nonce.try_into().unwrap_or(i64::MAX),
                block_number: event.block_number as i64,
            },
        )
        .await?;

        if inserted {
            info!(
                chain = %source.name,
                tx_hash = %source_tx_hash,
                target_chain_id = event.target_chain_id,
                amount = %event.amount,
                nonce = %event.nonce,
                "New deposit detected"
            );
            metrics::record_deposit_detected(&source.name);
        }

        match db::get_transaction(&self.db, &source_tx_hash).await? {
            Some(row)
                if row.status == TxStatus::Completed.as_str()
                    || row.status == TxStatus::Failed.as_str() =>
            {
                return Ok(())
            }
            Some(row) if row.status == TxStatus::Pending.as_str() => {
                db::mark_relaying(&self.db, &source_tx_hash).await?;
            }
            // A prior run crashed mid-relay; the isProcessed check below
            // keeps the resubmission safe.
            Some(_) => {}
            None => return Ok(()),
        }

        // 4. Withdrawal preparation.
        let message = WithdrawalMessage {
            token: event.token,
            recipient: event.recipient,
            amount: event.amount,
            nonce: event.nonce,
            source_chain_id: source.chain_id,
            target_chain_id: event.target_chain_id,
        };
        let message_hash = message.message_hash();

        if target.client.is_processed(message_hash).await? {
            info!(
                tx_hash = %source_tx_hash,
                message_hash = %message_hash,
                "Withdrawal already processed on target chain"
            );
            db::mark_completed(&self.db, &source_tx_hash, "").await?;
            return Ok(());
        }

        let bridge_balance = if is_native_token(event.token) {
            target.client.native_balance(target.bridge_address).await?
        } else {
            target
                .client
                .erc20_balance(event.token, target.bridge_address)
                .await?
        };
        if bridge_balance < event.amount {
            let error = format!(
                "Insufficient bridge balance on chain {}: need {}, have {}",
                target.chain_id, event.amount, bridge_balance
            );
            warn!(tx_hash = %source_tx_hash, error = %error, "Liquidity check failed");
            db::mark_failed(&self.db, &source_tx_hash, &error).await?;
            metrics::record_withdrawal_submitted(&target.name, false);
            return Ok(());
        }

        let signature = self.signer.sign_withdrawal(&message)?;
        db::insert_signature(
            &self.db,
            &source_tx_hash,
            &format_address(self.signer.address()),
            &format!("0x{}", hex::encode(signature)),
        )
        .await?;

        if self.mode == SubmissionMode::Store {
            info!(
                tx_hash = %source_tx_hash,
                validator = %self.signer.address(),
                "Signature stored for out-of-band withdrawal"
            );
            return Ok(());
        }

        // 5. Submit, re-deriving gas state on every attempt.
        let args = WithdrawArgs {
            token: event.token,
            recipient: event.recipient,
            amount: event.amount,
            nonce: event.nonce,
            source_chain_id: source.chain_id,
            signatures: vec![Bytes::from(signature.to_vec())],
        };

        let submitted = with_retry(&self.retry, |attempt| {
            let args = args.clone();
            async move {
                let gas_estimate = target.submitter.estimate_withdraw_gas(&args).await?;
                let gas_limit = gas_limit_with_margin(gas_estimate, self.gas_limit_multiplier);
                let gas_price =
                    capped_gas_price(target.client.gas_price().await?, self.max_gas_price_gwei);

                if attempt > 0 {
                    info!(
                        nonce = %args.nonce,
                        attempt,
                        gas_limit,
                        gas_price,
                        "Retrying withdraw submission"
                    );
                }

                target
                    .submitter
                    .submit_withdraw(
                        &args,
                        gas_limit,
                        gas_price,
                        self.min_confirmations,
                        RECEIPT_TIMEOUT,
                    )
                    .await
            }
        })
        .await;

        // 6. Commit.
        match submitted {
            Ok((tx_hash, _receipt)) => {
                let target_tx_hash = format_hash(tx_hash);
                info!(
                    source_tx = %source_tx_hash,
                    target_tx = %target_tx_hash,
                    target_chain = %target.name,
                    "Withdrawal confirmed"
                );
                db::mark_completed(&self.db, &source_tx_hash, &target_tx_hash).await?;
                metrics::record_withdrawal_submitted(&target.name, true);
            }
            Err(e) => {
                warn!(
                    source_tx = %source_tx_hash,
                    target_chain = %target.name,
                    error = %e,
                    "Withdrawal submission failed"
                );
                db::mark_failed(&self.db, &source_tx_hash, &e.to_string()).await?;
                metrics::record_withdrawal_submitted(&target.name, false);
            }
        }

        Ok(())
    }
}

/// Reject events whose decoded fields cannot describe a valid transfer.
fn validate_event(source_chain_id: u64, event: &DepositEvent) -> Result<(), String> {
    if event.amount.is_zero() {
        return Err("amount must be positive".to_string());
    }
    if event.target_chain_id == source_chain_id {
        return Err("source and target chain must differ".to_string());
    }
    if event.block_number == 0 {
        return Err("block number must be positive".to_string());
    }
    Ok(())
}

/// `ceil(estimate × multiplier)`, the safety margin on the node's estimate.
fn gas_limit_with_margin(estimate: u64, multiplier: f64) -> u64 {
    ((estimate as f64) * multiplier).ceil() as u64
}

/// Cap the network gas price at the configured ceiling. The cap never
/// raises the price.
fn capped_gas_price(network_price: u128, max_gwei: u64) -> u128 {
    let cap = (max_gwei as u128) * 1_000_000_000;
    network_price.min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, Address, B256, U256};

    fn event(amount: u64, target_chain_id: u64, block_number: u64) -> DepositEvent {
        let who = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        DepositEvent {
            token: Address::ZERO,
            sender: who,
            recipient: who,
            amount: U256::from(amount),
            nonce: U256::ZERO,
            target_chain_id,
            block_number,
            block_hash: B256::repeat_byte(1),
            tx_hash: B256::repeat_byte(2),
            log_index: 0,
        }
    }

    #[test]
    fn test_validate_event_accepts_good_deposit() {
        assert!(validate_event(1, &event(1, 137, 100)).is_ok());
    }

    #[test]
    fn test_validate_event_rejects_zero_amount() {
        assert!(validate_event(1, &event(0, 137, 100)).is_err());
    }

    #[test]
    fn test_validate_event_rejects_same_chain() {
        assert!(validate_event(137, &event(1, 137, 100)).is_err());
    }

    #[test]
    fn test_validate_event_rejects_zero_block() {
        assert!(validate_event(1, &event(1, 137, 0)).is_err());
    }

    #[test]
    fn test_gas_limit_margin() {
        assert_eq!(gas_limit_with_margin(100_000, 1.2), 120_000);
        assert_eq!(gas_limit_with_margin(1, 1.2), 2, "ceil, not floor");
        assert_eq!(gas_limit_with_margin(21_000, 1.0), 21_000);
    }

    #[test]
    fn test_gas_price_cap_is_ceiling_not_floor() {
        let gwei = 1_000_000_000u128;
        // Below cap: untouched.
        assert_eq!(capped_gas_price(30 * gwei, 100), 30 * gwei);
        // Above cap: clamped down.
        assert_eq!(capped_gas_price(250 * gwei, 100), 100 * gwei);
        // Exactly at cap.
        assert_eq!(capped_gas_price(100 * gwei, 100), 100 * gwei);
    }
}
