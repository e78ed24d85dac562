//! Per-chain watcher over both bridge event kinds.
//!
//! Same cursor discipline as the relayer's watcher: bounded windows gated
//! to `head − minConfirmations`, strict `(block_number, log_index)`
//! dispatch order, durable advance only after the whole window lands.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use bridge_core::evm::{BridgeLog, ChainClient};
use bridge_core::types::format_hash;
use chrono::{DateTime, Utc};
use eyre::{eyre, Result, WrapErr};
use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::config::ChainConfig;
use crate::db;
use crate::metrics;
use crate::processor::EventProcessor;

/// A watched chain.
pub struct ChainHandle {
    pub name: String,
    pub chain_id: u64,
    pub start_block: u64,
    pub client: ChainClient,
}

impl ChainHandle {
    pub fn from_config(config: &ChainConfig, call_timeout: Duration) -> Result<Self> {
        let bridge_address = Address::from_str(&config.bridge_address)
            .wrap_err_with(|| format!("{}: invalid bridge address", config.name))?;
        let client = ChainClient::new(
            &config.rpc_url,
            config.chain_id,
            bridge_address,
            call_timeout,
        )?;
        Ok(Self {
            name: config.name.clone(),
            chain_id: config.chain_id,
            start_block: config.start_block,
            client,
        })
    }
}

pub struct ChainWatcher {
    chain: Arc<ChainHandle>,
    db: PgPool,
    processor: Arc<EventProcessor>,
    poll_interval: Duration,
    min_confirmations: u64,
    batch_size: u64,
}

enum Tick {
    Busy,
    Idle,
}

impl ChainWatcher {
    pub fn new(
        chain: Arc<ChainHandle>,
        db: PgPool,
        processor: Arc<EventProcessor>,
        poll_interval: Duration,
        min_confirmations: u64,
        batch_size: u64,
    ) -> Self {
        Self {
            chain,
            db,
            processor,
            poll_interval,
            min_confirmations,
            batch_size,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!(
            chain = %self.chain.name,
            chain_id = self.chain.chain_id,
            "Indexer watcher started"
        );

        let mut consecutive_failures: u32 = 0;

        loop {
            let tick = tokio::select! {
                _ = shutdown.recv() => {
                    info!(chain = %self.chain.name, "Indexer watcher shutting down");
                    return Ok(());
                }
                result = self.tick() => result,
            };

            let delay = match tick {
                Ok(Tick::Busy) => {
                    consecutive_failures = 0;
                    continue;
                }
                Ok(Tick::Idle) => {
                    consecutive_failures = 0;
                    metrics::record_successful_poll(&self.chain.name);
                    self.poll_interval
                }
                Err(e) => {
                    consecutive_failures += 1;
                    let backoff = retry_backoff(consecutive_failures, self.poll_interval);
                    error!(
                        chain = %self.chain.name,
                        consecutive_failures,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Indexer tick failed, window will be re-scanned"
                    );
                    backoff
                }
            };

            tokio::select! {
                _ = shutdown.recv() => {
                    info!(chain = %self.chain.name, "Indexer watcher shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn tick(&self) -> Result<Tick> {
        let chain_id = self.chain.chain_id as i64;
        let cursor = match db::get_cursor(&self.db, chain_id).await? {
            Some(last) => last as u64,
            None => self.chain.start_block.saturating_sub(1),
        };

        let head = self.chain.client.head().await?;
        let safe_head = head.saturating_sub(self.min_confirmations);
        if safe_head <= cursor {
            return Ok(Tick::Idle);
        }

        let from = cursor + 1;
        let to = (from + self.batch_size - 1).min(safe_head);

        let events = self.chain.client.bridge_logs(from, to).await?;
        if !events.is_empty() {
            debug!(
                chain = %self.chain.name,
                from,
                to,
                count = events.len(),
                "Indexing event window"
            );
        }

        // One timestamp lookup per distinct block in the window.
        let mut block_times: HashMap<u64, DateTime<Utc>> = HashMap::new();
        for event in &events {
            let number = event.block_number();
            if !block_times.contains_key(&number) {
                let block = self.chain.client.block(number).await?;
                let time = DateTime::<Utc>::from_timestamp(block.timestamp as i64, 0)
                    .ok_or_else(|| eyre!("block {number} has an out-of-range timestamp"))?;
                block_times.insert(number, time);
            }
        }

        for event in &events {
            let block_time = block_times[&event.block_number()];
            self.processor
                .process(&self.chain.name, self.chain.chain_id, event, block_time)
                .await?;
        }

        let boundary = self.chain.client.block(to).await?;
        db::update_cursor(
            &self.db,
            chain_id,
            &self.chain.name,
            to as i64,
            &format_hash(boundary.hash),
            events.len() as i64,
        )
        .await?;

        metrics::record_window_processed(&self.chain.name, to);

        if to < safe_head {
            Ok(Tick::Busy)
        } else {
            Ok(Tick::Idle)
        }
    }
}

/// Exponential backoff, base 1 s, capped at twice the poll interval.
fn retry_backoff(consecutive_failures: u32, poll_interval: Duration) -> Duration {
    let exp = consecutive_failures.saturating_sub(1).min(16);
    let backoff = Duration::from_secs(1).saturating_mul(2u32.saturating_pow(exp));
    backoff.min(poll_interval.saturating_mul(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_matches_policy() {
        let poll = Duration::from_secs(12);
        assert_eq!(retry_backoff(1, poll), Duration::from_secs(1));
        assert_eq!(retry_backoff(3, poll), Duration::from_secs(4));
        assert_eq!(retry_backoff(10, poll), Duration::from_secs(24));
    }
}
