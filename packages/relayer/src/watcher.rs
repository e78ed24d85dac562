//! Per-chain deposit watcher.
//!
//! Advances a durable block cursor in bounded windows, dispatches decoded
//! deposits to the processor in `(block_number, log_index)` order, and
//! persists the cursor only once the whole window has been processed. A
//! retryable failure anywhere in the window aborts it; the same window is
//! re-scanned on the next tick and the processor's idempotency absorbs the
//! re-delivery.

use std::sync::Arc;
use std::time::Duration;

use eyre::Result;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use bridge_core::types::format_hash;

use crate::chains::ChainRuntime;
use crate::db;
use crate::metrics;
use crate::processor::DepositProcessor;

pub struct ChainWatcher {
    chain: Arc<ChainRuntime>,
    db: PgPool,
    processor: Arc<DepositProcessor>,
    poll_interval: Duration,
    min_confirmations: u64,
    batch_size: u64,
}

/// Outcome of one tick, deciding how soon the next one runs.
enum Tick {
    /// Window processed; more confirmed blocks are already waiting.
    Busy,
    /// Caught up with the confirmed head.
    Idle,
}

impl ChainWatcher {
    pub fn new(
        chain: Arc<ChainRuntime>,
        db: PgPool,
        processor: Arc<DepositProcessor>,
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

    /// Watch until shutdown. The cursor is only advanced at window
    /// boundaries, so cancelling mid-window is always safe.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!(
            chain = %self.chain.name,
            chain_id = self.chain.chain_id,
            "Watcher started"
        );

        let mut consecutive_failures: u32 = 0;

        loop {
            let tick = tokio::select! {
                _ = shutdown.recv() => {
                    info!(chain = %self.chain.name, "Watcher shutting down");
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
                        "Watcher tick failed, window will be re-scanned"
                    );
                    metrics::record_error(&self.chain.name, "watcher_tick");
                    backoff
                }
            };

            tokio::select! {
                _ = shutdown.recv() => {
                    info!(chain = %self.chain.name, "Watcher shutting down");
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

        // Implicit finality: never scan within minConfirmations of head,
        // so every dispatched event is already confirmation-deep.
        let head = self.chain.client.head().await?;
        let safe_head = head.saturating_sub(self.min_confirmations);
        if safe_head <= cursor {
            return Ok(Tick::Idle);
        }

        let from = cursor + 1;
        let to = (from + self.batch_size - 1).min(safe_head);

        let events = self.chain.client.deposit_logs(from, to).await?;
        if !events.is_empty() {
            debug!(
                chain = %self.chain.name,
                from,
                to,
                count = events.len(),
                "Dispatching deposit window"
            );
        }

        for event in &events {
            self.processor.process_deposit(&self.chain, event).await?;
        }

        // The whole window succeeded; make it durable.
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

        metrics::record_window_processed(&self.chain.name, to, (to - from + 1) as u64);

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
    fn test_backoff_growth() {
        let poll = Duration::from_secs(12);
        assert_eq!(retry_backoff(1, poll), Duration::from_secs(1));
        assert_eq!(retry_backoff(2, poll), Duration::from_secs(2));
        assert_eq!(retry_backoff(3, poll), Duration::from_secs(4));
        assert_eq!(retry_backoff(4, poll), Duration::from_secs(8));
    }

    #[test]
    fn test_backoff_capped_at_twice_poll_interval() {
        let poll = Duration::from_secs(12);
        assert_eq!(retry_backoff(6, poll), Duration::from_secs(24));
        assert_eq!(retry_backoff(30, poll), Duration::from_secs(24));
    }
}
