//! Prometheus metrics for the bridge indexer.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_gauge_vec, Counter,
    CounterVec, Gauge, GaugeVec,
};

lazy_static! {
    pub static ref EVENTS_INDEXED: CounterVec = register_counter_vec!(
        "bridge_indexer_events_indexed_total",
        "Total number of bridge events indexed",
        &["chain", "type"]
    )
    .unwrap();

    pub static ref TRANSFERS_COMPLETED: Counter = register_counter!(
        "bridge_indexer_transfers_completed_total",
        "Total number of transfers correlated to completion"
    )
    .unwrap();

    pub static ref LATEST_BLOCK: GaugeVec = register_gauge_vec!(
        "bridge_indexer_latest_block",
        "Latest block number fully indexed",
        &["chain"]
    )
    .unwrap();

    pub static ref UP: Gauge = register_gauge!(
        "bridge_indexer_up",
        "Whether the indexer is up and running"
    )
    .unwrap();

    pub static ref LAST_SUCCESSFUL_POLL: GaugeVec = register_gauge_vec!(
        "bridge_indexer_last_successful_poll_timestamp",
        "Unix timestamp of the last successful poll",
        &["chain"]
    )
    .unwrap();
}

pub fn record_event_indexed(chain: &str, event_type: &str) {
    EVENTS_INDEXED.with_label_values(&[chain, event_type]).inc();
}

pub fn record_transfer_completed() {
    TRANSFERS_COMPLETED.inc();
}

pub fn record_window_processed(chain: &str, latest_block: u64) {
    LATEST_BLOCK
        .with_label_values(&[chain])
        .set(latest_block as f64);
}

pub fn record_successful_poll(chain: &str) {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);
    LAST_SUCCESSFUL_POLL
        .with_label_values(&[chain])
        .set(timestamp);
}
