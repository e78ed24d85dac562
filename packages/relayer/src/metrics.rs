//! Prometheus metrics for the bridge relayer.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Gauge, GaugeVec,
};

lazy_static! {
    pub static ref BLOCKS_PROCESSED: CounterVec = register_counter_vec!(
        "bridge_relayer_blocks_processed_total",
        "Total number of blocks scanned",
        &["chain"]
    )
    .unwrap();

    pub static ref LATEST_BLOCK: GaugeVec = register_gauge_vec!(
        "bridge_relayer_latest_block",
        "Latest block number fully processed",
        &["chain"]
    )
    .unwrap();

    pub static ref DEPOSITS_DETECTED: CounterVec = register_counter_vec!(
        "bridge_relayer_deposits_detected_total",
        "Total number of deposit events detected",
        &["chain"]
    )
    .unwrap();

    pub static ref WITHDRAWALS_SUBMITTED: CounterVec = register_counter_vec!(
        "bridge_relayer_withdrawals_submitted_total",
        "Total number of withdrawal submissions by outcome",
        &["chain", "status"]
    )
    .unwrap();

    pub static ref ERRORS: CounterVec = register_counter_vec!(
        "bridge_relayer_errors_total",
        "Total number of errors",
        &["chain", "type"]
    )
    .unwrap();

    pub static ref UP: Gauge = register_gauge!(
        "bridge_relayer_up",
        "Whether the relayer is up and running"
    )
    .unwrap();

    pub static ref LAST_SUCCESSFUL_POLL: GaugeVec = register_gauge_vec!(
        "bridge_relayer_last_successful_poll_timestamp",
        "Unix timestamp of the last successful poll",
        &["chain"]
    )
    .unwrap();
}

pub fn record_window_processed(chain: &str, latest_block: u64, blocks: u64) {
    BLOCKS_PROCESSED
        .with_label_values(&[chain])
        .inc_by(blocks as f64);
    LATEST_BLOCK
        .with_label_values(&[chain])
        .set(latest_block as f64);
}

pub fn record_deposit_detected(chain: &str) {
    DEPOSITS_DETECTED.with_label_values(&[chain]).inc();
}

pub fn record_withdrawal_submitted(chain: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    WITHDRAWALS_SUBMITTED
        .with_label_values(&[chain, status])
        .inc();
}

pub fn record_error(chain: &str, error_type: &str) {
    ERRORS.with_label_values(&[chain, error_type]).inc();
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
