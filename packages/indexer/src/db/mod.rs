use chrono::{DateTime, Utc};
use eyre::{Result, WrapErr};
use sqlx::postgres::{PgPool, PgPoolOptions};

pub mod models;

pub use models::*;

/// Create the shared connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .wrap_err("Failed to connect to database")
}

/// Run embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .wrap_err("Failed to run database migrations")?;
    Ok(())
}

/// SELECT columns for bridge_events (NUMERIC cast to TEXT).
const EVENT_SELECT: &str = r#"id, tx_hash, log_index, event_type, chain_id, block_number,
    block_hash, block_time, token, sender, recipient, amount::TEXT as amount, nonce,
    source_chain_id, target_chain_id, created_at"#;

/// SELECT columns for transfers (NUMERIC cast to TEXT).
const TRANSFER_SELECT: &str = r#"id, deposit_tx_hash, withdraw_tx_hash, source_chain_id,
    target_chain_id, token, sender, recipient, amount::TEXT as amount, nonce, deposit_block,
    withdraw_block, deposit_time, withdraw_time, status, created_at, updated_at"#;

/// Outcome of ingesting a deposit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositIngest {
    /// `(tx_hash, log_index)` was already recorded.
    Duplicate,
    /// Transfer created (or refreshed) and still waiting for its withdrawal.
    Pending,
    /// A previously indexed withdrawal matched; transfer is complete.
    CompletedByPriorWithdraw,
}

/// Outcome of ingesting a withdraw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WithdrawIngest {
    /// `(tx_hash, log_index)` was already recorded.
    Duplicate,
    /// Matched its deposit; transfer completed.
    Matched,
    /// No deposit yet (cross-chain ordering); raw event retained.
    Unmatched,
}

async fn insert_event(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    event: &NewBridgeEvent,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO bridge_events (tx_hash, log_index, event_type, chain_id, block_number,
            block_hash, block_time, token, sender, recipient, amount, nonce,
            source_chain_id, target_chain_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11::NUMERIC, $12, $13, $14)
        ON CONFLICT (tx_hash, log_index) DO NOTHING
        "#,
    )
    .bind(&event.tx_hash)
    .bind(event.log_index)
    .bind(&event.event_type)
    .bind(event.chain_id)
    .bind(event.block_number)
    .bind(&event.block_hash)
    .bind(event.block_time)
    .bind(&event.token)
    .bind(&event.sender)
    .bind(&event.recipient)
    .bind(&event.amount)
    .bind(event.nonce)
    .bind(event.source_chain_id)
    .bind(event.target_chain_id)
    .execute(&mut **tx)
    .await
    .wrap_err("Failed to insert bridge event")?;

    Ok(result.rows_affected() == 1)
}

/// Ingest a Deposit event: record the raw event, upsert the transfer, and
/// complete it immediately when the matching withdrawal arrived first.
/// All writes happen in one transaction so a crash can never leave the
/// event without its transfer side effect.
pub async fn record_deposit(pool: &PgPool, event: &NewBridgeEvent) -> Result<DepositIngest> {
    let mut tx = pool.begin().await.wrap_err("Failed to begin transaction")?;

    if !insert_event(&mut tx, event).await? {
        tx.rollback().await.ok();
        return Ok(DepositIngest::Duplicate);
    }

    let target_chain_id = event.target_chain_id.unwrap_or_default();

    // Never overwrites withdraw-side fields of an existing row.
    sqlx::query(
        r#"
        INSERT INTO transfers (deposit_tx_hash, source_chain_id, target_chain_id, token,
            sender, recipient, amount, nonce, deposit_block, deposit_time)
        VALUES ($1, $2, $3, $4, $5, $6, $7::NUMERIC, $8, $9, $10)
        ON CONFLICT (deposit_tx_hash) DO NOTHING
        "#,
    )
    .bind(&event.tx_hash)
    .bind(event.chain_id)
    .bind(target_chain_id)
    .bind(&event.token)
    .bind(event.sender.as_deref().unwrap_or_default())
    .bind(&event.recipient)
    .bind(&event.amount)
    .bind(event.nonce)
    .bind(event.block_number)
    .bind(event.block_time)
    .execute(&mut *tx)
    .await
    .wrap_err("Failed to upsert transfer")?;

    // Cross-chain ordering: the withdrawal may have been indexed before
    // this deposit. Look it up and complete the pair on insert.
    let prior: Option<(String, i64, DateTime<Utc>)> = sqlx::query_as(
        r#"
        SELECT tx_hash, block_number, block_time FROM bridge_events
        WHERE event_type = 'withdraw' AND nonce = $1 AND source_chain_id = $2 AND chain_id = $3
        LIMIT 1
        "#,
    )
    .bind(event.nonce)
    .bind(event.chain_id)
    .bind(target_chain_id)
    .fetch_optional(&mut *tx)
    .await
    .wrap_err("Failed to look up prior withdrawal")?;

    let outcome = match prior {
        Some((withdraw_tx_hash, withdraw_block, withdraw_time)) => {
            sqlx::query(
                r#"
                UPDATE transfers
                SET withdraw_tx_hash = $2, withdraw_block = $3, withdraw_time = $4,
                    status = 'completed', updated_at = NOW()
                WHERE deposit_tx_hash = $1 AND withdraw_tx_hash IS NULL
                "#,
            )
            .bind(&event.tx_hash)
            .bind(&withdraw_tx_hash)
            .bind(withdraw_block)
            .bind(withdraw_time)
            .execute(&mut *tx)
            .await
            .wrap_err("Failed to complete transfer from prior withdrawal")?;
            DepositIngest::CompletedByPriorWithdraw
        }
        None => DepositIngest::Pending,
    };

    tx.commit().await.wrap_err("Failed to commit deposit ingest")?;
    Ok(outcome)
}

/// Ingest a Withdraw event: record the raw event and complete the matching
/// transfer identified by `(nonce, sourceChainId)` landing on this chain.
pub async fn record_withdraw(pool: &PgPool, event: &NewBridgeEvent) -> Result<WithdrawIngest> {
    let mut tx = pool.begin().await.wrap_err("Failed to begin transaction")?;

    if !insert_event(&mut tx, event).await? {
        tx.rollback().await.ok();
        return Ok(WithdrawIngest::Duplicate);
    }

    let source_chain_id = event.source_chain_id.unwrap_or_default();

    let updated = sqlx::query(
        r#"
        UPDATE transfers
        SET withdraw_tx_hash = $3, withdraw_block = $4, withdraw_time = $5,
            status = 'completed', updated_at = NOW()
        WHERE nonce = $1 AND source_chain_id = $2 AND target_chain_id = $6
          AND withdraw_tx_hash IS NULL
        "#,
    )
    .bind(event.nonce)
    .bind(source_chain_id)
    .bind(&event.tx_hash)
    .bind(event.block_number)
    .bind(event.block_time)
    .bind(event.chain_id)
    .execute(&mut *tx)
    .await
    .wrap_err("Failed to match withdrawal to transfer")?;

    tx.commit().await.wrap_err("Failed to commit withdraw ingest")?;

    if updated.rows_affected() == 1 {
        Ok(WithdrawIngest::Matched)
    } else {
        Ok(WithdrawIngest::Unmatched)
    }
}

// ─── Query surface ──────────────────────────────────────────────────────────

/// Recent events, newest first by block number.
pub async fn get_recent_events(pool: &PgPool, limit: i64) -> Result<Vec<BridgeEvent>> {
    let query = format!(
        "SELECT {EVENT_SELECT} FROM bridge_events ORDER BY block_number DESC, log_index DESC LIMIT $1"
    );
    sqlx::query_as::<_, BridgeEvent>(&query)
        .bind(limit)
        .fetch_all(pool)
        .await
        .wrap_err("Failed to list events")
}

pub async fn get_events_by_chain(pool: &PgPool, chain_id: i64, limit: i64) -> Result<Vec<BridgeEvent>> {
    let query = format!(
        "SELECT {EVENT_SELECT} FROM bridge_events WHERE chain_id = $1
         ORDER BY block_number DESC, log_index DESC LIMIT $2"
    );
    sqlx::query_as::<_, BridgeEvent>(&query)
        .bind(chain_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .wrap_err("Failed to list events by chain")
}

/// Events where `address` is the sender or the recipient. Addresses are
/// stored lowercased; the caller lowercases the filter.
pub async fn get_events_by_address(pool: &PgPool, address: &str, limit: i64) -> Result<Vec<BridgeEvent>> {
    let query = format!(
        "SELECT {EVENT_SELECT} FROM bridge_events WHERE sender = $1 OR recipient = $1
         ORDER BY block_number DESC, log_index DESC LIMIT $2"
    );
    sqlx::query_as::<_, BridgeEvent>(&query)
        .bind(address)
        .bind(limit)
        .fetch_all(pool)
        .await
        .wrap_err("Failed to list events by address")
}

pub async fn get_transfers(pool: &PgPool, status: Option<&str>, limit: i64) -> Result<Vec<Transfer>> {
    let rows = match status {
        Some(status) => {
            let query = format!(
                "SELECT {TRANSFER_SELECT} FROM transfers WHERE status = $1
                 ORDER BY deposit_block DESC LIMIT $2"
            );
            sqlx::query_as::<_, Transfer>(&query)
                .bind(status)
                .bind(limit)
                .fetch_all(pool)
                .await
        }
        None => {
            let query = format!(
                "SELECT {TRANSFER_SELECT} FROM transfers ORDER BY deposit_block DESC LIMIT $1"
            );
            sqlx::query_as::<_, Transfer>(&query)
                .bind(limit)
                .fetch_all(pool)
                .await
        }
    };
    rows.wrap_err("Failed to list transfers")
}

pub async fn get_transfers_by_address(pool: &PgPool, address: &str, limit: i64) -> Result<Vec<Transfer>> {
    let query = format!(
        "SELECT {TRANSFER_SELECT} FROM transfers WHERE sender = $1 OR recipient = $1
         ORDER BY deposit_block DESC LIMIT $2"
    );
    sqlx::query_as::<_, Transfer>(&query)
        .bind(address)
        .bind(limit)
        .fetch_all(pool)
        .await
        .wrap_err("Failed to list transfers by address")
}

pub async fn get_transfer_by_deposit(pool: &PgPool, deposit_tx_hash: &str) -> Result<Option<Transfer>> {
    let query = format!("SELECT {TRANSFER_SELECT} FROM transfers WHERE deposit_tx_hash = $1");
    sqlx::query_as::<_, Transfer>(&query)
        .bind(deposit_tx_hash)
        .fetch_optional(pool)
        .await
        .wrap_err("Failed to get transfer")
}

pub async fn count_transfers_by_status(pool: &PgPool, status: &str) -> Result<i64> {
    let row: (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM transfers WHERE status = $1"#)
        .bind(status)
        .fetch_one(pool)
        .await
        .wrap_err("Failed to count transfers")?;
    Ok(row.0)
}

// ─── Cursors ────────────────────────────────────────────────────────────────

pub async fn get_cursor(pool: &PgPool, chain_id: i64) -> Result<Option<i64>> {
    let row: Option<(i64,)> =
        sqlx::query_as(r#"SELECT last_block_number FROM chain_cursors WHERE chain_id = $1"#)
            .bind(chain_id)
            .fetch_optional(pool)
            .await
            .wrap_err("Failed to get chain cursor")?;
    Ok(row.map(|r| r.0))
}

pub async fn update_cursor(
    pool: &PgPool,
    chain_id: i64,
    chain_name: &str,
    block_number: i64,
    block_hash: &str,
    events_added: i64,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chain_cursors (chain_id, chain_name, last_block_number, last_block_hash, total_events)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (chain_id) DO UPDATE SET
            last_block_number = $3,
            last_block_hash = $4,
            total_events = chain_cursors.total_events + $5,
            last_synced_at = NOW()
        "#,
    )
    .bind(chain_id)
    .bind(chain_name)
    .bind(block_number)
    .bind(block_hash)
    .bind(events_added)
    .execute(pool)
    .await
    .wrap_err_with(|| format!("Failed to update cursor for chain {chain_id}"))?;

    Ok(())
}

pub async fn get_cursors(pool: &PgPool) -> Result<Vec<ChainCursor>> {
    sqlx::query_as::<_, ChainCursor>(
        r#"SELECT chain_id, chain_name, last_block_number, last_block_hash, total_events,
                  last_synced_at
           FROM chain_cursors ORDER BY chain_id ASC"#,
    )
    .fetch_all(pool)
    .await
    .wrap_err("Failed to get chain cursors")
}
