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

/// SELECT columns for bridge_transactions (NUMERIC cast to TEXT).
const TX_SELECT: &str = r#"id, source_tx_hash, target_tx_hash, source_chain_id, target_chain_id,
    token, sender, recipient, amount::TEXT as amount, nonce, block_number, status,
    error_message, created_at, updated_at"#;

/// Record a deposit once. Re-deliveries of the same `source_tx_hash` are
/// no-ops: existing rows keep their status and target hash untouched.
/// Returns true when a new row was created.
pub async fn insert_transaction(pool: &PgPool, tx: &NewBridgeTransaction) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO bridge_transactions (source_tx_hash, source_chain_id, target_chain_id,
            token, sender, recipient, amount, nonce, block_number)
        VALUES ($1, $2, $3, $4, $5, $6, $7::NUMERIC, $8, $9)
        ON CONFLICT (source_tx_hash) DO NOTHING
        "#,
    )
    .bind(&tx.source_tx_hash)
    .bind(tx.source_chain_id)
    .bind(tx.target_chain_id)
    .bind(&tx.token)
    .bind(&tx.sender)
    .bind(&tx.recipient)
    .bind(&tx.amount)
    .bind(tx.nonce)
    .bind(tx.block_number)
    .execute(pool)
    .await
    .wrap_err("Failed to insert bridge transaction")?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_transaction(
    pool: &PgPool,
    source_tx_hash: &str,
) -> Result<Option<BridgeTransaction>> {
    let query = format!("SELECT {TX_SELECT} FROM bridge_transactions WHERE source_tx_hash = $1");
    sqlx::query_as::<_, BridgeTransaction>(&query)
        .bind(source_tx_hash)
        .fetch_optional(pool)
        .await
        .wrap_err("Failed to get bridge transaction")
}

/// pending → relaying. Guarded so the transition is monotone; returns
/// false when the row was not in `pending`.
pub async fn mark_relaying(pool: &PgPool, source_tx_hash: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"UPDATE bridge_transactions
           SET status = 'relaying', updated_at = NOW()
           WHERE source_tx_hash = $1 AND status = 'pending'"#,
    )
    .bind(source_tx_hash)
    .execute(pool)
    .await
    .wrap_err_with(|| format!("Failed to mark {source_tx_hash} relaying"))?;

    Ok(result.rows_affected() == 1)
}

/// relaying → completed, recording the target transaction hash (empty
/// string for the already-processed short-circuit).
pub async fn mark_completed(
    pool: &PgPool,
    source_tx_hash: &str,
    target_tx_hash: &str,
) -> Result<()> {
    sqlx::query(
        r#"UPDATE bridge_transactions
           SET status = 'completed', target_tx_hash = $2, error_message = NULL, updated_at = NOW()
           WHERE source_tx_hash = $1 AND status = 'relaying'"#,
    )
    .bind(source_tx_hash)
    .bind(target_tx_hash)
    .execute(pool)
    .await
    .wrap_err_with(|| format!("Failed to mark {source_tx_hash} completed"))?;

    Ok(())
}

/// relaying → failed with the (truncated) error string.
pub async fn mark_failed(pool: &PgPool, source_tx_hash: &str, error: &str) -> Result<()> {
    let truncated: String = error.chars().take(500).collect();
    sqlx::query(
        r#"UPDATE bridge_transactions
           SET status = 'failed', error_message = $2, updated_at = NOW()
           WHERE source_tx_hash = $1 AND status = 'relaying'"#,
    )
    .bind(source_tx_hash)
    .bind(&truncated)
    .execute(pool)
    .await
    .wrap_err_with(|| format!("Failed to mark {source_tx_hash} failed"))?;

    Ok(())
}

/// Rows left in `relaying` by a previous run, oldest first.
pub async fn get_relaying_transactions(pool: &PgPool) -> Result<Vec<BridgeTransaction>> {
    let query = format!(
        "SELECT {TX_SELECT} FROM bridge_transactions WHERE status = 'relaying' ORDER BY created_at ASC"
    );
    sqlx::query_as::<_, BridgeTransaction>(&query)
        .fetch_all(pool)
        .await
        .wrap_err("Failed to get relaying transactions")
}

/// Recent transactions for the API, optionally filtered by status.
pub async fn get_transactions(
    pool: &PgPool,
    status: Option<&str>,
    limit: i64,
) -> Result<Vec<BridgeTransaction>> {
    let rows = match status {
        Some(status) => {
            let query = format!(
                "SELECT {TX_SELECT} FROM bridge_transactions WHERE status = $1
                 ORDER BY block_number DESC LIMIT $2"
            );
            sqlx::query_as::<_, BridgeTransaction>(&query)
                .bind(status)
                .bind(limit)
                .fetch_all(pool)
                .await
        }
        None => {
            let query = format!(
                "SELECT {TX_SELECT} FROM bridge_transactions ORDER BY block_number DESC LIMIT $1"
            );
            sqlx::query_as::<_, BridgeTransaction>(&query)
                .bind(limit)
                .fetch_all(pool)
                .await
        }
    };

    rows.wrap_err("Failed to list bridge transactions")
}

pub async fn count_by_status(pool: &PgPool, status: &str) -> Result<i64> {
    let row: (i64,) =
        sqlx::query_as(r#"SELECT COUNT(*) FROM bridge_transactions WHERE status = $1"#)
            .bind(status)
            .fetch_one(pool)
            .await
            .wrap_err("Failed to count bridge transactions")?;
    Ok(row.0)
}

/// Store this validator's signature for a deposit. Idempotent on
/// `(source_tx_hash, validator)`.
pub async fn insert_signature(
    pool: &PgPool,
    source_tx_hash: &str,
    validator: &str,
    signature: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO validator_signatures (source_tx_hash, validator, signature)
        VALUES ($1, $2, $3)
        ON CONFLICT (source_tx_hash, validator) DO NOTHING
        "#,
    )
    .bind(source_tx_hash)
    .bind(validator)
    .bind(signature)
    .execute(pool)
    .await
    .wrap_err("Failed to insert validator signature")?;

    Ok(())
}

pub async fn get_signatures(pool: &PgPool, source_tx_hash: &str) -> Result<Vec<ValidatorSignature>> {
    sqlx::query_as::<_, ValidatorSignature>(
        r#"SELECT id, source_tx_hash, validator, signature, created_at
           FROM validator_signatures WHERE source_tx_hash = $1 ORDER BY created_at ASC"#,
    )
    .bind(source_tx_hash)
    .fetch_all(pool)
    .await
    .wrap_err("Failed to get validator signatures")
}

/// Last fully scanned block for a chain, if a cursor exists.
pub async fn get_cursor(pool: &PgPool, chain_id: i64) -> Result<Option<i64>> {
    let row: Option<(i64,)> =
        sqlx::query_as(r#"SELECT last_block_number FROM chain_cursors WHERE chain_id = $1"#)
            .bind(chain_id)
            .fetch_optional(pool)
            .await
            .wrap_err("Failed to get chain cursor")?;
    Ok(row.map(|r| r.0))
}

/// Advance the cursor after a fully processed window.
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
