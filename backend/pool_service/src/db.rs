//! Database layer: migrations, event writes and event queries.
//!
//! Every row carries the `instance_id` of the engine that produced it. The
//! engine's ledger lives in memory, so pool indices restart at 0 whenever the
//! service restarts; rows from earlier instances are kept for audit but
//! queries only look at the current one.

use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use tracing::info;

use crate::errors::Result;
use crate::events::{EventRecord, StoredEvent};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };
    // Each in-memory connection gets its own database, so keep exactly one alive.
    let in_memory = url.contains(":memory:");

    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
    let mut pool_options = SqlitePoolOptions::new().max_connections(5);
    if in_memory {
        pool_options = pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }
    let pool = pool_options
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Event writes
// ─────────────────────────────────────────────────────────

/// Append one event. Rows are written in the order the engine published them.
pub async fn insert_event(pool: &SqlitePool, instance_id: i64, event: &StoredEvent) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO events (instance_id, event_type, pool_index, actor, amount, payload)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(instance_id)
    .bind(&event.event_type)
    .bind(event.pool_index)
    .bind(&event.actor)
    .bind(&event.amount)
    .bind(&event.payload)
    .execute(pool)
    .await?
    .last_insert_rowid();
    Ok(id)
}

// ─────────────────────────────────────────────────────────
// Event reads
// ─────────────────────────────────────────────────────────

/// Fetch all events for a given pool, in publication order.
pub async fn get_events_for_pool(
    pool: &SqlitePool,
    instance_id: i64,
    pool_index: i64,
) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(
        r#"
        SELECT id, instance_id, event_type, pool_index, actor, amount, payload, created_at
        FROM   events
        WHERE  instance_id = ?1 AND pool_index = ?2
        ORDER  BY id ASC
        "#,
    )
    .bind(instance_id)
    .bind(pool_index)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Fetch all events of the current instance, in publication order.
pub async fn get_all_events(pool: &SqlitePool, instance_id: i64) -> Result<Vec<EventRecord>> {
    let rows = sqlx::query_as::<_, EventRecord>(
        r#"
        SELECT id, instance_id, event_type, pool_index, actor, amount, payload, created_at
        FROM   events
        WHERE  instance_id = ?1
        ORDER  BY id ASC
        "#,
    )
    .bind(instance_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Pool indices finalized with `reward_address`, oldest first.
///
/// This is how a client that only observed a token transfer finds its pool.
pub async fn get_finalized_pools(
    pool: &SqlitePool,
    instance_id: i64,
    reward_address: &str,
) -> Result<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        r#"
        SELECT pool_index
        FROM   events
        WHERE  instance_id = ?1 AND event_type = 'finalized' AND actor = ?2
        ORDER  BY id ASC
        "#,
    )
    .bind(instance_id)
    .bind(reward_address)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(i,)| i).collect())
}
