//! Long-running background task that writes engine events to the database.
//!
//! The engine publishes synchronously while a pool is locked, so the sink
//! only pushes into an unbounded channel; the recorder task drains it and
//! does the actual I/O.

use deposit_pool::{EventSink, PoolEvent};
use sqlx::SqlitePool;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info};

use crate::db;
use crate::events::StoredEvent;

/// [`EventSink`] that forwards events to the recorder task.
pub struct ChannelSink {
    tx: UnboundedSender<PoolEvent>,
}

impl EventSink for ChannelSink {
    fn publish(&self, event: PoolEvent) {
        if let Err(e) = self.tx.send(event) {
            error!("Recorder is gone, dropping event: {:?}", e.0);
        }
    }
}

pub fn channel() -> (ChannelSink, UnboundedReceiver<PoolEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelSink { tx }, rx)
}

/// Drain `rx` into the database until every sender is dropped.
pub async fn run(pool: SqlitePool, instance_id: i64, mut rx: UnboundedReceiver<PoolEvent>) {
    info!("Recorder starting for instance {instance_id}");

    while let Some(event) = rx.recv().await {
        if let Err(e) = record_one(&pool, instance_id, &event).await {
            error!("Failed to record {} event: {e}", event.as_str());
        }
    }

    info!("Recorder stopped");
}

async fn record_one(
    pool: &SqlitePool,
    instance_id: i64,
    event: &PoolEvent,
) -> crate::errors::Result<()> {
    let stored = StoredEvent::from_event(event)?;
    let id = db::insert_event(pool, instance_id, &stored).await?;
    debug!(id, event_type = %stored.event_type, "event recorded");
    Ok(())
}
