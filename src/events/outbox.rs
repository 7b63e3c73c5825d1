use crate::entities::outbox_event::{self, Entity as OutboxEvent};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait,
    DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const MAX_ATTEMPTS: i32 = 8;
const BASE_BACKOFF_SECS: i64 = 2;
/// A `processing` row untouched for this long is assumed abandoned by its worker.
pub const PROCESSING_LEASE_SECS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxStatus {
    Pending,
    Processing,
    Delivered,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Processing => "processing",
            OutboxStatus::Delivered => "delivered",
            OutboxStatus::Failed => "failed",
        }
    }
}

/// Enqueue an event into the outbox table. Call with the transaction of the write that raised it.
pub async fn enqueue(db: &impl ConnectionTrait, event: &Event) -> Result<Uuid, ServiceError> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let payload = serde_json::to_value(event)?;

    outbox_event::ActiveModel {
        id: Set(id),
        aggregate_type: Set(event.aggregate_type().to_string()),
        aggregate_id: Set(Some(event.aggregate_id())),
        event_type: Set(event.event_type().to_string()),
        payload: Set(payload),
        status: Set(OutboxStatus::Pending.as_str().to_string()),
        attempts: Set(0),
        available_at: Set(now),
        created_at: Set(now),
        updated_at: Set(None),
        processed_at: Set(None),
        error_message: Set(None),
    }
    .insert(db)
    .await?;

    debug!(
        outbox_id = %id,
        event_type = event.event_type(),
        aggregate = event.aggregate_type(),
        "Outbox row staged"
    );
    Ok(id)
}

/// Spawns the relay that repeatedly runs [`drain_once`], sleeping `poll_interval` between passes.
pub fn start_worker(
    db: Arc<DatabaseConnection>,
    sender: EventSender,
    poll_interval: Duration,
    batch_size: u64,
) -> tokio::task::JoinHandle<()> {
    info!(
        "Starting outbox worker (poll every {:?}, batch {})",
        poll_interval, batch_size
    );
    tokio::spawn(async move {
        loop {
            if let Err(e) = drain_once(&db, &sender, batch_size).await {
                error!("outbox worker error: {}", e);
            }
            sleep(poll_interval).await;
        }
    })
}

/// Claims up to `batch_size` due rows and dispatches them. Returns the number delivered.
pub async fn drain_once(
    db: &DatabaseConnection,
    sender: &EventSender,
    batch_size: u64,
) -> Result<usize, ServiceError> {
    let now = Utc::now();
    reclaim_abandoned(db, now - chrono::Duration::seconds(PROCESSING_LEASE_SECS)).await?;

    let due = OutboxEvent::find()
        .filter(outbox_event::Column::Status.eq(OutboxStatus::Pending.as_str()))
        .filter(outbox_event::Column::AvailableAt.lte(now))
        .order_by_asc(outbox_event::Column::CreatedAt)
        .limit(batch_size)
        .all(db)
        .await?;

    let mut delivered = 0;
    for row in due {
        // Conditional status flip; a concurrent worker that got here first wins.
        let claimed = OutboxEvent::update_many()
            .col_expr(
                outbox_event::Column::Status,
                Expr::value(OutboxStatus::Processing.as_str()),
            )
            .col_expr(
                outbox_event::Column::Attempts,
                Expr::col(outbox_event::Column::Attempts).add(1),
            )
            .col_expr(outbox_event::Column::UpdatedAt, Expr::value(Some(now)))
            .filter(outbox_event::Column::Id.eq(row.id))
            .filter(outbox_event::Column::Status.eq(OutboxStatus::Pending.as_str()))
            .exec(db)
            .await?;
        if claimed.rows_affected != 1 {
            continue;
        }
        let attempts = row.attempts + 1;

        let event = match serde_json::from_value::<Event>(row.payload.clone()) {
            Ok(event) => event,
            Err(e) => {
                warn!("outbox {} has undecodable payload: {}", row.id, e);
                mark(db, row.id, OutboxStatus::Failed, None, Some(e.to_string())).await?;
                continue;
            }
        };

        match sender.send(event).await {
            Ok(()) => {
                let mut active: outbox_event::ActiveModel = row.into();
                active.status = Set(OutboxStatus::Delivered.as_str().to_string());
                active.attempts = Set(attempts);
                active.processed_at = Set(Some(Utc::now()));
                active.updated_at = Set(Some(Utc::now()));
                active.error_message = Set(None);
                active.update(db).await?;
                delivered += 1;
            }
            Err(e) if attempts < MAX_ATTEMPTS => {
                let retry_at = next_attempt_at(Utc::now(), attempts);
                mark(db, row.id, OutboxStatus::Pending, Some(retry_at), Some(e.to_string())).await?;
            }
            Err(e) => {
                warn!("outbox {} exceeded {} attempts", row.id, MAX_ATTEMPTS);
                mark(
                    db,
                    row.id,
                    OutboxStatus::Failed,
                    None,
                    Some(format!("max attempts exceeded: {e}")),
                )
                .await?;
            }
        }
    }

    if delivered > 0 {
        metrics::counter!("catalog.outbox.delivered", delivered as u64);
    }
    Ok(delivered)
}

/// Returns rows stuck in `processing` since before `cutoff` to `pending`, so a worker that
/// died between claiming and marking a row does not strand it.
pub async fn reclaim_abandoned(db: &DatabaseConnection, cutoff: DateTime<Utc>) -> Result<u64, ServiceError> {
    let reclaimed = OutboxEvent::update_many()
        .col_expr(outbox_event::Column::Status, Expr::value(OutboxStatus::Pending.as_str()))
        .col_expr(outbox_event::Column::UpdatedAt, Expr::value(Some(Utc::now())))
        .filter(outbox_event::Column::Status.eq(OutboxStatus::Processing.as_str()))
        .filter(
            Condition::any()
                .add(outbox_event::Column::UpdatedAt.lt(cutoff))
                .add(outbox_event::Column::UpdatedAt.is_null()),
        )
        .exec(db)
        .await?
        .rows_affected;
    if reclaimed > 0 {
        warn!(reclaimed, "Reclaimed abandoned outbox rows");
        metrics::counter!("catalog.outbox.reclaimed", reclaimed);
    }
    Ok(reclaimed)
}

async fn mark(
    db: &DatabaseConnection,
    id: Uuid,
    status: OutboxStatus,
    available_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
) -> Result<(), ServiceError> {
    let mut update = OutboxEvent::update_many()
        .col_expr(outbox_event::Column::Status, Expr::value(status.as_str()))
        .col_expr(outbox_event::Column::UpdatedAt, Expr::value(Some(Utc::now())))
        .col_expr(outbox_event::Column::ErrorMessage, Expr::value(error_message));
    if let Some(at) = available_at {
        update = update.col_expr(outbox_event::Column::AvailableAt, Expr::value(at));
    }
    update
        .filter(outbox_event::Column::Id.eq(id))
        .exec(db)
        .await?;
    Ok(())
}

/// Exponential backoff with sub-second jitter.
fn next_attempt_at(now: DateTime<Utc>, attempts: i32) -> DateTime<Utc> {
    let backoff = BASE_BACKOFF_SECS.saturating_pow(attempts.max(0) as u32);
    let jitter_ms = now.timestamp_subsec_millis() as i64;
    now + chrono::Duration::seconds(backoff) + chrono::Duration::milliseconds(jitter_ms)
}
