//! The idempotency guard table.
use chrono::{DateTime, Utc};
use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{EventOutcome, ProcessedEvent};

/// Inserts a guard record for `event_id`. Returns `false` (and writes nothing) if the event has been seen before.
pub async fn try_insert(
    event_id: &str,
    event_type: &str,
    outcome: EventOutcome,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            INSERT INTO processed_events (event_id, event_type, outcome)
            VALUES ($1, $2, $3)
            ON CONFLICT(event_id) DO NOTHING
        "#,
    )
    .bind(event_id)
    .bind(event_type)
    .bind(outcome)
    .execute(conn)
    .await?;
    let inserted = result.rows_affected() == 1;
    trace!("🛡️ Guard record for {event_id}: {}", if inserted { "claimed" } else { "already present" });
    Ok(inserted)
}

pub async fn update_outcome(
    event_id: &str,
    outcome: EventOutcome,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE processed_events SET outcome = $1 WHERE event_id = $2")
        .bind(outcome)
        .bind(event_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_processed_event(
    event_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<ProcessedEvent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM processed_events WHERE event_id = $1").bind(event_id).fetch_optional(conn).await
}

pub async fn purge_older_than(older_than: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM processed_events WHERE datetime(processed_at) < datetime($1)")
        .bind(older_than)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
