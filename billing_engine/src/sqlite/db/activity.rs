use sqlx::SqliteConnection;

use crate::db_types::{ActivityEntry, ActivityType, NewActivity};

pub async fn insert_activity(entry: NewActivity, conn: &mut SqliteConnection) -> Result<ActivityEntry, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO activity_log (event_type, description, related_id)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(entry.event_type.as_str())
    .bind(entry.description)
    .bind(entry.related_id)
    .fetch_one(conn)
    .await
}

/// Newest first. Entries written in the same second are ordered by insertion.
pub async fn fetch_activity(limit: i64, conn: &mut SqliteConnection) -> Result<Vec<ActivityEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM activity_log ORDER BY created_at DESC, id DESC LIMIT $1")
        .bind(limit)
        .fetch_all(conn)
        .await
}

pub async fn activity_exists(
    event_type: &ActivityType,
    related_id: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM activity_log WHERE event_type = $1 AND related_id = $2)")
        .bind(event_type.as_str())
        .bind(related_id)
        .fetch_one(conn)
        .await
}

pub async fn fetch_activity_by_type(
    event_type: &ActivityType,
    conn: &mut SqliteConnection,
) -> Result<Vec<ActivityEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM activity_log WHERE event_type = $1 ORDER BY created_at DESC, id DESC")
        .bind(event_type.as_str())
        .fetch_all(conn)
        .await
}
