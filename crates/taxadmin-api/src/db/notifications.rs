//! Notification persistence.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{label, LOAD_MAX_ROWS};
use crate::records::NotificationRecord;

pub async fn upsert(conn: &mut PgConnection, r: &NotificationRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO notifications (id, user_id, title, message, notification_type,
         is_read, created_at, read_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         ON CONFLICT (id) DO UPDATE SET is_read = EXCLUDED.is_read, read_at = EXCLUDED.read_at",
    )
    .bind(r.id)
    .bind(r.user_id)
    .bind(&r.title)
    .bind(&r.message)
    .bind(r.notification_type.as_str())
    .bind(r.is_read)
    .bind(r.created_at)
    .bind(r.read_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn load_all(pool: &PgPool) -> Result<Vec<NotificationRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, NotificationRow>(
        "SELECT id, user_id, title, message, notification_type, is_read, created_at, read_at
         FROM notifications ORDER BY created_at LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .filter_map(|r| {
            Some(NotificationRecord {
                notification_type: label("notifications", r.id, &r.notification_type)?,
                id: r.id,
                user_id: r.user_id,
                title: r.title,
                message: r.message,
                is_read: r.is_read,
                created_at: r.created_at,
                read_at: r.read_at,
            })
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    message: String,
    notification_type: String,
    is_read: bool,
    created_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
}
