//! Audit trail persistence: an append-only hash chain.
//!
//! Links are inserted inside the same transaction as the change they
//! describe, so a rolled-back operation leaves no link behind.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::LOAD_MAX_ROWS;
use crate::records::AuditTrailRecord;

pub async fn insert(conn: &mut PgConnection, r: &AuditTrailRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_trail (id, seq, user_id, action, entity_type, entity_id,
         details, previous_hash, hash, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(r.id)
    .bind(r.seq)
    .bind(r.user_id)
    .bind(&r.action)
    .bind(&r.entity_type)
    .bind(r.entity_id)
    .bind(&r.details)
    .bind(&r.previous_hash)
    .bind(&r.hash)
    .bind(r.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn load_all(pool: &PgPool) -> Result<Vec<AuditTrailRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuditTrailRow>(
        "SELECT id, seq, user_id, action, entity_type, entity_id, details,
         previous_hash, hash, created_at
         FROM audit_trail ORDER BY seq LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| AuditTrailRecord {
            id: r.id,
            seq: r.seq,
            user_id: r.user_id,
            action: r.action,
            entity_type: r.entity_type,
            entity_id: r.entity_id,
            details: r.details,
            previous_hash: r.previous_hash,
            hash: r.hash,
            created_at: r.created_at,
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct AuditTrailRow {
    id: Uuid,
    seq: i64,
    user_id: Option<Uuid>,
    action: String,
    entity_type: String,
    entity_id: Option<Uuid>,
    details: serde_json::Value,
    previous_hash: String,
    hash: String,
    created_at: DateTime<Utc>,
}
