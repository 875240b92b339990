//! Refund and objection persistence.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use taxadmin_core::Money;
use uuid::Uuid;

use super::{label, LOAD_MAX_ROWS};
use crate::records::{ObjectionRecord, RefundRecord};

pub async fn upsert_refund(conn: &mut PgConnection, r: &RefundRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO refunds (id, account_id, amount, reason, reference_number, status,
         request_date, approval_date, payment_date, requested_by, decided_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         ON CONFLICT (id) DO UPDATE SET
           status = EXCLUDED.status, approval_date = EXCLUDED.approval_date,
           payment_date = EXCLUDED.payment_date, decided_by = EXCLUDED.decided_by",
    )
    .bind(r.id)
    .bind(r.account_id)
    .bind(r.amount.as_decimal())
    .bind(&r.reason)
    .bind(&r.reference_number)
    .bind(r.status.as_str())
    .bind(r.request_date)
    .bind(r.approval_date)
    .bind(r.payment_date)
    .bind(r.requested_by)
    .bind(r.decided_by)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn upsert_objection(conn: &mut PgConnection, r: &ObjectionRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO objections (id, tax_return_id, account_id, reason, reference_number,
         status, filing_date, decision, decision_date, filed_by, decided_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         ON CONFLICT (id) DO UPDATE SET
           status = EXCLUDED.status, decision = EXCLUDED.decision,
           decision_date = EXCLUDED.decision_date, decided_by = EXCLUDED.decided_by",
    )
    .bind(r.id)
    .bind(r.tax_return_id)
    .bind(r.account_id)
    .bind(&r.reason)
    .bind(&r.reference_number)
    .bind(r.status.as_str())
    .bind(r.filing_date)
    .bind(&r.decision)
    .bind(r.decision_date)
    .bind(r.filed_by)
    .bind(r.decided_by)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn load_refunds(pool: &PgPool) -> Result<Vec<RefundRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RefundRow>(
        "SELECT id, account_id, amount, reason, reference_number, status, request_date,
         approval_date, payment_date, requested_by, decided_by
         FROM refunds ORDER BY request_date LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .filter_map(|r| {
            Some(RefundRecord {
                status: label("refunds", r.id, &r.status)?,
                id: r.id,
                account_id: r.account_id,
                amount: Money::from_decimal(r.amount),
                reason: r.reason,
                reference_number: r.reference_number,
                request_date: r.request_date,
                approval_date: r.approval_date,
                payment_date: r.payment_date,
                requested_by: r.requested_by,
                decided_by: r.decided_by,
            })
        })
        .collect())
}

pub async fn load_objections(pool: &PgPool) -> Result<Vec<ObjectionRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ObjectionRow>(
        "SELECT id, tax_return_id, account_id, reason, reference_number, status,
         filing_date, decision, decision_date, filed_by, decided_by
         FROM objections ORDER BY filing_date LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .filter_map(|r| {
            Some(ObjectionRecord {
                status: label("objections", r.id, &r.status)?,
                id: r.id,
                tax_return_id: r.tax_return_id,
                account_id: r.account_id,
                reason: r.reason,
                reference_number: r.reference_number,
                filing_date: r.filing_date,
                decision: r.decision,
                decision_date: r.decision_date,
                filed_by: r.filed_by,
                decided_by: r.decided_by,
            })
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct RefundRow {
    id: Uuid,
    account_id: Uuid,
    amount: Decimal,
    reason: String,
    reference_number: String,
    status: String,
    request_date: DateTime<Utc>,
    approval_date: Option<DateTime<Utc>>,
    payment_date: Option<DateTime<Utc>>,
    requested_by: Option<Uuid>,
    decided_by: Option<Uuid>,
}

#[derive(sqlx::FromRow)]
struct ObjectionRow {
    id: Uuid,
    tax_return_id: Uuid,
    account_id: Uuid,
    reason: String,
    reference_number: String,
    status: String,
    filing_date: DateTime<Utc>,
    decision: Option<String>,
    decision_date: Option<DateTime<Utc>>,
    filed_by: Option<Uuid>,
    decided_by: Option<Uuid>,
}
