//! Tax return and payment persistence.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use taxadmin_core::Money;
use uuid::Uuid;

use super::{label, LOAD_MAX_ROWS};
use crate::records::{PaymentRecord, TaxReturnRecord};

pub async fn upsert_return(conn: &mut PgConnection, r: &TaxReturnRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO tax_returns (id, account_id, tax_type_id, tax_period_id, reference_number,
         filing_date, due_amount, status, assessment_date, assessment_type, is_flagged,
         flag_reason, filed_by, version, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
         ON CONFLICT (id) DO UPDATE SET
           filing_date = EXCLUDED.filing_date, due_amount = EXCLUDED.due_amount,
           status = EXCLUDED.status, assessment_date = EXCLUDED.assessment_date,
           assessment_type = EXCLUDED.assessment_type, is_flagged = EXCLUDED.is_flagged,
           flag_reason = EXCLUDED.flag_reason, version = EXCLUDED.version",
    )
    .bind(r.id)
    .bind(r.account_id)
    .bind(r.tax_type_id)
    .bind(r.tax_period_id)
    .bind(&r.reference_number)
    .bind(r.filing_date)
    .bind(r.due_amount.as_decimal())
    .bind(r.status.as_str())
    .bind(r.assessment_date)
    .bind(r.assessment_type.map(|t| t.as_str()))
    .bind(r.is_flagged)
    .bind(&r.flag_reason)
    .bind(r.filed_by)
    .bind(r.version)
    .bind(r.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn upsert_payment(conn: &mut PgConnection, r: &PaymentRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO payments (id, tax_return_id, account_id, collection_id, amount,
         payment_date, payment_method, reference_number, status, recorded_by, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, payment_date = EXCLUDED.payment_date",
    )
    .bind(r.id)
    .bind(r.tax_return_id)
    .bind(r.account_id)
    .bind(r.collection_id)
    .bind(r.amount.as_decimal())
    .bind(r.payment_date)
    .bind(r.payment_method.as_str())
    .bind(&r.reference_number)
    .bind(r.status.as_str())
    .bind(r.recorded_by)
    .bind(r.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn load_returns(pool: &PgPool) -> Result<Vec<TaxReturnRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TaxReturnRow>(
        "SELECT id, account_id, tax_type_id, tax_period_id, reference_number, filing_date,
         due_amount, status, assessment_date, assessment_type, is_flagged, flag_reason,
         filed_by, version, created_at
         FROM tax_returns ORDER BY created_at LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().filter_map(TaxReturnRow::into_record).collect())
}

pub async fn load_payments(pool: &PgPool) -> Result<Vec<PaymentRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PaymentRow>(
        "SELECT id, tax_return_id, account_id, collection_id, amount, payment_date,
         payment_method, reference_number, status, recorded_by, created_at
         FROM payments ORDER BY created_at LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().filter_map(PaymentRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct TaxReturnRow {
    id: Uuid,
    account_id: Uuid,
    tax_type_id: Uuid,
    tax_period_id: Uuid,
    reference_number: String,
    filing_date: Option<DateTime<Utc>>,
    due_amount: Decimal,
    status: String,
    assessment_date: Option<DateTime<Utc>>,
    assessment_type: Option<String>,
    is_flagged: bool,
    flag_reason: Option<String>,
    filed_by: Option<Uuid>,
    version: i64,
    created_at: DateTime<Utc>,
}

impl TaxReturnRow {
    fn into_record(self) -> Option<TaxReturnRecord> {
        let assessment_type = match &self.assessment_type {
            Some(raw) => Some(label("tax_returns", self.id, raw)?),
            None => None,
        };
        Some(TaxReturnRecord {
            status: label("tax_returns", self.id, &self.status)?,
            assessment_type,
            id: self.id,
            account_id: self.account_id,
            tax_type_id: self.tax_type_id,
            tax_period_id: self.tax_period_id,
            reference_number: self.reference_number,
            filing_date: self.filing_date,
            due_amount: Money::from_decimal(self.due_amount),
            assessment_date: self.assessment_date,
            is_flagged: self.is_flagged,
            flag_reason: self.flag_reason,
            filed_by: self.filed_by,
            version: self.version,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    tax_return_id: Uuid,
    account_id: Uuid,
    collection_id: Option<Uuid>,
    amount: Decimal,
    payment_date: DateTime<Utc>,
    payment_method: String,
    reference_number: String,
    status: String,
    recorded_by: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_record(self) -> Option<PaymentRecord> {
        Some(PaymentRecord {
            payment_method: label("payments", self.id, &self.payment_method)?,
            status: label("payments", self.id, &self.status)?,
            id: self.id,
            tax_return_id: self.tax_return_id,
            account_id: self.account_id,
            collection_id: self.collection_id,
            amount: Money::from_decimal(self.amount),
            payment_date: self.payment_date,
            reference_number: self.reference_number,
            recorded_by: self.recorded_by,
            created_at: self.created_at,
        })
    }
}
