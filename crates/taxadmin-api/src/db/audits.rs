//! Audit, audit case and collection persistence.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use taxadmin_core::Money;
use uuid::Uuid;

use super::{label, LOAD_MAX_ROWS};
use crate::records::{AuditCaseRecord, AuditRecord, CollectionRecord};

pub async fn upsert_audit(conn: &mut PgConnection, r: &AuditRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audits (id, account_id, tax_type_id, tax_return_id, audit_type,
         start_date, end_date, status, auditor_id, findings, additional_assessment,
         outcome, reference_number, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
         ON CONFLICT (id) DO UPDATE SET
           end_date = EXCLUDED.end_date, status = EXCLUDED.status,
           auditor_id = EXCLUDED.auditor_id, findings = EXCLUDED.findings,
           additional_assessment = EXCLUDED.additional_assessment,
           outcome = EXCLUDED.outcome",
    )
    .bind(r.id)
    .bind(r.account_id)
    .bind(r.tax_type_id)
    .bind(r.tax_return_id)
    .bind(r.audit_type.as_str())
    .bind(r.start_date)
    .bind(r.end_date)
    .bind(r.status.as_str())
    .bind(r.auditor_id)
    .bind(&r.findings)
    .bind(r.additional_assessment.as_decimal())
    .bind(&r.outcome)
    .bind(&r.reference_number)
    .bind(r.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn upsert_audit_case(conn: &mut PgConnection, r: &AuditCaseRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO audit_cases (id, account_id, audit_id, case_number, tax_period,
         description, status, open_date, close_date)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, close_date = EXCLUDED.close_date",
    )
    .bind(r.id)
    .bind(r.account_id)
    .bind(r.audit_id)
    .bind(&r.case_number)
    .bind(&r.tax_period)
    .bind(&r.description)
    .bind(r.status.as_str())
    .bind(r.open_date)
    .bind(r.close_date)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn upsert_collection(conn: &mut PgConnection, r: &CollectionRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO collections (id, account_id, tax_return_id, amount_due, collection_type,
         start_date, due_date, status, reference_number, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         ON CONFLICT (id) DO UPDATE SET
           amount_due = EXCLUDED.amount_due, status = EXCLUDED.status,
           due_date = EXCLUDED.due_date",
    )
    .bind(r.id)
    .bind(r.account_id)
    .bind(r.tax_return_id)
    .bind(r.amount_due.as_decimal())
    .bind(r.collection_type.as_str())
    .bind(r.start_date)
    .bind(r.due_date)
    .bind(r.status.as_str())
    .bind(&r.reference_number)
    .bind(r.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn load_audits(pool: &PgPool) -> Result<Vec<AuditRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuditRow>(
        "SELECT id, account_id, tax_type_id, tax_return_id, audit_type, start_date, end_date,
         status, auditor_id, findings, additional_assessment, outcome, reference_number,
         created_at
         FROM audits ORDER BY created_at LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().filter_map(AuditRow::into_record).collect())
}

pub async fn load_audit_cases(pool: &PgPool) -> Result<Vec<AuditCaseRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuditCaseRow>(
        "SELECT id, account_id, audit_id, case_number, tax_period, description, status,
         open_date, close_date
         FROM audit_cases ORDER BY open_date LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .filter_map(|r| {
            Some(AuditCaseRecord {
                status: label("audit_cases", r.id, &r.status)?,
                id: r.id,
                account_id: r.account_id,
                audit_id: r.audit_id,
                case_number: r.case_number,
                tax_period: r.tax_period,
                description: r.description,
                open_date: r.open_date,
                close_date: r.close_date,
            })
        })
        .collect())
}

pub async fn load_collections(pool: &PgPool) -> Result<Vec<CollectionRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CollectionRow>(
        "SELECT id, account_id, tax_return_id, amount_due, collection_type, start_date,
         due_date, status, reference_number, created_at
         FROM collections ORDER BY created_at LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .filter_map(|r| {
            Some(CollectionRecord {
                collection_type: label("collections", r.id, &r.collection_type)?,
                status: label("collections", r.id, &r.status)?,
                id: r.id,
                account_id: r.account_id,
                tax_return_id: r.tax_return_id,
                amount_due: Money::from_decimal(r.amount_due),
                start_date: r.start_date,
                due_date: r.due_date,
                reference_number: r.reference_number,
                created_at: r.created_at,
            })
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    account_id: Uuid,
    tax_type_id: Uuid,
    tax_return_id: Option<Uuid>,
    audit_type: String,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    status: String,
    auditor_id: Option<Uuid>,
    findings: Option<String>,
    additional_assessment: Decimal,
    outcome: Option<String>,
    reference_number: String,
    created_at: DateTime<Utc>,
}

impl AuditRow {
    fn into_record(self) -> Option<AuditRecord> {
        Some(AuditRecord {
            audit_type: label("audits", self.id, &self.audit_type)?,
            status: label("audits", self.id, &self.status)?,
            id: self.id,
            account_id: self.account_id,
            tax_type_id: self.tax_type_id,
            tax_return_id: self.tax_return_id,
            start_date: self.start_date,
            end_date: self.end_date,
            auditor_id: self.auditor_id,
            findings: self.findings,
            additional_assessment: Money::from_decimal(self.additional_assessment),
            outcome: self.outcome,
            reference_number: self.reference_number,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AuditCaseRow {
    id: Uuid,
    account_id: Uuid,
    audit_id: Uuid,
    case_number: String,
    tax_period: String,
    description: String,
    status: String,
    open_date: NaiveDate,
    close_date: Option<NaiveDate>,
}

#[derive(sqlx::FromRow)]
struct CollectionRow {
    id: Uuid,
    account_id: Uuid,
    tax_return_id: Uuid,
    amount_due: Decimal,
    collection_type: String,
    start_date: NaiveDate,
    due_date: NaiveDate,
    status: String,
    reference_number: String,
    created_at: DateTime<Utc>,
}
