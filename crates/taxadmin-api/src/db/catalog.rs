//! Tax type and tax period persistence.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{label, LOAD_MAX_ROWS};
use crate::records::{TaxPeriodRecord, TaxTypeRecord};

pub async fn upsert_tax_type(conn: &mut PgConnection, r: &TaxTypeRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO tax_types (id, code, name, description, is_core, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (id) DO UPDATE SET
           code = EXCLUDED.code, name = EXCLUDED.name,
           description = EXCLUDED.description, is_core = EXCLUDED.is_core",
    )
    .bind(r.id)
    .bind(&r.code)
    .bind(&r.name)
    .bind(&r.description)
    .bind(r.is_core)
    .bind(r.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn upsert_tax_period(conn: &mut PgConnection, r: &TaxPeriodRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO tax_periods (id, tax_type_id, period_code, start_date, end_date, due_date, status)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (id) DO UPDATE SET
           start_date = EXCLUDED.start_date, end_date = EXCLUDED.end_date,
           due_date = EXCLUDED.due_date, status = EXCLUDED.status",
    )
    .bind(r.id)
    .bind(r.tax_type_id)
    .bind(&r.period_code)
    .bind(r.start_date)
    .bind(r.end_date)
    .bind(r.due_date)
    .bind(r.status.as_str())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn load_tax_types(pool: &PgPool) -> Result<Vec<TaxTypeRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TaxTypeRow>(
        "SELECT id, code, name, description, is_core, created_at
         FROM tax_types ORDER BY code LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| TaxTypeRecord {
            id: r.id,
            code: r.code,
            name: r.name,
            description: r.description,
            is_core: r.is_core,
            created_at: r.created_at,
        })
        .collect())
}

pub async fn load_tax_periods(pool: &PgPool) -> Result<Vec<TaxPeriodRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TaxPeriodRow>(
        "SELECT id, tax_type_id, period_code, start_date, end_date, due_date, status
         FROM tax_periods ORDER BY start_date LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().filter_map(TaxPeriodRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct TaxTypeRow {
    id: Uuid,
    code: String,
    name: String,
    description: Option<String>,
    is_core: bool,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct TaxPeriodRow {
    id: Uuid,
    tax_type_id: Uuid,
    period_code: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    due_date: NaiveDate,
    status: String,
}

impl TaxPeriodRow {
    fn into_record(self) -> Option<TaxPeriodRecord> {
        Some(TaxPeriodRecord {
            status: label("tax_periods", self.id, &self.status)?,
            id: self.id,
            tax_type_id: self.tax_type_id,
            period_code: self.period_code,
            start_date: self.start_date,
            end_date: self.end_date,
            due_date: self.due_date,
        })
    }
}
