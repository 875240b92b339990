//! Registration and service request persistence.
//!
//! All three registration shapes share one table: `registration_type` holds
//! the discriminant and `details` the shape-specific fields as JSONB.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use taxadmin_core::Registration;
use uuid::Uuid;

use super::{label, LOAD_MAX_ROWS};
use crate::records::{RegistrationRecord, ServiceRequestRecord};

pub async fn upsert_registration(
    conn: &mut PgConnection,
    r: &RegistrationRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO registrations (id, registration_number, registration_type, status,
         submitted_by, registration_date, decided_at, decided_by, details, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         ON CONFLICT (id) DO UPDATE SET
           status = EXCLUDED.status, decided_at = EXCLUDED.decided_at,
           decided_by = EXCLUDED.decided_by",
    )
    .bind(r.id)
    .bind(&r.registration_number)
    .bind(r.details.registration_type().as_str())
    .bind(r.status.as_str())
    .bind(r.submitted_by)
    .bind(r.registration_date)
    .bind(r.decided_at)
    .bind(r.decided_by)
    .bind(Json(&r.details))
    .bind(r.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn upsert_request(conn: &mut PgConnection, r: &ServiceRequestRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO service_requests (id, request_type, account_id, submitted_by, status,
         submission_date, completion_date, reference_number, details)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (id) DO UPDATE SET
           status = EXCLUDED.status, completion_date = EXCLUDED.completion_date",
    )
    .bind(r.id)
    .bind(&r.request_type)
    .bind(r.account_id)
    .bind(r.submitted_by)
    .bind(r.status.as_str())
    .bind(r.submission_date)
    .bind(r.completion_date)
    .bind(&r.reference_number)
    .bind(&r.details)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn load_registrations(pool: &PgPool) -> Result<Vec<RegistrationRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RegistrationRow>(
        "SELECT id, registration_number, status, submitted_by, registration_date,
         decided_at, decided_by, details, created_at
         FROM registrations ORDER BY created_at LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().filter_map(RegistrationRow::into_record).collect())
}

pub async fn load_requests(pool: &PgPool) -> Result<Vec<ServiceRequestRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RequestRow>(
        "SELECT id, request_type, account_id, submitted_by, status, submission_date,
         completion_date, reference_number, details
         FROM service_requests ORDER BY submission_date LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .filter_map(|r| {
            Some(ServiceRequestRecord {
                status: label("service_requests", r.id, &r.status)?,
                id: r.id,
                request_type: r.request_type,
                account_id: r.account_id,
                submitted_by: r.submitted_by,
                submission_date: r.submission_date,
                completion_date: r.completion_date,
                reference_number: r.reference_number,
                details: r.details,
            })
        })
        .collect())
}

#[derive(sqlx::FromRow)]
struct RegistrationRow {
    id: Uuid,
    registration_number: String,
    status: String,
    submitted_by: Option<Uuid>,
    registration_date: NaiveDate,
    decided_at: Option<DateTime<Utc>>,
    decided_by: Option<Uuid>,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl RegistrationRow {
    fn into_record(self) -> Option<RegistrationRecord> {
        let details: Registration = match serde_json::from_value(self.details) {
            Ok(details) => details,
            Err(e) => {
                tracing::warn!(id = %self.id, error = %e, "skipping registration with unreadable details");
                return None;
            }
        };
        Some(RegistrationRecord {
            status: label("registrations", self.id, &self.status)?,
            id: self.id,
            registration_number: self.registration_number,
            submitted_by: self.submitted_by,
            registration_date: self.registration_date,
            decided_at: self.decided_at,
            decided_by: self.decided_by,
            details,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    request_type: String,
    account_id: Option<Uuid>,
    submitted_by: Option<Uuid>,
    status: String,
    submission_date: DateTime<Utc>,
    completion_date: Option<DateTime<Utc>>,
    reference_number: String,
    details: Option<String>,
}
