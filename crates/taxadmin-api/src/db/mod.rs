//! # Database Persistence Layer
//!
//! PostgreSQL write-through for every table via SQLx.
//!
//! The database layer is **optional**. When `DATABASE_URL` is set the API
//! hydrates its stores from PostgreSQL at startup and commits every change
//! set inside one transaction. When absent the API runs in memory only,
//! which is what the test suite uses.
//!
//! Each submodule exposes `upsert_*` functions taking a connection (always a
//! transaction in practice) and `load_*` functions taking the pool.

pub mod accounts;
pub mod audit_trail;
pub mod audits;
pub mod cases;
pub mod catalog;
pub mod identity;
pub mod notifications;
pub mod registrations;
pub mod returns;

use std::fmt::Display;
use std::str::FromStr;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::changeset::{Row, Versioned};

/// Upper bound on rows read per table at startup.
pub(crate) const LOAD_MAX_ROWS: i64 = 1_000_000;

/// Connect to `database_url` and run the embedded migrations.
///
/// Returns `None` when no URL is configured (in-memory-only mode).
pub async fn init_pool(database_url: Option<&str>) -> Result<Option<PgPool>, sqlx::Error> {
    let url = match database_url {
        Some(url) => url,
        None => {
            tracing::warn!(
                "DATABASE_URL not set, running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Read and row-lock the version counter of a guarded row.
pub async fn lock_version(
    conn: &mut PgConnection,
    target: Versioned,
    id: Uuid,
) -> Result<Option<i64>, sqlx::Error> {
    let sql = match target {
        Versioned::TaxReturn => "SELECT version FROM tax_returns WHERE id = $1 FOR UPDATE",
        Versioned::Account => "SELECT version FROM accounts WHERE id = $1 FOR UPDATE",
    };
    sqlx::query_scalar(sql).bind(id).fetch_optional(conn).await
}

/// Write one change set row.
pub async fn write_row(conn: &mut PgConnection, row: &Row) -> Result<(), sqlx::Error> {
    match row {
        Row::UserType(r) => identity::upsert_user_type(conn, r).await,
        Row::User(r) => identity::upsert_user(conn, r).await,
        Row::TaxType(r) => catalog::upsert_tax_type(conn, r).await,
        Row::TaxPeriod(r) => catalog::upsert_tax_period(conn, r).await,
        Row::Account(r) => accounts::upsert_account(conn, r).await,
        Row::Obligation(r) => accounts::upsert_obligation(conn, r).await,
        Row::LedgerEntry(r) => accounts::insert_ledger_entry(conn, r).await,
        Row::TaxReturn(r) => returns::upsert_return(conn, r).await,
        Row::Payment(r) => returns::upsert_payment(conn, r).await,
        Row::Refund(r) => cases::upsert_refund(conn, r).await,
        Row::Objection(r) => cases::upsert_objection(conn, r).await,
        Row::Audit(r) => audits::upsert_audit(conn, r).await,
        Row::AuditCase(r) => audits::upsert_audit_case(conn, r).await,
        Row::Collection(r) => audits::upsert_collection(conn, r).await,
        Row::Notification(r) => notifications::upsert(conn, r).await,
        Row::Registration(r) => registrations::upsert_registration(conn, r).await,
        Row::ServiceRequest(r) => registrations::upsert_request(conn, r).await,
    }
}

/// Parse a stored label, logging and skipping rows that no longer parse.
pub(crate) fn label<T>(table: &'static str, id: Uuid, raw: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw.parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(table, %id, value = raw, error = %e, "skipping row with unknown label");
            None
        }
    }
}
