//! Account, obligation and ledger persistence.
//!
//! Ledger entries are append-only: there is no update path, and the
//! `(account_id, entry_no)` unique key rejects a second writer that lost the
//! account lock race.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use taxadmin_core::Money;
use uuid::Uuid;

use super::{label, LOAD_MAX_ROWS};
use crate::records::{AccountRecord, LedgerEntryRecord, ObligationRecord};

pub async fn upsert_account(conn: &mut PgConnection, r: &AccountRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO accounts (id, account_number, name, user_id, is_active,
         ledger_balance, last_entry_no, version, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (id) DO UPDATE SET
           name = EXCLUDED.name, is_active = EXCLUDED.is_active,
           ledger_balance = EXCLUDED.ledger_balance,
           last_entry_no = EXCLUDED.last_entry_no, version = EXCLUDED.version",
    )
    .bind(r.id)
    .bind(&r.account_number)
    .bind(&r.name)
    .bind(r.user_id)
    .bind(r.is_active)
    .bind(r.ledger_balance.as_decimal())
    .bind(r.last_entry_no)
    .bind(r.version)
    .bind(r.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn upsert_obligation(conn: &mut PgConnection, r: &ObligationRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO tax_obligations (id, account_id, tax_type_id, start_date, end_date,
         status, registration_date)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (id) DO UPDATE SET end_date = EXCLUDED.end_date, status = EXCLUDED.status",
    )
    .bind(r.id)
    .bind(r.account_id)
    .bind(r.tax_type_id)
    .bind(r.start_date)
    .bind(r.end_date)
    .bind(r.status.as_str())
    .bind(r.registration_date)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_ledger_entry(conn: &mut PgConnection, r: &LedgerEntryRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO taxpayer_ledger (id, account_id, entry_no, tax_type_id, tax_period_id,
         transaction_date, transaction_type, description, debit_amount, credit_amount,
         balance, reference_number, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(r.id)
    .bind(r.account_id)
    .bind(r.entry_no)
    .bind(r.tax_type_id)
    .bind(r.tax_period_id)
    .bind(r.transaction_date)
    .bind(r.transaction_type.as_str())
    .bind(&r.description)
    .bind(r.debit_amount.as_decimal())
    .bind(r.credit_amount.as_decimal())
    .bind(r.balance.as_decimal())
    .bind(&r.reference_number)
    .bind(r.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn load_accounts(pool: &PgPool) -> Result<Vec<AccountRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AccountRow>(
        "SELECT id, account_number, name, user_id, is_active, ledger_balance,
         last_entry_no, version, created_at
         FROM accounts ORDER BY created_at LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| AccountRecord {
            id: r.id,
            account_number: r.account_number,
            name: r.name,
            user_id: r.user_id,
            is_active: r.is_active,
            ledger_balance: Money::from_decimal(r.ledger_balance),
            last_entry_no: r.last_entry_no,
            version: r.version,
            created_at: r.created_at,
        })
        .collect())
}

pub async fn load_obligations(pool: &PgPool) -> Result<Vec<ObligationRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ObligationRow>(
        "SELECT id, account_id, tax_type_id, start_date, end_date, status, registration_date
         FROM tax_obligations ORDER BY registration_date LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .filter_map(|r| {
            Some(ObligationRecord {
                status: label("tax_obligations", r.id, &r.status)?,
                id: r.id,
                account_id: r.account_id,
                tax_type_id: r.tax_type_id,
                start_date: r.start_date,
                end_date: r.end_date,
                registration_date: r.registration_date,
            })
        })
        .collect())
}

pub async fn load_ledger(pool: &PgPool) -> Result<Vec<LedgerEntryRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LedgerRow>(
        "SELECT id, account_id, entry_no, tax_type_id, tax_period_id, transaction_date,
         transaction_type, description, debit_amount, credit_amount, balance,
         reference_number, created_at
         FROM taxpayer_ledger ORDER BY account_id, entry_no LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().filter_map(LedgerRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    account_number: String,
    name: String,
    user_id: Uuid,
    is_active: bool,
    ledger_balance: Decimal,
    last_entry_no: i64,
    version: i64,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct ObligationRow {
    id: Uuid,
    account_id: Uuid,
    tax_type_id: Uuid,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
    status: String,
    registration_date: NaiveDate,
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    id: Uuid,
    account_id: Uuid,
    entry_no: i64,
    tax_type_id: Option<Uuid>,
    tax_period_id: Option<Uuid>,
    transaction_date: NaiveDate,
    transaction_type: String,
    description: String,
    debit_amount: Decimal,
    credit_amount: Decimal,
    balance: Decimal,
    reference_number: Option<String>,
    created_at: DateTime<Utc>,
}

impl LedgerRow {
    fn into_record(self) -> Option<LedgerEntryRecord> {
        Some(LedgerEntryRecord {
            transaction_type: label("taxpayer_ledger", self.id, &self.transaction_type)?,
            id: self.id,
            account_id: self.account_id,
            entry_no: self.entry_no,
            tax_type_id: self.tax_type_id,
            tax_period_id: self.tax_period_id,
            transaction_date: self.transaction_date,
            description: self.description,
            debit_amount: Money::from_decimal(self.debit_amount),
            credit_amount: Money::from_decimal(self.credit_amount),
            balance: Money::from_decimal(self.balance),
            reference_number: self.reference_number,
            created_at: self.created_at,
        })
    }
}
