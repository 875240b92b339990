//! # Atomic Change Sets
//!
//! Every logical operation collects its writes into a [`ChangeSet`] and
//! commits them at once:
//!
//! 1. the caller already holds the [`RowLocks`](crate::state::RowLocks) for
//!    the tax return and account it read;
//! 2. with a database, one transaction locks the guarded rows with
//!    `SELECT ... FOR UPDATE`, checks their version counters, writes every
//!    row plus the audit trail link, and commits;
//! 3. the same rows are then applied to the in-memory stores, all under
//!    the write side of [`AppState::commit_gate`], so a reader holding
//!    [`AppState::snapshot`] sees either none or all of them.
//!
//! A version mismatch on either side is a 409 and leaves both sides as they
//! were.

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppError;
use crate::records::*;
use crate::state::{AppState, TrailHead};
use crate::trail;

/// One row to insert or overwrite.
#[derive(Debug, Clone)]
pub enum Row {
    UserType(UserTypeRecord),
    User(UserRecord),
    TaxType(TaxTypeRecord),
    TaxPeriod(TaxPeriodRecord),
    Account(AccountRecord),
    Obligation(ObligationRecord),
    LedgerEntry(LedgerEntryRecord),
    TaxReturn(TaxReturnRecord),
    Payment(PaymentRecord),
    Refund(RefundRecord),
    Objection(ObjectionRecord),
    Audit(AuditRecord),
    AuditCase(AuditCaseRecord),
    Collection(CollectionRecord),
    Notification(NotificationRecord),
    Registration(RegistrationRecord),
    ServiceRequest(ServiceRequestRecord),
}

macro_rules! row_from {
    ($($record:ty => $variant:ident),+ $(,)?) => {
        $(impl From<$record> for Row {
            fn from(record: $record) -> Self {
                Row::$variant(record)
            }
        })+
    };
}

row_from! {
    UserTypeRecord => UserType,
    UserRecord => User,
    TaxTypeRecord => TaxType,
    TaxPeriodRecord => TaxPeriod,
    ObligationRecord => Obligation,
    LedgerEntryRecord => LedgerEntry,
    PaymentRecord => Payment,
    RefundRecord => Refund,
    ObjectionRecord => Objection,
    AuditRecord => Audit,
    AuditCaseRecord => AuditCase,
    CollectionRecord => Collection,
    NotificationRecord => Notification,
    RegistrationRecord => Registration,
    ServiceRequestRecord => ServiceRequest,
}

/// Tables carrying an optimistic version counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Versioned {
    TaxReturn,
    Account,
}

impl Versioned {
    pub fn table(&self) -> &'static str {
        match self {
            Self::TaxReturn => "tax_returns",
            Self::Account => "accounts",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct VersionGuard {
    target: Versioned,
    id: Uuid,
    expected: i64,
}

/// The audit trail link to append with the change set.
#[derive(Debug, Clone)]
pub struct TrailEntry {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: &'static str,
    pub entity_id: Option<Uuid>,
    pub details: serde_json::Value,
}

/// Writes of one logical operation.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    rows: Vec<Row>,
    guards: Vec<VersionGuard>,
    trail: Option<TrailEntry>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an unversioned row, or insert a new versioned one.
    pub fn put(&mut self, row: impl Into<Row>) -> &mut Self {
        self.rows.push(row.into());
        self
    }

    /// Insert a new account at version 0.
    pub fn insert_account(&mut self, mut record: AccountRecord) -> &mut Self {
        record.version = 0;
        self.rows.push(Row::Account(record));
        self
    }

    /// Insert a new tax return at version 0.
    pub fn insert_return(&mut self, mut record: TaxReturnRecord) -> &mut Self {
        record.version = 0;
        self.rows.push(Row::TaxReturn(record));
        self
    }

    /// Overwrite a tax return read at `record.version`; the stored version
    /// must still match at commit, and is bumped by one.
    pub fn update_return(&mut self, mut record: TaxReturnRecord) -> &mut Self {
        self.guards.push(VersionGuard {
            target: Versioned::TaxReturn,
            id: record.id,
            expected: record.version,
        });
        record.version += 1;
        self.rows.push(Row::TaxReturn(record));
        self
    }

    /// Overwrite an account read at `record.version`.
    pub fn update_account(&mut self, mut record: AccountRecord) -> &mut Self {
        self.guards.push(VersionGuard {
            target: Versioned::Account,
            id: record.id,
            expected: record.version,
        });
        record.version += 1;
        self.rows.push(Row::Account(record));
        self
    }

    /// Record the operation in the audit trail.
    pub fn audit(
        &mut self,
        user_id: Option<Uuid>,
        action: impl Into<String>,
        entity_type: &'static str,
        entity_id: Option<Uuid>,
        details: serde_json::Value,
    ) -> &mut Self {
        self.trail = Some(TrailEntry {
            user_id,
            action: action.into(),
            entity_type,
            entity_id,
            details,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.trail.is_none()
    }

    fn memory_version(state: &AppState, target: Versioned, id: &Uuid) -> Option<i64> {
        match target {
            Versioned::TaxReturn => state.tax_returns.get(id).map(|r| r.version),
            Versioned::Account => state.accounts.get(id).map(|a| a.version),
        }
    }

    fn check_memory_versions(&self, state: &AppState) -> Result<(), AppError> {
        for guard in &self.guards {
            match Self::memory_version(state, guard.target, &guard.id) {
                Some(v) if v == guard.expected => {}
                Some(v) => {
                    return Err(stale(guard, v));
                }
                None => return Err(AppError::not_found(guard.target.table(), guard.id)),
            }
        }
        Ok(())
    }

    /// Commit to the database (when configured) and then to memory.
    pub async fn commit(self, state: &AppState) -> Result<(), AppError> {
        let mut head = state.trail_head.lock().await;
        self.check_memory_versions(state)?;

        let link = self.trail.as_ref().map(|entry| next_link(&head, entry));

        if let Some(pool) = &state.db_pool {
            let mut tx = pool.begin().await?;
            for guard in &self.guards {
                let stored =
                    crate::db::lock_version(&mut tx, guard.target, guard.id).await?;
                match stored {
                    Some(v) if v == guard.expected => {}
                    Some(v) => return Err(stale(guard, v)),
                    None => return Err(AppError::not_found(guard.target.table(), guard.id)),
                }
            }
            for row in &self.rows {
                crate::db::write_row(&mut tx, row).await?;
            }
            if let Some(link) = &link {
                crate::db::audit_trail::insert(&mut tx, link).await?;
            }
            tx.commit().await?;
        }

        let _gate = state.commit_gate.write();
        for row in self.rows {
            apply(state, row);
        }
        if let Some(link) = link {
            *head = TrailHead {
                seq: link.seq,
                hash: link.hash.clone(),
            };
            state.audit_trail.insert(link.id, link);
        }
        Ok(())
    }
}

fn stale(guard: &VersionGuard, found: i64) -> AppError {
    tracing::warn!(
        table = guard.target.table(),
        id = %guard.id,
        expected = guard.expected,
        found,
        "optimistic version check failed"
    );
    AppError::Conflict(format!(
        "{} {} was modified concurrently; retry the operation",
        guard.target.table(),
        guard.id
    ))
}

fn next_link(head: &TrailHead, entry: &TrailEntry) -> AuditTrailRecord {
    let mut link = AuditTrailRecord {
        id: Uuid::new_v4(),
        seq: head.seq + 1,
        user_id: entry.user_id,
        action: entry.action.clone(),
        entity_type: entry.entity_type.to_string(),
        entity_id: entry.entity_id,
        details: entry.details.clone(),
        previous_hash: head.hash.clone(),
        hash: String::new(),
        created_at: Utc::now(),
    };
    link.hash = trail::link_hash(&link);
    link
}

fn apply(state: &AppState, row: Row) {
    match row {
        Row::UserType(r) => {
            state.user_types.insert(r.id, r);
        }
        Row::User(r) => {
            state.users.insert(r.id, r);
        }
        Row::TaxType(r) => {
            state.tax_types.insert(r.id, r);
        }
        Row::TaxPeriod(r) => {
            state.tax_periods.insert(r.id, r);
        }
        Row::Account(r) => {
            state.accounts.insert(r.id, r);
        }
        Row::Obligation(r) => {
            state.obligations.insert(r.id, r);
        }
        Row::LedgerEntry(r) => {
            state.ledger.insert(r.id, r);
        }
        Row::TaxReturn(r) => {
            state.tax_returns.insert(r.id, r);
        }
        Row::Payment(r) => {
            state.payments.insert(r.id, r);
        }
        Row::Refund(r) => {
            state.refunds.insert(r.id, r);
        }
        Row::Objection(r) => {
            state.objections.insert(r.id, r);
        }
        Row::Audit(r) => {
            state.audits.insert(r.id, r);
        }
        Row::AuditCase(r) => {
            state.audit_cases.insert(r.id, r);
        }
        Row::Collection(r) => {
            state.collections.insert(r.id, r);
        }
        Row::Notification(r) => {
            state.notifications.insert(r.id, r);
        }
        Row::Registration(r) => {
            state.registrations.insert(r.id, r);
        }
        Row::ServiceRequest(r) => {
            state.requests.insert(r.id, r);
        }
    }
}
