//! # Application State
//!
//! Shared state for the Axum application, passed to all route handlers
//! via the `State` extractor.
//!
//! ## Architecture
//!
//! Every table has an in-memory [`Store`] holding the working set. When a
//! PostgreSQL pool is configured, the stores are hydrated from it at startup
//! and every mutation is written through by
//! [`ChangeSet::commit`](crate::changeset::ChangeSet::commit) before the
//! stores change. Without a pool the service runs in memory only.
//!
//! Writes that move money on a tax return or an account serialize on
//! [`RowLocks`], one async mutex per row id. The audit trail head is a
//! separate mutex so that hash-chain links are assigned in commit order.
//!
//! A committed change set lands in several stores. The commit applies them
//! under the write side of the commit gate; reads that join rows across
//! stores take [`AppState::snapshot`] so they never see half a change set.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use sqlx::PgPool;
use taxadmin_core::PermissionPolicy;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::records::*;

// -- Generic In-Memory Store --------------------------------------------------

/// Thread-safe, cloneable in-memory key-value store.
///
/// The lock is `parking_lot`, never held across `.await`.
#[derive(Debug)]
pub struct Store<T: Clone + Send + Sync> {
    data: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T: Clone + Send + Sync> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<T: Clone + Send + Sync> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a record, returning the previous value if the key existed.
    pub fn insert(&self, id: Uuid, value: T) -> Option<T> {
        self.data.write().insert(id, value)
    }

    /// Retrieve a record by ID.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.data.read().get(id).cloned()
    }

    /// List all records.
    pub fn list(&self) -> Vec<T> {
        self.data.read().values().cloned().collect()
    }

    /// Records matching `pred`.
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.data.read().values().filter(|v| pred(v)).cloned().collect()
    }

    /// First record matching `pred`, in no particular order.
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.data.read().values().find(|v| pred(v)).cloned()
    }

    /// Whether any record matches `pred`.
    pub fn any(&self, pred: impl Fn(&T) -> bool) -> bool {
        self.data.read().values().any(pred)
    }

    /// Check if a record exists.
    pub fn contains(&self, id: &Uuid) -> bool {
        self.data.read().contains_key(id)
    }

    /// Return the number of records.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl<T: Clone + Send + Sync> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

// -- Row locks ----------------------------------------------------------------

/// Per-row async mutexes. Callers lock every row they are about to read and
/// rewrite, then re-read under the lock.
#[derive(Debug, Clone, Default)]
pub struct RowLocks {
    slots: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
}

/// Guards held for the duration of one logical operation.
#[must_use = "row locks are released when the guard is dropped"]
pub struct RowGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl RowLocks {
    /// Lock `ids` in ascending order so that two operations touching the
    /// same rows can never wait on each other in a cycle.
    pub async fn lock(&self, ids: &[Uuid]) -> RowGuard {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        let mutexes: Vec<_> = {
            let mut slots = self.slots.lock();
            ids.iter()
                .map(|id| Arc::clone(slots.entry(*id).or_default()))
                .collect()
        };
        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        RowGuard { _guards: guards }
    }
}

// -- Audit trail head ---------------------------------------------------------

/// Hash of the chain before its first link.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Sequence and hash of the newest audit trail link.
#[derive(Debug, Clone)]
pub struct TrailHead {
    pub seq: i64,
    pub hash: String,
}

impl Default for TrailHead {
    fn default() -> Self {
        Self {
            seq: 0,
            hash: GENESIS_HASH.to_string(),
        }
    }
}

// -- Application State --------------------------------------------------------

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub user_types: Store<UserTypeRecord>,
    pub users: Store<UserRecord>,
    pub tax_types: Store<TaxTypeRecord>,
    pub tax_periods: Store<TaxPeriodRecord>,
    pub accounts: Store<AccountRecord>,
    pub obligations: Store<ObligationRecord>,
    pub ledger: Store<LedgerEntryRecord>,
    pub tax_returns: Store<TaxReturnRecord>,
    pub payments: Store<PaymentRecord>,
    pub refunds: Store<RefundRecord>,
    pub objections: Store<ObjectionRecord>,
    pub audits: Store<AuditRecord>,
    pub audit_cases: Store<AuditCaseRecord>,
    pub collections: Store<CollectionRecord>,
    pub notifications: Store<NotificationRecord>,
    pub registrations: Store<RegistrationRecord>,
    pub requests: Store<ServiceRequestRecord>,
    pub audit_trail: Store<AuditTrailRecord>,

    /// User type to permission table.
    pub policy: Arc<PermissionPolicy>,
    pub locks: RowLocks,
    pub trail_head: Arc<tokio::sync::Mutex<TrailHead>>,
    /// Held for writing while a change set is applied to the stores.
    pub commit_gate: Arc<RwLock<()>>,
    /// `None` runs in memory only.
    pub db_pool: Option<PgPool>,
    pub config: AppConfig,
}

impl AppState {
    /// In-memory state with default configuration.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// State with the given configuration and optional database pool.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        Self {
            user_types: Store::new(),
            users: Store::new(),
            tax_types: Store::new(),
            tax_periods: Store::new(),
            accounts: Store::new(),
            obligations: Store::new(),
            ledger: Store::new(),
            tax_returns: Store::new(),
            payments: Store::new(),
            refunds: Store::new(),
            objections: Store::new(),
            audits: Store::new(),
            audit_cases: Store::new(),
            collections: Store::new(),
            notifications: Store::new(),
            registrations: Store::new(),
            requests: Store::new(),
            audit_trail: Store::new(),
            policy: Arc::new(PermissionPolicy::standard()),
            locks: RowLocks::default(),
            trail_head: Arc::new(tokio::sync::Mutex::new(TrailHead::default())),
            commit_gate: Arc::new(RwLock::new(())),
            db_pool,
            config,
        }
    }

    /// Block change sets from landing while the guard lives. Not reentrant:
    /// take it once per read and never across `.await`.
    pub fn snapshot(&self) -> RwLockReadGuard<'_, ()> {
        self.commit_gate.read()
    }

    /// Look up a user type name by id.
    pub fn user_type_name(&self, id: Option<Uuid>) -> Option<String> {
        id.and_then(|id| self.user_types.get(&id)).map(|t| t.name)
    }

    /// Every active administrator.
    pub fn admins(&self) -> Vec<UserRecord> {
        self.users.filter(|u| u.is_admin && u.is_active)
    }

    /// Load every table from the database into the in-memory stores and
    /// restore the audit trail head. No-op without a pool.
    pub async fn hydrate_from_db(&self) -> Result<(), String> {
        let pool = match &self.db_pool {
            Some(pool) => pool,
            None => return Ok(()),
        };

        let mut counts: Vec<(&'static str, usize)> = Vec::new();

        macro_rules! hydrate {
            ($store:ident, $loader:path, $label:literal) => {{
                let rows = $loader(pool)
                    .await
                    .map_err(|e| format!("failed to load {}: {e}", $label))?;
                counts.push(($label, rows.len()));
                for record in rows {
                    self.$store.insert(record.id, record);
                }
            }};
        }

        hydrate!(user_types, crate::db::identity::load_user_types, "user_types");
        hydrate!(users, crate::db::identity::load_users, "users");
        hydrate!(tax_types, crate::db::catalog::load_tax_types, "tax_types");
        hydrate!(tax_periods, crate::db::catalog::load_tax_periods, "tax_periods");
        hydrate!(accounts, crate::db::accounts::load_accounts, "accounts");
        hydrate!(obligations, crate::db::accounts::load_obligations, "tax_obligations");
        hydrate!(ledger, crate::db::accounts::load_ledger, "taxpayer_ledger");
        hydrate!(tax_returns, crate::db::returns::load_returns, "tax_returns");
        hydrate!(payments, crate::db::returns::load_payments, "payments");
        hydrate!(refunds, crate::db::cases::load_refunds, "refunds");
        hydrate!(objections, crate::db::cases::load_objections, "objections");
        hydrate!(audits, crate::db::audits::load_audits, "audits");
        hydrate!(audit_cases, crate::db::audits::load_audit_cases, "audit_cases");
        hydrate!(collections, crate::db::audits::load_collections, "collections");
        hydrate!(notifications, crate::db::notifications::load_all, "notifications");
        hydrate!(registrations, crate::db::registrations::load_registrations, "registrations");
        hydrate!(requests, crate::db::registrations::load_requests, "service_requests");
        hydrate!(audit_trail, crate::db::audit_trail::load_all, "audit_trail");

        if let Some(last) = self.audit_trail.list().into_iter().max_by_key(|r| r.seq) {
            *self.trail_head.lock().await = TrailHead {
                seq: last.seq,
                hash: last.hash,
            };
        }

        tracing::info!(tables = ?counts, "Hydrated in-memory stores from database");
        Ok(())
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn store_crud() {
        let store: Store<String> = Store::new();
        let id = Uuid::new_v4();
        assert!(store.is_empty());
        assert!(store.insert(id, "a".into()).is_none());
        assert_eq!(store.get(&id).as_deref(), Some("a"));
        assert!(store.contains(&id));
        assert_eq!(store.insert(id, "b".into()).as_deref(), Some("a"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.filter(|s| s == "b").len(), 1);
        assert!(store.find(|s| s == "a").is_none());
        assert!(store.any(|s| s == "b"));
    }

    #[test]
    fn store_clones_share_data() {
        let a: Store<u32> = Store::new();
        let b = a.clone();
        a.insert(Uuid::new_v4(), 7);
        assert_eq!(b.len(), 1);
    }

    #[tokio::test]
    async fn row_locks_serialize_same_row() {
        let locks = RowLocks::default();
        let id = Uuid::new_v4();
        let held = locks.lock(&[id]).await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = other.lock(&[id]).await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn row_locks_allow_disjoint_rows_and_duplicates() {
        let locks = RowLocks::default();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let _first = locks.lock(&[a, a]).await;
        let second = tokio::time::timeout(Duration::from_secs(1), locks.lock(&[b])).await;
        assert!(second.is_ok());
    }
}
