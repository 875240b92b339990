//! # Business Operations
//!
//! Each submodule implements one functional area on top of the stores. The
//! route handlers check coarse permissions and decode requests; everything
//! that reads records, decides, and writes lives here.
//!
//! Operations that change a tax return or an account ledger follow the same
//! shape:
//!
//! 1. read the target rows and take their [`RowLocks`](crate::state::RowLocks);
//! 2. re-read under the lock and ask `taxadmin-core` for a plan;
//! 3. turn the plan into a [`ChangeSet`](crate::changeset::ChangeSet) with
//!    the ledger lines, notifications, and audit trail link;
//! 4. commit.

pub mod accounts;
pub mod audits;
pub mod collections;
pub mod dashboard;
pub mod filing;
pub mod ledger;
pub mod listings;
pub mod notify;
pub mod objections;
pub mod payments;
pub mod refunds;
pub mod registrations;
pub mod reporting;
pub mod requests;
pub mod tracking;
pub mod users;

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::records::{AccountRecord, TaxReturnRecord};
use crate::state::AppState;

/// Current UTC calendar day.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub(crate) fn load_account(state: &AppState, id: Uuid) -> Result<AccountRecord, AppError> {
    state
        .accounts
        .get(&id)
        .ok_or_else(|| AppError::not_found("account", id))
}

pub(crate) fn load_return(state: &AppState, id: Uuid) -> Result<TaxReturnRecord, AppError> {
    state
        .tax_returns
        .get(&id)
        .ok_or_else(|| AppError::not_found("tax return", id))
}

/// Accounts the caller may see. `None` means every account.
pub(crate) fn visible_accounts(state: &AppState, caller: &CallerIdentity) -> Option<HashSet<Uuid>> {
    if caller.sees_all_accounts() {
        return None;
    }
    Some(
        state
            .accounts
            .filter(|a| Some(a.user_id) == caller.user_id)
            .into_iter()
            .map(|a| a.id)
            .collect(),
    )
}

/// Whether `account_id` is inside the caller's scope.
pub(crate) fn in_scope(scope: &Option<HashSet<Uuid>>, account_id: Uuid) -> bool {
    scope.as_ref().map_or(true, |ids| ids.contains(&account_id))
}
