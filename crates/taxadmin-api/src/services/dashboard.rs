//! Dashboard statistics and the caller's notifications.

use chrono::{DateTime, Utc};
use serde::Serialize;
use taxadmin_core::{Money, PaymentStatus, RefundStatus, ReturnStatus};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::changeset::ChangeSet;
use crate::error::AppError;
use crate::records::{NotificationRecord, TaxPeriodRecord};
use crate::state::AppState;

use super::{in_scope, today, visible_accounts};

const UPCOMING_PERIODS: usize = 5;
const RECENT_ACTIVITIES: usize = 4;
const LATEST_UNREAD: usize = 2;

/// Headline counts. Audit and collection totals are only reported to
/// callers who see every account.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_accounts: usize,
    pub active_accounts: usize,
    pub total_returns: usize,
    pub pending_returns: usize,
    #[schema(value_type = String)]
    pub total_payments: Money,
    /// Pending refunds for officers; all refunds on own accounts otherwise.
    pub total_refunds: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_audits: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_collections: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Activity {
    pub description: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Dashboard {
    pub stats: DashboardStats,
    pub upcoming_periods: Vec<TaxPeriodRecord>,
    pub recent_activities: Vec<Activity>,
    pub unread_notifications: usize,
    pub latest_notifications: Vec<NotificationRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ReadAllResult {
    pub count: usize,
    pub message: String,
}

fn stats(state: &AppState, caller: &CallerIdentity) -> DashboardStats {
    let scope = visible_accounts(state, caller);
    let accounts = state.accounts.filter(|a| in_scope(&scope, a.id));
    let returns = state.tax_returns.filter(|r| in_scope(&scope, r.account_id));
    let total_payments: Money = state
        .payments
        .filter(|p| p.status == PaymentStatus::Completed && in_scope(&scope, p.account_id))
        .iter()
        .map(|p| p.amount)
        .sum();

    let everyone = scope.is_none();
    let total_refunds = if everyone {
        state.refunds.filter(|r| r.status == RefundStatus::Pending).len()
    } else {
        state.refunds.filter(|r| in_scope(&scope, r.account_id)).len()
    };

    DashboardStats {
        total_accounts: accounts.len(),
        active_accounts: accounts.iter().filter(|a| a.is_active).count(),
        total_returns: returns.iter().filter(|r| r.status != ReturnStatus::NotFiled).count(),
        pending_returns: returns.iter().filter(|r| r.status == ReturnStatus::NotFiled).count(),
        total_payments,
        total_refunds,
        total_audits: everyone.then(|| state.audits.len()),
        total_collections: everyone.then(|| state.collections.len()),
    }
}

fn recent_activities(state: &AppState, caller: &CallerIdentity) -> Vec<Activity> {
    let scope = visible_accounts(state, caller);
    let filings = state
        .tax_returns
        .filter(|r| in_scope(&scope, r.account_id))
        .into_iter()
        .filter_map(|r| {
            r.filing_date.map(|date| Activity {
                description: format!("Tax Return Filed: {}", r.reference_number),
                date,
            })
        });
    let payments = state
        .payments
        .filter(|p| in_scope(&scope, p.account_id))
        .into_iter()
        .map(|p| Activity {
            description: format!("Payment Made: ${}", p.amount),
            date: p.payment_date,
        });

    let mut activities: Vec<Activity> = filings.chain(payments).collect();
    activities.sort_by(|a, b| b.date.cmp(&a.date));
    activities.truncate(RECENT_ACTIVITIES);
    activities
}

/// The caller's notifications, unread first, newest first within each group.
pub fn notifications_for(state: &AppState, user_id: Uuid) -> Vec<NotificationRecord> {
    let mut rows = state.notifications.filter(|n| n.user_id == user_id);
    rows.sort_by(|a, b| a.is_read.cmp(&b.is_read).then(b.created_at.cmp(&a.created_at)));
    rows
}

pub fn dashboard(state: &AppState, caller: &CallerIdentity) -> Dashboard {
    let _snapshot = state.snapshot();
    let today = today();
    let mut upcoming_periods = state.tax_periods.filter(|p| p.due_date >= today);
    upcoming_periods.sort_by_key(|p| p.due_date);
    upcoming_periods.truncate(UPCOMING_PERIODS);

    let unread: Vec<NotificationRecord> = caller
        .user_id
        .map(|id| notifications_for(state, id))
        .unwrap_or_default()
        .into_iter()
        .filter(|n| !n.is_read)
        .collect();

    Dashboard {
        stats: stats(state, caller),
        upcoming_periods,
        recent_activities: recent_activities(state, caller),
        unread_notifications: unread.len(),
        latest_notifications: unread.into_iter().take(LATEST_UNREAD).collect(),
    }
}

pub async fn mark_read(
    state: &AppState,
    caller: &CallerIdentity,
    id: Uuid,
) -> Result<NotificationRecord, AppError> {
    let mut notification = state
        .notifications
        .get(&id)
        .ok_or_else(|| AppError::not_found("notification", id))?;
    if Some(notification.user_id) != caller.user_id {
        return Err(AppError::Forbidden("notification belongs to another user".into()));
    }
    if notification.is_read {
        return Ok(notification);
    }
    notification.is_read = true;
    notification.read_at = Some(Utc::now());

    let mut cs = ChangeSet::new();
    cs.put(notification.clone());
    cs.commit(state).await?;
    Ok(notification)
}

pub async fn mark_all_read(state: &AppState, caller: &CallerIdentity) -> Result<ReadAllResult, AppError> {
    let user_id = caller.require_user()?;
    let now = Utc::now();
    let mut cs = ChangeSet::new();
    let mut count = 0;
    for mut n in state.notifications.filter(|n| n.user_id == user_id && !n.is_read) {
        n.is_read = true;
        n.read_at = Some(now);
        cs.put(n);
        count += 1;
    }
    if !cs.is_empty() {
        cs.commit(state).await?;
    }
    tracing::debug!(user_id = %user_id, count, "notifications marked read");
    Ok(ReadAllResult {
        count,
        message: format!("{count} notifications marked as read"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::AccountRecord;
    use taxadmin_core::{NotificationKind, PermissionSet};

    fn caller(user_id: Uuid, officer: bool) -> CallerIdentity {
        let mut permissions = PermissionSet::new();
        if officer {
            permissions.insert(taxadmin_core::Permission::ViewAllAccounts);
        }
        CallerIdentity {
            user_id: Some(user_id),
            username: "dash".into(),
            is_admin: false,
            user_type: None,
            permissions,
        }
    }

    fn note(state: &AppState, user_id: Uuid, title: &str, is_read: bool, minutes_ago: i64) -> Uuid {
        let id = Uuid::new_v4();
        state.notifications.insert(
            id,
            NotificationRecord {
                id,
                user_id,
                title: title.into(),
                message: String::new(),
                notification_type: NotificationKind::Info,
                is_read,
                created_at: Utc::now() - chrono::Duration::minutes(minutes_ago),
                read_at: None,
            },
        );
        id
    }

    fn account(state: &AppState, owner: Uuid, active: bool) {
        let id = Uuid::new_v4();
        state.accounts.insert(
            id,
            AccountRecord {
                id,
                account_number: id.simple().to_string(),
                name: "Acct".into(),
                user_id: owner,
                is_active: active,
                ledger_balance: Money::ZERO,
                last_entry_no: 0,
                version: 0,
                created_at: Utc::now(),
            },
        );
    }

    #[test]
    fn unread_notifications_come_first() {
        let state = AppState::new();
        let user = Uuid::new_v4();
        note(&state, user, "old unread", false, 30);
        note(&state, user, "new read", true, 1);
        note(&state, user, "new unread", false, 5);
        note(&state, Uuid::new_v4(), "someone else", false, 0);

        let titles: Vec<_> = notifications_for(&state, user).into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["new unread", "old unread", "new read"]);

        let board = dashboard(&state, &caller(user, false));
        assert_eq!(board.unread_notifications, 2);
        assert_eq!(board.latest_notifications[0].title, "new unread");
    }

    #[test]
    fn taxpayers_count_only_their_accounts() {
        let state = AppState::new();
        let me = Uuid::new_v4();
        account(&state, me, true);
        account(&state, me, false);
        account(&state, Uuid::new_v4(), true);

        let mine = stats(&state, &caller(me, false));
        assert_eq!((mine.total_accounts, mine.active_accounts), (2, 1));
        assert!(mine.total_audits.is_none());

        let all = stats(&state, &caller(Uuid::new_v4(), true));
        assert_eq!(all.total_accounts, 3);
        assert_eq!(all.total_audits, Some(0));
    }

    #[tokio::test]
    async fn read_markers() {
        let state = AppState::new();
        let user = Uuid::new_v4();
        let first = note(&state, user, "a", false, 2);
        note(&state, user, "b", false, 1);
        let foreign = note(&state, Uuid::new_v4(), "c", false, 0);

        let err = mark_read(&state, &caller(user, false), foreign).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let read = mark_read(&state, &caller(user, false), first).await.unwrap();
        assert!(read.is_read && read.read_at.is_some());

        let result = mark_all_read(&state, &caller(user, false)).await.unwrap();
        assert_eq!(result.count, 1);
        assert_eq!(result.message, "1 notifications marked as read");
        assert!(state.notifications.get(&foreign).is_some_and(|n| !n.is_read));
    }
}
