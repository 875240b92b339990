//! Notifications queued on a change set.

use chrono::Utc;
use taxadmin_core::audit::Notice;
use taxadmin_core::NotificationKind;
use uuid::Uuid;

use crate::changeset::ChangeSet;
use crate::records::NotificationRecord;
use crate::state::AppState;

fn record(user_id: Uuid, title: String, message: String, kind: NotificationKind) -> NotificationRecord {
    NotificationRecord {
        id: Uuid::new_v4(),
        user_id,
        title,
        message,
        notification_type: kind,
        is_read: false,
        created_at: Utc::now(),
        read_at: None,
    }
}

/// Queue one unread notification for `user_id`.
pub fn notify(
    cs: &mut ChangeSet,
    user_id: Uuid,
    title: impl Into<String>,
    message: impl Into<String>,
    kind: NotificationKind,
) {
    cs.put(record(user_id, title.into(), message.into(), kind));
}

/// Queue a prepared notice.
pub fn send_notice(cs: &mut ChangeSet, user_id: Uuid, notice: Notice) {
    cs.put(record(user_id, notice.title, notice.message, notice.kind));
}

/// Queue the same notification for every active administrator.
pub fn notify_admins(
    cs: &mut ChangeSet,
    state: &AppState,
    title: &str,
    message: &str,
    kind: NotificationKind,
) {
    for admin in state.admins() {
        notify(cs, admin.id, title, message, kind);
    }
}

/// Notify the account owner, if the account is known.
pub fn notify_owner(
    cs: &mut ChangeSet,
    state: &AppState,
    account_id: Uuid,
    title: impl Into<String>,
    message: impl Into<String>,
    kind: NotificationKind,
) {
    if let Some(account) = state.accounts.get(&account_id) {
        notify(cs, account.user_id, title, message, kind);
    }
}
