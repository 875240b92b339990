//! # Return Filing
//!
//! A filed return is self-assessed: the declared amount becomes the due
//! amount, an Assessment line debits the account ledger, and the auto-flag
//! rules annotate the return before anything is stored. Flagging never
//! blocks a filing.

use chrono::Utc;
use serde::Deserialize;
use taxadmin_core::flagging::{self, FlagInput};
use taxadmin_core::{
    AssessmentType, LedgerEntryKind, Money, NotificationKind, ReferenceKind, ReferenceNumber,
    ReturnStatus,
};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_account_access, CallerIdentity};
use crate::changeset::ChangeSet;
use crate::error::AppError;
use crate::records::TaxReturnRecord;
use crate::state::AppState;

use super::ledger::{LedgerLine, LedgerWriter};
use super::notify::{notify, notify_admins};
use super::load_account;

/// A self-assessed return.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FileReturn {
    pub account_id: Uuid,
    pub tax_type_id: Uuid,
    pub tax_period_id: Uuid,
    /// Declared amount due, as a decimal string.
    #[schema(value_type = String)]
    pub amount: Money,
}

pub async fn file_return(
    state: &AppState,
    caller: &CallerIdentity,
    request: FileReturn,
) -> Result<TaxReturnRecord, AppError> {
    let amount = request.amount.non_negative("amount")?;
    let account = load_account(state, request.account_id)?;
    require_account_access(caller, &account)?;

    let tax_type = state
        .tax_types
        .get(&request.tax_type_id)
        .ok_or_else(|| AppError::not_found("tax type", request.tax_type_id))?;
    let period = state
        .tax_periods
        .get(&request.tax_period_id)
        .ok_or_else(|| AppError::not_found("tax period", request.tax_period_id))?;
    if period.tax_type_id != tax_type.id {
        return Err(AppError::Validation(format!(
            "tax period {} does not belong to tax type {}",
            period.period_code, tax_type.code
        )));
    }

    let _guard = state.locks.lock(&[account.id]).await;
    let account = load_account(state, account.id)?;

    let already_filed = state.tax_returns.any(|r| {
        r.account_id == account.id
            && r.tax_type_id == tax_type.id
            && r.tax_period_id == period.id
            && r.status.is_filed()
    });
    if already_filed {
        return Err(AppError::Conflict(format!(
            "a {} return for {} has already been filed on account {}",
            tax_type.name, period.period_code, account.account_number
        )));
    }

    let latest_refund = state
        .refunds
        .filter(|r| r.account_id == account.id)
        .into_iter()
        .max_by_key(|r| r.request_date)
        .map(|r| r.amount);
    let now = Utc::now();
    let flags = flagging::evaluate(&FlagInput {
        due_amount: amount,
        filing_date: now.date_naive(),
        period_due_date: Some(period.due_date),
        latest_refund,
    });

    let reference = ReferenceNumber::generate(ReferenceKind::TaxReturn).into_string();
    let tax_return = TaxReturnRecord {
        id: Uuid::new_v4(),
        account_id: account.id,
        tax_type_id: tax_type.id,
        tax_period_id: period.id,
        reference_number: reference.clone(),
        filing_date: Some(now),
        due_amount: amount,
        status: ReturnStatus::Filed,
        assessment_date: None,
        assessment_type: Some(AssessmentType::SelfAssessed),
        is_flagged: flags.is_flagged,
        flag_reason: flags.reason.clone(),
        filed_by: caller.user_id,
        version: 0,
        created_at: now,
    };

    let mut cs = ChangeSet::new();
    cs.insert_return(tax_return.clone());

    let mut ledger = LedgerWriter::open(account.clone());
    ledger.debit(
        LedgerEntryKind::Assessment,
        amount,
        LedgerLine {
            tax_type_id: Some(tax_type.id),
            tax_period_id: Some(period.id),
            description: format!("Self-assessment for {}", tax_type.name),
            reference_number: Some(reference.clone()),
        },
    );
    ledger.finish(&mut cs);

    if let Some(user_id) = caller.user_id {
        notify(
            &mut cs,
            user_id,
            "Tax Return Filed",
            format!(
                "Your {} tax return ({reference}) for {} has been filed. Amount due: ${amount}.",
                tax_type.name, period.period_code
            ),
            NotificationKind::Tax,
        );
    }
    notify_admins(
        &mut cs,
        state,
        "New Tax Return Filed",
        &format!(
            "A new {} tax return ({reference}) has been filed by {} for account {}. Amount: ${amount}.",
            tax_type.name, caller.username, account.account_number
        ),
        NotificationKind::Alert,
    );

    cs.audit(
        caller.user_id,
        "file_return",
        "tax_return",
        Some(tax_return.id),
        serde_json::json!({
            "reference_number": reference,
            "due_amount": amount,
            "is_flagged": flags.is_flagged,
            "flag_reason": flags.reason,
        }),
    );
    cs.commit(state).await?;

    if tax_return.is_flagged {
        tracing::warn!(
            tax_return_id = %tax_return.id,
            reference = %tax_return.reference_number,
            reason = tax_return.flag_reason.as_deref().unwrap_or_default(),
            "tax return flagged at filing"
        );
    }
    tracing::info!(
        tax_return_id = %tax_return.id,
        reference = %tax_return.reference_number,
        due_amount = %tax_return.due_amount,
        "tax return filed"
    );
    Ok(tax_return)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AccountRecord, RefundRecord, TaxPeriodRecord, TaxTypeRecord, UserRecord};
    use chrono::{Duration, NaiveDate};
    use taxadmin_core::{PeriodStatus, PermissionSet, RefundStatus};

    use crate::services::today;

    struct Fixture {
        state: AppState,
        caller: CallerIdentity,
        owner: Uuid,
        admin: Uuid,
        account: Uuid,
        vat: Uuid,
    }

    fn fixture() -> Fixture {
        let state = AppState::new();
        let owner = Uuid::new_v4();
        let admin = Uuid::new_v4();
        state.users.insert(
            admin,
            UserRecord {
                id: admin,
                username: "admin".into(),
                email: "admin@example.com".into(),
                first_name: None,
                last_name: None,
                phone: None,
                user_type_id: None,
                is_admin: true,
                is_active: true,
                created_at: Utc::now(),
            },
        );
        let account = Uuid::new_v4();
        state.accounts.insert(
            account,
            AccountRecord {
                id: account,
                account_number: "ACC-77".into(),
                name: "Main".into(),
                user_id: owner,
                is_active: true,
                ledger_balance: Money::from_major(40),
                last_entry_no: 2,
                version: 0,
                created_at: Utc::now(),
            },
        );
        let vat = add_tax_type(&state, "VAT");
        let caller = CallerIdentity {
            user_id: Some(owner),
            username: "owner".into(),
            is_admin: false,
            user_type: Some("Individual".into()),
            permissions: PermissionSet::new(),
        };
        Fixture {
            state,
            caller,
            owner,
            admin,
            account,
            vat,
        }
    }

    fn add_tax_type(state: &AppState, code: &str) -> Uuid {
        let id = Uuid::new_v4();
        state.tax_types.insert(
            id,
            TaxTypeRecord {
                id,
                code: code.into(),
                name: format!("{code} tax"),
                description: None,
                is_core: true,
                created_at: Utc::now(),
            },
        );
        id
    }

    fn add_period(state: &AppState, tax_type_id: Uuid, due_date: NaiveDate) -> Uuid {
        let id = Uuid::new_v4();
        state.tax_periods.insert(
            id,
            TaxPeriodRecord {
                id,
                tax_type_id,
                period_code: "2025-Q1".into(),
                start_date: due_date - Duration::days(90),
                end_date: due_date - Duration::days(30),
                due_date,
                status: PeriodStatus::Open,
            },
        );
        id
    }

    fn add_refund(f: &Fixture, amount: i64, days_ago: i64) {
        let id = Uuid::new_v4();
        f.state.refunds.insert(
            id,
            RefundRecord {
                id,
                account_id: f.account,
                amount: Money::from_major(amount),
                reason: "overpaid".into(),
                reference_number: format!("REF-{}", id.simple()),
                status: RefundStatus::Approved,
                request_date: Utc::now() - Duration::days(days_ago),
                approval_date: None,
                payment_date: None,
                requested_by: Some(f.owner),
                decided_by: None,
            },
        );
    }

    fn request(f: &Fixture, period: Uuid, amount: i64) -> FileReturn {
        FileReturn {
            account_id: f.account,
            tax_type_id: f.vat,
            tax_period_id: period,
            amount: Money::from_major(amount),
        }
    }

    fn open_period(f: &Fixture) -> Uuid {
        add_period(&f.state, f.vat, today() + Duration::days(30))
    }

    #[tokio::test]
    async fn zero_due_is_filed_and_flagged() {
        let f = fixture();
        let period = open_period(&f);
        let filed = file_return(&f.state, &f.caller, request(&f, period, 0)).await.unwrap();

        assert_eq!(filed.status, ReturnStatus::Filed);
        assert!(filed.is_flagged);
        assert_eq!(filed.flag_reason.as_deref(), Some("Due amount is zero or negative."));
        let stored = f.state.tax_returns.get(&filed.id).unwrap();
        assert!(stored.is_flagged);
        assert_eq!(stored.flag_reason, filed.flag_reason);
    }

    #[tokio::test]
    async fn newest_refund_above_eighty_percent_flags() {
        let f = fixture();
        let period = open_period(&f);
        add_refund(&f, 10, 20);
        add_refund(&f, 90, 1);
        let filed = file_return(&f.state, &f.caller, request(&f, period, 100)).await.unwrap();

        assert!(filed.is_flagged);
        assert_eq!(
            filed.flag_reason.as_deref(),
            Some("Recent refund (90.00) exceeds 80% of due amount (100.00).")
        );
    }

    #[tokio::test]
    async fn only_the_newest_refund_counts() {
        let f = fixture();
        let period = open_period(&f);
        add_refund(&f, 900, 20);
        add_refund(&f, 50, 1);
        let filed = file_return(&f.state, &f.caller, request(&f, period, 100)).await.unwrap();

        assert!(!filed.is_flagged);
        assert_eq!(filed.flag_reason, None);
    }

    #[tokio::test]
    async fn filing_after_period_due_date_flags() {
        let f = fixture();
        let period = add_period(&f.state, f.vat, today() - Duration::days(1));
        let filed = file_return(&f.state, &f.caller, request(&f, period, 100)).await.unwrap();

        assert!(filed.is_flagged);
        assert_eq!(filed.flag_reason.as_deref(), Some("Return filed after due date."));
    }

    #[tokio::test]
    async fn assessment_debits_ledger_from_stored_tail() {
        let f = fixture();
        let period = open_period(&f);
        let filed = file_return(&f.state, &f.caller, request(&f, period, 100)).await.unwrap();

        let entries = f.state.ledger.filter(|e| e.account_id == f.account);
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.entry_no, 3);
        assert_eq!(entry.transaction_type, LedgerEntryKind::Assessment);
        assert_eq!(entry.debit_amount, Money::from_major(100));
        assert_eq!(entry.balance, Money::from_major(140));
        assert_eq!(entry.reference_number.as_deref(), Some(filed.reference_number.as_str()));

        let account = f.state.accounts.get(&f.account).unwrap();
        assert_eq!((account.last_entry_no, account.ledger_balance), (3, Money::from_major(140)));
    }

    #[tokio::test]
    async fn period_of_another_tax_type_is_rejected() {
        let f = fixture();
        let paye = add_tax_type(&f.state, "PAYE");
        let period = add_period(&f.state, paye, today() + Duration::days(30));
        let err = file_return(&f.state, &f.caller, request(&f, period, 100)).await.unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(f.state.tax_returns.is_empty());
        assert!(f.state.ledger.is_empty());
    }

    #[tokio::test]
    async fn filer_and_admins_are_notified() {
        let f = fixture();
        let period = open_period(&f);
        file_return(&f.state, &f.caller, request(&f, period, 100)).await.unwrap();

        let owner_titles: Vec<_> = f
            .state
            .notifications
            .filter(|n| n.user_id == f.owner)
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert_eq!(owner_titles, vec!["Tax Return Filed"]);
        let admin_notes = f.state.notifications.filter(|n| n.user_id == f.admin);
        assert_eq!(admin_notes.len(), 1);
        assert_eq!(admin_notes[0].title, "New Tax Return Filed");
        assert!(admin_notes[0].message.contains("ACC-77"));
    }

    #[tokio::test]
    async fn second_filing_for_same_period_conflicts() {
        let f = fixture();
        let period = open_period(&f);
        file_return(&f.state, &f.caller, request(&f, period, 100)).await.unwrap();
        let err = file_return(&f.state, &f.caller, request(&f, period, 100)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }
}
