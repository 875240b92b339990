//! # Payment Application
//!
//! [`apply_payment`] is the only place a payment reaches a tax return. The
//! self-service path ([`PaymentCommand::Pay`]) and an officer's decision on
//! a pending payment ([`PaymentCommand::Decide`]) both end in
//! [`settle`], so a payment has the same effect whichever way it arrives:
//!
//! - the payment is stored as Completed;
//! - one Payment line credits the ledger with the full amount;
//! - an amount above the due amount adds a Credit line for the excess, sets
//!   the due amount to zero, finalizes the return, and tells the owner. The
//!   Payment line already moved the balance by the full amount, so the
//!   Credit line is a memo that carries the balance forward;
//! - otherwise the due amount drops by the payment and the return
//!   finalizes only when it reaches exactly zero;
//! - a linked collection is reduced by the same amount.
//!
//! The tax return and account rows are locked for the whole sequence and
//! the return's version is checked again at commit.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use taxadmin_core::{
    CollectionStatus, LedgerEntryKind, Money, NotificationKind, PaymentMethod, PaymentPlan,
    PaymentStatus, PendingPaymentAction, ReferenceKind, ReferenceNumber,
};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_account_access, CallerIdentity};
use crate::changeset::ChangeSet;
use crate::error::AppError;
use crate::records::{
    AccountRecord, CollectionRecord, LedgerEntryRecord, PaymentRecord, TaxReturnRecord,
};
use crate::state::AppState;

use super::ledger::{LedgerLine, LedgerWriter};
use super::notify::notify;
use super::{load_account, load_return};

/// A payment against a tax return.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PaymentRequest {
    pub tax_return_id: Uuid,
    #[schema(value_type = String)]
    pub amount: Money,
    #[schema(value_type = String)]
    pub payment_method: PaymentMethod,
    /// Collection this payment settles, if any.
    pub collection_id: Option<Uuid>,
}

/// The two ways money reaches a return.
#[derive(Debug, Clone)]
pub enum PaymentCommand {
    /// Self-service payment, applied immediately.
    Pay(PaymentRequest),
    /// Officer decision on a payment recorded as pending.
    Decide {
        payment_id: Uuid,
        action: PendingPaymentAction,
    },
}

/// Result of [`apply_payment`].
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentReceipt {
    pub payment: PaymentRecord,
    pub tax_return: TaxReturnRecord,
    /// Excess over the due amount, credited to the account.
    #[schema(value_type = Option<String>)]
    pub overpayment: Option<Money>,
    pub ledger_entries: Vec<LedgerEntryRecord>,
    pub message: String,
}

/// Apply a payment command atomically.
pub async fn apply_payment(
    state: &AppState,
    caller: &CallerIdentity,
    command: PaymentCommand,
) -> Result<PaymentReceipt, AppError> {
    match command {
        PaymentCommand::Pay(request) => pay(state, caller, request).await,
        PaymentCommand::Decide { payment_id, action } => {
            decide(state, caller, payment_id, action).await
        }
    }
}

async fn pay(
    state: &AppState,
    caller: &CallerIdentity,
    request: PaymentRequest,
) -> Result<PaymentReceipt, AppError> {
    let amount = request.amount.positive("amount")?;
    let unlocked = load_return(state, request.tax_return_id)?;
    let account = load_account(state, unlocked.account_id)?;
    require_account_access(caller, &account)?;

    let _guard = state.locks.lock(&[unlocked.id, account.id]).await;
    let tax_return = load_return(state, unlocked.id)?;
    let account = load_account(state, account.id)?;
    let collection = linked_collection(state, &tax_return, request.collection_id)?;

    let now = Utc::now();
    let payment = PaymentRecord {
        id: Uuid::new_v4(),
        tax_return_id: tax_return.id,
        account_id: account.id,
        collection_id: collection.as_ref().map(|c| c.id),
        amount,
        payment_date: now,
        payment_method: request.payment_method,
        reference_number: ReferenceNumber::generate(ReferenceKind::Payment).into_string(),
        status: PaymentStatus::Completed,
        recorded_by: caller.user_id,
        created_at: now,
    };

    let receipt = settle(state, caller, tax_return, account, collection, payment, "pay").await?;
    Ok(receipt)
}

async fn decide(
    state: &AppState,
    caller: &CallerIdentity,
    payment_id: Uuid,
    action: PendingPaymentAction,
) -> Result<PaymentReceipt, AppError> {
    let unlocked = state
        .payments
        .get(&payment_id)
        .ok_or_else(|| AppError::not_found("payment", payment_id))?;

    let _guard = state
        .locks
        .lock(&[payment_id, unlocked.tax_return_id, unlocked.account_id])
        .await;
    let mut payment = state
        .payments
        .get(&payment_id)
        .ok_or_else(|| AppError::not_found("payment", payment_id))?;
    if let Err(e) = action.check(payment.status) {
        tracing::warn!(payment_id = %payment.id, status = %payment.status, "payment already decided");
        return Err(e.into());
    }
    let tax_return = load_return(state, payment.tax_return_id)?;
    let account = load_account(state, payment.account_id)?;

    match action {
        PendingPaymentAction::Approve => {
            let collection = linked_collection(state, &tax_return, payment.collection_id)?;
            payment.status = action.resulting_status();
            payment.payment_date = Utc::now();
            settle(state, caller, tax_return, account, collection, payment, "approve_payment").await
        }
        PendingPaymentAction::Decline => {
            payment.status = action.resulting_status();
            let mut cs = ChangeSet::new();
            cs.put(payment.clone());
            cs.audit(
                caller.user_id,
                "decline_payment",
                "payment",
                Some(payment.id),
                serde_json::json!({
                    "reference_number": payment.reference_number,
                    "amount": payment.amount,
                }),
            );
            cs.commit(state).await?;
            tracing::info!(
                payment_id = %payment.id,
                reference = %payment.reference_number,
                due_amount = %tax_return.due_amount,
                "pending payment declined"
            );
            Ok(PaymentReceipt {
                payment,
                tax_return,
                overpayment: None,
                ledger_entries: Vec::new(),
                message: "Payment declined".to_string(),
            })
        }
    }
}

/// Apply a completed payment to its return. The caller holds the row locks
/// and read every record under them.
async fn settle(
    state: &AppState,
    caller: &CallerIdentity,
    mut tax_return: TaxReturnRecord,
    account: AccountRecord,
    collection: Option<CollectionRecord>,
    payment: PaymentRecord,
    action: &'static str,
) -> Result<PaymentReceipt, AppError> {
    let plan = match PaymentPlan::compute(tax_return.due_amount, tax_return.status, payment.amount) {
        Ok(plan) => plan,
        Err(e) => {
            tracing::warn!(
                tax_return_id = %tax_return.id,
                status = %tax_return.status,
                amount = %payment.amount,
                "payment rejected"
            );
            return Err(e.into());
        }
    };

    let mut cs = ChangeSet::new();
    tax_return.due_amount = plan.new_due;
    tax_return.status = plan.new_status;
    cs.update_return(tax_return.clone());
    cs.put(payment.clone());

    if let Some(mut collection) = collection {
        collection.amount_due = collection.amount_due.less_floor_zero(payment.amount);
        collection.status = if collection.amount_due.is_zero() {
            CollectionStatus::Complete
        } else {
            CollectionStatus::Partial
        };
        cs.put(collection);
    }

    let mut ledger = LedgerWriter::open(account.clone());
    ledger.credit(
        LedgerEntryKind::Payment,
        payment.amount,
        LedgerLine {
            tax_type_id: Some(tax_return.tax_type_id),
            tax_period_id: Some(tax_return.tax_period_id),
            description: format!("Payment for {}", tax_return.reference_number),
            reference_number: Some(payment.reference_number.clone()),
        },
    );
    if let Some(excess) = plan.overpayment {
        ledger.memo_credit(
            LedgerEntryKind::Credit,
            excess,
            LedgerLine {
                tax_type_id: Some(tax_return.tax_type_id),
                tax_period_id: Some(tax_return.tax_period_id),
                description: format!("Credit from overpayment on {}", tax_return.reference_number),
                reference_number: Some(ReferenceNumber::generate(ReferenceKind::Credit).into_string()),
            },
        );
        notify(
            &mut cs,
            account.user_id,
            "Overpayment Detected",
            format!(
                "You have overpaid tax return {} by ${excess}. This amount has been credited to your account.",
                tax_return.reference_number
            ),
            NotificationKind::Alert,
        );
    }
    let ledger_entries = ledger.finish(&mut cs);

    cs.audit(
        caller.user_id,
        action,
        "payment",
        Some(payment.id),
        serde_json::json!({
            "reference_number": payment.reference_number,
            "tax_return": tax_return.reference_number,
            "amount": payment.amount,
            "previous_due": plan.previous_due,
            "new_due": plan.new_due,
            "overpayment": plan.overpayment,
        }),
    );
    cs.commit(state).await?;

    tracing::info!(
        payment_id = %payment.id,
        reference = %payment.reference_number,
        tax_return_id = %tax_return.id,
        due_amount = %tax_return.due_amount,
        status = %tax_return.status,
        "payment applied"
    );

    let message = match plan.overpayment {
        Some(excess) => format!("Overpayment of ${excess} detected and credited to the account"),
        None if action == "approve_payment" => "Payment approved successfully".to_string(),
        None => "Payment processed successfully".to_string(),
    };
    Ok(PaymentReceipt {
        payment,
        tax_return,
        overpayment: plan.overpayment,
        ledger_entries,
        message,
    })
}

fn linked_collection(
    state: &AppState,
    tax_return: &TaxReturnRecord,
    collection_id: Option<Uuid>,
) -> Result<Option<CollectionRecord>, AppError> {
    let Some(id) = collection_id else {
        return Ok(None);
    };
    let collection = state
        .collections
        .get(&id)
        .ok_or_else(|| AppError::not_found("collection", id))?;
    if collection.tax_return_id != tax_return.id {
        return Err(AppError::Validation(format!(
            "collection {} is not for tax return {}",
            collection.reference_number, tax_return.reference_number
        )));
    }
    Ok(Some(collection))
}

/// Record a payment awaiting confirmation. The return is untouched until
/// an officer approves it.
pub async fn record_pending(
    state: &AppState,
    caller: &CallerIdentity,
    request: PaymentRequest,
) -> Result<PaymentRecord, AppError> {
    let amount = request.amount.positive("amount")?;
    let tax_return = load_return(state, request.tax_return_id)?;
    let account = load_account(state, tax_return.account_id)?;
    require_account_access(caller, &account)?;
    if !tax_return.status.accepts_payments() {
        return Err(taxadmin_core::LedgerError::ReturnNotPayable {
            status: tax_return.status.to_string(),
        }
        .into());
    }
    let collection = linked_collection(state, &tax_return, request.collection_id)?;

    let now = Utc::now();
    let payment = PaymentRecord {
        id: Uuid::new_v4(),
        tax_return_id: tax_return.id,
        account_id: account.id,
        collection_id: collection.map(|c| c.id),
        amount,
        payment_date: now,
        payment_method: request.payment_method,
        reference_number: ReferenceNumber::generate(ReferenceKind::Payment).into_string(),
        status: PaymentStatus::Pending,
        recorded_by: caller.user_id,
        created_at: now,
    };

    let mut cs = ChangeSet::new();
    cs.put(payment.clone());
    cs.audit(
        caller.user_id,
        "record_pending_payment",
        "payment",
        Some(payment.id),
        serde_json::json!({
            "reference_number": payment.reference_number,
            "tax_return": tax_return.reference_number,
            "amount": payment.amount,
        }),
    );
    cs.commit(state).await?;
    tracing::info!(
        payment_id = %payment.id,
        reference = %payment.reference_number,
        due_amount = %tax_return.due_amount,
        "pending payment recorded"
    );
    Ok(payment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{TaxPeriodRecord, TaxTypeRecord};
    use chrono::NaiveDate;
    use taxadmin_core::{AssessmentType, PeriodStatus, PermissionSet, ReturnStatus};

    struct Fixture {
        state: AppState,
        caller: CallerIdentity,
        owner: Uuid,
        account: Uuid,
    }

    fn fixture() -> Fixture {
        let state = AppState::new();
        let owner = Uuid::new_v4();
        let account = Uuid::new_v4();
        state.accounts.insert(
            account,
            AccountRecord {
                id: account,
                account_number: "1001".into(),
                name: "Main".into(),
                user_id: owner,
                is_active: true,
                ledger_balance: Money::ZERO,
                last_entry_no: 0,
                version: 0,
                created_at: Utc::now(),
            },
        );
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
            account,
        }
    }

    fn add_return(f: &Fixture, due: i64, status: ReturnStatus) -> Uuid {
        let tax_type = Uuid::new_v4();
        f.state.tax_types.insert(
            tax_type,
            TaxTypeRecord {
                id: tax_type,
                code: "VAT".into(),
                name: "Value Added Tax".into(),
                description: None,
                is_core: true,
                created_at: Utc::now(),
            },
        );
        let period = Uuid::new_v4();
        let day = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        f.state.tax_periods.insert(
            period,
            TaxPeriodRecord {
                id: period,
                tax_type_id: tax_type,
                period_code: "2025-Q1".into(),
                start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                end_date: day,
                due_date: day,
                status: PeriodStatus::Open,
            },
        );
        let id = Uuid::new_v4();
        f.state.tax_returns.insert(
            id,
            TaxReturnRecord {
                id,
                account_id: f.account,
                tax_type_id: tax_type,
                tax_period_id: period,
                reference_number: "TX-0000AAAA".into(),
                filing_date: Some(Utc::now()),
                due_amount: Money::from_major(due),
                status,
                assessment_date: None,
                assessment_type: Some(AssessmentType::SelfAssessed),
                is_flagged: false,
                flag_reason: None,
                filed_by: Some(f.owner),
                version: 0,
                created_at: Utc::now(),
            },
        );
        id
    }

    fn pay_cmd(tax_return_id: Uuid, amount: i64) -> PaymentCommand {
        PaymentCommand::Pay(PaymentRequest {
            tax_return_id,
            amount: Money::from_major(amount),
            payment_method: PaymentMethod::Online,
            collection_id: None,
        })
    }

    fn ledger_kinds(state: &AppState, account: Uuid) -> Vec<(LedgerEntryKind, Money)> {
        let mut entries = state.ledger.filter(|e| e.account_id == account);
        entries.sort_by_key(|e| e.entry_no);
        entries
            .into_iter()
            .map(|e| (e.transaction_type, e.credit_amount))
            .collect()
    }

    #[tokio::test]
    async fn overpayment_finalizes_and_credits_excess() {
        let f = fixture();
        let id = add_return(&f, 100, ReturnStatus::Filed);
        let receipt = apply_payment(&f.state, &f.caller, pay_cmd(id, 150)).await.unwrap();

        assert_eq!(receipt.tax_return.due_amount, Money::ZERO);
        assert_eq!(receipt.tax_return.status, ReturnStatus::Finalized);
        assert_eq!(receipt.overpayment, Some(Money::from_major(50)));
        assert_eq!(
            ledger_kinds(&f.state, f.account),
            vec![
                (LedgerEntryKind::Payment, Money::from_major(150)),
                (LedgerEntryKind::Credit, Money::from_major(50)),
            ]
        );
        let notes = f.state.notifications.filter(|n| n.user_id == f.owner);
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Overpayment Detected");
    }

    #[tokio::test]
    async fn overpayment_leaves_balance_at_assessed_less_paid() {
        let f = fixture();
        let mut account = f.state.accounts.get(&f.account).unwrap();
        account.ledger_balance = Money::from_major(100);
        account.last_entry_no = 1;
        f.state.accounts.insert(f.account, account);
        let id = add_return(&f, 100, ReturnStatus::Filed);

        let receipt = apply_payment(&f.state, &f.caller, pay_cmd(id, 150)).await.unwrap();

        let stored = f.state.accounts.get(&f.account).unwrap();
        assert_eq!(stored.ledger_balance, Money::from_major(100) - Money::from_major(150));
        assert_eq!(stored.last_entry_no, 3);
        let balances: Vec<_> = receipt.ledger_entries.iter().map(|e| (e.entry_no, e.balance)).collect();
        assert_eq!(
            balances,
            vec![(2, Money::from_major(-50)), (3, Money::from_major(-50))]
        );
    }

    #[tokio::test]
    async fn exact_payment_finalizes_without_credit() {
        let f = fixture();
        let id = add_return(&f, 200, ReturnStatus::Filed);
        let receipt = apply_payment(&f.state, &f.caller, pay_cmd(id, 200)).await.unwrap();
        assert_eq!(receipt.tax_return.due_amount, Money::ZERO);
        assert_eq!(receipt.tax_return.status, ReturnStatus::Finalized);
        assert_eq!(receipt.overpayment, None);
        assert_eq!(ledger_kinds(&f.state, f.account).len(), 1);
    }

    #[tokio::test]
    async fn partial_payment_keeps_status() {
        let f = fixture();
        let id = add_return(&f, 300, ReturnStatus::Assessed);
        let receipt = apply_payment(&f.state, &f.caller, pay_cmd(id, 100)).await.unwrap();
        assert_eq!(receipt.tax_return.due_amount, Money::from_major(200));
        assert_eq!(receipt.tax_return.status, ReturnStatus::Assessed);
        assert_eq!(f.state.tax_returns.get(&id).unwrap().version, 1);
    }

    #[tokio::test]
    async fn finalized_return_rejects_payment() {
        let f = fixture();
        let id = add_return(&f, 0, ReturnStatus::Finalized);
        let err = apply_payment(&f.state, &f.caller, pay_cmd(id, 10)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(f.state.payments.is_empty());
        assert!(f.state.ledger.is_empty());
    }

    #[tokio::test]
    async fn approving_pending_payment_matches_self_service() {
        let f = fixture();
        let id = add_return(&f, 100, ReturnStatus::Filed);
        let pending = record_pending(
            &f.state,
            &f.caller,
            PaymentRequest {
                tax_return_id: id,
                amount: Money::from_major(150),
                payment_method: PaymentMethod::Bank,
                collection_id: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(pending.status, PaymentStatus::Pending);
        assert_eq!(f.state.tax_returns.get(&id).unwrap().due_amount, Money::from_major(100));

        let receipt = apply_payment(
            &f.state,
            &f.caller,
            PaymentCommand::Decide {
                payment_id: pending.id,
                action: PendingPaymentAction::Approve,
            },
        )
        .await
        .unwrap();
        assert_eq!(receipt.payment.status, PaymentStatus::Completed);
        assert_eq!(receipt.tax_return.status, ReturnStatus::Finalized);
        assert_eq!(receipt.overpayment, Some(Money::from_major(50)));

        let again = apply_payment(
            &f.state,
            &f.caller,
            PaymentCommand::Decide {
                payment_id: pending.id,
                action: PendingPaymentAction::Approve,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(again, AppError::Conflict(_)));
        assert_eq!(ledger_kinds(&f.state, f.account).len(), 2);
    }

    #[tokio::test]
    async fn declining_leaves_return_untouched() {
        let f = fixture();
        let id = add_return(&f, 100, ReturnStatus::Filed);
        let pending = record_pending(
            &f.state,
            &f.caller,
            PaymentRequest {
                tax_return_id: id,
                amount: Money::from_major(40),
                payment_method: PaymentMethod::Cash,
                collection_id: None,
            },
        )
        .await
        .unwrap();
        let receipt = apply_payment(
            &f.state,
            &f.caller,
            PaymentCommand::Decide {
                payment_id: pending.id,
                action: PendingPaymentAction::Decline,
            },
        )
        .await
        .unwrap();
        assert_eq!(receipt.payment.status, PaymentStatus::Failed);
        assert_eq!(f.state.tax_returns.get(&id).unwrap().due_amount, Money::from_major(100));
        assert!(f.state.ledger.is_empty());
    }

    #[tokio::test]
    async fn concurrent_payments_never_drive_due_negative() {
        let f = fixture();
        let id = add_return(&f, 100, ReturnStatus::Filed);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let state = f.state.clone();
            let caller = f.caller.clone();
            handles.push(tokio::spawn(async move {
                apply_payment(&state, &caller, pay_cmd(id, 30)).await
            }));
        }
        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                applied += 1;
            }
        }
        let stored = f.state.tax_returns.get(&id).unwrap();
        assert_eq!(stored.due_amount, Money::ZERO);
        assert_eq!(stored.status, ReturnStatus::Finalized);
        assert_eq!(applied, 4);
        let completed = f
            .state
            .payments
            .filter(|p| p.status == PaymentStatus::Completed)
            .len();
        assert_eq!(completed, 4);
    }
}
