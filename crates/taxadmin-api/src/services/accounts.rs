//! Taxpayer accounts, their obligations, and the ledger view.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use taxadmin_core::{Money, ObligationStatus};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_account_access, CallerIdentity};
use crate::changeset::ChangeSet;
use crate::error::AppError;
use crate::extractors::{length_between, require, Validate};
use crate::records::{
    AccountRecord, LedgerEntryRecord, ObligationRecord, PaymentRecord, RefundRecord, TaxReturnRecord,
};
use crate::state::AppState;

use super::{in_scope, load_account, today, visible_accounts};

/// Rows of each kind shown on the account overview.
const OVERVIEW_RECENT: usize = 5;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateAccount {
    pub account_number: String,
    pub name: String,
    /// Owner; only honoured for callers who see every account. Defaults to
    /// the caller.
    pub user_id: Option<Uuid>,
}

impl Validate for CreateAccount {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        length_between(&mut errors, "account_number", &self.account_number, 1, 20);
        require(&mut errors, "name", &self.name);
        length_between(&mut errors, "name", &self.name, 0, 100);
        errors
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccountOverview {
    pub account: AccountRecord,
    pub obligations: Vec<ObligationRecord>,
    pub recent_returns: Vec<TaxReturnRecord>,
    pub recent_payments: Vec<PaymentRecord>,
    pub refunds: Vec<RefundRecord>,
    #[schema(value_type = String)]
    pub ledger_balance: Money,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LedgerView {
    pub account_id: Uuid,
    pub account_number: String,
    pub entries: Vec<LedgerEntryRecord>,
    /// Running balance after the last entry.
    #[schema(value_type = String)]
    pub balance: Money,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterObligation {
    pub tax_type_id: Uuid,
    /// Defaults to today.
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

pub fn list_accounts(state: &AppState, caller: &CallerIdentity) -> Vec<AccountRecord> {
    let scope = visible_accounts(state, caller);
    let mut accounts = state.accounts.filter(|a| in_scope(&scope, a.id));
    accounts.sort_by(|a, b| a.account_number.cmp(&b.account_number));
    accounts
}

pub async fn create_account(
    state: &AppState,
    caller: &CallerIdentity,
    request: CreateAccount,
) -> Result<AccountRecord, AppError> {
    let owner = match request.user_id {
        Some(id) if caller.sees_all_accounts() => {
            if !state.users.contains(&id) {
                return Err(AppError::not_found("user", id));
            }
            id
        }
        _ => caller.require_user()?,
    };
    let account_number = request.account_number.trim().to_string();
    if state.accounts.any(|a| a.account_number == account_number) {
        return Err(AppError::InvalidFields(vec![
            "An account with this number already exists.".to_string(),
        ]));
    }

    let account = AccountRecord {
        id: Uuid::new_v4(),
        account_number,
        name: request.name.trim().to_string(),
        user_id: owner,
        is_active: true,
        ledger_balance: Money::ZERO,
        last_entry_no: 0,
        version: 0,
        created_at: Utc::now(),
    };

    let mut cs = ChangeSet::new();
    cs.insert_account(account.clone());
    cs.audit(
        caller.user_id,
        "create_account",
        "account",
        Some(account.id),
        serde_json::json!({ "account_number": account.account_number, "owner": owner }),
    );
    cs.commit(state).await?;

    tracing::info!(account_id = %account.id, account_number = %account.account_number, "account created");
    Ok(account)
}

pub fn account_overview(
    state: &AppState,
    caller: &CallerIdentity,
    account_id: Uuid,
) -> Result<AccountOverview, AppError> {
    let _snapshot = state.snapshot();
    let account = load_account(state, account_id)?;
    require_account_access(caller, &account)?;

    let mut obligations = state.obligations.filter(|o| o.account_id == account.id);
    obligations.sort_by_key(|o| o.start_date);

    let mut recent_returns = state.tax_returns.filter(|r| r.account_id == account.id);
    recent_returns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    recent_returns.truncate(OVERVIEW_RECENT);

    let mut recent_payments = state.payments.filter(|p| p.account_id == account.id);
    recent_payments.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
    recent_payments.truncate(OVERVIEW_RECENT);

    let mut refunds = state.refunds.filter(|r| r.account_id == account.id);
    refunds.sort_by(|a, b| b.request_date.cmp(&a.request_date));

    Ok(AccountOverview {
        ledger_balance: account.ledger_balance,
        account,
        obligations,
        recent_returns,
        recent_payments,
        refunds,
    })
}

pub fn ledger_view(state: &AppState, caller: &CallerIdentity, account_id: Uuid) -> Result<LedgerView, AppError> {
    let _snapshot = state.snapshot();
    let account = load_account(state, account_id)?;
    require_account_access(caller, &account)?;
    let mut entries = state.ledger.filter(|e| e.account_id == account.id);
    entries.sort_by_key(|e| e.entry_no);
    Ok(LedgerView {
        account_id: account.id,
        account_number: account.account_number,
        entries,
        balance: account.ledger_balance,
    })
}

pub fn list_obligations(
    state: &AppState,
    caller: &CallerIdentity,
    account_id: Uuid,
) -> Result<Vec<ObligationRecord>, AppError> {
    let account = load_account(state, account_id)?;
    require_account_access(caller, &account)?;
    let mut obligations = state.obligations.filter(|o| o.account_id == account.id);
    obligations.sort_by_key(|o| o.start_date);
    Ok(obligations)
}

pub async fn register_obligation(
    state: &AppState,
    caller: &CallerIdentity,
    account_id: Uuid,
    request: RegisterObligation,
) -> Result<ObligationRecord, AppError> {
    let _guard = state.locks.lock(&[account_id]).await;
    let account = load_account(state, account_id)?;
    let tax_type = state
        .tax_types
        .get(&request.tax_type_id)
        .ok_or_else(|| AppError::not_found("tax type", request.tax_type_id))?;

    let start_date = request.start_date.unwrap_or_else(today);
    if let Some(end) = request.end_date {
        if end < start_date {
            return Err(AppError::Validation("end_date must not be before start_date".into()));
        }
    }
    if state.obligations.any(|o| {
        o.account_id == account.id && o.tax_type_id == tax_type.id && o.status == ObligationStatus::Active
    }) {
        return Err(AppError::Conflict(format!(
            "account {} already has an active {} obligation",
            account.account_number, tax_type.code
        )));
    }

    let obligation = ObligationRecord {
        id: Uuid::new_v4(),
        account_id: account.id,
        tax_type_id: tax_type.id,
        start_date,
        end_date: request.end_date,
        status: ObligationStatus::Active,
        registration_date: today(),
    };

    let mut cs = ChangeSet::new();
    cs.put(obligation.clone());
    cs.audit(
        caller.user_id,
        "register_obligation",
        "tax_obligation",
        Some(obligation.id),
        serde_json::json!({ "account_number": account.account_number, "tax_type": tax_type.code }),
    );
    cs.commit(state).await?;

    tracing::info!(
        obligation_id = %obligation.id,
        account_number = %account.account_number,
        tax_type = %tax_type.code,
        "tax obligation registered"
    );
    Ok(obligation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::TaxTypeRecord;
    use taxadmin_core::PermissionSet;

    fn taxpayer() -> CallerIdentity {
        CallerIdentity {
            user_id: Some(Uuid::new_v4()),
            username: "payer".into(),
            is_admin: false,
            user_type: Some("Individual".into()),
            permissions: PermissionSet::new(),
        }
    }

    fn new_account(number: &str) -> CreateAccount {
        CreateAccount {
            account_number: number.into(),
            name: "Household".into(),
            user_id: None,
        }
    }

    #[test]
    fn account_number_length_is_checked() {
        assert_eq!(new_account("").validate().len(), 1);
        assert_eq!(new_account(&"9".repeat(21)).validate().len(), 1);
        assert!(new_account("12345").validate().is_empty());
    }

    #[tokio::test]
    async fn duplicate_account_number_is_a_field_error() {
        let state = AppState::new();
        let caller = taxpayer();
        let account = create_account(&state, &caller, new_account("5005")).await.unwrap();
        assert_eq!(account.user_id, caller.user_id.unwrap());

        let err = create_account(&state, &caller, new_account("5005")).await.unwrap_err();
        match err {
            AppError::InvalidFields(errors) => {
                assert_eq!(errors, vec!["An account with this number already exists."])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn taxpayers_only_list_their_own_accounts() {
        let state = AppState::new();
        let mine = taxpayer();
        let theirs = taxpayer();
        create_account(&state, &mine, new_account("1")).await.unwrap();
        let other = create_account(&state, &theirs, new_account("2")).await.unwrap();

        assert_eq!(list_accounts(&state, &mine).len(), 1);
        let err = account_overview(&state, &mine, other.id).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn one_active_obligation_per_tax_type() {
        let state = AppState::new();
        let caller = taxpayer();
        let account = create_account(&state, &caller, new_account("7")).await.unwrap();
        let vat = TaxTypeRecord {
            id: Uuid::new_v4(),
            code: "VAT".into(),
            name: "Value Added Tax".into(),
            description: None,
            is_core: true,
            created_at: Utc::now(),
        };
        state.tax_types.insert(vat.id, vat.clone());
        let request = RegisterObligation {
            tax_type_id: vat.id,
            start_date: None,
            end_date: None,
        };

        let obligation = register_obligation(&state, &caller, account.id, request.clone())
            .await
            .unwrap();
        assert_eq!(obligation.status, ObligationStatus::Active);
        let err = register_obligation(&state, &caller, account.id, request).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(list_obligations(&state, &caller, account.id).unwrap().len(), 1);
    }
}
