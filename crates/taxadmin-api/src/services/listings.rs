//! Read-side listings for the tax catalog, returns, payments, refunds and
//! objections. Every listing is limited to the caller's accounts.

use serde::{Deserialize, Serialize};
use taxadmin_core::{ObjectionStatus, PaymentStatus, RefundStatus, ReturnStatus};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{require_account_access, CallerIdentity};
use crate::error::AppError;
use crate::records::{
    ObjectionRecord, PaymentRecord, RefundRecord, TaxPeriodRecord, TaxReturnRecord, TaxTypeRecord,
};
use crate::state::AppState;

use super::{in_scope, load_account, load_return, visible_accounts};

fn parse_filter<T: std::str::FromStr>(raw: &Option<String>) -> Result<Option<T>, AppError>
where
    AppError: From<T::Err>,
{
    Ok(raw
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<T>)
        .transpose()?)
}

// -- Catalog -------------------------------------------------------------------

pub fn tax_types(state: &AppState) -> Vec<TaxTypeRecord> {
    let mut types = state.tax_types.list();
    types.sort_by(|a, b| a.code.cmp(&b.code));
    types
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PeriodFilters {
    pub tax_type_id: Option<Uuid>,
}

/// Periods ordered by due date.
pub fn tax_periods(state: &AppState, filters: &PeriodFilters) -> Vec<TaxPeriodRecord> {
    let mut periods = state
        .tax_periods
        .filter(|p| filters.tax_type_id.map_or(true, |t| p.tax_type_id == t));
    periods.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.period_code.cmp(&b.period_code)));
    periods
}

// -- Returns -------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ReturnFilters {
    pub account_id: Option<Uuid>,
    pub tax_type_id: Option<Uuid>,
    pub status: Option<String>,
    pub flagged: Option<bool>,
}

/// Returns, newest first.
pub fn list_returns(
    state: &AppState,
    caller: &CallerIdentity,
    filters: &ReturnFilters,
) -> Result<Vec<TaxReturnRecord>, AppError> {
    let status: Option<ReturnStatus> = parse_filter(&filters.status)?;
    let scope = visible_accounts(state, caller);
    let mut rows = state.tax_returns.filter(|r| {
        in_scope(&scope, r.account_id)
            && filters.account_id.map_or(true, |a| r.account_id == a)
            && filters.tax_type_id.map_or(true, |t| r.tax_type_id == t)
            && status.map_or(true, |s| r.status == s)
            && filters.flagged.map_or(true, |f| r.is_flagged == f)
    });
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(rows)
}

/// A return with its payments and objections.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnDetail {
    pub tax_return: TaxReturnRecord,
    pub payments: Vec<PaymentRecord>,
    pub objections: Vec<ObjectionRecord>,
    /// An audit that has not completed or been cancelled.
    pub under_audit: bool,
}

pub fn return_detail(state: &AppState, caller: &CallerIdentity, id: Uuid) -> Result<ReturnDetail, AppError> {
    let _snapshot = state.snapshot();
    let tax_return = load_return(state, id)?;
    require_account_access(caller, &load_account(state, tax_return.account_id)?)?;

    let mut payments = state.payments.filter(|p| p.tax_return_id == id);
    payments.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
    let mut objections = state.objections.filter(|o| o.tax_return_id == id);
    objections.sort_by(|a, b| b.filing_date.cmp(&a.filing_date));
    let under_audit = state
        .audits
        .any(|a| a.tax_return_id == Some(id) && a.is_active());

    Ok(ReturnDetail {
        tax_return,
        payments,
        objections,
        under_audit,
    })
}

// -- Payments ------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PaymentFilters {
    pub tax_return_id: Option<Uuid>,
    pub status: Option<String>,
}

pub fn list_payments(
    state: &AppState,
    caller: &CallerIdentity,
    filters: &PaymentFilters,
) -> Result<Vec<PaymentRecord>, AppError> {
    let status: Option<PaymentStatus> = parse_filter(&filters.status)?;
    let scope = visible_accounts(state, caller);
    let mut rows = state.payments.filter(|p| {
        in_scope(&scope, p.account_id)
            && filters.tax_return_id.map_or(true, |r| p.tax_return_id == r)
            && status.map_or(true, |s| p.status == s)
    });
    rows.sort_by(|a, b| b.payment_date.cmp(&a.payment_date));
    Ok(rows)
}

pub fn get_payment(state: &AppState, caller: &CallerIdentity, id: Uuid) -> Result<PaymentRecord, AppError> {
    let payment = state
        .payments
        .get(&id)
        .ok_or_else(|| AppError::not_found("payment", id))?;
    require_account_access(caller, &load_account(state, payment.account_id)?)?;
    Ok(payment)
}

// -- Refunds and objections ----------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct StatusFilter {
    pub status: Option<String>,
}

pub fn list_refunds(
    state: &AppState,
    caller: &CallerIdentity,
    filters: &StatusFilter,
) -> Result<Vec<RefundRecord>, AppError> {
    let status: Option<RefundStatus> = parse_filter(&filters.status)?;
    let scope = visible_accounts(state, caller);
    let mut rows = state
        .refunds
        .filter(|r| in_scope(&scope, r.account_id) && status.map_or(true, |s| r.status == s));
    rows.sort_by(|a, b| b.request_date.cmp(&a.request_date));
    Ok(rows)
}

pub fn list_objections(
    state: &AppState,
    caller: &CallerIdentity,
    filters: &StatusFilter,
) -> Result<Vec<ObjectionRecord>, AppError> {
    let status: Option<ObjectionStatus> = parse_filter(&filters.status)?;
    let scope = visible_accounts(state, caller);
    let mut rows = state
        .objections
        .filter(|o| in_scope(&scope, o.account_id) && status.map_or(true, |s| o.status == s));
    rows.sort_by(|a, b| b.filing_date.cmp(&a.filing_date));
    Ok(rows)
}
