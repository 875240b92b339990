//! # Tax Operations API
//!
//! - **GET `/v1/tax/types`**, **GET `/v1/tax/periods`**: the catalog
//! - **GET/POST `/v1/tax/returns`**, **GET `/v1/tax/returns/:id`**: filing
//! - **POST `/v1/tax/calculate`**: indicative tax due
//! - **GET/POST `/v1/tax/payments`**, **GET `/v1/tax/payments/:id`**
//! - **POST `/v1/tax/payments/pending`**: record a payment awaiting confirmation
//! - **POST `/v1/tax/payments/:id/approve`**, **`/decline`**
//! - **GET/POST `/v1/tax/refunds`**, **POST `/v1/tax/refunds/:id/approve`**, **`/reject`**
//! - **GET/POST `/v1/tax/objections`**, **POST `/v1/tax/objections/:id/:action`**
//! - **GET/POST `/v1/tax/audits`**
//! - **GET `/v1/tax/accounts/:id/ledger`**
//!
//! Handlers check the coarse permission and decode the request; account
//! scoping and every state change happen in [`crate::services`].

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use taxadmin_core::calculator::{self, Calculation};
use taxadmin_core::{Money, Permission, PendingPaymentAction, RefundAction};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_any, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json};
use crate::pagination::{Page, PageParams};
use crate::records::{
    AuditRecord, ObjectionRecord, PaymentRecord, RefundRecord, TaxPeriodRecord, TaxReturnRecord,
    TaxTypeRecord,
};
use crate::services::accounts::{self, LedgerView};
use crate::services::audits::{self, AuditDetail, AuditFilters, OpenAudit};
use crate::services::filing::{self, FileReturn};
use crate::services::listings::{
    self, PaymentFilters, PeriodFilters, ReturnDetail, ReturnFilters, StatusFilter,
};
use crate::services::objections::{self, FileObjection, ObjectionAction, ObjectionDecisionResult};
use crate::services::payments::{self, PaymentCommand, PaymentReceipt, PaymentRequest};
use crate::services::refunds::{self, RefundDecisionResult, RefundRequest};
use crate::state::AppState;

const FILERS: &[Permission] = &[Permission::FileIndividualReturns, Permission::FileBusinessReturns];
const PAYMENT_OFFICERS: &[Permission] = &[Permission::AdminAccess, Permission::ProcessReturns];
const REFUND_OFFICERS: &[Permission] = &[Permission::AdminAccess, Permission::ProcessRefunds];
const OBJECTION_OFFICERS: &[Permission] = &[Permission::AdminAccess, Permission::HandleObjections];
const AUDITORS: &[Permission] = &[Permission::ViewAllAccounts, Permission::AdminAccess];

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Input to the tax calculator.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CalculateRequest {
    /// Tax type code such as `VAT` or `PIT`.
    pub tax_type_code: String,
    #[schema(value_type = String)]
    pub income: Money,
    #[schema(value_type = Option<String>)]
    pub deductions: Option<Money>,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/tax/types", get(list_tax_types))
        .route("/v1/tax/periods", get(list_tax_periods))
        .route("/v1/tax/returns", get(list_returns).post(file_return))
        .route("/v1/tax/returns/:id", get(get_return))
        .route("/v1/tax/calculate", post(calculate))
        .route("/v1/tax/payments", get(list_payments).post(make_payment))
        .route("/v1/tax/payments/pending", post(record_pending_payment))
        .route("/v1/tax/payments/:id", get(get_payment))
        .route("/v1/tax/payments/:id/approve", post(approve_payment))
        .route("/v1/tax/payments/:id/decline", post(decline_payment))
        .route("/v1/tax/refunds", get(list_refunds).post(request_refund))
        .route("/v1/tax/refunds/:id/approve", post(approve_refund))
        .route("/v1/tax/refunds/:id/reject", post(reject_refund))
        .route("/v1/tax/objections", get(list_objections).post(file_objection))
        .route("/v1/tax/objections/:id/:action", post(process_objection))
        .route("/v1/tax/audits", get(list_audits).post(open_audit))
        .route("/v1/tax/accounts/:id/ledger", get(account_ledger))
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// GET /v1/tax/types
#[utoipa::path(
    get,
    path = "/v1/tax/types",
    responses((status = 200, description = "Tax types", body = Vec<TaxTypeRecord>)),
    tag = "tax"
)]
async fn list_tax_types(State(state): State<AppState>) -> Json<Vec<TaxTypeRecord>> {
    Json(listings::tax_types(&state))
}

/// GET /v1/tax/periods
#[utoipa::path(
    get,
    path = "/v1/tax/periods",
    params(PeriodFilters),
    responses((status = 200, description = "Tax periods by due date", body = Vec<TaxPeriodRecord>)),
    tag = "tax"
)]
async fn list_tax_periods(
    State(state): State<AppState>,
    Query(filters): Query<PeriodFilters>,
) -> Json<Vec<TaxPeriodRecord>> {
    Json(listings::tax_periods(&state, &filters))
}

// ---------------------------------------------------------------------------
// Returns
// ---------------------------------------------------------------------------

/// GET /v1/tax/returns
#[utoipa::path(
    get,
    path = "/v1/tax/returns",
    params(ReturnFilters, PageParams),
    responses(
        (status = 200, description = "Page of tax returns"),
        (status = 422, description = "Unknown status filter", body = crate::error::ErrorBody),
    ),
    tag = "tax"
)]
async fn list_returns(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(filters): Query<ReturnFilters>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<TaxReturnRecord>>, AppError> {
    let rows = listings::list_returns(&state, &caller, &filters)?;
    Ok(Json(Page::of(rows, page, state.config.items_per_page)))
}

/// GET /v1/tax/returns/:id
#[utoipa::path(
    get,
    path = "/v1/tax/returns/{id}",
    params(("id" = Uuid, Path, description = "Tax return id")),
    responses(
        (status = 200, description = "Return with payments and objections", body = ReturnDetail),
        (status = 403, description = "Not the caller's account", body = crate::error::ErrorBody),
        (status = 404, description = "No such return", body = crate::error::ErrorBody),
    ),
    tag = "tax"
)]
async fn get_return(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<ReturnDetail>, AppError> {
    Ok(Json(listings::return_detail(&state, &caller, id)?))
}

/// POST /v1/tax/returns: file a self-assessed return.
#[utoipa::path(
    post,
    path = "/v1/tax/returns",
    request_body = FileReturn,
    responses(
        (status = 201, description = "Return filed", body = TaxReturnRecord),
        (status = 403, description = "Caller may not file for this account", body = crate::error::ErrorBody),
        (status = 409, description = "Already filed for the period", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid amount or period", body = crate::error::ErrorBody),
    ),
    tag = "tax"
)]
async fn file_return(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<FileReturn>, JsonRejection>,
) -> Result<(StatusCode, Json<TaxReturnRecord>), AppError> {
    require_any(&caller, FILERS)?;
    let request = extract_json(body)?;
    let tax_return = filing::file_return(&state, &caller, request).await?;
    Ok((StatusCode::CREATED, Json(tax_return)))
}

/// POST /v1/tax/calculate
#[utoipa::path(
    post,
    path = "/v1/tax/calculate",
    request_body = CalculateRequest,
    responses((status = 200, description = "Estimated tax due")),
    tag = "tax"
)]
async fn calculate(body: Result<Json<CalculateRequest>, JsonRejection>) -> Result<Json<Calculation>, AppError> {
    let request = extract_json(body)?;
    let income = request.income.non_negative("income")?;
    let deductions = request.deductions.unwrap_or(Money::ZERO).non_negative("deductions")?;
    Ok(Json(calculator::calculate(&request.tax_type_code, income, deductions)))
}

// ---------------------------------------------------------------------------
// Payments
// ---------------------------------------------------------------------------

/// GET /v1/tax/payments
#[utoipa::path(
    get,
    path = "/v1/tax/payments",
    params(PaymentFilters, PageParams),
    responses((status = 200, description = "Page of payments")),
    tag = "tax"
)]
async fn list_payments(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(filters): Query<PaymentFilters>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<PaymentRecord>>, AppError> {
    let rows = listings::list_payments(&state, &caller, &filters)?;
    Ok(Json(Page::of(rows, page, state.config.items_per_page)))
}

/// GET /v1/tax/payments/:id
#[utoipa::path(
    get,
    path = "/v1/tax/payments/{id}",
    params(("id" = Uuid, Path, description = "Payment id")),
    responses(
        (status = 200, description = "Payment", body = PaymentRecord),
        (status = 404, description = "No such payment", body = crate::error::ErrorBody),
    ),
    tag = "tax"
)]
async fn get_payment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentRecord>, AppError> {
    Ok(Json(listings::get_payment(&state, &caller, id)?))
}

/// POST /v1/tax/payments: pay against a return, applied immediately.
#[utoipa::path(
    post,
    path = "/v1/tax/payments",
    request_body = PaymentRequest,
    responses(
        (status = 201, description = "Payment applied", body = PaymentReceipt),
        (status = 409, description = "Return does not accept payments", body = crate::error::ErrorBody),
        (status = 422, description = "Amount not positive", body = crate::error::ErrorBody),
    ),
    tag = "tax"
)]
async fn make_payment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PaymentReceipt>), AppError> {
    let request = extract_json(body)?;
    let receipt = payments::apply_payment(&state, &caller, PaymentCommand::Pay(request)).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /v1/tax/payments/pending
#[utoipa::path(
    post,
    path = "/v1/tax/payments/pending",
    request_body = PaymentRequest,
    responses(
        (status = 201, description = "Pending payment recorded", body = PaymentRecord),
        (status = 409, description = "Return does not accept payments", body = crate::error::ErrorBody),
    ),
    tag = "tax"
)]
async fn record_pending_payment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<PaymentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PaymentRecord>), AppError> {
    let request = extract_json(body)?;
    let payment = payments::record_pending(&state, &caller, request).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn decide_payment(
    state: AppState,
    caller: CallerIdentity,
    payment_id: Uuid,
    action: PendingPaymentAction,
) -> Result<Json<PaymentReceipt>, AppError> {
    require_any(&caller, PAYMENT_OFFICERS)?;
    let command = PaymentCommand::Decide { payment_id, action };
    Ok(Json(payments::apply_payment(&state, &caller, command).await?))
}

/// POST /v1/tax/payments/:id/approve
#[utoipa::path(
    post,
    path = "/v1/tax/payments/{id}/approve",
    params(("id" = Uuid, Path, description = "Pending payment id")),
    responses(
        (status = 200, description = "Payment applied", body = PaymentReceipt),
        (status = 403, description = "Not a payment officer", body = crate::error::ErrorBody),
        (status = 409, description = "Payment is not pending", body = crate::error::ErrorBody),
    ),
    tag = "tax"
)]
async fn approve_payment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentReceipt>, AppError> {
    decide_payment(state, caller, id, PendingPaymentAction::Approve).await
}

/// POST /v1/tax/payments/:id/decline
#[utoipa::path(
    post,
    path = "/v1/tax/payments/{id}/decline",
    params(("id" = Uuid, Path, description = "Pending payment id")),
    responses(
        (status = 200, description = "Payment marked failed", body = PaymentReceipt),
        (status = 403, description = "Not a payment officer", body = crate::error::ErrorBody),
    ),
    tag = "tax"
)]
async fn decline_payment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<PaymentReceipt>, AppError> {
    decide_payment(state, caller, id, PendingPaymentAction::Decline).await
}

// ---------------------------------------------------------------------------
// Refunds
// ---------------------------------------------------------------------------

/// GET /v1/tax/refunds
#[utoipa::path(
    get,
    path = "/v1/tax/refunds",
    params(StatusFilter, PageParams),
    responses((status = 200, description = "Page of refunds")),
    tag = "tax"
)]
async fn list_refunds(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(filters): Query<StatusFilter>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<RefundRecord>>, AppError> {
    let rows = listings::list_refunds(&state, &caller, &filters)?;
    Ok(Json(Page::of(rows, page, state.config.items_per_page)))
}

/// POST /v1/tax/refunds
#[utoipa::path(
    post,
    path = "/v1/tax/refunds",
    request_body = RefundRequest,
    responses(
        (status = 201, description = "Refund requested", body = RefundRecord),
        (status = 422, description = "Validation failed", body = crate::error::ErrorBody),
    ),
    tag = "tax"
)]
async fn request_refund(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<RefundRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RefundRecord>), AppError> {
    let request = extract_validated_json(body)?;
    let refund = refunds::request_refund(&state, &caller, request).await?;
    Ok((StatusCode::CREATED, Json(refund)))
}

/// POST /v1/tax/refunds/:id/approve
#[utoipa::path(
    post,
    path = "/v1/tax/refunds/{id}/approve",
    params(("id" = Uuid, Path, description = "Refund id")),
    responses(
        (status = 200, description = "Applied, or already processed", body = RefundDecisionResult),
        (status = 403, description = "Not a refund officer", body = crate::error::ErrorBody),
    ),
    tag = "tax"
)]
async fn approve_refund(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<RefundDecisionResult>, AppError> {
    require_any(&caller, REFUND_OFFICERS)?;
    Ok(Json(refunds::decide_refund(&state, &caller, id, RefundAction::Approve).await?))
}

/// POST /v1/tax/refunds/:id/reject
#[utoipa::path(
    post,
    path = "/v1/tax/refunds/{id}/reject",
    params(("id" = Uuid, Path, description = "Refund id")),
    responses(
        (status = 200, description = "Applied, or already processed", body = RefundDecisionResult),
        (status = 403, description = "Not a refund officer", body = crate::error::ErrorBody),
    ),
    tag = "tax"
)]
async fn reject_refund(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<RefundDecisionResult>, AppError> {
    require_any(&caller, REFUND_OFFICERS)?;
    Ok(Json(refunds::decide_refund(&state, &caller, id, RefundAction::Reject).await?))
}

// ---------------------------------------------------------------------------
// Objections
// ---------------------------------------------------------------------------

/// GET /v1/tax/objections
#[utoipa::path(
    get,
    path = "/v1/tax/objections",
    params(StatusFilter, PageParams),
    responses((status = 200, description = "Page of objections")),
    tag = "tax"
)]
async fn list_objections(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(filters): Query<StatusFilter>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<ObjectionRecord>>, AppError> {
    let rows = listings::list_objections(&state, &caller, &filters)?;
    Ok(Json(Page::of(rows, page, state.config.items_per_page)))
}

/// POST /v1/tax/objections
#[utoipa::path(
    post,
    path = "/v1/tax/objections",
    request_body = FileObjection,
    responses(
        (status = 201, description = "Objection filed", body = ObjectionRecord),
        (status = 409, description = "Return not contestable or already objected to", body = crate::error::ErrorBody),
    ),
    tag = "tax"
)]
async fn file_objection(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<FileObjection>, JsonRejection>,
) -> Result<(StatusCode, Json<ObjectionRecord>), AppError> {
    let request = extract_validated_json(body)?;
    let objection = objections::file_objection(&state, &caller, request).await?;
    Ok((StatusCode::CREATED, Json(objection)))
}

/// POST /v1/tax/objections/:id/:action, action one of `approve`, `reject`,
/// `in_progress`.
#[utoipa::path(
    post,
    path = "/v1/tax/objections/{id}/{action}",
    params(
        ("id" = Uuid, Path, description = "Objection id"),
        ("action" = String, Path, description = "approve, reject or in_progress"),
    ),
    responses(
        (status = 200, description = "Applied, or already processed", body = ObjectionDecisionResult),
        (status = 400, description = "Unknown action", body = crate::error::ErrorBody),
        (status = 403, description = "Not an objection officer", body = crate::error::ErrorBody),
    ),
    tag = "tax"
)]
async fn process_objection(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((id, action)): Path<(Uuid, String)>,
) -> Result<Json<ObjectionDecisionResult>, AppError> {
    require_any(&caller, OBJECTION_OFFICERS)?;
    let action: ObjectionAction = action.parse()?;
    Ok(Json(objections::decide_objection(&state, &caller, id, action).await?))
}

// ---------------------------------------------------------------------------
// Audits and ledger
// ---------------------------------------------------------------------------

/// GET /v1/tax/audits
#[utoipa::path(
    get,
    path = "/v1/tax/audits",
    params(AuditFilters, PageParams),
    responses((status = 200, description = "Page of audits")),
    tag = "tax"
)]
async fn list_audits(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(filters): Query<AuditFilters>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<AuditRecord>>, AppError> {
    require_any(&caller, AUDITORS)?;
    let rows = audits::list_audits(&state, &caller, &filters)?;
    Ok(Json(Page::of(rows, page, state.config.items_per_page)))
}

/// POST /v1/tax/audits: open an audit on a filed return.
#[utoipa::path(
    post,
    path = "/v1/tax/audits",
    request_body = OpenAudit,
    responses(
        (status = 201, description = "Audit opened with its first case", body = AuditDetail),
        (status = 409, description = "Return not auditable or already under audit", body = crate::error::ErrorBody),
    ),
    tag = "tax"
)]
async fn open_audit(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<OpenAudit>, JsonRejection>,
) -> Result<(StatusCode, Json<AuditDetail>), AppError> {
    require_any(&caller, AUDITORS)?;
    let request = extract_json(body)?;
    let detail = audits::open_audit(&state, &caller, request).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /v1/tax/accounts/:id/ledger
#[utoipa::path(
    get,
    path = "/v1/tax/accounts/{id}/ledger",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Ledger entries and running balance", body = LedgerView),
        (status = 403, description = "Not the caller's account", body = crate::error::ErrorBody),
    ),
    tag = "tax"
)]
async fn account_ledger(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<LedgerView>, AppError> {
    Ok(Json(accounts::ledger_view(&state, &caller, id)?))
}
