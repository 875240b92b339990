//! # OpenAPI Specification Assembly
//!
//! Collects every utoipa-documented route into one OpenAPI document served
//! at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer token security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "`Bearer {user_id}:{AUTH_TOKEN}` acts as that user; `Bearer {AUTH_TOKEN}` as the system administrator.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tax Administration API",
        description = "Back office for a revenue authority: taxpayer registration and accounts, self-assessed filing, payments and refunds against a per-account ledger, objections, audits, collections, notifications, and management reporting.\n\nAll `/v1/*` endpoints require a bearer token. Health probes (`/health/*`) and this document are unauthenticated."
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Identity ─────────────────────────────────────────────────────
        crate::routes::auth::me,
        crate::routes::auth::list_user_types,
        crate::routes::auth::list_users,
        crate::routes::auth::create_user,
        // ── Dashboard ────────────────────────────────────────────────────
        crate::routes::dashboard::get_dashboard,
        crate::routes::dashboard::analytics,
        crate::routes::dashboard::list_notifications,
        crate::routes::dashboard::mark_read,
        crate::routes::dashboard::mark_all_read,
        // ── E-services ───────────────────────────────────────────────────
        crate::routes::e_services::list_accounts,
        crate::routes::e_services::create_account,
        crate::routes::e_services::account_overview,
        crate::routes::e_services::list_obligations,
        crate::routes::e_services::register_obligation,
        crate::routes::e_services::track,
        crate::routes::e_services::submit_request,
        // ── Tax operations ───────────────────────────────────────────────
        crate::routes::tax::list_tax_types,
        crate::routes::tax::list_tax_periods,
        crate::routes::tax::list_returns,
        crate::routes::tax::get_return,
        crate::routes::tax::file_return,
        crate::routes::tax::calculate,
        crate::routes::tax::list_payments,
        crate::routes::tax::get_payment,
        crate::routes::tax::make_payment,
        crate::routes::tax::record_pending_payment,
        crate::routes::tax::approve_payment,
        crate::routes::tax::decline_payment,
        crate::routes::tax::list_refunds,
        crate::routes::tax::request_refund,
        crate::routes::tax::approve_refund,
        crate::routes::tax::reject_refund,
        crate::routes::tax::list_objections,
        crate::routes::tax::file_objection,
        crate::routes::tax::process_objection,
        crate::routes::tax::list_audits,
        crate::routes::tax::open_audit,
        crate::routes::tax::account_ledger,
        // ── Process management ───────────────────────────────────────────
        crate::routes::process::get_audit,
        crate::routes::process::update_audit_status,
        crate::routes::process::add_audit_case,
        crate::routes::process::list_requests,
        crate::routes::process::update_request_status,
        crate::routes::process::list_collections,
        crate::routes::process::get_collection,
        crate::routes::process::create_collection,
        // ── Registration ─────────────────────────────────────────────────
        crate::routes::registration::submit_registration,
        crate::routes::registration::list_registrations,
        crate::routes::registration::get_registration,
        crate::routes::registration::decide_registration,
        // ── Reporting ────────────────────────────────────────────────────
        crate::routes::reporting::list_reports,
        crate::routes::reporting::generate_report,
        crate::routes::reporting::dashboards,
        // ── Administration ───────────────────────────────────────────────
        crate::routes::admin::metrics,
        crate::routes::admin::settings,
        crate::routes::admin::audit_trail,
    ),
    components(
        schemas(
            // ── Records ─────────────────────────────────────────────────
            crate::records::UserTypeRecord,
            crate::records::UserRecord,
            crate::records::TaxTypeRecord,
            crate::records::TaxPeriodRecord,
            crate::records::AccountRecord,
            crate::records::ObligationRecord,
            crate::records::LedgerEntryRecord,
            crate::records::TaxReturnRecord,
            crate::records::PaymentRecord,
            crate::records::RefundRecord,
            crate::records::ObjectionRecord,
            crate::records::AuditRecord,
            crate::records::AuditCaseRecord,
            crate::records::CollectionRecord,
            crate::records::NotificationRecord,
            crate::records::RegistrationRecord,
            crate::records::ServiceRequestRecord,
            crate::records::AuditTrailRecord,
            // ── Errors and identity ─────────────────────────────────────
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::auth::CallerIdentity,
            // ── Request bodies ──────────────────────────────────────────
            crate::services::users::CreateUser,
            crate::services::accounts::CreateAccount,
            crate::services::accounts::RegisterObligation,
            crate::services::requests::SubmitRequest,
            crate::services::requests::RequestStatusUpdate,
            crate::services::filing::FileReturn,
            crate::routes::tax::CalculateRequest,
            crate::services::payments::PaymentRequest,
            crate::services::refunds::RefundRequest,
            crate::services::objections::FileObjection,
            crate::services::audits::OpenAudit,
            crate::services::audits::AuditStatusUpdate,
            crate::services::audits::AddAuditCase,
            crate::services::collections::CreateCollection,
            crate::services::registrations::RegistrationDecision,
            // ── Responses ───────────────────────────────────────────────
            crate::services::dashboard::Dashboard,
            crate::services::dashboard::DashboardStats,
            crate::services::dashboard::Activity,
            crate::services::dashboard::ReadAllResult,
            crate::services::accounts::AccountOverview,
            crate::services::accounts::LedgerView,
            crate::services::tracking::TrackingResult,
            crate::services::listings::ReturnDetail,
            crate::services::payments::PaymentReceipt,
            crate::services::refunds::DecisionOutcome,
            crate::services::refunds::RefundDecisionResult,
            crate::services::objections::ObjectionDecisionResult,
            crate::services::audits::AuditDetail,
            crate::services::collections::CollectionDetail,
            crate::services::registrations::RegistrationDecisionResult,
            crate::services::reporting::ReportInfo,
            crate::middleware::metrics::MetricsSnapshot,
            crate::trail::ChainIntegrity,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Caller identity and user administration"),
        (name = "dashboard", description = "Statistics and notifications"),
        (name = "e-services", description = "Taxpayer accounts, obligations, tracking, service requests"),
        (name = "tax", description = "Filing, payments, refunds, objections, audits, ledger"),
        (name = "process", description = "Back-office audit, request, and collection workflows"),
        (name = "registration", description = "Taxpayer registration"),
        (name = "reporting", description = "Management reports"),
        (name = "admin", description = "Metrics, settings, audit trail"),
    )
)]
pub struct ApiDoc;

/// Router serving the assembled document.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
