//! # Integration Tests for taxadmin-api
//!
//! Drives the assembled router end to end: health probes, authentication,
//! user administration, the filing and payment flow, account scoping,
//! reporting permissions, and the audit trail.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use taxadmin_api::config::AppConfig;
use taxadmin_api::state::AppState;

const SECRET: &str = "integration-secret";

/// Helper: seeded state with authentication enabled.
async fn seeded_state() -> AppState {
    let config = AppConfig {
        auth_token: Some(SECRET.to_string()),
        ..AppConfig::default()
    };
    let state = AppState::with_config(config, None);
    taxadmin_api::bootstrap::seed(&state).await.unwrap();
    state
}

fn admin_token() -> String {
    format!("Bearer {SECRET}")
}

fn user_token(user_id: &str) -> String {
    format!("Bearer {user_id}:{SECRET}")
}

/// Helper: send one request and decode the JSON body (or `Null`).
async fn send(
    state: &AppState,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", token);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = taxadmin_api::app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create_user(state: &AppState, username: &str, user_type: &str) -> String {
    let (status, body) = send(
        state,
        "POST",
        "/v1/auth/users",
        Some(&admin_token()),
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "user_type": user_type,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_str().unwrap().to_string()
}

async fn vat_period(state: &AppState) -> (String, String) {
    let (_, types) = send(state, "GET", "/v1/tax/types", Some(&admin_token()), None).await;
    let vat = types
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["code"] == "VAT")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();
    let (_, periods) = send(
        state,
        "GET",
        &format!("/v1/tax/periods?tax_type_id={vat}"),
        Some(&admin_token()),
        None,
    )
    .await;
    let period = periods[0]["id"].as_str().unwrap().to_string();
    (vat, period)
}

// -- Health & documentation ---------------------------------------------------

#[tokio::test]
async fn test_health_and_openapi_need_no_token() {
    let state = seeded_state().await;
    for uri in ["/health/liveness", "/health/readiness"] {
        let response = taxadmin_api::app(state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
    let (status, doc) = send(&state, "GET", "/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/v1/tax/returns"].is_object());
}

// -- Authentication -----------------------------------------------------------

#[tokio::test]
async fn test_missing_or_wrong_token_is_unauthorized() {
    let state = seeded_state().await;
    let (status, body) = send(&state, "GET", "/v1/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = send(&state, "GET", "/v1/auth/me", Some("Bearer nope"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_system_token_acts_as_seeded_admin() {
    let state = seeded_state().await;
    let (status, me) = send(&state, "GET", "/v1/auth/me", Some(&admin_token()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "admin");
    assert_eq!(me["is_admin"], true);
    assert!(me["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p == "admin_access"));
}

#[tokio::test]
async fn test_user_creation_reports_every_problem() {
    let state = seeded_state().await;
    create_user(&state, "ngozi", "Individual").await;

    let (status, body) = send(
        &state,
        "POST",
        "/v1/auth/users",
        Some(&admin_token()),
        Some(json!({ "username": "ngozi", "email": "ngozi@example.com", "user_type": "Wizard" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["details"]["errors"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_taxpayer_cannot_manage_users_or_read_reports() {
    let state = seeded_state().await;
    let taxpayer = create_user(&state, "chidi", "Individual").await;
    let token = user_token(&taxpayer);

    let (status, _) = send(&state, "GET", "/v1/auth/users", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&state, "GET", "/v1/reporting/reports", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// -- Filing and payment flow --------------------------------------------------

#[tokio::test]
async fn test_file_pay_track_and_report() {
    let state = seeded_state().await;
    let taxpayer = create_user(&state, "amaka", "Individual").await;
    let token = user_token(&taxpayer);
    let (vat, period) = vat_period(&state).await;

    let (status, account) = send(
        &state,
        "POST",
        "/v1/e-services/accounts",
        Some(&token),
        Some(json!({ "account_number": "ACC-0001", "name": "Amaka Stores" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{account}");
    let account_id = account["id"].as_str().unwrap().to_string();
    assert_eq!(account["user_id"], taxpayer.as_str());

    let filing = json!({
        "account_id": account_id,
        "tax_type_id": vat,
        "tax_period_id": period,
        "amount": "100.00",
    });
    let (status, tax_return) =
        send(&state, "POST", "/v1/tax/returns", Some(&token), Some(filing.clone())).await;
    assert_eq!(status, StatusCode::CREATED, "{tax_return}");
    assert_eq!(tax_return["status"], "Filed");
    assert_eq!(tax_return["due_amount"], "100.00");
    let return_id = tax_return["id"].as_str().unwrap().to_string();
    let reference = tax_return["reference_number"].as_str().unwrap().to_string();

    let (status, _) = send(&state, "POST", "/v1/tax/returns", Some(&token), Some(filing)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, receipt) = send(
        &state,
        "POST",
        "/v1/tax/payments",
        Some(&token),
        Some(json!({ "tax_return_id": return_id, "amount": "150.00", "payment_method": "Online" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{receipt}");
    assert_eq!(receipt["tax_return"]["status"], "Finalized");
    assert_eq!(receipt["overpayment"], "50.00");

    let (status, ledger) = send(
        &state,
        "GET",
        &format!("/v1/tax/accounts/{account_id}/ledger"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger["entries"].as_array().unwrap().len(), 3);
    assert_eq!(ledger["balance"], "-50.00");

    let (status, tracked) = send(
        &state,
        "GET",
        &format!("/v1/e-services/tracking?reference={reference}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tracked["type"], "Tax Return");

    let (status, report) = send(
        &state,
        "GET",
        "/v1/reporting/generate?report_type=tax_collection",
        Some(&admin_token()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{report}");
    assert_eq!(report["report_type"], "tax_collection");
    assert_eq!(report["summary"]["total_collected"], "150.00");

    let (status, trail) =
        send(&state, "GET", "/v1/admin/audit-trail", Some(&admin_token()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(trail["integrity"]["chain_valid"], true);
    assert!(trail["integrity"]["total_links"].as_u64().unwrap() >= 4);
}

#[tokio::test]
async fn test_accounts_are_scoped_to_their_owner() {
    let state = seeded_state().await;
    let owner = create_user(&state, "bola", "Individual").await;
    let stranger = create_user(&state, "tunde", "Individual").await;
    let officer = create_user(&state, "officer", "Internal").await;

    let (_, account) = send(
        &state,
        "POST",
        "/v1/e-services/accounts",
        Some(&user_token(&owner)),
        Some(json!({ "account_number": "ACC-0002", "name": "Bola" })),
    )
    .await;
    let uri = format!("/v1/e-services/accounts/{}", account["id"].as_str().unwrap());

    let (status, _) = send(&state, "GET", &uri, Some(&user_token(&stranger)), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, overview) = send(&state, "GET", &uri, Some(&user_token(&officer)), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(overview["account"]["account_number"], "ACC-0002");

    let (_, listing) =
        send(&state, "GET", "/v1/e-services/accounts", Some(&user_token(&stranger)), None).await;
    assert_eq!(listing["total"], 0);
}

#[tokio::test]
async fn test_notifications_follow_filing() {
    let state = seeded_state().await;
    let taxpayer = create_user(&state, "efe", "Individual").await;
    let token = user_token(&taxpayer);
    let (vat, period) = vat_period(&state).await;
    let (_, account) = send(
        &state,
        "POST",
        "/v1/e-services/accounts",
        Some(&token),
        Some(json!({ "account_number": "ACC-0003", "name": "Efe" })),
    )
    .await;
    send(
        &state,
        "POST",
        "/v1/tax/returns",
        Some(&token),
        Some(json!({
            "account_id": account["id"],
            "tax_type_id": vat,
            "tax_period_id": period,
            "amount": "10.00",
        })),
    )
    .await;

    let (status, dashboard) = send(&state, "GET", "/v1/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(dashboard["unread_notifications"].as_u64().unwrap() >= 1);
    assert!(dashboard["stats"].get("total_audits").is_none());

    let (status, result) = send(
        &state,
        "POST",
        "/v1/dashboard/notifications/read-all",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(result["count"].as_u64().unwrap() >= 1);

    let (_, dashboard) = send(&state, "GET", "/v1/dashboard", Some(&token), None).await;
    assert_eq!(dashboard["unread_notifications"], 0);
}

// -- Analytics ----------------------------------------------------------------

#[tokio::test]
async fn test_analytics_dashboards_follow_statistics_permission() {
    let state = seeded_state().await;
    let analyst = user_token(&create_user(&state, "analyst", "Government").await);
    let taxpayer = user_token(&create_user(&state, "kemi", "Individual").await);

    let (status, body) =
        send(&state, "GET", "/v1/reporting/dashboards", Some(&analyst), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["monthly_trend"].as_array().unwrap().len(), 12);
    assert_eq!(body["registrations"].as_array().unwrap().len(), 3);

    let (status, body) = send(&state, "GET", "/v1/dashboard/analytics", Some(&admin_token()), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["compliance"].is_array());

    for uri in ["/v1/reporting/dashboards", "/v1/dashboard/analytics"] {
        let (status, _) = send(&state, "GET", uri, Some(&taxpayer), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
}
