#![allow(clippy::unwrap_used, clippy::expect_used)]
#![cfg(feature = "axum-ext")]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::get,
};
use async_trait::async_trait;
use http_body_util::BodyExt;
use modkit_ability::{Action, Principal, Resource, TenantMembership};
use modkit_guard::{
    CurrentAbility, CurrentPrincipal, Guard, GuardState, MembershipError, MembershipLoader,
    PolicyPredicate, RouteMeta, RouteTable, StaticCredentialResolver, StaticMembershipLoader,
    guard_middleware,
};
use serde_json::Value;
use tower::ServiceExt; // for `oneshot`

fn route_table() -> RouteTable {
    let mut table = RouteTable::new();
    table.insert(Method::GET, "/health", RouteMeta::public()).unwrap();
    table.insert(Method::GET, "/me", RouteMeta::protected()).unwrap();
    table
        .insert(
            Method::GET,
            "/admin",
            RouteMeta::protected().with_roles(["admin"]),
        )
        .unwrap();
    table
        .insert(
            Method::GET,
            "/docs/t1",
            RouteMeta::protected().with_policy(PolicyPredicate::can(
                Action::Read,
                Resource::new("Doc").with("tenantId", "t1"),
            )),
        )
        .unwrap();
    table
        .insert(
            Method::GET,
            "/docs/t2",
            RouteMeta::protected().with_policy(PolicyPredicate::can(
                Action::Read,
                Resource::new("Doc").with("tenantId", "t2"),
            )),
        )
        .unwrap();
    table
        .insert(
            Method::GET,
            "/broken",
            RouteMeta::public().with_policy(PolicyPredicate::can_type(Action::Read, "Doc")),
        )
        .unwrap();
    table
}

fn app() -> Router {
    let credentials =
        StaticCredentialResolver::new().with_principal("u1-token", Principal::new("u1"));
    let memberships = StaticMembershipLoader::new()
        .with_memberships("u1", vec![TenantMembership::new("t1", "member")]);
    let guard = Guard::new(Arc::new(credentials), Arc::new(memberships), Arc::default());
    let state = GuardState::new(guard, Arc::new(route_table()));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/me", get(me_handler))
        .route("/admin", get(|| async { "admin" }))
        .route("/docs/t1", get(docs_handler))
        .route("/docs/t2", get(docs_handler))
        .route("/broken", get(|| async { "unreachable" }))
        .route("/unlisted", get(|| async { "unlisted" }))
        .layer(middleware::from_fn_with_state(state, guard_middleware))
}

async fn me_handler(CurrentPrincipal(principal): CurrentPrincipal) -> impl IntoResponse {
    principal.id().to_owned()
}

async fn docs_handler(CurrentAbility(ability): CurrentAbility) -> impl IntoResponse {
    let allowed = ability.can(&Action::Read, &Resource::new("Ticket").with("tenantId", "t1"));
    format!("tickets: {allowed}")
}

async fn send(uri: &str, token: Option<&str>) -> (StatusCode, String) {
    let authorization = token.map(|token| format!("Bearer {token}"));
    send_raw(uri, authorization.as_deref()).await
}

async fn send_raw(uri: &str, authorization: Option<&str>) -> (StatusCode, String) {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    let response = app()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn json(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn public_route_needs_no_token() {
    let (status, body) = send("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn missing_token_is_401() {
    let (status, body) = send("/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let body = json(&body);
    assert_eq!(body["code"], "credential_missing");
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn unknown_token_is_401() {
    let (status, body) = send("/me", Some("forged")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["code"], "credential_invalid");
}

#[tokio::test]
async fn wrong_scheme_is_invalid_not_missing() {
    let (status, body) = send_raw("/me", Some("Basic dXNlcg==")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["code"], "credential_invalid");
}

#[tokio::test]
async fn token_without_scheme_is_invalid() {
    for value in ["u1-token", "Bearer"] {
        let (status, body) = send_raw("/me", Some(value)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json(&body)["code"], "credential_invalid");
    }
}

#[tokio::test]
async fn public_route_ignores_malformed_header() {
    let (status, body) = send_raw("/health", Some("Basic dXNlcg==")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn principal_reaches_the_handler() {
    let (status, body) = send("/me", Some("u1-token")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "u1");
}

#[tokio::test]
async fn role_gate_is_403_with_required_roles() {
    let (status, body) = send("/admin", Some("u1-token")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let body = json(&body);
    assert_eq!(body["code"], "insufficient_role");
    assert_eq!(body["required_roles"], serde_json::json!(["admin"]));
}

#[tokio::test]
async fn policy_routes_expose_the_ability() {
    let (status, body) = send("/docs/t1", Some("u1-token")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "tickets: true");
}

#[tokio::test]
async fn policy_denial_is_403_without_details() {
    let (status, body) = send("/docs/t2", Some("u1-token")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let body = json(&body);
    assert_eq!(body["code"], "policy_denied");
    let message = body["error"].as_str().unwrap();
    assert!(!message.contains("Doc"));
    assert!(!message.contains("t2"));
}

#[tokio::test]
async fn misconfigured_route_is_500() {
    let (status, body) = send("/broken", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&body)["code"], "misconfigured_route");
}

#[tokio::test]
async fn route_without_metadata_defaults_to_protected() {
    let (status, _) = send("/unlisted", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send("/unlisted", Some("u1-token")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "unlisted");
}

#[tokio::test]
async fn cors_preflight_bypasses_the_guard() {
    let response = app()
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/me")
                .header(header::ORIGIN, "https://app.test")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    // Reaches the router, which has no OPTIONS handler for /me.
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

struct UnavailableStore;

#[async_trait]
impl MembershipLoader for UnavailableStore {
    async fn load(&self, principal_id: &str) -> Result<Vec<TenantMembership>, MembershipError> {
        Err(MembershipError {
            principal_id: principal_id.to_owned(),
            reason: "database unavailable".to_owned(),
        })
    }
}

#[tokio::test]
async fn membership_outage_is_503() {
    let credentials =
        StaticCredentialResolver::new().with_principal("u1-token", Principal::new("u1"));
    let guard = Guard::new(Arc::new(credentials), Arc::new(UnavailableStore), Arc::default());
    let app = Router::new()
        .route("/docs/t1", get(docs_handler))
        .layer(middleware::from_fn_with_state(
            GuardState::new(guard, Arc::new(route_table())),
            guard_middleware,
        ));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/docs/t1")
                .header(header::AUTHORIZATION, "Bearer u1-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "authz_unavailable");
    assert!(!body["error"].as_str().unwrap().contains("database"));
}
