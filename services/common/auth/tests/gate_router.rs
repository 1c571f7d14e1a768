use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::AUTHORIZATION, Request, StatusCode};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use common_auth::{
    require_role, tiered_gate, AuthContext, JwtCodec, JwtConfig, MatchMode, MinimumRole, Role,
    RoleGate, RouteClassifier, UserClaims,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;
use uuid::Uuid;

fn codec() -> Arc<JwtCodec<UserClaims>> {
    Arc::new(JwtCodec::new(JwtConfig::new("router-secret")))
}

fn token(codec: &JwtCodec<UserClaims>, name: &str, role: Role) -> String {
    let now = Utc::now().timestamp();
    codec
        .issue(&UserClaims {
            subject_id: Uuid::new_v4(),
            subject_name: name.to_string(),
            role: role.to_string(),
            nonce: "cd".repeat(32),
            audience: "aud".into(),
            issued_at: now,
            expires_at: now + 300,
            issuer: "iss".into(),
        })
        .expect("sign")
}

async fn whoami(auth: AuthContext) -> String {
    auth.claims.subject_name
}

async fn open() -> &'static str {
    "open"
}

fn request(path: &str, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(path);
    if let Some(token) = bearer {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

#[tokio::test]
async fn tiered_gate_routes_by_whitelist() {
    let codec = codec();
    let gate = RoleGate::new(
        codec.clone(),
        RouteClassifier::new(MatchMode::Exact, ["/open"]),
        RouteClassifier::new(MatchMode::Exact, ["/me"]),
    );
    let app = Router::new()
        .route("/open", get(open))
        .route("/me", get(whoami))
        .route("/admin", get(whoami))
        .layer(from_fn_with_state(gate, tiered_gate));

    let response = app.clone().oneshot(request("/open", None)).await.expect("call");
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.clone().oneshot(request("/me", None)).await.expect("call");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(body["code"], "MISSING_TOKEN");

    let alice = token(&codec, "alice", Role::User);
    let response = app
        .clone()
        .oneshot(request("/me", Some(&alice)))
        .await
        .expect("call");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "alice");

    let response = app
        .clone()
        .oneshot(request("/admin", Some(&alice)))
        .await
        .expect("call");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = serde_json::from_str(&body_text(response).await).expect("json");
    assert_eq!(body["code"], "UNAUTHORIZED");

    let root = token(&codec, "root", Role::Operator);
    let response = app
        .oneshot(request("/admin", Some(&root)))
        .await
        .expect("call");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "root");
}

#[tokio::test]
async fn require_role_guards_a_single_route() {
    let codec = codec();
    let app = Router::new()
        .route("/ops", get(whoami))
        .route_layer(from_fn_with_state(
            MinimumRole::new(codec.clone(), Some(Role::Operator)),
            require_role,
        ));

    let admin = token(&codec, "admin", Role::Admin);
    let response = app
        .clone()
        .oneshot(request("/ops", Some(&admin)))
        .await
        .expect("call");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let operator = token(&codec, "op", Role::Operator);
    let response = app
        .oneshot(request("/ops", Some(&operator)))
        .await
        .expect("call");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_request_on_open_route_has_no_context() {
    let app = Router::new()
        .route("/public-me", get(whoami))
        .route_layer(from_fn_with_state(MinimumRole::new(codec(), None), require_role));

    let response = app.oneshot(request("/public-me", None)).await.expect("call");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
