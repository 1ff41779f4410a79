//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, TimeZone, Utc};
use http_body_util::BodyExt;
use keyward_core::cache::AggregateCache;
use keyward_core::event_log::EventLog;
use keyward_event_store::InMemoryEventLog;
use keyward_test_support::{
    FixedClock, InsecureHasher, PlainCodeGenerator, SequenceIdGenerator, StaticOtpProvider,
};
use keyward_user::application::services::{CodeGenerators, UserServices};
use keyward_user::domain::policy::{PasswordComplexityPolicy, UniquenessPolicy};
use serde_json::{Value, json};
use tower::ServiceExt;

use keyward_api::context::{EDITOR_HEADER, ORGANIZATION_HEADER};
use keyward_api::state::AppState;

pub const INIT_CODE: &str = "INIT42";
pub const EMAIL_CODE: &str = "EMAIL1";
pub const PHONE_CODE: &str = "PHONE1";
pub const PASSWORD_CODE: &str = "RESET1";
pub const OTP_CODE: &str = "123456";
pub const PASSWORD: &str = "Secr3tPass";

/// Services wired with plaintext doubles around `log`.
pub fn services_with(log: Arc<dyn EventLog>) -> UserServices {
    let start = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
    UserServices {
        log,
        cache: Arc::new(AggregateCache::new(100)),
        clock: Arc::new(FixedClock(start)),
        ids: Arc::new(SequenceIdGenerator::new("user")),
        codes: CodeGenerators {
            init: Arc::new(PlainCodeGenerator::new(INIT_CODE, Duration::hours(72))),
            email: Arc::new(PlainCodeGenerator::new(EMAIL_CODE, Duration::hours(1))),
            phone: Arc::new(PlainCodeGenerator::new(PHONE_CODE, Duration::hours(1))),
            password: Arc::new(PlainCodeGenerator::new(PASSWORD_CODE, Duration::hours(1))),
        },
        passwords: Arc::new(InsecureHasher),
        otp: Arc::new(StaticOtpProvider::new(OTP_CODE)),
        password_policy: PasswordComplexityPolicy::default(),
        uniqueness: UniquenessPolicy::default(),
    }
}

/// Build the full app router over a fresh in-memory event log. Uses the
/// same route structure as `main.rs`.
pub fn build_test_app() -> Router {
    build_test_app_with(Arc::new(InMemoryEventLog::new()))
}

/// Build the full app router over `log`.
pub fn build_test_app_with(log: Arc<dyn EventLog>) -> Router {
    keyward_api::build_router(AppState::new(services_with(log)))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Send an authenticated request with an optional JSON body.
pub async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<&Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(EDITOR_HEADER, "admin")
        .header(ORGANIZATION_HEADER, "org-1");
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    send(app, request).await
}

/// Send an authenticated POST request with a JSON body.
pub async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    call(app, "POST", uri, Some(body)).await
}

/// Send an authenticated PUT request with a JSON body.
pub async fn put_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    call(app, "PUT", uri, Some(body)).await
}

/// Send an authenticated POST request without a body.
pub async fn post_empty(app: &Router, uri: &str) -> (StatusCode, Value) {
    call(app, "POST", uri, None).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

/// Send an authenticated DELETE request.
pub async fn delete(app: &Router, uri: &str) -> (StatusCode, Value) {
    call(app, "DELETE", uri, None).await
}

/// Body of a human creation request.
pub fn human(user_name: &str, email: &str, password: Option<&str>) -> Value {
    json!({
        "user_name": user_name,
        "profile": { "first_name": "Alice", "last_name": "Liddell" },
        "email": { "address": email },
        "password": password,
    })
}

/// Creates a human through the API and returns its id.
pub async fn create_human(app: &Router, user_name: &str, email: &str, password: Option<&str>) -> String {
    let (status, json) = post_json(app, "/api/v1/users", &human(user_name, email, password)).await;
    assert_eq!(status, StatusCode::OK, "{json}");
    json["user_id"].as_str().unwrap().to_owned()
}
