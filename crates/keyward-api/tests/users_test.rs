//! Integration tests for user creation and lifecycle routes.

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use keyward_test_support::FailingEventLog;
use keyward_user::domain::events::{
    HUMAN_ADDED_EVENT_TYPE, HUMAN_REGISTERED_EVENT_TYPE, USER_LOCKED_EVENT_TYPE,
};
use serde_json::json;
use tower::ServiceExt;

use common::{INIT_CODE, PASSWORD};

#[tokio::test]
async fn test_create_without_password_then_verify_init_code() {
    // Arrange
    let app = common::build_test_app();

    // Act
    let (status, created) = common::post_json(
        &app,
        "/api/v1/users",
        &common::human("alice", "alice@example.com", None),
    )
    .await;
    let user_id = created["user_id"].as_str().unwrap().to_owned();
    let (_, before) = common::get_json(&app, &format!("/api/v1/users/{user_id}")).await;
    let (verify_status, _) = common::post_json(
        &app,
        &format!("/api/v1/users/{user_id}/init/verify"),
        &json!({ "code": INIT_CODE, "password": PASSWORD }),
    )
    .await;
    let (_, after) = common::get_json(&app, &format!("/api/v1/users/{user_id}")).await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["resource_owner"], "org-1");
    assert_eq!(created["sequence"], 2);
    assert_eq!(created["codes"], json!([{ "kind": "init", "code": INIT_CODE }]));
    assert_eq!(before["state"], "initial");
    assert_eq!(before["password_set"], false);
    assert_eq!(verify_status, StatusCode::OK);
    assert_eq!(after["state"], "active");
    assert_eq!(after["password_set"], true);
    assert_eq!(after["email"]["verified"], true);
}

#[tokio::test]
async fn test_create_with_password_issues_no_codes() {
    let app = common::build_test_app();

    let (status, json) = common::post_json(
        &app,
        "/api/v1/users",
        &common::human("alice", "alice@example.com", Some(PASSWORD)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json.get("codes").is_none());
    assert!(json.get("otp").is_none());
}

#[tokio::test]
async fn test_register_human_records_self_registration() {
    let app = common::build_test_app();

    let (status, json) = common::post_json(
        &app,
        "/api/v1/users/register",
        &common::human("alice", "alice@example.com", Some(PASSWORD)),
    )
    .await;
    let user_id = json["user_id"].as_str().unwrap();
    let (_, changes) = common::get_json(&app, &format!("/api/v1/users/{user_id}/changes")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(changes[0]["event_type"], HUMAN_REGISTERED_EVENT_TYPE);
}

#[tokio::test]
async fn test_register_without_password_returns_400() {
    let app = common::build_test_app();

    let (status, json) = common::post_json(
        &app,
        "/api/v1/users/register",
        &common::human("alice", "alice@example.com", None),
    )
    .await;
    let (retry, _) = common::post_json(
        &app,
        "/api/v1/users",
        &common::human("alice", "alice@example.com", Some(PASSWORD)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "invalid argument: self-registration requires a password");
    assert_eq!(retry, StatusCode::OK);
}

#[tokio::test]
async fn test_taken_username_and_email_return_409() {
    // Arrange
    let app = common::build_test_app();
    common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;

    // Act
    let (name_status, name_json) = common::post_json(
        &app,
        "/api/v1/users",
        &common::human("ALICE", "other@example.com", Some(PASSWORD)),
    )
    .await;
    let (email_status, email_json) = common::post_json(
        &app,
        "/api/v1/users",
        &common::human("alice2", "Alice@Example.com", Some(PASSWORD)),
    )
    .await;

    // Assert
    assert_eq!(name_status, StatusCode::CONFLICT);
    assert_eq!(name_json["error"], "already_exists");
    assert_eq!(email_status, StatusCode::CONFLICT);
    assert_eq!(email_json["error"], "already_exists");
}

#[tokio::test]
async fn test_weak_password_returns_400() {
    let app = common::build_test_app();

    let (status, json) = common::post_json(
        &app,
        "/api/v1/users",
        &common::human("alice", "alice@example.com", Some("short")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_argument");
}

#[tokio::test]
async fn test_overlong_username_and_email_return_400() {
    let app = common::build_test_app();
    let long_name = "a".repeat(201);
    let long_email = format!("{}@example.com", "b".repeat(250));

    let (name_status, name_json) = common::post_json(
        &app,
        "/api/v1/users",
        &common::human(&long_name, "alice@example.com", Some(PASSWORD)),
    )
    .await;
    let (email_status, _) = common::post_json(
        &app,
        "/api/v1/users",
        &common::human("alice", &long_email, Some(PASSWORD)),
    )
    .await;

    assert_eq!(name_status, StatusCode::BAD_REQUEST);
    assert_eq!(name_json["error"], "invalid_argument");
    assert_eq!(email_status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_context_headers_return_400() {
    let app = common::build_test_app();
    let body = common::human("alice", "alice@example.com", Some(PASSWORD));
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/users")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_required_field_returns_422() {
    let app = common::build_test_app();

    let (status, _) = common::post_json(&app, "/api/v1/users/machines", &json!({})).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_get_unknown_user_returns_404() {
    let app = common::build_test_app();

    let (status, json) = common::get_json(&app, "/api/v1/users/nobody").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_lock_twice_returns_412() {
    // Arrange
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;
    let uri = format!("/api/v1/users/{user_id}/lock");

    // Act
    let (first, _) = common::post_empty(&app, &uri).await;
    let (_, view) = common::get_json(&app, &format!("/api/v1/users/{user_id}")).await;
    let (second, json) = common::post_empty(&app, &uri).await;
    let (unlocked, _) = common::post_empty(&app, &format!("/api/v1/users/{user_id}/unlock")).await;

    // Assert
    assert_eq!(first, StatusCode::OK);
    assert_eq!(view["state"], "locked");
    assert_eq!(second, StatusCode::PRECONDITION_FAILED);
    assert_eq!(json["error"], "precondition_failed");
    assert_eq!(unlocked, StatusCode::OK);
}

#[tokio::test]
async fn test_deactivate_and_reactivate() {
    // Arrange
    let app = common::build_test_app();
    let mut body = common::human("alice", "alice@example.com", Some(PASSWORD));
    body["email"]["verified"] = json!(true);
    let (_, created) = common::post_json(&app, "/api/v1/users", &body).await;
    let user_id = created["user_id"].as_str().unwrap();

    // Act
    let (deactivated, _) =
        common::post_empty(&app, &format!("/api/v1/users/{user_id}/deactivate")).await;
    let (_, view) = common::get_json(&app, &format!("/api/v1/users/{user_id}")).await;
    let (reactivated, _) =
        common::post_empty(&app, &format!("/api/v1/users/{user_id}/reactivate")).await;
    let (again, _) =
        common::post_empty(&app, &format!("/api/v1/users/{user_id}/reactivate")).await;

    // Assert
    assert_eq!(deactivated, StatusCode::OK);
    assert_eq!(view["state"], "inactive");
    assert_eq!(reactivated, StatusCode::OK);
    assert_eq!(again, StatusCode::PRECONDITION_FAILED);
}

#[tokio::test]
async fn test_remove_user_frees_username() {
    // Arrange
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;

    // Act
    let (removed, _) = common::delete(&app, &format!("/api/v1/users/{user_id}")).await;
    let (lookup, _) = common::get_json(&app, &format!("/api/v1/users/{user_id}")).await;
    let (recreated, _) = common::post_json(
        &app,
        "/api/v1/users",
        &common::human("alice", "alice@example.com", Some(PASSWORD)),
    )
    .await;

    // Assert
    assert_eq!(removed, StatusCode::OK);
    assert_eq!(lookup, StatusCode::NOT_FOUND);
    assert_eq!(recreated, StatusCode::OK);
}

#[tokio::test]
async fn test_change_username_releases_old_name() {
    // Arrange
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;

    // Act
    let (changed, _) = common::put_json(
        &app,
        &format!("/api/v1/users/{user_id}/username"),
        &json!({ "user_name": "alicia" }),
    )
    .await;
    let (unchanged, _) = common::put_json(
        &app,
        &format!("/api/v1/users/{user_id}/username"),
        &json!({ "user_name": "alicia" }),
    )
    .await;
    let (_, view) = common::get_json(&app, &format!("/api/v1/users/{user_id}")).await;
    let (reused, _) = common::post_json(
        &app,
        "/api/v1/users",
        &common::human("alice", "other@example.com", Some(PASSWORD)),
    )
    .await;

    // Assert
    assert_eq!(changed, StatusCode::OK);
    assert_eq!(unchanged, StatusCode::PRECONDITION_FAILED);
    assert_eq!(view["user_name"], "alicia");
    assert_eq!(reused, StatusCode::OK);
}

#[tokio::test]
async fn test_machine_lifecycle() {
    // Arrange
    let app = common::build_test_app();

    // Act
    let (created, json) = common::post_json(
        &app,
        "/api/v1/users/machines",
        &json!({ "user_name": "ci-bot", "name": "CI" }),
    )
    .await;
    let user_id = json["user_id"].as_str().unwrap();
    let (changed, _) = common::put_json(
        &app,
        &format!("/api/v1/users/{user_id}/machine"),
        &json!({ "name": "CI runner", "description": "builds" }),
    )
    .await;
    let (_, view) = common::get_json(&app, &format!("/api/v1/users/{user_id}")).await;
    let (profile, _) = common::get_json(&app, &format!("/api/v1/users/{user_id}/profile")).await;

    // Assert
    assert_eq!(created, StatusCode::OK);
    assert_eq!(changed, StatusCode::OK);
    assert_eq!(view["state"], "active");
    assert_eq!(view["machine"]["name"], "CI runner");
    assert_eq!(view["profile"], serde_json::Value::Null);
    assert_eq!(profile, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_changes_lists_history() {
    // Arrange
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;
    common::post_empty(&app, &format!("/api/v1/users/{user_id}/lock")).await;

    // Act
    let (status, all) = common::get_json(&app, &format!("/api/v1/users/{user_id}/changes")).await;
    let (_, latest) = common::get_json(
        &app,
        &format!("/api/v1/users/{user_id}/changes?desc=true&limit=1"),
    )
    .await;
    let (beyond, _) = common::get_json(
        &app,
        &format!("/api/v1/users/{user_id}/changes?after_sequence=2"),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 2);
    assert_eq!(all[0]["event_type"], HUMAN_ADDED_EVENT_TYPE);
    assert_eq!(all[0]["editor_id"], "admin");
    assert_eq!(latest.as_array().unwrap().len(), 1);
    assert_eq!(latest[0]["event_type"], USER_LOCKED_EVENT_TYPE);
    assert_eq!(beyond, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_failing_log_returns_500() {
    let app = common::build_test_app_with(Arc::new(FailingEventLog));

    let (status, json) = common::get_json(&app, "/api/v1/users/user-1").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "infrastructure_error");
}
