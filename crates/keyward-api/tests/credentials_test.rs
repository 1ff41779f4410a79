//! Integration tests for password, init code, OTP and MFA routes.

mod common;

use axum::http::StatusCode;
use keyward_user::domain::events::{
    INIT_CODE_SENT_EVENT_TYPE, MFA_INIT_SKIPPED_EVENT_TYPE, PASSWORD_CHECK_FAILED_EVENT_TYPE,
};
use serde_json::json;

use common::{OTP_CODE, PASSWORD, PASSWORD_CODE};

#[tokio::test]
async fn test_check_password_records_failures() {
    // Arrange
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;
    let check = format!("/api/v1/users/{user_id}/password/check");

    // Act
    let (ok, _) = common::post_json(&app, &check, &json!({ "password": PASSWORD })).await;
    let (wrong, json) = common::post_json(&app, &check, &json!({ "password": "Wr0ngPass" })).await;
    let (_, latest) = common::get_json(
        &app,
        &format!("/api/v1/users/{user_id}/changes?desc=true&limit=1"),
    )
    .await;

    // Assert
    assert_eq!(ok, StatusCode::OK);
    assert_eq!(wrong, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_argument");
    assert_eq!(latest[0]["event_type"], PASSWORD_CHECK_FAILED_EVENT_TYPE);
}

#[tokio::test]
async fn test_locked_user_cannot_check_password() {
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;
    common::post_empty(&app, &format!("/api/v1/users/{user_id}/lock")).await;

    let (status, json) = common::post_json(
        &app,
        &format!("/api/v1/users/{user_id}/password/check"),
        &json!({ "password": PASSWORD }),
    )
    .await;

    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(json["message"], "precondition failed: user is locked");
}

#[tokio::test]
async fn test_password_reset_flow() {
    // Arrange
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;
    let base = format!("/api/v1/users/{user_id}");

    // Act
    let (requested, request_json) = common::post_empty(&app, &format!("{base}/password/reset")).await;
    let (wrong_code, _) = common::post_json(
        &app,
        &format!("{base}/password"),
        &json!({ "code": "NOPE00", "password": "N3wPassword" }),
    )
    .await;
    let (set, _) = common::post_json(
        &app,
        &format!("{base}/password"),
        &json!({ "code": PASSWORD_CODE, "password": "N3wPassword" }),
    )
    .await;
    let (check, _) = common::post_json(
        &app,
        &format!("{base}/password/check"),
        &json!({ "password": "N3wPassword" }),
    )
    .await;

    // Assert
    assert_eq!(requested, StatusCode::OK);
    assert_eq!(request_json["codes"][0]["kind"], "password");
    assert_eq!(request_json["codes"][0]["code"], PASSWORD_CODE);
    assert_eq!(wrong_code, StatusCode::BAD_REQUEST);
    assert_eq!(set, StatusCode::OK);
    assert_eq!(check, StatusCode::OK);
}

#[tokio::test]
async fn test_change_and_one_time_password() {
    // Arrange
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;
    let base = format!("/api/v1/users/{user_id}");

    // Act
    let (bad_old, _) = common::post_json(
        &app,
        &format!("{base}/password/change"),
        &json!({ "old_password": "Wr0ngPass", "new_password": "N3wPassword" }),
    )
    .await;
    let (changed, _) = common::post_json(
        &app,
        &format!("{base}/password/change"),
        &json!({ "old_password": PASSWORD, "new_password": "N3wPassword" }),
    )
    .await;
    let (one_time, _) = common::post_json(
        &app,
        &format!("{base}/password/one-time"),
        &json!({ "password": "Temp0rary1" }),
    )
    .await;
    let (_, view) = common::get_json(&app, &base).await;

    // Assert
    assert_eq!(bad_old, StatusCode::BAD_REQUEST);
    assert_eq!(changed, StatusCode::OK);
    assert_eq!(one_time, StatusCode::OK);
    assert_eq!(view["password_change_required"], true);
}

#[tokio::test]
async fn test_wrong_init_code_returns_400() {
    // Arrange
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", None).await;
    let base = format!("/api/v1/users/{user_id}");

    // Act
    let (wrong, _) = common::post_json(
        &app,
        &format!("{base}/init/verify"),
        &json!({ "code": "NOPE00" }),
    )
    .await;
    let (reissued, json) = common::post_empty(&app, &format!("{base}/init/code")).await;
    let (_, view) = common::get_json(&app, &base).await;

    // Assert
    assert_eq!(wrong, StatusCode::BAD_REQUEST);
    assert_eq!(reissued, StatusCode::OK);
    assert_eq!(json["codes"][0]["kind"], "init");
    assert_eq!(view["state"], "initial");
}

#[tokio::test]
async fn test_otp_enrollment_and_check() {
    // Arrange
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;
    let otp = format!("/api/v1/users/{user_id}/otp");

    // Act
    let (added, added_json) = common::post_json(&app, &otp, &json!({})).await;
    let (_, pending) = common::get_json(&app, &format!("/api/v1/users/{user_id}")).await;
    let (bad_setup, _) =
        common::post_json(&app, &format!("{otp}/setup"), &json!({ "code": "000000" })).await;
    let (setup, _) =
        common::post_json(&app, &format!("{otp}/setup"), &json!({ "code": OTP_CODE })).await;
    let (again, _) = common::post_json(&app, &otp, &json!({})).await;
    let (checked, _) =
        common::post_json(&app, &format!("{otp}/check"), &json!({ "code": OTP_CODE })).await;
    let (failed, _) =
        common::post_json(&app, &format!("{otp}/check"), &json!({ "code": "000000" })).await;
    let (removed, _) = common::delete(&app, &otp).await;
    let (_, after) = common::get_json(&app, &format!("/api/v1/users/{user_id}")).await;

    // Assert
    assert_eq!(added, StatusCode::OK);
    assert_eq!(added_json["otp"]["secret"], "secret-for-alice@example.com");
    assert!(added_json["otp"]["url"].as_str().unwrap().starts_with("otpauth://"));
    assert_eq!(pending["otp"], "pending");
    assert_eq!(bad_setup, StatusCode::BAD_REQUEST);
    assert_eq!(setup, StatusCode::OK);
    assert_eq!(again, StatusCode::CONFLICT);
    assert_eq!(checked, StatusCode::OK);
    assert_eq!(failed, StatusCode::BAD_REQUEST);
    assert_eq!(removed, StatusCode::OK);
    assert_eq!(after["otp"], "none");
}

#[tokio::test]
async fn test_otp_account_name_override() {
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;

    let (_, json) = common::post_json(
        &app,
        &format!("/api/v1/users/{user_id}/otp"),
        &json!({ "account_name": "alice-phone" }),
    )
    .await;

    assert_eq!(json["otp"]["secret"], "secret-for-alice-phone");
}

#[tokio::test]
async fn test_mark_code_sent_and_skip_mfa() {
    // Arrange
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", None).await;
    let base = format!("/api/v1/users/{user_id}");

    // Act
    let (sent, _) = common::post_empty(&app, &format!("{base}/codes/init/sent")).await;
    let (unknown, _) = common::post_empty(&app, &format!("{base}/codes/carrier-pigeon/sent")).await;
    let (skipped, _) = common::post_empty(&app, &format!("{base}/mfa/skip")).await;
    let (_, changes) = common::get_json(&app, &format!("{base}/changes")).await;
    let (_, view) = common::get_json(&app, &base).await;

    // Assert
    let types: Vec<&str> = changes
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["event_type"].as_str().unwrap())
        .collect();
    assert_eq!(sent, StatusCode::OK);
    assert_eq!(unknown, StatusCode::BAD_REQUEST);
    assert_eq!(skipped, StatusCode::OK);
    assert!(types.contains(&INIT_CODE_SENT_EVENT_TYPE));
    assert_eq!(types.last(), Some(&MFA_INIT_SKIPPED_EVENT_TYPE));
    assert!(view["mfa_init_skipped"].is_string());
}
