//! Integration tests for profile, email, phone and address routes.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::{EMAIL_CODE, PASSWORD, PHONE_CODE};

#[tokio::test]
async fn test_change_and_verify_email() {
    // Arrange
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;
    let base = format!("/api/v1/users/{user_id}");

    // Act
    let (changed, change_json) = common::put_json(
        &app,
        &format!("{base}/email"),
        &json!({ "address": "alice@wonderland.org" }),
    )
    .await;
    let (wrong, wrong_json) = common::post_json(
        &app,
        &format!("{base}/email/verify"),
        &json!({ "code": "WRONG1" }),
    )
    .await;
    let (_, unverified) = common::get_json(&app, &format!("{base}/email")).await;
    let (verified, _) = common::post_json(
        &app,
        &format!("{base}/email/verify"),
        &json!({ "code": EMAIL_CODE }),
    )
    .await;
    let (_, email) = common::get_json(&app, &format!("{base}/email")).await;
    let (_, view) = common::get_json(&app, &base).await;

    // Assert
    assert_eq!(changed, StatusCode::OK);
    assert_eq!(change_json["codes"][0]["kind"], "email");
    assert_eq!(change_json["codes"][0]["code"], EMAIL_CODE);
    assert_eq!(wrong, StatusCode::BAD_REQUEST);
    assert_eq!(wrong_json["error"], "invalid_argument");
    assert_eq!(unverified, json!({ "address": "alice@wonderland.org", "verified": false }));
    assert_eq!(verified, StatusCode::OK);
    assert_eq!(email["verified"], true);
    assert_eq!(view["state"], "active");
}

#[tokio::test]
async fn test_changed_email_frees_old_address() {
    // Arrange
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;

    // Act
    common::put_json(
        &app,
        &format!("/api/v1/users/{user_id}/email"),
        &json!({ "address": "alice@wonderland.org", "verified": true }),
    )
    .await;
    let (reused, _) = common::post_json(
        &app,
        "/api/v1/users",
        &common::human("bob", "alice@example.com", Some(PASSWORD)),
    )
    .await;
    let (taken, _) = common::post_json(
        &app,
        "/api/v1/users",
        &common::human("carol", "alice@wonderland.org", Some(PASSWORD)),
    )
    .await;

    // Assert
    assert_eq!(reused, StatusCode::OK);
    assert_eq!(taken, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_new_email_code_for_verified_email_returns_412() {
    let app = common::build_test_app();
    let mut body = common::human("alice", "alice@example.com", Some(PASSWORD));
    body["email"]["verified"] = json!(true);
    let (_, created) = common::post_json(&app, "/api/v1/users", &body).await;
    let user_id = created["user_id"].as_str().unwrap();

    let (status, json) =
        common::post_empty(&app, &format!("/api/v1/users/{user_id}/email/code")).await;

    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    assert_eq!(json["error"], "precondition_failed");
}

#[tokio::test]
async fn test_phone_lifecycle() {
    // Arrange
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;
    let phone = format!("/api/v1/users/{user_id}/phone");

    // Act
    let (missing, _) = common::get_json(&app, &phone).await;
    let (changed, change_json) =
        common::put_json(&app, &phone, &json!({ "number": "+41 79 123 45 67" })).await;
    let (verified, _) = common::post_json(
        &app,
        &format!("{phone}/verify"),
        &json!({ "code": PHONE_CODE }),
    )
    .await;
    let (_, current) = common::get_json(&app, &phone).await;
    let (new_code, _) = common::post_empty(&app, &format!("{phone}/code")).await;
    let (removed, _) = common::delete(&app, &phone).await;
    let (gone, _) = common::get_json(&app, &phone).await;
    let (removed_again, json) = common::delete(&app, &phone).await;

    // Assert
    assert_eq!(missing, StatusCode::NOT_FOUND);
    assert_eq!(changed, StatusCode::OK);
    assert_eq!(change_json["codes"][0]["kind"], "phone");
    assert_eq!(verified, StatusCode::OK);
    assert_eq!(current, json!({ "number": "+41 79 123 45 67", "verified": true }));
    assert_eq!(new_code, StatusCode::PRECONDITION_FAILED);
    assert_eq!(removed, StatusCode::OK);
    assert_eq!(gone, StatusCode::NOT_FOUND);
    assert_eq!(removed_again, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_profile_update_and_unchanged_profile() {
    // Arrange
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;
    let profile = format!("/api/v1/users/{user_id}/profile");
    let update = json!({
        "first_name": "Alice",
        "last_name": "Liddell",
        "nick_name": "ali",
        "preferred_language": "en",
        "gender": "female",
    });

    // Act
    let (changed, _) = common::put_json(&app, &profile, &update).await;
    let (unchanged, _) = common::put_json(&app, &profile, &update).await;
    let (_, current) = common::get_json(&app, &profile).await;

    // Assert
    assert_eq!(changed, StatusCode::OK);
    assert_eq!(unchanged, StatusCode::PRECONDITION_FAILED);
    assert_eq!(current["nick_name"], "ali");
    assert_eq!(current["display_name"], "Alice Liddell");
    assert_eq!(current["gender"], "female");
}

#[tokio::test]
async fn test_address_round_trip() {
    // Arrange
    let app = common::build_test_app();
    let user_id = common::create_human(&app, "alice", "alice@example.com", Some(PASSWORD)).await;
    let address = format!("/api/v1/users/{user_id}/address");

    // Act
    let (missing, _) = common::get_json(&app, &address).await;
    let (changed, _) = common::put_json(
        &app,
        &address,
        &json!({ "country": "CH", "locality": "Zurich", "postal_code": "8001" }),
    )
    .await;
    let (_, current) = common::get_json(&app, &address).await;

    // Assert
    assert_eq!(missing, StatusCode::NOT_FOUND);
    assert_eq!(changed, StatusCode::OK);
    assert_eq!(current["locality"], "Zurich");
    assert_eq!(current["region"], "");
}
