use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::json;

use super::helpers::{admin, register, TestApp, PASSWORD};
use crate::middleware::ADMIN_KEY_HEADER;

#[actix_web::test]
async fn admin_routes_need_the_admin_key() {
    let app = TestApp::new().await;
    let (status, body) = app.send_json(TestRequest::get().uri("/admin/vendors")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({"error": "Authentication Error. Invalid admin key."}));

    let req = TestRequest::get().uri("/admin/activity").insert_header((ADMIN_KEY_HEADER, "guess"));
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = app.send_json(admin(TestRequest::get().uri("/admin/vendors"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[actix_web::test]
async fn approve_vendors() {
    let app = TestApp::new().await;
    let (status, _) = app.send(admin(TestRequest::post().uri("/admin/vendors/nobody/approve"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, vendor) = app.send_json(register("v1", PASSWORD)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(vendor["approved"], false);
    assert!(vendor.get("password_hash").is_none());

    let (status, vendor) = app.send_json(admin(TestRequest::post().uri("/admin/vendors/v1/approve"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(vendor["approved"], true);
}

#[actix_web::test]
async fn activity_is_newest_first() {
    let app = TestApp::new().await;
    app.send(register("v1", PASSWORD)).await;
    app.send(admin(TestRequest::post().uri("/admin/vendors/v1/approve"))).await;

    let (status, entries) = app.send_json(admin(TestRequest::get().uri("/admin/activity"))).await;
    assert_eq!(status, StatusCode::OK);
    let types = entries.as_array().unwrap().iter().map(|e| e["event_type"].clone()).collect::<Vec<_>>();
    assert_eq!(types, vec![json!("vendor_approved"), json!("vendor_registered")]);

    let (_, entries) = app.send_json(admin(TestRequest::get().uri("/admin/activity?limit=1"))).await;
    assert_eq!(entries.as_array().unwrap().len(), 1);
    assert_eq!(entries[0]["event_type"], "vendor_approved");
}
