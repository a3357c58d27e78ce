use actix_web::{http::StatusCode, test::TestRequest};
use billing_engine::helpers::{sign_payload, SIGNATURE_HEADER};
use chrono::Utc;
use serde_json::json;

use super::helpers::{admin, event_body, signed_delivery, test_config, TestApp, WEBHOOK_SECRET};
use crate::config::WebhookConfig;

#[actix_web::test]
async fn unsigned_deliveries_are_rejected() {
    let app = TestApp::new().await;
    let body = event_body("evt_1", "payout.paid", json!({"id": "po_1", "amount": 100}));
    let req = TestRequest::post().uri("/stripe/webhook").set_payload(body);
    let (status, body) = app.send_json(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Webhook verification failed."));
    let (_, entries) = app.send_json(admin(TestRequest::get().uri("/admin/activity"))).await;
    assert_eq!(entries, json!([]));
}

#[actix_web::test]
async fn tampered_and_stale_deliveries_are_rejected() {
    let app = TestApp::new().await;
    let body = event_body("evt_1", "payout.paid", json!({"id": "po_1", "amount": 100}));
    let signature = sign_payload(body.as_bytes(), WEBHOOK_SECRET, Utc::now().timestamp()).unwrap();
    let tampered = body.replace("100", "100000");
    let req =
        TestRequest::post().uri("/stripe/webhook").insert_header((SIGNATURE_HEADER, signature)).set_payload(tampered);
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let an_hour_ago = Utc::now().timestamp() - 3600;
    let (status, _) = app.send(signed_delivery(&body, an_hour_ago)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn deliveries_are_rejected_without_a_signing_secret() {
    let mut config = test_config();
    config.webhook = WebhookConfig::new("");
    let app = TestApp::with_config(config).await;
    let body = event_body("evt_1", "payout.paid", json!({"id": "po_1", "amount": 100}));
    let (status, _) = app.send(signed_delivery(&body, Utc::now().timestamp())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn subscription_updates_reach_the_vendor() {
    let app = TestApp::new().await;
    app.approved_vendor("v1").await;
    let object = json!({"id": "sub_1", "customer": "cus_vendor_1", "status": "past_due"});
    let body = event_body("evt_sub_1", "customer.subscription.updated", object);
    let (status, response) = app.send_json(signed_delivery(&body, Utc::now().timestamp())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response, json!({"success": true, "message": "Event applied"}));

    let (_, vendors) = app.send_json(admin(TestRequest::get().uri("/admin/vendors"))).await;
    assert_eq!(vendors[0]["subscription_status"], "past_due");

    // Redelivery is acknowledged without being applied again
    let (status, response) = app.send_json(signed_delivery(&body, Utc::now().timestamp())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], "Event already processed");
    let (_, entries) = app.send_json(admin(TestRequest::get().uri("/admin/activity"))).await;
    let updates = entries.as_array().unwrap().iter().filter(|e| e["event_type"] == "subscription_updated").count();
    assert_eq!(updates, 1);
}

#[actix_web::test]
async fn every_verified_event_is_acknowledged() {
    let app = TestApp::new().await;
    let now = Utc::now().timestamp();

    let body = event_body("evt_1", "customer.created", json!({"id": "cus_9"}));
    let (status, response) = app.send_json(signed_delivery(&body, now)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], "Event type customer.created is not handled");

    let body = event_body("evt_2", "invoice.payment_succeeded", json!({"id": "in_404", "amount_paid": 100}));
    let (status, response) = app.send_json(signed_delivery(&body, now)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], true);

    let body = event_body("evt_3", "charge.dispute.created", json!({"id": "dp_1"}));
    let (status, response) = app.send_json(signed_delivery(&body, now)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["success"], false);
}

#[actix_web::test]
async fn disputes_are_refunded() {
    let app = TestApp::new().await;
    let object = json!({"id": "dp_1", "charge": "ch_1", "amount": 5000, "reason": "fraudulent"});
    let body = event_body("evt_dp_1", "charge.dispute.created", object);
    let (status, response) = app.send_json(signed_delivery(&body, Utc::now().timestamp())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], "Disputed charge refunded");
    let (_, response) = app.send_json(signed_delivery(&body, Utc::now().timestamp())).await;
    assert_eq!(response["message"], "Event already processed");
    assert_eq!(app.processor.refund_calls(), vec![("ch_1".to_string(), "dispute-refund-dp_1".to_string())]);
}
