use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use billing_engine::{
    test_utils::prepare_env::fresh_database,
    traits::{ProcessorError, VendorManagement},
    SqliteDatabase,
    VendorApi,
};
use serde_json::json;

use super::{
    helpers::{admin, register, vendor, TestApp, PASSWORD},
    mocks::MockProcessor,
};
use crate::{auth::basic_auth_header, routes::RegisterVendorRoute};

#[actix_web::test]
async fn registration() {
    let app = TestApp::new().await;
    let (status, body) = app.send_json(register("v1", PASSWORD)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "v1");
    assert_eq!(body["stripe_customer_id"], "cus_vendor_1");
    assert_eq!(body["subscription_status"], "none");

    let (status, _) = app.send(register("v1", PASSWORD)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = app.send(register("v2", "short")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.send(register("not a name", PASSWORD)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn vendor_routes_need_credentials() {
    let app = TestApp::new().await;
    app.send(register("v1", PASSWORD)).await;

    let (status, body) = app.send_json(TestRequest::get().uri("/vendor/invoices")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication Error. No credentials were provided.");

    let req =
        TestRequest::get().uri("/vendor/invoices").insert_header(("Authorization", basic_auth_header("v1", "wrong")));
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::get().uri("/vendor/invoices").insert_header(("Authorization", "Bearer abc"));
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send_json(vendor(TestRequest::get().uri("/vendor/invoices"), "v1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[actix_web::test]
async fn unapproved_vendors_cannot_bill() {
    let app = TestApp::new().await;
    app.send(register("v1", PASSWORD)).await;
    let request = json!({"customer_id": "cus_1", "amount": 50.0});
    let req = vendor(TestRequest::post().uri("/vendor/invoices"), "v1").set_json(request);
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(app.processor.call_count("create_invoice_item"), 0);
}

#[actix_web::test]
async fn bill_a_customer() {
    let app = TestApp::new().await;
    let customer = app.approved_vendor("v1").await;
    let request = json!({"customer_id": customer, "amount": 50.0, "description": "Consulting"});
    let req = vendor(TestRequest::post().uri("/vendor/invoices"), "v1").set_json(request);
    let (status, invoice) = app.send_json(req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(invoice["invoice_id"], "in_1");
    assert_eq!(invoice["status"], "open");
    assert_eq!(invoice["amount"], 50.0);

    let (status, invoices) = app.send_json(vendor(TestRequest::get().uri("/vendor/invoices"), "v1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(invoices.as_array().unwrap().len(), 1);

    let (_, entries) = app.send_json(admin(TestRequest::get().uri("/admin/activity?limit=1"))).await;
    assert_eq!(entries[0]["event_type"], "invoice_created");
}

#[actix_web::test]
async fn processor_failures_name_the_step() {
    let app = TestApp::new().await;
    let customer = app.approved_vendor("v1").await;
    app.processor.fail("finalize_invoice", ProcessorError::Transport("connection reset".into()));
    let request = json!({"customer_id": customer, "amount": 12.5});
    let req = vendor(TestRequest::post().uri("/vendor/invoices"), "v1").set_json(request);
    let (status, body) = app.send_json(req).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("'finalize invoice'"));
    let (_, invoices) = app.send_json(vendor(TestRequest::get().uri("/vendor/invoices"), "v1")).await;
    assert_eq!(invoices, json!([]));
}

#[actix_web::test]
async fn subscriptions_and_payouts() {
    let app = TestApp::new().await;
    app.approved_vendor("v1").await;

    let req = vendor(TestRequest::post().uri("/vendor/subscription"), "v1").set_json(json!({"price_id": "price_pro"}));
    let (status, sub) = app.send_json(req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sub["status"], "trialing");

    let (status, subs) = app.send_json(vendor(TestRequest::get().uri("/vendor/subscriptions"), "v1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(subs.as_array().unwrap().len(), 1);

    let (status, cancelled) = app.send_json(vendor(TestRequest::delete().uri("/vendor/subscription"), "v1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled[0]["status"], "canceled");

    let req = vendor(TestRequest::post().uri("/vendor/payouts"), "v1").set_json(json!({"amount": 20.0}));
    let (status, _) = app.send(req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = vendor(TestRequest::post().uri("/vendor/payout_account"), "v1").set_json(json!({"account_id": "acct_1"}));
    let (status, body) = app.send_json(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payout_account_id"], "acct_1");

    let req = vendor(TestRequest::post().uri("/vendor/payouts"), "v1").set_json(json!({"amount": 20.0}));
    let (status, payout) = app.send_json(req).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(payout["id"], "po_1");
}

#[actix_web::test]
async fn processor_timeout_during_registration() {
    let db = fresh_database().await;
    let mut processor = MockProcessor::new();
    processor.expect_create_customer().times(1).returning(|_| Err(ProcessorError::Timeout("10s elapsed".into())));
    let api = VendorApi::new(db.clone(), processor);
    let app = App::new()
        .app_data(web::Data::new(api))
        .service(RegisterVendorRoute::<SqliteDatabase, MockProcessor>::new());
    let service = test::init_service(app).await;
    let res = test::call_service(&service, register("v1", PASSWORD).to_request()).await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = test::read_body_json(res).await;
    assert!(body["error"].as_str().unwrap().contains("'create customer'"));
    assert!(db.fetch_vendor_by_username("v1").await.unwrap().is_none());
}
