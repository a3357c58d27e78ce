use std::time::Duration;

use actix_web::{
    body::MessageBody,
    http::{header::AUTHORIZATION, StatusCode},
    test,
    test::TestRequest,
    App,
};
use billing_engine::{
    events::EventProducers,
    helpers::{sign_payload, SIGNATURE_HEADER},
    test_utils::{fake_processor::FakeProcessor, prepare_env::fresh_database},
    SqliteDatabase,
};
use chrono::Utc;
use log::debug;
use serde_json::{json, Value};
use vb_common::Secret;

use crate::{
    auth::basic_auth_header,
    config::{ServerConfig, WebhookConfig},
    middleware::ADMIN_KEY_HEADER,
    server::configure_routes,
};

// DO NOT re-use these anywhere
pub const WEBHOOK_SECRET: &str = "whsec_endpoint_tests_only";
pub const ADMIN_KEY: &str = "admin_key_for_endpoint_tests";
pub const PASSWORD: &str = "correct horse battery";

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::new("127.0.0.1", 0);
    config.webhook = WebhookConfig::new(WEBHOOK_SECRET);
    config.admin_api_key = Secret::new(ADMIN_KEY.to_string());
    config.refund_timeout = Duration::from_millis(250);
    config
}

/// The full route table on a fresh database, with a fake payment processor.
pub struct TestApp {
    pub db: SqliteDatabase,
    pub processor: FakeProcessor,
    pub config: ServerConfig,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: ServerConfig) -> Self {
        let db = fresh_database().await;
        Self { db, processor: FakeProcessor::new(), config }
    }

    /// Sends the request and returns the status and body, whether the request was handled or rejected by middleware.
    pub async fn send(&self, req: TestRequest) -> (StatusCode, String) {
        let app = App::new().configure(|cfg| {
            configure_routes(cfg, &self.config, self.db.clone(), self.processor.clone(), EventProducers::default())
        });
        let service = test::init_service(app).await;
        match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => {
                let status = res.status();
                let body = test::read_body(res).await;
                (status, String::from_utf8_lossy(&body).into_owned())
            },
            Err(e) => {
                debug!("Request was rejected: {e}");
                let res = e.error_response();
                let status = res.status();
                let body = res.into_body().try_into_bytes().unwrap_or_default();
                (status, String::from_utf8_lossy(&body).into_owned())
            },
        }
    }

    pub async fn send_json(&self, req: TestRequest) -> (StatusCode, Value) {
        let (status, body) = self.send(req).await;
        let value = serde_json::from_str(&body).unwrap_or_else(|e| panic!("Response is not JSON ({e}): {body}"));
        (status, value)
    }

    /// Registers and approves a vendor, and gives them one client, returning the client's customer id.
    pub async fn approved_vendor(&self, username: &str) -> String {
        let (status, _) = self.send(register(username, PASSWORD)).await;
        assert_eq!(status, StatusCode::CREATED);
        let approve = TestRequest::post().uri(&format!("/admin/vendors/{username}/approve"));
        let (status, _) = self.send(admin(approve)).await;
        assert_eq!(status, StatusCode::OK);
        let customer = self.processor.add_customer("Alice");
        let req = vendor(TestRequest::post().uri("/vendor/customers"), username)
            .set_json(json!({"customer_id": customer}));
        let (status, _) = self.send(req).await;
        assert_eq!(status, StatusCode::OK);
        customer
    }
}

pub fn register(username: &str, password: &str) -> TestRequest {
    TestRequest::post().uri("/vendors/register").set_json(json!({"username": username, "password": password}))
}

pub fn admin(req: TestRequest) -> TestRequest {
    req.insert_header((ADMIN_KEY_HEADER, ADMIN_KEY))
}

pub fn vendor(req: TestRequest, username: &str) -> TestRequest {
    req.insert_header((AUTHORIZATION, basic_auth_header(username, PASSWORD)))
}

pub fn event_body(id: &str, tag: &str, object: Value) -> String {
    json!({
        "id": id,
        "type": tag,
        "created": Utc::now().timestamp(),
        "data": { "object": object },
        "livemode": false
    })
    .to_string()
}

pub fn signed_delivery(body: &str, timestamp: i64) -> TestRequest {
    let signature = sign_payload(body.as_bytes(), WEBHOOK_SECRET, timestamp).unwrap();
    TestRequest::post()
        .uri("/stripe/webhook")
        .insert_header((SIGNATURE_HEADER, signature))
        .set_payload(body.to_string())
}
