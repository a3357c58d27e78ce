use cucumber::{given, then};
use log::info;
use reqwest::{Method, StatusCode};
use serde_json::json;

use crate::cucumber::{world::VENDOR_PASSWORD, BillingWorld};

#[given("a blank slate")]
async fn tabula_rasa(world: &mut BillingWorld) {
    world.start_database().await;
    world.start_server().await;
}

#[then(expr = "pause for {int} ms")]
async fn pause_for_ms(_world: &mut BillingWorld, ms: u64) {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
}

#[given(expr = "an approved vendor {word} with a customer called {word}")]
async fn approved_vendor_with_customer(world: &mut BillingWorld, vendor: String, customer: String) {
    let body = json!({"username": vendor, "password": VENDOR_PASSWORD}).to_string();
    let (code, res) = world
        .request(Method::POST, "/vendors/register", |req| req.header("Content-Type", "application/json").body(body))
        .await;
    assert_eq!(code, StatusCode::CREATED, "Registration failed: {res}");
    let (code, res) = world.as_admin(Method::POST, &format!("/admin/vendors/{vendor}/approve")).await;
    assert_eq!(code, StatusCode::OK, "Approval failed: {res}");

    let customer_id = world.processor.add_customer(&customer);
    let body = json!({"customer_id": customer_id}).to_string();
    let (code, res) = world
        .as_vendor(&vendor, Method::POST, "/vendor/customers", |req| {
            req.header("Content-Type", "application/json").body(body)
        })
        .await;
    assert_eq!(code, StatusCode::OK, "Adding customer failed: {res}");
    info!("🌍️ Vendor {vendor} is billing {customer} ({customer_id})");
    world.customers.insert(customer, customer_id);
}
