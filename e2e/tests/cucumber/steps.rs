use chrono::Utc;
use cucumber::{gherkin::Step, then, when};
use e2e::helpers::json_is_subset_of;
use log::debug;
use reqwest::Method;
use serde_json::{json, Value};

use crate::cucumber::BillingWorld;

#[then("the server is running")]
async fn server_is_running(world: &mut BillingWorld) {
    let (code, body) = world.get("health").await;
    assert_eq!(code.as_u16(), 200);
    assert_eq!(body, "👍️\n");
}

#[when(expr = "{word} bills {word} {float}")]
async fn vendor_bills_customer(world: &mut BillingWorld, vendor: String, customer: String, amount: f64) {
    let customer_id = world.customer_id(&customer);
    let body = json!({"customer_id": customer_id, "amount": amount, "description": "e2e"}).to_string();
    let res = world
        .as_vendor(&vendor, Method::POST, "/vendor/invoices", |req| {
            req.header("Content-Type", "application/json").body(body)
        })
        .await;
    debug!("Got Response: {} {}", res.0, res.1);
    world.response = Some(res);
}

#[when(expr = "the processor reports that invoice {word} was paid in event {word}")]
async fn invoice_paid_event(world: &mut BillingWorld, invoice_id: String, event_id: String) {
    let object = json!({"id": invoice_id, "object": "invoice", "amount_paid": 5000, "status": "paid"});
    let res = world.deliver(event_json(&event_id, "invoice.payment_succeeded", object)).await;
    world.response = Some(res);
}

#[when(expr = "the processor reports dispute {word} on charge {word} in event {word}")]
async fn dispute_event(world: &mut BillingWorld, dispute_id: String, charge_id: String, event_id: String) {
    let object =
        json!({"id": dispute_id, "object": "dispute", "charge": charge_id, "amount": 5000, "reason": "fraudulent"});
    let res = world.deliver(event_json(&event_id, "charge.dispute.created", object)).await;
    world.response = Some(res);
}

#[when(expr = "an unsigned {string} event {word} arrives")]
async fn unsigned_event(world: &mut BillingWorld, tag: String, event_id: String) {
    let body = event_json(&event_id, &tag, json!({"id": "po_1", "amount": 100}));
    let res = world
        .request(Method::POST, "/stripe/webhook", |req| req.header("Content-Type", "application/json").body(body))
        .await;
    world.response = Some(res);
}

//             I receive a 400 error response with the message "Webhook verification failed"
#[then(expr = "I receive a {int} {word} response with the message {string}")]
async fn receive_response(world: &mut BillingWorld, status: u16, text: String, message: String) {
    let (res_status, res_msg) = world.response.take().expect("No response received");
    assert_eq!(res_status, status, "Expected {status} {text} response, got {res_status}");
    assert!(res_msg.contains(&message), "Expected response to contain '{message}', got '{res_msg}'");
}

#[then(expr = "I receive a {int} {word} response")]
async fn receive_response_code(world: &mut BillingWorld, status: u16, text: String) {
    let (res_status, res_msg) = world.response.clone().expect("No response received");
    assert_eq!(res_status, status, "Expected {status} {text} response, got {res_status}: {res_msg}");
}

#[then(expr = "I receive a partial JSON response:")]
async fn receive_json_response(world: &mut BillingWorld, step: &Step) {
    let (_res_status, res_msg) = world.response.take().expect("No response received");
    let expected = step.docstring().expect("No expected response");
    assert!(json_is_subset_of(expected, res_msg.as_str()), "Expected response to be '{expected}', got '{res_msg}'");
}

#[then(expr = "{word} sees invoice {word} as {word}")]
async fn invoice_status(world: &mut BillingWorld, vendor: String, invoice_id: String, status: String) {
    let invoice = fetch_invoice(world, &vendor, &invoice_id).await;
    assert_eq!(invoice["status"], status.as_str(), "Unexpected invoice: {invoice}");
}

#[then(expr = "the activity ledger has {int} {string} entry/entries")]
async fn ledger_entries(world: &mut BillingWorld, count: usize, event_type: String) {
    let entries = fetch_activity(world).await;
    let n = entries.iter().filter(|e| e["event_type"] == event_type.as_str()).count();
    assert_eq!(n, count, "Expected {count} {event_type} entries in {entries:?}");
}

#[then(expr = "the {string} entry refers to {word}'s invoice {word}")]
async fn ledger_entry_refers_to_invoice(world: &mut BillingWorld, event_type: String, vendor: String, invoice: String) {
    let local_id = fetch_invoice(world, &vendor, &invoice).await["id"].to_string();
    let entries = fetch_activity(world).await;
    let entry = entries.iter().find(|e| e["event_type"] == event_type.as_str()).expect("No such ledger entry");
    assert_eq!(entry["related_id"], local_id.as_str());
}

#[then(expr = "charge {word} was refunded {int} time(s)")]
async fn charge_refunds(world: &mut BillingWorld, charge_id: String, count: usize) {
    let refunds = world.processor.refund_calls();
    let n = refunds.iter().filter(|(charge, _)| *charge == charge_id).count();
    assert_eq!(n, count, "Refund calls: {refunds:?}");
}

async fn fetch_invoice(world: &BillingWorld, vendor: &str, invoice_id: &str) -> Value {
    let (code, body) = world.as_vendor(vendor, Method::GET, "/vendor/invoices", |req| req).await;
    assert_eq!(code.as_u16(), 200, "Could not fetch invoices: {body}");
    let invoices: Vec<Value> = serde_json::from_str(&body).expect("Invalid invoice list");
    invoices.into_iter().find(|i| i["invoice_id"] == invoice_id).unwrap_or_else(|| panic!("{invoice_id} not found"))
}

async fn fetch_activity(world: &BillingWorld) -> Vec<Value> {
    let (code, body) = world.as_admin(Method::GET, "/admin/activity?limit=500").await;
    assert_eq!(code.as_u16(), 200, "Could not fetch activity: {body}");
    serde_json::from_str(&body).expect("Invalid activity list")
}

fn event_json(id: &str, tag: &str, object: Value) -> String {
    json!({"id": id, "type": tag, "created": Utc::now().timestamp(), "data": {"object": object}, "livemode": false})
        .to_string()
}
