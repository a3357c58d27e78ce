#![allow(dead_code)]
use std::time::Duration;

use billing_engine::{
    db_types::{ActivityEntry, ActivityType, InvoiceStatus, NewInvoice, Vendor},
    events::EventProducers,
    helpers::RetryPolicy,
    processor_events::ProcessorEvent,
    test_utils::{fake_processor::FakeProcessor, prepare_env::fresh_database},
    traits::{ActivityManagement, InvoiceManagement, VendorManagement},
    ReconciliationApi,
    ReconciliationOptions,
    SqliteDatabase,
    VendorApi,
};
use serde_json::{json, Value};

pub struct TestSystem {
    pub db: SqliteDatabase,
    pub processor: FakeProcessor,
    pub vendors: VendorApi<SqliteDatabase, FakeProcessor>,
    pub reconciler: ReconciliationApi<SqliteDatabase, FakeProcessor>,
}

pub fn fast_options() -> ReconciliationOptions {
    ReconciliationOptions {
        refund_timeout: Duration::from_millis(200),
        refund_retries: 1,
        retry_policy: RetryPolicy { attempts: 3, base_delay: Duration::from_millis(5) },
    }
}

pub async fn setup() -> TestSystem {
    setup_with(EventProducers::default()).await
}

pub async fn setup_with(producers: EventProducers) -> TestSystem {
    let db = fresh_database().await;
    let processor = FakeProcessor::new();
    let vendors = VendorApi::new(db.clone(), processor.clone());
    let reconciler = ReconciliationApi::new(db.clone(), processor.clone(), producers, fast_options());
    TestSystem { db, processor, vendors, reconciler }
}

pub fn event(id: &str, tag: &str, object: Value) -> ProcessorEvent {
    serde_json::from_value(json!({
        "id": id,
        "type": tag,
        "created": 1_700_000_000,
        "data": { "object": object },
        "livemode": false
    }))
    .expect("valid event envelope")
}

impl TestSystem {
    /// Registers and approves a vendor, and gives it one end customer.
    pub async fn approved_vendor(&self, username: &str) -> (Vendor, String) {
        self.vendors.register_vendor(username, "correct horse battery").await.expect("register vendor");
        let vendor = self.vendors.approve_vendor(username).await.expect("approve vendor");
        let customer_id = self.processor.add_customer("A client");
        let vendor = self.vendors.add_customer(&vendor, &customer_id).await.expect("add customer");
        (vendor, customer_id)
    }

    pub async fn seed_invoice(&self, invoice_id: &str, customer_id: &str, cents: i64) {
        let invoice = NewInvoice {
            invoice_id: invoice_id.to_string(),
            customer_id: customer_id.to_string(),
            amount: cents.into(),
            currency: "usd".into(),
            description: "Seeded".into(),
            hosted_invoice_url: None,
            status: InvoiceStatus::Open,
        };
        self.db.insert_invoice(invoice).await.expect("insert invoice");
    }

    pub async fn entries(&self, activity: ActivityType) -> Vec<ActivityEntry> {
        self.db.fetch_activity_by_type(&activity).await.expect("fetch activity")
    }

    pub async fn vendor(&self, username: &str) -> Vendor {
        self.db.fetch_vendor_by_username(username).await.expect("fetch vendor").expect("vendor exists")
    }
}
