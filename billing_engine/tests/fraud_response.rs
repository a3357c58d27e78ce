use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use billing_engine::{
    db_types::{ActivityType, Cents, EventOutcome},
    events::{EventProducer, EventProducers, RefundFailedEvent},
    test_utils::prepare_env::{fresh_database, tear_down},
    traits::{
        PaymentProcessor,
        ProcessorCustomer,
        ProcessorError,
        ProcessorInvoice,
        ProcessorPayout,
        ProcessorRefund,
        ProcessorSubscription,
        ReconciliationStore,
    },
    ReconciliationApi,
    ReconciliationOutcome,
};
use chrono::{DateTime, Utc};
use mockall::mock;
use serde_json::json;
use support::{event, fast_options, setup, setup_with};
use tokio::sync::mpsc;

mod support;

mock! {
    pub Processor {}
    impl PaymentProcessor for Processor {
        async fn create_customer(&self, name: &str) -> Result<ProcessorCustomer, ProcessorError>;
        async fn retrieve_customer(&self, customer_id: &str) -> Result<ProcessorCustomer, ProcessorError>;
        async fn create_invoice_item(&self, customer_id: &str, amount: Cents, description: &str) -> Result<String, ProcessorError>;
        async fn create_invoice(&self, customer_id: &str, description: &str) -> Result<ProcessorInvoice, ProcessorError>;
        async fn finalize_invoice(&self, invoice_id: &str) -> Result<ProcessorInvoice, ProcessorError>;
        async fn pay_invoice(&self, invoice_id: &str) -> Result<ProcessorInvoice, ProcessorError>;
        async fn list_subscriptions(&self, customer_id: &str) -> Result<Vec<ProcessorSubscription>, ProcessorError>;
        async fn create_subscription(&self, customer_id: &str, price_id: &str, trial_end: Option<DateTime<Utc>>) -> Result<ProcessorSubscription, ProcessorError>;
        async fn cancel_subscription(&self, subscription_id: &str) -> Result<ProcessorSubscription, ProcessorError>;
        async fn create_payout(&self, account_id: &str, amount: Cents) -> Result<ProcessorPayout, ProcessorError>;
        async fn refund_charge(&self, charge_id: &str, idempotency_key: &str) -> Result<ProcessorRefund, ProcessorError>;
        async fn attach_payment_method(&self, payment_method_id: &str, customer_id: &str) -> Result<(), ProcessorError>;
        async fn set_default_payment_method(&self, customer_id: &str, payment_method_id: &str) -> Result<(), ProcessorError>;
    }
}

fn dispute(event_id: &str) -> billing_engine::processor_events::ProcessorEvent {
    let object = json!({"id": "dp_1", "charge": "ch_1", "amount": 5000, "reason": "fraudulent", "object": "dispute"});
    event(event_id, "charge.dispute.created", object)
}

#[tokio::test]
async fn dispute_is_refunded_once() {
    let sys = setup().await;
    let ev = dispute("evt_dp");
    assert_eq!(sys.reconciler.handle_event(&ev).await, ReconciliationOutcome::AutoRefunded);
    assert_eq!(sys.reconciler.handle_event(&ev).await, ReconciliationOutcome::Duplicate);

    assert_eq!(sys.processor.refund_calls(), vec![("ch_1".to_string(), "dispute-refund-dp_1".to_string())]);
    let refunds = sys.entries(ActivityType::FraudWarningRefund).await;
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].related_id.as_deref(), Some("ch_1"));
    let guard = sys.db.fetch_processed_event("evt_dp").await.unwrap().unwrap();
    assert_eq!(guard.outcome, EventOutcome::AutoRefunded);
    tear_down(sys.db).await;
}

#[tokio::test]
async fn short_retention_never_drops_a_fresh_dispute_guard() {
    let sys = setup().await;
    let ev = dispute("evt_dp");
    assert_eq!(sys.reconciler.handle_event(&ev).await, ReconciliationOutcome::AutoRefunded);
    let purged = sys.reconciler.purge_processed_events(chrono::Duration::zero()).await.unwrap();
    assert_eq!(purged, 0);
    let purged = sys.reconciler.purge_processed_events(chrono::Duration::days(365 * 1_000_000)).await.unwrap();
    assert_eq!(purged, 0);
    assert_eq!(sys.reconciler.handle_event(&ev).await, ReconciliationOutcome::Duplicate);
    assert_eq!(sys.processor.refund_calls().len(), 1);
    tear_down(sys.db).await;
}

#[tokio::test]
async fn concurrent_dispute_deliveries_refund_once() {
    let sys = setup().await;
    let ev = dispute("evt_dp");
    let (a, b) = tokio::join!(sys.reconciler.handle_event(&ev), sys.reconciler.handle_event(&ev));
    let refunded = [a, b].into_iter().filter(|o| *o == ReconciliationOutcome::AutoRefunded).count();
    assert_eq!(refunded, 1);
    assert_eq!(sys.processor.call_count("refund_charge"), 1);
    assert_eq!(sys.entries(ActivityType::FraudWarningRefund).await.len(), 1);
    tear_down(sys.db).await;
}

#[tokio::test]
async fn failed_refund_raises_an_alert() {
    let (tx, mut rx) = mpsc::channel::<RefundFailedEvent>(4);
    let producers = EventProducers { refund_failed_producer: vec![EventProducer::new(tx)], ..Default::default() };
    let sys = setup_with(producers).await;
    sys.processor.fail("refund_charge", ProcessorError::Rejected("charge_already_refunded".into()));

    let ev = dispute("evt_dp");
    let outcome = sys.reconciler.handle_event(&ev).await;
    assert!(matches!(outcome, ReconciliationOutcome::RefundFailed(ref r) if r.contains("charge_already_refunded")));
    assert!(!outcome.is_success());

    let alert = rx.recv().await.expect("alert published");
    assert_eq!(alert.dispute_id, "dp_1");
    assert_eq!(alert.charge_id, "ch_1");
    assert!(sys.entries(ActivityType::FraudWarningRefund).await.is_empty());
    assert_eq!(sys.entries(ActivityType::FraudRefundFailed).await.len(), 1);
    let guard = sys.db.fetch_processed_event("evt_dp").await.unwrap().unwrap();
    assert_eq!(guard.outcome, EventOutcome::RefundFailed);

    // Rejections are not retried, and redelivery does not try again
    assert_eq!(sys.reconciler.handle_event(&ev).await, ReconciliationOutcome::Duplicate);
    assert_eq!(sys.processor.call_count("refund_charge"), 1);
    tear_down(sys.db).await;
}

#[tokio::test]
async fn slow_refunds_are_retried_with_the_same_key() {
    let sys = setup().await;
    sys.processor.delay_refunds(Duration::from_millis(500));
    let outcome = sys.reconciler.handle_event(&dispute("evt_dp")).await;
    assert!(matches!(outcome, ReconciliationOutcome::RefundFailed(_)), "{outcome:?}");
    let calls = sys.processor.refund_calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|(charge, key)| charge == "ch_1" && key == "dispute-refund-dp_1"));
    assert_eq!(sys.entries(ActivityType::FraudRefundFailed).await.len(), 1);
    tear_down(sys.db).await;
}

#[tokio::test]
async fn refund_succeeds_after_a_timeout() {
    let db = fresh_database().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let mut processor = MockProcessor::new();
    processor.expect_refund_charge().times(2).returning(move |charge, key| {
        assert_eq!(key, "dispute-refund-dp_1");
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(ProcessorError::Timeout("gateway timeout".into()))
        } else {
            Ok(ProcessorRefund {
                id: "re_1".into(),
                charge_id: charge.to_string(),
                amount: Cents::from(5000),
                status: "succeeded".into(),
            })
        }
    });
    let api = ReconciliationApi::new(db.clone(), processor, EventProducers::default(), fast_options());
    assert_eq!(api.handle_event(&dispute("evt_dp")).await, ReconciliationOutcome::AutoRefunded);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    let entries = api.ledger().entries_of_type(&ActivityType::FraudWarningRefund).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].description.contains("re_1"));
    tear_down(db).await;
}

#[tokio::test]
async fn no_retries_when_disabled() {
    let db = fresh_database().await;
    let mut processor = MockProcessor::new();
    processor.expect_refund_charge().times(1).returning(|_, _| Err(ProcessorError::Timeout("slow".into())));
    let options = billing_engine::ReconciliationOptions { refund_retries: 0, ..fast_options() };
    let api = ReconciliationApi::new(db.clone(), processor, EventProducers::default(), options);
    let outcome = api.handle_event(&dispute("evt_dp")).await;
    assert!(matches!(outcome, ReconciliationOutcome::RefundFailed(_)));
    tear_down(db).await;
}
