use billing_engine::{
    db_types::Cents,
    traits::{
        PaymentProcessor,
        ProcessorCustomer,
        ProcessorError,
        ProcessorInvoice,
        ProcessorPayout,
        ProcessorRefund,
        ProcessorSubscription,
    },
};
use chrono::{DateTime, Utc};
use mockall::mock;

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
