use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{Cents, SubscriptionStatus};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("The processor did not respond in time: {0}")]
    Timeout(String),
    #[error("The processor could not find {0}")]
    NotFound(String),
    #[error("The processor rejected the request: {0}")]
    Rejected(String),
    #[error("Could not communicate with the processor: {0}")]
    Transport(String),
}

impl ProcessorError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProcessorError::Timeout(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorCustomer {
    pub id: String,
    pub name: Option<String>,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorInvoice {
    pub id: String,
    pub customer_id: String,
    /// The processor's status string (`draft`, `open`, `paid`, `void`, `uncollectible`)
    pub status: String,
    pub amount_due: Cents,
    pub currency: String,
    pub hosted_invoice_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorSubscription {
    pub id: String,
    pub customer_id: String,
    pub status: SubscriptionStatus,
    pub cancel_at_period_end: bool,
    pub current_period_end: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorPayout {
    pub id: String,
    pub amount: Cents,
    pub status: String,
    pub arrival_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorRefund {
    pub id: String,
    pub charge_id: String,
    pub amount: Cents,
    pub status: String,
}

/// Outbound calls to the payment processor.
///
/// Every call is fallible and must never panic. Implementations should bound each call with a timeout and report it as
/// [`ProcessorError::Timeout`].
#[allow(async_fn_in_trait)]
pub trait PaymentProcessor {
    /// Creates a processor customer for a newly registered vendor.
    async fn create_customer(&self, name: &str) -> Result<ProcessorCustomer, ProcessorError>;

    async fn retrieve_customer(&self, customer_id: &str) -> Result<ProcessorCustomer, ProcessorError>;

    /// Adds a pending line item to the customer's next invoice. Returns the item id.
    async fn create_invoice_item(
        &self,
        customer_id: &str,
        amount: Cents,
        description: &str,
    ) -> Result<String, ProcessorError>;

    async fn create_invoice(&self, customer_id: &str, description: &str) -> Result<ProcessorInvoice, ProcessorError>;

    async fn finalize_invoice(&self, invoice_id: &str) -> Result<ProcessorInvoice, ProcessorError>;

    async fn pay_invoice(&self, invoice_id: &str) -> Result<ProcessorInvoice, ProcessorError>;

    async fn list_subscriptions(&self, customer_id: &str) -> Result<Vec<ProcessorSubscription>, ProcessorError>;

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        trial_end: Option<DateTime<Utc>>,
    ) -> Result<ProcessorSubscription, ProcessorError>;

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<ProcessorSubscription, ProcessorError>;

    /// Pays `amount` out of the connected account `account_id`.
    async fn create_payout(&self, account_id: &str, amount: Cents) -> Result<ProcessorPayout, ProcessorError>;

    /// Refunds a charge in full. Calls that share an `idempotency_key` describe one logical refund.
    async fn refund_charge(&self, charge_id: &str, idempotency_key: &str) -> Result<ProcessorRefund, ProcessorError>;

    async fn attach_payment_method(&self, payment_method_id: &str, customer_id: &str) -> Result<(), ProcessorError>;

    async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<(), ProcessorError>;
}
