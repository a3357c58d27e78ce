use serde::{Deserialize, Serialize};

use crate::db_types::{Invoice, Vendor};

/// Published after `invoice.payment_succeeded` moved an invoice to `paid`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePaidEvent {
    pub invoice: Invoice,
}

impl InvoicePaidEvent {
    pub fn new(invoice: Invoice) -> Self {
        Self { invoice }
    }
}

/// Published after a subscription event overwrote a vendor's subscription status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionChangedEvent {
    pub vendor: Vendor,
    pub subscription_id: String,
}

impl SubscriptionChangedEvent {
    pub fn new(vendor: Vendor, subscription_id: String) -> Self {
        Self { vendor, subscription_id }
    }
}

/// Published when the automatic refund for a dispute could not be made. Somebody needs to look at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundFailedEvent {
    pub dispute_id: String,
    pub charge_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    InvoicePaid(InvoicePaidEvent),
    SubscriptionChanged(SubscriptionChangedEvent),
    RefundFailed(RefundFailedEvent),
}
