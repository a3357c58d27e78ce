use serde::{Deserialize, Serialize};

use crate::db_types::Cents;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterVendorRequest {
    pub username: String,
    pub password: String,
}

/// A request to bill one of the vendor's customers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub customer_id: String,
    /// Amount in major currency units, e.g. `50.00`
    pub amount: Cents,
    #[serde(default)]
    pub description: String,
    /// Attempt to charge the customer's default payment method straight away
    #[serde(default)]
    pub auto_charge: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCustomerRequest {
    pub customer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    pub price_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethodRequest {
    pub payment_method_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutAccountRequest {
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub amount: Cents,
}
