use std::fmt::Display;

use thiserror::Error;

use crate::{
    helpers::PasswordError,
    traits::{BillingDatabaseError, ProcessorError},
};

/// The processor call a forward action was making when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorStep {
    CreateCustomer,
    RetrieveCustomer,
    CreateInvoiceItem,
    CreateInvoice,
    FinalizeInvoice,
    PayInvoice,
    ListSubscriptions,
    CreateSubscription,
    CancelSubscription,
    AttachPaymentMethod,
    SetDefaultPaymentMethod,
    CreatePayout,
}

impl Display for ProcessorStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CreateCustomer => "create customer",
            Self::RetrieveCustomer => "retrieve customer",
            Self::CreateInvoiceItem => "create invoice item",
            Self::CreateInvoice => "create invoice",
            Self::FinalizeInvoice => "finalize invoice",
            Self::PayInvoice => "pay invoice",
            Self::ListSubscriptions => "list subscriptions",
            Self::CreateSubscription => "create subscription",
            Self::CancelSubscription => "cancel subscription",
            Self::AttachPaymentMethod => "attach payment method",
            Self::SetDefaultPaymentMethod => "set default payment method",
            Self::CreatePayout => "create payout",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Error)]
pub enum VendorApiError {
    #[error("Invalid request: {0}")]
    InvalidInput(String),
    #[error("Invalid username or password")]
    Unauthorized,
    #[error("Vendor {0} has not been approved yet")]
    NotApproved(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Payment processor error at step '{step}': {source}")]
    Upstream { step: ProcessorStep, source: ProcessorError },
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Credential error: {0}")]
    CredentialError(String),
}

impl VendorApiError {
    pub fn upstream(step: ProcessorStep) -> impl FnOnce(ProcessorError) -> Self {
        move |source| VendorApiError::Upstream { step, source }
    }
}

impl From<BillingDatabaseError> for VendorApiError {
    fn from(e: BillingDatabaseError) -> Self {
        match e {
            BillingDatabaseError::VendorNotFound(v) => VendorApiError::NotFound(format!("Vendor {v} does not exist")),
            BillingDatabaseError::InvoiceNotFound(i) => VendorApiError::NotFound(format!("Invoice {i} does not exist")),
            BillingDatabaseError::VendorAlreadyExists(v) => VendorApiError::Conflict(format!("Vendor {v} already exists")),
            BillingDatabaseError::InvoiceAlreadyExists(i) => {
                VendorApiError::Conflict(format!("Invoice {i} has already been recorded"))
            },
            BillingDatabaseError::DatabaseError(s) => VendorApiError::DatabaseError(s),
        }
    }
}

impl From<PasswordError> for VendorApiError {
    fn from(e: PasswordError) -> Self {
        VendorApiError::CredentialError(e.to_string())
    }
}
