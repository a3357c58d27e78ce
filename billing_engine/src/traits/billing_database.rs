use thiserror::Error;

use crate::traits::{ActivityManagement, InvoiceManagement, ReconciliationStore, VendorManagement};

#[derive(Debug, Clone, Error)]
pub enum BillingDatabaseError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Vendor {0} already exists")]
    VendorAlreadyExists(String),
    #[error("Vendor {0} does not exist")]
    VendorNotFound(String),
    #[error("Invoice {0} already exists")]
    InvoiceAlreadyExists(String),
    #[error("Invoice {0} does not exist")]
    InvoiceNotFound(String),
}

impl From<sqlx::Error> for BillingDatabaseError {
    fn from(e: sqlx::Error) -> Self {
        BillingDatabaseError::DatabaseError(e.to_string())
    }
}

/// The highest level of behaviour for a storage backend of the billing engine.
#[allow(async_fn_in_trait)]
pub trait BillingDatabase:
    Clone + VendorManagement + InvoiceManagement + ActivityManagement + ReconciliationStore
{
    /// The URL of the database
    fn url(&self) -> &str;

    async fn close(&mut self) -> Result<(), BillingDatabaseError>;
}
