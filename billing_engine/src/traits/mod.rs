//! # Storage and processor contracts
//!
//! This module defines the behaviour that a backend must expose to support the billing engine, plus the contract for
//! the outbound payment processor.
//!
//! * [`BillingDatabase`] is the umbrella trait for a complete storage backend.
//! * [`VendorManagement`] and [`InvoiceManagement`] cover the local system of record.
//! * [`ActivityManagement`] is the append-only activity ledger table.
//! * [`ReconciliationStore`] applies processor events under the idempotency guard. Every method that mutates an entity
//!   also writes the guard record in the same transaction.
//! * [`PaymentProcessor`] is everything the engine asks of the processor. Responses are mapped into the small data
//!   objects in this module so that the engine never depends on a particular REST client.
mod activity_management;
mod billing_database;
mod invoice_management;
mod payment_processor;
mod reconciliation_store;
mod vendor_management;

pub use activity_management::ActivityManagement;
pub use billing_database::{BillingDatabase, BillingDatabaseError};
pub use invoice_management::InvoiceManagement;
pub use payment_processor::{
    PaymentProcessor,
    ProcessorCustomer,
    ProcessorError,
    ProcessorInvoice,
    ProcessorPayout,
    ProcessorRefund,
    ProcessorSubscription,
};
pub use reconciliation_store::{ApplyOutcome, ReconciliationStore};
pub use vendor_management::VendorManagement;
