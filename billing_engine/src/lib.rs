//! Vendor Billing Engine
//!
//! The billing engine keeps a local record of vendors, their end customers and invoices in sync with an external
//! payment processor. This library contains the core logic and is independent of any particular web framework or
//! processor client.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`SqliteDatabase`] and the contracts in [`mod@traits`]). You should never need to access the database
//!    directly. Instead, use the public API provided by the engine. The exception is the data types used in the
//!    database. These are defined in the `db_types` module and are public.
//! 2. Webhook reconciliation ([`ReconciliationApi`]). Verified processor events ([`processor_events`]) are routed to a
//!    handler, applied at most once under the idempotency guard, and summarised in the activity ledger
//!    ([`ActivityLedger`]). Disputed charges are refunded automatically.
//! 3. Forward actions ([`VendorApi`]). Registration, invoicing, subscriptions and payouts, issued against a
//!    [`traits::PaymentProcessor`] implementation.
//!
//! The engine also emits events when reconciliation changes local state, or when an automatic refund fails. A simple
//! actor framework ([`mod@events`]) lets you hook into these and perform custom actions.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod processor_events;
pub mod traits;

mod billing_api;
#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use billing_api::{
    errors::{ProcessorStep, VendorApiError},
    ledger::{ActivityLedger, OPS_LOG_TARGET},
    reconciliation_api::{
        ReconciliationApi,
        ReconciliationOptions,
        ReconciliationOutcome,
        DEFAULT_REFUND_RETRIES,
        DEFAULT_REFUND_TIMEOUT,
        MIN_EVENT_RETENTION_DAYS,
    },
    vendor_api::{VendorApi, DEFAULT_TRIAL_DAYS, MIN_PASSWORD_LENGTH},
    vendor_objects,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
