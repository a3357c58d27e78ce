use chrono::{DateTime, Utc};

use crate::{
    db_types::{EventOutcome, Invoice, ProcessedEvent, SubscriptionStatus, Vendor},
    traits::BillingDatabaseError,
};

/// The result of applying a processor event to local state under the idempotency guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome<T> {
    /// The guard record and the mutation were committed together. Carries the updated entity.
    Applied(T),
    /// The event id had already been processed. Nothing was written.
    Duplicate,
    /// The entity the event refers to does not exist locally. The guard record is committed with a
    /// [`EventOutcome::LookupMiss`] outcome and nothing else is written.
    NotFound,
}

/// Applies processor events to local state at most once per event id.
///
/// Implementations must write the processed-event record and the entity mutation in a single transaction, so that a
/// failure leaves neither behind and the event can be retried.
#[allow(async_fn_in_trait)]
pub trait ReconciliationStore {
    /// Sets the subscription status of the vendor billed through `customer_id` to the status the processor reported.
    async fn apply_subscription_status(
        &self,
        event_id: &str,
        event_type: &str,
        customer_id: &str,
        status: SubscriptionStatus,
    ) -> Result<ApplyOutcome<Vendor>, BillingDatabaseError>;

    /// Marks the invoice with processor id `invoice_id` as paid.
    async fn apply_invoice_paid(
        &self,
        event_id: &str,
        event_type: &str,
        invoice_id: &str,
    ) -> Result<ApplyOutcome<Invoice>, BillingDatabaseError>;

    /// Commits a guard record on its own, for events whose handlers do not mutate local entities (audit-only events)
    /// or that must be claimed before an external side effect (disputes).
    ///
    /// Returns `false` if the event had already been claimed.
    async fn claim_event(
        &self,
        event_id: &str,
        event_type: &str,
        outcome: EventOutcome,
    ) -> Result<bool, BillingDatabaseError>;

    /// Records the final outcome of a previously claimed event.
    async fn complete_event(&self, event_id: &str, outcome: EventOutcome) -> Result<(), BillingDatabaseError>;

    async fn fetch_processed_event(&self, event_id: &str) -> Result<Option<ProcessedEvent>, BillingDatabaseError>;

    /// Removes guard records processed before `older_than`. Returns the number of records removed.
    async fn purge_processed_events(&self, older_than: DateTime<Utc>) -> Result<u64, BillingDatabaseError>;
}
