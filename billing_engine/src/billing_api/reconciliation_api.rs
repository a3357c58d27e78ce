use std::{fmt::Display, time::Duration};

use chrono::Utc;
use log::*;

use crate::{
    billing_api::ledger::{ActivityLedger, OPS_LOG_TARGET},
    db_types::{ActivityType, EventOutcome},
    events::{EventProducers, InvoicePaidEvent, RefundFailedEvent, SubscriptionChangedEvent},
    helpers::RetryPolicy,
    processor_events::{DisputePayload, InvoicePayload, ProcessorEvent, RoutedEvent, SubscriptionPayload},
    traits::{
        ActivityManagement,
        ApplyOutcome,
        BillingDatabaseError,
        PaymentProcessor,
        ProcessorError,
        ProcessorRefund,
        ReconciliationStore,
    },
};

pub const DEFAULT_REFUND_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_REFUND_RETRIES: u32 = 1;
/// The processor redelivers an event for up to three days. Guard records must outlive that.
pub const MIN_EVENT_RETENTION_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy)]
pub struct ReconciliationOptions {
    /// Upper bound on a single refund call. A call that takes longer is dropped.
    pub refund_timeout: Duration,
    /// How many more times a refund is attempted after a timeout. Other refund failures are never retried.
    pub refund_retries: u32,
    /// Backoff for local persistence failures.
    pub retry_policy: RetryPolicy,
}

impl Default for ReconciliationOptions {
    fn default() -> Self {
        Self {
            refund_timeout: DEFAULT_REFUND_TIMEOUT,
            refund_retries: DEFAULT_REFUND_RETRIES,
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// What the engine did with a verified event. Every outcome is acknowledged to the processor: none of them would be
/// improved by a redelivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// Local state was brought in line with the event
    Applied,
    /// An audit-only event was written to the activity ledger
    AuditRecorded,
    /// The event id had been processed before
    Duplicate,
    /// The entity the event refers to does not exist locally
    LookupMiss,
    AutoRefunded,
    RefundFailed(String),
    /// The event type is not in the routing table
    Ignored(String),
    /// The event type is registered, but its payload could not be decoded
    Malformed(String),
    /// Local persistence failed after all retries
    PersistenceFailed(String),
}

impl Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Applied => write!(f, "Event applied"),
            Self::AuditRecorded => write!(f, "Event recorded"),
            Self::Duplicate => write!(f, "Event already processed"),
            Self::LookupMiss => write!(f, "No matching local record. Event acknowledged"),
            Self::AutoRefunded => write!(f, "Disputed charge refunded"),
            Self::RefundFailed(reason) => write!(f, "Refund of disputed charge failed: {reason}"),
            Self::Ignored(tag) => write!(f, "Event type {tag} is not handled"),
            Self::Malformed(reason) => write!(f, "Event payload could not be processed: {reason}"),
            Self::PersistenceFailed(reason) => write!(f, "Event could not be saved: {reason}"),
        }
    }
}

impl ReconciliationOutcome {
    /// `false` for outcomes that someone should look into.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::RefundFailed(_) | Self::Malformed(_) | Self::PersistenceFailed(_))
    }
}

/// `ReconciliationApi` applies verified processor events to the local system of record.
///
/// Each event is routed through the table in [`crate::processor_events`] to exactly one handler. The idempotency guard
/// is consulted before any handler runs, so a redelivered event is never applied twice. Every handler writes to the
/// activity ledger, and [`Self::handle_event`] never fails: problems are recorded and the event is acknowledged.
pub struct ReconciliationApi<B, P> {
    db: B,
    processor: P,
    ledger: ActivityLedger<B>,
    producers: EventProducers,
    options: ReconciliationOptions,
}

impl<B, P> std::fmt::Debug for ReconciliationApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({:?})", self.options)
    }
}

impl<B: Clone, P> ReconciliationApi<B, P> {
    pub fn new(db: B, processor: P, producers: EventProducers, options: ReconciliationOptions) -> Self {
        let ledger = ActivityLedger::new(db.clone());
        Self { db, processor, ledger, producers, options }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn ledger(&self) -> &ActivityLedger<B> {
        &self.ledger
    }
}

impl<B, P> ReconciliationApi<B, P>
where
    B: ReconciliationStore + ActivityManagement,
    P: PaymentProcessor,
{
    pub async fn handle_event(&self, event: &ProcessorEvent) -> ReconciliationOutcome {
        trace!("🪝️ Routing event {} ({})", event.id, event.event_type);
        let routed = match event.route() {
            Ok(r) => r,
            Err(e) => {
                error!("🪝️ {e}");
                let msg = format!("Could not decode {} event {}: {}", event.event_type, event.id, e.reason);
                self.ledger.record_once(ActivityType::ReconciliationFailed, msg, event.id.clone()).await;
                return ReconciliationOutcome::Malformed(e.reason);
            },
        };
        let outcome = match routed {
            RoutedEvent::Unhandled(tag) => {
                info!("🪝️ Event {} has unregistered type {tag}. Acknowledging without action.", event.id);
                ReconciliationOutcome::Ignored(tag)
            },
            RoutedEvent::SubscriptionChanged(sub) => self.reconcile_subscription(event, sub).await,
            RoutedEvent::InvoicePaymentSucceeded(invoice) => self.reconcile_invoice_payment(event, invoice).await,
            RoutedEvent::PayoutPaid(payout) => {
                let desc = format!("Payout {} of {} succeeded", payout.id, format_amount(payout.amount));
                self.record_audit_event(event, ActivityType::PayoutSucceeded, desc, payout.id).await
            },
            RoutedEvent::PayoutFailed(payout) => {
                let reason = payout.failure_message.as_deref().unwrap_or("no reason given");
                let desc = format!("Payout {} of {} failed: {reason}", payout.id, format_amount(payout.amount));
                self.record_audit_event(event, ActivityType::PayoutFailed, desc, payout.id).await
            },
            RoutedEvent::ChargeRefunded(charge) => {
                let desc = format!("Charge {} refunded ({})", charge.id, format_amount(charge.amount_refunded));
                self.record_audit_event(event, ActivityType::ChargeRefunded, desc, charge.id).await
            },
            RoutedEvent::DisputeCreated(dispute) => self.respond_to_dispute(event, dispute).await,
        };
        debug!("🪝️ Event {} ({}): {outcome}", event.id, event.event_type);
        outcome
    }

    /// Removes guard records older than `retention`. Records younger than [`MIN_EVENT_RETENTION_DAYS`] are always
    /// kept, since the processor may still redeliver their events.
    pub async fn purge_processed_events(&self, retention: chrono::Duration) -> Result<u64, BillingDatabaseError> {
        let floor = chrono::Duration::days(MIN_EVENT_RETENTION_DAYS);
        if retention < floor {
            warn!("🕰️ A retention of {retention} is shorter than the redelivery window. Keeping {floor} instead.");
        }
        let retention = retention.max(floor);
        let Some(cutoff) = Utc::now().checked_sub_signed(retention) else {
            debug!("🕰️ No processed events can be older than {retention}");
            return Ok(0);
        };
        self.db.purge_processed_events(cutoff).await
    }

    async fn reconcile_subscription(&self, event: &ProcessorEvent, sub: SubscriptionPayload) -> ReconciliationOutcome {
        let result = self
            .options
            .retry_policy
            .run("Subscription reconciliation", || {
                self.db.apply_subscription_status(&event.id, &event.event_type, &sub.customer, sub.status)
            })
            .await;
        match result {
            Ok(ApplyOutcome::Applied(vendor)) => {
                info!("🔄️ Vendor {} subscription {} is now {}", vendor.username, sub.id, sub.status);
                let desc = format!("Subscription {} for {} is now {}", sub.id, vendor.username, sub.status);
                self.ledger.record(ActivityType::SubscriptionUpdated, desc, Some(vendor.id.to_string())).await;
                for producer in &self.producers.subscription_changed_producer {
                    producer.publish_event(SubscriptionChangedEvent::new(vendor.clone(), sub.id.clone())).await;
                }
                ReconciliationOutcome::Applied
            },
            Ok(ApplyOutcome::Duplicate) => self.duplicate(event),
            Ok(ApplyOutcome::NotFound) => {
                let desc = format!(
                    "{} event {}: no vendor is billed through customer {}",
                    event.event_type, event.id, sub.customer
                );
                self.lookup_miss(desc, sub.customer).await
            },
            Err(e) => self.persistence_failed(event, e).await,
        }
    }

    async fn reconcile_invoice_payment(&self, event: &ProcessorEvent, inv: InvoicePayload) -> ReconciliationOutcome {
        let result = self
            .options
            .retry_policy
            .run("Invoice reconciliation", || self.db.apply_invoice_paid(&event.id, &event.event_type, &inv.id))
            .await;
        match result {
            Ok(ApplyOutcome::Applied(invoice)) => {
                info!("🧾️ Invoice {} ({}) has been paid", invoice.invoice_id, invoice.amount);
                let desc = format!("Invoice {} for {} {} paid", invoice.invoice_id, invoice.amount, invoice.currency);
                self.ledger.record(ActivityType::InvoicePaid, desc, Some(invoice.id.to_string())).await;
                for producer in &self.producers.invoice_paid_producer {
                    producer.publish_event(InvoicePaidEvent::new(invoice.clone())).await;
                }
                ReconciliationOutcome::Applied
            },
            Ok(ApplyOutcome::Duplicate) => self.duplicate(event),
            Ok(ApplyOutcome::NotFound) => {
                let desc = format!("{} event {}: invoice {} is not known locally", event.event_type, event.id, inv.id);
                self.lookup_miss(desc, inv.id).await
            },
            Err(e) => self.persistence_failed(event, e).await,
        }
    }

    async fn record_audit_event(
        &self,
        event: &ProcessorEvent,
        activity: ActivityType,
        description: String,
        related_id: String,
    ) -> ReconciliationOutcome {
        let claimed = self
            .options
            .retry_policy
            .run("Audit event claim", || self.db.claim_event(&event.id, &event.event_type, EventOutcome::AuditOnly))
            .await;
        match claimed {
            Ok(true) => {
                info!("🪝️ {description}");
                self.ledger.record(activity, description, Some(related_id)).await;
                ReconciliationOutcome::AuditRecorded
            },
            Ok(false) => self.duplicate(event),
            Err(e) => self.persistence_failed(event, e).await,
        }
    }

    /// Fraud response. The guard is committed *before* the refund is attempted, so no redelivery (concurrent or
    /// later) can ever produce a second refund. The claim is then completed with the outcome.
    async fn respond_to_dispute(&self, event: &ProcessorEvent, dispute: DisputePayload) -> ReconciliationOutcome {
        let claimed = self
            .options
            .retry_policy
            .run("Dispute claim", || self.db.claim_event(&event.id, &event.event_type, EventOutcome::Pending))
            .await;
        match claimed {
            Ok(true) => {},
            Ok(false) => return self.duplicate(event),
            Err(e) => return self.persistence_failed(event, e).await,
        }
        warn!("🚨️ Dispute {} opened against charge {}. Refunding automatically.", dispute.id, dispute.charge);
        let idempotency_key = format!("dispute-refund-{}", dispute.id);
        let (outcome, final_state) = match self.refund_with_timeout(&dispute.charge, &idempotency_key).await {
            Ok(refund) => {
                info!("🚨️ Charge {} refunded ({}) in response to dispute {}", dispute.charge, refund.id, dispute.id);
                let desc = format!(
                    "Charge {} refunded automatically after dispute {} ({}). Refund {}",
                    dispute.charge,
                    dispute.id,
                    dispute.reason.as_deref().unwrap_or("no reason given"),
                    refund.id
                );
                self.ledger.record(ActivityType::FraudWarningRefund, desc, Some(dispute.charge.clone())).await;
                (ReconciliationOutcome::AutoRefunded, EventOutcome::AutoRefunded)
            },
            Err(e) => {
                let reason = e.to_string();
                error!("🚨️ Automatic refund of charge {} for dispute {} failed: {reason}", dispute.charge, dispute.id);
                let desc = format!(
                    "Automatic refund of charge {} for dispute {} failed: {reason}",
                    dispute.charge, dispute.id
                );
                self.ledger.record(ActivityType::FraudRefundFailed, desc, Some(dispute.charge.clone())).await;
                let alert = RefundFailedEvent {
                    dispute_id: dispute.id.clone(),
                    charge_id: dispute.charge.clone(),
                    reason: reason.clone(),
                };
                for producer in &self.producers.refund_failed_producer {
                    producer.publish_event(alert.clone()).await;
                }
                (ReconciliationOutcome::RefundFailed(reason), EventOutcome::RefundFailed)
            },
        };
        let completed = self
            .options
            .retry_policy
            .run("Dispute completion", || self.db.complete_event(&event.id, final_state))
            .await;
        if let Err(e) = completed {
            error!(target: OPS_LOG_TARGET, "🚨️ Could not record outcome {final_state} for event {}: {e}", event.id);
        }
        outcome
    }

    /// One logical refund: every attempt carries the same idempotency key. Only a timed-out attempt is retried.
    async fn refund_with_timeout(
        &self,
        charge_id: &str,
        idempotency_key: &str,
    ) -> Result<ProcessorRefund, ProcessorError> {
        let timeout = self.options.refund_timeout;
        let mut retries_left = self.options.refund_retries;
        loop {
            let attempt = self.processor.refund_charge(charge_id, idempotency_key);
            let result = match tokio::time::timeout(timeout, attempt).await {
                Ok(result) => result,
                Err(_) => {
                    let msg = format!("refund not confirmed within {}ms", timeout.as_millis());
                    Err(ProcessorError::Timeout(msg))
                },
            };
            match result {
                Err(e) if e.is_timeout() && retries_left > 0 => {
                    warn!("🚨️ Refund of {charge_id} timed out. Retrying with idempotency key {idempotency_key}");
                    retries_left -= 1;
                },
                result => return result,
            }
        }
    }

    fn duplicate(&self, event: &ProcessorEvent) -> ReconciliationOutcome {
        debug!("🪝️ Event {} ({}) has already been processed. Skipping.", event.id, event.event_type);
        ReconciliationOutcome::Duplicate
    }

    async fn lookup_miss(&self, description: String, related_id: String) -> ReconciliationOutcome {
        warn!("🪝️ {description}");
        self.ledger.record(ActivityType::ReconciliationLookupMiss, description, Some(related_id)).await;
        ReconciliationOutcome::LookupMiss
    }

    /// The guard was not written either, so a manual redelivery from the processor will be applied normally.
    async fn persistence_failed(&self, event: &ProcessorEvent, e: BillingDatabaseError) -> ReconciliationOutcome {
        error!(target: OPS_LOG_TARGET, "🪝️ Giving up on event {} ({}): {e}", event.id, event.event_type);
        let desc = format!("{} event {} could not be applied: {e}", event.event_type, event.id);
        self.ledger.record(ActivityType::ReconciliationFailed, desc, Some(event.id.clone())).await;
        ReconciliationOutcome::PersistenceFailed(e.to_string())
    }
}

fn format_amount(cents: i64) -> String {
    crate::db_types::Cents::from(cents).to_string()
}
