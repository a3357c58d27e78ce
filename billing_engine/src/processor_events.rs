//! Processor webhook events and the routing table.
//!
//! Every delivery carries an envelope with the event id, a type tag and the affected object. The tag is mapped onto an
//! [`EventCategory`] through [`ROUTING_TABLE`], and the object is then decoded into the payload that category needs,
//! giving a [`RoutedEvent`]. Handlers match on `RoutedEvent` exhaustively, so every registered tag has exactly one
//! handler.
use std::fmt::Display;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::db_types::SubscriptionStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    pub data: EventData,
    #[serde(default)]
    pub livemode: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub object: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventCategory {
    SubscriptionChanged,
    InvoicePaymentSucceeded,
    PayoutPaid,
    PayoutFailed,
    ChargeRefunded,
    DisputeCreated,
}

/// Type tag to handler. A tag that is not listed here is acknowledged and otherwise ignored.
pub const ROUTING_TABLE: [(&str, EventCategory); 8] = [
    ("customer.subscription.created", EventCategory::SubscriptionChanged),
    ("customer.subscription.updated", EventCategory::SubscriptionChanged),
    ("customer.subscription.deleted", EventCategory::SubscriptionChanged),
    ("invoice.payment_succeeded", EventCategory::InvoicePaymentSucceeded),
    ("payout.paid", EventCategory::PayoutPaid),
    ("payout.failed", EventCategory::PayoutFailed),
    ("charge.refunded", EventCategory::ChargeRefunded),
    ("charge.dispute.created", EventCategory::DisputeCreated),
];

impl EventCategory {
    pub fn for_tag(tag: &str) -> Option<Self> {
        ROUTING_TABLE.iter().find(|(t, _)| *t == tag).map(|(_, c)| *c)
    }
}

//--------------------------------------        Payloads       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionPayload {
    pub id: String,
    pub customer: String,
    pub status: SubscriptionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvoicePayload {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub amount_paid: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PayoutPayload {
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub failure_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChargePayload {
    pub id: String,
    #[serde(default)]
    pub amount_refunded: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DisputePayload {
    pub id: String,
    pub charge: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedEvent {
    SubscriptionChanged(SubscriptionPayload),
    InvoicePaymentSucceeded(InvoicePayload),
    PayoutPaid(PayoutPayload),
    PayoutFailed(PayoutPayload),
    ChargeRefunded(ChargePayload),
    DisputeCreated(DisputePayload),
    /// The tag is not in the routing table
    Unhandled(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Event {event_id} ({event_type}) has an unexpected payload: {reason}")]
pub struct PayloadError {
    pub event_id: String,
    pub event_type: String,
    pub reason: String,
}

impl ProcessorEvent {
    pub fn category(&self) -> Option<EventCategory> {
        EventCategory::for_tag(&self.event_type)
    }

    /// Decodes the event object according to the routing table.
    pub fn route(&self) -> Result<RoutedEvent, PayloadError> {
        let category = match self.category() {
            Some(c) => c,
            None => return Ok(RoutedEvent::Unhandled(self.event_type.clone())),
        };
        let routed = match category {
            EventCategory::SubscriptionChanged => RoutedEvent::SubscriptionChanged(self.payload()?),
            EventCategory::InvoicePaymentSucceeded => RoutedEvent::InvoicePaymentSucceeded(self.payload()?),
            EventCategory::PayoutPaid => RoutedEvent::PayoutPaid(self.payload()?),
            EventCategory::PayoutFailed => RoutedEvent::PayoutFailed(self.payload()?),
            EventCategory::ChargeRefunded => RoutedEvent::ChargeRefunded(self.payload()?),
            EventCategory::DisputeCreated => RoutedEvent::DisputeCreated(self.payload()?),
        };
        Ok(routed)
    }

    fn payload<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        T::deserialize(&self.data.object).map_err(|e| self.payload_error(e))
    }

    fn payload_error<E: Display>(&self, e: E) -> PayloadError {
        PayloadError { event_id: self.id.clone(), event_type: self.event_type.clone(), reason: e.to_string() }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn event(tag: &str, object: Value) -> ProcessorEvent {
        serde_json::from_value(json!({
            "id": "evt_123",
            "type": tag,
            "created": 1_700_000_000,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn every_tag_has_exactly_one_handler() {
        for (i, (tag, _)) in ROUTING_TABLE.iter().enumerate() {
            assert!(ROUTING_TABLE.iter().skip(i + 1).all(|(t, _)| t != tag), "{tag} is registered twice");
        }
    }

    #[test]
    fn subscription_events() {
        let obj = json!({"id": "sub_1", "customer": "cus_1", "status": "past_due", "object": "subscription"});
        for tag in ["customer.subscription.created", "customer.subscription.updated", "customer.subscription.deleted"] {
            let routed = event(tag, obj.clone()).route().unwrap();
            assert_eq!(
                routed,
                RoutedEvent::SubscriptionChanged(SubscriptionPayload {
                    id: "sub_1".into(),
                    customer: "cus_1".into(),
                    status: SubscriptionStatus::PastDue
                })
            );
        }
    }

    #[test]
    fn audit_and_fraud_events() {
        let routed = event("payout.paid", json!({"id": "po_1", "amount": 5000, "currency": "usd"})).route().unwrap();
        assert!(matches!(routed, RoutedEvent::PayoutPaid(p) if p.id == "po_1" && p.amount == 5000));
        let routed = event("payout.failed", json!({"id": "po_2", "failure_message": "closed"})).route().unwrap();
        assert!(matches!(routed, RoutedEvent::PayoutFailed(p) if p.failure_message.as_deref() == Some("closed")));
        let routed = event("charge.refunded", json!({"id": "ch_9", "amount_refunded": 100})).route().unwrap();
        assert!(matches!(routed, RoutedEvent::ChargeRefunded(c) if c.id == "ch_9"));
        let dispute = json!({"id": "dp_1", "charge": "ch_1", "amount": 5000, "reason": "fraudulent"});
        let routed = event("charge.dispute.created", dispute).route().unwrap();
        assert!(matches!(routed, RoutedEvent::DisputeCreated(d) if d.charge == "ch_1" && d.id == "dp_1"));
        let routed = event("invoice.payment_succeeded", json!({"id": "in_1", "amount_paid": 5000})).route().unwrap();
        assert!(matches!(routed, RoutedEvent::InvoicePaymentSucceeded(i) if i.id == "in_1"));
    }

    #[test]
    fn unknown_tags_are_unhandled() {
        let routed = event("customer.created", json!({"id": "cus_1"})).route().unwrap();
        assert_eq!(routed, RoutedEvent::Unhandled("customer.created".into()));
    }

    #[test]
    fn bad_payloads() {
        let err = event("charge.dispute.created", json!({"id": "dp_1"})).route().unwrap_err();
        assert_eq!(err.event_id, "evt_123");
        let sub = json!({"id": "sub_1", "customer": "cus_1", "status": "weird"});
        let err = event("customer.subscription.updated", sub).route().unwrap_err();
        assert_eq!(err.event_type, "customer.subscription.updated");
    }
}
