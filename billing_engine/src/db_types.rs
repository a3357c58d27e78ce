use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
pub use vb_common::Cents;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------  SubscriptionStatus   ---------------------------------------------------------
/// Mirrors the processor's subscription lifecycle. `None` is the state of a vendor that has never subscribed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    None,
    Incomplete,
    IncompleteExpired,
    Trialing,
    Active,
    PastDue,
    Canceled,
    Unpaid,
    Paused,
}

impl SubscriptionStatus {
    /// Subscriptions in these states can still be cancelled.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Trialing | Self::Active | Self::PastDue | Self::Unpaid | Self::Incomplete | Self::Paused)
    }
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Unpaid => "unpaid",
            Self::Paused => "paused",
        };
        f.write_str(s)
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "incomplete" => Ok(Self::Incomplete),
            "incomplete_expired" => Ok(Self::IncompleteExpired),
            "trialing" => Ok(Self::Trialing),
            "active" => Ok(Self::Active),
            "past_due" => Ok(Self::PastDue),
            "canceled" => Ok(Self::Canceled),
            "unpaid" => Ok(Self::Unpaid),
            "paused" => Ok(Self::Paused),
            s => Err(ConversionError(format!("Invalid subscription status: {s}"))),
        }
    }
}

//--------------------------------------     InvoiceStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Finalized, awaiting payment
    Open,
    Paid,
    Void,
    Uncollectible,
}

impl Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvoiceStatus::Open => write!(f, "open"),
            InvoiceStatus::Paid => write!(f, "paid"),
            InvoiceStatus::Void => write!(f, "void"),
            InvoiceStatus::Uncollectible => write!(f, "uncollectible"),
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "paid" => Ok(Self::Paid),
            "void" => Ok(Self::Void),
            "uncollectible" => Ok(Self::Uncollectible),
            s => Err(ConversionError(format!("Invalid invoice status: {s}"))),
        }
    }
}

//--------------------------------------     ActivityType      ---------------------------------------------------------
/// The tag of an activity ledger entry. The set is open: tags this build does not know about are preserved verbatim in
/// [`ActivityType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityType {
    VendorRegistered,
    VendorApproved,
    InvoiceCreated,
    InvoicePaid,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionCancelled,
    PaymentMethodUpdated,
    PayoutCreated,
    PayoutSucceeded,
    PayoutFailed,
    ChargeRefunded,
    FraudWarningRefund,
    FraudRefundFailed,
    ReconciliationLookupMiss,
    ReconciliationFailed,
    Other(String),
}

impl ActivityType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::VendorRegistered => "vendor_registered",
            Self::VendorApproved => "vendor_approved",
            Self::InvoiceCreated => "invoice_created",
            Self::InvoicePaid => "invoice_paid",
            Self::SubscriptionCreated => "subscription_created",
            Self::SubscriptionUpdated => "subscription_updated",
            Self::SubscriptionCancelled => "subscription_cancelled",
            Self::PaymentMethodUpdated => "payment_method_updated",
            Self::PayoutCreated => "payout_created",
            Self::PayoutSucceeded => "payout_succeeded",
            Self::PayoutFailed => "payout_failed",
            Self::ChargeRefunded => "charge_refunded",
            Self::FraudWarningRefund => "fraud_warning_refund",
            Self::FraudRefundFailed => "fraud_refund_failed",
            Self::ReconciliationLookupMiss => "reconciliation_lookup_miss",
            Self::ReconciliationFailed => "reconciliation_failed",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for ActivityType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "vendor_registered" => Self::VendorRegistered,
            "vendor_approved" => Self::VendorApproved,
            "invoice_created" => Self::InvoiceCreated,
            "invoice_paid" => Self::InvoicePaid,
            "subscription_created" => Self::SubscriptionCreated,
            "subscription_updated" => Self::SubscriptionUpdated,
            "subscription_cancelled" => Self::SubscriptionCancelled,
            "payment_method_updated" => Self::PaymentMethodUpdated,
            "payout_created" => Self::PayoutCreated,
            "payout_succeeded" => Self::PayoutSucceeded,
            "payout_failed" => Self::PayoutFailed,
            "charge_refunded" => Self::ChargeRefunded,
            "fraud_warning_refund" => Self::FraudWarningRefund,
            "fraud_refund_failed" => Self::FraudRefundFailed,
            "reconciliation_lookup_miss" => Self::ReconciliationLookupMiss,
            "reconciliation_failed" => Self::ReconciliationFailed,
            _ => Self::Other(value),
        }
    }
}

impl From<ActivityType> for String {
    fn from(value: ActivityType) -> Self {
        value.as_str().to_string()
    }
}

impl Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//--------------------------------------      EventOutcome     ---------------------------------------------------------
/// What happened to a processor event once the idempotency guard let it through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// Claimed, but the handler has not finished (only seen for disputes while the refund is in flight)
    Pending,
    Applied,
    AuditOnly,
    LookupMiss,
    Failed,
    AutoRefunded,
    RefundFailed,
}

impl Display for EventOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Applied => "applied",
            Self::AuditOnly => "audit_only",
            Self::LookupMiss => "lookup_miss",
            Self::Failed => "failed",
            Self::AutoRefunded => "auto_refunded",
            Self::RefundFailed => "refund_failed",
        };
        f.write_str(s)
    }
}

//--------------------------------------         Vendor        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vendor {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub approved: bool,
    /// The processor customer that bills this vendor. Assigned at registration and never changed.
    pub stripe_customer_id: String,
    /// Last status reported by the processor, or a provisional local value until the processor reports one.
    pub subscription_status: SubscriptionStatus,
    pub trial_expires_at: DateTime<Utc>,
    pub payout_account_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Processor customer ids of the vendor's own clients.
    #[sqlx(skip)]
    #[serde(default)]
    pub customers: Vec<String>,
}

impl Vendor {
    pub fn has_customer(&self, customer_id: &str) -> bool {
        self.customers.iter().any(|c| c == customer_id)
    }
}

#[derive(Debug, Clone)]
pub struct NewVendor {
    pub username: String,
    pub password_hash: String,
    pub stripe_customer_id: String,
    pub trial_expires_at: DateTime<Utc>,
}

//--------------------------------------        Invoice        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct Invoice {
    pub id: i64,
    /// The processor's invoice id. Every reconciliation lookup uses this key.
    pub invoice_id: String,
    pub customer_id: String,
    pub amount: Cents,
    pub currency: String,
    pub description: String,
    pub hosted_invoice_url: Option<String>,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub invoice_id: String,
    pub customer_id: String,
    pub amount: Cents,
    pub currency: String,
    pub description: String,
    pub hosted_invoice_url: Option<String>,
    pub status: InvoiceStatus,
}

//--------------------------------------     ActivityEntry     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityEntry {
    pub id: i64,
    #[sqlx(try_from = "String")]
    pub event_type: ActivityType,
    pub description: String,
    pub related_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub event_type: ActivityType,
    pub description: String,
    pub related_id: Option<String>,
}

impl NewActivity {
    pub fn new<S: Into<String>>(event_type: ActivityType, description: S) -> Self {
        Self { event_type, description: description.into(), related_id: None }
    }

    pub fn with_related_id<S: ToString>(mut self, related_id: S) -> Self {
        self.related_id = Some(related_id.to_string());
        self
    }
}

//--------------------------------------     ProcessedEvent    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessedEvent {
    pub event_id: String,
    pub event_type: String,
    pub outcome: EventOutcome,
    pub processed_at: DateTime<Utc>,
}
