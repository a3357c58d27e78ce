//! [`PaymentProcessor`] backed by the Stripe REST API.
use billing_engine::{
    db_types::{Cents, SubscriptionStatus},
    traits::{
        PaymentProcessor,
        ProcessorCustomer,
        ProcessorError,
        ProcessorInvoice,
        ProcessorPayout,
        ProcessorRefund,
        ProcessorSubscription,
    },
};
use chrono::{DateTime, TimeZone, Utc};
use log::*;
use stripe_tools::{
    data_objects::{Invoice, Subscription},
    StripeApi,
    StripeApiError,
    StripeConfig,
};

#[derive(Clone)]
pub struct StripeProcessor {
    api: StripeApi,
}

impl StripeProcessor {
    pub fn new(config: StripeConfig) -> Result<Self, StripeApiError> {
        let api = StripeApi::new(config)?;
        Ok(Self { api })
    }
}

impl PaymentProcessor for StripeProcessor {
    async fn create_customer(&self, name: &str) -> Result<ProcessorCustomer, ProcessorError> {
        let customer = self.api.create_customer(name, &[("vendor", name)]).await.map_err(processor_error)?;
        Ok(ProcessorCustomer { id: customer.id, name: customer.name, deleted: customer.deleted })
    }

    async fn retrieve_customer(&self, customer_id: &str) -> Result<ProcessorCustomer, ProcessorError> {
        let customer = self.api.retrieve_customer(customer_id).await.map_err(processor_error)?;
        Ok(ProcessorCustomer { id: customer.id, name: customer.name, deleted: customer.deleted })
    }

    async fn create_invoice_item(
        &self,
        customer_id: &str,
        amount: Cents,
        description: &str,
    ) -> Result<String, ProcessorError> {
        let item =
            self.api.create_invoice_item(customer_id, amount.value(), description).await.map_err(processor_error)?;
        Ok(item.id)
    }

    async fn create_invoice(&self, customer_id: &str, description: &str) -> Result<ProcessorInvoice, ProcessorError> {
        self.api.create_invoice(customer_id, description).await.map(invoice).map_err(processor_error)
    }

    async fn finalize_invoice(&self, invoice_id: &str) -> Result<ProcessorInvoice, ProcessorError> {
        self.api.finalize_invoice(invoice_id).await.map(invoice).map_err(processor_error)
    }

    async fn pay_invoice(&self, invoice_id: &str) -> Result<ProcessorInvoice, ProcessorError> {
        self.api.pay_invoice(invoice_id).await.map(invoice).map_err(processor_error)
    }

    async fn list_subscriptions(&self, customer_id: &str) -> Result<Vec<ProcessorSubscription>, ProcessorError> {
        let subs = self.api.list_subscriptions(customer_id).await.map_err(processor_error)?;
        subs.into_iter().map(subscription).collect()
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        trial_end: Option<DateTime<Utc>>,
    ) -> Result<ProcessorSubscription, ProcessorError> {
        let trial_end = trial_end.map(|t| t.timestamp());
        let sub = self.api.create_subscription(customer_id, price_id, trial_end).await.map_err(processor_error)?;
        subscription(sub)
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<ProcessorSubscription, ProcessorError> {
        let sub = self.api.cancel_subscription(subscription_id).await.map_err(processor_error)?;
        subscription(sub)
    }

    async fn create_payout(&self, account_id: &str, amount: Cents) -> Result<ProcessorPayout, ProcessorError> {
        let payout = self.api.create_payout(account_id, amount.value()).await.map_err(processor_error)?;
        Ok(ProcessorPayout {
            id: payout.id,
            amount: Cents::from(payout.amount),
            status: payout.status,
            arrival_date: payout.arrival_date.and_then(timestamp),
        })
    }

    async fn refund_charge(&self, charge_id: &str, idempotency_key: &str) -> Result<ProcessorRefund, ProcessorError> {
        let refund = self.api.create_refund(charge_id, idempotency_key).await.map_err(processor_error)?;
        Ok(ProcessorRefund {
            id: refund.id,
            charge_id: refund.charge.unwrap_or_else(|| charge_id.to_string()),
            amount: Cents::from(refund.amount),
            status: refund.status.unwrap_or_default(),
        })
    }

    async fn attach_payment_method(&self, payment_method_id: &str, customer_id: &str) -> Result<(), ProcessorError> {
        let pm = self.api.attach_payment_method(payment_method_id, customer_id).await.map_err(processor_error)?;
        trace!("💳️ Payment method {} attached to {customer_id}", pm.id);
        Ok(())
    }

    async fn set_default_payment_method(
        &self,
        customer_id: &str,
        payment_method_id: &str,
    ) -> Result<(), ProcessorError> {
        self.api.set_default_payment_method(customer_id, payment_method_id).await.map_err(processor_error)?;
        Ok(())
    }
}

pub fn processor_error(e: StripeApiError) -> ProcessorError {
    match e {
        StripeApiError::Timeout => ProcessorError::Timeout(e.to_string()),
        StripeApiError::QueryError { status: 404, message, .. } => ProcessorError::NotFound(message),
        StripeApiError::QueryError { status, message, code } => {
            let code = code.map(|c| format!(" [{c}]")).unwrap_or_default();
            ProcessorError::Rejected(format!("{status}: {message}{code}"))
        },
        e => ProcessorError::Transport(e.to_string()),
    }
}

fn invoice(value: Invoice) -> ProcessorInvoice {
    ProcessorInvoice {
        status: value.status_str().to_string(),
        id: value.id,
        customer_id: value.customer,
        amount_due: Cents::from(value.amount_due),
        currency: value.currency,
        hosted_invoice_url: value.hosted_invoice_url,
    }
}

/// A status this system does not know is reported as a rejection rather than guessed at.
fn subscription(value: Subscription) -> Result<ProcessorSubscription, ProcessorError> {
    let status = match value.status.parse::<SubscriptionStatus>() {
        Ok(status) if status != SubscriptionStatus::None => status,
        _ => {
            warn!("💳️ Subscription {} has an unrecognised status: {}", value.id, value.status);
            let msg = format!("Subscription {} has unrecognised status '{}'", value.id, value.status);
            return Err(ProcessorError::Rejected(msg));
        },
    };
    Ok(ProcessorSubscription {
        id: value.id,
        customer_id: value.customer,
        status,
        cancel_at_period_end: value.cancel_at_period_end,
        current_period_end: value.current_period_end.and_then(timestamp),
        trial_end: value.trial_end.and_then(timestamp),
    })
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
