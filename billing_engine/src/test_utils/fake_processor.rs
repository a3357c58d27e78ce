//! An in-memory stand-in for the payment processor.
//!
//! Ids are handed out sequentially per object type (`cus_1`, `cus_2`, `in_1`, ...), every call is recorded, and
//! individual calls can be made to fail.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::{DateTime, Utc};

use crate::{
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

#[derive(Default)]
struct FakeState {
    counters: HashMap<&'static str, u64>,
    customers: HashMap<String, ProcessorCustomer>,
    pending_items: HashMap<String, Cents>,
    invoices: HashMap<String, ProcessorInvoice>,
    subscriptions: Vec<ProcessorSubscription>,
    refunds: Vec<(String, String)>,
    calls: Vec<String>,
    failures: HashMap<&'static str, ProcessorError>,
    refund_delay: Option<Duration>,
    payment_delay: Option<Duration>,
}

impl FakeState {
    fn next_id(&mut self, prefix: &'static str) -> String {
        let n = self.counters.entry(prefix).or_insert(0);
        *n += 1;
        format!("{prefix}_{n}")
    }

    fn call(&mut self, name: &'static str) -> Result<(), ProcessorError> {
        self.calls.push(name.to_string());
        match self.failures.get(name) {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeProcessor {
    state: Arc<Mutex<FakeState>>,
}

impl FakeProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Makes every subsequent call to `method` (e.g. `"finalize_invoice"`) fail with `error`.
    pub fn fail(&self, method: &'static str, error: ProcessorError) {
        self.state().failures.insert(method, error);
    }

    pub fn heal(&self, method: &'static str) {
        self.state().failures.remove(method);
    }

    /// Each refund call sleeps this long before answering.
    pub fn delay_refunds(&self, delay: Duration) {
        self.state().refund_delay = Some(delay);
    }

    /// Each invoice payment call sleeps this long before answering. A configured failure is reported after the delay,
    /// like a charge whose response is lost on the way back.
    pub fn delay_payments(&self, delay: Duration) {
        self.state().payment_delay = Some(delay);
    }

    /// Registers a customer as if it had been created through the processor's dashboard.
    pub fn add_customer(&self, name: &str) -> String {
        let mut state = self.state();
        let id = state.next_id("cus");
        let customer = ProcessorCustomer { id: id.clone(), name: Some(name.to_string()), deleted: false };
        state.customers.insert(id.clone(), customer);
        id
    }

    pub fn delete_customer(&self, customer_id: &str) {
        if let Some(c) = self.state().customers.get_mut(customer_id) {
            c.deleted = true;
        }
    }

    /// The name of every method called, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state().calls.iter().filter(|c| *c == method).count()
    }

    /// `(charge id, idempotency key)` for every refund call, including failed ones.
    pub fn refund_calls(&self) -> Vec<(String, String)> {
        self.state().refunds.clone()
    }

    pub fn subscriptions(&self) -> Vec<ProcessorSubscription> {
        self.state().subscriptions.clone()
    }
}

impl PaymentProcessor for FakeProcessor {
    /// Vendors' own customer records are numbered separately (`cus_vendor_1`, ...) from their clients (`cus_1`, ...).
    async fn create_customer(&self, name: &str) -> Result<ProcessorCustomer, ProcessorError> {
        let mut state = self.state();
        state.call("create_customer")?;
        let id = state.next_id("cus_vendor");
        let customer = ProcessorCustomer { id: id.clone(), name: Some(name.to_string()), deleted: false };
        state.customers.insert(id, customer.clone());
        Ok(customer)
    }

    async fn retrieve_customer(&self, customer_id: &str) -> Result<ProcessorCustomer, ProcessorError> {
        let mut state = self.state();
        state.call("retrieve_customer")?;
        state.customers.get(customer_id).cloned().ok_or_else(|| ProcessorError::NotFound(customer_id.to_string()))
    }

    async fn create_invoice_item(
        &self,
        customer_id: &str,
        amount: Cents,
        _description: &str,
    ) -> Result<String, ProcessorError> {
        let mut state = self.state();
        state.call("create_invoice_item")?;
        if !state.customers.contains_key(customer_id) {
            return Err(ProcessorError::NotFound(customer_id.to_string()));
        }
        let total = state.pending_items.entry(customer_id.to_string()).or_default();
        *total = Cents::from(total.value() + amount.value());
        Ok(state.next_id("ii"))
    }

    async fn create_invoice(&self, customer_id: &str, _description: &str) -> Result<ProcessorInvoice, ProcessorError> {
        let mut state = self.state();
        state.call("create_invoice")?;
        let amount_due = state.pending_items.remove(customer_id).unwrap_or_default();
        let id = state.next_id("in");
        let invoice = ProcessorInvoice {
            id: id.clone(),
            customer_id: customer_id.to_string(),
            status: "draft".into(),
            amount_due,
            currency: "usd".into(),
            hosted_invoice_url: None,
        };
        state.invoices.insert(id, invoice.clone());
        Ok(invoice)
    }

    async fn finalize_invoice(&self, invoice_id: &str) -> Result<ProcessorInvoice, ProcessorError> {
        let mut state = self.state();
        state.call("finalize_invoice")?;
        let invoice = state.invoices.get_mut(invoice_id).ok_or_else(|| ProcessorError::NotFound(invoice_id.into()))?;
        invoice.status = "open".into();
        invoice.hosted_invoice_url = Some(format!("https://invoice.example.com/{invoice_id}"));
        Ok(invoice.clone())
    }

    async fn pay_invoice(&self, invoice_id: &str) -> Result<ProcessorInvoice, ProcessorError> {
        let (result, delay) = {
            let mut state = self.state();
            (state.call("pay_invoice"), state.payment_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result?;
        let mut state = self.state();
        let invoice = state.invoices.get_mut(invoice_id).ok_or_else(|| ProcessorError::NotFound(invoice_id.into()))?;
        invoice.status = "paid".into();
        Ok(invoice.clone())
    }

    async fn list_subscriptions(&self, customer_id: &str) -> Result<Vec<ProcessorSubscription>, ProcessorError> {
        let mut state = self.state();
        state.call("list_subscriptions")?;
        Ok(state.subscriptions.iter().filter(|s| s.customer_id == customer_id).cloned().collect())
    }

    async fn create_subscription(
        &self,
        customer_id: &str,
        _price_id: &str,
        trial_end: Option<DateTime<Utc>>,
    ) -> Result<ProcessorSubscription, ProcessorError> {
        let mut state = self.state();
        state.call("create_subscription")?;
        let status = if trial_end.is_some() { SubscriptionStatus::Trialing } else { SubscriptionStatus::Active };
        let sub = ProcessorSubscription {
            id: state.next_id("sub"),
            customer_id: customer_id.to_string(),
            status,
            cancel_at_period_end: false,
            current_period_end: None,
            trial_end,
        };
        state.subscriptions.push(sub.clone());
        Ok(sub)
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<ProcessorSubscription, ProcessorError> {
        let mut state = self.state();
        state.call("cancel_subscription")?;
        let sub = state
            .subscriptions
            .iter_mut()
            .find(|s| s.id == subscription_id)
            .ok_or_else(|| ProcessorError::NotFound(subscription_id.to_string()))?;
        sub.status = SubscriptionStatus::Canceled;
        Ok(sub.clone())
    }

    async fn create_payout(&self, _account_id: &str, amount: Cents) -> Result<ProcessorPayout, ProcessorError> {
        let mut state = self.state();
        state.call("create_payout")?;
        Ok(ProcessorPayout { id: state.next_id("po"), amount, status: "pending".into(), arrival_date: None })
    }

    async fn refund_charge(&self, charge_id: &str, idempotency_key: &str) -> Result<ProcessorRefund, ProcessorError> {
        let delay = {
            let mut state = self.state();
            state.refunds.push((charge_id.to_string(), idempotency_key.to_string()));
            state.call("refund_charge")?;
            state.refund_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state();
        Ok(ProcessorRefund {
            id: state.next_id("re"),
            charge_id: charge_id.to_string(),
            amount: Cents::default(),
            status: "succeeded".into(),
        })
    }

    async fn attach_payment_method(&self, _payment_method_id: &str, customer_id: &str) -> Result<(), ProcessorError> {
        let mut state = self.state();
        state.call("attach_payment_method")?;
        if state.customers.contains_key(customer_id) {
            Ok(())
        } else {
            Err(ProcessorError::NotFound(customer_id.to_string()))
        }
    }

    async fn set_default_payment_method(
        &self,
        _customer_id: &str,
        _payment_method_id: &str,
    ) -> Result<(), ProcessorError> {
        self.state().call("set_default_payment_method")
    }
}
