use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    billing_api::{
        errors::{ProcessorStep, VendorApiError},
        ledger::ActivityLedger,
        vendor_objects::InvoiceRequest,
    },
    db_types::{ActivityType, Cents, Invoice, InvoiceStatus, NewInvoice, NewVendor, SubscriptionStatus, Vendor},
    helpers::{hash_password, verify_password},
    traits::{
        ActivityManagement,
        InvoiceManagement,
        PaymentProcessor,
        ProcessorPayout,
        ProcessorSubscription,
        VendorManagement,
    },
};

pub const DEFAULT_TRIAL_DAYS: i64 = 14;
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// `VendorApi` originates the forward actions of the billing system: registering vendors, billing their customers
/// and managing their subscriptions and payouts.
///
/// Local writes made here are provisional where the processor has the final word. The processor confirms or
/// contradicts them later through webhook events, which are handled by
/// [`crate::billing_api::reconciliation_api::ReconciliationApi`].
pub struct VendorApi<B, P> {
    db: B,
    processor: P,
    ledger: ActivityLedger<B>,
    trial_period: Duration,
}

impl<B, P> Debug for VendorApi<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VendorApi")
    }
}

impl<B: Clone, P> VendorApi<B, P> {
    pub fn new(db: B, processor: P) -> Self {
        let ledger = ActivityLedger::new(db.clone());
        Self { db, processor, ledger, trial_period: Duration::days(DEFAULT_TRIAL_DAYS) }
    }

    pub fn with_trial_period(mut self, trial_period: Duration) -> Self {
        self.trial_period = trial_period;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B, P> VendorApi<B, P>
where
    B: VendorManagement + InvoiceManagement + ActivityManagement,
    P: PaymentProcessor,
{
    /// Registers a new vendor.
    ///
    /// A processor customer is created first, so that every vendor row carries a processor customer id from the moment
    /// it exists. The trial period starts now.
    pub async fn register_vendor(&self, username: &str, password: &str) -> Result<Vendor, VendorApiError> {
        validate_username(username)?;
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(VendorApiError::InvalidInput(format!(
                "Passwords must be at least {MIN_PASSWORD_LENGTH} characters long"
            )));
        }
        if self.db.fetch_vendor_by_username(username).await?.is_some() {
            return Err(VendorApiError::Conflict(format!("Vendor {username} already exists")));
        }
        let password_hash = hash_password(password)?;
        let customer = self
            .processor
            .create_customer(username)
            .await
            .map_err(VendorApiError::upstream(ProcessorStep::CreateCustomer))?;
        debug!("🧑️ Processor customer {} created for vendor {username}", customer.id);
        let vendor = NewVendor {
            username: username.to_string(),
            password_hash,
            stripe_customer_id: customer.id,
            trial_expires_at: Utc::now() + self.trial_period,
        };
        let vendor = self.db.insert_vendor(vendor).await?;
        info!("🧑️ Vendor {} registered (customer {})", vendor.username, vendor.stripe_customer_id);
        let desc = format!("Vendor {} registered with customer {}", vendor.username, vendor.stripe_customer_id);
        self.ledger.record(ActivityType::VendorRegistered, desc, Some(vendor.id.to_string())).await;
        Ok(vendor)
    }

    /// Checks a vendor's credentials. Unknown usernames and wrong passwords are indistinguishable to the caller.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Vendor, VendorApiError> {
        let vendor = self.db.fetch_vendor_by_username(username).await?.ok_or(VendorApiError::Unauthorized)?;
        if verify_password(password, &vendor.password_hash)? {
            Ok(vendor)
        } else {
            debug!("🧑️ Wrong password for vendor {username}");
            Err(VendorApiError::Unauthorized)
        }
    }

    pub async fn approve_vendor(&self, username: &str) -> Result<Vendor, VendorApiError> {
        let vendor = self.db.approve_vendor(username).await?;
        info!("🧑️ Vendor {username} approved");
        let desc = format!("Vendor {username} approved");
        self.ledger.record(ActivityType::VendorApproved, desc, Some(vendor.id.to_string())).await;
        Ok(vendor)
    }

    pub async fn fetch_vendors(&self) -> Result<Vec<Vendor>, VendorApiError> {
        let vendors = self.db.fetch_vendors().await?;
        Ok(vendors)
    }

    /// Associates one of the vendor's own clients with the vendor. The customer must exist at the processor.
    pub async fn add_customer(&self, vendor: &Vendor, customer_id: &str) -> Result<Vendor, VendorApiError> {
        if customer_id.trim().is_empty() {
            return Err(VendorApiError::InvalidInput("A customer id is required".into()));
        }
        let customer = self
            .processor
            .retrieve_customer(customer_id)
            .await
            .map_err(VendorApiError::upstream(ProcessorStep::RetrieveCustomer))?;
        if customer.deleted {
            return Err(VendorApiError::NotFound(format!("Customer {customer_id} has been deleted")));
        }
        if self.db.add_vendor_customer(vendor.id, customer_id).await? {
            debug!("🧑️ Customer {customer_id} associated with vendor {}", vendor.username);
        }
        self.refetch(vendor).await
    }

    /// Bills one of the vendor's customers.
    ///
    /// The processor pipeline is: create invoice item -> retrieve customer -> create invoice -> finalize invoice ->
    /// (optionally) pay invoice. A failure up to finalization is reported with the step's name and nothing is written
    /// locally. The finalized invoice is stored as `open` before any payment is attempted. A failed payment is not
    /// fatal: the invoice stays `open` and the processor's `invoice.payment_succeeded` event will move it to `paid`
    /// later if the customer pays.
    pub async fn create_invoice(&self, vendor: &Vendor, request: InvoiceRequest) -> Result<Invoice, VendorApiError> {
        require_approved(vendor)?;
        if !request.amount.is_positive() {
            return Err(VendorApiError::InvalidInput("Invoice amounts must be positive".into()));
        }
        if !vendor.has_customer(&request.customer_id) {
            return Err(VendorApiError::NotFound(format!(
                "Customer {} is not one of {}'s customers",
                request.customer_id, vendor.username
            )));
        }
        let customer_id = request.customer_id.as_str();
        let item = self
            .processor
            .create_invoice_item(customer_id, request.amount, &request.description)
            .await
            .map_err(VendorApiError::upstream(ProcessorStep::CreateInvoiceItem))?;
        trace!("🧾️ Invoice item {item} created for {customer_id}");
        let customer = self
            .processor
            .retrieve_customer(customer_id)
            .await
            .map_err(VendorApiError::upstream(ProcessorStep::RetrieveCustomer))?;
        if customer.deleted {
            return Err(VendorApiError::NotFound(format!("Customer {customer_id} has been deleted")));
        }
        let draft = self
            .processor
            .create_invoice(customer_id, &request.description)
            .await
            .map_err(VendorApiError::upstream(ProcessorStep::CreateInvoice))?;
        let remote = self
            .processor
            .finalize_invoice(&draft.id)
            .await
            .map_err(VendorApiError::upstream(ProcessorStep::FinalizeInvoice))?;
        let invoice = NewInvoice {
            invoice_id: remote.id,
            customer_id: customer_id.to_string(),
            amount: request.amount,
            currency: remote.currency,
            description: request.description,
            hosted_invoice_url: remote.hosted_invoice_url,
            status: local_invoice_status(&remote.status),
        };
        let mut invoice = self.db.insert_invoice(invoice).await?;
        if request.auto_charge {
            invoice = self.charge_invoice(invoice).await?;
        }
        let status = invoice.status;
        info!("🧾️ Invoice {} for {} created by {} ({status})", invoice.invoice_id, invoice.amount, vendor.username);
        let desc = format!(
            "Invoice {} for {} issued by {} to {} ({status})",
            invoice.invoice_id, invoice.amount, vendor.username, invoice.customer_id
        );
        self.ledger.record(ActivityType::InvoiceCreated, desc, Some(invoice.id.to_string())).await;
        Ok(invoice)
    }

    /// Attempts payment of a stored, finalized invoice. The row exists before the charge is attempted, so an
    /// `invoice.payment_succeeded` event that beats the processor's response always finds it.
    async fn charge_invoice(&self, invoice: Invoice) -> Result<Invoice, VendorApiError> {
        let invoice_id = invoice.invoice_id.clone();
        match self.processor.pay_invoice(&invoice_id).await {
            Ok(paid) if local_invoice_status(&paid.status) == InvoiceStatus::Paid => {
                Ok(self.db.update_invoice_status(&invoice_id, InvoiceStatus::Paid).await?)
            },
            Ok(other) => {
                debug!("🧾️ Invoice {invoice_id} is {} after payment was attempted. It stays open.", other.status);
                Ok(invoice)
            },
            Err(e) => {
                warn!("🧾️ Automatic payment of invoice {invoice_id} failed: {e}. It stays open.");
                let current = self.db.fetch_invoice_by_invoice_id(&invoice_id).await?;
                Ok(current.unwrap_or(invoice))
            },
        }
    }

    /// Invoices billed to any of the vendor's customers, newest first.
    pub async fn fetch_invoices(&self, vendor: &Vendor) -> Result<Vec<Invoice>, VendorApiError> {
        let invoices = self.db.fetch_invoices_for_customers(&vendor.customers).await?;
        Ok(invoices)
    }

    /// Subscribes the vendor to a plan. Any remaining trial period carries over to the subscription.
    pub async fn subscribe(&self, vendor: &Vendor, price_id: &str) -> Result<ProcessorSubscription, VendorApiError> {
        require_approved(vendor)?;
        if price_id.trim().is_empty() {
            return Err(VendorApiError::InvalidInput("A price id is required".into()));
        }
        let trial_end = Some(vendor.trial_expires_at).filter(|t| *t > Utc::now());
        let subscription = self
            .processor
            .create_subscription(&vendor.stripe_customer_id, price_id, trial_end)
            .await
            .map_err(VendorApiError::upstream(ProcessorStep::CreateSubscription))?;
        self.db.set_subscription_status(vendor.id, subscription.status).await?;
        info!("🧑️ Vendor {} subscribed to {price_id} ({})", vendor.username, subscription.status);
        let desc = format!("Vendor {} subscribed to {price_id} ({})", vendor.username, subscription.id);
        self.ledger.record(ActivityType::SubscriptionCreated, desc, Some(vendor.id.to_string())).await;
        Ok(subscription)
    }

    /// Cancels every live subscription of the vendor.
    pub async fn cancel_subscription(&self, vendor: &Vendor) -> Result<Vec<ProcessorSubscription>, VendorApiError> {
        let live = self
            .list_subscriptions(vendor)
            .await?
            .into_iter()
            .filter(|s| s.status.is_live())
            .collect::<Vec<_>>();
        if live.is_empty() {
            return Err(VendorApiError::NotFound(format!("Vendor {} has no active subscription", vendor.username)));
        }
        let mut cancelled = Vec::with_capacity(live.len());
        for sub in live {
            let sub = self
                .processor
                .cancel_subscription(&sub.id)
                .await
                .map_err(VendorApiError::upstream(ProcessorStep::CancelSubscription))?;
            cancelled.push(sub);
        }
        self.db.set_subscription_status(vendor.id, SubscriptionStatus::Canceled).await?;
        let ids = cancelled.iter().map(|s| s.id.as_str()).collect::<Vec<_>>().join(", ");
        info!("🧑️ Vendor {} cancelled subscriptions {ids}", vendor.username);
        let desc = format!("Vendor {} cancelled subscriptions {ids}", vendor.username);
        self.ledger.record(ActivityType::SubscriptionCancelled, desc, Some(vendor.id.to_string())).await;
        Ok(cancelled)
    }

    pub async fn list_subscriptions(&self, vendor: &Vendor) -> Result<Vec<ProcessorSubscription>, VendorApiError> {
        self.processor
            .list_subscriptions(&vendor.stripe_customer_id)
            .await
            .map_err(VendorApiError::upstream(ProcessorStep::ListSubscriptions))
    }

    /// Attaches a payment method to the vendor's customer and makes it the default for invoices.
    pub async fn update_payment_method(&self, vendor: &Vendor, payment_method_id: &str) -> Result<(), VendorApiError> {
        if payment_method_id.trim().is_empty() {
            return Err(VendorApiError::InvalidInput("A payment method id is required".into()));
        }
        let customer_id = vendor.stripe_customer_id.as_str();
        self.processor
            .attach_payment_method(payment_method_id, customer_id)
            .await
            .map_err(VendorApiError::upstream(ProcessorStep::AttachPaymentMethod))?;
        self.processor
            .set_default_payment_method(customer_id, payment_method_id)
            .await
            .map_err(VendorApiError::upstream(ProcessorStep::SetDefaultPaymentMethod))?;
        let desc = format!("Vendor {} set default payment method {payment_method_id}", vendor.username);
        self.ledger.record(ActivityType::PaymentMethodUpdated, desc, Some(vendor.id.to_string())).await;
        Ok(())
    }

    pub async fn set_payout_account(&self, vendor: &Vendor, account_id: &str) -> Result<Vendor, VendorApiError> {
        if account_id.trim().is_empty() {
            return Err(VendorApiError::InvalidInput("A payout account id is required".into()));
        }
        let vendor = self.db.set_payout_account(vendor.id, account_id).await?;
        debug!("🧑️ Vendor {} payout account set to {account_id}", vendor.username);
        Ok(vendor)
    }

    /// Pays `amount` out to the vendor's payout account. The processor reports the result with `payout.paid` or
    /// `payout.failed`.
    pub async fn create_payout(&self, vendor: &Vendor, amount: Cents) -> Result<ProcessorPayout, VendorApiError> {
        require_approved(vendor)?;
        if !amount.is_positive() {
            return Err(VendorApiError::InvalidInput("Payout amounts must be positive".into()));
        }
        let account = vendor
            .payout_account_id
            .as_deref()
            .ok_or_else(|| VendorApiError::Conflict(format!("Vendor {} has no payout account", vendor.username)))?;
        let payout = self
            .processor
            .create_payout(account, amount)
            .await
            .map_err(VendorApiError::upstream(ProcessorStep::CreatePayout))?;
        info!("🧑️ Payout {} of {amount} created for vendor {}", payout.id, vendor.username);
        let desc = format!("Payout {} of {amount} to {account} requested by {}", payout.id, vendor.username);
        self.ledger.record(ActivityType::PayoutCreated, desc, Some(payout.id.clone())).await;
        Ok(payout)
    }

    async fn refetch(&self, vendor: &Vendor) -> Result<Vendor, VendorApiError> {
        self.db
            .fetch_vendor_by_username(&vendor.username)
            .await?
            .ok_or_else(|| VendorApiError::NotFound(format!("Vendor {} does not exist", vendor.username)))
    }
}

fn require_approved(vendor: &Vendor) -> Result<(), VendorApiError> {
    if vendor.approved {
        Ok(())
    } else {
        Err(VendorApiError::NotApproved(vendor.username.clone()))
    }
}

fn validate_username(username: &str) -> Result<(), VendorApiError> {
    let valid = !username.is_empty() &&
        username.len() <= 64 &&
        username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(VendorApiError::InvalidInput(
            "Usernames must be 1-64 characters of letters, digits, '.', '_' or '-'".into(),
        ))
    }
}

/// Maps the processor's invoice status onto the local one. A finalized invoice that is not paid is open.
fn local_invoice_status(remote: &str) -> InvoiceStatus {
    remote.parse().unwrap_or(InvoiceStatus::Open)
}
