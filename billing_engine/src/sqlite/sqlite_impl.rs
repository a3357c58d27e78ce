//! `SqliteDatabase` is the concrete storage backend of the billing engine.
//!
//! It uses SQLite and implements all the traits defined in the [`crate::traits`] module. Composite operations are
//! assembled from the low-level functions in [`super::db`] inside a single transaction.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{activity, db_url, invoices, new_pool, processed_events, vendors};
use crate::{
    db_types::{
        ActivityEntry,
        ActivityType,
        EventOutcome,
        Invoice,
        InvoiceStatus,
        NewActivity,
        NewInvoice,
        NewVendor,
        ProcessedEvent,
        SubscriptionStatus,
        Vendor,
    },
    traits::{
        ActivityManagement,
        ApplyOutcome,
        BillingDatabase,
        BillingDatabaseError,
        InvoiceManagement,
        ReconciliationStore,
        VendorManagement,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `VB_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn run_migrations(&self) -> Result<(), BillingDatabaseError> {
        migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| BillingDatabaseError::DatabaseError(e.to_string()))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl BillingDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), BillingDatabaseError> {
        self.pool.close().await;
        Ok(())
    }
}

impl VendorManagement for SqliteDatabase {
    async fn insert_vendor(&self, vendor: NewVendor) -> Result<Vendor, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        vendors::insert_vendor(vendor, &mut conn).await
    }

    async fn fetch_vendor_by_username(&self, username: &str) -> Result<Option<Vendor>, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let vendor = vendors::fetch_vendor_by_username(username, &mut conn).await?;
        Ok(vendor)
    }

    async fn fetch_vendor_by_customer_id(&self, customer_id: &str) -> Result<Option<Vendor>, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let vendor = vendors::fetch_vendor_by_customer_id(customer_id, &mut conn).await?;
        Ok(vendor)
    }

    async fn fetch_vendors(&self) -> Result<Vec<Vendor>, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let vendors = vendors::fetch_vendors(&mut conn).await?;
        Ok(vendors)
    }

    async fn approve_vendor(&self, username: &str) -> Result<Vendor, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        vendors::approve_vendor(username, &mut conn)
            .await?
            .ok_or_else(|| BillingDatabaseError::VendorNotFound(username.to_string()))
    }

    async fn add_vendor_customer(&self, vendor_id: i64, customer_id: &str) -> Result<bool, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let added = vendors::add_customer(vendor_id, customer_id, &mut conn).await?;
        Ok(added)
    }

    async fn set_subscription_status(
        &self,
        vendor_id: i64,
        status: SubscriptionStatus,
    ) -> Result<Vendor, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        vendors::update_subscription_status(vendor_id, status, &mut conn)
            .await?
            .ok_or_else(|| BillingDatabaseError::VendorNotFound(format!("#{vendor_id}")))
    }

    async fn set_payout_account(&self, vendor_id: i64, account_id: &str) -> Result<Vendor, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        vendors::update_payout_account(vendor_id, account_id, &mut conn)
            .await?
            .ok_or_else(|| BillingDatabaseError::VendorNotFound(format!("#{vendor_id}")))
    }
}

impl InvoiceManagement for SqliteDatabase {
    async fn insert_invoice(&self, invoice: NewInvoice) -> Result<Invoice, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        invoices::insert_invoice(invoice, &mut conn).await
    }

    async fn update_invoice_status(
        &self,
        invoice_id: &str,
        status: InvoiceStatus,
    ) -> Result<Invoice, BillingDatabaseError> {
        let mut tx = self.pool.begin().await?;
        let invoice = invoices::fetch_invoice_by_invoice_id(invoice_id, &mut tx)
            .await?
            .ok_or_else(|| BillingDatabaseError::InvoiceNotFound(invoice_id.to_string()))?;
        let updated = invoices::update_invoice_status(invoice.id, status, &mut tx).await?;
        tx.commit().await?;
        trace!("🗃️ Invoice {invoice_id} status {} -> {status}", invoice.status);
        Ok(updated)
    }

    async fn fetch_invoice_by_invoice_id(&self, invoice_id: &str) -> Result<Option<Invoice>, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let invoice = invoices::fetch_invoice_by_invoice_id(invoice_id, &mut conn).await?;
        Ok(invoice)
    }

    async fn fetch_invoices_for_customers(
        &self,
        customer_ids: &[String],
    ) -> Result<Vec<Invoice>, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let invoices = invoices::fetch_invoices_for_customers(customer_ids, &mut conn).await?;
        Ok(invoices)
    }
}

impl ActivityManagement for SqliteDatabase {
    async fn insert_activity(&self, entry: NewActivity) -> Result<ActivityEntry, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let entry = activity::insert_activity(entry, &mut conn).await?;
        Ok(entry)
    }

    async fn fetch_activity(&self, limit: i64) -> Result<Vec<ActivityEntry>, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let entries = activity::fetch_activity(limit, &mut conn).await?;
        Ok(entries)
    }

    async fn has_activity(&self, event_type: &ActivityType, related_id: &str) -> Result<bool, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let exists = activity::activity_exists(event_type, related_id, &mut conn).await?;
        Ok(exists)
    }

    async fn fetch_activity_by_type(
        &self,
        event_type: &ActivityType,
    ) -> Result<Vec<ActivityEntry>, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let entries = activity::fetch_activity_by_type(event_type, &mut conn).await?;
        Ok(entries)
    }
}

impl ReconciliationStore for SqliteDatabase {
    /// In a single atomic transaction:
    /// * claims the guard record for the event. If it already exists, nothing further is done.
    /// * looks the vendor up by processor customer id. On a miss the guard outcome becomes `LookupMiss`.
    /// * overwrites the vendor's subscription status with the reported one.
    async fn apply_subscription_status(
        &self,
        event_id: &str,
        event_type: &str,
        customer_id: &str,
        status: SubscriptionStatus,
    ) -> Result<ApplyOutcome<Vendor>, BillingDatabaseError> {
        let mut tx = self.pool.begin().await?;
        if !processed_events::try_insert(event_id, event_type, EventOutcome::Applied, &mut tx).await? {
            debug!("🗃️ Event {event_id} has already been processed");
            return Ok(ApplyOutcome::Duplicate);
        }
        let outcome = match vendors::fetch_vendor_by_customer_id(customer_id, &mut tx).await? {
            Some(vendor) => {
                let updated = vendors::update_subscription_status(vendor.id, status, &mut tx)
                    .await?
                    .ok_or_else(|| BillingDatabaseError::VendorNotFound(vendor.username.clone()))?;
                trace!("🗃️ Vendor {} subscription status {} -> {status}", vendor.username, vendor.subscription_status);
                ApplyOutcome::Applied(updated)
            },
            None => {
                processed_events::update_outcome(event_id, EventOutcome::LookupMiss, &mut tx).await?;
                ApplyOutcome::NotFound
            },
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn apply_invoice_paid(
        &self,
        event_id: &str,
        event_type: &str,
        invoice_id: &str,
    ) -> Result<ApplyOutcome<Invoice>, BillingDatabaseError> {
        let mut tx = self.pool.begin().await?;
        if !processed_events::try_insert(event_id, event_type, EventOutcome::Applied, &mut tx).await? {
            debug!("🗃️ Event {event_id} has already been processed");
            return Ok(ApplyOutcome::Duplicate);
        }
        let outcome = match invoices::fetch_invoice_by_invoice_id(invoice_id, &mut tx).await? {
            Some(invoice) => {
                let updated = invoices::update_invoice_status(invoice.id, InvoiceStatus::Paid, &mut tx).await?;
                trace!("🗃️ Invoice {invoice_id} status {} -> paid", invoice.status);
                ApplyOutcome::Applied(updated)
            },
            None => {
                processed_events::update_outcome(event_id, EventOutcome::LookupMiss, &mut tx).await?;
                ApplyOutcome::NotFound
            },
        };
        tx.commit().await?;
        Ok(outcome)
    }

    async fn claim_event(
        &self,
        event_id: &str,
        event_type: &str,
        outcome: EventOutcome,
    ) -> Result<bool, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let claimed = processed_events::try_insert(event_id, event_type, outcome, &mut conn).await?;
        Ok(claimed)
    }

    async fn complete_event(&self, event_id: &str, outcome: EventOutcome) -> Result<(), BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        processed_events::update_outcome(event_id, outcome, &mut conn).await?;
        Ok(())
    }

    async fn fetch_processed_event(&self, event_id: &str) -> Result<Option<ProcessedEvent>, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let event = processed_events::fetch_processed_event(event_id, &mut conn).await?;
        Ok(event)
    }

    async fn purge_processed_events(&self, older_than: DateTime<Utc>) -> Result<u64, BillingDatabaseError> {
        let mut conn = self.pool.acquire().await?;
        let count = processed_events::purge_older_than(older_than, &mut conn).await?;
        if count > 0 {
            info!("🗃️ Purged {count} processed-event records older than {older_than}");
        }
        Ok(count)
    }
}
