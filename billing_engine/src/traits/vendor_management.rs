use crate::{
    db_types::{NewVendor, SubscriptionStatus, Vendor},
    traits::BillingDatabaseError,
};

/// Local vendor records. Vendors are never deleted.
///
/// Every method that returns a [`Vendor`] populates its `customers` list.
#[allow(async_fn_in_trait)]
pub trait VendorManagement {
    /// Creates a vendor. Fails with [`BillingDatabaseError::VendorAlreadyExists`] if the username (or the processor
    /// customer id) is taken.
    async fn insert_vendor(&self, vendor: NewVendor) -> Result<Vendor, BillingDatabaseError>;

    async fn fetch_vendor_by_username(&self, username: &str) -> Result<Option<Vendor>, BillingDatabaseError>;

    /// Looks a vendor up by the processor customer that bills it.
    async fn fetch_vendor_by_customer_id(&self, customer_id: &str) -> Result<Option<Vendor>, BillingDatabaseError>;

    async fn fetch_vendors(&self) -> Result<Vec<Vendor>, BillingDatabaseError>;

    async fn approve_vendor(&self, username: &str) -> Result<Vendor, BillingDatabaseError>;

    /// Associates one of the vendor's own clients with the vendor. Returns `false` if the association already existed.
    async fn add_vendor_customer(&self, vendor_id: i64, customer_id: &str) -> Result<bool, BillingDatabaseError>;

    /// Writes a provisional subscription status after a forward action. The processor's next event overwrites it.
    async fn set_subscription_status(
        &self,
        vendor_id: i64,
        status: SubscriptionStatus,
    ) -> Result<Vendor, BillingDatabaseError>;

    async fn set_payout_account(&self, vendor_id: i64, account_id: &str) -> Result<Vendor, BillingDatabaseError>;
}
