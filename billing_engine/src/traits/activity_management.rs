use crate::{
    db_types::{ActivityEntry, ActivityType, NewActivity},
    traits::BillingDatabaseError,
};

/// The append-only activity ledger. Entries are never updated or deleted.
#[allow(async_fn_in_trait)]
pub trait ActivityManagement {
    async fn insert_activity(&self, entry: NewActivity) -> Result<ActivityEntry, BillingDatabaseError>;

    /// The most recent `limit` entries, newest first.
    async fn fetch_activity(&self, limit: i64) -> Result<Vec<ActivityEntry>, BillingDatabaseError>;

    /// Whether an entry of `event_type` that refers to `related_id` has been recorded.
    async fn has_activity(&self, event_type: &ActivityType, related_id: &str) -> Result<bool, BillingDatabaseError>;

    async fn fetch_activity_by_type(&self, event_type: &ActivityType)
        -> Result<Vec<ActivityEntry>, BillingDatabaseError>;
}
