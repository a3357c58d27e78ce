use log::*;

use crate::{
    db_types::{ActivityEntry, ActivityType, NewActivity},
    traits::{ActivityManagement, BillingDatabaseError},
};

/// Log target for operational failures that are swallowed rather than reported to a caller.
pub const OPS_LOG_TARGET: &str = "vb::ops";

/// The activity ledger: an append-only audit trail of everything the billing engine did.
///
/// Writing to the ledger never fails the caller. A failed write is logged on [`OPS_LOG_TARGET`] and dropped.
#[derive(Clone)]
pub struct ActivityLedger<B> {
    db: B,
}

impl<B> ActivityLedger<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ActivityLedger<B>
where B: ActivityManagement
{
    pub async fn record<S: Into<String>>(
        &self,
        event_type: ActivityType,
        description: S,
        related_id: Option<String>,
    ) -> Option<ActivityEntry> {
        let entry = NewActivity { event_type: event_type.clone(), description: description.into(), related_id };
        match self.db.insert_activity(entry).await {
            Ok(entry) => {
                trace!("📒️ Recorded {} activity #{}", entry.event_type, entry.id);
                Some(entry)
            },
            Err(e) => {
                error!(target: OPS_LOG_TARGET, "📒️ Could not record {event_type} activity: {e}");
                None
            },
        }
    }

    /// Like [`Self::record`], but writes nothing if an entry of the same type already refers to `related_id`. If that
    /// cannot be checked, the entry is written anyway.
    pub async fn record_once<S: Into<String>>(
        &self,
        event_type: ActivityType,
        description: S,
        related_id: String,
    ) -> Option<ActivityEntry> {
        match self.db.has_activity(&event_type, &related_id).await {
            Ok(true) => {
                debug!("📒️ {event_type} activity for {related_id} is already recorded");
                None
            },
            Ok(false) => self.record(event_type, description, Some(related_id)).await,
            Err(e) => {
                warn!(target: OPS_LOG_TARGET, "📒️ Could not check for earlier {event_type} activity: {e}");
                self.record(event_type, description, Some(related_id)).await
            },
        }
    }

    /// The most recent `limit` entries, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<ActivityEntry>, BillingDatabaseError> {
        self.db.fetch_activity(limit).await
    }

    pub async fn entries_of_type(&self, event_type: &ActivityType) -> Result<Vec<ActivityEntry>, BillingDatabaseError> {
        self.db.fetch_activity_by_type(event_type).await
    }
}
