use billing_engine::{traits::PaymentProcessor, ReconciliationApi, SqliteDatabase};
use chrono::Duration;
use log::*;
use tokio::task::JoinHandle;

const PURGE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);

/// Starts the processed-event retention worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Guard records older than `retention` are removed once an hour. The engine never purges records that are still
/// inside the processor's redelivery window, whatever `retention` says.
pub fn start_retention_worker<P>(api: ReconciliationApi<SqliteDatabase, P>, retention: Duration) -> JoinHandle<()>
where
    P: PaymentProcessor + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(PURGE_INTERVAL);
        info!("🕰️ Processed-event retention worker started. Records are kept for {} days", retention.num_days());
        loop {
            timer.tick().await;
            debug!("🕰️ Purging processed events older than {} days", retention.num_days());
            match api.purge_processed_events(retention).await {
                Ok(0) => trace!("🕰️ No processed events were old enough to purge"),
                Ok(n) => info!("🕰️ {n} processed event records purged"),
                Err(e) => error!("🕰️ Error running processed-event retention job: {e}"),
            }
        }
    })
}
