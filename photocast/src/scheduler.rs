use std::{sync::Arc, time::Duration};

use tokio::time::{Instant, MissedTickBehavior};

use crate::distributor::Distributor;

/// Run distribution cycles forever: first after `first_delay`, then every `period`.
/// A cycle that overruns the period delays the next tick instead of bursting.
pub async fn run_schedule(distributor: Arc<Distributor>, first_delay: Duration, period: Duration) {
    log::info!(
        "Scheduling distribution from folder {} every {:?}, first run in {:?}",
        distributor.options().folder,
        period,
        first_delay
    );
    let mut ticks = tokio::time::interval_at(Instant::now() + first_delay, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticks.tick().await;
        log::info!("Starting scheduled distribution cycle");
        let report = distributor.run_cycle().await;
        if report.aborted.is_some() {
            log::warn!("Scheduled distribution cycle aborted");
        }
    }
}

/// Spawn [`run_schedule`] on the runtime
pub fn spawn_schedule(
    distributor: Arc<Distributor>,
    first_delay: Duration,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run_schedule(distributor, first_delay, period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::in_memory_distributor;

    #[tokio::test(start_paused = true)]
    async fn test_schedule_runs_after_first_delay_and_then_periodically() {
        let (storage, distributor) = in_memory_distributor();
        storage
            .clone()
            .recipient_registry()
            .add_channel("@alpha_channel".parse().unwrap())
            .await
            .unwrap();
        let blobs = storage.as_blob_storage();
        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            blobs
                .upload_image("images", name, name.as_bytes().to_vec())
                .await
                .unwrap();
        }

        let handle = spawn_schedule(distributor, Duration::from_secs(10), Duration::from_secs(60));

        // With a single channel every delivered image is complete and purged
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(blobs.list_images("images").await.unwrap().len(), 3);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(blobs.list_images("images").await.unwrap().len(), 2);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(blobs.list_images("images").await.unwrap().len(), 1);

        handle.abort();
    }
}
