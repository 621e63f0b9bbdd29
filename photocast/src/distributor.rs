//
// One distribution cycle:
//   1. every channel gets one image it has not seen yet, no image goes to two channels per cycle
//   2. images every current channel has seen are purged from the image storage
//   3. all subscribers get the same random image, which is purged afterwards
//

use std::{fmt, future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use teloxide::types::Recipient;
use tokio::sync::Mutex;

use crate::{
    error::{SendError, StoreError},
    messenger::MessengerTrait,
    storages::{
        BlobStorageTrait, ChannelId, DeliveryProgress, Image, ImageId, ProgressStorage,
        RecipientRegistry,
    },
};

#[derive(Debug, Clone)]
pub struct DistributionOptions {
    /// Blob storage folder holding the images to distribute
    pub folder: String,
    /// Pause after every send to stay within the platform rate limits
    pub send_delay: Duration,
    /// Upper bound for every storage and messaging call
    pub request_timeout: Duration,
    /// Maximum number of images deleted per storage request
    pub delete_batch_size: usize,
}

impl Default for DistributionOptions {
    fn default() -> Self {
        Self {
            folder: "images".to_string(),
            send_delay: Duration::from_millis(100),
            request_timeout: Duration::from_secs(30),
            delete_batch_size: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleAbort {
    /// The image storage could not be listed
    ListingFailed(String),
    /// No images are left at all
    NoImages,
    /// Recipient lists or delivery progress could not be loaded
    StateUnavailable(String),
}

impl fmt::Display for CycleAbort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleAbort::ListingFailed(e) => write!(f, "cannot list images: {}", e),
            CycleAbort::NoImages => write!(f, "all images have run out"),
            CycleAbort::StateUnavailable(e) => write!(f, "cannot load bot state: {}", e),
        }
    }
}

/// Summary of one distribution cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub aborted: Option<CycleAbort>,
    pub channel_sends: usize,
    pub channel_failures: usize,
    pub starved_channels: Vec<ChannelId>,
    pub purged: Vec<ImageId>,
    pub purge_failures: usize,
    pub subscriber_image: Option<ImageId>,
    pub subscriber_sends: usize,
    pub subscriber_failures: usize,
}

impl CycleReport {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            aborted: None,
            channel_sends: 0,
            channel_failures: 0,
            starved_channels: Vec::new(),
            purged: Vec::new(),
            purge_failures: 0,
            subscriber_image: None,
            subscriber_sends: 0,
            subscriber_failures: 0,
        }
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    fn abort(mut self, reason: CycleAbort) -> Self {
        self.aborted = Some(reason);
        self.finish()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = (self.finished_at - self.started_at).num_milliseconds();
        if let Some(reason) = &self.aborted {
            return write!(f, "Distribution cycle aborted after {} ms: {}", elapsed, reason);
        }
        writeln!(f, "Distribution cycle finished in {} ms", elapsed)?;
        writeln!(
            f,
            "Channels: {} sent, {} failed",
            self.channel_sends, self.channel_failures
        )?;
        if !self.starved_channels.is_empty() {
            let starved: Vec<&str> = self.starved_channels.iter().map(|c| c.as_str()).collect();
            writeln!(f, "Without new images: {}", starved.join(", "))?;
        }
        match &self.subscriber_image {
            Some(image) => writeln!(
                f,
                "Subscribers: image {} sent to {}, {} failed",
                image, self.subscriber_sends, self.subscriber_failures
            )?,
            None => writeln!(f, "Subscribers: nothing sent")?,
        }
        write!(
            f,
            "Purged images: {} ({} failed)",
            self.purged.len(),
            self.purge_failures
        )
    }
}

/// Images whose recorded channels cover every current channel.
/// Without channels nothing counts as delivered.
pub fn fully_delivered(progress: &DeliveryProgress, channels: &[ChannelId]) -> Vec<ImageId> {
    if channels.is_empty() {
        return Vec::new();
    }
    progress
        .images()
        .filter(|image| {
            channels
                .iter()
                .all(|channel| progress.contains(image, channel))
        })
        .cloned()
        .collect()
}

pub struct Distributor {
    registry: Arc<RecipientRegistry>,
    progress: ProgressStorage,
    blobs: Arc<dyn BlobStorageTrait>,
    messenger: Arc<dyn MessengerTrait>,
    options: DistributionOptions,
    // Held for the whole cycle: at most one cycle runs at a time
    cycle_rng: Mutex<StdRng>,
}

impl Distributor {
    pub fn new(
        registry: Arc<RecipientRegistry>,
        progress: ProgressStorage,
        blobs: Arc<dyn BlobStorageTrait>,
        messenger: Arc<dyn MessengerTrait>,
        options: DistributionOptions,
    ) -> Self {
        Self {
            registry,
            progress,
            blobs,
            messenger,
            options,
            cycle_rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the random source, used to make cycles reproducible
    #[cfg(test)]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.cycle_rng = Mutex::new(rng);
        self
    }

    pub fn options(&self) -> &DistributionOptions {
        &self.options
    }

    /// Whether a cycle is in progress right now
    pub fn is_running(&self) -> bool {
        self.cycle_rng.try_lock().is_err()
    }

    /// Run a cycle, waiting for an in-flight cycle to finish first
    pub async fn run_cycle(&self) -> CycleReport {
        let mut rng = self.cycle_rng.lock().await;
        self.run_locked(&mut rng).await
    }

    /// Run a cycle unless one is already in progress
    pub async fn try_run_cycle(&self) -> Option<CycleReport> {
        let mut rng = self.cycle_rng.try_lock().ok()?;
        Some(self.run_locked(&mut rng).await)
    }

    async fn bounded<T, E>(
        &self,
        request: impl Future<Output = Result<T, E>>,
        on_timeout: fn(Duration) -> E,
    ) -> Result<T, E> {
        match tokio::time::timeout(self.options.request_timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(on_timeout(self.options.request_timeout)),
        }
    }

    async fn list_images(&self) -> Result<Vec<Image>, StoreError> {
        self.bounded(
            self.blobs.list_images(&self.options.folder),
            StoreError::Timeout,
        )
        .await
    }

    async fn send(&self, recipient: Recipient, image: &Image) -> Result<(), SendError> {
        let result = self
            .bounded(
                self.messenger.send_photo(recipient, &image.locator),
                SendError::Timeout,
            )
            .await;
        tokio::time::sleep(self.options.send_delay).await;
        result
    }

    async fn run_locked(&self, rng: &mut StdRng) -> CycleReport {
        let mut report = CycleReport::new();
        log::info!("Starting distribution cycle");

        let images = match self.list_images().await {
            Ok(images) => images,
            Err(e) => {
                log::error!(
                    "Failed to list images in folder {}: {}",
                    self.options.folder,
                    e
                );
                let reason = CycleAbort::ListingFailed(e.to_string());
                self.messenger
                    .notify_admin(&format!("⚠️ Distribution cycle aborted: {}", reason))
                    .await;
                return report.abort(reason);
            }
        };
        if images.is_empty() {
            log::warn!("All images have run out");
            self.messenger
                .notify_admin("⚠️ Attention! All images have run out.")
                .await;
            return report.abort(CycleAbort::NoImages);
        }

        let state = async {
            let channels = self.registry.list_channels().await?;
            let progress = self.progress.load().await?;
            Ok::<_, StoreError>((channels, progress))
        };
        let (channels, mut progress) = match state.await {
            Ok(state) => state,
            Err(e) => {
                log::error!("Failed to load channels or delivery progress: {}", e);
                let reason = CycleAbort::StateUnavailable(e.to_string());
                self.messenger
                    .notify_admin(&format!("⚠️ Distribution cycle aborted: {}", reason))
                    .await;
                return report.abort(reason);
            }
        };

        let stale = progress.retain_images(images.iter().map(|image| &image.id));
        if stale > 0 {
            log::info!(
                "Dropped delivery progress of {} images that are no longer stored",
                stale
            );
        }

        self.channel_pass(&images, &channels, &mut progress, rng, &mut report)
            .await;

        let complete = fully_delivered(&progress, &channels);
        if !complete.is_empty() {
            self.purge(&complete, &mut report).await;
            // Cleared even if the deletion failed
            progress.remove(&complete);
        }
        log::debug!("Delivery progress tracks {} images", progress.len());
        if let Err(e) = self.progress.save(&progress).await {
            log::error!("Failed to save delivery progress: {}", e);
            self.messenger
                .notify_admin(&format!("⚠️ Failed to save delivery progress: {}", e))
                .await;
        }

        self.subscriber_pass(rng, &mut report).await;

        let report = report.finish();
        log::info!("{}", report);
        report
    }

    async fn channel_pass(
        &self,
        images: &[Image],
        channels: &[ChannelId],
        progress: &mut DeliveryProgress,
        rng: &mut StdRng,
        report: &mut CycleReport,
    ) {
        // Shared by all channels of this cycle, an image leaves the pool once delivered
        let mut pool: Vec<&Image> = images.iter().collect();
        pool.shuffle(rng);

        for channel in channels {
            let Some(pos) = pool
                .iter()
                .position(|image| !progress.contains(&image.id, channel))
            else {
                log::warn!("No new images left for channel {}", channel);
                self.messenger
                    .notify_admin(&format!("⚠️ No new images left for channel {}", channel))
                    .await;
                report.starved_channels.push(channel.clone());
                continue;
            };

            let image = pool[pos];
            match self.send(Recipient::from(channel), image).await {
                Ok(()) => {
                    log::info!("Sent image {} to channel {}", image.id, channel);
                    progress.record(&image.id, channel);
                    pool.remove(pos);
                    report.channel_sends += 1;
                }
                Err(e) => {
                    // Not recorded: the channel gets another chance next cycle
                    log::error!(
                        "Failed to send image {} to channel {}: {}",
                        image.id,
                        channel,
                        e
                    );
                    report.channel_failures += 1;
                }
            }
        }
    }

    async fn purge(&self, images: &[ImageId], report: &mut CycleReport) {
        for batch in images.chunks(self.options.delete_batch_size.max(1)) {
            let result = tokio::time::timeout(
                self.options.request_timeout,
                self.blobs.delete_images(&self.options.folder, batch),
            )
            .await;
            let failed: Vec<ImageId> = match result {
                Ok(Ok(())) => Vec::new(),
                Ok(Err(e)) => {
                    for (id, reason) in &e.failed {
                        log::error!("Failed to delete delivered image {}: {}", id, reason);
                    }
                    e.ids().cloned().collect()
                }
                Err(_) => {
                    // Unknown which images are gone, the next listing tells
                    log::error!(
                        "Deleting {} delivered images timed out after {:?}",
                        batch.len(),
                        self.options.request_timeout
                    );
                    batch.to_vec()
                }
            };
            let deleted: Vec<ImageId> = batch
                .iter()
                .filter(|id| !failed.contains(id))
                .cloned()
                .collect();
            if !deleted.is_empty() {
                log::info!("Purged {} fully delivered images", deleted.len());
            }
            report.purge_failures += failed.len();
            report.purged.extend(deleted);
        }
    }

    async fn subscriber_pass(&self, rng: &mut StdRng, report: &mut CycleReport) {
        let subscribers = match self.registry.list_subscribers().await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                log::error!("Failed to load subscribers: {}", e);
                return;
            }
        };
        if subscribers.is_empty() {
            return;
        }

        // Listed again so images purged by the channel pass are not picked
        let images = match self.list_images().await {
            Ok(images) => images,
            Err(e) => {
                log::error!("Skipping subscriber broadcast, cannot list images: {}", e);
                return;
            }
        };
        let Some(image) = images.choose(rng) else {
            log::warn!("No images left for subscribers");
            self.messenger
                .notify_admin("⚠️ No images left for subscribers.")
                .await;
            return;
        };

        log::info!(
            "Sending image {} to {} subscribers",
            image.id,
            subscribers.len()
        );
        report.subscriber_image = Some(image.id.clone());
        for subscriber in subscribers {
            match self.send(subscriber.into(), image).await {
                Ok(()) => report.subscriber_sends += 1,
                Err(e) => {
                    log::warn!(
                        "Failed to send image {} to subscriber {}: {}",
                        image.id,
                        subscriber,
                        e
                    );
                    report.subscriber_failures += 1;
                }
            }
        }

        if report.subscriber_sends == 0 {
            return;
        }
        let result = self
            .bounded(
                self.blobs.delete_image(&self.options.folder, &image.id),
                StoreError::Timeout,
            )
            .await;
        match result {
            Ok(()) => {
                log::info!("Purged image {} after subscriber broadcast", image.id);
                report.purged.push(image.id.clone());
            }
            Err(StoreError::NotFound(_)) => {
                log::warn!("Image {} was deleted during the subscriber broadcast", image.id);
            }
            Err(e) => {
                log::error!("Failed to delete image {}: {}", image.id, e);
                report.purge_failures += 1;
            }
        }
    }
}
