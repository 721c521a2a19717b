//! Media dispatch pipeline
//!
//! Moves attachments between the gateway and the helpdesk. Every item is
//! downloaded completely before it is uploaded (store-and-forward). Batches
//! run on a small worker pool fed by a channel; each transfer passes the
//! rate limiter and then the destination's circuit breaker. Failures are
//! isolated per item and aggregated once all workers have finished.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use application::{
    error::{ApplicationError, MediaFailure},
    ports::{
        DispatchReport, DispatchTarget, DownloadedMedia, HelpdeskPort, MediaDispatchPort,
        MediaFetchPort, MediaPayload, MessageSourcePort, NewHelpdeskMessage, send_media,
    },
};
use async_trait::async_trait;
use domain::{MediaItem, MediaSource};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::{
    circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState},
    rate_limiter::{RateLimiterConfig, SlidingWindowRateLimiter},
};

const GENERIC_MIME_TYPE: &str = "application/octet-stream";

/// Media pipeline configuration
#[derive(Debug, Clone)]
pub struct MediaPipelineConfig {
    /// Concurrent transfers for batches
    pub workers: usize,
    /// Start offset between workers (worker `n` starts after `n × stagger`)
    pub stagger: Duration,
    /// Budget for one item, download and upload together
    pub item_timeout: Duration,
    pub rate_limit: RateLimiterConfig,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for MediaPipelineConfig {
    fn default() -> Self {
        Self {
            workers: 3,
            stagger: Duration::from_millis(250),
            item_timeout: Duration::from_secs(120),
            rate_limit: RateLimiterConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Implements `MediaDispatchPort` over the helpdesk and gateway ports
#[derive(Clone)]
pub struct MediaPipeline {
    helpdesk: Arc<dyn HelpdeskPort>,
    whatsapp: Arc<dyn MessageSourcePort>,
    fetcher: Arc<dyn MediaFetchPort>,
    rate_limiter: Arc<SlidingWindowRateLimiter>,
    helpdesk_breaker: Arc<CircuitBreaker>,
    whatsapp_breaker: Arc<CircuitBreaker>,
    config: MediaPipelineConfig,
}

impl std::fmt::Debug for MediaPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaPipeline")
            .field("config", &self.config)
            .field("helpdesk_breaker", &self.helpdesk_breaker.state())
            .field("whatsapp_breaker", &self.whatsapp_breaker.state())
            .finish_non_exhaustive()
    }
}

/// Failures that say something about the health of the remote side
///
/// A rejected or missing file does not.
const fn trips_breaker(err: &ApplicationError) -> bool {
    matches!(
        err,
        ApplicationError::TransientRemote(_) | ApplicationError::Timeout(_)
    )
}

/// Outcome of one item, tagged with its batch position
type ItemOutcome = (usize, Option<MediaFailure>);

impl MediaPipeline {
    pub fn new(
        helpdesk: Arc<dyn HelpdeskPort>,
        whatsapp: Arc<dyn MessageSourcePort>,
        fetcher: Arc<dyn MediaFetchPort>,
        config: MediaPipelineConfig,
    ) -> Self {
        Self {
            helpdesk,
            whatsapp,
            fetcher,
            rate_limiter: Arc::new(SlidingWindowRateLimiter::new(config.rate_limit.clone())),
            helpdesk_breaker: Arc::new(CircuitBreaker::with_config(
                "helpdesk-media",
                config.circuit_breaker.clone(),
            )),
            whatsapp_breaker: Arc::new(CircuitBreaker::with_config(
                "whatsapp-media",
                config.circuit_breaker.clone(),
            )),
            config,
        }
    }

    /// Share a rate limiter with other callers of the same remote quota
    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<SlidingWindowRateLimiter>) -> Self {
        self.rate_limiter = rate_limiter;
        self
    }

    pub fn breaker_state(&self, target: &DispatchTarget) -> CircuitState {
        self.breaker_for(target).state()
    }

    fn breaker_for(&self, target: &DispatchTarget) -> &CircuitBreaker {
        match target {
            DispatchTarget::Helpdesk { .. } => &self.helpdesk_breaker,
            DispatchTarget::WhatsApp { .. } => &self.whatsapp_breaker,
        }
    }

    /// Run one item to completion and describe its failure, if any
    async fn run_item(
        &self,
        index: usize,
        item: MediaItem,
        target: &DispatchTarget,
        cancel: &CancellationToken,
    ) -> ItemOutcome {
        let description = item.describe();
        match self.transfer(item, target, cancel).await {
            Ok(()) => {
                debug!(index, item = %description, "Media item delivered");
                (index, None)
            },
            Err(e) => {
                warn!(index, item = %description, error = %e, "Media item failed");
                (
                    index,
                    Some(MediaFailure {
                        index,
                        item: description,
                        reason: e.to_string(),
                    }),
                )
            },
        }
    }

    /// Rate limiter first, then the destination's breaker around the
    /// download and upload together
    ///
    /// An open breaker rejects the item before anything is downloaded.
    async fn transfer(
        &self,
        item: MediaItem,
        target: &DispatchTarget,
        cancel: &CancellationToken,
    ) -> Result<(), ApplicationError> {
        self.rate_limiter.wait(cancel).await?;

        let item_timeout = self.config.item_timeout;
        let outcome = self
            .breaker_for(target)
            .call(|| async move {
                let work = async {
                    let payload = self.fetch(item).await?;
                    self.deliver(target, payload).await
                };

                let result = tokio::select! {
                    () = cancel.cancelled() => Err(ApplicationError::Cancelled),
                    outcome = tokio::time::timeout(item_timeout, work) => {
                        outcome.unwrap_or_else(|_| Err(ApplicationError::Timeout(format!(
                            "media transfer exceeded {}s",
                            item_timeout.as_secs()
                        ))))
                    },
                };

                match result {
                    Err(e) if trips_breaker(&e) => Err(e),
                    other => Ok(other),
                }
            })
            .await;

        match outcome {
            Ok(inner) => inner,
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch(&self, item: MediaItem) -> Result<MediaPayload, ApplicationError> {
        let downloaded = match &item.source {
            MediaSource::Url(url) => self.fetcher.fetch(url).await?,
            MediaSource::Gateway { media_id } => self.whatsapp.download_media(media_id).await?,
            MediaSource::Bytes(bytes) => DownloadedMedia::new(bytes.clone(), item.mime_type.clone()),
        };

        if downloaded.is_empty() {
            return Err(ApplicationError::Validation(format!(
                "{} has no content",
                item.file_name
            )));
        }

        // The item's declared type is more specific than a generic transport header
        let downloaded = if downloaded.mime_type.is_empty()
            || (downloaded.mime_type == GENERIC_MIME_TYPE && !item.mime_type.is_empty())
        {
            DownloadedMedia::new(downloaded.data, item.mime_type.clone())
        } else {
            downloaded
        };

        Ok(MediaPayload::new(downloaded, item.file_name).with_caption(item.caption))
    }

    async fn deliver(
        &self,
        target: &DispatchTarget,
        payload: MediaPayload,
    ) -> Result<(), ApplicationError> {
        match target {
            DispatchTarget::Helpdesk { conversation_id } => {
                let message = NewHelpdeskMessage::incoming(payload.caption.clone().unwrap_or_default());
                self.helpdesk
                    .create_message_with_attachment(*conversation_id, &message, payload)
                    .await?;
            },
            DispatchTarget::WhatsApp { recipient } => {
                send_media(self.whatsapp.as_ref(), recipient, payload).await?;
            },
        }
        Ok(())
    }

    async fn run_batch(
        &self,
        target: &DispatchTarget,
        items: Vec<MediaItem>,
        cancel: &CancellationToken,
    ) -> Vec<MediaFailure> {
        let total = items.len();
        let workers = self.config.workers.clamp(1, total.max(1));

        let (tx, rx) = mpsc::channel(total.max(1));
        let descriptions: Vec<String> = items.iter().map(MediaItem::describe).collect();
        for job in items.into_iter().enumerate() {
            // Capacity equals the batch size, so this never waits
            if tx.send(job).await.is_err() {
                break;
            }
        }
        drop(tx);

        let queue = Arc::new(Mutex::new(rx));
        let mut set = JoinSet::new();

        for worker in 0..workers {
            let this = self.clone();
            let target = target.clone();
            let cancel = cancel.clone();
            let queue = Arc::clone(&queue);
            let delay = self.config.stagger.saturating_mul(u32::try_from(worker).unwrap_or(u32::MAX));

            set.spawn(async move {
                let mut outcomes = Vec::new();
                if !delay.is_zero() {
                    tokio::select! {
                        () = cancel.cancelled() => {},
                        () = tokio::time::sleep(delay) => {},
                    }
                }

                loop {
                    let next = queue.lock().await.recv().await;
                    let Some((index, item)) = next else { break };
                    outcomes.push(this.run_item(index, item, &target, &cancel).await);
                }
                outcomes
            });
        }

        let mut results: BTreeMap<usize, Option<MediaFailure>> = BTreeMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcomes) => results.extend(outcomes),
                Err(e) => warn!(error = %e, "Media worker aborted"),
            }
        }

        // Items held by an aborted worker never reported back
        (0..total)
            .filter_map(|index| match results.remove(&index) {
                Some(outcome) => outcome,
                None => Some(MediaFailure {
                    index,
                    item: descriptions[index].clone(),
                    reason: "worker aborted before completing the item".to_string(),
                }),
            })
            .collect()
    }
}

#[async_trait]
impl MediaDispatchPort for MediaPipeline {
    #[instrument(skip(self, items, cancel), fields(target = %target, items = items.len()))]
    async fn dispatch(
        &self,
        target: DispatchTarget,
        items: Vec<MediaItem>,
        cancel: CancellationToken,
    ) -> Result<DispatchReport, ApplicationError> {
        let total = items.len();
        if total == 0 {
            return Ok(DispatchReport::new(0));
        }
        if cancel.is_cancelled() {
            return Err(ApplicationError::Cancelled);
        }

        let failures = if total == 1 {
            let mut items = items;
            let item = items.remove(0);
            self.run_item(0, item, &target, &cancel)
                .await
                .1
                .into_iter()
                .collect()
        } else {
            self.run_batch(&target, items, &cancel).await
        };

        if cancel.is_cancelled() {
            info!(total, failed = failures.len(), "Media dispatch cancelled");
            return Err(ApplicationError::Cancelled);
        }

        let report = DispatchReport {
            total,
            failures,
        };
        info!(
            total,
            delivered = report.delivered(),
            failed = report.failures.len(),
            "Media dispatch finished"
        );
        report.into_result()
    }
}
