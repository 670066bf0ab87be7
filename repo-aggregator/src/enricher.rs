//! Fan-out of enrichment tasks.
//!
//! Every primary item gets its own task. Tasks report on one of two channels:
//! enriched items on `results`, failures on `errors`. A supervisor task owns
//! the join barrier for the batch and holds the original senders; it drops
//! them only after every task has finished, so both channels close exactly
//! once the last outcome has been sent. The receiving side sees the close as
//! `None`, which no outcome can be confused with.
//!
//! ```text
//!              ┌─ task(item 1) ─┐
//! items ──────>├─ task(item 2) ─┼──> results / errors ──> ResultAggregator
//!              └─ task(item n) ─┘
//!   supervisor: join all ──> drop senders (close both channels)
//! ```
//!
//! Tasks wait on a shared semaphore before calling upstream and race every
//! await against the batch `CancellationToken`, so cancelling the token stops
//! queued and in-flight work alike.

use crate::errors::{EnrichmentError, UpstreamError};
use crate::metrics_defs::{ENRICHMENT_BATCH_SIZE, ENRICHMENT_TASKS};
use crate::model::{DetailPayload, EnrichedItem, PrimaryItem};
use crate::upstream::Upstream;
use shared::{counter, histogram};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

// Smallest capacity tokio allows; a sender waits until the aggregator has
// taken the previous outcome.
const CHANNEL_CAPACITY: usize = 1;

/// Receiving ends of one batch.
pub struct EnrichmentStreams {
    pub results: mpsc::Receiver<EnrichedItem>,
    pub errors: mpsc::Receiver<EnrichmentError>,
    /// Number of tasks spawned, i.e. outcomes a complete batch produces.
    pub expected: usize,
}

#[derive(Clone)]
pub struct ConcurrentEnricher {
    upstream: Arc<dyn Upstream>,
    gate: Arc<Semaphore>,
}

impl ConcurrentEnricher {
    pub fn new(upstream: Arc<dyn Upstream>, max_concurrency: usize) -> Self {
        Self {
            upstream,
            gate: Arc::new(Semaphore::new(max_concurrency)),
        }
    }

    /// Spawns one task per item and returns the channels they report on.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, items: Vec<PrimaryItem>, cancel: CancellationToken) -> EnrichmentStreams {
        let (results_tx, results) = mpsc::channel(CHANNEL_CAPACITY);
        let (errors_tx, errors) = mpsc::channel(CHANNEL_CAPACITY);
        let expected = items.len();

        histogram!(ENRICHMENT_BATCH_SIZE).record(expected as f64);

        let mut join_set = JoinSet::new();
        for item in items {
            let task = EnrichmentTask {
                upstream: self.upstream.clone(),
                gate: self.gate.clone(),
                cancel: cancel.clone(),
                results: results_tx.clone(),
                errors: errors_tx.clone(),
            };
            join_set.spawn(task.run(item));
        }

        tokio::spawn(async move {
            while let Some(joined) = join_set.join_next().await {
                if let Err(e) = joined {
                    tracing::error!("Enrichment task panicked: {e}");
                }
            }
            tracing::debug!("All enrichment tasks finished, closing result channels");
            drop(results_tx);
            drop(errors_tx);
        });

        EnrichmentStreams {
            results,
            errors,
            expected,
        }
    }
}

/// The unit of work: enrich one item and report exactly one outcome.
struct EnrichmentTask {
    upstream: Arc<dyn Upstream>,
    gate: Arc<Semaphore>,
    cancel: CancellationToken,
    results: mpsc::Sender<EnrichedItem>,
    errors: mpsc::Sender<EnrichmentError>,
}

impl EnrichmentTask {
    async fn run(self, item: PrimaryItem) {
        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            fetched = self.fetch(&item) => fetched,
        };

        let Some(fetched) = fetched else {
            tracing::debug!(full_name = %item.full_name, "Enrichment cancelled");
            counter!(ENRICHMENT_TASKS, "outcome" => "cancelled").increment(1);
            return;
        };

        let delivered = match fetched {
            Ok(payload) => {
                counter!(ENRICHMENT_TASKS, "outcome" => "success").increment(1);
                let enriched = EnrichedItem::from_parts(item, payload);
                self.deliver(&self.results, enriched).await
            }
            Err(source) => {
                counter!(ENRICHMENT_TASKS, "outcome" => "failure").increment(1);
                let error = EnrichmentError {
                    full_name: item.full_name,
                    source,
                };
                tracing::debug!(error = %error, "Enrichment failed");
                self.deliver(&self.errors, error).await
            }
        };

        if !delivered {
            tracing::debug!("Aggregator stopped listening, discarding outcome");
        }
    }

    /// Waits for a concurrency slot, then fetches. `None` if the gate closed.
    async fn fetch(&self, item: &PrimaryItem) -> Option<Result<DetailPayload, UpstreamError>> {
        let _permit = self.gate.acquire().await.ok()?;
        Some(self.upstream.fetch_details(item).await)
    }

    async fn deliver<T>(&self, sender: &mpsc::Sender<T>, value: T) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = sender.send(value) => sent.is_ok(),
        }
    }
}
