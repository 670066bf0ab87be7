use crate::aggregator::ResultAggregator;
use crate::config::EnrichmentConfig;
use crate::enricher::ConcurrentEnricher;
use crate::errors::AggregatorError;
use crate::model::EnrichedItem;
use crate::upstream::Upstream;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// List, enrich, aggregate: one batch per call.
pub struct Pipeline {
    upstream: Arc<dyn Upstream>,
    enricher: ConcurrentEnricher,
    aggregator: ResultAggregator,
}

impl Pipeline {
    pub fn new(upstream: Arc<dyn Upstream>, config: &EnrichmentConfig) -> Self {
        Self {
            enricher: ConcurrentEnricher::new(upstream.clone(), config.max_concurrency),
            aggregator: ResultAggregator::new(config.batch_timeout()),
            upstream,
        }
    }

    /// Runs one batch. On success the items are sorted by full name.
    ///
    /// Dropping the returned future cancels any enrichment still running.
    pub async fn run(&self) -> Result<Vec<EnrichedItem>, AggregatorError> {
        let items = self
            .upstream
            .list_items()
            .await
            .map_err(AggregatorError::ListFailed)?;

        let cancel = CancellationToken::new();
        let _cancel_on_drop = cancel.clone().drop_guard();

        let streams = self.enricher.spawn(items, cancel.clone());
        let mut enriched = self.aggregator.collect(streams, &cancel).await?;

        enriched.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        tracing::debug!(count = enriched.len(), "Batch enriched");
        Ok(enriched)
    }
}
