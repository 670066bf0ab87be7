//! Fan-in of enrichment outcomes.
//!
//! The aggregator drains both channels of a batch until each has closed and
//! keeps two flags for that:
//!
//! | event                   | effect                                  |
//! |-------------------------|-----------------------------------------|
//! | `results` yields item   | append to the collection                |
//! | `results` closed        | `results_open = false`                  |
//! | `errors` yields error   | fail the batch immediately              |
//! | `errors` closed         | `errors_open = false`                   |
//!
//! The batch succeeds once both flags are down with no error seen. The first
//! error wins: the remaining outcomes are not awaited, and the batch token is
//! cancelled so outstanding tasks stop and release their connections. The
//! same happens when the batch deadline expires.

use crate::enricher::EnrichmentStreams;
use crate::errors::BatchError;
use crate::model::EnrichedItem;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct ResultAggregator {
    deadline: Duration,
}

impl ResultAggregator {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    /// Collects a whole batch or returns its first failure.
    ///
    /// `cancel` is triggered whenever the batch fails.
    pub async fn collect(
        &self,
        streams: EnrichmentStreams,
        cancel: &CancellationToken,
    ) -> Result<Vec<EnrichedItem>, BatchError> {
        let outcome = match tokio::time::timeout(self.deadline, drain(streams)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(deadline = ?self.deadline, "Batch deadline reached");
                Err(BatchError::Timeout(self.deadline))
            }
        };

        if let Err(e) = &outcome {
            tracing::debug!(error = %e, "Batch failed, cancelling outstanding tasks");
            cancel.cancel();
        }

        outcome
    }
}

async fn drain(streams: EnrichmentStreams) -> Result<Vec<EnrichedItem>, BatchError> {
    let EnrichmentStreams {
        mut results,
        mut errors,
        expected,
    } = streams;

    let mut enriched = Vec::with_capacity(expected);
    let mut results_open = true;
    let mut errors_open = true;

    while results_open || errors_open {
        tokio::select! {
            received = results.recv(), if results_open => match received {
                Some(item) => enriched.push(item),
                None => results_open = false,
            },
            received = errors.recv(), if errors_open => match received {
                Some(error) => return Err(error.into()),
                None => errors_open = false,
            },
        }
    }

    // Tasks that panicked never report; the batch must not silently shrink
    if enriched.len() != expected {
        return Err(BatchError::Incomplete {
            expected,
            received: enriched.len(),
        });
    }

    Ok(enriched)
}
