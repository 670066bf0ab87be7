pub mod aggregator;
pub mod config;
pub mod enricher;
pub mod errors;
pub mod filter;
pub mod metrics_defs;
pub mod model;
pub mod pipeline;
pub mod service;
pub mod upstream;

#[cfg(test)]
mod testutils;

use errors::AggregatorError;
use pipeline::Pipeline;
use service::RepositoriesService;
use shared::admin_service::AdminService;
use shared::http::{bind, serve};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use upstream::{Credential, GithubClient};

/// Serves the repositories API and the admin endpoints until `shutdown` fires.
///
/// `/ready` reports ready only once the API listener is bound.
pub async fn run(
    config: config::Config,
    credential: Credential,
    shutdown: CancellationToken,
) -> Result<(), AggregatorError> {
    let client = GithubClient::new(&config.upstream, &credential)?;
    let pipeline = Pipeline::new(Arc::new(client), &config.enrichment);
    let service = RepositoriesService::new(pipeline);

    let ready = Arc::new(AtomicBool::new(false));
    let admin_ready = ready.clone();
    let admin_service =
        AdminService::<_, AggregatorError>::new(move || admin_ready.load(Ordering::Relaxed));

    let api_listener = bind(&config.listener.host, config.listener.port).await?;
    let admin_listener = bind(&config.admin_listener.host, config.admin_listener.port).await?;

    let api_shutdown = shutdown.clone();
    let api_task = serve(api_listener, service, async move {
        api_shutdown.cancelled().await
    });

    let admin_shutdown = shutdown.clone();
    let admin_task = serve(admin_listener, admin_service, async move {
        admin_shutdown.cancelled().await
    });

    ready.store(true, Ordering::Relaxed);
    tracing::info!(
        list_url = %config.upstream.list_url,
        max_concurrency = config.enrichment.max_concurrency,
        "Repo aggregator started"
    );

    let result = tokio::try_join!(api_task, admin_task);
    ready.store(false, Ordering::Relaxed);
    result.map(|_| ())
}
