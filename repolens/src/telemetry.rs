use crate::config::{CommonConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(thiserror::Error, Debug)]
pub enum TelemetryError {
    #[error("could not install log subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
    #[error("could not build statsd exporter: {0}")]
    Statsd(#[from] metrics_exporter_statsd::StatsdError),
    #[error("a metrics recorder is already installed")]
    RecorderAlreadySet,
}

/// Keeps the Sentry client alive; events are flushed when it is dropped.
pub struct TelemetryGuard {
    _sentry: Option<sentry::ClientInitGuard>,
}

/// Sets up logging, error reporting and metrics export.
///
/// Must run before the tokio runtime is started so the Sentry client sees
/// every thread.
pub fn init(config: &CommonConfig) -> Result<TelemetryGuard, TelemetryError> {
    let sentry_guard = config.logging.sentry_dsn.as_deref().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let sentry_layer = sentry_guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(sentry_layer)
        .try_init()?;

    if let Some(metrics_config) = &config.metrics {
        init_metrics(metrics_config)?;
    }

    Ok(TelemetryGuard {
        _sentry: sentry_guard,
    })
}

fn init_metrics(config: &MetricsConfig) -> Result<(), TelemetryError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(&config.prefix))?;
    metrics::set_global_recorder(recorder).map_err(|_| TelemetryError::RecorderAlreadySet)?;
    shared::metrics_defs::describe_all(repo_aggregator::metrics_defs::ALL_METRICS);

    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "Exporting metrics to statsd"
    );
    Ok(())
}
