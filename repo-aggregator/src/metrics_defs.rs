use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with route, status.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of API requests currently being processed",
};

pub const ENRICHMENT_TASKS: MetricDef = MetricDef {
    name: "enrichment.tasks",
    metric_type: MetricType::Counter,
    description: "Enrichment tasks finished. Tagged with outcome: success, failure, cancelled.",
};

pub const ENRICHMENT_BATCH_SIZE: MetricDef = MetricDef {
    name: "enrichment.batch_size",
    metric_type: MetricType::Histogram,
    description: "Number of repositories fanned out per batch",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    ENRICHMENT_TASKS,
    ENRICHMENT_BATCH_SIZE,
];
