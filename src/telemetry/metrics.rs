//! Prometheus metrics

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Task accepted into the queue
    TasksQueued,
    /// Task skipped because its fingerprint was already seen
    TasksDuplicate,
    /// Task rejected by validation
    TasksInvalid,
    /// Task picked up by a worker
    TasksStarted,
    /// Task finished by a worker
    TasksCompleted,
    /// Simulation variant that produced no score
    VariantsAborted,
    /// Result dropped at harvest for a non-positive score
    ResultsDiscarded,
    /// Result appended to the result store
    ResultsPersisted,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Worker threads still running
    ActiveWorkers,
    /// Tasks waiting in the queue
    QueueDepth,
    /// Best time-weighted score so far
    BestScore,
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            CounterMetric::TasksQueued => "sweep_tasks_queued_total",
            CounterMetric::TasksDuplicate => "sweep_tasks_duplicate_total",
            CounterMetric::TasksInvalid => "sweep_tasks_invalid_total",
            CounterMetric::TasksStarted => "sweep_tasks_started_total",
            CounterMetric::TasksCompleted => "sweep_tasks_completed_total",
            CounterMetric::VariantsAborted => "sweep_variants_aborted_total",
            CounterMetric::ResultsDiscarded => "sweep_results_discarded_total",
            CounterMetric::ResultsPersisted => "sweep_results_persisted_total",
        }
    }
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            GaugeMetric::ActiveWorkers => "sweep_workers_active",
            GaugeMetric::QueueDepth => "sweep_queue_depth",
            GaugeMetric::BestScore => "sweep_best_score",
        }
    }
}

/// Increment a counter
pub fn increment(metric: CounterMetric, value: u64) {
    metrics::counter!(metric.name()).increment(value);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Serve the Prometheus scrape endpoint on `port`
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;

    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}
