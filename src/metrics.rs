use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const TRADES_RECEIVED: &str = "pipeline_trades_received_total";
pub const TRADES_REJECTED: &str = "pipeline_trades_rejected_total";
pub const ALERTS_EMITTED: &str = "pipeline_alerts_emitted_total";
pub const DETECTOR_FAILURES: &str = "detector_failures_total";
pub const PROVIDER_FAILURES: &str = "provider_failures_total";
pub const SINK_FAILURES: &str = "sink_failures_total";
pub const PIPELINE_LATENCY: &str = "pipeline_latency_seconds";

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    // Pre-register counters so they appear even before the first increment.
    counter!(TRADES_RECEIVED).absolute(0);
    counter!(ALERTS_EMITTED).absolute(0);

    // Histogram is lazily created on first record; force creation.
    histogram!(PIPELINE_LATENCY).record(0.0);

    Ok(handle)
}
