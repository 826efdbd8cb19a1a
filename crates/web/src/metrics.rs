use anyhow::Result;
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub fn describe() {
    describe_gauge!(
        "dashboard_build_info",
        "Build info for the volume dashboard (value is always 1)."
    );
    describe_counter!(
        "dashboard_requests_total",
        "Dashboard API requests by route and outcome."
    );
    describe_histogram!(
        "dashboard_aggregation_latency_ms",
        "Time to fetch rows and build one dashboard view, in milliseconds."
    );
    describe_counter!(
        "dashboard_records_loaded_total",
        "Trade records parsed from the source relation."
    );
    describe_histogram!(
        "dashboard_query_latency_ms",
        "Latency of a single relation fetch, in milliseconds."
    );
    describe_counter!(
        "dashboard_queries_total",
        "Relation fetches by status and error kind."
    );
    describe_counter!(
        "aggregator_records_total",
        "Records folded into bucketed series."
    );
}

/// Install the global Prometheus recorder and return a handle for rendering `/metrics`.
///
/// Call once per process; a second install fails.
pub fn install() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe();
    ::metrics::gauge!("dashboard_build_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    Ok(handle)
}
