// src/metrics.rs
//! Prometheus recorder, the `/metrics` route and one-time metric descriptions.

use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder and publish the configured refresh interval.
    pub fn init(refresh_interval_ms: u64) -> anyhow::Result<Self> {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;

        ensure_metrics_described();
        gauge!("dashboard_refresh_interval_ms").set(refresh_interval_ms as f64);

        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("dashboard_fetch_total", "Source fetches attempted.");
        describe_counter!(
            "dashboard_fetch_errors_total",
            "Source fetches that ended Failed (network, http, parse, timeout)."
        );
        describe_histogram!("dashboard_fetch_ms", "Source fetch time in milliseconds.");
        describe_counter!("dashboard_cycles_total", "Completed refresh cycles.");
        describe_counter!(
            "dashboard_stale_updates_total",
            "Per-source updates dropped because a newer cycle already landed."
        );
        describe_gauge!(
            "dashboard_last_refresh_ts",
            "Unix ts when the last refresh cycle finished."
        );
        describe_gauge!(
            "dashboard_refresh_interval_ms",
            "Configured periodic refresh interval."
        );
        describe_counter!("scheduler_ticks_total", "Refresh ticks dispatched.");
        describe_counter!("prediction_requests_total", "Prediction requests sent.");
        describe_counter!(
            "prediction_validation_errors_total",
            "Prediction requests rejected locally before sending."
        );
    });
}
