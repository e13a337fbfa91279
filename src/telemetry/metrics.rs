//! Prometheus metrics
//!
//! Thin wrappers over the `metrics` macros so call sites stay one line.
//! Without an installed recorder every call is a no-op.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Start the Prometheus scrape endpoint on `0.0.0.0:<port>`
pub fn install_prometheus(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;
    tracing::info!(%addr, "Prometheus exporter listening");
    Ok(())
}

/// One transport attempt; `outcome` is "success", "retryable" or "fatal"
pub fn record_fetch_attempt(outcome: &'static str) {
    counter!("harvest_fetch_attempts_total", "outcome" => outcome).increment(1);
}

pub fn record_retry() {
    counter!("harvest_fetch_retries_total").increment(1);
}

pub fn record_rate_limit_wait(wait: Duration) {
    histogram!("harvest_rate_limit_wait_ms").record(wait.as_secs_f64() * 1000.0);
}

pub fn record_records_collected(kind: &'static str, count: u64) {
    counter!("harvest_records_collected_total", "kind" => kind).increment(count);
}

pub fn record_page_collected() {
    counter!("harvest_pages_collected_total").increment(1);
}

pub fn record_alert(severity: &'static str) {
    counter!("harvest_alerts_total", "severity" => severity).increment(1);
}

pub fn record_edges_inserted(count: u64) {
    if count > 0 {
        counter!("harvest_edges_inserted_total").increment(count);
    }
}
