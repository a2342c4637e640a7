use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

const SWEEPS_TOTAL: &str = "srscs_worker_sweeps_total";
const SWEEP_CLEARED_TOKENS_TOTAL: &str = "srscs_worker_sweep_cleared_tokens_total";
const SWEEP_DURATION_MS: &str = "srscs_worker_sweep_duration_ms";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

pub fn _render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

pub fn record_sweep(result: &str, cleared: usize, duration: Duration) {
    counter!(SWEEPS_TOTAL, "result" => result.to_string()).increment(1);
    counter!(SWEEP_CLEARED_TOKENS_TOTAL).increment(cleared as u64);
    histogram!(SWEEP_DURATION_MS).record(duration.as_millis() as f64);
}
