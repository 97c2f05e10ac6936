use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    describe();
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    metrics::describe_counter!("quiz_attempts_total", "Scored quiz attempts by verdict");
    metrics::describe_histogram!("quiz_attempt_rate_percent", "Score rate of scored attempts");
    metrics::describe_counter!(
        "quiz_generation_requests_total",
        "Generation requests by outcome (accepted, completed, failure code)"
    );
    metrics::describe_histogram!(
        "quiz_generation_provider_seconds",
        "Latency of model provider calls"
    );
    metrics::describe_counter!("notifications_total", "Guardian notifications by outcome");
    metrics::describe_counter!("queue_jobs_enqueued_total", "Jobs pushed onto work queues");
}
