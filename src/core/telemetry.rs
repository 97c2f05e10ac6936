use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

use crate::core::config::Settings;

pub(crate) fn init_tracing(settings: &Settings) -> anyhow::Result<()> {
    let telemetry = settings.telemetry();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(telemetry.log_level.clone()));

    let builder =
        fmt().with_env_filter(filter).with_target(false).with_span_events(FmtSpan::CLOSE);

    let result =
        if telemetry.json { builder.json().try_init() } else { builder.compact().try_init() };

    result.map_err(|err| anyhow::anyhow!(err.to_string()))
}
