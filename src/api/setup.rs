use crate::config::ServerConfig;
use crate::model::ChurnModelService;
use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::io;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

const DEFAULT_TIME_PATTERN: &str =
    "[year]-[month]-[day]T[hour repr:24]:[minute]:[second]::[subsecond digits:4]";

pub fn setup_logging() -> Result<(), anyhow::Error> {
    let time_format = time::format_description::parse(DEFAULT_TIME_PATTERN)
        .with_context(|| "Failed to parse log time format")?;

    // filter configured based on RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(false)
        .flatten_event(true)
        .with_thread_ids(true)
        .with_timer(UtcTime::new(time_format))
        .with_writer(io::stdout)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(())
}

pub fn setup_metrics() -> Result<PrometheusHandle, anyhow::Error> {
    PrometheusBuilder::new()
        .install_recorder()
        .with_context(|| "Failed to install Prometheus recorder")
}

/// Load the scoring artifact and manifest named by the config
pub fn load_model(config: &ServerConfig) -> Result<ChurnModelService, anyhow::Error> {
    ChurnModelService::new(&config.model_path, &config.features_path).with_context(|| {
        format!(
            "Failed to load churn model from {}",
            config.model_path.display()
        )
    })
}
