mod broker;
mod config;
mod event;
mod publish;
mod sanitize;
mod server;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::prelude::*;

use crate::{
    broker::{Broker, InMemoryBroker, RestProxyBroker},
    config::{BrokerConfig, Config},
    publish::{PublishPipeline, WarmupPolicy, warmup},
    server::AppState,
    telemetry::Metrics,
};

#[tokio::main]
async fn main() -> Result<()> {
    set_up_tracing()?;
    let config = Config::from_env().context("Failed to read configuration")?;
    info!(
        "Starting with topic={} mode={} limit={}",
        config.topic, config.publish_mode, config.truncation_limit
    );

    let broker = make_broker(&config);
    warmup(broker.as_ref(), &config.topic, WarmupPolicy::default()).await;

    let metrics = Arc::new(Metrics::new());
    let pipeline = PublishPipeline::new(broker, metrics.clone(), config.topic.clone());
    let state = AppState {
        metrics,
        pipeline: Arc::new(pipeline),
        publish_mode: config.publish_mode,
        truncation_limit: config.truncation_limit,
    };
    server::serve(config.port, state).await?;
    Ok(())
}

fn make_broker(config: &Config) -> Arc<dyn Broker + Send + Sync + 'static> {
    match &config.broker {
        BrokerConfig::RestProxy { url, cluster_id } => {
            info!("Publishing through Kafka REST proxy at {url}");
            Arc::new(RestProxyBroker::new(url, cluster_id))
        }
        BrokerConfig::InMemory { retention } => {
            info!("No KAFKA_REST_URL set, keeping events in memory");
            Arc::new(InMemoryBroker::new([config.topic.clone()], *retention))
        }
    }
}

fn set_up_tracing() -> Result<()> {
    #[cfg(windows)]
    let with_color = nu_ansi_term::enable_ansi_support().is_ok();
    #[cfg(not(windows))]
    let with_color = true;

    let fmt_layer = fmt::layer().with_ansi(with_color).with_target(false);
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(if cfg!(debug_assertions) { "debug" } else { "info" }))?;
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();

    Ok(())
}
