use std::{sync::Arc, time::Duration};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    broker::{Broker, BrokerError, OutboundRecord, RecordMetadata},
    event::{EXCLUDE_FILTERS, Event, FORWARDED_FOR, USER_AGENT},
    telemetry::Metrics,
};

/// Longest error message excerpt that may appear in a log line.
pub const MAX_LOG_MESSAGE_LENGTH: usize = 200;

/// Whether the HTTP response waits for the broker. Fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum PublishMode {
    /// Respond after the broker acknowledged; a failed send becomes a 500.
    Await,
    /// Respond once the event is sanitized; send outcomes only show in metrics and logs.
    FireAndForget,
}

/// Request metadata forwarded as record headers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForwardedHeaders {
    pub user_agent: String,
    pub exclude_filters: Option<String>,
    pub forwarded_for: Option<String>,
}

impl ForwardedHeaders {
    /// `User-Agent` is always present; the optional headers only when non-blank.
    fn to_record_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![(USER_AGENT.to_string(), self.user_agent.clone())];
        let optional = [
            (FORWARDED_FOR, &self.forwarded_for),
            (EXCLUDE_FILTERS, &self.exclude_filters),
        ];
        for (name, value) in optional {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                headers.push((name.to_string(), value.to_string()));
            }
        }
        headers
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Broker(#[from] BrokerError),
}

impl PublishError {
    /// Category name for logs.
    pub fn category(&self) -> &str {
        match self {
            PublishError::Serialization(_) => "Serialization",
            PublishError::Broker(err) => err.as_ref(),
        }
    }
}

/// Cuts a message down to what may be logged.
pub fn truncate_for_log(message: &str) -> &str {
    match message.char_indices().nth(MAX_LOG_MESSAGE_LENGTH) {
        Some((idx, _)) => &message[..idx],
        None => message,
    }
}

/// Sends sanitized events to the configured topic and counts the outcomes.
pub struct PublishPipeline {
    broker: Arc<dyn Broker + Send + Sync + 'static>,
    metrics: Arc<Metrics>,
    topic: String,
}

impl PublishPipeline {
    pub fn new(
        broker: Arc<dyn Broker + Send + Sync + 'static>,
        metrics: Arc<Metrics>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            broker,
            metrics,
            topic: topic.into(),
        }
    }

    /// Publishes one event under a fresh random key. Identical events get distinct keys.
    #[instrument(skip_all, fields(topic = %self.topic))]
    pub async fn publish(
        &self,
        event: &Event,
        headers: &ForwardedHeaders,
    ) -> Result<RecordMetadata, PublishError> {
        let website_id = event.payload.website.as_str();
        let result = self.send(event, headers).await;
        match &result {
            Ok(metadata) => {
                self.metrics.kafka_event("created", website_id);
                info!(
                    "Published to partition {} at offset {}",
                    metadata.partition, metadata.offset
                );
            }
            Err(err) => {
                self.metrics.kafka_event("failure", website_id);
                warn!(
                    "Publish failed [{}]: {}",
                    err.category(),
                    truncate_for_log(&err.to_string())
                );
            }
        }
        result
    }

    async fn send(
        &self,
        event: &Event,
        headers: &ForwardedHeaders,
    ) -> Result<RecordMetadata, PublishError> {
        let record = OutboundRecord {
            topic: self.topic.clone(),
            key: Uuid::new_v4().to_string(),
            value: serde_json::to_vec(event)?,
            headers: headers.to_record_headers(),
        };
        Ok(self.broker.send(record).await?)
    }
}

/// Retry schedule for the start-up connectivity probe.
#[derive(Debug, Clone, Copy)]
pub struct WarmupPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for WarmupPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_backoff: Duration::from_millis(250),
        }
    }
}

/// Probes the topic until the broker answers or the attempts run out. Never fails: a broker
/// that stays down is only logged, and serving starts regardless.
///
/// Returns whether the probe succeeded.
pub async fn warmup(
    broker: &(dyn Broker + Send + Sync),
    topic: &str,
    policy: WarmupPolicy,
) -> bool {
    let mut backoff = policy.initial_backoff;
    for attempt in 1..=policy.attempts {
        match broker.partitions_for(topic).await {
            Ok(partitions) => {
                info!("Broker warmup ok for topic={topic} partitions={partitions}");
                return true;
            }
            Err(err) => {
                warn!(
                    "Broker warmup attempt {attempt}/{} failed for topic={topic} [{}]: {}",
                    policy.attempts,
                    err.as_ref(),
                    truncate_for_log(&err.to_string())
                );
            }
        }
        if attempt < policy.attempts {
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }
    warn!("Broker warmup gave up for topic={topic}; serving anyway");
    false
}
