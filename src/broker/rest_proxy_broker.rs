use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::broker::{Broker, BrokerError, OutboundRecord, RecordMetadata};

/// Publishes through a Kafka REST Proxy (API v3).
///
/// Keys, values, and header values travel base64-encoded as `BINARY`, so the proxy hands the
/// exact bytes to Kafka.
#[derive(Debug, Clone)]
pub struct RestProxyBroker {
    base_url: String,
    cluster_id: String,
    client: Client,
}

#[derive(Serialize)]
struct ProduceRequest<'a> {
    key: Data,
    value: Data,
    headers: Vec<ProduceHeader<'a>>,
}

#[derive(Serialize)]
struct Data {
    #[serde(rename = "type")]
    data_type: &'static str,
    data: String,
}

impl Data {
    fn binary(bytes: &[u8]) -> Self {
        Self {
            data_type: "BINARY",
            data: STANDARD.encode(bytes),
        }
    }
}

#[derive(Serialize)]
struct ProduceHeader<'a> {
    name: &'a str,
    value: String,
}

#[derive(Deserialize)]
struct ProduceResponse {
    error_code: u16,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    partition_id: i32,
    #[serde(default)]
    offset: i64,
}

#[derive(Deserialize)]
struct PartitionList {
    data: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl RestProxyBroker {
    pub fn new(base_url: &str, cluster_id: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            cluster_id: cluster_id.to_string(),
            client: Client::new(),
        }
    }

    fn topic_url(&self, topic: &str) -> String {
        format!(
            "{}/v3/clusters/{}/topics/{}",
            self.base_url, self.cluster_id, topic
        )
    }
}

/// Turns a non-success response into the matching error.
async fn rejection(topic: &str, response: reqwest::Response) -> BrokerError {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return BrokerError::UnknownTopic(topic.to_string());
    }
    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| status.to_string());
    BrokerError::Rejected {
        status: status.as_u16(),
        message,
    }
}

#[async_trait::async_trait]
impl Broker for RestProxyBroker {
    #[instrument(skip_all)]
    async fn send(&self, record: OutboundRecord) -> Result<RecordMetadata, BrokerError> {
        let body = ProduceRequest {
            key: Data::binary(record.key.as_bytes()),
            value: Data::binary(&record.value),
            headers: record
                .headers
                .iter()
                .map(|(name, value)| ProduceHeader {
                    name,
                    value: STANDARD.encode(value.as_bytes()),
                })
                .collect(),
        };

        let url = format!("{}/records", self.topic_url(&record.topic));
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(rejection(&record.topic, response).await);
        }

        let produced: ProduceResponse = response
            .json()
            .await
            .map_err(|e| BrokerError::InvalidResponse(e.to_string()))?;
        // The proxy reports per-record failures inside a 200 response.
        if !(200..300).contains(&produced.error_code) {
            return Err(BrokerError::Rejected {
                status: produced.error_code,
                message: produced.message.unwrap_or_default(),
            });
        }

        debug!(
            "Produced to partition {} at offset {}",
            produced.partition_id, produced.offset
        );
        Ok(RecordMetadata {
            partition: produced.partition_id,
            offset: produced.offset,
        })
    }

    #[instrument(skip(self))]
    async fn partitions_for(&self, topic: &str) -> Result<usize, BrokerError> {
        let url = format!("{}/partitions", self.topic_url(topic));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BrokerError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(rejection(topic, response).await);
        }

        let partitions: PartitionList = response
            .json()
            .await
            .map_err(|e| BrokerError::InvalidResponse(e.to_string()))?;
        Ok(partitions.data.len())
    }
}
