mod in_memory_broker;
mod rest_proxy_broker;

pub use in_memory_broker::InMemoryBroker;
pub use rest_proxy_broker::RestProxyBroker;

/// A record ready to be appended to a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRecord {
    pub topic: String,
    pub key: String,
    pub value: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl OutboundRecord {
    /// Last value of a header, matched case-insensitively.
    #[cfg(test)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Where the broker put an accepted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordMetadata {
    pub partition: i32,
    pub offset: i64,
}

/// Broker failures. The variant name is the category used in logs and must not carry payload
/// content.
#[derive(Debug, thiserror::Error, strum::AsRefStr)]
pub enum BrokerError {
    #[error("Unknown topic '{0}'")]
    UnknownTopic(String),

    #[error("Broker unreachable: {0}")]
    Transport(String),

    #[error("Broker rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected broker response: {0}")]
    InvalidResponse(String),
}

/// Append-only log the proxy publishes to.
#[async_trait::async_trait]
pub trait Broker {
    async fn send(&self, record: OutboundRecord) -> Result<RecordMetadata, BrokerError>;

    /// Number of partitions of `topic`. Used as a connectivity probe.
    async fn partitions_for(&self, topic: &str) -> Result<usize, BrokerError>;
}
