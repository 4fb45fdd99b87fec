use ahash::AHashMap;
use std::collections::VecDeque;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::broker::{Broker, BrokerError, OutboundRecord, RecordMetadata};

struct TopicLog {
    /// Offset the next record will get.
    next_offset: i64,
    /// Most recent records, oldest first.
    records: VecDeque<OutboundRecord>,
}

/// Single-partition in-process log, for local runs and tests.
///
/// Only topics declared up front exist; sending elsewhere fails like a broker without
/// auto-creation would. Each topic keeps at most `retention` records.
pub struct InMemoryBroker {
    retention: usize,
    topics: RwLock<AHashMap<String, TopicLog>>,
}

impl InMemoryBroker {
    pub fn new<I, S>(topics: I, retention: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let topics = topics
            .into_iter()
            .map(|topic| {
                let log = TopicLog {
                    next_offset: 0,
                    records: VecDeque::new(),
                };
                (topic.into(), log)
            })
            .collect();
        Self {
            retention,
            topics: RwLock::new(topics),
        }
    }

    /// Retained records of `topic`, oldest first.
    #[cfg(test)]
    pub async fn records(&self, topic: &str) -> Vec<OutboundRecord> {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|log| log.records.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Broker for InMemoryBroker {
    #[instrument(skip_all)]
    async fn send(&self, record: OutboundRecord) -> Result<RecordMetadata, BrokerError> {
        let mut topics = self.topics.write().await;
        let log = topics
            .get_mut(&record.topic)
            .ok_or_else(|| BrokerError::UnknownTopic(record.topic.clone()))?;

        let offset = log.next_offset;
        log.next_offset += 1;
        log.records.push_back(record);
        while log.records.len() > self.retention {
            log.records.pop_front();
        }

        debug!("Appended record at offset {offset}");
        Ok(RecordMetadata {
            partition: 0,
            offset,
        })
    }

    async fn partitions_for(&self, topic: &str) -> Result<usize, BrokerError> {
        if self.topics.read().await.contains_key(topic) {
            Ok(1)
        } else {
            Err(BrokerError::UnknownTopic(topic.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(topic: &str, key: &str) -> OutboundRecord {
        OutboundRecord {
            topic: topic.to_string(),
            key: key.to_string(),
            value: b"{}".to_vec(),
            headers: vec![("User-Agent".to_string(), "test".to_string())],
        }
    }

    #[tokio::test]
    async fn test_appends_with_increasing_offsets() {
        let broker = InMemoryBroker::new(["events"], 10);

        let first = broker.send(record("events", "a")).await.unwrap();
        let second = broker.send(record("events", "b")).await.unwrap();

        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 1);
        let keys: Vec<_> = broker
            .records("events")
            .await
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(broker.records("events").await[0].header("user-agent"), Some("test"));
    }

    #[tokio::test]
    async fn test_unknown_topic_fails() {
        let broker = InMemoryBroker::new(["events"], 10);

        let err = broker.send(record("other", "a")).await.unwrap_err();
        assert_eq!(err.as_ref(), "UnknownTopic");
        assert!(broker.partitions_for("other").await.is_err());
        assert_eq!(broker.partitions_for("events").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_retention_drops_oldest() {
        let broker = InMemoryBroker::new(["events"], 2);
        for key in ["a", "b", "c"] {
            broker.send(record("events", key)).await.unwrap();
        }

        let keys: Vec<_> = broker
            .records("events")
            .await
            .into_iter()
            .map(|r| r.key)
            .collect();
        assert_eq!(keys, vec!["b", "c"]);
    }
}
