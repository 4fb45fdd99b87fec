use ahash::AHashMap;
use metrics::{Counter, Key, Label, Recorder};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::sync::{PoisonError, RwLock};

pub const REQUESTS_TOTAL: &str = "requests_total";
pub const TRUNCATIONS_BY_FIELD_TOTAL: &str = "truncations_by_field_total";
pub const KAFKA_EVENTS_TOTAL: &str = "kafka_events_total";

/// Longest `field` label value. Paths under `payload.data` are built from client-chosen keys.
pub const MAX_FIELD_LABEL_LENGTH: usize = 100;

/// Process-wide counters, rendered in the Prometheus text format.
///
/// The recorder is owned rather than installed globally, so every component (and every test)
/// works against the instance it was handed.
pub struct Metrics {
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
    // Handles for label sets seen so far. Lookups take the read lock only.
    counters: RwLock<AHashMap<Key, Counter>>,
}

impl Metrics {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        recorder.describe_counter(
            REQUESTS_TOTAL.into(),
            None,
            "Requests to the send endpoint by result".into(),
        );
        recorder.describe_counter(
            TRUNCATIONS_BY_FIELD_TOTAL.into(),
            None,
            "Events with a truncated value, by field path".into(),
        );
        recorder.describe_counter(
            KAFKA_EVENTS_TOTAL.into(),
            None,
            "Publish outcomes by result and website".into(),
        );
        Self {
            recorder,
            handle,
            counters: RwLock::new(AHashMap::new()),
        }
    }

    /// Returns the counter for `name` with the given labels, registering it on first use.
    /// Concurrent first uses resolve to the same counter.
    pub fn counter(&self, name: &'static str, labels: &[(&'static str, &str)]) -> Counter {
        let key = Key::from_parts(
            name,
            labels
                .iter()
                .map(|(k, v)| Label::new(*k, v.to_string()))
                .collect::<Vec<_>>(),
        );

        if let Some(counter) = self
            .counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return counter.clone();
        }

        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        counters
            .entry(key)
            .or_insert_with_key(|key| self.recorder.register_counter(key))
            .clone()
    }

    pub fn request(&self, result: &str) {
        self.counter(REQUESTS_TOTAL, &[("result", result)]).increment(1);
    }

    pub fn truncated_field(&self, field: &str) {
        let field = match field.char_indices().nth(MAX_FIELD_LABEL_LENGTH) {
            Some((idx, _)) => &field[..idx],
            None => field,
        };
        self.counter(TRUNCATIONS_BY_FIELD_TOTAL, &[("field", field)])
            .increment(1);
    }

    pub fn kafka_event(&self, result: &str, website_id: &str) {
        self.counter(
            KAFKA_EVENTS_TOTAL,
            &[("result", result), ("websiteId", website_id)],
        )
        .increment(1);
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads a counter back from rendered output. `series` is the name with its label block, e.g.
/// `requests_total{result="success"}`. A series that was never registered reads as 0.
#[cfg(test)]
pub fn counter_value(rendered: &str, series: &str) -> u64 {
    rendered
        .lines()
        .filter_map(|line| line.strip_prefix(series))
        .filter_map(|rest| rest.strip_prefix(' '))
        .find_map(|value| value.trim().parse::<f64>().ok())
        .map(|value| value as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_render_by_label() {
        let metrics = Metrics::new();
        metrics.request("success");
        metrics.request("success");
        metrics.request("failure");

        let rendered = metrics.render();
        assert_eq!(
            counter_value(&rendered, r#"requests_total{result="success"}"#),
            2
        );
        assert_eq!(
            counter_value(&rendered, r#"requests_total{result="failure"}"#),
            1
        );
        assert_eq!(
            counter_value(&rendered, r#"kafka_events_total{result="created",websiteId="w"}"#),
            0
        );
    }

    #[test]
    fn test_concurrent_first_use_shares_one_counter() {
        let metrics = Arc::new(Metrics::new());
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let metrics = metrics.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        metrics.truncated_field("payload.title");
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(
            counter_value(
                &metrics.render(),
                r#"truncations_by_field_total{field="payload.title"}"#
            ),
            800
        );
    }

    #[test]
    fn test_long_field_labels_are_capped() {
        let metrics = Metrics::new();
        let prefix = format!("payload.data.{}", "k".repeat(200));
        metrics.truncated_field(&format!("{prefix}a"));
        metrics.truncated_field(&format!("{prefix}b"));

        let capped: String = prefix.chars().take(MAX_FIELD_LABEL_LENGTH).collect();
        let rendered = metrics.render();
        assert_eq!(
            counter_value(
                &rendered,
                &format!(r#"truncations_by_field_total{{field="{capped}"}}"#)
            ),
            2
        );
        assert!(!rendered.contains(&prefix));
    }
}
