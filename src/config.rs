use anyhow::{Context, Result, bail};
use std::{env, str::FromStr};

use crate::{publish::PublishMode, sanitize::MAX_LENGTH};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TOPIC: &str = "events";
const DEFAULT_IN_MEMORY_RETENTION: usize = 10_000;

/// Where records go.
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerConfig {
    /// Kafka REST Proxy v3.
    RestProxy { url: String, cluster_id: String },
    /// In-process log keeping the most recent `retention` records.
    InMemory { retention: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub topic: String,
    pub truncation_limit: usize,
    pub publish_mode: PublishMode,
    pub broker: BrokerConfig,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let port = parse_or(&var, "EVENT_PROXY_PORT", DEFAULT_PORT)?;
        let topic = var("KAFKA_TOPIC").unwrap_or_else(|| DEFAULT_TOPIC.to_string());
        let truncation_limit = parse_or(&var, "TRUNCATION_LIMIT", MAX_LENGTH)?;
        let publish_mode = parse_or(&var, "PUBLISH_MODE", PublishMode::Await)?;

        let broker = match var("KAFKA_REST_URL") {
            Some(url) => {
                let Some(cluster_id) = var("KAFKA_CLUSTER_ID") else {
                    bail!("KAFKA_CLUSTER_ID must be set when KAFKA_REST_URL is set");
                };
                BrokerConfig::RestProxy { url, cluster_id }
            }
            None => BrokerConfig::InMemory {
                retention: parse_or(&var, "IN_MEMORY_RETENTION", DEFAULT_IN_MEMORY_RETENTION)?,
            },
        };

        Ok(Config {
            port,
            topic,
            truncation_limit,
            publish_mode,
            broker,
        })
    }
}

fn parse_or<T>(var: impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Invalid value for {name}: '{value}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(
            config,
            Config {
                port: 3000,
                topic: "events".to_string(),
                truncation_limit: 500,
                publish_mode: PublishMode::Await,
                broker: BrokerConfig::InMemory { retention: 10_000 },
            }
        );
    }

    #[test]
    fn test_rest_proxy() {
        let config = config(&[
            ("KAFKA_REST_URL", "http://rest-proxy:8082"),
            ("KAFKA_CLUSTER_ID", "abc"),
            ("KAFKA_TOPIC", "team.events"),
            ("PUBLISH_MODE", "fire-and-forget"),
            ("TRUNCATION_LIMIT", " 1000 "),
        ])
        .unwrap();

        assert_eq!(
            config.broker,
            BrokerConfig::RestProxy {
                url: "http://rest-proxy:8082".to_string(),
                cluster_id: "abc".to_string(),
            }
        );
        assert_eq!(config.topic, "team.events");
        assert_eq!(config.publish_mode, PublishMode::FireAndForget);
        assert_eq!(config.truncation_limit, 1000);
    }

    #[test]
    fn test_rest_proxy_requires_cluster_id() {
        let err = config(&[("KAFKA_REST_URL", "http://rest-proxy:8082")]).unwrap_err();
        assert!(err.to_string().contains("KAFKA_CLUSTER_ID"));
    }

    #[test]
    fn test_invalid_value_names_variable() {
        let err = config(&[("EVENT_PROXY_PORT", "eighty")]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid value for EVENT_PROXY_PORT: 'eighty'");
    }
}
