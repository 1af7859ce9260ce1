use std::time::Duration;

use serde::Deserialize;

use relay_api::{DEFAULT_GROUP_ID, DEFAULT_TOPIC, OffsetReset};

use crate::BackoffPolicy;

// ═══════════════════════════════════════════════════════════════
//  Subscriber Config
// ═══════════════════════════════════════════════════════════════

/// What the subscriber does when the handler returns an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerPolicy {
    /// Log the failure, commit the message and move on.
    #[default]
    Skip,
    /// Leave the message uncommitted and stop the subscriber.
    Halt,
}

/// Subscriber binding: topic + consumer group + failure handling.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriberConfig {
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_group_id")]
    pub group_id: String,
    /// Start position for a group without a committed offset.
    #[serde(default)]
    pub offset_reset: OffsetReset,
    /// Maximum messages taken per poll (memory backend; Kafka polls one
    /// message at a time).
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    #[serde(default)]
    pub handler_policy: HandlerPolicy,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

fn default_topic() -> String {
    DEFAULT_TOPIC.into()
}
fn default_group_id() -> String {
    DEFAULT_GROUP_ID.into()
}
fn default_max_batch() -> usize {
    500
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            group_id: default_group_id(),
            offset_reset: OffsetReset::default(),
            max_batch: default_max_batch(),
            handler_policy: HandlerPolicy::default(),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl SubscriberConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.topic.is_empty() {
            return Err("subscriber.topic must not be empty".into());
        }
        if self.group_id.is_empty() {
            return Err("subscriber.group_id must not be empty".into());
        }
        if self.max_batch == 0 {
            return Err("subscriber.max_batch must be at least 1".into());
        }
        self.reconnect.validate()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Reconnect Config
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_first_ms")]
    pub first_ms: u64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_factor")]
    pub factor: f64,
    /// Consecutive reconnects tried before the subscriber gives up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_first_ms() -> u64 {
    100
}
fn default_max_ms() -> u64 {
    10_000
}
fn default_factor() -> f64 {
    2.0
}
fn default_max_attempts() -> u32 {
    5
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            first_ms: default_first_ms(),
            max_ms: default_max_ms(),
            factor: default_factor(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl ReconnectConfig {
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(self.first_ms),
            max: Duration::from_millis(self.max_ms),
            factor: self.factor,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("subscriber.reconnect.max_attempts must be at least 1".into());
        }
        if self.factor.is_nan() || self.factor < 1.0 {
            return Err(format!("subscriber.reconnect.factor must be >= 1.0 (got {})", self.factor));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Sink Config
// ═══════════════════════════════════════════════════════════════

/// Where consumed messages are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    #[default]
    Stdout,
    File { path: String },
}

impl SinkConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            SinkConfig::File { path } if path.is_empty() => {
                Err("sink.path must not be empty".into())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_log_relay_constants() {
        let cfg: SubscriberConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.topic, "logs-topic");
        assert_eq!(cfg.group_id, "group1");
        assert_eq!(cfg.offset_reset, OffsetReset::Earliest);
        assert_eq!(cfg.handler_policy, HandlerPolicy::Skip);
        assert_eq!(cfg.reconnect.max_attempts, 5);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parses_nested_reconnect() {
        let cfg: SubscriberConfig = toml::from_str(
            r#"
            topic = "audit"
            handler_policy = "halt"
            offset_reset = "latest"

            [reconnect]
            first_ms = 50
            max_attempts = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.topic, "audit");
        assert_eq!(cfg.handler_policy, HandlerPolicy::Halt);
        assert_eq!(cfg.offset_reset, OffsetReset::Latest);
        assert_eq!(cfg.reconnect.backoff().first, Duration::from_millis(50));
        assert_eq!(cfg.reconnect.max_ms, 10_000);
    }

    #[test]
    fn rejects_invalid_values() {
        let cfg = SubscriberConfig { group_id: String::new(), ..Default::default() };
        assert!(cfg.validate().is_err());

        let cfg = SubscriberConfig { max_batch: 0, ..Default::default() };
        assert!(cfg.validate().is_err());

        let mut cfg = SubscriberConfig::default();
        cfg.reconnect.factor = 0.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn sink_config_is_tagged_by_kind() {
        let sink: SinkConfig = toml::from_str(r#"kind = "file"
path = "out.log""#).unwrap();
        assert_eq!(sink, SinkConfig::File { path: "out.log".into() });

        let sink: SinkConfig = toml::from_str(r#"kind = "stdout""#).unwrap();
        assert_eq!(sink, SinkConfig::Stdout);

        assert!(SinkConfig::File { path: String::new() }.validate().is_err());
    }
}
