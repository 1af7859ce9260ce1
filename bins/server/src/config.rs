use std::collections::HashMap;

use clap::{Args, Parser, Subcommand};
use serde::Deserialize;

use relay_api::{AckMode, DEFAULT_BROKER_ADDRESS};
pub use relay_pipeline::{SinkConfig, SubscriberConfig};

use crate::error::ServerError;

#[derive(Parser)]
#[command(name = "log-relay-server", about = "HTTP log ingress relayed through a message broker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the ingress API and the background subscriber
    Serve(ServeArgs),
}

#[derive(Args, Clone, Debug, Default)]
pub struct ServeArgs {
    /// Path to the TOML config file (defaults apply when omitted)
    #[arg(long, env = "CONFIG_PATH")]
    pub config: Option<String>,
    /// Broker address, host:port
    #[arg(long, env = "BROKER_ADDRESS")]
    pub broker_address: Option<String>,
    /// Topic shared by the publisher and the subscriber
    #[arg(long, env = "LOG_TOPIC")]
    pub topic: Option<String>,
    /// Consumer group of the subscriber
    #[arg(long, env = "GROUP_ID")]
    pub group_id: Option<String>,
    /// HTTP port of the ingress API
    #[arg(long, env = "API_PORT")]
    pub api_port: Option<u16>,
}

// ---- TOML Config ----

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-process broker, lives as long as the server.
    #[default]
    Memory,
    /// Kafka via rdkafka (`--features kafka`).
    Kafka,
}

#[derive(Debug, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_broker_address")]
    pub address: String,
    #[serde(default)]
    pub ack_mode: AckMode,
    /// Memory backend: create topics on first use.
    #[serde(default = "default_auto_create_topics")]
    pub auto_create_topics: bool,
    /// Memory backend: messages retained per topic.
    #[serde(default = "default_max_records")]
    pub max_records: usize,
    /// Kafka backend: produce timeout.
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
    /// Kafka backend: extra client properties.
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

fn default_broker_address() -> String {
    DEFAULT_BROKER_ADDRESS.into()
}
fn default_auto_create_topics() -> bool {
    true
}
fn default_max_records() -> usize {
    relay_broker::DEFAULT_MAX_RECORDS
}
fn default_message_timeout_ms() -> u64 {
    5_000
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            address: default_broker_address(),
            ack_mode: AckMode::default(),
            auto_create_topics: default_auto_create_topics(),
            max_records: default_max_records(),
            message_timeout_ms: default_message_timeout_ms(),
            properties: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// How long shutdown waits for the subscriber and API tasks.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub subscriber: SubscriberConfig,
    #[serde(default)]
    pub sink: SinkConfig,
}

fn default_api_port() -> u16 {
    8080
}
fn default_shutdown_timeout_ms() -> u64 {
    5_000
}

impl ServerConfig {
    pub fn load(path: &str) -> Result<Self, ServerError> {
        let content = std::fs::read_to_string(path).map_err(|e| ServerError::Config {
            context: "read",
            detail: format!("'{path}': {e}"),
        })?;
        Self::parse(&content)
            .map_err(|e| match e {
                ServerError::Config { context, detail } => {
                    ServerError::Config { context, detail: format!("'{path}': {detail}") }
                }
                other => other,
            })
    }

    pub fn parse(content: &str) -> Result<Self, ServerError> {
        toml::from_str(content)
            .map_err(|e| ServerError::Config { context: "parse", detail: e.to_string() })
    }

    /// Config file (if any) with CLI/env overrides applied, validated.
    pub fn resolve(args: &ServeArgs) -> Result<Self, ServerError> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => Self::parse("")?,
        };
        if let Some(address) = &args.broker_address {
            config.broker.address = address.clone();
        }
        if let Some(topic) = &args.topic {
            config.subscriber.topic = topic.clone();
        }
        if let Some(group_id) = &args.group_id {
            config.subscriber.group_id = group_id.clone();
        }
        if let Some(port) = args.api_port {
            config.api_port = port;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        let invalid = |detail: String| ServerError::Config { context: "validate", detail };
        self.subscriber.validate().map_err(invalid)?;
        self.sink.validate().map_err(invalid)?;
        if self.broker.max_records == 0 {
            return Err(invalid("broker.max_records must be at least 1".into()));
        }
        if self.broker.backend == BackendKind::Kafka {
            if self.broker.address.is_empty() {
                return Err(invalid("broker.address must not be empty".into()));
            }
            if !cfg!(feature = "kafka") {
                return Err(invalid("kafka backend requires building with --features kafka".into()));
            }
        }
        Ok(())
    }
}
