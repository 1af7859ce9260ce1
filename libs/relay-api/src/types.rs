use serde::{Deserialize, Serialize};

/// Topic used by both ingress and subscriber unless configured otherwise.
pub const DEFAULT_TOPIC: &str = "logs-topic";
/// Consumer group tracking the subscriber's offsets.
pub const DEFAULT_GROUP_ID: &str = "group1";
pub const DEFAULT_BROKER_ADDRESS: &str = "localhost:9092";

// ════════════════════════════════════════════════════════════════
//  LogRecord
// ════════════════════════════════════════════════════════════════

/// Structured log line accepted by the ingress adapter.
///
/// Fields are private: a record is immutable once built, either through
/// [`LogRecord::new`] or by deserializing a `{level, message}` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    level: String,
    message: String,
}

impl LogRecord {
    pub fn new(level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            message: message.into(),
        }
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// ════════════════════════════════════════════════════════════════
//  Delivery / ReceivedMessage
// ════════════════════════════════════════════════════════════════

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    /// Broker-assigned offset. `None` when the acknowledgment mode does
    /// not wait for the broker to report one.
    pub offset: Option<i64>,
}

/// A message handed out by [`MessageStream::poll`](crate::MessageStream::poll).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    /// Decoded value. Invalid UTF-8 is replaced, never rejected.
    pub payload: String,
}

impl ReceivedMessage {
    /// Decode a raw broker value the way a string deserializer would.
    pub fn from_bytes(topic: impl Into<String>, partition: i32, offset: i64, value: &[u8]) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            payload: String::from_utf8_lossy(value).into_owned(),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  Broker settings
// ════════════════════════════════════════════════════════════════

/// How long the producer waits for the broker before `publish` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckMode {
    /// Fire-and-forget (`acks=0`). Lowest latency; a broker-side failure
    /// after the send loses the message silently.
    #[default]
    None,
    /// Partition leader has written the message (`acks=1`).
    Leader,
    /// All in-sync replicas have the message (`acks=all`).
    All,
}

impl AckMode {
    /// Value of the producer `acks` property.
    pub fn as_acks_str(&self) -> &'static str {
        match self {
            AckMode::None => "0",
            AckMode::Leader => "1",
            AckMode::All => "all",
        }
    }

    /// Whether the producer learns the assigned offset.
    pub fn reports_offset(&self) -> bool {
        !matches!(self, AckMode::None)
    }
}

/// Start position for a group that has no committed offset yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OffsetReset {
    #[default]
    Earliest,
    Latest,
}

impl OffsetReset {
    pub fn as_str(&self) -> &'static str {
        match self {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        }
    }
}
