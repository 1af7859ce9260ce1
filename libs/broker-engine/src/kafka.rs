//! Kafka backend built on rdkafka's `FutureProducer` and `StreamConsumer`.
//!
//! Offsets are committed explicitly after the handler returns
//! (`enable.auto.commit=false`), giving at-least-once consumption.

use std::collections::HashMap;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};

use relay_api::{
    AckMode, BoxFuture, ConsumerConnector, Delivery, MessagePublisher, MessageStream,
    OffsetReset, PublishError, ReceivedMessage, SubscriptionError,
};

use crate::BrokerError;

const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

// ═══════════════════════════════════════════════════════════════
//  Settings
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct KafkaSettings {
    /// `host:port[,host:port]`
    pub brokers: String,
    pub ack_mode: AckMode,
    pub offset_reset: OffsetReset,
    /// Upper bound for a produce request, including queueing.
    pub message_timeout: Duration,
    /// Pass-through client properties, applied last.
    pub properties: HashMap<String, String>,
}

impl KafkaSettings {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            ack_mode: AckMode::None,
            offset_reset: OffsetReset::Earliest,
            message_timeout: Duration::from_secs(5),
            properties: HashMap::new(),
        }
    }

    pub fn producer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("acks", self.ack_mode.as_acks_str())
            .set("message.timeout.ms", self.message_timeout.as_millis().to_string());
        self.apply_properties(&mut config);
        config
    }

    pub fn consumer_config(&self, group: &str) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", self.offset_reset.as_str());
        self.apply_properties(&mut config);
        config
    }

    fn apply_properties(&self, config: &mut ClientConfig) {
        for (key, value) in &self.properties {
            config.set(key, value);
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Error mapping
// ═══════════════════════════════════════════════════════════════

fn publish_error(topic: &str, err: KafkaError) -> PublishError {
    match err.rdkafka_error_code() {
        Some(
            RDKafkaErrorCode::UnknownTopic
            | RDKafkaErrorCode::UnknownTopicOrPartition
            | RDKafkaErrorCode::TopicAuthorizationFailed
            | RDKafkaErrorCode::MessageSizeTooLarge
            | RDKafkaErrorCode::InvalidMessage,
        ) => PublishError::Rejected {
            topic: topic.to_string(),
            reason: err.to_string(),
        },
        _ => match err {
            KafkaError::Canceled => PublishError::Closed,
            other => PublishError::Disconnected(other.to_string()),
        },
    }
}

fn subscription_error(topic: &str, err: KafkaError) -> SubscriptionError {
    match err.rdkafka_error_code() {
        Some(RDKafkaErrorCode::UnknownTopic | RDKafkaErrorCode::UnknownTopicOrPartition) => {
            SubscriptionError::UnknownTopic(topic.to_string())
        }
        _ => SubscriptionError::Disconnected(err.to_string()),
    }
}

// ═══════════════════════════════════════════════════════════════
//  KafkaPublisher
// ═══════════════════════════════════════════════════════════════

pub struct KafkaPublisher {
    producer: FutureProducer,
    ack_mode: AckMode,
    queue_timeout: Duration,
}

impl KafkaPublisher {
    pub fn new(settings: &KafkaSettings) -> Result<Self, BrokerError> {
        let producer: FutureProducer =
            settings.producer_config().create().map_err(|e| BrokerError::Client {
                role: "producer",
                detail: e.to_string(),
            })?;
        tracing::info!(
            brokers = %settings.brokers,
            acks = settings.ack_mode.as_acks_str(),
            "kafka producer created"
        );
        Ok(Self {
            producer,
            ack_mode: settings.ack_mode,
            queue_timeout: settings.message_timeout,
        })
    }
}

impl MessagePublisher for KafkaPublisher {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        payload: &'a str,
    ) -> BoxFuture<'a, Result<Delivery, PublishError>> {
        Box::pin(async move {
            if topic.is_empty() {
                return Err(PublishError::EmptyTopic);
            }
            let record = FutureRecord::<(), str>::to(topic).payload(payload);
            let (partition, offset) = self
                .producer
                .send(record, Timeout::After(self.queue_timeout))
                .await
                .map_err(|(e, _)| publish_error(topic, e))?;
            Ok(Delivery {
                topic: topic.to_string(),
                partition,
                // acks=0 reports offset -1
                offset: (self.ack_mode.reports_offset() && offset >= 0).then_some(offset),
            })
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), PublishError>> {
        let producer = self.producer.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || producer.flush(Timeout::After(FLUSH_TIMEOUT)))
                .await
                .map_err(|e| PublishError::Disconnected(format!("flush task: {e}")))?
                .map_err(|e| PublishError::Disconnected(format!("flush: {e}")))?;
            tracing::debug!("kafka producer flushed");
            Ok(())
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  KafkaConnector / KafkaStream
// ═══════════════════════════════════════════════════════════════

pub struct KafkaConnector {
    settings: KafkaSettings,
}

impl KafkaConnector {
    pub fn new(settings: KafkaSettings) -> Self {
        Self { settings }
    }
}

impl ConsumerConnector for KafkaConnector {
    fn connect<'a>(
        &'a self,
        topic: &'a str,
        group: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn MessageStream>, SubscriptionError>> {
        Box::pin(async move {
            let connect_err = |reason: String| SubscriptionError::Connect {
                topic: topic.to_string(),
                group: group.to_string(),
                reason,
            };
            let consumer: StreamConsumer = self
                .settings
                .consumer_config(group)
                .create()
                .map_err(|e| connect_err(e.to_string()))?;
            consumer.subscribe(&[topic]).map_err(|e| connect_err(e.to_string()))?;
            tracing::info!(
                brokers = %self.settings.brokers,
                topic = %topic,
                group = %group,
                "kafka consumer subscribed"
            );
            Ok(Box::new(KafkaStream {
                consumer: Some(consumer),
                topic: topic.to_string(),
            }) as Box<dyn MessageStream>)
        })
    }
}

struct KafkaStream {
    consumer: Option<StreamConsumer>,
    topic: String,
}

impl MessageStream for KafkaStream {
    /// One message per batch; librdkafka does its own prefetching.
    fn poll(&mut self) -> BoxFuture<'_, Result<Vec<ReceivedMessage>, SubscriptionError>> {
        Box::pin(async move {
            let consumer = self
                .consumer
                .as_ref()
                .ok_or_else(|| SubscriptionError::Disconnected("consumer closed".into()))?;
            let message = consumer
                .recv()
                .await
                .map_err(|e| subscription_error(&self.topic, e))?;
            Ok(vec![ReceivedMessage::from_bytes(
                message.topic(),
                message.partition(),
                message.offset(),
                message.payload().unwrap_or_default(),
            )])
        })
    }

    fn commit<'a>(
        &'a mut self,
        message: &'a ReceivedMessage,
    ) -> BoxFuture<'a, Result<(), SubscriptionError>> {
        Box::pin(async move {
            let consumer = self
                .consumer
                .as_ref()
                .ok_or_else(|| SubscriptionError::Commit("consumer closed".into()))?;
            let mut tpl = TopicPartitionList::new();
            let next = Offset::Offset(message.offset + 1);
            tpl.add_partition_offset(&message.topic, message.partition, next)
                .map_err(|e| SubscriptionError::Commit(e.to_string()))?;
            consumer
                .commit(&tpl, CommitMode::Async)
                .map_err(|e| SubscriptionError::Commit(e.to_string()))
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        if let Some(consumer) = self.consumer.take() {
            consumer.unsubscribe();
            tracing::debug!(topic = %self.topic, "kafka consumer closed");
        }
        Box::pin(async {})
    }
}
