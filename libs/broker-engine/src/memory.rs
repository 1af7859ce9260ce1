//! In-process broker.
//!
//! Each topic is a single append-only partition holding at most
//! `max_records` messages; older ones are dropped while offsets keep
//! counting up. Consumer groups keep a committed offset per topic; a new
//! connection for a group resumes from it, or from the oldest retained
//! message if that offset was already dropped. The broker can sever live
//! connections and refuse new ones, which is how connection loss is
//! exercised without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{Mutex, RwLock, watch};

use relay_api::{
    AckMode, BoxFuture, ConsumerConnector, Delivery, MessagePublisher, MessageStream,
    OffsetReset, PublishError, ReceivedMessage, SubscriptionError,
};

use crate::BrokerError;

const PARTITION: i32 = 0;

// ═══════════════════════════════════════════════════════════════
//  Config
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct MemoryBrokerConfig {
    /// Create unknown topics on first publish/subscribe instead of
    /// rejecting them.
    pub auto_create_topics: bool,
    /// Messages retained per topic.
    pub max_records: usize,
}

pub const DEFAULT_MAX_RECORDS: usize = 100_000;

impl Default for MemoryBrokerConfig {
    fn default() -> Self {
        Self {
            auto_create_topics: true,
            max_records: DEFAULT_MAX_RECORDS,
        }
    }
}

/// Consumer-side connection options.
#[derive(Debug, Clone, Copy)]
pub struct ConsumerOptions {
    pub offset_reset: OffsetReset,
    /// Upper bound on messages returned by one poll. The Kafka backend
    /// hands out one message per poll regardless.
    pub max_batch: usize,
}

impl Default for ConsumerOptions {
    fn default() -> Self {
        Self {
            offset_reset: OffsetReset::Earliest,
            max_batch: 500,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  TopicLog
// ═══════════════════════════════════════════════════════════════

#[derive(Default)]
struct Records {
    /// Offset of `entries[0]`.
    base: u64,
    entries: VecDeque<String>,
}

impl Records {
    fn next_offset(&self) -> u64 {
        self.base + self.entries.len() as u64
    }
}

struct TopicLog {
    name: String,
    records: RwLock<Records>,
    max_records: usize,
    /// Offset the next append gets; consumers wait on changes.
    high_water: watch::Sender<u64>,
    committed: Mutex<HashMap<String, u64>>,
}

impl TopicLog {
    fn new(name: &str, max_records: usize) -> Self {
        let (high_water, _) = watch::channel(0);
        Self {
            name: name.to_string(),
            records: RwLock::new(Records::default()),
            max_records: max_records.max(1),
            high_water,
            committed: Mutex::new(HashMap::new()),
        }
    }

    async fn append(&self, payload: &str) -> i64 {
        let mut records = self.records.write().await;
        let offset = records.next_offset();
        records.entries.push_back(payload.to_string());
        if records.entries.len() > self.max_records {
            records.entries.pop_front();
            records.base += 1;
        }
        self.high_water.send_replace(records.next_offset());
        offset as i64
    }

    /// Up to `max` messages starting at `from`, or at the oldest retained
    /// one if `from` was already dropped.
    async fn read(&self, from: u64, max: usize) -> Vec<ReceivedMessage> {
        let records = self.records.read().await;
        let start = from.max(records.base);
        records
            .entries
            .iter()
            .skip((start - records.base) as usize)
            .take(max)
            .zip(start..)
            .map(|(payload, offset)| ReceivedMessage {
                topic: self.name.clone(),
                partition: PARTITION,
                offset: offset as i64,
                payload: payload.clone(),
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Shared broker state
// ═══════════════════════════════════════════════════════════════

struct Shared {
    topics: RwLock<HashMap<String, Arc<TopicLog>>>,
    auto_create: bool,
    max_records: usize,
    available: AtomicBool,
    /// Bumped by `sever_connections`; connections opened under an older
    /// epoch are dead.
    epoch: watch::Sender<u64>,
    connections: AtomicUsize,
}

impl Shared {
    async fn topic(&self, name: &str) -> Option<Arc<TopicLog>> {
        if let Some(log) = self.topics.read().await.get(name) {
            return Some(log.clone());
        }
        if !self.auto_create {
            return None;
        }
        let mut topics = self.topics.write().await;
        let log = topics.entry(name.to_string()).or_insert_with(|| {
            tracing::info!(topic = %name, "auto-created topic");
            Arc::new(TopicLog::new(name, self.max_records))
        });
        Some(log.clone())
    }

    fn open(self: &Arc<Self>) -> Result<Connection, BrokerError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable);
        }
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Connection {
            shared: self.clone(),
            epoch: *self.epoch.borrow(),
        })
    }
}

/// A live connection. Released when dropped.
struct Connection {
    shared: Arc<Shared>,
    epoch: u64,
}

impl Connection {
    fn is_severed(&self) -> bool {
        *self.shared.epoch.borrow() != self.epoch
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.connections.fetch_sub(1, Ordering::SeqCst);
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryBroker
// ═══════════════════════════════════════════════════════════════

/// Handle to an in-process broker. Clones share the same topics.
#[derive(Clone)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new(MemoryBrokerConfig::default())
    }
}

impl MemoryBroker {
    pub fn new(config: MemoryBrokerConfig) -> Self {
        let (epoch, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                topics: RwLock::new(HashMap::new()),
                auto_create: config.auto_create_topics,
                max_records: config.max_records,
                available: AtomicBool::new(true),
                epoch,
                connections: AtomicUsize::new(0),
            }),
        }
    }

    pub async fn create_topic(&self, name: &str) -> Result<(), BrokerError> {
        let mut topics = self.shared.topics.write().await;
        if topics.contains_key(name) {
            return Err(BrokerError::TopicExists(name.to_string()));
        }
        let log = TopicLog::new(name, self.shared.max_records);
        topics.insert(name.to_string(), Arc::new(log));
        tracing::info!(topic = %name, "created topic");
        Ok(())
    }

    /// Open a producer connection.
    pub fn producer(&self, ack_mode: AckMode) -> Result<MemoryProducer, BrokerError> {
        let conn = self.shared.open()?;
        Ok(MemoryProducer {
            conn: RwLock::new(Some(conn)),
            ack_mode,
        })
    }

    pub fn connector(&self, options: ConsumerOptions) -> MemoryConnector {
        MemoryConnector {
            shared: self.shared.clone(),
            options,
        }
    }

    /// Kill every open connection. Clients notice on their next call;
    /// consumers blocked in `poll` are woken.
    pub fn sever_connections(&self) {
        self.shared.epoch.send_modify(|epoch| *epoch += 1);
        tracing::warn!("severed all broker connections");
    }

    /// Refuse (`false`) or accept (`true`) new connections.
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    /// Connections opened and not yet released.
    pub fn active_connections(&self) -> usize {
        self.shared.connections.load(Ordering::SeqCst)
    }

    pub async fn committed_offset(&self, topic: &str, group: &str) -> Option<u64> {
        let log = self.shared.topics.read().await.get(topic).cloned()?;
        let committed = log.committed.lock().await;
        committed.get(group).copied()
    }

    /// Snapshot of the payloads retained under `topic`.
    pub async fn messages(&self, topic: &str) -> Vec<String> {
        let log = self.shared.topics.read().await.get(topic).cloned();
        match log {
            Some(log) => log.records.read().await.entries.iter().cloned().collect(),
            None => Vec::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryProducer
// ═══════════════════════════════════════════════════════════════

pub struct MemoryProducer {
    conn: RwLock<Option<Connection>>,
    ack_mode: AckMode,
}

impl MessagePublisher for MemoryProducer {
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        payload: &'a str,
    ) -> BoxFuture<'a, Result<Delivery, PublishError>> {
        Box::pin(async move {
            if topic.is_empty() {
                return Err(PublishError::EmptyTopic);
            }
            let guard = self.conn.read().await;
            let conn = guard.as_ref().ok_or(PublishError::Closed)?;
            if conn.is_severed() {
                return Err(PublishError::Disconnected("connection severed by broker".into()));
            }
            let log = conn.shared.topic(topic).await.ok_or_else(|| PublishError::Rejected {
                topic: topic.to_string(),
                reason: "unknown topic or partition".into(),
            })?;
            let offset = log.append(payload).await;
            tracing::trace!(topic = %topic, offset, "appended message");
            Ok(Delivery {
                topic: topic.to_string(),
                partition: PARTITION,
                offset: self.ack_mode.reports_offset().then_some(offset),
            })
        })
    }

    fn close(&self) -> BoxFuture<'_, Result<(), PublishError>> {
        Box::pin(async move {
            if self.conn.write().await.take().is_some() {
                tracing::debug!("producer connection released");
            }
            Ok(())
        })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryConnector / MemoryConsumer
// ═══════════════════════════════════════════════════════════════

pub struct MemoryConnector {
    shared: Arc<Shared>,
    options: ConsumerOptions,
}

impl ConsumerConnector for MemoryConnector {
    fn connect<'a>(
        &'a self,
        topic: &'a str,
        group: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn MessageStream>, SubscriptionError>> {
        Box::pin(async move {
            let conn = self.shared.open().map_err(|e| SubscriptionError::Connect {
                topic: topic.to_string(),
                group: group.to_string(),
                reason: e.to_string(),
            })?;
            let log = self
                .shared
                .topic(topic)
                .await
                .ok_or_else(|| SubscriptionError::UnknownTopic(topic.to_string()))?;

            let committed = log.committed.lock().await.get(group).copied();
            let position = match (committed, self.options.offset_reset) {
                (Some(offset), _) => offset,
                (None, OffsetReset::Earliest) => 0,
                (None, OffsetReset::Latest) => *log.high_water.borrow(),
            };
            tracing::debug!(topic = %topic, group = %group, position, "consumer joined group");

            let high_water = log.high_water.subscribe();
            let epoch = self.shared.epoch.subscribe();
            Ok(Box::new(MemoryConsumer {
                conn: Some(conn),
                log,
                group: group.to_string(),
                position,
                max_batch: self.options.max_batch.max(1),
                high_water,
                epoch,
            }) as Box<dyn MessageStream>)
        })
    }
}

struct MemoryConsumer {
    conn: Option<Connection>,
    log: Arc<TopicLog>,
    group: String,
    /// Next offset to hand out. Reset to the committed offset on reconnect.
    position: u64,
    max_batch: usize,
    high_water: watch::Receiver<u64>,
    epoch: watch::Receiver<u64>,
}

impl MemoryConsumer {
    fn check_connection(&self) -> Result<(), String> {
        match &self.conn {
            None => Err("consumer closed".into()),
            Some(conn) if conn.is_severed() => Err("connection severed by broker".into()),
            Some(_) => Ok(()),
        }
    }
}

impl MessageStream for MemoryConsumer {
    fn poll(&mut self) -> BoxFuture<'_, Result<Vec<ReceivedMessage>, SubscriptionError>> {
        Box::pin(async move {
            loop {
                self.check_connection().map_err(SubscriptionError::Disconnected)?;

                let available = *self.high_water.borrow_and_update();
                if available > self.position {
                    let batch = self.log.read(self.position, self.max_batch).await;
                    if let Some(last) = batch.last() {
                        self.position = last.offset as u64 + 1;
                    }
                    return Ok(batch);
                }

                tokio::select! {
                    changed = self.high_water.changed() => {
                        if changed.is_err() {
                            return Err(SubscriptionError::Disconnected("topic closed".into()));
                        }
                    }
                    changed = self.epoch.changed() => {
                        if changed.is_err() {
                            return Err(SubscriptionError::Disconnected("broker shut down".into()));
                        }
                    }
                }
            }
        })
    }

    fn commit<'a>(
        &'a mut self,
        message: &'a ReceivedMessage,
    ) -> BoxFuture<'a, Result<(), SubscriptionError>> {
        Box::pin(async move {
            self.check_connection().map_err(SubscriptionError::Commit)?;
            let next = message.offset as u64 + 1;
            let mut committed = self.log.committed.lock().await;
            let entry = committed.entry(self.group.clone()).or_insert(0);
            if next > *entry {
                *entry = next;
            }
            Ok(())
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        if self.conn.take().is_some() {
            tracing::debug!(topic = %self.log.name, group = %self.group, "consumer left group");
        }
        Box::pin(async {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const TOPIC: &str = "logs-topic";
    const GROUP: &str = "group1";

    async fn poll_within(stream: &mut Box<dyn MessageStream>) -> Vec<ReceivedMessage> {
        tokio::time::timeout(Duration::from_secs(2), stream.poll())
            .await
            .expect("poll timed out")
            .expect("poll failed")
    }

    async fn connect(broker: &MemoryBroker) -> Result<Box<dyn MessageStream>, SubscriptionError> {
        broker.connector(ConsumerOptions::default()).connect(TOPIC, GROUP).await
    }

    fn payloads(batch: &[ReceivedMessage]) -> Vec<&str> {
        batch.iter().map(|m| m.payload.as_str()).collect()
    }

    #[tokio::test]
    async fn publish_then_poll_in_order() {
        let broker = MemoryBroker::default();
        let producer = broker.producer(AckMode::Leader).unwrap();
        for (i, p) in ["A", "B", "C"].iter().enumerate() {
            let delivery = producer.publish(TOPIC, p).await.unwrap();
            assert_eq!(delivery.offset, Some(i as i64));
            assert_eq!(delivery.partition, 0);
        }

        let mut stream = connect(&broker).await.unwrap();
        let batch = poll_within(&mut stream).await;
        assert_eq!(payloads(&batch), ["A", "B", "C"]);
        assert_eq!(batch[2].offset, 2);
    }

    #[tokio::test]
    async fn fire_and_forget_reports_no_offset() {
        let broker = MemoryBroker::default();
        let producer = broker.producer(AckMode::None).unwrap();
        let delivery = producer.publish(TOPIC, "x").await.unwrap();
        assert_eq!(delivery.offset, None);
        assert_eq!(broker.messages(TOPIC).await, ["x"]);
    }

    #[tokio::test]
    async fn empty_payload_is_accepted_empty_topic_is_not() {
        let broker = MemoryBroker::default();
        let producer = broker.producer(AckMode::None).unwrap();
        assert!(producer.publish(TOPIC, "").await.is_ok());
        assert_eq!(producer.publish("", "x").await, Err(PublishError::EmptyTopic));
    }

    #[tokio::test]
    async fn unknown_topic_rejected_without_auto_create() {
        let broker = MemoryBroker::new(MemoryBrokerConfig {
            auto_create_topics: false,
            ..Default::default()
        });
        let producer = broker.producer(AckMode::None).unwrap();
        let err = producer.publish(TOPIC, "x").await.unwrap_err();
        assert!(matches!(err, PublishError::Rejected { .. }));

        let err = connect(&broker).await.err().unwrap();
        assert_eq!(err, SubscriptionError::UnknownTopic(TOPIC.into()));
        // the failed connect released its connection
        assert_eq!(broker.active_connections(), 1);

        broker.create_topic(TOPIC).await.unwrap();
        assert!(producer.publish(TOPIC, "x").await.is_ok());
        assert!(matches!(broker.create_topic(TOPIC).await, Err(BrokerError::TopicExists(_))));
    }

    #[tokio::test]
    async fn severed_producer_fails_instead_of_succeeding() {
        let broker = MemoryBroker::default();
        let producer = broker.producer(AckMode::None).unwrap();
        broker.sever_connections();
        let err = producer.publish(TOPIC, "lost").await.unwrap_err();
        assert!(matches!(err, PublishError::Disconnected(_)));
        assert!(broker.messages(TOPIC).await.is_empty());
    }

    #[tokio::test]
    async fn closed_producer_releases_connection() {
        let broker = MemoryBroker::default();
        let producer = broker.producer(AckMode::None).unwrap();
        assert_eq!(broker.active_connections(), 1);
        producer.close().await.unwrap();
        assert_eq!(broker.active_connections(), 0);
        assert_eq!(producer.publish(TOPIC, "x").await, Err(PublishError::Closed));
    }

    #[tokio::test]
    async fn unavailable_broker_refuses_connections() {
        let broker = MemoryBroker::default();
        broker.set_available(false);
        assert!(matches!(broker.producer(AckMode::None), Err(BrokerError::Unavailable)));
        let err = connect(&broker).await.err().unwrap();
        assert!(matches!(err, SubscriptionError::Connect { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn poll_wakes_on_publish() {
        let broker = MemoryBroker::default();
        let mut stream = connect(&broker).await.unwrap();
        let waiter = tokio::spawn(async move {
            let batch = stream.poll().await.unwrap();
            batch.into_iter().map(|m| m.payload).collect::<Vec<_>>()
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        broker.producer(AckMode::None).unwrap().publish(TOPIC, "late").await.unwrap();

        let got = tokio::time::timeout(Duration::from_secs(2), waiter).await.unwrap().unwrap();
        assert_eq!(got, ["late"]);
    }

    #[tokio::test]
    async fn sever_wakes_blocked_poll() {
        let broker = MemoryBroker::default();
        let mut stream = connect(&broker).await.unwrap();
        let waiter = tokio::spawn(async move { stream.poll().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        broker.sever_connections();

        let result = tokio::time::timeout(Duration::from_secs(2), waiter).await.unwrap().unwrap();
        assert!(matches!(result, Err(SubscriptionError::Disconnected(_))));
        // the task dropped the stream
        assert_eq!(broker.active_connections(), 0);
    }

    #[tokio::test]
    async fn reconnect_resumes_from_committed_offset() {
        let broker = MemoryBroker::default();
        let producer = broker.producer(AckMode::None).unwrap();
        for p in ["A", "B", "C"] {
            producer.publish(TOPIC, p).await.unwrap();
        }
        let connector = broker.connector(ConsumerOptions::default());

        let mut stream = connector.connect(TOPIC, GROUP).await.unwrap();
        let batch = poll_within(&mut stream).await;
        stream.commit(&batch[0]).await.unwrap();
        stream.close().await;
        assert_eq!(broker.committed_offset(TOPIC, GROUP).await, Some(1));

        let mut stream = connector.connect(TOPIC, GROUP).await.unwrap();
        let batch = poll_within(&mut stream).await;
        assert_eq!(payloads(&batch), ["B", "C"]);
    }

    #[tokio::test]
    async fn commit_never_moves_backwards() {
        let broker = MemoryBroker::default();
        let producer = broker.producer(AckMode::None).unwrap();
        producer.publish(TOPIC, "A").await.unwrap();
        producer.publish(TOPIC, "B").await.unwrap();
        let mut stream = connect(&broker).await.unwrap();
        let batch = poll_within(&mut stream).await;
        stream.commit(&batch[1]).await.unwrap();
        stream.commit(&batch[0]).await.unwrap();
        assert_eq!(broker.committed_offset(TOPIC, GROUP).await, Some(2));
    }

    #[tokio::test]
    async fn latest_reset_skips_existing_messages() {
        let broker = MemoryBroker::default();
        let producer = broker.producer(AckMode::None).unwrap();
        producer.publish(TOPIC, "old").await.unwrap();

        let options = ConsumerOptions { offset_reset: OffsetReset::Latest, ..Default::default() };
        let mut stream = broker.connector(options).connect(TOPIC, GROUP).await.unwrap();
        producer.publish(TOPIC, "new").await.unwrap();
        let batch = poll_within(&mut stream).await;
        assert_eq!(payloads(&batch), ["new"]);
    }

    #[tokio::test]
    async fn batches_are_capped() {
        let broker = MemoryBroker::default();
        let producer = broker.producer(AckMode::None).unwrap();
        for p in ["1", "2", "3"] {
            producer.publish(TOPIC, p).await.unwrap();
        }
        let options = ConsumerOptions { max_batch: 2, ..Default::default() };
        let mut stream = broker.connector(options).connect(TOPIC, GROUP).await.unwrap();
        assert_eq!(payloads(&poll_within(&mut stream).await), ["1", "2"]);
        assert_eq!(payloads(&poll_within(&mut stream).await), ["3"]);
    }

    #[tokio::test]
    async fn groups_track_offsets_independently() {
        let broker = MemoryBroker::default();
        broker.producer(AckMode::None).unwrap().publish(TOPIC, "A").await.unwrap();
        let connector = broker.connector(ConsumerOptions::default());

        let mut first = connector.connect(TOPIC, GROUP).await.unwrap();
        let batch = poll_within(&mut first).await;
        first.commit(&batch[0]).await.unwrap();

        let mut second = connector.connect(TOPIC, "group2").await.unwrap();
        assert_eq!(payloads(&poll_within(&mut second).await), ["A"]);
        assert_eq!(broker.committed_offset(TOPIC, "group2").await, None);
    }

    fn capped(max_records: usize) -> MemoryBroker {
        MemoryBroker::new(MemoryBrokerConfig {
            max_records,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn retention_drops_oldest_and_keeps_offsets() {
        let broker = capped(2);
        let producer = broker.producer(AckMode::Leader).unwrap();
        for p in ["A", "B", "C"] {
            producer.publish(TOPIC, p).await.unwrap();
        }
        let delivery = producer.publish(TOPIC, "D").await.unwrap();
        assert_eq!(delivery.offset, Some(3));
        assert_eq!(broker.messages(TOPIC).await, ["C", "D"]);

        let mut stream = connect(&broker).await.unwrap();
        let batch = poll_within(&mut stream).await;
        assert_eq!(payloads(&batch), ["C", "D"]);
        assert_eq!(batch[0].offset, 2);
        assert_eq!(batch[1].offset, 3);
    }

    #[tokio::test]
    async fn committed_group_resumes_after_trimming() {
        let broker = capped(3);
        let producer = broker.producer(AckMode::None).unwrap();
        for p in ["A", "B", "C"] {
            producer.publish(TOPIC, p).await.unwrap();
        }
        let connector = broker.connector(ConsumerOptions::default());

        let mut stream = connector.connect(TOPIC, GROUP).await.unwrap();
        let batch = poll_within(&mut stream).await;
        stream.commit(&batch[1]).await.unwrap();
        stream.close().await;
        assert_eq!(broker.committed_offset(TOPIC, GROUP).await, Some(2));

        // drops A and B; C (offset 2) is still retained
        producer.publish(TOPIC, "D").await.unwrap();
        producer.publish(TOPIC, "E").await.unwrap();

        let mut stream = connector.connect(TOPIC, GROUP).await.unwrap();
        let batch = poll_within(&mut stream).await;
        assert_eq!(payloads(&batch), ["C", "D", "E"]);
        assert_eq!(batch[0].offset, 2);
        stream.commit(&batch[2]).await.unwrap();
        assert_eq!(broker.committed_offset(TOPIC, GROUP).await, Some(5));
    }

    #[tokio::test]
    async fn offset_behind_retention_skips_to_oldest() {
        let broker = capped(1);
        let producer = broker.producer(AckMode::None).unwrap();
        producer.publish(TOPIC, "A").await.unwrap();
        let connector = broker.connector(ConsumerOptions::default());

        let mut stream = connector.connect(TOPIC, GROUP).await.unwrap();
        let batch = poll_within(&mut stream).await;
        stream.commit(&batch[0]).await.unwrap();
        stream.close().await;

        for p in ["B", "C"] {
            producer.publish(TOPIC, p).await.unwrap();
        }
        let mut stream = connector.connect(TOPIC, GROUP).await.unwrap();
        let batch = poll_within(&mut stream).await;
        assert_eq!(payloads(&batch), ["C"]);
        assert_eq!(batch[0].offset, 2);
    }

    #[tokio::test]
    async fn commit_after_sever_fails() {
        let broker = MemoryBroker::default();
        broker.producer(AckMode::None).unwrap().publish(TOPIC, "A").await.unwrap();
        let mut stream = connect(&broker).await.unwrap();
        let batch = poll_within(&mut stream).await;
        broker.sever_connections();
        let err = stream.commit(&batch[0]).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::Commit(_)));
        assert_eq!(broker.committed_offset(TOPIC, GROUP).await, None);
    }
}
