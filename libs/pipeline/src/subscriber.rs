use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use relay_api::{
    ConsumerConnector, MessageHandler, MessageStream, ReceivedMessage, SubscriptionError,
};

use crate::{BackoffPolicy, HandlerPolicy, SubscriberConfig, SubscriberError};

// ═══════════════════════════════════════════════════════════════
//  State
// ═══════════════════════════════════════════════════════════════

/// Lifecycle of a subscriber loop.
///
/// `Starting → Polling → Delivering → Polling …`; `Stopped` after
/// cancellation, `Failed` after an unrecoverable error. Neither of the
/// last two is ever left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Starting,
    Polling,
    Delivering,
    Stopped,
    Failed,
}

enum ConsumeError {
    /// Connection-level failure; reconnect may help.
    Stream(SubscriptionError),
    /// Ends the loop.
    Fatal(SubscriberError),
}

// ═══════════════════════════════════════════════════════════════
//  Subscriber
// ═══════════════════════════════════════════════════════════════

/// Consumes one topic under one consumer group and invokes the handler
/// for every message, committing the offset after the handler returns.
///
/// A message is redelivered after a reconnect if its commit did not reach
/// the broker. There is no timeout on handler calls: a slow handler
/// stalls polling.
pub struct Subscriber {
    connector: Arc<dyn ConsumerConnector>,
    handler: Arc<dyn MessageHandler>,
    config: SubscriberConfig,
    backoff: BackoffPolicy,
    state: watch::Sender<SubscriberState>,
}

impl Subscriber {
    pub fn new(
        connector: Arc<dyn ConsumerConnector>,
        handler: Arc<dyn MessageHandler>,
        config: SubscriberConfig,
    ) -> Self {
        let backoff = config.reconnect.backoff();
        let (state, _) = watch::channel(SubscriberState::Starting);
        Self {
            connector,
            handler,
            config,
            backoff,
            state,
        }
    }

    pub fn state(&self) -> watch::Receiver<SubscriberState> {
        self.state.subscribe()
    }

    /// Run until `token` is cancelled (`Ok`) or an unrecoverable error
    /// occurs (`Err`).
    pub async fn run(self, token: CancellationToken) -> Result<(), SubscriberError> {
        tracing::info!(
            topic = %self.config.topic,
            group = %self.config.group_id,
            "subscriber starting"
        );
        let result = self.run_loop(&token).await;
        match &result {
            Ok(()) => {
                self.set_state(SubscriberState::Stopped);
                tracing::info!(topic = %self.config.topic, "subscriber stopped");
            }
            Err(e) => {
                self.set_state(SubscriberState::Failed);
                tracing::error!(topic = %self.config.topic, error = %e, "subscriber failed");
            }
        }
        result
    }

    fn set_state(&self, state: SubscriberState) {
        let prev = self.state.send_replace(state);
        if prev != state {
            tracing::trace!(
                topic = %self.config.topic,
                from = ?prev,
                to = ?state,
                "subscriber state"
            );
        }
    }

    async fn run_loop(&self, token: &CancellationToken) -> Result<(), SubscriberError> {
        let topic = self.config.topic.as_str();
        let group = self.config.group_id.as_str();
        // consecutive reconnects without an open stream
        let mut attempt: u32 = 0;

        loop {
            self.set_state(SubscriberState::Starting);
            let connected = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                r = self.connector.connect(topic, group) => r,
            };

            let error = match connected {
                Ok(mut stream) => {
                    attempt = 0;
                    let outcome = self.consume(&mut stream, token).await;
                    stream.close().await;
                    match outcome {
                        Ok(()) => return Ok(()),
                        Err(ConsumeError::Fatal(e)) => return Err(e),
                        Err(ConsumeError::Stream(e)) => e,
                    }
                }
                Err(e) => e,
            };

            if !self.wait_before_reconnect(error, &mut attempt, token).await? {
                return Ok(());
            }
        }
    }

    /// Poll → deliver until cancelled or the connection fails.
    async fn consume(
        &self,
        stream: &mut Box<dyn MessageStream>,
        token: &CancellationToken,
    ) -> Result<(), ConsumeError> {
        loop {
            self.set_state(SubscriberState::Polling);
            let batch = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                r = stream.poll() => r.map_err(ConsumeError::Stream)?,
            };

            self.set_state(SubscriberState::Delivering);
            for message in &batch {
                if token.is_cancelled() {
                    return Ok(());
                }
                self.deliver(stream, message).await?;
            }
        }
    }

    async fn deliver(
        &self,
        stream: &mut Box<dyn MessageStream>,
        message: &ReceivedMessage,
    ) -> Result<(), ConsumeError> {
        if let Err(e) = self.handler.handle(&message.payload).await {
            match self.config.handler_policy {
                HandlerPolicy::Skip => {
                    tracing::error!(
                        topic = %message.topic,
                        partition = message.partition,
                        offset = message.offset,
                        error = %e,
                        "handler failed, skipping message"
                    );
                }
                HandlerPolicy::Halt => {
                    return Err(ConsumeError::Fatal(SubscriberError::Handler {
                        topic: message.topic.clone(),
                        partition: message.partition,
                        offset: message.offset,
                        source: e,
                    }));
                }
            }
        }
        stream.commit(message).await.map_err(ConsumeError::Stream)
    }

    /// Decide what follows a connection failure. `Ok(true)`: reconnect,
    /// `Ok(false)`: cancelled while waiting.
    async fn wait_before_reconnect(
        &self,
        error: SubscriptionError,
        attempt: &mut u32,
        token: &CancellationToken,
    ) -> Result<bool, SubscriberError> {
        if !error.is_transient() {
            return Err(SubscriberError::Subscription {
                topic: self.config.topic.clone(),
                source: error,
            });
        }
        if *attempt >= self.config.reconnect.max_attempts {
            return Err(SubscriberError::Exhausted {
                attempts: *attempt,
                last: error,
            });
        }

        let delay = self.backoff.next(*attempt);
        *attempt += 1;
        tracing::warn!(
            topic = %self.config.topic,
            attempt = *attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "subscription interrupted, reconnecting"
        );

        tokio::select! {
            biased;
            _ = token.cancelled() => Ok(false),
            _ = tokio::time::sleep(delay) => Ok(true),
        }
    }
}

/// Run `subscriber` on its own task.
pub fn spawn_subscriber(
    subscriber: Subscriber,
    token: CancellationToken,
) -> JoinHandle<Result<(), SubscriberError>> {
    tokio::spawn(subscriber.run(token))
}
