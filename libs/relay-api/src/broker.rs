use std::future::Future;
use std::pin::Pin;

use crate::{Delivery, HandlerError, PublishError, ReceivedMessage, SubscriptionError};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ════════════════════════════════════════════════════════════════
//  Producer side
// ════════════════════════════════════════════════════════════════

/// Long-lived producer connection.
///
/// Implementations must be safe to share between concurrent ingress
/// requests (`Arc<dyn MessagePublisher>`). A failed publish is reported
/// to the caller and never retried here.
pub trait MessagePublisher: Send + Sync {
    /// Hand `payload` to the broker under `topic`.
    fn publish<'a>(
        &'a self,
        topic: &'a str,
        payload: &'a str,
    ) -> BoxFuture<'a, Result<Delivery, PublishError>>;

    /// Flush buffered messages and release the connection.
    /// Later publishes fail with [`PublishError::Closed`].
    fn close(&self) -> BoxFuture<'_, Result<(), PublishError>>;
}

// ════════════════════════════════════════════════════════════════
//  Consumer side
// ════════════════════════════════════════════════════════════════

/// Opens consumer connections bound to a topic and a consumer group.
/// The subscriber loop calls it again after a transient failure.
pub trait ConsumerConnector: Send + Sync {
    fn connect<'a>(
        &'a self,
        topic: &'a str,
        group: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn MessageStream>, SubscriptionError>>;
}

/// One consumer connection. Owned by exactly one subscriber loop.
pub trait MessageStream: Send {
    /// Wait for the next batch. Returns at least one message, in broker
    /// order. Cancel-safe: dropping the future loses no messages.
    fn poll(&mut self) -> BoxFuture<'_, Result<Vec<ReceivedMessage>, SubscriptionError>>;

    /// Mark `message` as processed for the group (commits `offset + 1`).
    fn commit<'a>(
        &'a mut self,
        message: &'a ReceivedMessage,
    ) -> BoxFuture<'a, Result<(), SubscriptionError>>;

    /// Leave the group and release the connection.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}

// ════════════════════════════════════════════════════════════════
//  Processing
// ════════════════════════════════════════════════════════════════

/// Per-message processing logic invoked by the subscriber loop with the
/// decoded payload.
pub trait MessageHandler: Send + Sync {
    fn handle<'a>(&'a self, payload: &'a str) -> BoxFuture<'a, Result<(), HandlerError>>;
}

/// Adapter turning a synchronous closure into a [`MessageHandler`].
pub struct FnHandler<F> {
    f: F,
}

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&str) -> Result<(), HandlerError> + Send + Sync,
{
    FnHandler { f }
}

impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(&str) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle<'a>(&'a self, payload: &'a str) -> BoxFuture<'a, Result<(), HandlerError>> {
        let result = (self.f)(payload);
        Box::pin(async move { result })
    }
}
