//! Shared data model and connection seams for the log relay.
//!
//! Everything the ingress adapter, the broker backends and the subscriber
//! loop agree on lives here: the [`LogRecord`] and its wire encoding, the
//! error taxonomy, and the traits each broker backend implements.

pub mod broker;
pub mod codec;
pub mod error;
pub mod types;

pub use broker::{
    BoxFuture, ConsumerConnector, FnHandler, MessageHandler, MessagePublisher, MessageStream,
    handler_fn,
};
pub use codec::encode;
pub use error::{ErrorKind, HandlerError, PublishError, SubscriptionError};
pub use types::{
    AckMode, DEFAULT_BROKER_ADDRESS, DEFAULT_GROUP_ID, DEFAULT_TOPIC, Delivery, LogRecord,
    OffsetReset, ReceivedMessage,
};
