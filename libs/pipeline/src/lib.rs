pub mod backoff;
pub mod config;
pub mod error;
pub mod sink;
mod subscriber;

pub use backoff::BackoffPolicy;
pub use config::{HandlerPolicy, ReconnectConfig, SinkConfig, SubscriberConfig};
pub use error::SubscriberError;
pub use sink::{FileSink, StdoutSink, WriterSink, build_sink, format_line};
pub use subscriber::{Subscriber, SubscriberState, spawn_subscriber};
