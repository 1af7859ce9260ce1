#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("broker: {0}")]
    Backend(#[from] relay_broker::BrokerError),

    #[error("sink: {0}")]
    Sink(#[from] relay_api::HandlerError),

    #[error("publisher: {0}")]
    Publish(#[from] relay_api::PublishError),

    #[error("{0}")]
    Subscriber(#[from] relay_pipeline::SubscriberError),

    #[error("{0}")]
    Api(#[from] log_api_server::ApiError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),

    #[error("task: {0}")]
    Join(#[from] tokio::task::JoinError),
}
