#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker unavailable")]
    Unavailable,

    #[error("topic '{0}' already exists")]
    TopicExists(String),

    #[error("client ({role}): {detail}")]
    Client { role: &'static str, detail: String },
}
