use relay_api::{HandlerError, SubscriptionError};

#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("subscription ({topic}): {source}")]
    Subscription { topic: String, source: SubscriptionError },

    #[error("handler failed at {topic}/{partition}@{offset}: {source}")]
    Handler {
        topic: String,
        partition: i32,
        offset: i64,
        source: HandlerError,
    },

    #[error("reconnect attempts exhausted ({attempts}): {last}")]
    Exhausted { attempts: u32, last: SubscriptionError },
}
