//! HTTP ingress: accepts log records and publishes them to the broker.

mod http;

use std::sync::Arc;

use axum::Router;
use axum::routing::post;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use relay_api::{Delivery, LogRecord, MessagePublisher, PublishError, encode};

pub use http::ACK_MESSAGE;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bind api :{port}: {source}")]
    Bind { port: u16, source: std::io::Error },

    #[error("axum serve: {0}")]
    Serve(#[source] std::io::Error),
}

#[derive(Clone)]
pub struct AppState {
    publisher: Arc<dyn MessagePublisher>,
    topic: Arc<str>,
}

impl AppState {
    pub fn new(publisher: Arc<dyn MessagePublisher>, topic: impl Into<Arc<str>>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }
}

/// Encode `record` and publish it to `topic`. The caller gets the
/// broker's answer; nothing is retried.
pub async fn send_log(
    publisher: &dyn MessagePublisher,
    topic: &str,
    record: &LogRecord,
) -> Result<Delivery, PublishError> {
    let payload = encode(record);
    publisher.publish(topic, &payload).await
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/logs", post(http::handle_send_log))
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), ApiError> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(ApiError::Serve)
}

/// Bind `0.0.0.0:{port}` and serve.
pub async fn run(port: u16, state: AppState, shutdown: CancellationToken) -> Result<(), ApiError> {
    let listener = TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .map_err(|source| ApiError::Bind { port, source })?;
    tracing::info!(port, "log api listening");
    serve(listener, state, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use relay_api::AckMode;
    use relay_broker::{MemoryBroker, MemoryBrokerConfig};

    const TOPIC: &str = "logs-topic";

    type ServeHandle = tokio::task::JoinHandle<Result<(), ApiError>>;

    async fn start(broker: &MemoryBroker) -> (SocketAddr, CancellationToken, ServeHandle) {
        let publisher: Arc<dyn MessagePublisher> =
            Arc::new(broker.producer(AckMode::None).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let token = CancellationToken::new();
        let handle = tokio::spawn(serve(listener, AppState::new(publisher, TOPIC), token.clone()));
        (addr, token, handle)
    }

    #[tokio::test]
    async fn send_log_publishes_encoded_record() {
        let broker = MemoryBroker::default();
        let producer = broker.producer(AckMode::Leader).unwrap();
        let record = LogRecord::new("ERROR", "disk full");
        let delivery = send_log(&producer, TOPIC, &record).await.unwrap();
        assert_eq!(delivery.offset, Some(0));
        assert_eq!(broker.messages(TOPIC).await, ["Level: ERROR, Message: disk full"]);
    }

    #[tokio::test]
    async fn post_logs_acknowledges_and_publishes() {
        let broker = MemoryBroker::default();
        let (addr, token, handle) = start(&broker).await;

        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/api/logs"))
            .json(&serde_json::json!({"level": "INFO", "message": "user logged in"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.text().await.unwrap(), ACK_MESSAGE);
        assert_eq!(broker.messages(TOPIC).await, ["Level: INFO, Message: user logged in"]);

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn severed_broker_returns_service_unavailable() {
        let broker = MemoryBroker::default();
        let (addr, token, handle) = start(&broker).await;
        broker.sever_connections();

        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/api/logs"))
            .json(&serde_json::json!({"level": "WARN", "message": "lost"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
        assert!(resp.text().await.unwrap().starts_with("error: connection lost"));
        assert!(broker.messages(TOPIC).await.is_empty());

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unknown_topic_returns_bad_gateway() {
        let broker = MemoryBroker::new(MemoryBrokerConfig {
            auto_create_topics: false,
            ..Default::default()
        });
        let (addr, token, handle) = start(&broker).await;

        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/api/logs"))
            .json(&serde_json::json!({"level": "WARN", "message": "nowhere"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_before_publishing() {
        let broker = MemoryBroker::default();
        let (addr, token, handle) = start(&broker).await;

        let resp = reqwest::Client::new()
            .post(format!("http://{addr}/api/logs"))
            .json(&serde_json::json!({"level": "WARN"}))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_client_error());
        assert!(broker.messages(TOPIC).await.is_empty());

        token.cancel();
        handle.await.unwrap().unwrap();
    }
}
