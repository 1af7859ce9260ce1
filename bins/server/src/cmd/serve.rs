use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use log_api_server::{ApiError, AppState};
use relay_api::{ConsumerConnector, MessageHandler, MessagePublisher};
use relay_broker::{ConsumerOptions, MemoryBroker, MemoryBrokerConfig};
use relay_pipeline::{Subscriber, SubscriberError, build_sink, spawn_subscriber};

use crate::config::{BackendKind, ServeArgs, ServerConfig};
use crate::error::ServerError;

/// Producer and consumer side of the configured broker. Each connection
/// is owned here and handed out by `Arc`.
struct Backend {
    publisher: Arc<dyn MessagePublisher>,
    connector: Arc<dyn ConsumerConnector>,
}

fn memory_backend(broker: &MemoryBroker, config: &ServerConfig) -> Result<Backend, ServerError> {
    let publisher = broker.producer(config.broker.ack_mode)?;
    let connector = broker.connector(ConsumerOptions {
        offset_reset: config.subscriber.offset_reset,
        max_batch: config.subscriber.max_batch,
    });
    Ok(Backend {
        publisher: Arc::new(publisher),
        connector: Arc::new(connector),
    })
}

fn build_backend(config: &ServerConfig) -> Result<Backend, ServerError> {
    let broker_cfg = &config.broker;
    match broker_cfg.backend {
        BackendKind::Memory => {
            let broker = MemoryBroker::new(MemoryBrokerConfig {
                auto_create_topics: broker_cfg.auto_create_topics,
                max_records: broker_cfg.max_records,
            });
            let backend = memory_backend(&broker, config)?;
            tracing::info!(
                backend = "memory",
                ack_mode = ?broker_cfg.ack_mode,
                auto_create_topics = broker_cfg.auto_create_topics,
                max_records = broker_cfg.max_records,
                "broker ready"
            );
            Ok(backend)
        }
        #[cfg(feature = "kafka")]
        BackendKind::Kafka => {
            use relay_broker::{KafkaConnector, KafkaPublisher, KafkaSettings};

            let settings = KafkaSettings {
                brokers: broker_cfg.address.clone(),
                ack_mode: broker_cfg.ack_mode,
                offset_reset: config.subscriber.offset_reset,
                message_timeout: Duration::from_millis(broker_cfg.message_timeout_ms),
                properties: broker_cfg.properties.clone(),
            };
            let publisher = KafkaPublisher::new(&settings)?;
            tracing::info!(
                backend = "kafka",
                brokers = %settings.brokers,
                ack_mode = ?settings.ack_mode,
                "broker ready"
            );
            Ok(Backend {
                publisher: Arc::new(publisher),
                connector: Arc::new(KafkaConnector::new(settings)),
            })
        }
        #[cfg(not(feature = "kafka"))]
        BackendKind::Kafka => Err(ServerError::Config {
            context: "backend",
            detail: "kafka backend requires building with --features kafka".into(),
        }),
    }
}

enum Exit {
    Signal(std::io::Result<()>),
    Subscriber(Result<Result<(), SubscriberError>, tokio::task::JoinError>),
    Api(Result<Result<(), ApiError>, tokio::task::JoinError>),
}

fn flatten<E>(joined: Result<Result<(), E>, tokio::task::JoinError>) -> Result<(), ServerError>
where
    ServerError: From<E>,
{
    Ok(joined??)
}

/// Wait up to `drain` for a task, abort it afterwards.
async fn join_task<E>(
    name: &'static str,
    mut handle: JoinHandle<Result<(), E>>,
    drain: Duration,
) -> Result<(), ServerError>
where
    ServerError: From<E>,
{
    match tokio::time::timeout(drain, &mut handle).await {
        Ok(joined) => flatten(joined),
        Err(_) => {
            tracing::warn!(
                task = name,
                drain_ms = drain.as_millis() as u64,
                "task did not stop in time, aborting"
            );
            handle.abort();
            Ok(())
        }
    }
}

pub async fn run(args: ServeArgs) -> Result<(), ServerError> {
    tracing::info!("log-relay-server starting");

    // --- Load config ---
    let config = ServerConfig::resolve(&args)?;
    tracing::info!(
        config = %args.config.as_deref().unwrap_or("<defaults>"),
        topic = %config.subscriber.topic,
        group = %config.subscriber.group_id,
        "loaded config"
    );

    // --- Sink first: nothing to release if it fails ---
    let handler = build_sink(&config.sink).await?;

    // --- Broker connections ---
    let backend = build_backend(&config)?;

    relay(&config, backend, handler, tokio::signal::ctrl_c()).await
}

/// Run the subscriber and the API until `shutdown` resolves or one of them
/// ends. The publisher is closed on every path out.
async fn relay<S>(
    config: &ServerConfig,
    backend: Backend,
    handler: Arc<dyn MessageHandler>,
    shutdown: S,
) -> Result<(), ServerError>
where
    S: Future<Output = std::io::Result<()>>,
{
    // --- CancellationToken for graceful shutdown ---
    let token = CancellationToken::new();

    // --- Subscriber ---
    let subscriber = Subscriber::new(backend.connector.clone(), handler, config.subscriber.clone());
    let mut subscriber_handle = spawn_subscriber(subscriber, token.clone());

    // --- API server ---
    let api_state = AppState::new(backend.publisher.clone(), config.subscriber.topic.as_str());
    let api_port = config.api_port;
    let api_token = token.clone();
    let mut api_handle =
        tokio::spawn(async move { log_api_server::run(api_port, api_state, api_token).await });

    tracing::info!(port = config.api_port, "server ready");

    // --- Wait for the shutdown signal or an early task exit ---
    let exit = tokio::select! {
        signal = shutdown => Exit::Signal(signal),
        joined = &mut subscriber_handle => Exit::Subscriber(joined),
        joined = &mut api_handle => Exit::Api(joined),
    };

    let (first, subscriber_rest, api_rest) = match exit {
        Exit::Signal(signal) => {
            tracing::info!("shutting down...");
            (signal.map_err(ServerError::from), Some(subscriber_handle), Some(api_handle))
        }
        Exit::Subscriber(joined) => {
            tracing::error!("subscriber ended, shutting down");
            (flatten(joined), None, Some(api_handle))
        }
        Exit::Api(joined) => {
            tracing::error!("api server ended, shutting down");
            (flatten(joined), Some(subscriber_handle), None)
        }
    };

    // Signal all tasks to stop cooperatively
    token.cancel();

    let drain = Duration::from_millis(config.shutdown_timeout_ms);
    let mut results = vec![first];
    if let Some(handle) = subscriber_rest {
        results.push(join_task("subscriber", handle, drain).await);
    }
    if let Some(handle) = api_rest {
        results.push(join_task("api", handle, drain).await);
    }

    // Release the producer connection whatever happened above
    if let Err(e) = backend.publisher.close().await {
        tracing::error!(error = %e, "publisher close error");
    }

    tracing::info!("shutdown complete");
    results.into_iter().collect()
}
