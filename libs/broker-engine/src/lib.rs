pub mod error;
pub mod memory;

#[cfg(feature = "kafka")]
pub mod kafka;

pub use error::BrokerError;
pub use memory::{
    ConsumerOptions, DEFAULT_MAX_RECORDS, MemoryBroker, MemoryBrokerConfig, MemoryConnector,
    MemoryProducer,
};

#[cfg(feature = "kafka")]
pub use kafka::{KafkaConnector, KafkaPublisher, KafkaSettings};
