use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use restoscout_shared::{BrokerConfig, DeliveryAck, RestoscoutError, Result};
use tracing::{debug, info};

use crate::broker::Broker;

/// Kafka producer waiting for acknowledgement from all in-sync replicas.
pub struct KafkaBroker {
    producer: FutureProducer,
    bootstrap_servers: String,
}

impl KafkaBroker {
    /// Create the producer. librdkafka connects in the background, so an
    /// unreachable cluster surfaces as failed sends rather than here.
    pub fn connect(config: &BrokerConfig) -> Result<Self> {
        let message_timeout_ms = config.ack_timeout_secs.saturating_mul(1000);

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.bootstrap_servers)
            .set("acks", "all")
            .set("retries", config.retries.to_string())
            .set("message.timeout.ms", message_timeout_ms.to_string())
            .create()
            .map_err(|e| {
                RestoscoutError::Delivery(format!(
                    "failed to create Kafka producer for {}: {e}",
                    config.bootstrap_servers
                ))
            })?;

        info!(
            bootstrap_servers = %config.bootstrap_servers,
            retries = config.retries,
            "Kafka producer created"
        );

        Ok(Self {
            producer,
            bootstrap_servers: config.bootstrap_servers.clone(),
        })
    }
}

#[async_trait]
impl Broker for KafkaBroker {
    fn name(&self) -> &str {
        "kafka"
    }

    async fn send(&self, topic: &str, payload: Vec<u8>, timeout: Duration) -> Result<DeliveryAck> {
        let record = FutureRecord::<(), [u8]>::to(topic).payload(payload.as_slice());

        // The queue timeout only covers enqueueing; bound the ack wait as well.
        let delivery = tokio::time::timeout(
            timeout,
            self.producer.send(record, Timeout::After(timeout)),
        )
        .await
        .map_err(|_| {
            RestoscoutError::Delivery(format!(
                "no acknowledgement from {} within {timeout:?}",
                self.bootstrap_servers
            ))
        })?;

        match delivery {
            Ok((partition, offset)) => {
                debug!(topic, partition, offset, "Kafka ack");
                Ok(DeliveryAck {
                    topic: topic.to_string(),
                    partition,
                    offset,
                })
            }
            Err((e, _message)) => Err(RestoscoutError::Delivery(format!(
                "Kafka delivery to {topic} failed: {e}"
            ))),
        }
    }

    async fn flush(&self, timeout: Duration) -> Result<()> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| RestoscoutError::Delivery(format!("flush task failed: {e}")))?
            .map_err(|e| RestoscoutError::Delivery(format!("Kafka flush failed: {e}")))
    }
}
