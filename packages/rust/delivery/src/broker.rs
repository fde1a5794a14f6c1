use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use restoscout_shared::{DeliveryAck, RestoscoutError, Result};

/// A durable message broker the sink publishes into.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Short identifier used in logs (`kafka`, `memory`).
    fn name(&self) -> &str;

    /// Publish one unkeyed message and wait up to `timeout` for the acknowledgement.
    async fn send(&self, topic: &str, payload: Vec<u8>, timeout: Duration) -> Result<DeliveryAck>;

    /// Wait for buffered messages to be delivered.
    async fn flush(&self, timeout: Duration) -> Result<()>;
}

/// A message accepted by [`MemoryBroker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    /// Payload decoded as JSON.
    pub fn json(&self) -> Result<serde_json::Value> {
        serde_json::from_slice(&self.payload)
            .map_err(|e| RestoscoutError::parse(format!("published payload is not JSON: {e}")))
    }
}

/// In-process broker. Used for dry runs and tests.
///
/// Every message lands on partition 0 with sequential offsets.
#[derive(Debug, Default)]
pub struct MemoryBroker {
    messages: Mutex<Vec<PublishedMessage>>,
    failing: AtomicBool,
    flushes: AtomicUsize,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Messages accepted so far, in acknowledgement order.
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// Number of completed flushes.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    fn name(&self) -> &str {
        "memory"
    }

    async fn send(&self, topic: &str, payload: Vec<u8>, _timeout: Duration) -> Result<DeliveryAck> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RestoscoutError::Delivery(format!(
                "memory broker rejected message for {topic}"
            )));
        }

        let mut messages = self
            .messages
            .lock()
            .map_err(|_| RestoscoutError::Delivery("memory broker lock poisoned".into()))?;
        messages.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });

        Ok(DeliveryAck {
            topic: topic.to_string(),
            partition: 0,
            offset: (messages.len() - 1) as i64,
        })
    }

    async fn flush(&self, _timeout: Duration) -> Result<()> {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn memory_broker_assigns_sequential_offsets() {
        let broker = MemoryBroker::new();
        let first = broker
            .send("scraper-data", br#"{"a":1}"#.to_vec(), TIMEOUT)
            .await
            .unwrap();
        let second = broker
            .send("scraper-data", br#"{"a":2}"#.to_vec(), TIMEOUT)
            .await
            .unwrap();

        assert_eq!(first.offset, 0);
        assert_eq!(second.offset, 1);
        assert_eq!(second.to_string(), "scraper-data[0]@1");

        let messages = broker.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].json().unwrap()["a"], 2);
    }

    #[tokio::test]
    async fn failing_memory_broker_keeps_nothing() {
        let broker = MemoryBroker::new();
        broker.set_failing(true);

        let err = broker.send("t", b"{}".to_vec(), TIMEOUT).await.unwrap_err();
        assert!(matches!(err, RestoscoutError::Delivery(_)));
        assert!(broker.messages().is_empty());

        broker.set_failing(false);
        assert!(broker.send("t", b"{}".to_vec(), TIMEOUT).await.is_ok());
    }

    #[tokio::test]
    async fn flushes_are_counted() {
        let broker = MemoryBroker::new();
        broker.flush(TIMEOUT).await.unwrap();
        broker.flush(TIMEOUT).await.unwrap();
        assert_eq!(broker.flush_count(), 2);
    }
}
