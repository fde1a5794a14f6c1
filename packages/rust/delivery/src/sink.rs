use std::sync::Arc;
use std::time::Duration;

use restoscout_shared::{BrokerConfig, CanonicalPayload, Result};
use tracing::{debug, error, warn};

use crate::handle::BrokerHandle;

/// Publishes canonical payloads to one topic, one acknowledged message at a time.
///
/// The wire format is the UTF-8 JSON encoding of [`CanonicalPayload`], with no key.
#[derive(Clone)]
pub struct DeliverySink {
    handle: Arc<BrokerHandle>,
    topic: String,
    ack_timeout: Duration,
}

impl DeliverySink {
    pub fn new(handle: Arc<BrokerHandle>, topic: impl Into<String>, ack_timeout: Duration) -> Self {
        Self {
            handle,
            topic: topic.into(),
            ack_timeout,
        }
    }

    /// Sink for the topic and ack timeout in `config`.
    pub fn from_config(handle: Arc<BrokerHandle>, config: &BrokerConfig) -> Self {
        Self::new(
            handle,
            config.topic.clone(),
            Duration::from_secs(config.ack_timeout_secs),
        )
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Connect now instead of on the first publish.
    pub async fn open(&self) -> Result<()> {
        self.handle.get_or_connect().await.map(|_| ())
    }

    /// Publish one payload and wait for its acknowledgement.
    ///
    /// Returns `false` when the payload could not be encoded, the broker is
    /// unreachable or closed, or the broker gave up after its own retries.
    pub async fn publish(&self, payload: &CanonicalPayload) -> bool {
        let bytes = match serde_json::to_vec(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(id = %payload.company_rc, error = %e, "payload encoding failed");
                return false;
            }
        };

        let broker = match self.handle.get_or_connect().await {
            Ok(broker) => broker,
            Err(e) => {
                warn!(id = %payload.company_rc, error = %e, "broker unavailable");
                return false;
            }
        };

        match broker.send(&self.topic, bytes, self.ack_timeout).await {
            Ok(ack) => {
                debug!(id = %payload.company_rc, ack = %ack, "payload delivered");
                true
            }
            Err(e) => {
                error!(id = %payload.company_rc, topic = %self.topic, error = %e, "delivery failed");
                false
            }
        }
    }

    /// Flush and release the shared connection. Idempotent.
    pub async fn close(&self) {
        self.handle.close(self.ack_timeout).await;
    }
}
