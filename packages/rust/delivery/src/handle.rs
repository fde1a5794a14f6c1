//! Process-scoped broker connection.
//!
//! The handle connects on first use and is shared by every sink in the
//! process. `close` flushes and releases the connection exactly once; the
//! handle stays closed afterwards so late publishes fail instead of
//! reconnecting during shutdown.

use std::sync::Arc;
use std::time::Duration;

use restoscout_shared::{BrokerConfig, RestoscoutError, Result};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::broker::Broker;
use crate::kafka::KafkaBroker;

/// Opens a broker connection. Called at most once per successful connect.
pub type Connector = Box<dyn Fn() -> Result<Arc<dyn Broker>> + Send + Sync>;

enum State {
    Idle,
    Connected(Arc<dyn Broker>),
    Closed,
}

/// Lazily connected broker shared across the process.
pub struct BrokerHandle {
    connector: Connector,
    state: Mutex<State>,
}

impl BrokerHandle {
    pub fn new<F>(connector: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn Broker>> + Send + Sync + 'static,
    {
        Self {
            connector: Box::new(connector),
            state: Mutex::new(State::Idle),
        }
    }

    /// Handle connecting to Kafka with `config` on first use.
    pub fn kafka(config: BrokerConfig) -> Self {
        Self::new(move || Ok(Arc::new(KafkaBroker::connect(&config)?) as Arc<dyn Broker>))
    }

    /// Handle around an already constructed broker.
    pub fn with_broker(broker: Arc<dyn Broker>) -> Self {
        Self::new(move || Ok(broker.clone()))
    }

    /// The live broker, connecting if this is the first use.
    ///
    /// A failed connect is not remembered; the next call tries again.
    pub async fn get_or_connect(&self) -> Result<Arc<dyn Broker>> {
        let mut state = self.state.lock().await;
        match &*state {
            State::Connected(broker) => Ok(broker.clone()),
            State::Closed => Err(RestoscoutError::Delivery("broker handle is closed".into())),
            State::Idle => {
                let broker = (self.connector)()?;
                info!(broker = broker.name(), "broker connected");
                *state = State::Connected(broker.clone());
                Ok(broker)
            }
        }
    }

    pub async fn is_connected(&self) -> bool {
        matches!(&*self.state.lock().await, State::Connected(_))
    }

    pub async fn is_closed(&self) -> bool {
        matches!(&*self.state.lock().await, State::Closed)
    }

    /// Flush buffered messages and release the connection.
    ///
    /// Safe to call repeatedly, and before the handle was ever used.
    pub async fn close(&self, flush_timeout: Duration) {
        let previous = {
            let mut state = self.state.lock().await;
            std::mem::replace(&mut *state, State::Closed)
        };

        match previous {
            State::Connected(broker) => {
                match broker.flush(flush_timeout).await {
                    Ok(()) => info!(broker = broker.name(), "broker flushed and closed"),
                    Err(e) => warn!(broker = broker.name(), error = %e, "flush on close failed"),
                }
            }
            State::Idle => info!("broker closed before first use"),
            State::Closed => {}
        }
    }
}
