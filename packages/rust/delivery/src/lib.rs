//! Broker delivery for canonical payloads.
//!
//! - [`Broker`]: the transport seam, implemented by [`KafkaBroker`] and
//!   the in-process [`MemoryBroker`]
//! - [`BrokerHandle`]: process-scoped, lazily connected broker with idempotent close
//! - [`DeliverySink`]: publishes one payload at a time and waits for the ack

mod broker;
mod handle;
mod kafka;
mod sink;

pub use broker::{Broker, MemoryBroker, PublishedMessage};
pub use handle::{BrokerHandle, Connector};
pub use kafka::KafkaBroker;
pub use sink::DeliverySink;
