//! Shared types, error model, and configuration for restoscout.
//!
//! This crate is the foundation depended on by all other restoscout crates.
//! It provides:
//! - [`RestoscoutError`]: the unified error type
//! - Domain types ([`RawRecord`], [`UnitOfWork`], [`CanonicalPayload`], [`DeliveryAck`])
//! - Configuration ([`AppConfig`], source/city inputs, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrokerConfig, CityEntry, DEFAULT_CONFIG_FILE, DefaultsConfig, GoogleMapsConfig,
    InputsConfig, SourceDescriptor, init_config, load_cities, load_config, load_config_from,
    load_sources,
};
pub use error::{RestoscoutError, Result};
pub use types::{
    Address, CanonicalPayload, Coordinates, DeliveryAck, RawRecord, RawValue, UNIT_PLACEHOLDER,
    UNKNOWN_UNIT_LABEL, UnitOfWork, fields,
};
