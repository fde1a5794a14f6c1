//! Listing sources: the adapter contract, the adapter registry, and the
//! built-in adapters.
//!
//! This crate provides:
//! - [`SourceAdapter`] / [`Enricher`]: the capability contract the pipeline depends on
//! - [`SourceRegistry`]: maps scraper identifiers from `sources.json` to adapters
//! - [`PageFetcher`]: HTTP fetching, direct or through a rendering service
//! - [`GoogleMapsAdapter`] and [`JsonFileAdapter`]

pub mod adapters;
pub mod fetch;
pub mod registry;

pub use adapters::{Enricher, GoogleMapsAdapter, GoogleSearchEnricher, JsonFileAdapter, SourceAdapter};
pub use fetch::PageFetcher;
pub use registry::{AdapterConstructor, SourceRegistry};
