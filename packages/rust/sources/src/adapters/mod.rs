//! Source adapter contract and built-in adapters.
//!
//! An adapter collects a batch of raw records for one query. Adapters that can
//! look up extra details per record expose an [`Enricher`]; the pipeline checks
//! for that capability instead of assuming it.

mod googlemaps;
mod json_file;

use std::sync::Arc;

use async_trait::async_trait;
use restoscout_shared::{RawRecord, Result};

pub use googlemaps::{
    GoogleMapsAdapter, GoogleSearchEnricher, MapsCard, SearchFindings, parse_cards,
    parse_search_page,
};
pub use json_file::JsonFileAdapter;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A pluggable upstream source of listings.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Registry key of this adapter, used in logs.
    fn name(&self) -> &str;

    /// Collect every record the source has for `query`.
    ///
    /// Errors abort the unit of work; a partial batch is never returned.
    async fn fetch_batch(&self, query: &str) -> Result<Vec<RawRecord>>;

    /// Per-record enrichment capability, if this source has one.
    fn enricher(&self) -> Option<Arc<dyn Enricher>> {
        None
    }
}

/// Best-effort supplementary lookup for a single record.
///
/// Implementations must be safe to call concurrently for different records and
/// must not change identity fields (`name`, `url`). Errors are item-local; the
/// caller substitutes the original record with blank enrichment fields.
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, record: &RawRecord) -> Result<RawRecord>;
}
