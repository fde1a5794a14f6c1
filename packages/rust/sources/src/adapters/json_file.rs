//! Local JSON adapter.
//!
//! The query is a path (or `file://` URL) to a JSON array of raw records,
//! e.g. a raw snapshot written by an earlier run. Captures that still use the
//! French enrichment keys (`site_web`, `reseaux_sociaux`) are read as
//! `website` and `social_networks`.

use std::path::PathBuf;

use async_trait::async_trait;
use restoscout_shared::{RawRecord, RestoscoutError, Result};
use tracing::info;
use url::Url;

use super::SourceAdapter;

/// Replays raw records from disk. Has no enrichment capability.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFileAdapter;

impl JsonFileAdapter {
    fn resolve_path(query: &str) -> Result<PathBuf> {
        if query.starts_with("file://") {
            let url = Url::parse(query)
                .map_err(|e| RestoscoutError::config(format!("invalid file URL '{query}': {e}")))?;
            url.to_file_path()
                .map_err(|_| RestoscoutError::config(format!("not a local file URL: '{query}'")))
        } else {
            Ok(PathBuf::from(query))
        }
    }
}

#[async_trait]
impl SourceAdapter for JsonFileAdapter {
    fn name(&self) -> &str {
        "json"
    }

    async fn fetch_batch(&self, query: &str) -> Result<Vec<RawRecord>> {
        let path = Self::resolve_path(query)?;
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| RestoscoutError::io(&path, e))?;

        let mut records: Vec<RawRecord> = serde_json::from_str(&content).map_err(|e| {
            RestoscoutError::parse(format!("{}: expected an array of records: {e}", path.display()))
        })?;
        records.iter_mut().for_each(RawRecord::adopt_legacy_keys);

        info!(path = %path.display(), records = records.len(), "loaded raw records");
        Ok(records)
    }
}
