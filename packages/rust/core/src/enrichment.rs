//! Enrichment scheduler.
//!
//! Applies an [`Enricher`] to every record of a batch, either with a bounded
//! worker pool or one record at a time. A record whose lookup fails (or whose
//! task panics) comes back as the original record with blank enrichment
//! fields, so the output always has as many records as the input.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use restoscout_shared::{RawRecord, Result};
use restoscout_sources::{Enricher, SourceAdapter};

/// Enrich `records` concurrently with at most `max_workers` lookups in flight.
///
/// `max_workers <= 0` means a single worker and the pool never grows past
/// the batch size. Dropping the returned future
/// aborts every in-flight lookup.
#[instrument(skip_all, fields(records = records.len(), max_workers = max_workers))]
pub async fn run_all(
    records: Vec<RawRecord>,
    enricher: Arc<dyn Enricher>,
    max_workers: i64,
) -> Vec<RawRecord> {
    if records.is_empty() {
        return Vec::new();
    }

    // Never more permits than records; also keeps the count under the
    // semaphore's permit ceiling.
    let workers = usize::try_from(max_workers)
        .unwrap_or(0)
        .clamp(1, records.len());
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();

    for (index, record) in records.iter().cloned().enumerate() {
        let enricher = enricher.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let outcome = enricher.enrich(&record).await;
            (index, outcome)
        });
    }

    let mut enriched: Vec<Option<RawRecord>> = vec![None; records.len()];
    let mut failures = 0usize;

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(record))) => {
                enriched[index] = Some(keep_identity(record, &records[index]));
            }
            Ok((index, Err(e))) => {
                failures += 1;
                warn!(name = records[index].name().unwrap_or("-"), error = %e, "enrichment failed");
                enriched[index] = Some(fallback(&records[index]));
            }
            Err(e) => {
                // The slot stays empty and is filled with the fallback below.
                failures += 1;
                warn!(error = %e, "enrichment task aborted");
            }
        }
    }

    let output: Vec<RawRecord> = enriched
        .into_iter()
        .zip(&records)
        .map(|(slot, original)| slot.unwrap_or_else(|| fallback(original)))
        .collect();

    info!(
        workers,
        enriched = output.len() - failures,
        failed = failures,
        "parallel enrichment finished"
    );
    output
}

/// Enrich `records` one at a time, in input order.
#[instrument(skip_all, fields(records = records.len()))]
pub async fn run_sequential(records: Vec<RawRecord>, enricher: Arc<dyn Enricher>) -> Vec<RawRecord> {
    let mut output = Vec::with_capacity(records.len());
    let mut failures = 0usize;

    for record in records {
        match enricher.enrich(&record).await {
            Ok(enriched) => output.push(keep_identity(enriched, &record)),
            Err(e) => {
                failures += 1;
                warn!(name = record.name().unwrap_or("-"), error = %e, "enrichment failed");
                output.push(fallback(&record));
            }
        }
    }

    info!(
        enriched = output.len() - failures,
        failed = failures,
        "sequential enrichment finished"
    );
    output
}

/// Combined fetch + enrich entry point for one source URL.
///
/// Enrichment runs only when the adapter has the capability; `use_parallel`
/// picks the worker pool over the sequential loop. Fetch errors propagate.
pub async fn scrape(
    adapter: &dyn SourceAdapter,
    url: &str,
    use_parallel: bool,
    max_workers: i64,
) -> Result<Vec<RawRecord>> {
    let records = adapter.fetch_batch(url).await?;
    debug!(adapter = adapter.name(), records = records.len(), "batch fetched");

    if records.is_empty() {
        return Ok(records);
    }

    let records = match adapter.enricher() {
        Some(enricher) if use_parallel => run_all(records, enricher, max_workers).await,
        Some(enricher) => run_sequential(records, enricher).await,
        None => {
            debug!(adapter = adapter.name(), "adapter has no enrichment, skipping");
            records
        }
    };
    Ok(records)
}

fn keep_identity(mut enriched: RawRecord, original: &RawRecord) -> RawRecord {
    enriched.restore_identity(original);
    enriched
}

fn fallback(original: &RawRecord) -> RawRecord {
    let mut record = original.clone();
    record.blank_enrichment();
    record
}
