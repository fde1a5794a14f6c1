//! Batch orchestration: one unit of work is source → enrichment →
//! canonicalization → delivery → snapshot.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};

use restoscout_delivery::DeliverySink;
use restoscout_shared::{
    AppConfig, CanonicalPayload, RestoscoutError, Result, SourceDescriptor, UNKNOWN_UNIT_LABEL,
    UnitOfWork, fields,
};
use restoscout_sources::{SourceAdapter, SourceRegistry};
use restoscout_storage::{IdAllocator, SnapshotWriter};

use crate::canonical::build_payload;
use crate::enrichment;

/// Options controlling how each unit is processed.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Enrich with a worker pool instead of sequentially.
    pub parallel: bool,
    /// Worker pool size; `<= 0` means one worker.
    pub workers: i64,
    /// Also write the enriched raw records next to each snapshot.
    pub write_raw: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            workers: 5,
            write_raw: false,
        }
    }
}

/// Outcome of one unit of work.
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub source_name: String,
    pub unit_label: String,
    /// Records that reached canonicalization.
    pub processed: usize,
    /// Payloads acknowledged by the broker.
    pub delivered: usize,
    /// IDs of payloads whose delivery failed. Their IDs are not reused.
    pub failed_ids: Vec<String>,
    /// Canonical snapshot, absent for an empty unit.
    pub snapshot: Option<PathBuf>,
    pub raw_snapshot: Option<PathBuf>,
    pub elapsed: Duration,
}

impl UnitReport {
    fn empty(unit: &UnitOfWork, elapsed: Duration) -> Self {
        Self {
            source_name: unit.source_name.clone(),
            unit_label: unit.unit_label.clone(),
            processed: 0,
            delivered: 0,
            failed_ids: Vec::new(),
            snapshot: None,
            raw_snapshot: None,
            elapsed,
        }
    }
}

/// A unit that aborted.
#[derive(Debug, Clone)]
pub struct UnitFailure {
    pub source_name: String,
    pub unit_label: String,
    pub error: String,
}

/// Aggregate of a whole run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<UnitReport>,
    pub failures: Vec<UnitFailure>,
}

impl RunSummary {
    pub fn processed(&self) -> usize {
        self.reports.iter().map(|r| r.processed).sum()
    }

    pub fn delivered(&self) -> usize {
        self.reports.iter().map(|r| r.delivered).sum()
    }

    pub fn failed_deliveries(&self) -> usize {
        self.reports.iter().map(|r| r.failed_ids.len()).sum()
    }

    pub fn units(&self) -> usize {
        self.reports.len() + self.failures.len()
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called before a unit starts; `index` is zero-based.
    fn unit_started(&self, unit: &UnitOfWork, index: usize, total: usize);
    /// Called when a unit completes.
    fn unit_finished(&self, report: &UnitReport);
    /// Called when a unit aborts.
    fn unit_failed(&self, unit: &UnitOfWork, error: &RestoscoutError);
    /// Called once after the last unit.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn unit_started(&self, _unit: &UnitOfWork, _index: usize, _total: usize) {}
    fn unit_finished(&self, _report: &UnitReport) {}
    fn unit_failed(&self, _unit: &UnitOfWork, _error: &RestoscoutError) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Expand source descriptors into units of work.
///
/// A templated source yields one unit per city; a source without the
/// placeholder yields a single unit labelled [`UNKNOWN_UNIT_LABEL`].
pub fn plan_units(sources: &[SourceDescriptor], cities: &[String]) -> Vec<UnitOfWork> {
    let mut units = Vec::new();
    for source in sources {
        if UnitOfWork::is_templated(&source.url) {
            if cities.is_empty() {
                warn!(scraper = %source.scraper, url = %source.url, "templated source but no cities");
            }
            units.extend(
                cities
                    .iter()
                    .map(|city| UnitOfWork::new(&source.scraper, &source.url, city)),
            );
        } else {
            units.push(UnitOfWork::new(
                &source.scraper,
                &source.url,
                UNKNOWN_UNIT_LABEL,
            ));
        }
    }
    units
}

/// Build one adapter per distinct scraper named by `units`.
///
/// Unknown scraper identifiers are rejected here, before any unit runs.
pub fn resolve_adapters(
    registry: &SourceRegistry,
    config: &AppConfig,
    units: &[UnitOfWork],
) -> Result<BTreeMap<String, Arc<dyn SourceAdapter>>> {
    let mut adapters = BTreeMap::new();
    for unit in units {
        if !adapters.contains_key(&unit.source_name) {
            let adapter = registry.create(&unit.source_name, config)?;
            adapters.insert(unit.source_name.clone(), adapter);
        }
    }
    Ok(adapters)
}

/// Drives units of work end to end.
pub struct Pipeline {
    adapters: BTreeMap<String, Arc<dyn SourceAdapter>>,
    allocator: Arc<dyn IdAllocator>,
    sink: DeliverySink,
    snapshots: SnapshotWriter,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        adapters: BTreeMap<String, Arc<dyn SourceAdapter>>,
        allocator: Arc<dyn IdAllocator>,
        sink: DeliverySink,
        snapshots: SnapshotWriter,
        options: PipelineOptions,
    ) -> Self {
        Self {
            adapters,
            allocator,
            sink,
            snapshots,
            options,
        }
    }

    /// Check that every unit names a known scraper.
    pub fn validate(&self, units: &[UnitOfWork]) -> Result<()> {
        let unknown: Vec<&str> = units
            .iter()
            .map(|u| u.source_name.as_str())
            .filter(|name| !self.adapters.contains_key(*name))
            .collect();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(RestoscoutError::config(format!(
                "unknown scraper(s): {}",
                unknown.join(", ")
            )))
        }
    }

    /// Process one unit of work.
    ///
    /// Fetch and allocator failures abort the unit. Enrichment and delivery
    /// failures are per record: the record is still canonicalized and counted.
    #[instrument(skip_all, fields(unit = %unit.unit_label, source = %unit.source_name))]
    pub async fn run_unit(&self, unit: &UnitOfWork) -> Result<UnitReport> {
        let start = Instant::now();
        let adapter = self.adapters.get(&unit.source_name).ok_or_else(|| {
            RestoscoutError::config(format!("unknown scraper '{}'", unit.source_name))
        })?;

        let query = unit.query();
        info!(%query, "starting unit");

        let records = enrichment::scrape(
            adapter.as_ref(),
            &query,
            self.options.parallel,
            self.options.workers,
        )
        .await?;

        if records.is_empty() {
            warn!("no records fetched, skipping snapshot");
            return Ok(UnitReport::empty(unit, start.elapsed()));
        }

        let mut report = UnitReport::empty(unit, Duration::ZERO);
        let mut payloads: Vec<CanonicalPayload> = Vec::with_capacity(records.len());
        let mut stamped = Vec::with_capacity(records.len());

        for mut record in records {
            record.set_if_absent(fields::CITY, unit.unit_label.as_str());

            let payload = build_payload(&record, &unit.unit_label, self.allocator.as_ref())?;
            if self.sink.publish(&payload).await {
                report.delivered += 1;
            } else {
                error!(id = %payload.company_rc, name = %payload.company_name, "payload not delivered");
                report.failed_ids.push(payload.company_rc.clone());
            }

            report.processed += 1;
            payloads.push(payload);
            stamped.push(record);
        }

        // Snapshots are written only once every delivery has been attempted.
        report.snapshot = Some(self.snapshots.write(&unit.unit_label, &payloads)?);
        if self.options.write_raw {
            report.raw_snapshot = Some(self.snapshots.write_raw(&unit.unit_label, &stamped)?);
        }

        report.elapsed = start.elapsed();
        info!(
            processed = report.processed,
            delivered = report.delivered,
            failed = report.failed_ids.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "unit finished"
        );
        if !report.failed_ids.is_empty() {
            warn!(ids = ?report.failed_ids, "undelivered payload IDs");
        }

        Ok(report)
    }

    /// Process every unit in order, continuing past units that abort.
    pub async fn run_all(
        &self,
        units: &[UnitOfWork],
        progress: &dyn ProgressReporter,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        let total = units.len();

        for (index, unit) in units.iter().enumerate() {
            progress.unit_started(unit, index, total);
            match self.run_unit(unit).await {
                Ok(report) => {
                    progress.unit_finished(&report);
                    summary.reports.push(report);
                }
                Err(e) => {
                    error!(
                        unit = %unit.unit_label,
                        source = %unit.source_name,
                        error = %e,
                        "unit aborted"
                    );
                    progress.unit_failed(unit, &e);
                    summary.failures.push(UnitFailure {
                        source_name: unit.source_name.clone(),
                        unit_label: unit.unit_label.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            units = summary.units(),
            failed_units = summary.failures.len(),
            processed = summary.processed(),
            delivered = summary.delivered(),
            "run finished"
        );
        progress.done(&summary);
        summary
    }
}
