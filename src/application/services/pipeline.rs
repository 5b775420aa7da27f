//! Tariff pipeline
//!
//! One cycle is fetch → normalize → reconcile → export. This is the error
//! boundary of the service: every failure is logged here and reported in the
//! returned [`CycleReport`], nothing escapes to the scheduler.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use metrics::{counter, histogram};
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::export::{ExportConfig, ExportEngine, PublishReport};
use super::reconciliation::{ReconcileOutcome, ReconciliationEngine};
use crate::application::ports::{SheetPublisher, TariffSource};
use crate::domain::normalize_batch;
use crate::domain::RepositoryProvider;
use crate::shared::errors::{PipelineError, SourceError};
use crate::shared::retry::{retry_with_backoff, RetryConfig};

/// Everything one cycle did, for logs and for `once` mode.
#[derive(Debug)]
pub struct CycleReport {
    pub run_id: Uuid,
    pub day: NaiveDate,
    pub reconcile: Option<ReconcileOutcome>,
    pub export: Option<PublishReport>,
    pub errors: Vec<PipelineError>,
    pub elapsed: Duration,
}

impl CycleReport {
    /// No hard errors and every destination received the snapshot.
    pub fn is_success(&self) -> bool {
        self.errors.iter().all(PipelineError::is_benign)
            && self.export.as_ref().map_or(true, PublishReport::is_complete)
    }
}

pub struct TariffPipeline {
    source: Arc<dyn TariffSource>,
    reconciliation: ReconciliationEngine,
    export: ExportEngine,
    retry: RetryConfig,
}

impl TariffPipeline {
    pub fn new(
        source: Arc<dyn TariffSource>,
        repos: Arc<dyn RepositoryProvider>,
        publisher: Arc<dyn SheetPublisher>,
        export: ExportConfig,
        retry: RetryConfig,
    ) -> Self {
        Self {
            source,
            reconciliation: ReconciliationEngine::new(repos.clone()),
            export: ExportEngine::new(repos, publisher, export).with_store_retry(retry.clone()),
            retry,
        }
    }

    /// Run one full cycle for `today`.
    ///
    /// A fetch or persistence failure during reconciliation skips the export;
    /// an empty batch does not, since today's snapshot may already be stored.
    pub async fn run_cycle(&self, today: NaiveDate) -> CycleReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("tariff_cycle", %run_id, day = %today);

        async move {
            let started = Instant::now();
            let mut report = CycleReport {
                run_id,
                day: today,
                reconcile: None,
                export: None,
                errors: Vec::new(),
                elapsed: Duration::ZERO,
            };

            info!(source = self.source.source_name(), "▶️ Tariff cycle started");

            match self.reconcile(today).await {
                Ok(outcome) => report.reconcile = Some(outcome),
                Err(e) if e.is_benign() => {
                    info!(error = %e, "Nothing to reconcile, exporting stored snapshot");
                    report.errors.push(e);
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation failed, export skipped");
                    report.errors.push(e);
                    return finish(report, started);
                }
            }

            match self.export.publish(today).await {
                Ok(published) => report.export = Some(published),
                Err(e @ PipelineError::NoDataToExport { .. }) => {
                    warn!(error = %e, "Export skipped");
                    report.errors.push(e);
                }
                Err(e) => {
                    error!(error = %e, "Export failed");
                    report.errors.push(e);
                }
            }

            finish(report, started)
        }
        .instrument(span)
        .await
    }

    /// Fetch, normalize and apply the provider's tariffs for `today`.
    pub async fn reconcile(&self, today: NaiveDate) -> Result<ReconcileOutcome, PipelineError> {
        let raw = retry_with_backoff(
            &self.retry,
            || self.source.fetch(today),
            SourceError::is_transient,
            "fetch_tariffs",
        )
        .await
        .map_err(|source| PipelineError::UpstreamFetch { day: today, source })?;

        let (records, rejected) = normalize_batch(&raw, today);
        for entry in &rejected {
            warn!(
                day = %today,
                warehouse = %entry.warehouse_name,
                reason = %entry.reason,
                "Tariff entry rejected"
            );
        }
        if !rejected.is_empty() {
            counter!("tariff_entries_rejected_total").increment(rejected.len() as u64);
        }

        self.reconciliation.apply(records, today).await
    }
}

fn finish(mut report: CycleReport, started: Instant) -> CycleReport {
    report.elapsed = started.elapsed();
    histogram!("tariff_cycle_duration_seconds").record(report.elapsed.as_secs_f64());

    let status = if report.is_success() { "ok" } else { "failed" };
    counter!("tariff_cycles_total", "status" => status).increment(1);

    info!(
        status,
        errors = report.errors.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "⏹️ Tariff cycle finished"
    );
    report
}
