//! Export engine
//!
//! Mirrors today's snapshot into every registered spreadsheet. Each
//! destination is published independently: one broken spreadsheet never
//! keeps the others from getting a complete copy.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures_util::future::join_all;
use metrics::counter;
use tracing::{debug, info, warn};

use crate::application::ports::{CellValue, Row, SheetPublisher};
use crate::domain::{RepositoryProvider, TariffRecord};
use crate::shared::errors::{
    DestinationFailure, DomainError, PipelineError, PublishStep, SheetError,
};
use crate::shared::retry::{retry_with_backoff, RetryConfig};

/// Column labels, in the order [`snapshot_row`] writes the values.
pub const EXPORT_HEADER: [&str; 7] = [
    "Дата",
    "Коэффициент",
    "Доставка 1 литра",
    "Доставка каждого дополнительного литра",
    "Хранение 1 литра",
    "Хранение каждого дополнительного литра",
    "Название склада",
];

pub const DEFAULT_SHEET_NAME: &str = "stock_coefs";

pub fn header_row() -> Row {
    EXPORT_HEADER
        .iter()
        .map(|label| CellValue::Text(label.to_string()))
        .collect()
}

/// One stored record as one sheet row.
pub fn snapshot_row(record: &TariffRecord) -> Row {
    vec![
        CellValue::Text(record.day.format("%Y-%m-%d").to_string()),
        CellValue::Integer(i64::from(record.delivery_and_storage_coefficient)),
        CellValue::Number(record.delivery_base_rate),
        CellValue::Number(record.delivery_per_liter_rate),
        CellValue::from(record.storage_base_rate),
        CellValue::from(record.storage_per_liter_rate),
        CellValue::Text(record.warehouse_name.clone()),
    ]
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Tab inside each spreadsheet that holds the mirrored rows.
    pub sheet_name: String,
    /// Upper bound for all steps against a single destination.
    pub destination_timeout: Duration,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            destination_timeout: Duration::from_secs(120),
        }
    }
}

/// Result of one publish cycle across all destinations.
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Data rows written to each destination (header excluded).
    pub rows: usize,
    pub published: Vec<String>,
    pub failures: Vec<DestinationFailure>,
}

impl PublishReport {
    pub fn attempted(&self) -> usize {
        self.published.len() + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ExportEngine {
    repos: Arc<dyn RepositoryProvider>,
    publisher: Arc<dyn SheetPublisher>,
    config: ExportConfig,
    store_retry: RetryConfig,
}

impl ExportEngine {
    pub fn new(
        repos: Arc<dyn RepositoryProvider>,
        publisher: Arc<dyn SheetPublisher>,
        config: ExportConfig,
    ) -> Self {
        Self {
            repos,
            publisher,
            config,
            store_retry: RetryConfig::default(),
        }
    }

    /// Backoff for the snapshot and registry reads that precede publishing.
    pub fn with_store_retry(mut self, retry: RetryConfig) -> Self {
        self.store_retry = retry;
        self
    }

    /// Republish the snapshot of `today` to every current destination.
    ///
    /// Store failures and an empty snapshot are returned as errors before any
    /// destination is touched. Destination failures end up in the report.
    pub async fn publish(&self, today: NaiveDate) -> Result<PublishReport, PipelineError> {
        let snapshots = self.repos.snapshots();
        let records = retry_with_backoff(
            &self.store_retry,
            || snapshots.select_for_day(today),
            DomainError::is_transient,
            "select_for_day",
        )
        .await
        .map_err(PipelineError::persistence(today, "select_for_day"))?;

        if records.is_empty() {
            return Err(PipelineError::NoDataToExport { day: today });
        }

        let registry = self.repos.destinations();
        let destinations = retry_with_backoff(
            &self.store_retry,
            || registry.list(),
            DomainError::is_transient,
            "list_destinations",
        )
        .await
        .map_err(PipelineError::persistence(today, "list_destinations"))?;

        if destinations.is_empty() {
            info!(day = %today, "No spreadsheets registered for export");
            return Ok(PublishReport {
                rows: records.len(),
                ..PublishReport::default()
            });
        }

        let header = header_row();
        let rows: Vec<Row> = records.iter().map(snapshot_row).collect();

        let publisher = self.publisher.as_ref();
        let sheet_name = self.config.sheet_name.as_str();
        let timeout = self.config.destination_timeout;
        let header = &header;
        let rows = rows.as_slice();

        let attempts = destinations.iter().map(|destination| {
            let id = destination.destination_id.as_str();
            async move {
                let outcome = tokio::time::timeout(
                    timeout,
                    publish_destination(publisher, id, sheet_name, header, rows),
                )
                .await
                .unwrap_or_else(|_| {
                    Err(DestinationFailure {
                        destination_id: id.to_string(),
                        step: PublishStep::Timeout,
                        error: SheetError::Timeout(timeout),
                    })
                });
                (id, outcome)
            }
        });

        let mut report = PublishReport {
            rows: rows.len(),
            ..PublishReport::default()
        };

        for (id, outcome) in join_all(attempts).await {
            match outcome {
                Ok(()) => {
                    counter!("sheet_publish_success_total", "destination" => id.to_string()).increment(1);
                    debug!(day = %today, destination = %id, rows = rows.len(), "Destination updated");
                    report.published.push(id.to_string());
                }
                Err(failure) => {
                    counter!(
                        "sheet_publish_failures_total",
                        "destination" => failure.destination_id.clone(),
                        "step" => failure.step.to_string()
                    )
                    .increment(1);
                    warn!(
                        day = %today,
                        destination = %failure.destination_id,
                        operation = %failure.step,
                        error = %failure.error,
                        "Destination publish failed"
                    );
                    report.failures.push(failure);
                }
            }
        }

        info!(
            day = %today,
            rows = report.rows,
            published = report.published.len(),
            failed = report.failures.len(),
            "📤 Snapshot export finished"
        );

        Ok(report)
    }
}

/// Ensure the sheet exists, then replace its content. Steps run in order
/// because each one depends on the previous.
async fn publish_destination(
    publisher: &dyn SheetPublisher,
    spreadsheet_id: &str,
    sheet_name: &str,
    header: &Row,
    rows: &[Row],
) -> Result<(), DestinationFailure> {
    let fail = |step: PublishStep| {
        move |error: SheetError| DestinationFailure {
            destination_id: spreadsheet_id.to_string(),
            step,
            error,
        }
    };

    let sheets = publisher
        .list_sheet_names(spreadsheet_id)
        .await
        .map_err(fail(PublishStep::ListSheets))?;

    if !sheets.iter().any(|name| name == sheet_name) {
        info!(destination = %spreadsheet_id, sheet = %sheet_name, "Creating export sheet");
        publisher
            .create_sheet(spreadsheet_id, sheet_name)
            .await
            .map_err(fail(PublishStep::CreateSheet))?;
    }

    publisher
        .replace_sheet_contents(spreadsheet_id, sheet_name, header, rows)
        .await
        .map_err(fail(PublishStep::ReplaceContents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DestinationRegistry, DomainResult, RateUpdate, SnapshotStore};
    use crate::infrastructure::memory::{
        InMemoryRepositoryProvider, InMemorySheetPublisher, InMemorySnapshotStore,
    };
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 14).unwrap()
    }

    fn record(name: &str, coef: i32) -> TariffRecord {
        TariffRecord {
            warehouse_name: name.into(),
            day: today(),
            delivery_and_storage_coefficient: coef,
            delivery_base_rate: Decimal::new(4800, 2),
            delivery_per_liter_rate: Decimal::new(1120, 2),
            storage_base_rate: Some(Decimal::new(10, 2)),
            storage_per_liter_rate: None,
        }
    }

    async fn seeded(
        records: Vec<TariffRecord>,
        destinations: &[&str],
    ) -> Arc<InMemoryRepositoryProvider> {
        let repos = Arc::new(InMemoryRepositoryProvider::new());
        repos.snapshots().insert_many(records).await.unwrap();
        for id in destinations {
            repos.destinations().add(id).await.unwrap();
        }
        repos
    }

    fn engine(
        repos: Arc<InMemoryRepositoryProvider>,
        publisher: Arc<InMemorySheetPublisher>,
    ) -> ExportEngine {
        ExportEngine::new(repos, publisher, ExportConfig::default())
    }

    fn coefficients(rows: &[Row]) -> Vec<CellValue> {
        rows.iter().skip(1).map(|row| row[1].clone()).collect()
    }

    #[test]
    fn row_shape_matches_header() {
        let row = snapshot_row(&record("Тула", 160));
        assert_eq!(row.len(), EXPORT_HEADER.len());
        assert_eq!(row[0], CellValue::Text("2025-02-14".into()));
        assert_eq!(row[1], CellValue::Integer(160));
        assert_eq!(row[2], CellValue::Number(Decimal::new(4800, 2)));
        assert_eq!(row[3], CellValue::Number(Decimal::new(1120, 2)));
        assert_eq!(row[4], CellValue::Number(Decimal::new(10, 2)));
        assert_eq!(row[5], CellValue::Empty);
        assert_eq!(row[6], CellValue::Text("Тула".into()));
    }

    #[tokio::test]
    async fn rows_are_ordered_by_coefficient() {
        let repos = seeded(
            vec![record("X", 9), record("Y", 2), record("Z", 5)],
            &["sheet-1"],
        )
        .await;
        let publisher = Arc::new(InMemorySheetPublisher::new());

        let report = engine(repos, publisher.clone()).publish(today()).await.unwrap();

        assert!(report.is_complete());
        let rows = publisher.sheet_rows("sheet-1", DEFAULT_SHEET_NAME).unwrap();
        assert_eq!(rows[0], header_row());
        assert_eq!(
            coefficients(&rows),
            vec![CellValue::Integer(2), CellValue::Integer(5), CellValue::Integer(9)]
        );
    }

    #[tokio::test]
    async fn publish_is_idempotent() {
        let repos = seeded(vec![record("A", 3), record("B", 1)], &["sheet-1"]).await;
        let publisher = Arc::new(InMemorySheetPublisher::new());
        let engine = engine(repos, publisher.clone());

        engine.publish(today()).await.unwrap();
        let first = publisher.sheet_rows("sheet-1", DEFAULT_SHEET_NAME).unwrap();
        engine.publish(today()).await.unwrap();
        let second = publisher.sheet_rows("sheet-1", DEFAULT_SHEET_NAME).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.len(), 3);
        assert_eq!(publisher.sheet_names("sheet-1"), vec![DEFAULT_SHEET_NAME.to_string()]);
    }

    #[tokio::test]
    async fn manual_edits_are_overwritten() {
        let repos = seeded(vec![record("A", 3)], &["sheet-1"]).await;
        let publisher = Arc::new(InMemorySheetPublisher::new());
        publisher
            .create_sheet("sheet-1", DEFAULT_SHEET_NAME)
            .await
            .unwrap();
        publisher
            .append_rows(
                "sheet-1",
                DEFAULT_SHEET_NAME,
                "A1",
                &vec![vec![CellValue::Text("junk".into())]; 5],
            )
            .await
            .unwrap();

        engine(repos, publisher.clone()).publish(today()).await.unwrap();

        let rows = publisher.sheet_rows("sheet-1", DEFAULT_SHEET_NAME).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], header_row());
    }

    #[tokio::test]
    async fn failing_destination_does_not_block_others() {
        let repos = seeded(vec![record("A", 3), record("B", 1)], &["broken", "healthy"]).await;
        let publisher = Arc::new(InMemorySheetPublisher::new());
        publisher.fail_destination("broken");

        let report = engine(repos, publisher.clone()).publish(today()).await.unwrap();

        assert_eq!(report.attempted(), 2);
        assert_eq!(report.published, vec!["healthy".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].destination_id, "broken");
        assert_eq!(report.failures[0].step, PublishStep::ListSheets);

        let rows = publisher.sheet_rows("healthy", DEFAULT_SHEET_NAME).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(
            coefficients(&rows),
            vec![CellValue::Integer(1), CellValue::Integer(3)]
        );
    }

    #[tokio::test]
    async fn slow_destination_times_out_alone() {
        let repos = seeded(vec![record("A", 3)], &["slow", "fast"]).await;
        let publisher = Arc::new(InMemorySheetPublisher::new());
        publisher.delay_destination("slow", Duration::from_secs(5));
        let engine = ExportEngine::new(
            repos,
            publisher.clone(),
            ExportConfig {
                destination_timeout: Duration::from_millis(50),
                ..ExportConfig::default()
            },
        );

        let report = engine.publish(today()).await.unwrap();

        assert_eq!(report.published, vec!["fast".to_string()]);
        assert_eq!(report.failures[0].step, PublishStep::Timeout);
        assert!(matches!(report.failures[0].error, SheetError::Timeout(_)));
    }

    #[tokio::test]
    async fn empty_snapshot_is_not_exported() {
        let repos = seeded(Vec::new(), &["sheet-1"]).await;
        let publisher = Arc::new(InMemorySheetPublisher::new());

        let err = engine(repos, publisher.clone()).publish(today()).await.unwrap_err();

        assert!(matches!(err, PipelineError::NoDataToExport { .. }));
        assert!(publisher.sheet_names("sheet-1").is_empty());
    }

    #[tokio::test]
    async fn no_destinations_is_not_an_error() {
        let repos = seeded(vec![record("A", 3)], &[]).await;
        let publisher = Arc::new(InMemorySheetPublisher::new());

        let report = engine(repos, publisher).publish(today()).await.unwrap();

        assert_eq!(report.attempted(), 0);
        assert_eq!(report.rows, 1);
    }

    #[tokio::test]
    async fn registry_is_reread_every_cycle() {
        let repos = seeded(vec![record("A", 3)], &["first"]).await;
        let publisher = Arc::new(InMemorySheetPublisher::new());
        let engine = engine(repos.clone(), publisher.clone());

        engine.publish(today()).await.unwrap();
        repos.destinations().add("second").await.unwrap();
        let report = engine.publish(today()).await.unwrap();

        assert_eq!(report.published.len(), 2);
        assert!(publisher.sheet_rows("second", DEFAULT_SHEET_NAME).is_some());
    }

    /// Snapshot store whose reads fail `outages` times before recovering.
    struct UnsteadyStore {
        inner: InMemorySnapshotStore,
        outages: AtomicUsize,
        error: fn() -> DomainError,
    }

    #[async_trait]
    impl SnapshotStore for UnsteadyStore {
        async fn exists_for_day(&self, day: NaiveDate) -> DomainResult<bool> {
            self.inner.exists_for_day(day).await
        }

        async fn insert_many(&self, records: Vec<TariffRecord>) -> DomainResult<u64> {
            self.inner.insert_many(records).await
        }

        async fn update_by_warehouse_and_day(
            &self,
            day: NaiveDate,
            update: &RateUpdate,
        ) -> DomainResult<u64> {
            self.inner.update_by_warehouse_and_day(day, update).await
        }

        async fn select_for_day(&self, day: NaiveDate) -> DomainResult<Vec<TariffRecord>> {
            let outage = self
                .outages
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if outage {
                return Err((self.error)());
            }
            self.inner.select_for_day(day).await
        }
    }

    async fn unsteady(
        outages: usize,
        error: fn() -> DomainError,
    ) -> (ExportEngine, Arc<InMemorySheetPublisher>) {
        let store = UnsteadyStore {
            inner: InMemorySnapshotStore::new(),
            outages: AtomicUsize::new(outages),
            error,
        };
        store.insert_many(vec![record("A", 3)]).await.unwrap();
        let repos = Arc::new(InMemoryRepositoryProvider::with_snapshot_store(store));
        repos.destinations().add("sheet-1").await.unwrap();
        let publisher = Arc::new(InMemorySheetPublisher::new());
        let engine = ExportEngine::new(repos, publisher.clone(), ExportConfig::default())
            .with_store_retry(RetryConfig {
                max_attempts: 3,
                initial_delay: Duration::from_millis(1),
                backoff_multiplier: 1.0,
                max_delay: Duration::from_millis(1),
            });
        (engine, publisher)
    }

    #[tokio::test]
    async fn lost_database_connection_is_retried_before_export() {
        let (engine, publisher) =
            unsteady(2, || DomainError::Database("connection reset".into())).await;

        let report = engine.publish(today()).await.unwrap();

        assert_eq!(report.published, vec!["sheet-1".to_string()]);
        assert_eq!(publisher.sheet_rows("sheet-1", DEFAULT_SHEET_NAME).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn persistent_store_failure_gives_up_after_retries() {
        let (engine, publisher) =
            unsteady(10, || DomainError::Database("connection reset".into())).await;

        let err = engine.publish(today()).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Persistence { operation: "select_for_day", .. }
        ));
        assert!(publisher.sheet_names("sheet-1").is_empty());
    }

    #[tokio::test]
    async fn validation_failure_is_not_retried() {
        let store = UnsteadyStore {
            inner: InMemorySnapshotStore::new(),
            outages: AtomicUsize::new(1),
            error: || DomainError::Validation("bad day".into()),
        };
        let repos = Arc::new(InMemoryRepositoryProvider::with_snapshot_store(store));
        let publisher = Arc::new(InMemorySheetPublisher::new());
        let engine = ExportEngine::new(repos, publisher, ExportConfig::default());

        let err = engine.publish(today()).await.unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Persistence { source: DomainError::Validation(_), .. }
        ));
    }
}
