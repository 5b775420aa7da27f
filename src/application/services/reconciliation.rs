//! Reconciliation engine
//!
//! Decides whether a fetched batch seeds today's snapshot (insert) or
//! refreshes it (update). Update mode never backfills: a warehouse that
//! first shows up after the day's first run stays absent until tomorrow.

use std::sync::Arc;

use chrono::NaiveDate;
use metrics::counter;
use tracing::{error, info, warn};

use crate::domain::{RateUpdate, RepositoryProvider, TariffRecord};
use crate::shared::errors::PipelineError;

/// What a reconciliation pass did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// First run of the day: the batch became today's snapshot.
    Inserted { count: u64 },
    /// Today was already seeded: matching rows were overwritten.
    Updated {
        updated: u64,
        /// Batch entries with no stored counterpart for today.
        not_seeded: Vec<String>,
    },
}

pub struct ReconciliationEngine {
    repos: Arc<dyn RepositoryProvider>,
}

impl ReconciliationEngine {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self { repos }
    }

    /// Apply a normalized batch to the snapshot of `today`.
    ///
    /// An empty batch mutates nothing and yields [`PipelineError::EmptyBatch`].
    /// In update mode the first store failure aborts the remaining updates;
    /// updates already written stay written.
    pub async fn apply(
        &self,
        batch: Vec<TariffRecord>,
        today: NaiveDate,
    ) -> Result<ReconcileOutcome, PipelineError> {
        if batch.is_empty() {
            return Err(PipelineError::EmptyBatch { day: today });
        }

        let store = self.repos.snapshots();
        let seeded = store
            .exists_for_day(today)
            .await
            .map_err(PipelineError::persistence(today, "exists_for_day"))?;

        if !seeded {
            let records: Vec<TariffRecord> =
                batch.into_iter().map(|r| r.for_day(today)).collect();
            let offered = records.len() as u64;
            let count = store
                .insert_many(records)
                .await
                .map_err(PipelineError::persistence(today, "insert_many"))?;

            if count < offered {
                // Another run seeded some rows first (or the batch repeated a name).
                info!(day = %today, offered, inserted = count, "Some warehouses were already stored");
            }
            counter!("tariff_records_inserted_total").increment(count);
            info!(day = %today, count, "📥 Daily tariff snapshot created");
            return Ok(ReconcileOutcome::Inserted { count });
        }

        let mut updated = 0u64;
        let mut not_seeded = Vec::new();

        for record in &batch {
            let update = RateUpdate::from(record);
            match store.update_by_warehouse_and_day(today, &update).await {
                Ok(0) => not_seeded.push(record.warehouse_name.clone()),
                Ok(rows) => updated += rows,
                Err(e) => {
                    error!(
                        day = %today,
                        warehouse = %record.warehouse_name,
                        applied = updated,
                        error = %e,
                        "Tariff update failed, remaining updates skipped until next cycle"
                    );
                    counter!("tariff_records_updated_total").increment(updated);
                    return Err(PipelineError::Persistence {
                        day: today,
                        operation: "update_by_warehouse_and_day",
                        source: e,
                    });
                }
            }
        }

        if !not_seeded.is_empty() {
            warn!(
                day = %today,
                count = not_seeded.len(),
                warehouses = ?not_seeded,
                "Warehouses missing from today's first snapshot are not added until the next day"
            );
            counter!("tariff_records_not_seeded_total").increment(not_seeded.len() as u64);
        }

        counter!("tariff_records_updated_total").increment(updated);
        info!(day = %today, updated, "🔄 Daily tariff snapshot refreshed");

        Ok(ReconcileOutcome::Updated {
            updated,
            not_seeded,
        })
    }
}
