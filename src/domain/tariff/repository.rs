//! Snapshot store interface

use async_trait::async_trait;
use chrono::NaiveDate;

use super::model::{RateUpdate, TariffRecord};
use crate::shared::errors::DomainResult;

/// Relational persistence of daily tariff snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Whether any record exists for `day`.
    async fn exists_for_day(&self, day: NaiveDate) -> DomainResult<bool>;

    /// Insert records; rows that already exist for the same (day, warehouse)
    /// are left untouched. Returns the number of rows inserted.
    async fn insert_many(&self, records: Vec<TariffRecord>) -> DomainResult<u64>;

    /// Overwrite the rate fields of the record matching `(day, warehouse_name)`.
    /// Returns the number of rows affected (0 when no such record exists).
    async fn update_by_warehouse_and_day(
        &self,
        day: NaiveDate,
        update: &RateUpdate,
    ) -> DomainResult<u64>;

    /// All records for `day`, ordered by coefficient ascending, then warehouse name.
    async fn select_for_day(&self, day: NaiveDate) -> DomainResult<Vec<TariffRecord>>;
}
