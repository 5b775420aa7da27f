//! In-memory repositories for development and testing

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::{
    Destination, DestinationRegistry, DomainError, DomainResult, RateUpdate, RepositoryProvider,
    SnapshotStore, TariffRecord,
};

/// Snapshot store keyed by (day, warehouse name).
#[derive(Default)]
pub struct InMemorySnapshotStore {
    rows: DashMap<(NaiveDate, String), TariffRecord>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn exists_for_day(&self, day: NaiveDate) -> DomainResult<bool> {
        Ok(self.rows.iter().any(|entry| entry.key().0 == day))
    }

    async fn insert_many(&self, records: Vec<TariffRecord>) -> DomainResult<u64> {
        let mut inserted = 0;
        for record in records {
            if let Entry::Vacant(slot) = self
                .rows
                .entry((record.day, record.warehouse_name.clone()))
            {
                slot.insert(record);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn update_by_warehouse_and_day(
        &self,
        day: NaiveDate,
        update: &RateUpdate,
    ) -> DomainResult<u64> {
        let Some(mut row) = self.rows.get_mut(&(day, update.warehouse_name.clone())) else {
            return Ok(0);
        };
        row.delivery_and_storage_coefficient = update.delivery_and_storage_coefficient;
        row.delivery_base_rate = update.delivery_base_rate;
        row.delivery_per_liter_rate = update.delivery_per_liter_rate;
        row.storage_base_rate = update.storage_base_rate;
        row.storage_per_liter_rate = update.storage_per_liter_rate;
        Ok(1)
    }

    async fn select_for_day(&self, day: NaiveDate) -> DomainResult<Vec<TariffRecord>> {
        let mut records: Vec<TariffRecord> = self
            .rows
            .iter()
            .filter(|entry| entry.key().0 == day)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| {
            a.delivery_and_storage_coefficient
                .cmp(&b.delivery_and_storage_coefficient)
                .then_with(|| a.warehouse_name.cmp(&b.warehouse_name))
        });
        Ok(records)
    }
}

#[derive(Default)]
pub struct InMemoryDestinationRegistry {
    entries: DashMap<String, Destination>,
    counter: AtomicI32,
}

impl InMemoryDestinationRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DestinationRegistry for InMemoryDestinationRegistry {
    async fn list(&self) -> DomainResult<Vec<Destination>> {
        let mut list: Vec<Destination> = self.entries.iter().map(|e| e.value().clone()).collect();
        list.sort_by_key(|d| d.id);
        Ok(list)
    }

    async fn add(&self, destination_id: &str) -> DomainResult<Destination> {
        match self.entries.entry(destination_id.to_string()) {
            Entry::Occupied(_) => Err(DomainError::Conflict(format!(
                "spreadsheet {destination_id} is already registered"
            ))),
            Entry::Vacant(slot) => {
                let destination = Destination {
                    id: self.counter.fetch_add(1, Ordering::SeqCst) + 1,
                    destination_id: destination_id.to_string(),
                    created_at: Utc::now(),
                };
                slot.insert(destination.clone());
                Ok(destination)
            }
        }
    }

    async fn remove(&self, destination_id: &str) -> DomainResult<u64> {
        Ok(self.entries.remove(destination_id).map_or(0, |_| 1))
    }
}

/// Repository provider backed by process memory.
pub struct InMemoryRepositoryProvider {
    snapshots: Box<dyn SnapshotStore>,
    destinations: InMemoryDestinationRegistry,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::with_snapshot_store(InMemorySnapshotStore::new())
    }

    pub fn with_snapshot_store(store: impl SnapshotStore + 'static) -> Self {
        Self {
            snapshots: Box::new(store),
            destinations: InMemoryDestinationRegistry::new(),
        }
    }
}

impl Default for InMemoryRepositoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn snapshots(&self) -> &dyn SnapshotStore {
        self.snapshots.as_ref()
    }

    fn destinations(&self) -> &dyn DestinationRegistry {
        &self.destinations
    }
}
