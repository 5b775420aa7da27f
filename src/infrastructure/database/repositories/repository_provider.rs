//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::repositories::RepositoryProvider;
use crate::domain::{DestinationRegistry, SnapshotStore};

use super::destination_repository::SeaOrmDestinationRepository;
use super::snapshot_repository::SeaOrmSnapshotRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let seeded = repos.snapshots().exists_for_day(today).await?;
/// let targets = repos.destinations().list().await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    snapshots: SeaOrmSnapshotRepository,
    destinations: SeaOrmDestinationRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            snapshots: SeaOrmSnapshotRepository::new(db.clone()),
            destinations: SeaOrmDestinationRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn snapshots(&self) -> &dyn SnapshotStore {
        &self.snapshots
    }

    fn destinations(&self) -> &dyn DestinationRegistry {
        &self.destinations
    }
}
