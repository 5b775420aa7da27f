//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod destination_repository;
pub mod repository_provider;
pub mod snapshot_repository;

pub use destination_repository::SeaOrmDestinationRepository;
pub use repository_provider::SeaOrmRepositoryProvider;
pub use snapshot_repository::SeaOrmSnapshotRepository;
