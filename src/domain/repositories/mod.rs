//! Repository traits for the domain layer
//!
//! Contains:
//! - `RepositoryProvider`: unified access to all per-aggregate repositories
//! - `DomainResult`: standard result type for domain operations

use super::destination::DestinationRegistry;
use super::tariff::SnapshotStore;

pub use crate::shared::errors::DomainResult;

/// Provides access to all domain repositories.
///
/// Consumers request only the repository they need:
///
/// ```ignore
/// async fn handle(repos: &dyn RepositoryProvider, day: NaiveDate) {
///     let seeded = repos.snapshots().exists_for_day(day).await?;
///     let targets = repos.destinations().list().await?;
/// }
/// ```
pub trait RepositoryProvider: Send + Sync {
    fn snapshots(&self) -> &dyn SnapshotStore;
    fn destinations(&self) -> &dyn DestinationRegistry;
}
