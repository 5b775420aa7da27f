pub mod destination;
pub mod repositories;
pub mod tariff;

// Re-export commonly used types
pub use destination::{Destination, DestinationRegistry};
pub use repositories::{DomainResult, RepositoryProvider};
pub use tariff::{normalize_batch, RateUpdate, RawTariff, SnapshotStore, TariffRecord};

pub use crate::shared::errors::DomainError;
