//! In-memory adapters for development and testing

pub mod repositories;
pub mod sheet_publisher;

pub use repositories::{
    InMemoryDestinationRegistry, InMemoryRepositoryProvider, InMemorySnapshotStore,
};
pub use sheet_publisher::InMemorySheetPublisher;
