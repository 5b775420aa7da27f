//! Destination registry interface

use async_trait::async_trait;

use super::model::Destination;
use crate::shared::errors::DomainResult;

#[async_trait]
pub trait DestinationRegistry: Send + Sync {
    /// Current destinations, in registration order.
    async fn list(&self) -> DomainResult<Vec<Destination>>;
    async fn add(&self, destination_id: &str) -> DomainResult<Destination>;
    /// Returns the number of removed entries.
    async fn remove(&self, destination_id: &str) -> DomainResult<u64>;
}
