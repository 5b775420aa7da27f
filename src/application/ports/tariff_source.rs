//! Tariff source port: where raw warehouse tariffs come from

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::RawTariff;
use crate::shared::errors::SourceError;

/// Fetches the current warehouse tariffs for a date.
///
/// Implementations return the provider's strings untouched; normalization
/// happens in the pipeline. An empty vector is a valid answer.
#[async_trait]
pub trait TariffSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch(&self, day: NaiveDate) -> Result<Vec<RawTariff>, SourceError>;
}
