//! Tariff snapshot aggregate
//!
//! Daily per-warehouse tariff records and the store they live in.

pub mod model;
pub mod repository;

pub use model::{
    normalize_batch, parse_rate, RateUpdate, RawTariff, RejectedTariff, TariffRecord,
};
pub use repository::SnapshotStore;
