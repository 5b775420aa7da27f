//! Application ports (hexagonal architecture boundaries)
//!
//! Outbound collaborators the pipeline talks to. Persistence ports live in
//! `domain` next to their aggregates.

pub mod sheet_publisher;
pub mod tariff_source;

pub use sheet_publisher::{CellValue, Row, SheetPublisher};
pub use tariff_source::TariffSource;
