//! Database entities module

pub mod spreadsheet;
pub mod warehouse_tariff;

pub use spreadsheet::Entity as Spreadsheet;
pub use warehouse_tariff::Entity as WarehouseTariff;
