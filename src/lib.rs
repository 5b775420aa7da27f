//! # Tariff mirror
//!
//! Periodically pulls Wildberries box tariffs, persists one snapshot per
//! day and mirrors the current day's snapshot into Google Sheets.
//!
//! ## Architecture
//!
//! - **domain**: tariff records, normalization, repository traits
//! - **application**: reconciliation and export engines, the cycle pipeline
//!   and its scheduler
//! - **infrastructure**: SeaORM storage, Wildberries and Google Sheets
//!   clients, in-memory adapters
//! - **server**: service bootstrap and lifecycle

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

// Re-export database types for easy access
pub use infrastructure::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};
