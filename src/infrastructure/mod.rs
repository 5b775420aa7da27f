//! Infrastructure layer - external concerns

pub mod database;
pub mod google_sheets;
pub mod memory;
pub mod wildberries;

pub use database::{init_database, run_migrations, DatabaseConfig, SeaOrmRepositoryProvider};
pub use google_sheets::{GoogleSheetsClient, GoogleSheetsConfig};
pub use memory::{InMemoryRepositoryProvider, InMemorySheetPublisher};
pub use wildberries::{WildberriesClient, WildberriesConfig};
