//! Destination aggregate
//!
//! Spreadsheets registered to receive the mirrored snapshot.

pub mod model;
pub mod repository;

pub use model::{extract_spreadsheet_id, Destination};
pub use repository::DestinationRegistry;
