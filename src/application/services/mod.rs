//! Application services

pub mod export;
pub mod pipeline;
pub mod reconciliation;
pub mod scheduler;

pub use export::{ExportConfig, ExportEngine, PublishReport, DEFAULT_SHEET_NAME};
pub use pipeline::{CycleReport, TariffPipeline};
pub use reconciliation::{ReconcileOutcome, ReconciliationEngine};
pub use scheduler::{current_day, next_trigger, Scheduler, SchedulerConfig};
