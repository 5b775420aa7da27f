pub mod ports;
pub mod services;

// Re-export key types for convenience
pub use ports::{CellValue, Row, SheetPublisher, TariffSource};
pub use services::{
    CycleReport, ExportConfig, ExportEngine, PublishReport, ReconcileOutcome,
    ReconciliationEngine, Scheduler, SchedulerConfig, TariffPipeline,
};
