use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation: {0}")]
    Validation(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl DomainError {
    /// Whether this error is likely transient (e.g. DB connection lost)
    /// and the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::Database(_))
    }
}

impl From<sea_orm::DbErr> for DomainError {
    fn from(e: sea_orm::DbErr) -> Self {
        DomainError::Database(e.to_string())
    }
}

/// Failures talking to the upstream tariff provider.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unusable provider response: {0}")]
    Unusable(String),
}

impl SourceError {
    /// Network blips, 5xx and 429 are worth another attempt; everything else
    /// (bad key, malformed body) will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            SourceError::Status { status, .. } => *status == 429 || *status >= 500,
            SourceError::Unusable(_) => false,
        }
    }
}

/// Failures talking to one spreadsheet destination.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sheets API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Sheet '{0}' does not exist")]
    SheetMissing(String),

    #[error("Destination did not finish within {0:?}")]
    Timeout(Duration),

    #[error("Invalid Sheets endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Step of the per-destination publish sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStep {
    ListSheets,
    CreateSheet,
    ReplaceContents,
    Timeout,
}

impl std::fmt::Display for PublishStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ListSheets => write!(f, "list_sheets"),
            Self::CreateSheet => write!(f, "create_sheet"),
            Self::ReplaceContents => write!(f, "replace_contents"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// A single destination that could not be published in a cycle.
#[derive(Debug, Error)]
#[error("destination {destination_id} failed at {step}: {error}")]
pub struct DestinationFailure {
    pub destination_id: String,
    pub step: PublishStep,
    #[source]
    pub error: SheetError,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Tariff fetch for {day} failed: {source}")]
    UpstreamFetch {
        day: NaiveDate,
        #[source]
        source: SourceError,
    },

    #[error("Tariff batch for {day} is empty")]
    EmptyBatch { day: NaiveDate },

    #[error("No stored tariffs to export for {day}")]
    NoDataToExport { day: NaiveDate },

    #[error("Persistence failure during {operation} for {day}: {source}")]
    Persistence {
        day: NaiveDate,
        operation: &'static str,
        #[source]
        source: DomainError,
    },
}

impl PipelineError {
    pub fn persistence(day: NaiveDate, operation: &'static str) -> impl FnOnce(DomainError) -> Self {
        move |source| PipelineError::Persistence {
            day,
            operation,
            source,
        }
    }

    /// Conditions that are part of normal operation rather than failures.
    pub fn is_benign(&self) -> bool {
        matches!(self, PipelineError::EmptyBatch { .. })
    }
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
