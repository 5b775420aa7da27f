//! In-memory spreadsheet backend
//!
//! Behaves like a tiny Google Sheets: spreadsheets hold named tabs, tabs hold
//! rows. Destinations can be made to fail or stall to exercise isolation.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::application::ports::{Row, SheetPublisher};
use crate::shared::errors::SheetError;

#[derive(Debug, Clone, Default)]
struct Tab {
    name: String,
    rows: Vec<Row>,
}

#[derive(Default)]
pub struct InMemorySheetPublisher {
    spreadsheets: DashMap<String, Vec<Tab>>,
    failing: DashMap<String, ()>,
    delays: DashMap<String, Duration>,
}

impl InMemorySheetPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call against `spreadsheet_id` fails from now on.
    pub fn fail_destination(&self, spreadsheet_id: &str) {
        self.failing.insert(spreadsheet_id.to_string(), ());
    }

    /// Every call against `spreadsheet_id` stalls for `delay` first.
    pub fn delay_destination(&self, spreadsheet_id: &str, delay: Duration) {
        self.delays.insert(spreadsheet_id.to_string(), delay);
    }

    pub fn sheet_names(&self, spreadsheet_id: &str) -> Vec<String> {
        self.spreadsheets
            .get(spreadsheet_id)
            .map(|tabs| tabs.iter().map(|t| t.name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn sheet_rows(&self, spreadsheet_id: &str, sheet_name: &str) -> Option<Vec<Row>> {
        self.spreadsheets.get(spreadsheet_id).and_then(|tabs| {
            tabs.iter()
                .find(|t| t.name == sheet_name)
                .map(|t| t.rows.clone())
        })
    }

    async fn reach(&self, spreadsheet_id: &str) -> Result<(), SheetError> {
        let delay = self.delays.get(spreadsheet_id).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains_key(spreadsheet_id) {
            return Err(SheetError::Api {
                status: 503,
                message: format!("spreadsheet {spreadsheet_id} unavailable"),
            });
        }
        Ok(())
    }

    fn with_tab<T>(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        f: impl FnOnce(&mut Tab) -> T,
    ) -> Result<T, SheetError> {
        let mut tabs = self.spreadsheets.entry(spreadsheet_id.to_string()).or_default();
        tabs.iter_mut()
            .find(|t| t.name == sheet_name)
            .map(f)
            .ok_or_else(|| SheetError::SheetMissing(sheet_name.to_string()))
    }
}

/// Zero-based row index of an `A1`-style cell reference.
fn row_index(start_cell: &str) -> usize {
    start_cell
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .parse::<usize>()
        .map(|n| n.saturating_sub(1))
        .unwrap_or(0)
}

#[async_trait]
impl SheetPublisher for InMemorySheetPublisher {
    async fn list_sheet_names(&self, spreadsheet_id: &str) -> Result<Vec<String>, SheetError> {
        self.reach(spreadsheet_id).await?;
        Ok(self.sheet_names(spreadsheet_id))
    }

    async fn create_sheet(&self, spreadsheet_id: &str, sheet_name: &str) -> Result<(), SheetError> {
        self.reach(spreadsheet_id).await?;
        let mut tabs = self.spreadsheets.entry(spreadsheet_id.to_string()).or_default();
        if tabs.iter().any(|t| t.name == sheet_name) {
            return Err(SheetError::Api {
                status: 400,
                message: format!("A sheet with the name \"{sheet_name}\" already exists"),
            });
        }
        tabs.push(Tab {
            name: sheet_name.to_string(),
            rows: Vec::new(),
        });
        Ok(())
    }

    async fn clear_sheet(&self, spreadsheet_id: &str, sheet_name: &str) -> Result<(), SheetError> {
        self.reach(spreadsheet_id).await?;
        self.with_tab(spreadsheet_id, sheet_name, |tab| tab.rows.clear())
    }

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        start_cell: &str,
        rows: &[Row],
    ) -> Result<(), SheetError> {
        self.reach(spreadsheet_id).await?;
        let start = row_index(start_cell);
        self.with_tab(spreadsheet_id, sheet_name, |tab| {
            if tab.rows.len() < start {
                tab.rows.resize(start, Row::new());
            }
            tab.rows.extend_from_slice(rows);
        })
    }
}
