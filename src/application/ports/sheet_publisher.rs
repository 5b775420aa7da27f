//! Sheet publisher port: low-level operations against one spreadsheet

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::shared::errors::SheetError;

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Number(Decimal),
    Empty,
}

impl CellValue {
    /// JSON form used by the `values` endpoints with `RAW` input.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Number(d) => d
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(d.to_string())),
            Self::Empty => serde_json::Value::String(String::new()),
        }
    }
}

impl From<Option<Decimal>> for CellValue {
    fn from(value: Option<Decimal>) -> Self {
        value.map(CellValue::Number).unwrap_or(CellValue::Empty)
    }
}

pub type Row = Vec<CellValue>;

/// Operations against one spreadsheet destination, addressed by its id.
///
/// Steps for one spreadsheet must be issued sequentially; different
/// spreadsheets share no state and may be driven concurrently.
#[async_trait]
pub trait SheetPublisher: Send + Sync {
    async fn list_sheet_names(&self, spreadsheet_id: &str) -> Result<Vec<String>, SheetError>;

    async fn create_sheet(&self, spreadsheet_id: &str, sheet_name: &str) -> Result<(), SheetError>;

    async fn clear_sheet(&self, spreadsheet_id: &str, sheet_name: &str) -> Result<(), SheetError>;

    /// Append `rows` to the table found at `start_cell` (e.g. `"A2"`).
    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        start_cell: &str,
        rows: &[Row],
    ) -> Result<(), SheetError>;

    /// Replace everything in the sheet with `header` followed by `rows`.
    ///
    /// The default is clear, header at `A1`, data at `A2`. Backends with
    /// batched writes should override this so readers never see a
    /// half-written sheet.
    async fn replace_sheet_contents(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        header: &Row,
        rows: &[Row],
    ) -> Result<(), SheetError> {
        self.clear_sheet(spreadsheet_id, sheet_name).await?;
        self.append_rows(spreadsheet_id, sheet_name, "A1", std::slice::from_ref(header))
            .await?;
        if !rows.is_empty() {
            self.append_rows(spreadsheet_id, sheet_name, "A2", rows).await?;
        }
        Ok(())
    }
}
