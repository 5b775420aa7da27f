//! Google Sheets v4 client
//!
//! Authenticates with a pre-issued OAuth bearer token. Obtaining and
//! refreshing that token happens outside this service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::application::ports::{CellValue, Row, SheetPublisher};
use crate::application::services::DEFAULT_SHEET_NAME;
use crate::shared::errors::SheetError;

pub const DEFAULT_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSheetsConfig {
    pub base_url: String,
    pub access_token: String,
    /// Tab inside every destination that receives the export
    pub sheet_name: String,
    pub request_timeout_secs: u64,
    /// Upper bound for all steps against one destination
    pub destination_timeout_secs: u64,
    /// Spreadsheets registered at start-up if not already present
    pub seed_destinations: Vec<String>,
}

impl Default for GoogleSheetsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            access_token: String::new(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            request_timeout_secs: 30,
            destination_timeout_secs: 120,
            seed_destinations: Vec::new(),
        }
    }
}

pub struct GoogleSheetsClient {
    http: reqwest::Client,
    base_url: Url,
    access_token: String,
}

impl GoogleSheetsClient {
    pub fn new(config: &GoogleSheetsConfig) -> Result<Self, SheetError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| SheetError::InvalidEndpoint(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(SheetError::InvalidEndpoint(config.base_url.clone()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            http,
            base_url,
            access_token: config.access_token.clone(),
        })
    }

    /// `{base}/v4/spreadsheets/{segments...}`, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, SheetError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SheetError::InvalidEndpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets"])
            .extend(segments);
        Ok(url)
    }

    async fn call(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<Value, SheetError> {
        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(&self.access_token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            return Err(SheetError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json::<Value>().await.unwrap_or(Value::Null))
    }

    async fn sheet_properties(&self, spreadsheet_id: &str) -> Result<Vec<SheetProperties>, SheetError> {
        let mut url = self.endpoint(&[spreadsheet_id])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title)");
        let value = self.call(Method::GET, url, None).await?;
        let metadata: SpreadsheetMetadata =
            serde_json::from_value(value).map_err(|e| SheetError::Api {
                status: 200,
                message: format!("unexpected spreadsheet metadata: {e}"),
            })?;
        Ok(metadata.sheets.into_iter().map(|s| s.properties).collect())
    }

    async fn batch_update(&self, spreadsheet_id: &str, requests: Vec<Value>) -> Result<(), SheetError> {
        let url = self.endpoint(&[&format!("{spreadsheet_id}:batchUpdate")])?;
        self.call(Method::POST, url, Some(json!({ "requests": requests })))
            .await
            .map(|_| ())
    }
}

/// `'name'!A1` with quotes inside the name doubled.
fn a1_range(sheet_name: &str, cell: Option<&str>) -> String {
    let quoted = format!("'{}'", sheet_name.replace('\'', "''"));
    match cell {
        Some(cell) => format!("{quoted}!{cell}"),
        None => quoted,
    }
}

/// `CellData` for `appendCells`.
fn cell_data(cell: &CellValue) -> Value {
    match cell {
        CellValue::Text(s) => json!({ "userEnteredValue": { "stringValue": s } }),
        CellValue::Integer(_) | CellValue::Number(_) => match cell.to_json() {
            Value::Number(n) => json!({ "userEnteredValue": { "numberValue": n } }),
            other => json!({ "userEnteredValue": { "stringValue": other } }),
        },
        CellValue::Empty => json!({}),
    }
}

fn row_data(row: &Row) -> Value {
    json!({ "values": row.iter().map(cell_data).collect::<Vec<_>>() })
}

#[async_trait]
impl SheetPublisher for GoogleSheetsClient {
    async fn list_sheet_names(&self, spreadsheet_id: &str) -> Result<Vec<String>, SheetError> {
        let sheets = self.sheet_properties(spreadsheet_id).await?;
        Ok(sheets.into_iter().map(|p| p.title).collect())
    }

    async fn create_sheet(&self, spreadsheet_id: &str, sheet_name: &str) -> Result<(), SheetError> {
        self.batch_update(
            spreadsheet_id,
            vec![json!({ "addSheet": { "properties": { "title": sheet_name } } })],
        )
        .await?;
        debug!(destination = %spreadsheet_id, sheet = %sheet_name, "Sheet created");
        Ok(())
    }

    async fn clear_sheet(&self, spreadsheet_id: &str, sheet_name: &str) -> Result<(), SheetError> {
        let range = format!("{}:clear", a1_range(sheet_name, None));
        let url = self.endpoint(&[spreadsheet_id, "values", &range])?;
        self.call(Method::POST, url, Some(json!({}))).await.map(|_| ())
    }

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        start_cell: &str,
        rows: &[Row],
    ) -> Result<(), SheetError> {
        let range = a1_range(sheet_name, Some(start_cell));
        let mut url = self.endpoint(&[spreadsheet_id, "values", &format!("{range}:append")])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");

        let values: Vec<Vec<Value>> = rows
            .iter()
            .map(|row| row.iter().map(CellValue::to_json).collect())
            .collect();
        let body = json!({ "range": range, "majorDimension": "ROWS", "values": values });
        self.call(Method::POST, url, Some(body)).await.map(|_| ())
    }

    /// Clear and rewrite in one `batchUpdate`, which Sheets applies atomically.
    async fn replace_sheet_contents(
        &self,
        spreadsheet_id: &str,
        sheet_name: &str,
        header: &Row,
        rows: &[Row],
    ) -> Result<(), SheetError> {
        let sheet_id = self
            .sheet_properties(spreadsheet_id)
            .await?
            .into_iter()
            .find(|p| p.title == sheet_name)
            .map(|p| p.sheet_id)
            .ok_or_else(|| SheetError::SheetMissing(sheet_name.to_string()))?;

        let data: Vec<Value> = std::iter::once(header).chain(rows).map(row_data).collect();
        let requests = vec![
            json!({ "updateCells": {
                "range": { "sheetId": sheet_id },
                "fields": "userEnteredValue"
            }}),
            json!({ "appendCells": {
                "sheetId": sheet_id,
                "rows": data,
                "fields": "userEnteredValue"
            }}),
        ];
        self.batch_update(spreadsheet_id, requests).await?;
        debug!(destination = %spreadsheet_id, sheet = %sheet_name, rows = rows.len(), "Sheet contents replaced");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn client(server: &MockServer) -> GoogleSheetsClient {
        GoogleSheetsClient::new(&GoogleSheetsConfig {
            base_url: server.base_url(),
            access_token: "token".into(),
            ..GoogleSheetsConfig::default()
        })
        .unwrap()
    }

    fn metadata(server: &MockServer, titles: &[(i64, &str)]) {
        let sheets: Vec<Value> = titles
            .iter()
            .map(|(id, title)| json!({ "properties": { "sheetId": id, "title": title } }))
            .collect();
        server.mock(|when, then| {
            when.method(GET)
                .path("/v4/spreadsheets/abc")
                .query_param("fields", "sheets.properties(sheetId,title)")
                .header("Authorization", "Bearer token");
            then.status(200).json_body(json!({ "sheets": sheets }));
        });
    }

    #[test]
    fn ranges_quote_sheet_names() {
        assert_eq!(a1_range("stock_coefs", Some("A2")), "'stock_coefs'!A2");
        assert_eq!(a1_range("it's", None), "'it''s'");
    }

    #[test]
    fn cell_data_shapes() {
        assert_eq!(
            cell_data(&CellValue::Text("Казань".into())),
            json!({ "userEnteredValue": { "stringValue": "Казань" } })
        );
        assert_eq!(
            cell_data(&CellValue::Number(Decimal::from_str("10.5").unwrap())),
            json!({ "userEnteredValue": { "numberValue": 10.5 } })
        );
        assert_eq!(cell_data(&CellValue::Empty), json!({}));
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let result = GoogleSheetsClient::new(&GoogleSheetsConfig {
            base_url: "not a url".into(),
            ..GoogleSheetsConfig::default()
        });
        assert!(matches!(result, Err(SheetError::InvalidEndpoint(_))));
    }

    #[tokio::test]
    async fn lists_sheet_titles() {
        let server = MockServer::start_async().await;
        metadata(&server, &[(0, "Sheet1"), (7, "stock_coefs")]);

        let names = client(&server).list_sheet_names("abc").await.unwrap();

        assert_eq!(names, vec!["Sheet1", "stock_coefs"]);
    }

    #[tokio::test]
    async fn creates_sheet_via_batch_update() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v4/spreadsheets/abc:batchUpdate")
                .body_contains("addSheet")
                .body_contains("stock_coefs");
            then.status(200).json_body(json!({ "replies": [{}] }));
        });

        client(&server).create_sheet("abc", "stock_coefs").await.unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn replace_clears_and_appends_in_one_request() {
        let server = MockServer::start_async().await;
        metadata(&server, &[(7, "stock_coefs")]);
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v4/spreadsheets/abc:batchUpdate")
                .body_contains("updateCells")
                .body_contains("appendCells")
                .body_contains("\"sheetId\":7")
                .body_contains("Коледино");
            then.status(200).json_body(json!({ "replies": [{}, {}] }));
        });

        let header = vec![CellValue::Text("Название склада".into())];
        let rows = vec![vec![CellValue::Text("Коледино".into())]];
        client(&server)
            .replace_sheet_contents("abc", "stock_coefs", &header, &rows)
            .await
            .unwrap();

        mock.assert_hits(1);
    }

    #[tokio::test]
    async fn replace_without_the_sheet_fails() {
        let server = MockServer::start_async().await;
        metadata(&server, &[(0, "Sheet1")]);

        let err = client(&server)
            .replace_sheet_contents("abc", "stock_coefs", &vec![], &[])
            .await
            .unwrap_err();

        assert!(matches!(err, SheetError::SheetMissing(name) if name == "stock_coefs"));
    }

    #[tokio::test]
    async fn append_uses_raw_input() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path_contains(":append")
                .query_param("valueInputOption", "RAW")
                .body_contains("\"values\":[[1,\"x\"]]");
            then.status(200).json_body(json!({}));
        });

        client(&server)
            .append_rows(
                "abc",
                "stock_coefs",
                "A2",
                &[vec![CellValue::Integer(1), CellValue::Text("x".into())]],
            )
            .await
            .unwrap();

        mock.assert();
    }

    #[tokio::test]
    async fn api_errors_carry_google_message() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/v4/spreadsheets/abc");
            then.status(403).json_body(json!({
                "error": { "code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED" }
            }));
        });

        let err = client(&server).list_sheet_names("abc").await.unwrap_err();

        match err {
            SheetError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "The caller does not have permission");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
