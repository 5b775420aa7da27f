//! Wildberries box tariff client

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ports::TariffSource;
use crate::domain::RawTariff;
use crate::shared::errors::SourceError;

pub const DEFAULT_BASE_URL: &str = "https://common-api.wildberries.ru";

/// Longest error body kept in a `SourceError::Status`.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WildberriesConfig {
    pub base_url: String,
    /// Sent verbatim in the `Authorization` header; never logged.
    pub api_key: String,
    pub request_timeout_secs: u64,
    /// Attempts per cycle for transient failures, first one included.
    pub retry_attempts: u32,
}

impl Default for WildberriesConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            request_timeout_secs: 30,
            retry_attempts: 3,
        }
    }
}

/// Box tariffs from the Wildberries common API.
#[derive(Debug, Clone)]
pub struct WildberriesClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl WildberriesClient {
    pub fn new(config: &WildberriesConfig) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            api_key: config.api_key.clone(),
            http,
            base_url: config.base_url.clone(),
        })
    }

    fn tariffs_url(&self) -> String {
        format!("{}/api/v1/tariffs/box", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl TariffSource for WildberriesClient {
    fn source_name(&self) -> &'static str {
        "wildberries"
    }

    async fn fetch(&self, day: NaiveDate) -> Result<Vec<RawTariff>, SourceError> {
        let date = day.format("%Y-%m-%d").to_string();
        let resp = self
            .http
            .get(self.tariffs_url())
            .header(AUTHORIZATION, self.api_key.as_str())
            .query(&[("date", date.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: TariffsEnvelope = resp
            .json()
            .await
            .map_err(|e| SourceError::Unusable(format!("malformed tariffs body: {e}")))?;

        let warehouses = envelope
            .response
            .and_then(|r| r.data)
            .and_then(|d| d.warehouse_list)
            .ok_or_else(|| SourceError::Unusable("response.data.warehouseList is missing".into()))?;

        debug!(day = %day, count = warehouses.len(), "Wildberries tariffs received");
        Ok(warehouses.into_iter().map(RawTariff::from).collect())
    }
}

#[derive(Debug, Deserialize)]
struct TariffsEnvelope {
    response: Option<TariffsResponse>,
}

#[derive(Debug, Deserialize)]
struct TariffsResponse {
    data: Option<TariffsData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TariffsData {
    warehouse_list: Option<Vec<WarehouseEntry>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WarehouseEntry {
    warehouse_name: String,
    box_delivery_and_storage_expr: String,
    box_delivery_base: String,
    box_delivery_liter: String,
    box_storage_base: String,
    box_storage_liter: String,
}

impl From<WarehouseEntry> for RawTariff {
    fn from(w: WarehouseEntry) -> Self {
        RawTariff {
            warehouse_name: w.warehouse_name,
            coefficient: w.box_delivery_and_storage_expr,
            delivery_base: w.box_delivery_base,
            delivery_liter: w.box_delivery_liter,
            storage_base: w.box_storage_base,
            storage_liter: w.box_storage_liter,
        }
    }
}

// -----------------
// Tests (no network)
// -----------------
