//! Warehouse tariff domain entities
//!
//! [`RawTariff`] is what the provider hands us (locale-formatted strings),
//! [`TariffRecord`] is what gets stored: one warehouse, one calendar day.

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::shared::errors::{DomainError, DomainResult};

/// Scale of the monetary columns (`DECIMAL(10,2)`).
pub const RATE_SCALE: u32 = 2;

/// Un-normalized tariff entry as returned by the pricing API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTariff {
    pub warehouse_name: String,
    pub coefficient: String,
    pub delivery_base: String,
    pub delivery_liter: String,
    pub storage_base: String,
    pub storage_liter: String,
}

/// Tariff of one warehouse for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TariffRecord {
    pub warehouse_name: String,
    pub day: NaiveDate,
    pub delivery_and_storage_coefficient: i32,
    pub delivery_base_rate: Decimal,
    pub delivery_per_liter_rate: Decimal,
    pub storage_base_rate: Option<Decimal>,
    pub storage_per_liter_rate: Option<Decimal>,
}

/// The five mutable fields of a stored record, as written by the update path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateUpdate {
    pub warehouse_name: String,
    pub delivery_and_storage_coefficient: i32,
    pub delivery_base_rate: Decimal,
    pub delivery_per_liter_rate: Decimal,
    pub storage_base_rate: Option<Decimal>,
    pub storage_per_liter_rate: Option<Decimal>,
}

impl From<&TariffRecord> for RateUpdate {
    fn from(r: &TariffRecord) -> Self {
        Self {
            warehouse_name: r.warehouse_name.clone(),
            delivery_and_storage_coefficient: r.delivery_and_storage_coefficient,
            delivery_base_rate: r.delivery_base_rate,
            delivery_per_liter_rate: r.delivery_per_liter_rate,
            storage_base_rate: r.storage_base_rate,
            storage_per_liter_rate: r.storage_per_liter_rate,
        }
    }
}

impl TariffRecord {
    /// Same record, re-stamped for another day.
    pub fn for_day(mut self, day: NaiveDate) -> Self {
        self.day = day;
        self
    }
}

impl RawTariff {
    /// Normalize provider strings into a storable record for `day`.
    pub fn normalize(&self, day: NaiveDate) -> DomainResult<TariffRecord> {
        let warehouse_name = self.warehouse_name.trim();
        if warehouse_name.is_empty() {
            return Err(DomainError::Validation("warehouse name is empty".into()));
        }

        let coefficient = strip_spaces(&self.coefficient);
        let delivery_and_storage_coefficient = coefficient.parse::<i32>().map_err(|_| {
            DomainError::Validation(format!(
                "{warehouse_name}: coefficient '{}' is not an integer",
                self.coefficient
            ))
        })?;

        let required = |field: &str, value: &str| -> DomainResult<Decimal> {
            parse_rate(value)?.ok_or_else(|| {
                DomainError::Validation(format!("{warehouse_name}: {field} is missing"))
            })
        };

        Ok(TariffRecord {
            warehouse_name: warehouse_name.to_string(),
            day,
            delivery_and_storage_coefficient,
            delivery_base_rate: required("delivery base rate", &self.delivery_base)?,
            delivery_per_liter_rate: required("delivery per-liter rate", &self.delivery_liter)?,
            storage_base_rate: parse_rate(&self.storage_base)?,
            storage_per_liter_rate: parse_rate(&self.storage_liter)?,
        })
    }
}

/// A provider entry that could not be normalized.
#[derive(Debug)]
pub struct RejectedTariff {
    pub warehouse_name: String,
    pub reason: DomainError,
}

/// Normalize a whole batch, separating entries that failed validation.
pub fn normalize_batch(
    raw: &[RawTariff],
    day: NaiveDate,
) -> (Vec<TariffRecord>, Vec<RejectedTariff>) {
    let mut records = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();

    for entry in raw {
        match entry.normalize(day) {
            Ok(record) => records.push(record),
            Err(reason) => rejected.push(RejectedTariff {
                warehouse_name: entry.warehouse_name.clone(),
                reason,
            }),
        }
    }

    (records, rejected)
}

/// Parse a locale-formatted decimal (`"1 039,5"`, `"10,50"`, `"0.1"`).
///
/// Empty strings and the provider's `-` placeholder mean "no value".
pub fn parse_rate(value: &str) -> DomainResult<Option<Decimal>> {
    let cleaned = strip_spaces(value).replace(',', ".");
    if cleaned.is_empty() || cleaned == "-" {
        return Ok(None);
    }

    Decimal::from_str(&cleaned)
        .map(|d| {
            Some(d.round_dp_with_strategy(RATE_SCALE, RoundingStrategy::MidpointAwayFromZero))
        })
        .map_err(|_| DomainError::Validation(format!("'{value}' is not a decimal number")))
}

fn strip_spaces(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .collect()
}
