pub mod bigquery;
pub mod file;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::SagepipeError;

pub use bigquery::BigQueryWarehouse;
pub use file::FileWarehouse;

/// One warehouse row, keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// Fully qualified `project.dataset.table` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
}

impl TableRef {
    pub fn new(project: &str, dataset: &str, table: &str) -> Self {
        Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
        }
    }
}

impl FromStr for TableRef {
    type Err = SagepipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        match parts.as_slice() {
            [project, dataset, table]
                if !project.is_empty() && !dataset.is_empty() && !table.is_empty() =>
            {
                Ok(TableRef::new(project, dataset, table))
            }
            _ => Err(SagepipeError::ConfigurationError(format!(
                "Invalid table '{s}', expected project.dataset.table"
            ))),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
    }
}

/// A row the warehouse refused during an append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub index: usize,
    pub reason: String,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {} ({})", self.index, self.message, self.reason)
    }
}

impl std::fmt::Debug for dyn Warehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Warehouse").finish()
    }
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Return the row whose `key_column` equals `key` with the greatest
    /// `order_column`, or `None` when no row matches.
    async fn latest_row(
        &self,
        table: &TableRef,
        key_column: &str,
        key: &str,
        order_column: &str,
    ) -> Result<Option<Row>, SagepipeError>;

    /// Append `rows` in one batch. Rejected rows are reported in the returned
    /// list; only failures of the call itself are errors.
    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: &[Row],
    ) -> Result<Vec<RowError>, SagepipeError>;
}

/// Normalize a stored timestamp cell to UTC.
///
/// Accepts RFC 3339 strings with any offset, naive `YYYY-MM-DD HH:MM:SS[.f]`
/// strings (with or without a `T`, optionally suffixed ` UTC` or `+00`),
/// which are taken to be UTC, and epoch seconds given either as a JSON number
/// or as a numeric string such as BigQuery's `"1.7005E9"`.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch_seconds),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let naive = s
        .strip_suffix(" UTC")
        .or_else(|| s.strip_suffix("+00"))
        .or_else(|| s.strip_suffix('Z'))
        .unwrap_or(s);
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Some(dt.and_utc());
        }
    }

    s.parse::<f64>().ok().and_then(from_epoch_seconds)
}

fn from_epoch_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_micros((secs * 1_000_000.0).round() as i64)
}

/// Render a timestamp the way rows are written: RFC 3339, UTC, microseconds.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
