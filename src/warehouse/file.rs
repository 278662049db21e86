use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SagepipeError;

use super::{parse_timestamp, Row, RowError, TableRef, Warehouse};

/// Append-only JSON-lines tables under a local directory.
///
/// Each table lives at `{root}/{project}/{dataset}/{table}.jsonl` with one
/// row per line. Nothing is ever rewritten.
#[derive(Debug, Clone)]
pub struct FileWarehouse {
    root: PathBuf,
}

impl FileWarehouse {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn table_path(&self, table: &TableRef) -> PathBuf {
        self.root
            .join(&table.project)
            .join(&table.dataset)
            .join(format!("{}.jsonl", table.table))
    }

    fn read_rows(&self, table: &TableRef) -> Result<Vec<Row>, SagepipeError> {
        let path = self.table_path(table);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SagepipeError::StorageError(format!(
                    "Cannot read {}: {e}",
                    path.display()
                )))
            }
        };

        let mut rows = Vec::new();
        for (lineno, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(line) {
                Ok(Value::Object(row)) => rows.push(row),
                Ok(_) | Err(_) => {
                    tracing::warn!("Skipping malformed row at {}:{}", path.display(), lineno + 1);
                }
            }
        }
        Ok(rows)
    }
}

fn key_matches(row: &Row, key_column: &str, key: &str) -> bool {
    match row.get(key_column) {
        Some(Value::String(s)) => s == key,
        Some(other) if !other.is_null() => other.to_string() == key,
        _ => false,
    }
}

#[async_trait]
impl Warehouse for FileWarehouse {
    async fn latest_row(
        &self,
        table: &TableRef,
        key_column: &str,
        key: &str,
        order_column: &str,
    ) -> Result<Option<Row>, SagepipeError> {
        let rows = self.read_rows(table)?;
        // max_by_key keeps the last of equal keys, so a later append wins ties
        Ok(rows
            .into_iter()
            .filter(|row| key_matches(row, key_column, key))
            .max_by_key(|row| row.get(order_column).and_then(parse_timestamp)))
    }

    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: &[Row],
    ) -> Result<Vec<RowError>, SagepipeError> {
        let path = self.table_path(table);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut buf = String::new();
        for row in rows {
            let line = serde_json::to_string(row).map_err(|e| {
                SagepipeError::StorageError(format!("Failed to serialize row: {e}"))
            })?;
            buf.push_str(&line);
            buf.push('\n');
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        file.write_all(buf.as_bytes())?;
        tracing::debug!("Appended {} rows to {}", rows.len(), path.display());
        Ok(Vec::new())
    }
}
