use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::SagepipeError;
use crate::oauth::token::TokenResponse;
use crate::warehouse::{format_timestamp, parse_timestamp, Row, TableRef, Warehouse};

const KEY_COLUMN: &str = "provider";
const ORDER_COLUMN: &str = "obtained_at";

/// One row of the append-only token table.
#[derive(Clone, PartialEq)]
pub struct TokenRecord {
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub obtained_at: Option<DateTime<Utc>>,
    pub raw: Option<String>,
}

impl std::fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenRecord")
            .field("provider", &self.provider)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_in", &self.expires_in)
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("obtained_at", &self.obtained_at)
            .finish_non_exhaustive()
    }
}

impl TokenRecord {
    /// Build the row written after a grant or refresh. `expires_at` is
    /// derived from `obtained_at` and is absent when `expires_in` is.
    pub fn from_response(
        provider: &str,
        resp: &TokenResponse,
        obtained_at: DateTime<Utc>,
    ) -> Result<Self, SagepipeError> {
        let expires_at = resp
            .expires_in
            .and_then(chrono::Duration::try_seconds)
            .and_then(|ttl| obtained_at.checked_add_signed(ttl));
        let raw = serde_json::to_string(resp).map_err(|e| {
            SagepipeError::StorageError(format!("Failed to serialize token response: {e}"))
        })?;
        Ok(Self {
            provider: provider.to_string(),
            access_token: resp.access_token.clone(),
            refresh_token: resp.refresh_token.clone(),
            expires_in: resp.expires_in,
            expires_at,
            scope: resp.scope.clone(),
            obtained_at: Some(obtained_at),
            raw: Some(raw),
        })
    }

    /// Decode a stored row, normalizing both timestamps to UTC.
    pub fn from_row(row: &Row) -> Result<Self, SagepipeError> {
        let access_token = optional_string(row, "access_token").ok_or_else(|| {
            SagepipeError::StorageError("Token row has no access_token".into())
        })?;

        let expires_at = match row.get("expires_at") {
            Some(v) if !v.is_null() => {
                let parsed = parse_timestamp(v);
                if parsed.is_none() {
                    tracing::warn!("Unparseable expires_at {v} in token row, treating as expired");
                }
                parsed
            }
            _ => None,
        };

        Ok(Self {
            provider: optional_string(row, "provider").unwrap_or_default(),
            access_token,
            refresh_token: optional_string(row, "refresh_token"),
            expires_in: row.get("expires_in").and_then(as_seconds),
            expires_at,
            scope: optional_string(row, "scope"),
            obtained_at: row.get(ORDER_COLUMN).and_then(parse_timestamp),
            raw: optional_string(row, "raw"),
        })
    }

    pub fn to_row(&self) -> Row {
        let ts = |t: &Option<DateTime<Utc>>| match t {
            Some(t) => Value::String(format_timestamp(t)),
            None => Value::Null,
        };
        let mut row = Row::new();
        row.insert("provider".into(), Value::String(self.provider.clone()));
        row.insert("access_token".into(), Value::String(self.access_token.clone()));
        row.insert("refresh_token".into(), self.refresh_token.clone().into());
        row.insert("expires_in".into(), self.expires_in.into());
        row.insert("expires_at".into(), ts(&self.expires_at));
        row.insert("scope".into(), self.scope.clone().into());
        row.insert(ORDER_COLUMN.into(), ts(&self.obtained_at));
        row.insert("raw".into(), self.raw.clone().into());
        row
    }
}

fn optional_string(row: &Row, column: &str) -> Option<String> {
    match row.get(column) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

fn as_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Reads and appends token rows in one warehouse table.
#[derive(Clone)]
pub struct TokenStore {
    warehouse: Arc<dyn Warehouse>,
    table: TableRef,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").field("table", &self.table).finish()
    }
}

impl TokenStore {
    pub fn new(warehouse: Arc<dyn Warehouse>, table: TableRef) -> Self {
        Self { warehouse, table }
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// The most recently obtained token for `provider`, if any.
    pub async fn get_latest(&self, provider: &str) -> Result<Option<TokenRecord>, SagepipeError> {
        let row = self
            .warehouse
            .latest_row(&self.table, KEY_COLUMN, provider, ORDER_COLUMN)
            .await?;
        row.as_ref().map(TokenRecord::from_row).transpose()
    }

    /// Append a new token row stamped with the current time.
    pub async fn insert(
        &self,
        provider: &str,
        token: &TokenResponse,
    ) -> Result<TokenRecord, SagepipeError> {
        let record = TokenRecord::from_response(provider, token, Utc::now())?;
        let errors = self
            .warehouse
            .insert_rows(&self.table, &[record.to_row()])
            .await?;
        if !errors.is_empty() {
            let detail: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(SagepipeError::StorageError(format!(
                "Error inserting token row into {}: {}",
                self.table,
                detail.join("; ")
            )));
        }
        tracing::info!("Saved {provider} token row to {}", self.table);
        Ok(record)
    }
}
