use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::SagepipeError;

use super::{Row, RowError, TableRef, Warehouse};

/// How long BigQuery may hold a `jobs.query` call before answering
/// with `jobComplete: false`.
const QUERY_TIMEOUT_MS: u64 = 10_000;

/// BigQuery over its REST API.
///
/// Reads go through `jobs.query` with a named query parameter and writes
/// through `tabledata.insertAll`, which reports rejected rows individually.
pub struct BigQueryWarehouse {
    client: reqwest::Client,
    api_base: String,
    access_token: String,
}

impl std::fmt::Debug for BigQueryWarehouse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BigQueryWarehouse")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    job_complete: Option<bool>,
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    rows: Vec<TableRow>,
}

#[derive(Debug, Deserialize)]
struct TableSchema {
    #[serde(default)]
    fields: Vec<FieldSchema>,
}

#[derive(Debug, Deserialize)]
struct FieldSchema {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    #[serde(default)]
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableRow {
    #[serde(default)]
    f: Vec<TableCell>,
}

#[derive(Debug, Deserialize)]
struct TableCell {
    #[serde(default)]
    v: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertAllResponse {
    #[serde(default)]
    insert_errors: Vec<InsertErrors>,
}

#[derive(Debug, Deserialize)]
struct InsertErrors {
    index: usize,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
}

impl BigQueryWarehouse {
    pub fn new(client: reqwest::Client, api_base: &str, access_token: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn query_url(&self, project: &str) -> String {
        format!("{}/projects/{}/queries", self.api_base, project)
    }

    fn insert_all_url(&self, table: &TableRef) -> String {
        format!(
            "{}/projects/{}/datasets/{}/tables/{}/insertAll",
            self.api_base, table.project, table.dataset, table.table
        )
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<reqwest::Response, SagepipeError> {
        tracing::debug!("POST {url}");
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| SagepipeError::transport(url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SagepipeError::NetworkError {
                url: url.to_string(),
                status: Some(status.as_u16()),
                detail: body,
            });
        }
        Ok(resp)
    }
}

fn latest_row_sql(table: &TableRef, key_column: &str, order_column: &str) -> String {
    format!(
        "SELECT * FROM `{table}` WHERE `{key_column}` = @key ORDER BY `{order_column}` DESC LIMIT 1"
    )
}

/// Turn a REST cell into a typed JSON value. BigQuery sends every scalar as
/// a string; INTEGER, FLOAT and BOOLEAN columns are converted back.
fn decode_cell(field: &FieldSchema, value: Value) -> Value {
    if field.mode.as_deref() == Some("REPEATED") {
        return value;
    }
    let Value::String(s) = &value else {
        return value;
    };
    match field.field_type.as_str() {
        "INTEGER" | "INT64" => s.parse::<i64>().map(Value::from).unwrap_or(value),
        "FLOAT" | "FLOAT64" => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or(value),
        "BOOLEAN" | "BOOL" => s.parse::<bool>().map(Value::Bool).unwrap_or(value),
        _ => value,
    }
}

fn decode_row(schema: &TableSchema, row: TableRow) -> Row {
    schema
        .fields
        .iter()
        .zip(row.f)
        .map(|(field, cell)| (field.name.clone(), decode_cell(field, cell.v)))
        .collect()
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn latest_row(
        &self,
        table: &TableRef,
        key_column: &str,
        key: &str,
        order_column: &str,
    ) -> Result<Option<Row>, SagepipeError> {
        let url = self.query_url(&table.project);
        let body = json!({
            "query": latest_row_sql(table, key_column, order_column),
            "useLegacySql": false,
            "parameterMode": "NAMED",
            "queryParameters": [{
                "name": "key",
                "parameterType": { "type": "STRING" },
                "parameterValue": { "value": key },
            }],
            "timeoutMs": QUERY_TIMEOUT_MS,
        });

        let resp = self.post_json(&url, &body).await?;
        let parsed: QueryResponse = resp.json().await.map_err(|e| {
            SagepipeError::StorageError(format!("Failed to parse BigQuery query response: {e}"))
        })?;

        if parsed.job_complete == Some(false) {
            return Err(SagepipeError::StorageError(format!(
                "BigQuery query on {table} did not complete within {QUERY_TIMEOUT_MS}ms"
            )));
        }

        let Some(row) = parsed.rows.into_iter().next() else {
            return Ok(None);
        };
        let schema = parsed.schema.ok_or_else(|| {
            SagepipeError::StorageError("BigQuery query response has rows but no schema".into())
        })?;
        Ok(Some(decode_row(&schema, row)))
    }

    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: &[Row],
    ) -> Result<Vec<RowError>, SagepipeError> {
        let url = self.insert_all_url(table);
        let body = json!({
            "rows": rows.iter().map(|row| json!({ "json": row })).collect::<Vec<_>>(),
        });

        let resp = self.post_json(&url, &body).await?;
        let parsed: InsertAllResponse = resp.json().await.map_err(|e| {
            SagepipeError::StorageError(format!("Failed to parse BigQuery insertAll response: {e}"))
        })?;

        Ok(parsed
            .insert_errors
            .into_iter()
            .flat_map(|entry| {
                let index = entry.index;
                if entry.errors.is_empty() {
                    return vec![RowError {
                        index,
                        reason: "unknown".into(),
                        message: "row rejected".into(),
                    }];
                }
                entry
                    .errors
                    .into_iter()
                    .map(|e| RowError {
                        index,
                        reason: e.reason,
                        message: e.message,
                    })
                    .collect()
            })
            .collect())
    }
}
