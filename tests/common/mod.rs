pub mod sage_mock;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sagepipe::config::settings_from_lookup;
use sagepipe::warehouse::parse_timestamp;
use sagepipe::{Row, RowError, SagepipeError, Settings, TableRef, TokenRecord, Warehouse};

/// In-memory warehouse that counts every read and write.
#[allow(dead_code)]
#[derive(Default)]
pub struct MemoryWarehouse {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
}

#[allow(dead_code)]
impl MemoryWarehouse {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Put a row in place without counting it as a write.
    pub fn seed(&self, table: &TableRef, row: Row) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn rows(&self, table: &TableRef) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .get(&table.to_string())
            .cloned()
            .unwrap_or_default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn latest_row(
        &self,
        table: &TableRef,
        key_column: &str,
        key: &str,
        order_column: &str,
    ) -> Result<Option<Row>, SagepipeError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let tables = self.tables.lock().unwrap();
        let latest = tables.get(&table.to_string()).and_then(|rows| {
            rows.iter()
                .filter(|r| r.get(key_column).and_then(|v| v.as_str()) == Some(key))
                .max_by_key(|r| r.get(order_column).and_then(parse_timestamp))
                .cloned()
        });
        Ok(latest)
    }

    async fn insert_rows(
        &self,
        table: &TableRef,
        rows: &[Row],
    ) -> Result<Vec<RowError>, SagepipeError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(Vec::new())
    }
}

/// Settings for a file-backed runtime whose Sage endpoints live at `sage_base`.
#[allow(dead_code)]
pub fn test_settings(sage_base: &str) -> Settings {
    let vars: HashMap<&str, String> = HashMap::from([
        ("GCP_PROJECT_ID", "acme".to_string()),
        ("SAGEPIPE_WAREHOUSE", "file".to_string()),
        ("SAGE_TOKEN_URL", format!("{sage_base}/token")),
        ("SAGE_AUTH_URL", format!("{sage_base}/authorize")),
        ("SAGE_API_BASE", format!("{sage_base}/v3.1")),
        ("SAGE_CLIENT_ID", "client-1".to_string()),
        ("SAGE_CLIENT_SECRET", "s3cret".to_string()),
        ("SAGEPIPE_HTTP_TIMEOUT_SECS", "5".to_string()),
    ]);
    settings_from_lookup(|key| vars.get(key).cloned()).unwrap()
}

/// A stored Sage token row with the given expiry and refresh token.
#[allow(dead_code)]
pub fn token_row(
    access_token: &str,
    refresh_token: Option<&str>,
    obtained_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
) -> Row {
    TokenRecord {
        provider: "sage".into(),
        access_token: access_token.into(),
        refresh_token: refresh_token.map(String::from),
        expires_in: Some((expires_at - obtained_at).num_seconds()),
        expires_at: Some(expires_at),
        scope: Some("full_access".into()),
        obtained_at: Some(obtained_at),
        raw: None,
    }
    .to_row()
}
