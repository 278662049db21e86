use std::sync::Arc;

use serde::Serialize;

use crate::config::{load_settings, Settings, WarehouseBackend};
use crate::error::SagepipeError;
use crate::loader::{extract_items, load, transform};
use crate::oauth::{TokenManager, TokenStore};
use crate::sage::SageClient;
use crate::warehouse::{BigQueryWarehouse, FileWarehouse, TableRef, Warehouse};

/// Provider name under which Sage tokens are stored.
pub const SAGE_PROVIDER: &str = "sage";

/// Number of contacts logged before transforming.
const SAMPLE_SIZE: usize = 2;

/// Result of one `run_pipeline` invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSummary {
    pub table: String,
    pub fetched: usize,
    pub transformed: usize,
    pub inserted: usize,
    pub row_errors: usize,
    pub dry_run: bool,
}

/// Holds the settings plus the shared HTTP client and warehouse, built once
/// and handed to every component that needs them.
#[derive(Debug, Clone)]
pub struct Runtime {
    settings: Settings,
    http: reqwest::Client,
    warehouse: Arc<dyn Warehouse>,
}

impl Runtime {
    /// Load settings from the environment and wire up the configured backend.
    pub fn from_env() -> Result<Self, SagepipeError> {
        let settings = load_settings()?;
        let http = build_http_client(&settings)?;
        let warehouse: Arc<dyn Warehouse> = match settings.warehouse {
            WarehouseBackend::BigQuery => {
                let token = settings.gcp_access_token.as_deref().ok_or_else(|| {
                    SagepipeError::ConfigurationError(
                        "GCP_ACCESS_TOKEN is required for the bigquery warehouse \
                         (or set SAGEPIPE_WAREHOUSE=file)"
                            .into(),
                    )
                })?;
                Arc::new(BigQueryWarehouse::new(
                    http.clone(),
                    &settings.bigquery_api_base,
                    token,
                ))
            }
            WarehouseBackend::File => Arc::new(FileWarehouse::new(&settings.data_dir)),
        };
        tracing::debug!("Using {} warehouse", settings.warehouse);
        Ok(Self {
            settings,
            http,
            warehouse,
        })
    }

    /// Build a runtime around an existing warehouse.
    pub fn with_parts(settings: Settings, warehouse: Arc<dyn Warehouse>) -> Result<Self, SagepipeError> {
        let http = build_http_client(&settings)?;
        Ok(Self {
            settings,
            http,
            warehouse,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn warehouse(&self) -> Arc<dyn Warehouse> {
        Arc::clone(&self.warehouse)
    }

    pub fn token_store(&self) -> TokenStore {
        TokenStore::new(self.warehouse(), self.settings.token_table_ref())
    }

    pub fn token_manager(&self) -> TokenManager {
        TokenManager::new(
            SAGE_PROVIDER,
            self.token_store(),
            self.http.clone(),
            self.settings.sage.clone(),
        )
    }

    pub fn sage_client(&self) -> SageClient {
        SageClient::new(
            self.http.clone(),
            &self.settings.sage.api_base,
            self.token_manager(),
        )
    }

    pub fn contacts_table(&self) -> Result<TableRef, SagepipeError> {
        self.settings.contacts_table_ref()
    }

    /// Fetch Sage contacts, transform them and append them to the contacts
    /// table. With `dry_run` nothing is written.
    pub async fn run_pipeline(
        &self,
        table: Option<&str>,
        dry_run: bool,
    ) -> Result<PipelineSummary, SagepipeError> {
        let table = match table {
            Some(t) => t.parse::<TableRef>()?,
            None => self.contacts_table()?,
        };

        let response = self.sage_client().fetch_contacts().await?;
        let items = extract_items(&response);
        tracing::info!("Fetched {} contacts from Sage", items.len());
        for item in items.iter().take(SAMPLE_SIZE) {
            tracing::info!("Sample contact: {item}");
        }

        let rows = transform(&items);
        let (inserted, row_errors) = if dry_run {
            tracing::info!("Dry run: skipping load of {} rows into {table}", rows.len());
            (0, 0)
        } else {
            let report = load(self.warehouse.as_ref(), &rows, &table).await?;
            (report.inserted(), report.errors.len())
        };

        Ok(PipelineSummary {
            table: table.to_string(),
            fetched: items.len(),
            transformed: rows.len(),
            inserted,
            row_errors,
            dry_run,
        })
    }
}

fn build_http_client(settings: &Settings) -> Result<reqwest::Client, SagepipeError> {
    reqwest::Client::builder()
        .timeout(settings.http_timeout)
        .build()
        .map_err(|e| SagepipeError::ConfigurationError(format!("Failed to build HTTP client: {e}")))
}
