pub mod cli;
pub mod config;
pub mod error;
pub mod loader;
pub mod oauth;
pub mod runtime;
pub mod sage;
pub mod warehouse;

pub use config::{load_settings, SageSettings, Settings, WarehouseBackend};
pub use error::SagepipeError;
pub use loader::{extract_items, load, transform, ContactRow, LoadReport};
pub use oauth::{TokenManager, TokenRecord, TokenResponse, TokenState, TokenStore};
pub use runtime::{PipelineSummary, Runtime, SAGE_PROVIDER};
pub use sage::SageClient;
pub use warehouse::{BigQueryWarehouse, FileWarehouse, Row, RowError, TableRef, Warehouse};

/// One-shot convenience function: build a runtime from the environment and
/// return a valid Sage access token, refreshing it if needed.
pub async fn sage_access_token() -> Result<String, SagepipeError> {
    Runtime::from_env()?
        .token_manager()
        .get_valid_access_token()
        .await
}
