use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::SagepipeError;

use super::types::{SageSettings, Settings, WarehouseBackend};

pub const DEFAULT_PROJECT_ID: &str = "your_gcp_project_id";
pub const DEFAULT_TOKEN_DATASET: &str = "etl_tokens";
pub const DEFAULT_TOKEN_TABLE: &str = "oauth_tokens";
pub const DEFAULT_BIGQUERY_API_BASE: &str = "https://bigquery.googleapis.com/bigquery/v2";
pub const DEFAULT_SAGE_TOKEN_URL: &str = "https://oauth.accounting.sage.com/token";
pub const DEFAULT_SAGE_AUTH_URL: &str = "https://oauth.accounting.sage.com/authorize";
pub const DEFAULT_SAGE_API_BASE: &str = "https://api.accounting.sage.com/v3.1";
pub const DEFAULT_SAGE_SCOPE: &str = "full_access";
pub const DEFAULT_CALLBACK_PORT: u16 = 3000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Load settings from the process environment, reading `.env` first if present.
pub fn load_settings() -> Result<Settings, SagepipeError> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!("Loaded environment from {}", path.display());
    }
    settings_from_lookup(|key| std::env::var(key).ok())
}

/// Build settings from an arbitrary key lookup. Empty values count as unset.
pub fn settings_from_lookup<F>(lookup: F) -> Result<Settings, SagepipeError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

    let project_id = get_or("GCP_PROJECT_ID", DEFAULT_PROJECT_ID);
    let contacts_table = get("SAGE_CONTACTS_TABLE")
        .unwrap_or_else(|| format!("{project_id}.etl_sage.sage_contacts"));

    let warehouse = match get("SAGEPIPE_WAREHOUSE") {
        Some(v) => v.parse()?,
        None => WarehouseBackend::BigQuery,
    };

    let data_dir = get("SAGEPIPE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(default_data_dir);

    let http_timeout_secs: u64 = parse_var(
        "SAGEPIPE_HTTP_TIMEOUT_SECS",
        get("SAGEPIPE_HTTP_TIMEOUT_SECS"),
        DEFAULT_HTTP_TIMEOUT_SECS,
    )?;
    if http_timeout_secs == 0 {
        return Err(SagepipeError::ConfigurationError(
            "SAGEPIPE_HTTP_TIMEOUT_SECS must be at least 1".into(),
        ));
    }
    let http_timeout = Duration::from_secs(http_timeout_secs);

    let callback_port = parse_var(
        "SAGEPIPE_CALLBACK_PORT",
        get("SAGEPIPE_CALLBACK_PORT"),
        DEFAULT_CALLBACK_PORT,
    )?;
    let redirect_uri = get("SAGE_REDIRECT_URI").unwrap_or_else(|| {
        format!("http://localhost:{callback_port}/oauth/callback/sage")
    });

    Ok(Settings {
        project_id,
        token_dataset: get_or("BQ_DATASET", DEFAULT_TOKEN_DATASET),
        token_table: get_or("BQ_TABLE", DEFAULT_TOKEN_TABLE),
        contacts_table,
        warehouse,
        bigquery_api_base: get_or("BQ_API_BASE", DEFAULT_BIGQUERY_API_BASE),
        gcp_access_token: get("GCP_ACCESS_TOKEN"),
        data_dir,
        http_timeout,
        sage: SageSettings {
            token_url: get_or("SAGE_TOKEN_URL", DEFAULT_SAGE_TOKEN_URL),
            auth_url: get_or("SAGE_AUTH_URL", DEFAULT_SAGE_AUTH_URL),
            api_base: get_or("SAGE_API_BASE", DEFAULT_SAGE_API_BASE),
            client_id: get("SAGE_CLIENT_ID"),
            client_secret: get("SAGE_CLIENT_SECRET"),
            scope: get_or("SAGE_SCOPE", DEFAULT_SAGE_SCOPE),
            redirect_uri,
            callback_port,
        },
    })
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sagepipe")
}

fn parse_var<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, SagepipeError> {
    match value {
        Some(v) => v.trim().parse().map_err(|_| {
            SagepipeError::ConfigurationError(format!("{key} has an invalid value '{v}'"))
        }),
        None => Ok(default),
    }
}
