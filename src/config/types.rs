use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::SagepipeError;
use crate::oauth::token::ClientCredentials;
use crate::warehouse::TableRef;

/// Which row store backs the token and contact tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarehouseBackend {
    BigQuery,
    File,
}

impl FromStr for WarehouseBackend {
    type Err = SagepipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bigquery" | "bq" => Ok(WarehouseBackend::BigQuery),
            "file" | "jsonl" => Ok(WarehouseBackend::File),
            other => Err(SagepipeError::ConfigurationError(format!(
                "Unknown warehouse backend '{other}' (expected 'bigquery' or 'file')"
            ))),
        }
    }
}

impl fmt::Display for WarehouseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarehouseBackend::BigQuery => f.write_str("bigquery"),
            WarehouseBackend::File => f.write_str("file"),
        }
    }
}

/// Sage OAuth and API endpoints plus client registration.
#[derive(Clone)]
pub struct SageSettings {
    pub token_url: String,
    pub auth_url: String,
    pub api_base: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: String,
    pub redirect_uri: String,
    pub callback_port: u16,
}

// client_secret must never reach the logs
impl fmt::Debug for SageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SageSettings")
            .field("token_url", &self.token_url)
            .field("auth_url", &self.auth_url)
            .field("api_base", &self.api_base)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("scope", &self.scope)
            .field("redirect_uri", &self.redirect_uri)
            .field("callback_port", &self.callback_port)
            .finish()
    }
}

impl SageSettings {
    /// Client id and secret, required for any call to the token endpoint.
    pub fn client_credentials(&self) -> Result<ClientCredentials, SagepipeError> {
        let client_id = self.client_id.clone().ok_or_else(|| {
            SagepipeError::ConfigurationError("SAGE_CLIENT_ID is not set".into())
        })?;
        let client_secret = self.client_secret.clone().ok_or_else(|| {
            SagepipeError::ConfigurationError("SAGE_CLIENT_SECRET is not set".into())
        })?;
        Ok(ClientCredentials {
            client_id,
            client_secret,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub project_id: String,
    pub token_dataset: String,
    pub token_table: String,
    pub contacts_table: String,
    pub warehouse: WarehouseBackend,
    pub bigquery_api_base: String,
    pub gcp_access_token: Option<String>,
    pub data_dir: PathBuf,
    pub http_timeout: Duration,
    pub sage: SageSettings,
}

impl Settings {
    pub fn token_table_ref(&self) -> TableRef {
        TableRef::new(&self.project_id, &self.token_dataset, &self.token_table)
    }

    pub fn contacts_table_ref(&self) -> Result<TableRef, SagepipeError> {
        self.contacts_table.parse()
    }
}
