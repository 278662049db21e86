#[derive(Debug, thiserror::Error)]
pub enum SagepipeError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("{}", format_network(.url, .status, .detail))]
    NetworkError {
        url: String,
        status: Option<u16>,
        detail: String,
    },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

fn format_network(url: &str, status: &Option<u16>, detail: &str) -> String {
    match status {
        Some(code) => format!("Request to {url} failed with HTTP {code}: {detail}"),
        None => format!("Request to {url} failed: {detail}"),
    }
}

impl SagepipeError {
    /// Build a `NetworkError` for a transport-level failure (no HTTP status).
    pub(crate) fn transport(url: &str, err: reqwest::Error) -> Self {
        SagepipeError::NetworkError {
            url: url.to_string(),
            status: err.status().map(|s| s.as_u16()),
            detail: err.to_string(),
        }
    }

    /// Error code string for structured JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            SagepipeError::ConfigurationError(_) => "configuration_error",
            SagepipeError::AuthError(_) => "auth_error",
            SagepipeError::NetworkError { .. } => "network_error",
            SagepipeError::StorageError(_) => "storage_error",
            SagepipeError::ProtocolError(_) => "parse_error",
            SagepipeError::IoError(_) => "io_error",
        }
    }

    /// HTTP status carried by a `NetworkError`, if the server answered at all.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            SagepipeError::NetworkError { status, .. } => *status,
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        if let SagepipeError::NetworkError { url, .. } = self {
            obj.insert("url".into(), serde_json::Value::String(url.clone()));
        }
        if let Some(status) = self.http_status() {
            obj.insert("status".into(), serde_json::Value::from(status));
        }
        obj.insert("message".into(), serde_json::Value::String(self.to_string()));
        obj.insert("code".into(), serde_json::Value::String(self.code().to_string()));
        serde_json::json!({ "error": obj })
    }
}
