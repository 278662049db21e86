use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};

use crate::error::SagepipeError;
use crate::oauth::TokenManager;

/// Sage Accounting REST client. Every call asks the token manager for a
/// usable access token first.
#[derive(Debug, Clone)]
pub struct SageClient {
    client: reqwest::Client,
    api_base: String,
    tokens: TokenManager,
}

impl SageClient {
    pub fn new(client: reqwest::Client, api_base: &str, tokens: TokenManager) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    pub fn resource_url(&self, resource_path: &str) -> String {
        format!("{}/{}", self.api_base, resource_path.trim_start_matches('/'))
    }

    /// Bearer authorization plus JSON accept header, with a valid token.
    pub async fn get_valid_headers(&self) -> Result<HeaderMap, SagepipeError> {
        let token = self.tokens.get_valid_access_token().await?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
            SagepipeError::AuthError(format!("Access token is not a valid header value: {e}"))
        })?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// GET `{api_base}/{resource_path}` and return the decoded JSON body.
    pub async fn fetch(&self, resource_path: &str) -> Result<serde_json::Value, SagepipeError> {
        let headers = self.get_valid_headers().await?;
        let url = self.resource_url(resource_path);
        tracing::debug!("GET {url}");

        let resp = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| SagepipeError::transport(&url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SagepipeError::NetworkError {
                url,
                status: Some(status.as_u16()),
                detail: body,
            });
        }

        resp.json().await.map_err(|e| {
            SagepipeError::ProtocolError(format!("Failed to parse response from {url}: {e}"))
        })
    }

    pub async fn fetch_contacts(&self) -> Result<serde_json::Value, SagepipeError> {
        self.fetch("contacts").await
    }
}
