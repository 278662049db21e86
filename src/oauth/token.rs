use serde::{Deserialize, Serialize};

use crate::error::SagepipeError;

/// OAuth client registration sent with every token-endpoint call.
#[derive(Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// Token endpoint response. Unknown fields are kept so the full response can
/// be stored verbatim alongside the parsed columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, alias = "expires", skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Exchange a refresh token for a new access token.
pub async fn refresh_access_token(
    client: &reqwest::Client,
    token_endpoint: &str,
    refresh_tok: &str,
    credentials: &ClientCredentials,
) -> Result<TokenResponse, SagepipeError> {
    post_token_form(
        client,
        token_endpoint,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_tok),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ],
        "Token refresh",
    )
    .await
}

/// Exchange an authorization code from the consent redirect for tokens.
pub async fn exchange_code(
    client: &reqwest::Client,
    token_endpoint: &str,
    code: &str,
    redirect_uri: &str,
    credentials: &ClientCredentials,
) -> Result<TokenResponse, SagepipeError> {
    post_token_form(
        client,
        token_endpoint,
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
        ],
        "Token exchange",
    )
    .await
}

async fn post_token_form(
    client: &reqwest::Client,
    token_endpoint: &str,
    form: &[(&str, &str)],
    what: &str,
) -> Result<TokenResponse, SagepipeError> {
    let resp = client
        .post(token_endpoint)
        .header(reqwest::header::ACCEPT, "application/json")
        .form(form)
        .send()
        .await
        .map_err(|e| SagepipeError::transport(token_endpoint, e))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(SagepipeError::AuthError(format!(
            "{what} failed with status {status}: {body}"
        )));
    }

    resp.json().await.map_err(|e| {
        SagepipeError::ProtocolError(format!("Failed to parse {} response: {e}", what.to_lowercase()))
    })
}
