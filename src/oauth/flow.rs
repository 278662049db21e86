use std::time::Duration;

use crate::config::SageSettings;
use crate::error::SagepipeError;
use crate::oauth::callback::listen_for_callback;
use crate::oauth::store::{TokenRecord, TokenStore};
use crate::oauth::token::exchange_code;
use crate::runtime::SAGE_PROVIDER;

/// Build the consent URL. `auth_url` may already carry query parameters.
pub fn authorization_url(
    sage: &SageSettings,
    client_id: &str,
    state: &str,
) -> Result<String, SagepipeError> {
    let mut url = reqwest::Url::parse(&sage.auth_url).map_err(|e| {
        SagepipeError::ConfigurationError(format!("Invalid SAGE_AUTH_URL '{}': {e}", sage.auth_url))
    })?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", &sage.redirect_uri)
        .append_pair("scope", &sage.scope)
        .append_pair("state", state);
    Ok(url.into())
}

/// Path component of the redirect URI, which the callback listener serves.
fn callback_path(redirect_uri: &str) -> Result<String, SagepipeError> {
    let url = reqwest::Url::parse(redirect_uri).map_err(|e| {
        SagepipeError::ConfigurationError(format!("Invalid SAGE_REDIRECT_URI '{redirect_uri}': {e}"))
    })?;
    Ok(url.path().to_string())
}

/// Run the one-time browser consent for Sage and store the first token.
pub async fn run_authorization_flow(
    sage: &SageSettings,
    client: &reqwest::Client,
    store: &TokenStore,
    timeout: Duration,
) -> Result<TokenRecord, SagepipeError> {
    let credentials = sage.client_credentials()?;
    let state = format!("state-sage-{}", uuid::Uuid::new_v4());
    let auth_url = authorization_url(sage, &credentials.client_id, &state)?;
    let path = callback_path(&sage.redirect_uri)?;

    if webbrowser::open(&auth_url).is_err() {
        tracing::warn!("Could not open browser automatically. Please visit:\n{auth_url}");
    } else {
        eprintln!("If your browser did not open, visit:\n{auth_url}");
    }

    let code = listen_for_callback(sage.callback_port, &path, &state, timeout).await?;
    complete_authorization(sage, client, store, &code).await
}

/// Trade an authorization code for the first token and store it under the
/// provider the refresh path reads.
pub async fn complete_authorization(
    sage: &SageSettings,
    client: &reqwest::Client,
    store: &TokenStore,
    code: &str,
) -> Result<TokenRecord, SagepipeError> {
    let credentials = sage.client_credentials()?;
    let token = exchange_code(
        client,
        &sage.token_url,
        code,
        &sage.redirect_uri,
        &credentials,
    )
    .await?;

    store.insert(SAGE_PROVIDER, &token).await
}
