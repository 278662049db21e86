use chrono::{DateTime, Utc};

use crate::config::SageSettings;
use crate::error::SagepipeError;
use crate::oauth::store::{TokenRecord, TokenStore};
use crate::oauth::token::refresh_access_token;

/// Tokens are refreshed this many seconds before they actually expire.
pub const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    NoToken,
    Valid,
    ExpiredRefreshable,
    ExpiredUnrefreshable,
}

impl TokenState {
    pub fn classify(record: Option<&TokenRecord>, now: DateTime<Utc>) -> Self {
        match record {
            None => TokenState::NoToken,
            Some(r) if is_token_valid(r.expires_at, now) => TokenState::Valid,
            Some(r) if r.refresh_token.is_some() => TokenState::ExpiredRefreshable,
            Some(_) => TokenState::ExpiredUnrefreshable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenState::NoToken => "no_token",
            TokenState::Valid => "valid",
            TokenState::ExpiredRefreshable => "expired_refreshable",
            TokenState::ExpiredUnrefreshable => "expired_unrefreshable",
        }
    }
}

impl std::fmt::Display for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token without a known expiry is never considered valid.
pub fn is_token_valid(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match expires_at {
        Some(expires) => expires - chrono::Duration::seconds(REFRESH_MARGIN_SECS) > now,
        None => false,
    }
}

/// Hands out a usable access token for one provider, refreshing and
/// persisting a new one when the stored token is (nearly) expired.
#[derive(Debug, Clone)]
pub struct TokenManager {
    provider: String,
    store: TokenStore,
    client: reqwest::Client,
    sage: SageSettings,
}

impl TokenManager {
    pub fn new(provider: &str, store: TokenStore, client: reqwest::Client, sage: SageSettings) -> Self {
        Self {
            provider: provider.to_string(),
            store,
            client,
            sage,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Current state and latest record, without refreshing anything.
    pub async fn inspect(&self) -> Result<(TokenState, Option<TokenRecord>), SagepipeError> {
        let record = self.store.get_latest(&self.provider).await?;
        let state = TokenState::classify(record.as_ref(), Utc::now());
        Ok((state, record))
    }

    pub async fn get_valid_access_token(&self) -> Result<String, SagepipeError> {
        let (state, record) = self.inspect().await?;
        let record = match (state, record) {
            (TokenState::NoToken, _) | (_, None) => {
                return Err(SagepipeError::ConfigurationError(format!(
                    "No {} token found in {}. Complete the OAuth grant once with `sagepipe auth`.",
                    self.provider,
                    self.store.table()
                )));
            }
            (TokenState::Valid, Some(record)) => return Ok(record.access_token),
            (TokenState::ExpiredUnrefreshable, Some(_)) => {
                return Err(SagepipeError::AuthError(format!(
                    "No refresh_token available to refresh the {} access token",
                    self.provider
                )));
            }
            (TokenState::ExpiredRefreshable, Some(record)) => record,
        };

        let previous_refresh = record.refresh_token.unwrap_or_default();
        tracing::info!(
            "{} access token expired at {:?}, refreshing",
            self.provider,
            record.expires_at
        );

        let credentials = self.sage.client_credentials()?;
        let mut new_token = refresh_access_token(
            &self.client,
            &self.sage.token_url,
            &previous_refresh,
            &credentials,
        )
        .await?;

        // providers do not rotate the refresh token on every exchange
        if new_token.refresh_token.is_none() {
            new_token.refresh_token = Some(previous_refresh);
        }

        self.store.insert(&self.provider, &new_token).await?;
        Ok(new_token.access_token)
    }
}
