use std::io::IsTerminal;

use serde::Serialize;

use crate::error::SagepipeError;
use crate::oauth::{TokenRecord, TokenState};
use crate::runtime::Runtime;

use super::output::{field_line, print_json, OutputMode};

const REDACTED: &str = "REDACTED";

/// What `status` reports about the latest stored token. Secrets never leave
/// this struct in clear text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenStatus {
    pub provider: String,
    pub table: String,
    pub state: String,
    pub access_token: &'static str,
    pub has_refresh_token: bool,
    pub expires_in: Option<i64>,
    pub expires_at: Option<String>,
    pub scope: Option<String>,
    pub obtained_at: Option<String>,
}

impl TokenStatus {
    pub fn from_record(record: &TokenRecord, table: &str, state: TokenState) -> Self {
        Self {
            provider: record.provider.clone(),
            table: table.to_string(),
            state: state.to_string(),
            access_token: REDACTED,
            has_refresh_token: record.refresh_token.is_some(),
            expires_in: record.expires_in,
            expires_at: record.expires_at.map(|t| t.to_rfc3339()),
            scope: record.scope.clone(),
            obtained_at: record.obtained_at.map(|t| t.to_rfc3339()),
        }
    }
}

pub async fn token_status(runtime: &Runtime) -> Result<TokenStatus, SagepipeError> {
    let manager = runtime.token_manager();
    let table = runtime.token_store().table().to_string();
    let (state, record) = manager.inspect().await?;
    let record = record.ok_or_else(|| {
        SagepipeError::ConfigurationError(format!(
            "No {} token found in {table}. Run `sagepipe auth` first.",
            manager.provider()
        ))
    })?;
    Ok(TokenStatus::from_record(&record, &table, state))
}

pub async fn run_status(runtime: &Runtime, mode: OutputMode) -> Result<(), SagepipeError> {
    let status = token_status(runtime).await?;
    match mode {
        OutputMode::Json => print_json(&status),
        OutputMode::Pretty => {
            let is_tty = std::io::stdout().is_terminal();
            let or_unknown = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".into());
            println!("{}", field_line("provider", &status.provider, is_tty));
            println!("{}", field_line("table", &status.table, is_tty));
            println!("{}", field_line("state", &status.state, is_tty));
            println!("{}", field_line("access_token", status.access_token, is_tty));
            println!(
                "{}",
                field_line("refresh_token", &status.has_refresh_token.to_string(), is_tty)
            );
            println!(
                "{}",
                field_line(
                    "expires_in",
                    &status.expires_in.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
                    is_tty
                )
            );
            println!("{}", field_line("expires_at", &or_unknown(&status.expires_at), is_tty));
            println!("{}", field_line("scope", &or_unknown(&status.scope), is_tty));
            println!("{}", field_line("obtained_at", &or_unknown(&status.obtained_at), is_tty));
        }
    }
    Ok(())
}
