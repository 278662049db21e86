use std::io::IsTerminal;
use std::time::Duration;

use crate::error::SagepipeError;
use crate::oauth::run_authorization_flow;
use crate::runtime::Runtime;

use super::output::{field_line, success_line};

/// Default time to wait for the browser consent, in milliseconds.
pub const DEFAULT_AUTH_TIMEOUT_MS: u64 = 300_000;

pub async fn run_auth(runtime: &Runtime, timeout_ms: Option<u64>) -> Result<(), SagepipeError> {
    let timeout = Duration::from_millis(timeout_ms.unwrap_or(DEFAULT_AUTH_TIMEOUT_MS));
    let record = run_authorization_flow(
        &runtime.settings().sage,
        runtime.http(),
        &runtime.token_store(),
        timeout,
    )
    .await?;

    let is_tty = std::io::stdout().is_terminal();
    println!("{}", success_line("Sage authorization complete", is_tty));
    let expires = record
        .expires_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "unknown".into());
    println!("{}", field_line("Token expires", &expires, is_tty));
    println!("{}", field_line("Stored in", &runtime.token_store().table().to_string(), is_tty));
    Ok(())
}
