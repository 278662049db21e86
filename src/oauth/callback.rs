use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::SagepipeError;

/// What the provider sent back on the redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CallbackOutcome {
    Code { code: String, state: Option<String> },
    Denied { error: String, description: Option<String> },
    MissingCode,
}

/// Wait for the OAuth redirect on `127.0.0.1:{port}{callback_path}` and
/// return the authorization code. Requests for other paths (a browser's
/// favicon probe, say) get a 404 and the listener keeps waiting.
pub async fn listen_for_callback(
    port: u16,
    callback_path: &str,
    expected_state: &str,
    timeout: Duration,
) -> Result<String, SagepipeError> {
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    tracing::debug!("Listening for OAuth callback on 127.0.0.1:{port}{callback_path}");

    let accept_loop = async {
        loop {
            let (mut stream, _) = listener.accept().await?;
            let mut buf = vec![0u8; 8192];
            // connections that close without sending anything are ignored
            let n = match stream.read(&mut buf).await {
                Ok(0) | Err(_) => continue,
                Ok(n) => n,
            };
            let request = String::from_utf8_lossy(&buf[..n]);

            let Some(target) = request_target(&request) else {
                let _ = respond(&mut stream, "400 Bad Request", "Malformed request").await;
                continue;
            };
            if target_path(&target) != callback_path {
                let _ = respond(&mut stream, "404 Not Found", "Not found").await;
                continue;
            }

            let result = match parse_callback(&target) {
                CallbackOutcome::Code { code, state } => {
                    if state.as_deref() == Some(expected_state) {
                        Ok(code)
                    } else {
                        Err(SagepipeError::AuthError(
                            "OAuth callback state does not match the request".into(),
                        ))
                    }
                }
                CallbackOutcome::Denied { error, description } => Err(SagepipeError::AuthError(
                    format!("Error from sage: {}", description.unwrap_or(error)),
                )),
                CallbackOutcome::MissingCode => Err(SagepipeError::AuthError(
                    "Missing ?code in OAuth callback".into(),
                )),
            };

            let page = match &result {
                Ok(_) => "<h1>Sage connected</h1><p>You can close this tab and return to the terminal.</p>",
                Err(_) => "<h1>Sage authorization failed</h1><p>See the terminal for details.</p>",
            };
            let status = if result.is_ok() { "200 OK" } else { "400 Bad Request" };
            respond(&mut stream, status, page).await?;
            return result;
        }
    };

    tokio::time::timeout(timeout, accept_loop)
        .await
        .map_err(|_| {
            SagepipeError::AuthError(format!(
                "Timed out waiting for OAuth callback after {}s",
                timeout.as_secs()
            ))
        })?
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) -> Result<(), SagepipeError> {
    let html = format!(
        "<!DOCTYPE html><html><body style=\"font-family: system-ui, sans-serif;\">{body}</body></html>"
    );
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{html}",
        html.len()
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;
    Ok(())
}

/// Extract the target from "GET /path?query HTTP/1.1".
fn request_target(request: &str) -> Option<String> {
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let _method = parts.next()?;
    parts.next().map(String::from)
}

fn target_path(target: &str) -> &str {
    target.split('?').next().unwrap_or(target)
}

fn parse_callback(target: &str) -> CallbackOutcome {
    let Ok(url) = reqwest::Url::parse(&format!("http://localhost{target}")) else {
        return CallbackOutcome::MissingCode;
    };

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    match (error, code) {
        (Some(error), _) => CallbackOutcome::Denied { error, description },
        (None, Some(code)) => CallbackOutcome::Code { code, state },
        (None, None) => CallbackOutcome::MissingCode,
    }
}
