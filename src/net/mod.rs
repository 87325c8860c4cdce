//! Shared HTTP plumbing: client construction and retrying GET.
//!
//! One `reqwest::Client` is built per run and injected into the repository
//! clients and the download orchestrator. Redirects (301/302/303/307/308) are
//! followed transparently up to 10 hops by the client's redirect policy.
//!
//! [`get_retrying`] implements the retry discipline for transient failures:
//! exponential backoff with a capped delay, a fixed attempt ceiling, retries
//! on timeouts, connection errors, 5xx and 429 (honoring `Retry-After`), and
//! immediate failure on any other 4xx. Cancellation is checked before every
//! attempt and every backoff sleep.

use crate::config::Settings;
use crate::core::{AppkeeperError, CancelFlag};
use anyhow::Result;
use reqwest::StatusCode;
use std::time::Duration;

/// Backoff starts here and doubles per attempt.
const STARTING_BACKOFF_DELAY_MS: u64 = 500;
/// Backoff is capped at this delay.
const MAX_BACKOFF_DELAY_MS: u64 = 10_000;
/// Redirect hop ceiling.
const MAX_REDIRECTS: usize = 10;

/// Build the shared HTTP client from global settings.
pub fn build_client(settings: &Settings) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("appkeeper/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()?;
    Ok(client)
}

/// Whether a failed attempt may be retried.
enum Attempt {
    Transient(String),
    Permanent(String),
    /// HTTP 429; the server's `Retry-After` (seconds) replaces the backoff
    /// delay for the next attempt.
    RateLimited { retry_after: Option<u64> },
}

/// GET `url`, retrying transient failures with exponential backoff.
///
/// Returns the successful response, or [`AppkeeperError::NetworkTransient`] /
/// [`AppkeeperError::NetworkPermanent`] describing the terminal failure.
pub async fn get_retrying(
    client: &reqwest::Client,
    url: &str,
    bearer_token: Option<&str>,
    max_retries: u32,
    cancel: &CancelFlag,
) -> Result<reqwest::Response, AppkeeperError> {
    let mut last_failure = String::new();
    let attempts = max_retries.max(1);

    for attempt in 0..attempts {
        cancel.check()?;

        let mut request = client.get(url);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }

        let outcome = match request.send().await {
            Ok(response) => classify_response(response),
            Err(e) if e.is_timeout() || e.is_connect() || e.is_redirect() => {
                Err(Attempt::Transient(e.to_string()))
            }
            Err(e) => Err(Attempt::Permanent(e.to_string())),
        };

        match outcome {
            Ok(response) => return Ok(response),
            Err(Attempt::Permanent(reason)) => {
                return Err(AppkeeperError::NetworkPermanent {
                    url: url.to_string(),
                    reason,
                });
            }
            Err(Attempt::Transient(reason)) => {
                tracing::debug!("attempt {}/{} for {url} failed: {reason}", attempt + 1, attempts);
                last_failure = reason;
                if attempt + 1 < attempts {
                    cancel.check()?;
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
            Err(Attempt::RateLimited { retry_after }) => {
                tracing::debug!(
                    "attempt {}/{} for {url} rate limited (retry-after {retry_after:?}s)",
                    attempt + 1,
                    attempts
                );
                last_failure = "HTTP 429 Too Many Requests".to_string();
                if attempt + 1 < attempts {
                    cancel.check()?;
                    match retry_after {
                        Some(secs) => {
                            tokio::time::sleep(Duration::from_secs(secs.min(60))).await;
                        }
                        None => tokio::time::sleep(backoff_delay(attempt)).await,
                    }
                }
            }
        }
    }

    Err(AppkeeperError::NetworkTransient {
        url: url.to_string(),
        attempts,
        reason: last_failure,
    })
}

/// Sort a response into success, retryable, or terminal. A 429 carries the
/// parsed `Retry-After`; the retry loop owns the sleep so cancellation is
/// checked first.
fn classify_response(response: reqwest::Response) -> Result<reqwest::Response, Attempt> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status.is_server_error() {
        return Err(Attempt::Transient(format!("HTTP {status}")));
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        return Err(Attempt::RateLimited { retry_after });
    }
    Err(Attempt::Permanent(format!("HTTP {status}")))
}

/// Exponential backoff delay for a 0-based attempt number, capped.
fn backoff_delay(attempt: u32) -> Duration {
    let delay = STARTING_BACKOFF_DELAY_MS
        .saturating_mul(1 << attempt.min(16))
        .min(MAX_BACKOFF_DELAY_MS);
    Duration::from_millis(delay)
}
