//! HTTP retry with exponential backoff, shared by embedding and generation
//! providers.
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - Other non-success statuses → fail immediately
//! - Transport errors (connect, timeout) → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5 × base)
//!
//! Two flavours exist because embedding runs on blocking threads (it is
//! called from the synchronous vector store) while generation is async.

use anyhow::{anyhow, bail, Result};
use reqwest::StatusCode;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each subsequent one.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    /// Delay before `attempt` (1-based retry number).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt.saturating_sub(1)).min(5))
    }
}

pub fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Send a request built by `make_request` until it succeeds, fails with a
/// non-retryable status, or the retries run out. Returns the parsed JSON body.
///
/// `service` names the API in error messages, e.g. `"Gemini"`.
pub fn send_json_blocking<F>(
    policy: &RetryPolicy,
    service: &str,
    make_request: F,
) -> Result<serde_json::Value>
where
    F: Fn() -> reqwest::blocking::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            tracing::debug!(service, attempt, ?delay, "retrying request");
            std::thread::sleep(delay);
        }

        match make_request().send() {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response.json()?);
                }

                let body_text = response.text().unwrap_or_default();
                let err = anyhow!("{} API error {}: {}", service, status, body_text);
                if is_retryable(status) {
                    tracing::warn!(service, %status, "retryable API error");
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }
            Err(e) => {
                // The URL can carry credentials.
                let e = e.without_url();
                tracing::warn!(service, error = %e, "request failed");
                last_err = Some(anyhow!("{} connection error: {}", service, e));
            }
        }
    }

    match last_err {
        Some(err) => Err(err),
        None => bail!("{} request failed after retries", service),
    }
}

/// Async counterpart of [`send_json_blocking`].
pub async fn send_json<F>(
    policy: &RetryPolicy,
    service: &str,
    make_request: F,
) -> Result<serde_json::Value>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            tracing::debug!(service, attempt, ?delay, "retrying request");
            tokio::time::sleep(delay).await;
        }

        match make_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response.json().await?);
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = anyhow!("{} API error {}: {}", service, status, body_text);
                if is_retryable(status) {
                    tracing::warn!(service, %status, "retryable API error");
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }
            Err(e) => {
                // The URL can carry credentials.
                let e = e.without_url();
                tracing::warn!(service, error = %e, "request failed");
                last_err = Some(anyhow!("{} connection error: {}", service, e));
            }
        }
    }

    match last_err {
        Some(err) => Err(err),
        None => bail!("{} request failed after retries", service),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10);
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(2), Duration::from_secs(2));
        assert_eq!(policy.delay(4), Duration::from_secs(8));
        assert_eq!(policy.delay(6), Duration::from_secs(32));
        assert_eq!(policy.delay(9), Duration::from_secs(32));
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable(StatusCode::BAD_GATEWAY));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
        assert!(!is_retryable(StatusCode::UNAUTHORIZED));
    }
}
