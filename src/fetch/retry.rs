//! Retrying fetcher
//!
//! One logical fetch = rate-limit, send, classify, and possibly back off and
//! try again. 2xx returns, 429/5xx/timeouts retry, any other 4xx is final.

use super::rate_limiter::RateLimiter;
use super::transport::Transport;
use super::types::{classify_status, ErrorClass, FetchError, Request, Response};
use crate::telemetry;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Retry policy
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts per logical fetch, including the first
    pub max_attempts: u32,
    /// Base backoff; also the upper bound of the random jitter
    pub base_backoff: Duration,
    /// Cap on the exponential part of the backoff
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Deterministic part of the wait after failed attempt `attempt` (0-based):
    /// `base * 2^attempt`, capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// Backoff plus uniform jitter in `[0, base)`
    pub fn backoff_with_jitter(&self, attempt: u32) -> Duration {
        let base_ms = self.base_backoff.as_millis() as u64;
        let jitter = if base_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..base_ms))
        };
        self.backoff(attempt) + jitter
    }
}

/// Rate-limited, retrying request executor shared by collectors and the monitor
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    limiter: Arc<RateLimiter>,
    retry: RetryConfig,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, limiter: Arc<RateLimiter>, retry: RetryConfig) -> Self {
        Self {
            transport,
            limiter,
            retry,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Fetch and parse one logical request
    pub async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let url = request.url();
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let waited = self.limiter.acquire().await;

            tracing::debug!(
                url = %url,
                attempt,
                max_attempts,
                rate_wait_ms = waited.as_millis() as u64,
                "Issuing request"
            );

            match self.transport.get(request).await {
                Ok(raw) => match classify_status(raw.status) {
                    None => {
                        telemetry::record_fetch_attempt("success");
                        let body = parse_body(&raw.body)?;
                        return Ok(Response {
                            status: raw.status,
                            body,
                            attempts: attempt,
                        });
                    }
                    Some(ErrorClass::Fatal) => {
                        telemetry::record_fetch_attempt("fatal");
                        tracing::warn!(url = %url, attempt, status = raw.status, "Request rejected");
                        return Err(FetchError::Rejected {
                            status: raw.status,
                            body: truncate(&raw.body, 200),
                        });
                    }
                    Some(ErrorClass::Retryable) => {
                        last_error = format!("status {}", raw.status);
                    }
                },
                Err(e) if e.is_retryable() => {
                    last_error = e.to_string();
                }
                Err(e) => {
                    telemetry::record_fetch_attempt("fatal");
                    tracing::warn!(url = %url, attempt, error = %e, "Request could not be sent");
                    return Err(FetchError::Transport(e.to_string()));
                }
            }
            telemetry::record_fetch_attempt("retryable");

            if attempt == max_attempts {
                tracing::warn!(
                    url = %url,
                    attempt,
                    error = %last_error,
                    "Retries exhausted"
                );
                break;
            }

            let wait = self.retry.backoff_with_jitter(attempt - 1);
            telemetry::record_retry();
            tracing::warn!(
                url = %url,
                attempt,
                max_attempts,
                error = %last_error,
                wait_ms = wait.as_millis() as u64,
                "Retryable failure, backing off"
            );
            tokio::time::sleep(wait).await;
        }

        Err(FetchError::Exhausted {
            attempts: max_attempts,
            last_error,
        })
    }
}

fn parse_body(body: &str) -> Result<serde_json::Value, FetchError> {
    if body.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(body).map_err(|e| FetchError::Malformed(format!("{}: {}", e, truncate(body, 100))))
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::ScriptedTransport;
    use crate::fetch::types::{RawResponse, TransportError};
    use serde_json::json;

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
        }
    }

    fn fetcher(transport: Arc<ScriptedTransport>, retry: RetryConfig) -> Fetcher {
        Fetcher::new(transport, RateLimiter::shared(Duration::from_millis(1)), retry)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let retry = RetryConfig {
            max_attempts: 5,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };
        assert_eq!(retry.backoff(0), Duration::from_millis(100));
        assert_eq!(retry.backoff(1), Duration::from_millis(200));
        assert_eq!(retry.backoff(2), Duration::from_millis(400));
        assert_eq!(retry.backoff(3), Duration::from_millis(500));
        assert_eq!(retry.backoff(40), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_stays_below_base() {
        let retry = RetryConfig {
            max_attempts: 3,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
        };
        for _ in 0..100 {
            let wait = retry.backoff_with_jitter(1);
            assert!(wait >= Duration::from_millis(200));
            assert!(wait < Duration::from_millis(300));
        }
    }

    #[test]
    fn test_zero_base_has_no_jitter() {
        let retry = RetryConfig {
            max_attempts: 3,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        };
        assert_eq!(retry.backoff_with_jitter(2), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json("/ok", 200, json!({"value": 1}));

        let response = fetcher(transport.clone(), fast_retry(3))
            .fetch(&Request::new("http://x", "/ok"))
            .await
            .unwrap();

        assert_eq!(response.body["value"], 1);
        assert_eq!(response.attempts, 1);
        assert_eq!(transport.call_count("/ok"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_500_is_exhausted_after_max_attempts() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_with("/flaky", |_| Ok(RawResponse::new(500, "boom")));

        let err = fetcher(transport.clone(), fast_retry(3))
            .fetch(&Request::new("http://x", "/flaky"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }));
        assert_eq!(transport.call_count("/flaky"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_404_is_fatal_without_retry() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_with("/missing", |_| Ok(RawResponse::new(404, "nope")));

        let err = fetcher(transport.clone(), fast_retry(3))
            .fetch(&Request::new("http://x", "/missing"))
            .await
            .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(err.status(), Some(404));
        assert_eq!(transport.call_count("/missing"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_429_then_success() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .push_json("/limited", 429, json!({}))
            .push("/limited", Err(TransportError::Timeout))
            .push_json("/limited", 200, json!([1, 2, 3]));

        let response = fetcher(transport.clone(), fast_retry(3))
            .fetch(&Request::new("http://x", "/limited"))
            .await
            .unwrap();

        assert_eq!(response.attempts, 3);
        assert_eq!(response.body.as_array().map(|a| a.len()), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_body_is_fatal() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push("/html", Ok(RawResponse::new(200, "<html>oops</html>")));

        let err = fetcher(transport.clone(), fast_retry(3))
            .fetch(&Request::new("http://x", "/html"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Malformed(_)));
        assert_eq!(transport.call_count("/html"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_transport_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push("/bad", Err(TransportError::Other("invalid url".into())));

        let err = fetcher(transport.clone(), fast_retry(3))
            .fetch(&Request::new("http://x", "/bad"))
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Transport(_)));
        assert_eq!(transport.call_count("/bad"), 1);
    }
}
