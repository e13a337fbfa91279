//! Shared wiring for subcommands

use crate::config::Config;
use crate::fetch::{Fetcher, HttpConfig, HttpTransport, RateLimiter, RetryConfig};
use crate::schedule::CancelToken;
use std::sync::Arc;
use std::time::Duration;

/// The process-wide fetcher: one transport, one rate limiter
pub fn build_fetcher(config: &Config) -> anyhow::Result<Arc<Fetcher>> {
    let defaults = HttpConfig::default();
    let http = HttpConfig {
        timeout: Duration::from_secs(config.api.timeout_secs),
        user_agent: config.api.user_agent.clone().unwrap_or(defaults.user_agent),
        api_key: config.api.api_key.clone(),
    };
    let transport = HttpTransport::new(http)?;

    let retry = RetryConfig {
        max_attempts: config.retry.max_attempts.max(1),
        base_backoff: Duration::from_millis(config.retry.base_backoff_ms),
        max_backoff: Duration::from_millis(config.retry.max_backoff_ms),
    };

    Ok(Arc::new(Fetcher::new(
        Arc::new(transport),
        RateLimiter::shared(config.rate_limit.min_interval()),
        retry,
    )))
}

/// Token that fires on the first Ctrl-C
pub fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, stopping after the current page");
            trigger.cancel();
        }
    });
    cancel
}
