//! Retrying fetcher and shared rate limiter

use poly_harvest::fetch::mock::ScriptedTransport;
use poly_harvest::fetch::{
    FetchError, Fetcher, RateLimiter, RawResponse, Request, RetryConfig, TransportError,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        base_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
    }
}

async fn fetch_three(fetcher: &Fetcher, request: &Request) {
    for _ in 0..3 {
        fetcher.fetch(request).await.unwrap();
    }
}

#[test]
fn test_two_503_then_ok_takes_three_attempts() {
    let transport = Arc::new(ScriptedTransport::new());
    transport
        .push_json("/markets", 503, json!({}))
        .push("/markets", Err(TransportError::Timeout))
        .push_json("/markets", 200, json!([{"id": "1"}]));
    let fetcher = Fetcher::new(transport.clone(), RateLimiter::shared(Duration::ZERO), retry(3));

    let response = tokio_test::block_on(fetcher.fetch(&Request::new("http://gamma.test", "/markets")))
        .unwrap();
    assert_eq!(response.attempts, 3);
    assert_eq!(response.body, json!([{"id": "1"}]));
    assert_eq!(transport.call_count("/markets"), 3);
}

#[test]
fn test_rejected_request_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.push("/orders", Ok(RawResponse::new(401, "unauthorized")));
    let fetcher = Fetcher::new(transport.clone(), RateLimiter::shared(Duration::ZERO), retry(5));

    let err = tokio_test::block_on(fetcher.fetch(&Request::new("http://clob.test", "/orders")))
        .unwrap_err();
    assert!(matches!(err, FetchError::Rejected { status: 401, .. }));
    assert!(err.is_fatal());
    assert_eq!(transport.call_count("/orders"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fetchers_sharing_a_limiter_are_spaced() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond_with("/midpoint", |_| Ok(RawResponse::new(200, r#"{"mid": "0.5"}"#)));
    let limiter = RateLimiter::shared(Duration::from_secs(1));
    let a = Fetcher::new(transport.clone(), limiter.clone(), retry(1));
    let b = Fetcher::new(transport.clone(), limiter, retry(1));
    let request = Request::new("http://clob.test", "/midpoint");

    let start = Instant::now();
    tokio::join!(fetch_three(&a, &request), fetch_three(&b, &request));

    // Six grants, one second apart, the first immediate
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(5), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(6), "elapsed {:?}", elapsed);
    assert_eq!(transport.call_count("/midpoint"), 6);
}
