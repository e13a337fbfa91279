//! Shared fixtures

use poly_harvest::collector::{Endpoint, Endpoints, MarketFilter};
use poly_harvest::config::{ApiConfig, CollectorConfig};
use poly_harvest::fetch::mock::ScriptedTransport;
use poly_harvest::fetch::{Fetcher, RateLimiter, RawResponse, RetryConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub fn fetcher(transport: Arc<ScriptedTransport>) -> Arc<Fetcher> {
    Arc::new(Fetcher::new(
        transport,
        RateLimiter::shared(Duration::ZERO),
        RetryConfig {
            max_attempts: 3,
            base_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
        },
    ))
}

pub fn endpoints(page_size: u64) -> Endpoints {
    let api = ApiConfig {
        gamma_url: "http://gamma.test".to_string(),
        clob_url: "http://clob.test".to_string(),
        data_url: "http://data.test".to_string(),
        ..ApiConfig::default()
    };
    Endpoints::new(&api, &CollectorConfig { page_size, limit: None })
}

pub fn markets_endpoint(page_size: u64) -> Endpoint {
    endpoints(page_size).markets(&MarketFilter::default())
}

/// Gamma market `i` with two outcome tokens
pub fn gamma_market(i: usize) -> serde_json::Value {
    json!({
        "id": i.to_string(),
        "conditionId": format!("0xm{}", i),
        "question": format!("Question {}?", i),
        "clobTokenIds": format!("[\"t{}y\", \"t{}n\"]", i, i),
        "outcomes": "[\"Yes\", \"No\"]",
        "outcomePrices": "[\"0.6\", \"0.4\"]",
        "volume": "1000"
    })
}

/// Serve `total` markets from `/markets` honouring `limit` and `offset`
pub fn serve_markets(transport: &ScriptedTransport, total: usize) {
    transport.respond_with("/markets", move |req| {
        let offset: usize = req.param("offset").and_then(|o| o.parse().ok()).unwrap_or(0);
        let limit: usize = req.param("limit").and_then(|l| l.parse().ok()).unwrap_or(100);
        let page: Vec<_> = (offset..total.min(offset + limit)).map(gamma_market).collect();
        Ok(RawResponse::new(200, serde_json::Value::Array(page).to_string()))
    });
}
