//! Endpoint catalog for the venue's list APIs
//!
//! Each constructor pairs an [`EndpointDescriptor`] with the mapper that
//! understands its items.

use super::descriptor::{Api, CursorStrategy, EndpointDescriptor};
use crate::config::{ApiConfig, CollectorConfig};
use crate::record::{
    EventMapper, GammaMarketMapper, OrderMapper, PositionMapper, PriceHistoryMapper, RecordMapper,
    TradeMapper,
};
use std::sync::Arc;

/// Default price-history window per request (one day)
pub const DEFAULT_WINDOW_SECS: i64 = 86_400;

/// Descriptor plus mapper for one collectable stream
#[derive(Clone)]
pub struct Endpoint {
    pub descriptor: EndpointDescriptor,
    pub mapper: Arc<dyn RecordMapper>,
}

impl Endpoint {
    fn new(descriptor: EndpointDescriptor, mapper: impl RecordMapper + 'static) -> Self {
        Self {
            descriptor,
            mapper: Arc::new(mapper),
        }
    }

    pub fn stream_id(&self) -> String {
        self.descriptor.stream_id()
    }
}

/// Market/event filters shared by the Gamma endpoints
#[derive(Debug, Clone, Default)]
pub struct MarketFilter {
    pub active: Option<bool>,
    pub closed: Option<bool>,
    pub tag: Option<String>,
}

/// Order/trade filters
#[derive(Debug, Clone, Default)]
pub struct TradeFilter {
    pub market: Option<String>,
    pub maker: Option<String>,
    pub taker: Option<String>,
    /// Orders only
    pub status: Option<String>,
}

/// Range of a price-history request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceRange {
    /// Named interval (`1d`, `1w`, `max`, ...) fetched in one request
    Interval(String),
    /// Explicit unix-second range, paged in windows of `step_secs`
    Window { start: i64, end: i64, step_secs: i64 },
}

/// Builds endpoints against configured base URLs
#[derive(Debug, Clone)]
pub struct Endpoints {
    gamma_url: String,
    clob_url: String,
    data_url: String,
    page_size: u64,
}

impl Endpoints {
    pub fn new(api: &ApiConfig, collector: &CollectorConfig) -> Self {
        Self {
            gamma_url: api.gamma_url.clone(),
            clob_url: api.clob_url.clone(),
            data_url: api.data_url.clone(),
            page_size: collector.page_size.max(1),
        }
    }

    fn offset(&self) -> CursorStrategy {
        CursorStrategy::Offset {
            page_size: self.page_size,
        }
    }

    /// Gamma `/markets`
    pub fn markets(&self, filter: &MarketFilter) -> Endpoint {
        let desc = EndpointDescriptor::new(Api::Gamma, &self.gamma_url, "/markets", self.offset());
        Endpoint::new(apply_market_filter(desc, filter), GammaMarketMapper)
    }

    /// Gamma `/events`, nested markets included
    pub fn events(&self, filter: &MarketFilter) -> Endpoint {
        let desc = EndpointDescriptor::new(Api::Gamma, &self.gamma_url, "/events", self.offset());
        Endpoint::new(apply_market_filter(desc, filter), EventMapper)
    }

    /// CLOB `/prices-history` for one token. `fidelity` is in minutes.
    pub fn price_history(&self, token_id: &str, range: &PriceRange, fidelity: u32) -> Endpoint {
        let strategy = match range {
            PriceRange::Interval(_) => CursorStrategy::Single,
            PriceRange::Window {
                start,
                end,
                step_secs,
            } => CursorStrategy::TimeWindow {
                start: *start,
                end: *end,
                step_secs: (*step_secs).max(1),
            },
        };

        let mut desc = EndpointDescriptor::new(Api::Clob, &self.clob_url, "/prices-history", strategy)
            .param("market", token_id)
            .param("fidelity", fidelity.to_string())
            .items_field("history");
        if let PriceRange::Interval(interval) = range {
            desc = desc.param("interval", interval.clone());
        }

        Endpoint::new(desc, PriceHistoryMapper::new(token_id))
    }

    /// CLOB `/orders`, offset-paged
    pub fn orders(&self, filter: &TradeFilter) -> Endpoint {
        let desc = EndpointDescriptor::new(Api::Clob, &self.clob_url, "/orders", self.offset())
            .items_field("data");
        let desc = apply_trade_filter(desc, filter);
        let desc = match &filter.status {
            Some(status) => desc.param("status", status.clone()),
            None => desc,
        };
        Endpoint::new(desc, OrderMapper)
    }

    /// CLOB `/trades`, cursor-paged
    pub fn trades(&self, filter: &TradeFilter) -> Endpoint {
        let desc = EndpointDescriptor::new(
            Api::Clob,
            &self.clob_url,
            "/trades",
            CursorStrategy::NextToken {
                field: "next_cursor".to_string(),
            },
        )
        .items_field("data");
        Endpoint::new(apply_trade_filter(desc, filter), TradeMapper)
    }

    /// Data-api `/positions` for one wallet
    pub fn positions(&self, user: &str) -> Endpoint {
        let desc = EndpointDescriptor::new(Api::Data, &self.data_url, "/positions", CursorStrategy::Single)
            .param("user", user);
        Endpoint::new(desc, PositionMapper::new(user))
    }
}

fn apply_market_filter(mut desc: EndpointDescriptor, filter: &MarketFilter) -> EndpointDescriptor {
    if let Some(active) = filter.active {
        desc = desc.param("active", active.to_string());
    }
    if let Some(closed) = filter.closed {
        desc = desc.param("closed", closed.to_string());
    }
    if let Some(tag) = &filter.tag {
        desc = desc.param("tag_slug", tag.clone());
    }
    desc
}

fn apply_trade_filter(mut desc: EndpointDescriptor, filter: &TradeFilter) -> EndpointDescriptor {
    for (key, value) in [
        ("market", &filter.market),
        ("maker", &filter.maker),
        ("taker", &filter.taker),
    ] {
        if let Some(value) = value {
            desc = desc.param(key, value.clone());
        }
    }
    desc
}
