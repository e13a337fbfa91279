//! Paginated collection
//!
//! A [`Collector`] walks one endpoint page by page, maps every item into
//! [`Record`](crate::record::Record)s and checkpoints after each consumed
//! page. Re-running a stream resumes from its checkpoint.

mod descriptor;
mod endpoints;
mod paginated;

pub use descriptor::{Api, CursorStrategy, EndpointDescriptor, END_CURSOR};
pub use endpoints::{
    Endpoint, Endpoints, MarketFilter, PriceRange, TradeFilter, DEFAULT_WINDOW_SECS,
};
pub use paginated::{
    CollectError, CollectOptions, CollectStatus, CollectSummary, Collection, Collector,
};
