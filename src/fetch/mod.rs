//! Fetch engine
//!
//! Rate-limited, retrying access to the venue's REST APIs. A single
//! [`RateLimiter`] instance is shared by every [`Fetcher`] in the process.

pub mod mock;
mod rate_limiter;
mod retry;
mod transport;
mod types;

pub use rate_limiter::{RateLimiter, RateLimiterStats};
pub use retry::{Fetcher, RetryConfig};
pub use transport::{HttpConfig, HttpTransport, Transport};
pub use types::{
    classify_status, ErrorClass, FetchError, RawResponse, Request, Response, TransportError,
};
