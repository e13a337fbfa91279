//! Endpoint descriptors and cursor strategies

use crate::checkpoint::Cursor;
use crate::fetch::{FetchError, Request};
use serde_json::Value;

/// CLOB marker meaning "no further pages"
pub const END_CURSOR: &str = "LTE=";

/// Which venue API an endpoint belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Api {
    Gamma,
    Clob,
    Data,
}

impl Api {
    pub fn as_str(&self) -> &'static str {
        match self {
            Api::Gamma => "gamma",
            Api::Clob => "clob",
            Api::Data => "data",
        }
    }
}

impl std::fmt::Display for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an endpoint pages through its results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorStrategy {
    /// `limit` + `offset`; a page shorter than `page_size` is the last one
    Offset { page_size: u64 },
    /// `next_cursor` request parameter, next token read from `field`
    NextToken { field: String },
    /// `startTs`/`endTs` windows of `step_secs` from `start` up to `end`
    TimeWindow { start: i64, end: i64, step_secs: i64 },
    /// A single request
    Single,
}

impl CursorStrategy {
    pub fn initial_cursor(&self) -> Cursor {
        match self {
            CursorStrategy::Offset { .. } | CursorStrategy::Single => Cursor::Offset(0),
            CursorStrategy::NextToken { .. } => Cursor::Token(String::new()),
            CursorStrategy::TimeWindow { start, .. } => Cursor::Timestamp(*start),
        }
    }

    /// Whole result set in one response, re-read in full on every run
    pub fn is_snapshot(&self) -> bool {
        matches!(self, CursorStrategy::Single)
    }

    /// Whether a stored cursor can be used with this strategy
    pub fn accepts(&self, cursor: &Cursor) -> bool {
        matches!(
            (self, cursor),
            (CursorStrategy::Offset { .. }, Cursor::Offset(_))
                | (CursorStrategy::Single, Cursor::Offset(_))
                | (CursorStrategy::NextToken { .. }, Cursor::Token(_))
                | (CursorStrategy::TimeWindow { .. }, Cursor::Timestamp(_))
        )
    }

    /// True when the cursor already points past the last page
    pub fn is_exhausted(&self, cursor: &Cursor) -> bool {
        match (self, cursor) {
            (CursorStrategy::TimeWindow { end, .. }, Cursor::Timestamp(ts)) => ts >= end,
            (CursorStrategy::NextToken { .. }, Cursor::Token(t)) => t == END_CURSOR,
            _ => false,
        }
    }

    /// Add paging parameters for the page at `cursor`
    fn apply(&self, request: Request, cursor: &Cursor) -> Request {
        match (self, cursor) {
            (CursorStrategy::Offset { page_size }, Cursor::Offset(offset)) => request
                .query("limit", page_size.to_string())
                .query("offset", offset.to_string()),
            (CursorStrategy::NextToken { .. }, Cursor::Token(token)) if !token.is_empty() => {
                request.query("next_cursor", token.clone())
            }
            (CursorStrategy::TimeWindow { end, step_secs, .. }, Cursor::Timestamp(start)) => {
                let window_end = start.saturating_add(window_step(*step_secs)).min(*end);
                request
                    .query("startTs", start.to_string())
                    .query("endTs", window_end.to_string())
            }
            _ => request,
        }
    }

    /// Cursor of the page after the one at `cursor`, or None when that page
    /// was the last. `item_count` is the number of raw items it held.
    pub fn advance(&self, cursor: &Cursor, body: &Value, item_count: usize) -> Option<Cursor> {
        match (self, cursor) {
            (CursorStrategy::Offset { page_size }, Cursor::Offset(offset)) => {
                let count = item_count as u64;
                (count > 0 && count >= *page_size).then(|| Cursor::Offset(offset + count))
            }
            (CursorStrategy::NextToken { field }, Cursor::Token(_)) => {
                if item_count == 0 {
                    return None;
                }
                match body.get(field).and_then(Value::as_str) {
                    Some(next) if !next.is_empty() && next != END_CURSOR => {
                        Some(Cursor::Token(next.to_string()))
                    }
                    _ => None,
                }
            }
            (CursorStrategy::TimeWindow { end, step_secs, .. }, Cursor::Timestamp(start)) => {
                let next = start.saturating_add(window_step(*step_secs));
                (next < *end).then_some(Cursor::Timestamp(next))
            }
            _ => None,
        }
    }

    fn is_paging_param(&self, key: &str) -> bool {
        match self {
            CursorStrategy::Offset { .. } => key == "limit" || key == "offset",
            CursorStrategy::NextToken { .. } => key == "next_cursor",
            CursorStrategy::TimeWindow { .. } => key == "startTs" || key == "endTs",
            CursorStrategy::Single => false,
        }
    }
}

/// Width of one time window; a non-positive step still moves forward
fn window_step(step_secs: i64) -> i64 {
    step_secs.max(1)
}

/// Everything needed to walk one paginated endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub api: Api,
    pub base_url: String,
    pub path: String,
    /// Filter parameters sent with every page
    pub params: Vec<(String, String)>,
    /// Field holding the page's items; None when the body is the array itself
    pub items_field: Option<String>,
    pub strategy: CursorStrategy,
}

impl EndpointDescriptor {
    pub fn new(
        api: Api,
        base_url: impl Into<String>,
        path: impl Into<String>,
        strategy: CursorStrategy,
    ) -> Self {
        Self {
            api,
            base_url: base_url.into(),
            path: path.into(),
            params: Vec::new(),
            items_field: None,
            strategy,
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn items_field(mut self, field: impl Into<String>) -> Self {
        self.items_field = Some(field.into());
        self
    }

    /// `<api>:<path>?<sorted filter params>`. Paging parameters never take
    /// part; a time-window stream adds its overall range as `window=`.
    pub fn stream_id(&self) -> String {
        let mut params: Vec<_> = self
            .params
            .iter()
            .filter(|(k, _)| !self.strategy.is_paging_param(k))
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        if let CursorStrategy::TimeWindow { start, end, .. } = &self.strategy {
            params.push(format!("window={}-{}", start, end));
        }
        params.sort();

        let mut id = format!("{}:{}", self.api, self.path);
        if !params.is_empty() {
            id.push('?');
            id.push_str(&params.join("&"));
        }
        id
    }

    /// Label used as a record's `source_endpoint`
    pub fn source(&self) -> String {
        format!("{}:{}", self.api, self.path)
    }

    /// Request for the page at `cursor`
    pub fn request(&self, cursor: &Cursor) -> Request {
        let request = self
            .params
            .iter()
            .fold(Request::new(&self.base_url, &self.path), |req, (k, v)| {
                req.query(k.clone(), v.clone())
            });
        self.strategy.apply(request, cursor)
    }

    /// The page's items. A body that is an array is accepted even when an
    /// items field is configured, since some endpoints answer with either shape.
    pub fn items<'a>(&self, body: &'a Value) -> Result<&'a [Value], FetchError> {
        if let Some(items) = body.as_array() {
            return Ok(items);
        }
        match &self.items_field {
            Some(field) => body
                .get(field)
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .ok_or_else(|| {
                    FetchError::Malformed(format!("expected array in field `{}`", field))
                }),
            None => Err(FetchError::Malformed("expected a JSON array".to_string())),
        }
    }
}
