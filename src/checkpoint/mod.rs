//! Resumable pagination state
//!
//! One [`Checkpoint`] per collection stream, persisted after every consumed
//! page so an interrupted run picks up where it stopped.

mod store;

pub use store::{CheckpointError, CheckpointStore};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque position marker understood by the endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cursor {
    /// Record offset (`offset=` query parameter)
    Offset(u64),
    /// Server-issued page token; empty means "first page"
    Token(String),
    /// Unix seconds marking the start of the next time window
    Timestamp(i64),
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cursor::Offset(n) => write!(f, "offset:{}", n),
            Cursor::Token(t) if t.is_empty() => write!(f, "token:<start>"),
            Cursor::Token(t) => write!(f, "token:{}", t),
            Cursor::Timestamp(ts) => write!(f, "ts:{}", ts),
        }
    }
}

/// Durable progress of one collection stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Endpoint plus filter parameters
    pub stream_id: String,
    /// Cursor of the next page to fetch
    pub cursor: Cursor,
    /// Pages fully consumed so far
    pub page_count: u64,
    /// Records handed to the caller so far; never decreases
    pub records_seen: u64,
    /// Records of the page at `cursor` already handed out (set when a record
    /// limit stops a run mid-page)
    #[serde(default)]
    pub skip_in_page: u64,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Fresh checkpoint at a stream's initial cursor
    pub fn start(stream_id: impl Into<String>, cursor: Cursor) -> Self {
        Self {
            stream_id: stream_id.into(),
            cursor,
            page_count: 0,
            records_seen: 0,
            skip_in_page: 0,
            updated_at: Utc::now(),
        }
    }
}
