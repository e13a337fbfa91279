//! Checkpointed pagination engine

use super::descriptor::EndpointDescriptor;
use crate::checkpoint::{Checkpoint, CheckpointError, CheckpointStore, Cursor};
use crate::fetch::{FetchError, Fetcher};
use crate::record::{Record, RecordMapper};
use crate::schedule::CancelToken;
use crate::telemetry;
use chrono::Utc;
use futures_util::stream::{self, Stream};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

/// Why a collection stopped early
#[derive(Debug, Error)]
pub enum CollectError {
    /// Non-retryable failure; resuming will most likely fail the same way
    #[error("{stream_id}: fatal fetch error: {source}")]
    Fatal {
        stream_id: String,
        #[source]
        source: FetchError,
    },

    /// Retries ran out; safe to resume later from the last checkpoint
    #[error("{stream_id}: {source}")]
    Exhausted {
        stream_id: String,
        #[source]
        source: FetchError,
    },

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

impl CollectError {
    fn from_fetch(stream_id: &str, err: FetchError) -> Self {
        let stream_id = stream_id.to_string();
        if err.is_fatal() {
            CollectError::Fatal {
                stream_id,
                source: err,
            }
        } else {
            CollectError::Exhausted {
                stream_id,
                source: err,
            }
        }
    }

    /// Whether re-running the same stream later is expected to make progress
    pub fn is_resumable(&self) -> bool {
        matches!(self, CollectError::Exhausted { .. })
    }
}

/// How a collection that did not fail came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectStatus {
    /// The endpoint has no more pages
    Exhausted,
    /// The caller's record limit was reached
    LimitReached,
    /// Stopped between pages by a cancel token
    Cancelled,
}

/// Per-run counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectSummary {
    pub stream_id: String,
    /// None while running and after a failure
    pub status: Option<CollectStatus>,
    /// Records yielded in this run
    pub records: u64,
    /// Pages fetched in this run
    pub pages: u64,
    /// Items dropped because they could not be mapped
    pub skipped: u64,
}

/// Per-run options
#[derive(Debug, Clone, Default)]
pub struct CollectOptions {
    /// Stop after yielding this many records in this run
    pub limit: Option<u64>,
    pub cancel: Option<CancelToken>,
}

/// Builds [`Collection`]s over a shared fetcher and checkpoint store
#[derive(Clone)]
pub struct Collector {
    fetcher: Arc<Fetcher>,
    store: CheckpointStore,
}

impl Collector {
    pub fn new(fetcher: Arc<Fetcher>, store: CheckpointStore) -> Self {
        Self { fetcher, store }
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Start (or resume) collecting `stream_id`. Nothing is fetched until the
    /// returned collection is polled.
    pub fn collect(
        &self,
        stream_id: impl Into<String>,
        descriptor: EndpointDescriptor,
        mapper: Arc<dyn RecordMapper>,
        options: CollectOptions,
    ) -> Collection {
        let stream_id = stream_id.into();
        let initial = descriptor.strategy.initial_cursor();

        let checkpoint = match self.store.load(&stream_id) {
            Some(cp) if descriptor.strategy.accepts(&cp.cursor) => {
                tracing::info!(
                    stream_id = %stream_id,
                    cursor = %cp.cursor,
                    records_seen = cp.records_seen,
                    skip_in_page = cp.skip_in_page,
                    "Resuming from checkpoint"
                );
                cp
            }
            Some(cp) => {
                tracing::warn!(
                    stream_id = %stream_id,
                    cursor = %cp.cursor,
                    "Checkpoint cursor does not fit endpoint, starting over"
                );
                Checkpoint {
                    cursor: initial,
                    skip_in_page: 0,
                    ..cp
                }
            }
            None => Checkpoint::start(&stream_id, initial),
        };

        Collection {
            fetcher: self.fetcher.clone(),
            store: self.store.clone(),
            source: descriptor.source(),
            descriptor,
            mapper,
            seen: checkpoint.records_seen,
            checkpoint,
            buffer: VecDeque::new(),
            page: None,
            options,
            summary: CollectSummary {
                stream_id,
                ..Default::default()
            },
            failed: false,
        }
    }
}

/// Page fetched but not yet fully handed out
#[derive(Debug)]
struct OpenPage {
    next: Option<Cursor>,
    /// Records of this page handed out, including any skipped on resume
    consumed: u64,
}

/// Lazy, resumable sequence of records from one stream
///
/// A page's checkpoint is written once every record of it has been pulled,
/// so a consumer that stops early will see the unconsumed records again on
/// the next run.
pub struct Collection {
    fetcher: Arc<Fetcher>,
    store: CheckpointStore,
    descriptor: EndpointDescriptor,
    mapper: Arc<dyn RecordMapper>,
    source: String,
    /// Last durable state; `cursor` is the page currently open or next to fetch
    checkpoint: Checkpoint,
    /// Records handed out across all runs
    seen: u64,
    buffer: VecDeque<Record>,
    page: Option<OpenPage>,
    options: CollectOptions,
    summary: CollectSummary,
    failed: bool,
}

impl Collection {
    pub fn stream_id(&self) -> &str {
        &self.summary.stream_id
    }

    pub fn summary(&self) -> &CollectSummary {
        &self.summary
    }

    /// None once the stream has ended or failed; `summary().status` tells
    /// the two apart
    pub fn status(&self) -> Option<CollectStatus> {
        self.summary.status
    }

    /// Next record. `Some(Err(_))` is returned at most once, after which the
    /// collection is finished.
    pub async fn next(&mut self) -> Option<Result<Record, CollectError>> {
        loop {
            if self.failed || self.summary.status.is_some() {
                return None;
            }

            if self.limit_reached() {
                return self.stop_at_limit().map(Err);
            }

            if let Some(record) = self.take_buffered() {
                return Some(Ok(record));
            }

            if let Some(page) = self.page.take() {
                let last = page.next.is_none();
                if let Err(e) = self.commit_page(page) {
                    return Some(Err(self.fail(e.into())));
                }
                if last {
                    self.finish(CollectStatus::Exhausted);
                    return None;
                }
            }

            if self
                .options
                .cancel
                .as_ref()
                .is_some_and(CancelToken::is_cancelled)
            {
                self.finish(CollectStatus::Cancelled);
                return None;
            }

            if self.descriptor.strategy.is_exhausted(&self.checkpoint.cursor) {
                self.finish(CollectStatus::Exhausted);
                return None;
            }

            if let Err(e) = self.fetch_page().await {
                return Some(Err(self.fail(e)));
            }
        }
    }

    /// The rest of the current page, up to the record limit. The page's
    /// checkpoint is only written by the following call to `next_page` or
    /// `next`, so a caller that stores the batch first never loses a page
    /// it has not stored.
    pub async fn next_page(&mut self) -> Option<Result<Vec<Record>, CollectError>> {
        let first = match self.next().await? {
            Ok(record) => record,
            Err(e) => return Some(Err(e)),
        };
        let mut batch = vec![first];
        while !self.limit_reached() {
            match self.take_buffered() {
                Some(record) => batch.push(record),
                None => break,
            }
        }
        Some(Ok(batch))
    }

    /// Drain the whole collection into memory
    pub async fn collect_all(mut self) -> Result<(Vec<Record>, CollectSummary), CollectError> {
        let mut records = Vec::new();
        while let Some(item) = self.next().await {
            records.push(item?);
        }
        Ok((records, self.summary))
    }

    /// Adapt into a `futures` stream
    pub fn into_stream(self) -> impl Stream<Item = Result<Record, CollectError>> {
        stream::unfold(self, |mut collection| async move {
            collection.next().await.map(|item| (item, collection))
        })
    }

    fn limit_reached(&self) -> bool {
        self.options
            .limit
            .is_some_and(|limit| self.summary.records >= limit)
    }

    fn take_buffered(&mut self) -> Option<Record> {
        let record = self.buffer.pop_front()?;
        if let Some(page) = self.page.as_mut() {
            page.consumed += 1;
        }
        self.seen += 1;
        self.summary.records += 1;
        telemetry::record_records_collected(record.kind().as_str(), 1);
        Some(record)
    }

    async fn fetch_page(&mut self) -> Result<(), CollectError> {
        let stream_id = self.summary.stream_id.clone();
        let cursor = self.checkpoint.cursor.clone();
        let request = self.descriptor.request(&cursor);

        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| CollectError::from_fetch(&stream_id, e))?;

        let items = self
            .descriptor
            .items(&response.body)
            .map_err(|e| CollectError::from_fetch(&stream_id, e))?;

        let mut records = Vec::with_capacity(items.len());
        for item in items {
            match self.mapper.map(item, &self.source) {
                Ok(mapped) => records.extend(mapped),
                Err(e) => {
                    self.summary.skipped += 1;
                    tracing::warn!(stream_id = %stream_id, cursor = %cursor, error = %e, "Skipping unmappable item");
                }
            }
        }

        let next = self
            .descriptor
            .strategy
            .advance(&cursor, &response.body, items.len());

        let skip = self.checkpoint.skip_in_page.min(records.len() as u64);
        self.buffer = records.into_iter().skip(skip as usize).collect();
        self.page = Some(OpenPage {
            next,
            consumed: skip,
        });
        self.summary.pages += 1;
        telemetry::record_page_collected();

        tracing::debug!(
            stream_id = %stream_id,
            cursor = %cursor,
            page = self.checkpoint.page_count + 1,
            items = items.len(),
            records = self.buffer.len(),
            skipped_on_resume = skip,
            attempts = response.attempts,
            "Page fetched"
        );
        Ok(())
    }

    /// Persist a fully consumed page. After the last page of a paged stream
    /// the cursor stays put and every record of that page is marked as handed
    /// out, so a later run only yields what the endpoint has appended since.
    /// A snapshot endpoint has no stable order to skip into, so it starts
    /// over and the whole snapshot is yielded again.
    fn commit_page(&mut self, page: OpenPage) -> Result<(), CheckpointError> {
        match page.next {
            Some(next) => {
                self.checkpoint.cursor = next;
                self.checkpoint.skip_in_page = 0;
            }
            None if self.descriptor.strategy.is_snapshot() => {
                self.checkpoint.cursor = self.descriptor.strategy.initial_cursor();
                self.checkpoint.skip_in_page = 0;
            }
            None => self.checkpoint.skip_in_page = page.consumed,
        }
        self.checkpoint.page_count += 1;
        self.save()
    }

    fn stop_at_limit(&mut self) -> Option<CollectError> {
        let outcome = match self.page.take() {
            // Limit hit exactly on a page boundary
            Some(page) if self.buffer.is_empty() => {
                let last = page.next.is_none();
                self.commit_page(page).map(|_| last)
            }
            Some(page) => {
                self.checkpoint.skip_in_page = page.consumed;
                self.buffer.clear();
                self.save().map(|_| false)
            }
            None => Ok(false),
        };

        match outcome {
            Ok(true) => {
                self.finish(CollectStatus::Exhausted);
                None
            }
            Ok(false) => {
                self.finish(CollectStatus::LimitReached);
                None
            }
            Err(e) => Some(self.fail(e.into())),
        }
    }

    fn save(&mut self) -> Result<(), CheckpointError> {
        self.checkpoint.records_seen = self.seen;
        self.checkpoint.updated_at = Utc::now();
        self.store.save(&self.checkpoint)
    }

    fn finish(&mut self, status: CollectStatus) {
        self.summary.status = Some(status);
        tracing::info!(
            stream_id = %self.summary.stream_id,
            status = ?status,
            records = self.summary.records,
            pages = self.summary.pages,
            skipped = self.summary.skipped,
            cursor = %self.checkpoint.cursor,
            "Collection finished"
        );
    }

    fn fail(&mut self, err: CollectError) -> CollectError {
        self.failed = true;
        self.buffer.clear();
        self.page = None;
        tracing::error!(
            stream_id = %self.summary.stream_id,
            records = self.summary.records,
            cursor = %self.checkpoint.cursor,
            resumable = err.is_resumable(),
            error = %err,
            "Collection stopped"
        );
        err
    }
}
