//! Page-walking for list endpoints
//!
//! Pages are 1-based. A walk stops at the first of:
//! - an empty page
//! - `page * per_page >= total` (a missing `total` on an object page counts as 0)
//! - a short page, for bare-array responses that carry no `total`
//! - `collected >= max_records` (the crossing page is returned whole)
//!
//! A walk that never stops is cut off after [`MAX_ITERATIONS`] pages with an
//! [`FetcherError::ApiError`].

use crate::fetcher::{FetcherError, FetcherResult, RecordStream};
use futures_util::{stream, StreamExt};
use serde_json::Value;
use std::future::Future;
use tracing::debug;

/// Maximum number of pages walked for a single resource
pub const MAX_ITERATIONS: u32 = 10_000;

/// One parsed page of a list endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Records on this page, in API order
    pub records: Vec<Value>,
    /// Page number (response value, or the requested one)
    pub page: u32,
    /// Page size (response value, or the requested one)
    pub per_page: u32,
    /// Total record count, when the response carries one
    pub total: Option<u64>,
}

impl Page {
    /// Parse a page body
    ///
    /// Accepts `{<list_key>: [...], page, per_page, total}` or a bare array.
    ///
    /// # Arguments
    /// * `list_key` - Field holding the records (e.g. "pokemons")
    /// * `body` - Decoded response body
    /// * `requested_page` - Page number that was asked for
    /// * `requested_per_page` - Page size that was asked for
    pub fn parse(
        list_key: &str,
        body: Value,
        requested_page: u32,
        requested_per_page: u32,
    ) -> FetcherResult<Self> {
        match body {
            Value::Array(records) => Ok(Self {
                records,
                page: requested_page,
                per_page: requested_per_page,
                total: None,
            }),
            Value::Object(mut map) => {
                let records = match map.remove(list_key) {
                    Some(Value::Array(records)) => records,
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => {
                        return Err(FetcherError::ParseError(format!(
                            "`{list_key}` is not an array: {other}"
                        )))
                    }
                };
                let read_u64 = |key: &str| map.get(key).and_then(as_u64);

                Ok(Self {
                    records,
                    page: read_u64("page")
                        .and_then(|v| u32::try_from(v).ok())
                        .unwrap_or(requested_page),
                    per_page: read_u64("per_page")
                        .and_then(|v| u32::try_from(v).ok())
                        .filter(|v| *v > 0)
                        .unwrap_or(requested_per_page),
                    total: Some(read_u64("total").unwrap_or(0)),
                })
            }
            other => Err(FetcherError::ParseError(format!(
                "expected a page object or array, got {other}"
            ))),
        }
    }

    /// Whether no page follows this one
    pub fn is_last(&self) -> bool {
        if self.records.is_empty() {
            return true;
        }
        match self.total {
            Some(total) => u64::from(self.page) * u64::from(self.per_page) >= total,
            None => self.records.len() < self.per_page as usize,
        }
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Walk position of one list resource
#[derive(Debug, Clone)]
pub struct PageCursor {
    next_page: u32,
    per_page: u32,
    max_records: Option<usize>,
    collected: usize,
    finished: bool,
}

impl PageCursor {
    /// Start at page 1
    pub fn new(per_page: u32, max_records: Option<usize>) -> Self {
        Self {
            next_page: 1,
            per_page: per_page.max(1),
            max_records,
            collected: 0,
            finished: max_records == Some(0),
        }
    }

    /// Page to request next, or `None` when the walk is over
    pub fn next_page(&self) -> Option<u32> {
        (!self.finished).then_some(self.next_page)
    }

    /// Requested page size
    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Records seen so far
    pub fn collected(&self) -> usize {
        self.collected
    }

    /// Account for a received page
    pub fn advance(&mut self, page: &Page) {
        self.collected += page.records.len();
        let cap_reached = self
            .max_records
            .is_some_and(|max| self.collected >= max);
        self.finished = page.is_last() || cap_reached;
        self.next_page += 1;
    }

    /// Stop after an error
    pub fn abort(&mut self) {
        self.finished = true;
    }
}

/// Lazily walk a list endpoint
///
/// `fetch_page(page, per_page)` performs one request (already wrapped in the
/// retry controller). The first error is yielded and ends the stream.
pub fn paginate<F, Fut>(
    label: impl Into<String>,
    list_key: &'static str,
    per_page: u32,
    max_records: Option<usize>,
    fetch_page: F,
) -> RecordStream
where
    F: FnMut(u32, u32) -> Fut + Send + 'static,
    Fut: Future<Output = FetcherResult<Value>> + Send + 'static,
{
    let label = label.into();
    let cursor = PageCursor::new(per_page, max_records);

    let pages = stream::unfold(
        (cursor, fetch_page, label),
        move |(mut cursor, mut fetch_page, label)| async move {
            let page_number = cursor.next_page()?;

            if page_number > MAX_ITERATIONS {
                cursor.abort();
                let error = FetcherError::ApiError(format!(
                    "{label}: max iterations ({MAX_ITERATIONS}) exceeded after {} records - possible infinite loop",
                    cursor.collected()
                ));
                return Some((vec![Err(error)], (cursor, fetch_page, label)));
            }

            let parsed = fetch_page(page_number, cursor.per_page())
                .await
                .and_then(|body| Page::parse(list_key, body, page_number, cursor.per_page()));

            let items = match parsed {
                Ok(page) => {
                    cursor.advance(&page);
                    debug!(
                        %label,
                        page = page_number,
                        records = page.records.len(),
                        collected = cursor.collected(),
                        "Page received"
                    );
                    page.records.into_iter().map(Ok).collect()
                }
                Err(error) => {
                    cursor.abort();
                    vec![Err(error)]
                }
            };

            Some((items, (cursor, fetch_page, label)))
        },
    );

    Box::pin(pages.flat_map(stream::iter))
}

/// Drain a record stream, stopping at the first error
pub async fn collect_all(mut records: RecordStream) -> FetcherResult<Vec<Value>> {
    let mut all = Vec::new();
    while let Some(record) = records.next().await {
        all.push(record?);
    }
    Ok(all)
}
