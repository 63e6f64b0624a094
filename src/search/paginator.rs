//! Deep result resolution beyond single-page limits.
//!
//! ```text
//! INIT ──total ≤ page──▶ FAST_PATH ─────────────────────────────▶ DONE
//!   │
//!   └──────────────────▶ SNAPSHOT_OPEN ─▶ PAGE_FETCH* ─▶ SNAPSHOT_CLOSE ─▶ DONE
//! ```
//!
//! Pages after the first are pinned to a point-in-time snapshot and chained
//! with `search_after`. Sorting on `_doc` with a `_shard_doc` tiebreaker gives
//! a total order, so no document is returned twice or skipped.

use crate::client::SearchBackend;
use crate::error::{ExplorerError, Result};
use crate::search::snapshot::Snapshot;
use serde_json::{json, Value};
use std::sync::Arc;
use strum::Display;
use tracing::debug;

/// Paginator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaginatorState {
    Init,
    FastPath,
    SnapshotOpen,
    PageFetch,
    SnapshotClose,
    Done,
}

/// Which part of each matching document to return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Only document ids
    IdsOnly,
    /// Only the listed source fields
    Fields(Vec<String>),
    /// Full source minus the listed fields
    Exclude(Vec<String>),
    /// Full source
    Full,
}

impl Projection {
    /// Value of the `_source` request member, `None` for the full document
    pub fn source(&self) -> Option<Value> {
        match self {
            Projection::IdsOnly => Some(Value::Bool(false)),
            Projection::Fields(fields) => Some(json!(fields)),
            Projection::Exclude(fields) => Some(json!({ "excludes": fields })),
            Projection::Full => None,
        }
    }

    /// Page size keeping responses under the backend's size limits
    pub fn page_size(&self) -> usize {
        match self {
            Projection::IdsOnly => 1000,
            Projection::Fields(_) => 100,
            Projection::Exclude(_) | Projection::Full => 10,
        }
    }
}

pub struct Paginator {
    backend: Arc<dyn SearchBackend>,
    keep_alive: String,
    state: PaginatorState,
}

impl Paginator {
    pub fn new(backend: Arc<dyn SearchBackend>, keep_alive: impl Into<String>) -> Self {
        Self {
            backend,
            keep_alive: keep_alive.into(),
            state: PaginatorState::Init,
        }
    }

    pub fn state(&self) -> PaginatorState {
        self.state
    }

    fn transition(&mut self, to: PaginatorState) {
        debug!(from = %self.state, to = %to, "Paginator transition");
        self.state = to;
    }

    /// Ids of every document matching `query`
    pub async fn ids(&mut self, query: &Value, page_size: usize) -> Result<Vec<String>> {
        let hits = self.search_all(query, page_size, &Projection::IdsOnly).await?;
        hits.iter().map(hit_id).collect()
    }

    /// Every hit matching `query`, in `_doc` order
    pub async fn search_all(
        &mut self,
        query: &Value,
        page_size: usize,
        projection: &Projection,
    ) -> Result<Vec<Value>> {
        self.state = PaginatorState::Init;
        let mut body = json!({
            "query": query,
            "size": page_size,
            "sort": [{ "_doc": { "order": "asc" } }],
            "track_total_hits": true,
        });
        if let Some(source) = projection.source() {
            body["_source"] = source;
        }

        let first = self.backend.search(&body).await?;
        let total = total_hits(&first)?;
        if total <= page_size as u64 {
            self.transition(PaginatorState::FastPath);
            let hits = take_hits(first)?;
            self.transition(PaginatorState::Done);
            return Ok(hits);
        }

        debug!(total = total, page_size = page_size, "Result set exceeds one page");
        let mut snapshot = Snapshot::open(self.backend.clone(), &self.keep_alive).await?;
        self.transition(PaginatorState::SnapshotOpen);

        body["sort"] = json!([
            { "_doc": { "order": "asc" } },
            { "_shard_doc": "asc" }
        ]);
        body["track_total_hits"] = Value::Bool(false);

        let fetched = self.fetch_pages(&mut snapshot, body, total as usize).await;
        self.transition(PaginatorState::SnapshotClose);
        let hits = snapshot.release(fetched).await?;
        self.transition(PaginatorState::Done);
        Ok(hits)
    }

    async fn fetch_pages(
        &mut self,
        snapshot: &mut Snapshot,
        mut body: Value,
        expected: usize,
    ) -> Result<Vec<Value>> {
        let mut all_hits = Vec::with_capacity(expected);
        let mut after: Option<Value> = None;
        loop {
            self.transition(PaginatorState::PageFetch);
            snapshot.stamp(&mut body);
            if let Some(after) = after.take() {
                body["search_after"] = after;
            }

            let response = self.backend.search(&body).await?;
            snapshot.update_from(&response);
            let hits = take_hits(response)?;
            if hits.is_empty() {
                break;
            }

            after = Some(
                hits.last()
                    .and_then(|hit| hit.get("sort"))
                    .cloned()
                    .ok_or_else(|| ExplorerError::protocol("hit sort key"))?,
            );
            debug!(page = hits.len(), so_far = all_hits.len() + hits.len(), "Fetched page");
            all_hits.extend(hits);
        }
        Ok(all_hits)
    }
}

/// `hits.total` as either `{ "value": n }` or a bare number
pub fn total_hits(response: &Value) -> Result<u64> {
    let total = &response["hits"]["total"];
    total
        .get("value")
        .unwrap_or(total)
        .as_u64()
        .ok_or_else(|| ExplorerError::protocol("hits.total"))
}

pub(crate) fn take_hits(mut response: Value) -> Result<Vec<Value>> {
    match response["hits"]["hits"].take() {
        Value::Array(hits) => Ok(hits),
        _ => Err(ExplorerError::protocol("hits.hits")),
    }
}

pub(crate) fn hit_id(hit: &Value) -> Result<String> {
    hit.get("_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ExplorerError::protocol("hit _id"))
}
