//! Distinct-value enumeration via terms and composite aggregations

use crate::client::SearchBackend;
use crate::error::{ExplorerError, Result};
use crate::search::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

/// A `(value, count)` pair from a terms or composite aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: Value,
    pub doc_count: u64,
}

/// Multi-field composite bucket: one key per named source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeBucket {
    pub key: Map<String, Value>,
    pub doc_count: u64,
}

pub struct BucketEnumerator {
    backend: Arc<dyn SearchBackend>,
    keep_alive: String,
    page_size: usize,
}

impl BucketEnumerator {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        keep_alive: impl Into<String>,
        page_size: usize,
    ) -> Self {
        Self {
            backend,
            keep_alive: keep_alive.into(),
            page_size,
        }
    }

    /// Every distinct value of `field` among documents matching `query`
    pub async fn buckets(&self, query: &Value, field: &str) -> Result<Vec<Bucket>> {
        // Fast path: one terms aggregation, no snapshot.
        let body = json!({
            "size": 0,
            "query": query,
            "aggs": { field: { "terms": { "field": field, "size": self.page_size } } },
        });
        let response = self.backend.search(&body).await?;
        let agg = aggregation(&response, field)?;
        let other = agg
            .get("sum_other_doc_count")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        if other == 0 {
            return agg_buckets(agg)?
                .iter()
                .map(|b| -> Result<Bucket> {
                    Ok(Bucket {
                        key: b.get("key").cloned().ok_or_else(|| ExplorerError::protocol("bucket key"))?,
                        doc_count: doc_count(b)?,
                    })
                })
                .collect();
        }

        debug!(field = field, remainder = other, "Falling back to composite aggregation");
        let sources = [(field, field)];
        let buckets = self.composite(query, &sources).await?;
        buckets
            .into_iter()
            .map(|mut b| -> Result<Bucket> {
                Ok(Bucket {
                    key: b.key.remove(field).ok_or_else(|| ExplorerError::protocol("composite key"))?,
                    doc_count: b.doc_count,
                })
            })
            .collect()
    }

    /// Paged composite aggregation over named `(source, field)` pairs.
    ///
    /// Composite pages never repeat a key, so the concatenation is unique.
    pub async fn composite(
        &self,
        query: &Value,
        sources: &[(&str, &str)],
    ) -> Result<Vec<CompositeBucket>> {
        let sources: Vec<Value> = sources
            .iter()
            .map(|(name, field)| json!({ *name: { "terms": { "field": field } } }))
            .collect();
        let body = json!({
            "size": 0,
            "query": query,
            "aggs": { "composite": { "composite": { "size": self.page_size, "sources": sources } } },
        });

        let mut snapshot = Snapshot::open(self.backend.clone(), &self.keep_alive).await?;
        let fetched = self.fetch_composite(&mut snapshot, body).await;
        snapshot.release(fetched).await
    }

    async fn fetch_composite(
        &self,
        snapshot: &mut Snapshot,
        mut body: Value,
    ) -> Result<Vec<CompositeBucket>> {
        let mut all_buckets = Vec::new();
        loop {
            snapshot.stamp(&mut body);
            let response = self.backend.search(&body).await?;
            snapshot.update_from(&response);

            let agg = aggregation(&response, "composite")?;
            let page = agg_buckets(agg)?;
            if page.is_empty() {
                break;
            }
            let short = page.len() < self.page_size;
            for b in page {
                let key = b
                    .get("key")
                    .and_then(Value::as_object)
                    .cloned()
                    .ok_or_else(|| ExplorerError::protocol("composite bucket key"))?;
                all_buckets.push(CompositeBucket {
                    key,
                    doc_count: doc_count(b)?,
                });
            }
            debug!(page = all_buckets.len(), "Fetched bucket page");
            if short {
                break;
            }
            match agg.get("after_key") {
                Some(after) => body["aggs"]["composite"]["composite"]["after"] = after.clone(),
                None => break,
            }
        }
        Ok(all_buckets)
    }
}

fn aggregation<'a>(response: &'a Value, name: &str) -> Result<&'a Value> {
    response
        .get("aggregations")
        .and_then(|aggs| aggs.get(name))
        .ok_or_else(|| ExplorerError::protocol(format!("aggregation {}", name)))
}

fn agg_buckets(agg: &Value) -> Result<&Vec<Value>> {
    agg.get("buckets")
        .and_then(Value::as_array)
        .ok_or_else(|| ExplorerError::protocol("aggregation buckets"))
}

fn doc_count(bucket: &Value) -> Result<u64> {
    bucket
        .get("doc_count")
        .and_then(Value::as_u64)
        .ok_or_else(|| ExplorerError::protocol("bucket doc_count"))
}
