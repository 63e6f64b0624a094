//! Lazy, filterable, cached view of a backend query

use crate::client::SearchBackend;
use crate::config::SearchSettings;
use crate::error::{ExplorerError, Result};
use crate::objects::{
    Case, Cube, Dictionary, Document, ObjectParts, Polygons, Surface, SumoObject, Table,
};
use crate::search::buckets::BucketEnumerator;
use crate::search::cache::ResultCache;
use crate::search::filters::Filter;
use crate::search::metrics::Metrics;
use crate::search::paginator::{take_hits, total_hits, Paginator, Projection};
use crate::search::query::{ids_clause, Query};
use chrono::DateTime;
use futures::stream::{self, Stream};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Field shared by a case and every document it owns
pub const PARENT_ID_FIELD: &str = "fmu.case.uuid.keyword";

/// Fields left out of read-ahead batches; they can be very large
const PREFETCH_EXCLUDES: [&str; 2] = ["data.spec.columns", "fmu.realization.parameters"];

const TIMESTAMP_FIELD: &str = "data.time.t0.value";
const INTERVAL_END_FIELD: &str = "data.time.t1.value";

macro_rules! bucket_properties {
    ($($name:ident => $field:literal),* $(,)?) => {
        $(
            #[doc = concat!("Distinct values of `", $field, "`")]
            pub async fn $name(&self) -> Result<Vec<Value>> {
                self.field_values($field).await
            }
        )*
    };
}

macro_rules! class_contexts {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            #[doc = concat!("Narrow to ", stringify!($name))]
            pub fn $name(&self) -> SearchContext {
                self.for_class($kind::CLASS)
            }
        )*
    };
}

/// A set of accumulated filter clauses plus lazily resolved results.
///
/// The clause lists never change after construction; [`SearchContext::filter`]
/// returns a new context. The id list, count and per-field values are each
/// resolved at most once per instance and are not refreshed afterwards.
pub struct SearchContext {
    backend: Arc<dyn SearchBackend>,
    settings: Arc<SearchSettings>,
    query: Query,
    hits: OnceCell<Vec<String>>,
    length: Mutex<Option<u64>>,
    field_values: Mutex<HashMap<String, Vec<Value>>>,
    cache: Mutex<ResultCache<String, Document>>,
}

impl SearchContext {
    /// Context matching every document
    pub fn new(backend: Arc<dyn SearchBackend>, settings: Arc<SearchSettings>) -> Self {
        Self::with_query(backend, settings, Query::match_all())
    }

    pub fn with_query(
        backend: Arc<dyn SearchBackend>,
        settings: Arc<SearchSettings>,
        query: Query,
    ) -> Self {
        let capacity = settings.cache_capacity;
        Self {
            backend,
            settings,
            query,
            hits: OnceCell::new(),
            length: Mutex::new(None),
            field_values: Mutex::new(HashMap::new()),
            cache: Mutex::new(ResultCache::new(capacity)),
        }
    }

    fn derive(&self, query: Query) -> Self {
        Self::with_query(self.backend.clone(), self.settings.clone(), query)
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn backend(&self) -> &Arc<dyn SearchBackend> {
        &self.backend
    }

    pub fn settings(&self) -> &Arc<SearchSettings> {
        &self.settings
    }

    /// Narrow the context without network access; rejects `has`
    pub fn refine(&self, filter: &Filter) -> Result<SearchContext> {
        if filter.has_predicate()?.is_some() {
            return Err(ExplorerError::Configuration(
                "has must be resolved with filter()".to_string(),
            ));
        }
        let (must, must_not) = filter.compile()?;
        Ok(self.derive(self.query.extend(must, must_not)))
    }

    /// Narrow the context.
    ///
    /// With a `has` predicate the result is a context over the parent (case)
    /// documents that match this context and also own a document matching
    /// the predicate.
    pub async fn filter(&self, filter: &Filter) -> Result<SearchContext> {
        let (must, must_not) = filter.compile()?;
        let narrowed = self.derive(self.query.extend(must, must_not));

        let Some(predicate) = filter.has_predicate()? else {
            return Ok(narrowed);
        };

        // `has` contributes no clause of its own; parents come from the rest.
        let parents = string_values(narrowed.field_values(PARENT_ID_FIELD).await?);

        let owning = self.derive(Query::new(
            vec![json!({ "terms": { PARENT_ID_FIELD: parents } }), predicate],
            Vec::new(),
        ));
        let owning: HashSet<String> =
            string_values(owning.field_values(PARENT_ID_FIELD).await?)
                .into_iter()
                .collect();

        let matched: Vec<String> = parents
            .into_iter()
            .filter(|id| owning.contains(id))
            .collect();
        debug!(parents = matched.len(), "Resolved has filter");
        Ok(self.derive(Query::new(vec![ids_clause(&matched)], Vec::new())))
    }

    /// Number of matching documents
    pub async fn length(&self) -> Result<u64> {
        if let Some(hits) = self.hits.get() {
            return Ok(hits.len() as u64);
        }
        if let Some(length) = *self.length.lock() {
            return Ok(length);
        }
        let body = json!({
            "query": self.query.to_json(),
            "size": 0,
            "track_total_hits": true,
        });
        let response = self.backend.search(&body).await?;
        let length = total_hits(&response)?;
        *self.length.lock() = Some(length);
        Ok(length)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.length().await? == 0)
    }

    /// Ids of every matching document, resolved once
    pub async fn uuids(&self) -> Result<&[String]> {
        let hits = self
            .hits
            .get_or_try_init(|| async {
                let mut paginator =
                    Paginator::new(self.backend.clone(), self.settings.snapshot_keep_alive.clone());
                let ids = paginator
                    .ids(&self.query.to_json(), self.settings.page_size)
                    .await?;
                debug!(count = ids.len(), "Resolved matching ids");
                Ok::<_, ExplorerError>(ids)
            })
            .await?;
        Ok(hits)
    }

    /// Document by id, served from the cache when possible
    pub async fn get_object(&self, id: &str) -> Result<Document> {
        if let Some(document) = self.cache.lock().get(&id.to_string()) {
            return Ok(document);
        }
        let body = json!({
            "query": ids_clause(&[id]),
            "size": 1,
        });
        let response = self.backend.search(&body).await?;
        let hit = take_hits(response)?
            .into_iter()
            .next()
            .ok_or_else(|| ExplorerError::NotFound(id.to_string()))?;
        let document = Document::from_hit(&hit)?;
        self.cache.lock().put(id.to_string(), document.clone());
        Ok(document)
    }

    /// Bulk fetch by id; results are not cached
    pub async fn get_objects(&self, ids: &[String], projection: &Projection) -> Result<Vec<Value>> {
        let mut paginator =
            Paginator::new(self.backend.clone(), self.settings.snapshot_keep_alive.clone());
        paginator
            .search_all(&ids_clause(ids), projection.page_size(), projection)
            .await
    }

    /// Typed object at `index` of the id list. No read-ahead.
    pub async fn get(&self, index: usize) -> Result<SumoObject> {
        let id = self.id_at(index).await?;
        let document = self.get_object(&id).await?;
        self.to_object(document)
    }

    async fn id_at(&self, index: usize) -> Result<String> {
        let ids = self.uuids().await?;
        ids.get(index).cloned().ok_or_else(|| {
            ExplorerError::NotFound(format!("index {} of {} results", index, ids.len()))
        })
    }

    pub(crate) fn to_object(&self, document: Document) -> Result<SumoObject> {
        SumoObject::from_parts(ObjectParts {
            backend: self.backend.clone(),
            settings: self.settings.clone(),
            document,
            blob: None,
        })
    }

    /// Read ahead the uncached ids of `[index, index + window)`.
    ///
    /// Failures are logged and otherwise ignored.
    pub(crate) async fn prefetch(&self, index: usize) {
        let batch: Vec<String> = match self.uuids().await {
            Ok(ids) => {
                let cache = self.cache.lock();
                if ids.get(index).map_or(true, |id| cache.has(id)) {
                    return;
                }
                ids.iter()
                    .skip(index)
                    .take(self.settings.prefetch_window)
                    .filter(|id| !cache.has(id))
                    .cloned()
                    .collect()
            }
            Err(_) => return,
        };
        let projection =
            Projection::Exclude(PREFETCH_EXCLUDES.iter().map(|f| f.to_string()).collect());
        let mut paginator =
            Paginator::new(self.backend.clone(), self.settings.snapshot_keep_alive.clone());
        match paginator
            .search_all(&ids_clause(&batch), self.settings.page_size, &projection)
            .await
        {
            Ok(hits) => {
                let mut cache = self.cache.lock();
                for hit in &hits {
                    if let Ok(document) = Document::from_hit(hit) {
                        cache.put(document.id().to_string(), document);
                    }
                }
                debug!(index = index, fetched = hits.len(), "Prefetched documents");
            }
            Err(e) => warn!(index = index, error = %e, "Prefetch failed"),
        }
    }

    /// Sequential cursor with read-ahead
    pub fn cursor(&self) -> ContextCursor<'_> {
        ContextCursor {
            context: self,
            index: 0,
        }
    }

    /// Every matching object as a stream, with read-ahead
    pub fn stream(&self) -> impl Stream<Item = Result<SumoObject>> + '_ {
        stream::unfold(self.cursor(), |mut cursor| async move {
            cursor.next().await.map(|item| (item, cursor))
        })
    }

    /// Distinct values of `field` among matching documents, resolved once per field
    pub async fn field_values(&self, field: &str) -> Result<Vec<Value>> {
        if let Some(values) = self.field_values.lock().get(field) {
            return Ok(values.clone());
        }
        let enumerator = BucketEnumerator::new(
            self.backend.clone(),
            self.settings.snapshot_keep_alive.clone(),
            self.settings.bucket_page_size,
        );
        let values: Vec<Value> = enumerator
            .buckets(&self.query.to_json(), field)
            .await?
            .into_iter()
            .map(|bucket| bucket.key)
            .collect();
        self.field_values
            .lock()
            .insert(field.to_string(), values.clone());
        Ok(values)
    }

    bucket_properties! {
        names => "data.name.keyword",
        tagnames => "data.tagname.keyword",
        dataformats => "data.format.keyword",
        iterations => "fmu.iteration.name.keyword",
        realizations => "fmu.realization.id",
        aggregations => "fmu.aggregation.operation.keyword",
        stages => "fmu.context.stage.keyword",
        vertical_domains => "data.vertical_domain.keyword",
        contents => "data.content.keyword",
        columns => "data.spec.columns.keyword",
        users => "fmu.case.user.id.keyword",
        assets => "access.asset.name.keyword",
        fields => "masterdata.smda.field.identifier.keyword",
        statuses => "_sumo.status.keyword",
        classes => "class.keyword",
    }

    /// Distinct point-in-time stamps (documents with a start and no end)
    pub async fn timestamps(&self) -> Result<Vec<String>> {
        let scoped = self.derive(self.query.extend(
            vec![json!({ "exists": { "field": "data.time.t0" } })],
            vec![json!({ "exists": { "field": "data.time.t1" } })],
        ));
        scoped
            .field_values(TIMESTAMP_FIELD)
            .await?
            .iter()
            .map(epoch_millis_to_iso)
            .collect()
    }

    /// Distinct `(start, end)` pairs of matching documents
    pub async fn intervals(&self) -> Result<Vec<(String, String)>> {
        let size = self.settings.interval_bucket_size;
        let body = json!({
            "query": self.query.to_json(),
            "size": 0,
            "aggs": {
                "t0": {
                    "terms": { "field": TIMESTAMP_FIELD, "size": size },
                    "aggs": { "t1": { "terms": { "field": INTERVAL_END_FIELD, "size": size } } },
                },
            },
        });
        let response = self.backend.search(&body).await?;
        extract_intervals(&response)
    }

    fn for_class(&self, class: &str) -> SearchContext {
        self.derive(
            self.query
                .extend(vec![json!({ "term": { "class.keyword": class } })], Vec::new()),
        )
    }

    class_contexts! {
        cases => Case,
        surfaces => Surface,
        tables => Table,
        cubes => Cube,
        polygons => Polygons,
        dictionaries => Dictionary,
    }

    /// Statistics over a numeric field of the matching documents
    pub fn metrics(&self) -> Metrics<'_> {
        Metrics::new(self)
    }
}

impl std::fmt::Debug for SearchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchContext")
            .field("query", &self.query)
            .field("resolved", &self.hits.initialized())
            .finish()
    }
}

/// Cooperative iteration over a context
pub struct ContextCursor<'a> {
    context: &'a SearchContext,
    index: usize,
}

impl<'a> ContextCursor<'a> {
    pub fn position(&self) -> usize {
        self.index
    }

    /// Next object, or `None` past the end
    pub async fn next(&mut self) -> Option<Result<SumoObject>> {
        let ids = match self.context.uuids().await {
            Ok(ids) => ids,
            Err(e) => return Some(Err(e)),
        };
        let id = ids.get(self.index)?.clone();
        self.context.prefetch(self.index).await;
        self.index += 1;
        Some(
            self.context
                .get_object(&id)
                .await
                .and_then(|document| self.context.to_object(document)),
        )
    }
}

fn string_values(values: Vec<Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

fn epoch_millis_to_iso(value: &Value) -> Result<String> {
    let millis = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .ok_or_else(|| ExplorerError::protocol("timestamp bucket key"))?;
    let stamp = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| ExplorerError::Protocol(format!("timestamp out of range: {}", millis)))?;
    Ok(stamp.naive_utc().format("%Y-%m-%dT%H:%M:%S").to_string())
}

fn key_string(bucket: &Value) -> Result<String> {
    if let Some(s) = bucket.get("key_as_string").and_then(Value::as_str) {
        return Ok(s.to_string());
    }
    bucket
        .get("key")
        .map(epoch_millis_to_iso)
        .unwrap_or_else(|| Err(ExplorerError::protocol("bucket key")))
}

fn extract_intervals(response: &Value) -> Result<Vec<(String, String)>> {
    let starts = response["aggregations"]["t0"]["buckets"]
        .as_array()
        .ok_or_else(|| ExplorerError::protocol("aggregation t0"))?;
    let mut intervals = Vec::new();
    for start in starts {
        let t0 = key_string(start)?;
        let ends = start["t1"]["buckets"]
            .as_array()
            .ok_or_else(|| ExplorerError::protocol("aggregation t1"))?;
        for end in ends {
            intervals.push((t0.clone(), key_string(end)?));
        }
    }
    Ok(intervals)
}
