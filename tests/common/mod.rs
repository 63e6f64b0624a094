//! Common test utilities for search testing
//!
//! [`FakeBackend`] is an in-memory stand-in for the Sumo search API. It
//! understands the subset of the Elasticsearch query DSL the explorer emits
//! (`ids`, `term`, `terms`, `exists`, `range`, `bool`), `_source`
//! projections, `_doc` ordering with `search_after`, point-in-time handles,
//! and `terms` / `composite` / metric aggregations. Counters let tests assert
//! on how many requests were made.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use sumo_explorer::{Explorer, ExplorerError, Result, SearchBackend, SearchSettings};

/// Test document builder
#[derive(Debug, Clone)]
pub struct Doc {
    pub id: String,
    pub source: Value,
}

impl Doc {
    pub fn new(id: impl Into<String>, class: &str) -> Self {
        Self {
            id: id.into(),
            source: json!({ "class": class }),
        }
    }

    /// A case document; its id is its case uuid
    pub fn case(id: &str, name: &str) -> Self {
        Self::new(id, "case")
            .set("fmu.case.uuid", id)
            .set("fmu.case.name", name)
            .set("_sumo.status", "keep")
    }

    /// A child document of `case`
    pub fn child(id: impl Into<String>, class: &str, case: &str) -> Self {
        Self::new(id, class).set("fmu.case.uuid", case)
    }

    /// One realization of a surface
    pub fn surface(id: impl Into<String>, case: &str, iteration: &str, name: &str, real: i64) -> Self {
        Self::child(id, "surface", case)
            .set("data.name", name)
            .set("data.tagname", "ds_extract_geogrid")
            .set("data.content", "depth")
            .set("data.format", "irap_binary")
            .set("fmu.iteration.name", iteration)
            .set("fmu.realization.id", real)
    }

    pub fn set(mut self, path: &str, value: impl Into<Value>) -> Self {
        set_path(&mut self.source, path, value.into());
        self
    }

    pub fn unset(mut self, path: &str) -> Self {
        remove_path(&mut self.source, path);
        self
    }
}

#[derive(Default)]
pub struct FakeBackend {
    docs: RwLock<Vec<Doc>>,
    open_pits: Mutex<HashSet<String>>,
    pit_seq: AtomicUsize,
    searches: AtomicUsize,
    pits_opened: AtomicUsize,
    pits_closed: AtomicUsize,
    blob_fetches: AtomicUsize,
    search_bodies: Mutex<Vec<Value>>,
    aggregate_requests: Mutex<Vec<Value>>,
    fail_after: Mutex<Option<usize>>,
    fail_pit_searches: Mutex<bool>,
    permissions: Mutex<Value>,
}

impl FakeBackend {
    pub fn new(docs: Vec<Doc>) -> Arc<Self> {
        let backend = Self::default();
        *backend.docs.write() = docs;
        *backend.permissions.lock() = json!({});
        Arc::new(backend)
    }

    pub fn insert(&self, doc: Doc) {
        self.docs.write().push(doc);
    }

    pub fn searches(&self) -> usize {
        self.searches.load(AtomicOrdering::SeqCst)
    }

    pub fn pits_opened(&self) -> usize {
        self.pits_opened.load(AtomicOrdering::SeqCst)
    }

    pub fn pits_closed(&self) -> usize {
        self.pits_closed.load(AtomicOrdering::SeqCst)
    }

    pub fn open_pits(&self) -> usize {
        self.open_pits.lock().len()
    }

    pub fn blob_fetches(&self) -> usize {
        self.blob_fetches.load(AtomicOrdering::SeqCst)
    }

    pub fn search_bodies(&self) -> Vec<Value> {
        self.search_bodies.lock().clone()
    }

    pub fn aggregate_requests(&self) -> Vec<Value> {
        self.aggregate_requests.lock().clone()
    }

    /// Every search after the first `n` fails with a 503
    pub fn fail_searches_after(&self, n: usize) {
        *self.fail_after.lock() = Some(n);
    }

    /// Searches pinned to a point-in-time fail with a 503
    pub fn fail_pit_searches(&self) {
        *self.fail_pit_searches.lock() = true;
    }

    /// Clear injected failures
    pub fn heal(&self) {
        *self.fail_after.lock() = None;
        *self.fail_pit_searches.lock() = false;
    }

    pub fn set_permissions(&self, permissions: Value) {
        *self.permissions.lock() = permissions;
    }
}

#[async_trait]
impl SearchBackend for FakeBackend {
    async fn search(&self, body: &Value) -> Result<Value> {
        let n = self.searches.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        self.search_bodies.lock().push(body.clone());
        if matches!(*self.fail_after.lock(), Some(limit) if n > limit) {
            return Err(unavailable());
        }

        let pit = body.get("pit").and_then(|p| p.get("id")).and_then(Value::as_str);
        if let Some(pit) = pit {
            if *self.fail_pit_searches.lock() {
                return Err(unavailable());
            }
            if !self.open_pits.lock().contains(pit) {
                return Err(ExplorerError::Http {
                    status: 404,
                    body: format!("unknown point-in-time {}", pit),
                });
            }
        }

        let query = body.get("query").cloned().unwrap_or_else(|| json!({ "match_all": {} }));
        let docs = self.docs.read();
        let matched: Vec<(usize, &Doc)> = docs
            .iter()
            .enumerate()
            .filter(|(_, doc)| matches(&query, &doc.id, &doc.source))
            .collect();

        let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        let after = body
            .get("search_after")
            .and_then(|a| a.get(0))
            .and_then(Value::as_u64);
        let sort_keys = body
            .get("sort")
            .and_then(Value::as_array)
            .map_or(1, |s| s.len().max(1));
        let hits: Vec<Value> = matched
            .iter()
            .filter(|(pos, _)| after.map_or(true, |a| (*pos as u64) > a))
            .take(size)
            .map(|(pos, doc)| {
                let mut hit = json!({
                    "_id": doc.id,
                    "sort": vec![*pos; sort_keys],
                });
                if let Some(source) = project(&doc.source, body.get("_source")) {
                    hit["_source"] = source;
                }
                hit
            })
            .collect();

        let mut response = json!({
            "hits": {
                "total": { "value": matched.len(), "relation": "eq" },
                "hits": hits,
            }
        });
        if let Some(pit) = pit {
            response["pit_id"] = json!(pit);
        }
        if let Some(aggs) = body.get("aggs") {
            let sources: Vec<&Value> = matched.iter().map(|(_, doc)| &doc.source).collect();
            response["aggregations"] = run_aggs(aggs, &sources);
        }
        Ok(response)
    }

    async fn open_snapshot(&self, _keep_alive: &str) -> Result<String> {
        let id = format!("pit-{}", self.pit_seq.fetch_add(1, AtomicOrdering::SeqCst));
        self.pits_opened.fetch_add(1, AtomicOrdering::SeqCst);
        self.open_pits.lock().insert(id.clone());
        Ok(id)
    }

    async fn close_snapshot(&self, id: &str) -> Result<()> {
        self.pits_closed.fetch_add(1, AtomicOrdering::SeqCst);
        self.open_pits.lock().remove(id);
        Ok(())
    }

    async fn aggregate(&self, request: &Value) -> Result<Bytes> {
        self.aggregate_requests.lock().push(request.clone());
        let members = request["object_ids"].as_array().map_or(0, Vec::len);
        let operations: Vec<String> = request["operation"]
            .as_array()
            .map(|ops| ops.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let payload = |op: &str| format!("{}:{}", op, members).into_bytes();

        if operations.len() == 1 {
            return Ok(Bytes::from(payload(&operations[0])));
        }
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for op in &operations {
            writer
                .start_file(format!("{}.bin", op), zip::write::SimpleFileOptions::default())
                .map_err(|e| ExplorerError::Archive(e.to_string()))?;
            writer.write_all(&payload(op))?;
        }
        let archive = writer
            .finish()
            .map_err(|e| ExplorerError::Archive(e.to_string()))?;
        Ok(Bytes::from(archive.into_inner()))
    }

    async fn blob(&self, id: &str) -> Result<Bytes> {
        self.blob_fetches.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(Bytes::from(format!("blob:{}", id)))
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        match path {
            "/userpermissions" => Ok(self.permissions.lock().clone()),
            other => Err(ExplorerError::Http {
                status: 404,
                body: format!("no resource {}", other),
            }),
        }
    }
}

fn unavailable() -> ExplorerError {
    ExplorerError::Http {
        status: 503,
        body: "Service Unavailable".to_string(),
    }
}

/// Settings with small pages so tests exercise deep pagination cheaply
pub fn settings() -> SearchSettings {
    SearchSettings {
        page_size: 1000,
        bucket_page_size: 1000,
        cache_capacity: 200,
        prefetch_window: 100,
        snapshot_keep_alive: "1m".to_string(),
        interval_bucket_size: 50,
    }
}

pub fn explorer(backend: &Arc<FakeBackend>) -> Explorer {
    Explorer::with_backend(backend.clone(), settings())
}

/// One case with `realizations` realizations of `name` in `iteration`
pub fn ensemble(case: &str, iteration: &str, name: &str, realizations: i64) -> Vec<Doc> {
    (0..realizations)
        .map(|r| Doc::surface(format!("{}-{}-{}-{}", case, iteration, name, r), case, iteration, name, r))
        .collect()
}

// ---- query evaluation ----

fn first_entry(value: &Value) -> Option<(&String, &Value)> {
    value.as_object().and_then(|o| o.iter().next())
}

fn matches(query: &Value, id: &str, source: &Value) -> bool {
    let Some((kind, arg)) = first_entry(query) else {
        return true;
    };
    match kind.as_str() {
        "match_all" => true,
        "ids" => arg["values"]
            .as_array()
            .map_or(false, |values| values.iter().any(|v| v == id)),
        "term" => first_entry(arg).map_or(false, |(field, value)| {
            let value = value.get("value").unwrap_or(value);
            values_at(source, field).iter().any(|v| v == value)
        }),
        "terms" => first_entry(arg).map_or(false, |(field, wanted)| {
            let present = values_at(source, field);
            wanted
                .as_array()
                .map_or(false, |wanted| wanted.iter().any(|w| present.contains(w)))
        }),
        "exists" => arg["field"]
            .as_str()
            .map_or(false, |field| !values_at(source, field).is_empty()),
        "range" => first_entry(arg).map_or(false, |(field, bounds)| {
            values_at(source, field).iter().any(|v| in_range(v, bounds))
        }),
        "bool" => {
            let clauses = |key: &str| arg.get(key).and_then(Value::as_array).cloned().unwrap_or_default();
            let all = |key: &str| clauses(key).iter().all(|c| matches(c, id, source));
            let none = clauses("must_not").iter().all(|c| !matches(c, id, source));
            let should = clauses("should");
            let should_ok = should.is_empty() || {
                let min = arg["minimum_should_match"].as_u64().unwrap_or(1) as usize;
                should.iter().filter(|c| matches(c, id, source)).count() >= min
            };
            all("must") && all("filter") && none && should_ok
        }
        other => panic!("FakeBackend does not understand query {}", other),
    }
}

fn in_range(value: &Value, bounds: &Value) -> bool {
    let check = |op: &str, accept: &dyn Fn(Ordering) -> bool| {
        bounds.get(op).map_or(true, |b| accept(cmp_values(value, b)))
    };
    check("gte", &|o| o != Ordering::Less)
        && check("gt", &|o| o == Ordering::Greater)
        && check("lte", &|o| o != Ordering::Greater)
        && check("lt", &|o| o == Ordering::Less)
}

pub fn cmp_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn push_flat<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| push_flat(item, out)),
        Value::Null => {}
        other => out.push(other),
    }
}

/// Every value at a dotted path, descending through arrays
pub fn values_at(source: &Value, field: &str) -> Vec<Value> {
    let path = field.strip_suffix(".keyword").unwrap_or(field);
    let mut current = vec![source];
    for key in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            if let Some(child) = value.get(key) {
                push_flat(child, &mut next);
            }
        }
        current = next;
    }
    current.into_iter().cloned().collect()
}

fn set_path(target: &mut Value, path: &str, value: Value) {
    let mut current = target;
    let mut keys = path.split('.').peekable();
    while let Some(key) = keys.next() {
        if !current.is_object() {
            *current = json!({});
        }
        let Some(object) = current.as_object_mut() else {
            return;
        };
        if keys.peek().is_none() {
            object.insert(key.to_string(), value);
            return;
        }
        current = object.entry(key.to_string()).or_insert_with(|| json!({}));
    }
}

fn remove_path(target: &mut Value, path: &str) {
    match path.rsplit_once('.') {
        Some((parent, leaf)) => {
            let mut current = target;
            for key in parent.split('.') {
                match current.get_mut(key) {
                    Some(next) => current = next,
                    None => return,
                }
            }
            if let Some(object) = current.as_object_mut() {
                object.remove(leaf);
            }
        }
        None => {
            if let Some(object) = target.as_object_mut() {
                object.remove(path);
            }
        }
    }
}

fn get_path<'a>(source: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(source, |current, key| current.get(key))
}

fn project(source: &Value, spec: Option<&Value>) -> Option<Value> {
    match spec {
        None | Some(Value::Bool(true)) => Some(source.clone()),
        Some(Value::Bool(false)) => None,
        Some(Value::Array(fields)) => {
            let mut out = json!({});
            for field in fields.iter().filter_map(Value::as_str) {
                if let Some(value) = get_path(source, field) {
                    set_path(&mut out, field, value.clone());
                }
            }
            Some(out)
        }
        Some(Value::Object(spec)) => {
            let mut out = source.clone();
            let excludes = spec.get("excludes").and_then(Value::as_array);
            for field in excludes.into_iter().flatten().filter_map(Value::as_str) {
                remove_path(&mut out, field);
            }
            Some(out)
        }
        Some(other) => panic!("FakeBackend does not understand _source {}", other),
    }
}

// ---- aggregations ----

fn run_aggs(aggs: &Value, docs: &[&Value]) -> Value {
    let mut out = Map::new();
    for (name, spec) in aggs.as_object().into_iter().flatten() {
        out.insert(name.clone(), run_agg(spec, docs));
    }
    Value::Object(out)
}

fn group_by<'a>(docs: &[&'a Value], key_of: impl Fn(&Value) -> Vec<Value>) -> Vec<(Value, Vec<&'a Value>)> {
    let mut groups: HashMap<String, (Value, Vec<&'a Value>)> = HashMap::new();
    for &doc in docs {
        let mut seen = HashSet::new();
        for key in key_of(doc) {
            if seen.insert(key.to_string()) {
                groups
                    .entry(key.to_string())
                    .or_insert_with(|| (key.clone(), Vec::new()))
                    .1
                    .push(doc);
            }
        }
    }
    groups.into_values().collect()
}

fn run_agg(spec: &Value, docs: &[&Value]) -> Value {
    if let Some(terms) = spec.get("terms") {
        let field = terms["field"].as_str().unwrap_or_default();
        let size = terms.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        let mut groups = group_by(docs, |doc| values_at(doc, field));
        groups.sort_by(|(ka, da), (kb, db)| db.len().cmp(&da.len()).then_with(|| cmp_values(ka, kb)));

        let other: usize = groups.iter().skip(size).map(|(_, d)| d.len()).sum();
        let buckets: Vec<Value> = groups
            .iter()
            .take(size)
            .map(|(key, members)| {
                let mut bucket = json!({ "key": key, "doc_count": members.len() });
                if let Some(sub) = spec.get("aggs") {
                    if let (Some(bucket), Value::Object(sub)) = (bucket.as_object_mut(), run_aggs(sub, members)) {
                        bucket.extend(sub);
                    }
                }
                bucket
            })
            .collect();
        return json!({
            "doc_count_error_upper_bound": 0,
            "sum_other_doc_count": other,
            "buckets": buckets,
        });
    }

    if let Some(composite) = spec.get("composite") {
        let size = composite.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
        let sources: Vec<(String, String)> = composite["sources"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|s| {
                let (name, spec) = first_entry(s)?;
                Some((name.clone(), spec["terms"]["field"].as_str()?.to_string()))
            })
            .collect();

        let mut groups = group_by(docs, |doc| {
            let mut keys: Vec<Vec<Value>> = vec![Vec::new()];
            for (_, field) in &sources {
                let values = values_at(doc, field);
                keys = keys
                    .into_iter()
                    .flat_map(|prefix| {
                        values.iter().map(move |v| {
                            let mut key = prefix.clone();
                            key.push(v.clone());
                            key
                        })
                    })
                    .collect();
            }
            keys.into_iter().map(Value::Array).collect()
        });
        let cmp_keys = |a: &Value, b: &Value| {
            let (a, b) = (a.as_array().cloned().unwrap_or_default(), b.as_array().cloned().unwrap_or_default());
            a.iter()
                .zip(b.iter())
                .map(|(x, y)| cmp_values(x, y))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        };
        groups.sort_by(|(a, _), (b, _)| cmp_keys(a, b));

        let after: Option<Value> = composite.get("after").map(|after| {
            Value::Array(sources.iter().map(|(name, _)| after[name].clone()).collect())
        });
        let page: Vec<Value> = groups
            .iter()
            .filter(|(key, _)| after.as_ref().map_or(true, |a| cmp_keys(key, a) == Ordering::Greater))
            .take(size)
            .map(|(key, members)| {
                let mut named = Map::new();
                for ((name, _), value) in sources.iter().zip(key.as_array().into_iter().flatten()) {
                    named.insert(name.clone(), value.clone());
                }
                json!({ "key": named, "doc_count": members.len() })
            })
            .collect();

        let mut result = json!({ "buckets": page });
        if let Some(last) = page.last() {
            result["after_key"] = last["key"].clone();
        }
        return result;
    }

    let (kind, arg) = first_entry(spec).expect("aggregation kind");
    let field = arg["field"].as_str().unwrap_or_default();
    let values: Vec<Value> = docs.iter().flat_map(|doc| values_at(doc, field)).collect();
    let numbers: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
    let sum: f64 = numbers.iter().sum();
    let min = numbers.iter().cloned().fold(None, |m: Option<f64>, x| Some(m.map_or(x, |m| m.min(x))));
    let max = numbers.iter().cloned().fold(None, |m: Option<f64>, x| Some(m.map_or(x, |m| m.max(x))));
    let avg = (!numbers.is_empty()).then(|| sum / numbers.len() as f64);
    match kind.as_str() {
        "min" => json!({ "value": min }),
        "max" => json!({ "value": max }),
        "avg" => json!({ "value": avg }),
        "sum" => json!({ "value": sum }),
        "value_count" => json!({ "value": values.len() }),
        "cardinality" => {
            let distinct: HashSet<String> = values.iter().map(Value::to_string).collect();
            json!({ "value": distinct.len() })
        }
        "stats" => json!({ "count": numbers.len(), "min": min, "max": max, "avg": avg, "sum": sum }),
        other => panic!("FakeBackend does not understand aggregation {}", other),
    }
}
