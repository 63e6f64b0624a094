//! Case documents and their contents

use crate::client::SearchBackend;
use crate::config::SearchSettings;
use crate::error::{ExplorerError, Result};
use crate::objects::document::Document;
use crate::search::{Query, SearchContext, PARENT_ID_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Summary of one iteration of a case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationSummary {
    pub names: Vec<String>,
    pub min_realization: Option<f64>,
    pub max_realization: Option<f64>,
    pub realization_count: u64,
}

/// What a case contains, keyed by iteration uuid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseOverview {
    pub iteration_names: Vec<String>,
    pub iteration_uuids: Vec<String>,
    pub data_types: Vec<String>,
    pub iterations: BTreeMap<String, IterationSummary>,
}

/// A case: metadata plus a search context over every document it owns
pub struct Case {
    document: Document,
    context: SearchContext,
    overview: OnceCell<CaseOverview>,
}

impl Case {
    pub const CLASS: &'static str = "case";

    pub(crate) fn new(
        backend: Arc<dyn SearchBackend>,
        settings: Arc<SearchSettings>,
        document: Document,
    ) -> Self {
        let query = Query::new(
            vec![json!({ "term": { PARENT_ID_FIELD: document.id() } })],
            Vec::new(),
        );
        Self {
            context: SearchContext::with_query(backend, settings, query),
            document,
            overview: OnceCell::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn uuid(&self) -> &str {
        self.document.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.document.get_str("fmu.case.name")
    }

    pub fn status(&self) -> Option<&str> {
        self.document.get_str("_sumo.status")
    }

    pub fn user(&self) -> Option<&str> {
        self.document.get_str("fmu.case.user.id")
    }

    pub fn asset(&self) -> Option<&str> {
        self.document.get_str("access.asset.name")
    }

    pub fn field(&self) -> Option<&str> {
        self.document.get_str("masterdata.smda.field[0].identifier")
    }

    /// Search context restricted to this case
    pub fn context(&self) -> &SearchContext {
        &self.context
    }

    /// Iterations, data classes and realization ranges, computed once
    pub async fn overview(&self) -> Result<&CaseOverview> {
        self.overview
            .get_or_try_init(|| async {
                let response = self
                    .context
                    .backend()
                    .search(&overview_query(self.uuid()))
                    .await?;
                parse_overview(&response)
            })
            .await
    }
}

impl std::fmt::Debug for Case {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Case").field("document", &self.document).finish()
    }
}

fn overview_query(uuid: &str) -> Value {
    let terms = |field: &str| json!({ "terms": { "field": field, "size": 100 } });
    json!({
        "size": 0,
        "query": { "term": { PARENT_ID_FIELD: uuid } },
        "aggs": {
            "iteration_uuids": terms("fmu.iteration.uuid.keyword"),
            "iteration_names": terms("fmu.iteration.name.keyword"),
            "data_types": terms("class.keyword"),
            "iterations": {
                "terms": { "field": "fmu.iteration.uuid.keyword", "size": 100 },
                "aggs": {
                    "iteration_name": terms("fmu.iteration.name.keyword"),
                    "numreal": { "cardinality": { "field": "fmu.realization.id" } },
                    "maxreal": { "max": { "field": "fmu.realization.id" } },
                    "minreal": { "min": { "field": "fmu.realization.id" } },
                },
            },
        },
    })
}

fn bucket_keys(aggs: &Value, name: &str) -> Result<Vec<String>> {
    let buckets = aggs[name]["buckets"]
        .as_array()
        .ok_or_else(|| ExplorerError::protocol(format!("aggregation {}", name)))?;
    Ok(buckets
        .iter()
        .filter_map(|b| b.get("key").and_then(Value::as_str))
        .map(str::to_string)
        .collect())
}

fn parse_overview(response: &Value) -> Result<CaseOverview> {
    let aggs = response
        .get("aggregations")
        .ok_or_else(|| ExplorerError::protocol("aggregations"))?;

    let mut iterations = BTreeMap::new();
    let buckets = aggs["iterations"]["buckets"]
        .as_array()
        .ok_or_else(|| ExplorerError::protocol("aggregation iterations"))?;
    for bucket in buckets {
        let Some(uuid) = bucket.get("key").and_then(Value::as_str) else {
            continue;
        };
        iterations.insert(
            uuid.to_string(),
            IterationSummary {
                names: bucket_keys(bucket, "iteration_name")?,
                min_realization: bucket["minreal"]["value"].as_f64(),
                max_realization: bucket["maxreal"]["value"].as_f64(),
                realization_count: bucket["numreal"]["value"].as_u64().unwrap_or(0),
            },
        );
    }

    Ok(CaseOverview {
        iteration_names: bucket_keys(aggs, "iteration_names")?,
        iteration_uuids: bucket_keys(aggs, "iteration_uuids")?,
        data_types: bucket_keys(aggs, "data_types")?,
        iterations,
    })
}
