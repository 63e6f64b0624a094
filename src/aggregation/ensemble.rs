//! Server-side statistical aggregation across the realizations of an ensemble

use crate::aggregation::archive;
use crate::error::{ExplorerError, Result};
use crate::objects::{Document, ObjectParts, SumoObject};
use crate::search::{hit_id, Filter, Paginator, Projection, SearchContext};
use bytes::Bytes;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

/// Operations the aggregation service understands
pub const OPERATIONS: [&str; 9] = [
    "mean",
    "min",
    "max",
    "std",
    "var",
    "p10",
    "p50",
    "p90",
    "collection",
];

/// Fields every member of an aggregation must agree on, by display name
const HOMOGENEOUS_FIELDS: [(&str, &str); 6] = [
    ("case", "fmu.case.uuid.keyword"),
    ("class", "class.keyword"),
    ("iteration", "fmu.iteration.name.keyword"),
    ("name", "data.name.keyword"),
    ("tagname", "data.tagname.keyword"),
    ("content", "data.content.keyword"),
];

const REALIZATION_ID: &str = "fmu.realization.id";

/// Sections of the prototype metadata that do not carry over to an aggregate.
/// `fmu.case` stays so the aggregate is still found under its case.
const STRIPPED_SECTIONS: [&str; 3] = ["_sumo", "file", "access"];

pub struct EnsembleAggregator<'a> {
    context: &'a SearchContext,
}

impl<'a> EnsembleAggregator<'a> {
    pub fn new(context: &'a SearchContext) -> Self {
        Self { context }
    }

    /// Verify the context selects one homogeneous family of realization objects
    pub async fn check(&self) -> Result<()> {
        if self.context.length().await? == 0 {
            return Err(ExplorerError::Composition(
                "No documents to aggregate".to_string(),
            ));
        }

        let mut conflicts = Vec::new();
        for (name, field) in HOMOGENEOUS_FIELDS {
            let values = self.context.field_values(field).await?.len();
            if values > 1 || (values == 1 && self.missing(field).await? > 0) {
                conflicts.push(name.to_string());
            }
        }
        if !conflicts.is_empty() {
            return Err(ExplorerError::Conflict { fields: conflicts });
        }

        let without_realization = self
            .context
            .refine(&Filter::new().realization(false))?
            .length()
            .await?;
        if without_realization > 0 {
            return Err(ExplorerError::Composition(format!(
                "{} document(s) have no realization id",
                without_realization
            )));
        }

        let aggregated = self
            .context
            .refine(&Filter::new().aggregation(true))?
            .length()
            .await?;
        if aggregated > 0 {
            return Err(ExplorerError::Composition(format!(
                "{} document(s) are already aggregates",
                aggregated
            )));
        }
        Ok(())
    }

    /// Aggregate with one operation, optionally restricted to `columns`
    pub async fn aggregate(&self, columns: Option<&[String]>, operation: &str) -> Result<SumoObject> {
        let mut objects = self.aggregate_many(columns, &[operation]).await?;
        objects
            .pop()
            .ok_or_else(|| ExplorerError::protocol("aggregation result"))
    }

    /// Aggregate with several operations in one request; one object per operation
    pub async fn aggregate_many(
        &self,
        columns: Option<&[String]>,
        operations: &[&str],
    ) -> Result<Vec<SumoObject>> {
        validate_operations(operations)?;
        self.check().await?;

        let members = self.members().await?;
        let object_ids: Vec<&str> = members.iter().map(|(id, _)| id.as_str()).collect();
        let realization_ids: Vec<i64> = members.iter().map(|(_, rid)| *rid).collect();
        let first = object_ids
            .first()
            .ok_or_else(|| ExplorerError::Composition("No documents to aggregate".to_string()))?;
        let prototype = self.context.get_object(first).await?;

        let mut request = json!({
            "object_ids": object_ids,
            "operation": operations,
        });
        if let Some(columns) = columns {
            request["columns"] = json!(columns);
        }
        info!(
            members = object_ids.len(),
            operations = ?operations,
            "Requesting aggregation"
        );
        let payload = self.context.backend().aggregate(&request).await?;

        let blobs = if operations.len() == 1 {
            vec![payload]
        } else {
            let mut entries = archive::unpack(&payload)?;
            operations
                .iter()
                .map(|op| {
                    entries.remove(*op).ok_or_else(|| {
                        ExplorerError::Archive(format!("no entry for operation {}", op))
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };

        operations
            .iter()
            .zip(blobs)
            .map(|(op, blob)| -> Result<SumoObject> {
                let document = derived_document(&prototype, &realization_ids, op, columns)?;
                debug!(id = %document.id(), operation = *op, "Built aggregated object");
                self.wrap(document, blob)
            })
            .collect()
    }

    /// Members lacking `field`
    async fn missing(&self, field: &str) -> Result<u64> {
        let absent = json!({ "bool": { "must_not": [{ "exists": { "field": field } }] } });
        self.context
            .refine(&Filter::new().complex(absent))?
            .length()
            .await
    }

    /// `(id, realization id)` of every member, in index order
    async fn members(&self) -> Result<Vec<(String, i64)>> {
        let settings = self.context.settings();
        let mut paginator = Paginator::new(
            self.context.backend().clone(),
            settings.snapshot_keep_alive.clone(),
        );
        let hits = paginator
            .search_all(
                &self.context.query().to_json(),
                settings.page_size,
                &Projection::Fields(vec![REALIZATION_ID.to_string()]),
            )
            .await?;
        hits.iter()
            .map(|hit| -> Result<(String, i64)> {
                let id = hit_id(hit)?;
                let rid = hit["_source"]["fmu"]["realization"]["id"]
                    .as_i64()
                    .ok_or_else(|| {
                        ExplorerError::Composition(format!("{} has no realization id", id))
                    })?;
                Ok((id, rid))
            })
            .collect()
    }

    fn wrap(&self, document: Document, blob: Bytes) -> Result<SumoObject> {
        SumoObject::from_parts(ObjectParts {
            backend: self.context.backend().clone(),
            settings: self.context.settings().clone(),
            document,
            blob: Some(blob),
        })
    }

    #[deprecated(note = "use aggregate(columns, \"min\")")]
    pub async fn min(&self) -> Result<SumoObject> {
        self.aggregate(None, "min").await
    }

    #[deprecated(note = "use aggregate(columns, \"max\")")]
    pub async fn max(&self) -> Result<SumoObject> {
        self.aggregate(None, "max").await
    }

    #[deprecated(note = "use aggregate(columns, \"mean\")")]
    pub async fn mean(&self) -> Result<SumoObject> {
        self.aggregate(None, "mean").await
    }

    #[deprecated(note = "use aggregate(columns, \"std\")")]
    pub async fn std(&self) -> Result<SumoObject> {
        self.aggregate(None, "std").await
    }

    #[deprecated(note = "use aggregate(columns, \"p10\")")]
    pub async fn p10(&self) -> Result<SumoObject> {
        self.aggregate(None, "p10").await
    }

    #[deprecated(note = "use aggregate(columns, \"p50\")")]
    pub async fn p50(&self) -> Result<SumoObject> {
        self.aggregate(None, "p50").await
    }

    #[deprecated(note = "use aggregate(columns, \"p90\")")]
    pub async fn p90(&self) -> Result<SumoObject> {
        self.aggregate(None, "p90").await
    }
}

impl SearchContext {
    /// Aggregation over the realizations this context selects
    pub fn aggregator(&self) -> EnsembleAggregator<'_> {
        EnsembleAggregator::new(self)
    }
}

fn validate_operations(operations: &[&str]) -> Result<()> {
    if operations.is_empty() {
        return Err(ExplorerError::Configuration(
            "At least one aggregation operation is required".to_string(),
        ));
    }
    for op in operations {
        if !OPERATIONS.contains(op) {
            return Err(ExplorerError::Configuration(format!(
                "Unknown aggregation operation: {}",
                op
            )));
        }
    }
    Ok(())
}

/// Metadata of an aggregated object, derived from one of its members
pub(crate) fn derived_document(
    prototype: &Document,
    realization_ids: &[i64],
    operation: &str,
    columns: Option<&[String]>,
) -> Result<Document> {
    let mut metadata = prototype.metadata().clone();
    let root = metadata
        .as_object_mut()
        .ok_or_else(|| ExplorerError::protocol("prototype metadata"))?;
    for section in STRIPPED_SECTIONS {
        root.remove(section);
    }

    let fmu = root
        .entry("fmu")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| ExplorerError::protocol("prototype fmu section"))?;
    fmu.remove("realization");

    let id = Uuid::new_v4().to_string();
    fmu.insert(
        "aggregation".to_string(),
        json!({
            "id": id,
            "realization_ids": realization_ids,
            "operation": operation,
        }),
    );

    if let Some(columns) = columns {
        if let Some(spec) = root
            .get_mut("data")
            .and_then(|data| data.get_mut("spec"))
            .and_then(Value::as_object_mut)
        {
            spec.insert("columns".to_string(), json!(columns));
        }
    }

    Ok(Document::new(id, metadata))
}
