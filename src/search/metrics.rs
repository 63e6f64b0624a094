//! Numeric statistics over the documents of a search context

use crate::error::{ExplorerError, Result};
use crate::search::context::SearchContext;
use serde_json::{json, Value};

macro_rules! single_field_metrics {
    ($($name:ident => $agg:literal),* $(,)?) => {
        $(
            #[doc = concat!("`", $agg, "` aggregation over `field`")]
            pub async fn $name(&self, field: &str) -> Result<Value> {
                self.aggregate(json!({ $agg: { "field": field } })).await
            }
        )*
    };
}

/// Each method issues one size-0 query and returns the raw aggregation object
pub struct Metrics<'a> {
    context: &'a SearchContext,
}

impl<'a> Metrics<'a> {
    pub fn new(context: &'a SearchContext) -> Self {
        Self { context }
    }

    async fn aggregate(&self, agg: Value) -> Result<Value> {
        let body = json!({
            "query": self.context.query().to_json(),
            "size": 0,
            "aggs": { "agg": agg },
        });
        let mut response = self.context.backend().search(&body).await?;
        response
            .get_mut("aggregations")
            .and_then(|aggs| aggs.get_mut("agg"))
            .map(Value::take)
            .ok_or_else(|| ExplorerError::protocol("aggregation agg"))
    }

    single_field_metrics! {
        min => "min",
        max => "max",
        avg => "avg",
        sum => "sum",
        value_count => "value_count",
        cardinality => "cardinality",
        stats => "stats",
        extended_stats => "extended_stats",
    }

    /// Percentiles of `field`; the backend's default percents when `percents` is `None`
    pub async fn percentiles(&self, field: &str, percents: Option<&[f64]>) -> Result<Value> {
        let agg = match percents {
            Some(percents) => json!({ "percentiles": { "field": field, "percents": percents } }),
            None => json!({ "percentiles": { "field": field } }),
        };
        self.aggregate(agg).await
    }
}
