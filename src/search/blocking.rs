//! Blocking facade over [`SearchContext`].
//!
//! The search engine is written once, as async code. This wrapper drives it
//! on a private current-thread runtime, so the blocking and cooperative paths
//! share the same clause state, cache and memoized results. It must not be
//! used from inside another tokio runtime.
//!
//! Async calls without a wrapper here can still run on the same runtime
//! through [`BlockingSearchContext::block_on`], for example
//! `context.block_on(context.inner().cases().length())`.

use crate::error::Result;
use crate::objects::{Case, CaseOverview, Document, SumoObject};
use crate::search::context::{ContextCursor, SearchContext};
use crate::search::filters::Filter;
use crate::search::metrics::Metrics;
use crate::search::paginator::Projection;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};

macro_rules! blocking_bucket_properties {
    ($($name:ident),* $(,)?) => {
        $(
            pub fn $name(&self) -> Result<Vec<Value>> {
                self.runtime.block_on(self.inner.$name())
            }
        )*
    };
}

macro_rules! blocking_class_contexts {
    ($($name:ident),* $(,)?) => {
        $(
            pub fn $name(&self) -> BlockingSearchContext {
                self.wrap(self.inner.$name())
            }
        )*
    };
}

macro_rules! blocking_metrics {
    ($($name:ident),* $(,)?) => {
        $(
            pub fn $name(&self, field: &str) -> Result<Value> {
                self.runtime.block_on(self.inner.$name(field))
            }
        )*
    };
}

pub struct BlockingSearchContext {
    inner: SearchContext,
    runtime: Arc<Runtime>,
}

impl BlockingSearchContext {
    /// Wrap a context with a fresh current-thread runtime
    pub fn new(inner: SearchContext) -> Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self::with_runtime(inner, Arc::new(runtime)))
    }

    pub fn with_runtime(inner: SearchContext, runtime: Arc<Runtime>) -> Self {
        Self { inner, runtime }
    }

    fn wrap(&self, inner: SearchContext) -> Self {
        Self::with_runtime(inner, self.runtime.clone())
    }

    /// The async context this facade drives
    pub fn inner(&self) -> &SearchContext {
        &self.inner
    }

    pub fn filter(&self, filter: &Filter) -> Result<BlockingSearchContext> {
        let inner = self.runtime.block_on(self.inner.filter(filter))?;
        Ok(self.wrap(inner))
    }

    pub fn len(&self) -> Result<u64> {
        self.runtime.block_on(self.inner.length())
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.runtime.block_on(self.inner.is_empty())
    }

    pub fn uuids(&self) -> Result<&[String]> {
        self.runtime.block_on(self.inner.uuids())
    }

    pub fn get(&self, index: usize) -> Result<SumoObject> {
        self.runtime.block_on(self.inner.get(index))
    }

    pub fn get_object(&self, id: &str) -> Result<Document> {
        self.runtime.block_on(self.inner.get_object(id))
    }

    pub fn get_objects(&self, ids: &[String], projection: &Projection) -> Result<Vec<Value>> {
        self.runtime.block_on(self.inner.get_objects(ids, projection))
    }

    pub fn field_values(&self, field: &str) -> Result<Vec<Value>> {
        self.runtime.block_on(self.inner.field_values(field))
    }

    blocking_bucket_properties! {
        names,
        tagnames,
        dataformats,
        iterations,
        realizations,
        aggregations,
        stages,
        vertical_domains,
        contents,
        columns,
        users,
        assets,
        fields,
        statuses,
        classes,
    }

    pub fn timestamps(&self) -> Result<Vec<String>> {
        self.runtime.block_on(self.inner.timestamps())
    }

    pub fn intervals(&self) -> Result<Vec<(String, String)>> {
        self.runtime.block_on(self.inner.intervals())
    }

    blocking_class_contexts! {
        cases,
        surfaces,
        tables,
        cubes,
        polygons,
        dictionaries,
    }

    pub fn metrics(&self) -> BlockingMetrics<'_> {
        BlockingMetrics {
            inner: self.inner.metrics(),
            runtime: &self.runtime,
        }
    }

    /// Aggregate the selected realizations with one operation
    pub fn aggregate(&self, columns: Option<&[String]>, operation: &str) -> Result<SumoObject> {
        self.runtime
            .block_on(self.inner.aggregator().aggregate(columns, operation))
    }

    pub fn aggregate_many(
        &self,
        columns: Option<&[String]>,
        operations: &[&str],
    ) -> Result<Vec<SumoObject>> {
        self.runtime
            .block_on(self.inner.aggregator().aggregate_many(columns, operations))
    }

    /// Binary payload of `object`, fetched at most once per object
    pub fn blob(&self, object: &SumoObject) -> Result<Bytes> {
        self.runtime.block_on(object.blob())
    }

    pub fn overview<'c>(&self, case: &'c Case) -> Result<&'c CaseOverview> {
        self.runtime.block_on(case.overview())
    }

    /// Run any future on this context's runtime
    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn iter(&self) -> BlockingIter<'_> {
        BlockingIter {
            runtime: &self.runtime,
            cursor: self.inner.cursor(),
        }
    }
}

impl<'a> IntoIterator for &'a BlockingSearchContext {
    type Item = Result<SumoObject>;
    type IntoIter = BlockingIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Blocking counterpart of [`Metrics`]
pub struct BlockingMetrics<'a> {
    inner: Metrics<'a>,
    runtime: &'a Runtime,
}

impl BlockingMetrics<'_> {
    blocking_metrics! {
        min,
        max,
        avg,
        sum,
        value_count,
        cardinality,
        stats,
        extended_stats,
    }

    pub fn percentiles(&self, field: &str, percents: Option<&[f64]>) -> Result<Value> {
        self.runtime
            .block_on(self.inner.percentiles(field, percents))
    }
}

/// Sequential iteration with read-ahead
pub struct BlockingIter<'a> {
    runtime: &'a Runtime,
    cursor: ContextCursor<'a>,
}

impl Iterator for BlockingIter<'_> {
    type Item = Result<SumoObject>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.cursor.next())
    }
}
