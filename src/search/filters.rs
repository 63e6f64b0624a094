//! Named filters compiled into boolean query clauses.
//!
//! Every filter name maps to a [`FilterKind`] in a fixed registry. A
//! [`Filter`] is an ordered list of `(name, argument)` pairs; compiling it
//! validates every name before anything is sent to the backend.

use crate::error::{ExplorerError, Result};
use crate::search::time::TimeFilter;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::HashMap;

/// Value of a field filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// The field must exist
    Exists,
    /// The field must be absent
    Missing,
    /// The field must match any of the values
    OneOf(Vec<Value>),
    /// The field must match the value exactly
    Equals(Value),
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        if value {
            FilterValue::Exists
        } else {
            FilterValue::Missing
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Equals(Value::from(value))
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Equals(Value::from(value))
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Equals(Value::from(value))
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        FilterValue::Equals(Value::from(value))
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        FilterValue::Equals(Value::from(value))
    }
}

impl<T: Into<Value>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        FilterValue::OneOf(values.into_iter().map(Into::into).collect())
    }
}

/// Argument of a named filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArg {
    /// No constraint
    Unset,
    Value(FilterValue),
    Time(TimeFilter),
    /// Raw query fragment (`complex` and `has`)
    Query(Value),
    /// Nested filter (`has`)
    Nested(Box<Filter>),
}

impl From<FilterValue> for FilterArg {
    fn from(value: FilterValue) -> Self {
        FilterArg::Value(value)
    }
}

macro_rules! value_args {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FilterArg {
                fn from(value: $ty) -> Self {
                    FilterArg::Value(FilterValue::from(value))
                }
            }
        )*
    };
}

value_args!(bool, &str, String, i64, i32, u32);

impl<T: Into<Value>> From<Vec<T>> for FilterArg {
    fn from(values: Vec<T>) -> Self {
        FilterArg::Value(FilterValue::from(values))
    }
}

impl From<TimeFilter> for FilterArg {
    fn from(value: TimeFilter) -> Self {
        FilterArg::Time(value)
    }
}

impl From<Filter> for FilterArg {
    fn from(value: Filter) -> Self {
        FilterArg::Nested(Box::new(value))
    }
}

/// How a named filter compiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    /// Document ids
    Id,
    /// `data.name`, or `fmu.case.name` for case documents
    Name,
    /// General keyword / numeric field
    General(&'static str),
    /// Boolean field
    Bool(&'static str),
    Time,
    Complex,
    /// Semi-join resolved by the search context
    Has,
}

static FILTERS: Lazy<HashMap<&'static str, FilterKind>> = Lazy::new(|| {
    use FilterKind::*;
    HashMap::from([
        ("id", Id),
        ("class", General("class.keyword")),
        ("time", Time),
        ("name", Name),
        ("uuid", General("fmu.case.uuid.keyword")),
        ("tagname", General("data.tagname.keyword")),
        ("dataformat", General("data.format.keyword")),
        ("iteration", General("fmu.iteration.name.keyword")),
        ("realization", General("fmu.realization.id")),
        ("aggregation", General("fmu.aggregation.operation.keyword")),
        ("stage", General("fmu.context.stage.keyword")),
        ("column", General("data.spec.columns.keyword")),
        ("vertical_domain", General("data.vertical_domain.keyword")),
        ("content", General("data.content.keyword")),
        ("status", General("_sumo.status.keyword")),
        ("user", General("fmu.case.user.id.keyword")),
        ("asset", General("access.asset.name.keyword")),
        ("field", General("masterdata.smda.field.identifier.keyword")),
        ("stratigraphic", Bool("data.stratigraphic")),
        ("is_observation", Bool("data.is_observation")),
        ("is_prediction", Bool("data.is_prediction")),
        ("complex", Complex),
        ("has", Has),
    ])
});

/// Look up a filter name in the registry
pub fn filter_kind(name: &str) -> Option<FilterKind> {
    FILTERS.get(name).copied()
}

/// Names of all registered filters, sorted
pub fn filter_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = FILTERS.keys().copied().collect();
    names.sort_unstable();
    names
}

/// Compile one named filter into optional must / must_not clauses
pub fn compile(name: &str, arg: &FilterArg) -> Result<(Option<Value>, Option<Value>)> {
    let kind = filter_kind(name).ok_or_else(|| {
        ExplorerError::Configuration(format!("Don't know how to generate filter for {}", name))
    })?;

    if matches!(arg, FilterArg::Unset) {
        return Ok((None, None));
    }

    match (kind, arg) {
        (FilterKind::General(attr), FilterArg::Value(value)) => Ok(general(attr, value)),
        (FilterKind::Bool(attr), FilterArg::Value(value)) => Ok((Some(boolean(attr, value)), None)),
        (FilterKind::Id, FilterArg::Value(value)) => ids(value).map(|c| (Some(c), None)),
        (FilterKind::Name, FilterArg::Value(value)) => name_clause(value).map(|c| (Some(c), None)),
        (FilterKind::Time, FilterArg::Time(time)) => Ok((Some(time.to_query()), None)),
        (FilterKind::Complex, FilterArg::Query(query)) => Ok((Some(query.clone()), None)),
        (FilterKind::Complex, FilterArg::Nested(filter)) => {
            Ok((Some(filter.to_query()?.to_json()), None))
        }
        (FilterKind::Has, FilterArg::Query(_)) | (FilterKind::Has, FilterArg::Nested(_)) => {
            Ok((None, None))
        }
        (kind, arg) => Err(ExplorerError::Configuration(format!(
            "Filter {} ({:?}) does not accept {}",
            name,
            kind,
            describe(arg)
        ))),
    }
}

fn general(attr: &str, value: &FilterValue) -> (Option<Value>, Option<Value>) {
    match value {
        FilterValue::Exists => (Some(json!({ "exists": { "field": attr } })), None),
        FilterValue::Missing => (None, Some(json!({ "exists": { "field": attr } }))),
        FilterValue::OneOf(values) => (Some(json!({ "terms": { attr: values } })), None),
        FilterValue::Equals(value) => (Some(json!({ "term": { attr: value } })), None),
    }
}

fn boolean(attr: &str, value: &FilterValue) -> Value {
    // Booleans match the stored flag, not the field's existence.
    match value {
        FilterValue::Exists => json!({ "term": { attr: true } }),
        FilterValue::Missing => json!({ "term": { attr: false } }),
        FilterValue::OneOf(values) => json!({ "terms": { attr: values } }),
        FilterValue::Equals(value) => json!({ "term": { attr: value } }),
    }
}

fn ids(value: &FilterValue) -> Result<Value> {
    match value {
        FilterValue::OneOf(values) => Ok(json!({ "ids": { "values": values } })),
        FilterValue::Equals(value) => Ok(json!({ "ids": { "values": [value] } })),
        _ => Err(ExplorerError::Configuration(
            "Filter id expects one or more document ids".to_string(),
        )),
    }
}

fn name_clause(value: &FilterValue) -> Result<Value> {
    let (data_name, case_name) = match value {
        FilterValue::Equals(v) => (
            json!({ "term": { "data.name.keyword": v } }),
            json!({ "term": { "fmu.case.name.keyword": v } }),
        ),
        FilterValue::OneOf(vs) => (
            json!({ "terms": { "data.name.keyword": vs } }),
            json!({ "terms": { "fmu.case.name.keyword": vs } }),
        ),
        _ => {
            return Err(ExplorerError::Configuration(
                "Filter name expects one or more names".to_string(),
            ))
        }
    };

    Ok(json!({
        "bool": {
            "minimum_should_match": 1,
            "should": [
                data_name,
                { "bool": { "must": [ { "term": { "class.keyword": "case" } }, case_name ] } }
            ]
        }
    }))
}

fn describe(arg: &FilterArg) -> &'static str {
    match arg {
        FilterArg::Unset => "an unset value",
        FilterArg::Value(FilterValue::Exists) | FilterArg::Value(FilterValue::Missing) => {
            "an existence test"
        }
        FilterArg::Value(_) => "a field value",
        FilterArg::Time(_) => "a time filter",
        FilterArg::Query(_) => "a raw query",
        FilterArg::Nested(_) => "a nested filter",
    }
}

/// Ordered set of named filter arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    args: Vec<(String, FilterArg)>,
}

macro_rules! value_filters {
    ($($method:ident => $key:literal),* $(,)?) => {
        $(
            #[doc = concat!("Filter on `", $key, "`")]
            pub fn $method(self, value: impl Into<FilterValue>) -> Self {
                let value: FilterValue = value.into();
                self.with($key, value)
            }
        )*
    };
}

macro_rules! bool_filters {
    ($($method:ident => $key:literal),* $(,)?) => {
        $(
            #[doc = concat!("Match the boolean flag `", $key, "`")]
            pub fn $method(self, value: bool) -> Self {
                self.with($key, FilterValue::Equals(Value::Bool(value)))
            }
        )*
    };
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument for any filter name; unknown names fail at compile time
    pub fn with(mut self, key: impl Into<String>, arg: impl Into<FilterArg>) -> Self {
        self.args.push((key.into(), arg.into()));
        self
    }

    /// Add an optional argument; `None` adds no constraint
    pub fn maybe<T: Into<FilterArg>>(self, key: impl Into<String>, arg: Option<T>) -> Self {
        match arg {
            Some(arg) => self.with(key, arg),
            None => self.with(key, FilterArg::Unset),
        }
    }

    value_filters! {
        class => "class",
        name => "name",
        uuid => "uuid",
        tagname => "tagname",
        dataformat => "dataformat",
        iteration => "iteration",
        realization => "realization",
        aggregation => "aggregation",
        stage => "stage",
        column => "column",
        vertical_domain => "vertical_domain",
        content => "content",
        status => "status",
        user => "user",
        asset => "asset",
        field => "field",
        id => "id",
    }

    bool_filters! {
        stratigraphic => "stratigraphic",
        is_observation => "is_observation",
        is_prediction => "is_prediction",
    }

    pub fn time(self, time: TimeFilter) -> Self {
        self.with("time", time)
    }

    /// Raw query fragment, passed through unchanged
    pub fn complex(self, query: Value) -> Self {
        self.with("complex", FilterArg::Query(query))
    }

    /// Keep documents whose case also contains a document matching `predicate`
    pub fn has(self, predicate: impl Into<HasPredicate>) -> Self {
        let arg = match predicate.into() {
            HasPredicate::Query(query) => FilterArg::Query(query),
            HasPredicate::Filter(filter) => FilterArg::Nested(Box::new(filter)),
        };
        self.with("has", arg)
    }

    pub fn args(&self) -> &[(String, FilterArg)] {
        &self.args
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// The `has` predicate, if one was given
    pub fn has_predicate(&self) -> Result<Option<Value>> {
        let mut found = None;
        for (key, arg) in &self.args {
            if key != "has" {
                continue;
            }
            found = match arg {
                FilterArg::Query(query) => Some(query.clone()),
                FilterArg::Nested(filter) => Some(filter.to_query()?.to_json()),
                _ => found,
            };
        }
        Ok(found)
    }

    /// Compile every argument into must / must_not clause lists
    pub fn compile(&self) -> Result<(Vec<Value>, Vec<Value>)> {
        let mut must = Vec::new();
        let mut must_not = Vec::new();
        for (key, arg) in &self.args {
            let (m, mn) = compile(key, arg)?;
            must.extend(m);
            must_not.extend(mn);
        }
        Ok((must, must_not))
    }

    /// Compile into a standalone query (used for nested predicates)
    pub fn to_query(&self) -> Result<crate::search::query::Query> {
        if self.has_predicate()?.is_some() {
            return Err(ExplorerError::Configuration(
                "Nested filters cannot use has".to_string(),
            ));
        }
        let (must, must_not) = self.compile()?;
        Ok(crate::search::query::Query::new(must, must_not))
    }
}

/// Sub-predicate of the `has` filter
#[derive(Debug, Clone)]
pub enum HasPredicate {
    Query(Value),
    Filter(Filter),
}

impl From<Value> for HasPredicate {
    fn from(value: Value) -> Self {
        HasPredicate::Query(value)
    }
}

impl From<Filter> for HasPredicate {
    fn from(value: Filter) -> Self {
        HasPredicate::Filter(value)
    }
}

/// Predefined query fragments for use with [`Filter::complex`]
pub mod predefined {
    use serde_json::{json, Value};

    /// 4D seismic: seismic content with base/monitor time labels
    pub fn seismic4d() -> Value {
        json!({
            "bool": {
                "must": [
                    { "term": { "data.content.keyword": "seismic" } },
                    { "term": { "data.time.t0.label.keyword": "base" } },
                    { "term": { "data.time.t1.label.keyword": "monitor" } }
                ]
            }
        })
    }

    /// Aggregated objects
    pub fn aggregations() -> Value {
        json!({ "exists": { "field": "fmu.aggregation.operation" } })
    }

    /// Observations: neither iteration nor realization scoped
    pub fn observations() -> Value {
        json!({
            "bool": {
                "must_not": [
                    { "exists": { "field": "fmu.iteration.name.keyword" } },
                    { "exists": { "field": "fmu.realization.id" } }
                ]
            }
        })
    }

    /// Realization-scoped objects
    pub fn realizations() -> Value {
        json!({ "exists": { "field": "fmu.realization.id" } })
    }
}
