//! Time-range predicates over the nested `data.time` sub-document

use serde_json::{json, Value};

const T0: &str = "data.time.t0.value";
const T1: &str = "data.time.t1.value";

/// Which kind of time information a document must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeType {
    /// Only `t0` is present
    Timestamp,
    /// Both `t0` and `t1` are present
    Interval,
    /// Any time information
    All,
    /// No time information at all
    None,
}

/// Predicate on document time stamps / intervals.
///
/// Bounds are passed through to the backend verbatim, so any date format the
/// index accepts (ISO 8601 dates, epoch millis) works.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeFilter {
    pub kind: TimeType,
    pub start: Option<String>,
    pub end: Option<String>,
    /// Interval must overlap `[start, end]` rather than lie inside it
    pub overlap: bool,
    /// Boundaries must equal `start` / `end` exactly
    pub exact: bool,
}

impl TimeFilter {
    pub fn new(kind: TimeType) -> Self {
        Self {
            kind,
            start: None,
            end: None,
            overlap: false,
            exact: false,
        }
    }

    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn with_end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn with_overlap(mut self, overlap: bool) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    /// Compile into a complete boolean query fragment
    pub fn to_query(&self) -> Value {
        let mut filter: Vec<Value> = Vec::new();
        let mut must_not: Vec<Value> = Vec::new();

        match self.kind {
            TimeType::None => {
                must_not.push(exists("data.time"));
            }
            TimeType::Timestamp => {
                filter.push(exists(T0));
                must_not.push(exists(T1));
                if self.exact {
                    if let Some(start) = &self.start {
                        filter.push(json!({ "term": { T0: start } }));
                    }
                } else if let Some(range) = range(self.start.as_deref(), self.end.as_deref()) {
                    filter.push(json!({ "range": { T0: range } }));
                }
            }
            TimeType::Interval => {
                filter.push(exists(T0));
                filter.push(exists(T1));
                self.push_interval_bounds(&mut filter);
            }
            TimeType::All => {
                filter.push(exists(T0));
                if self.start.is_some() || self.end.is_some() {
                    // Timestamps count as zero-length intervals.
                    let mut should = Vec::new();
                    let mut as_timestamp = vec![json!({ "bool": { "must_not": [exists(T1)] } })];
                    if let Some(range) = range(self.start.as_deref(), self.end.as_deref()) {
                        as_timestamp.push(json!({ "range": { T0: range } }));
                    }
                    should.push(json!({ "bool": { "filter": as_timestamp } }));

                    let mut as_interval = vec![exists(T1)];
                    self.push_interval_bounds(&mut as_interval);
                    should.push(json!({ "bool": { "filter": as_interval } }));

                    filter.push(json!({ "bool": { "should": should, "minimum_should_match": 1 } }));
                }
            }
        }

        json!({ "bool": { "filter": filter, "must_not": must_not } })
    }

    fn push_interval_bounds(&self, filter: &mut Vec<Value>) {
        let (start, end) = (self.start.as_deref(), self.end.as_deref());
        if self.exact {
            if let Some(start) = start {
                filter.push(json!({ "term": { T0: start } }));
            }
            if let Some(end) = end {
                filter.push(json!({ "term": { T1: end } }));
            }
        } else if self.overlap {
            if let Some(end) = end {
                filter.push(json!({ "range": { T0: { "lte": end } } }));
            }
            if let Some(start) = start {
                filter.push(json!({ "range": { T1: { "gte": start } } }));
            }
        } else {
            if let Some(start) = start {
                filter.push(json!({ "range": { T0: { "gte": start } } }));
            }
            if let Some(end) = end {
                filter.push(json!({ "range": { T1: { "lte": end } } }));
            }
        }
    }
}

fn exists(field: &str) -> Value {
    json!({ "exists": { "field": field } })
}

fn range(start: Option<&str>, end: Option<&str>) -> Option<Value> {
    let mut bounds = serde_json::Map::new();
    if let Some(start) = start {
        bounds.insert("gte".to_string(), json!(start));
    }
    if let Some(end) = end {
        bounds.insert("lte".to_string(), json!(end));
    }
    if bounds.is_empty() {
        None
    } else {
        Some(Value::Object(bounds))
    }
}
