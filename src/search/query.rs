//! Boolean query accumulated by search contexts

use serde_json::{json, Value};

/// Ordered must / must_not clause lists.
///
/// A `Query` is never mutated in place once shared: [`Query::extend`] returns
/// a copy with the extra clauses appended.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    must: Vec<Value>,
    must_not: Vec<Value>,
}

impl Query {
    /// Query matching every document
    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn new(must: Vec<Value>, must_not: Vec<Value>) -> Self {
        Self {
            must: must.into_iter().filter(|c| !c.is_null()).collect(),
            must_not: must_not.into_iter().filter(|c| !c.is_null()).collect(),
        }
    }

    /// Query matching exactly the given document ids
    pub fn ids<S: AsRef<str>>(ids: &[S]) -> Self {
        Self::new(vec![ids_clause(ids)], Vec::new())
    }

    pub fn must(&self) -> &[Value] {
        &self.must
    }

    pub fn must_not(&self) -> &[Value] {
        &self.must_not
    }

    /// Copy this query and append clauses to the copy
    pub fn extend(
        &self,
        must: impl IntoIterator<Item = Value>,
        must_not: impl IntoIterator<Item = Value>,
    ) -> Self {
        let mut next = self.clone();
        next.must.extend(must.into_iter().filter(|c| !c.is_null()));
        next.must_not
            .extend(must_not.into_iter().filter(|c| !c.is_null()));
        next
    }

    /// Render as an Elasticsearch query fragment
    pub fn to_json(&self) -> Value {
        match (self.must.len(), self.must_not.is_empty()) {
            (1, true) => self.must[0].clone(),
            (_, true) => json!({ "bool": { "must": self.must } }),
            (0, false) => json!({ "bool": { "must_not": self.must_not } }),
            _ => json!({ "bool": { "must": self.must, "must_not": self.must_not } }),
        }
    }
}

/// `ids` clause for a list of document ids
pub fn ids_clause<S: AsRef<str>>(ids: &[S]) -> Value {
    let values: Vec<&str> = ids.iter().map(AsRef::as_ref).collect();
    json!({ "ids": { "values": values } })
}
