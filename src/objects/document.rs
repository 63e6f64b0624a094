//! Metadata record of one indexed document

use crate::error::{ExplorerError, Result};
use serde_json::Value;

/// `{_id, _source}` pair as returned by the search endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: String,
    metadata: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn split_path(path: &str) -> Vec<Segment<'_>> {
    // "masterdata.smda.field[0].identifier" -> masterdata, smda, field, 0, identifier
    path.split(|c| c == '.' || c == '[' || c == ']')
        .filter(|part| !part.is_empty())
        .map(|part| match part.parse::<usize>() {
            Ok(index) => Segment::Index(index),
            Err(_) => Segment::Key(part),
        })
        .collect()
}

impl Document {
    pub fn new(id: impl Into<String>, metadata: Value) -> Self {
        Self {
            id: id.into(),
            metadata,
        }
    }

    /// Build from a search hit
    pub fn from_hit(hit: &Value) -> Result<Self> {
        let id = hit
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ExplorerError::protocol("hit _id"))?;
        let metadata = hit.get("_source").cloned().unwrap_or(Value::Null);
        Ok(Self::new(id, metadata))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    pub fn into_metadata(self) -> Value {
        self.metadata
    }

    /// Class discriminant (`case`, `surface`, ...)
    pub fn class(&self) -> Option<&str> {
        self.get_str("class")
    }

    /// Nested property by dotted path, with `[n]` indexing into arrays
    pub fn get_property(&self, path: &str) -> Option<&Value> {
        let mut current = &self.metadata;
        for segment in split_path(path) {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key)?,
                (Segment::Index(index), Value::Array(items)) => items.get(index)?,
                (Segment::Index(index), Value::Object(map)) => map.get(&index.to_string())?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get_property(path).and_then(Value::as_str)
    }

    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get_property(path).and_then(Value::as_i64)
    }

    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get_property(path).and_then(Value::as_bool)
    }
}
