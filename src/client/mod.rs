//! Transport seam between the search engine and the Sumo API.
//!
//! Everything above this module talks to the backend through
//! [`SearchBackend`]; [`SumoClient`] is the HTTP implementation and tests plug
//! in in-memory fakes.

mod http;

pub use http::SumoClient;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

/// Operations the explorer needs from a search backend
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Run a search request body against `/search`
    async fn search(&self, body: &Value) -> Result<Value>;

    /// Open a point-in-time snapshot and return its handle
    async fn open_snapshot(&self, keep_alive: &str) -> Result<String>;

    /// Release a point-in-time snapshot
    async fn close_snapshot(&self, id: &str) -> Result<()>;

    /// Request a server-side statistical aggregation; returns the binary payload
    async fn aggregate(&self, request: &Value) -> Result<Bytes>;

    /// Fetch the binary blob of a document
    async fn blob(&self, id: &str) -> Result<Bytes>;

    /// GET an arbitrary JSON resource relative to the API root
    async fn get_json(&self, path: &str) -> Result<Value>;
}
