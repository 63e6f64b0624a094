//! Client for exploring FMU results stored in Sumo.
//!
//! Searches are built from immutable [`SearchContext`] values: each
//! [`SearchContext::filter`] call returns a narrower context, and results
//! (matching ids, counts, distinct field values, documents) are fetched only
//! when asked for, then memoized for the lifetime of that context. Result sets
//! larger than one backend page are resolved with point-in-time snapshots.
//!
//! The engine is async; [`search::BlockingSearchContext`] drives the same code
//! from synchronous callers.

pub mod aggregation;
pub mod client;
pub mod config;
pub mod error;
pub mod explorer;
pub mod logging;
pub mod objects;
pub mod search;

pub use aggregation::EnsembleAggregator;
pub use client::{SearchBackend, SumoClient};
pub use config::{BackendConfig, ExplorerConfig, ExplorerConfigBuilder, SearchSettings};
pub use error::{ExplorerError, Result};
pub use explorer::Explorer;
pub use objects::{Case, Document, Iteration, Realization, SumoObject};
pub use search::{Filter, SearchContext};
